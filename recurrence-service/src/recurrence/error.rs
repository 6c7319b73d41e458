//! Recurrence engine errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde::Serialize;
use service_core::error::AppError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RecurrenceError {
    #[error("Template {0} not found")]
    TemplateNotFound(Uuid),

    #[error("Invoice {0} is not a recurring template")]
    NotRecurring(Uuid),

    #[error(
        "Template {template_id} reached its limit of {max_occurrences} occurrences ({occurrences_count} generated)"
    )]
    GenerationLimitReached {
        template_id: Uuid,
        occurrences_count: i32,
        max_occurrences: i32,
    },

    #[error("Template {template_id} recurrence ended on {end_date}")]
    RecurrenceExpired { template_id: Uuid, end_date: NaiveDate },

    #[error("Failed to copy line items for template {template_id}: {reason}")]
    ItemCopyFailed { template_id: Uuid, reason: String },

    #[error("Template {template_id} was updated by a concurrent generation")]
    ConcurrentGeneration { template_id: Uuid },

    #[error("Template {template_id} has an invalid schedule: {reason}")]
    InvalidSchedule { template_id: Uuid, reason: String },

    #[error(transparent)]
    Store(#[from] AppError),
}

impl RecurrenceError {
    /// Stable identifier reported to callers and used as a metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            RecurrenceError::TemplateNotFound(_) => "TemplateNotFound",
            RecurrenceError::NotRecurring(_) => "NotRecurring",
            RecurrenceError::GenerationLimitReached { .. } => "GenerationLimitReached",
            RecurrenceError::RecurrenceExpired { .. } => "RecurrenceExpired",
            RecurrenceError::ItemCopyFailed { .. } => "ItemCopyFailed",
            RecurrenceError::ConcurrentGeneration { .. } => "ConcurrentGeneration",
            RecurrenceError::InvalidSchedule { .. } => "InvalidSchedule",
            RecurrenceError::Store(_) => "StoreError",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            RecurrenceError::TemplateNotFound(_) => StatusCode::NOT_FOUND,
            RecurrenceError::NotRecurring(_)
            | RecurrenceError::GenerationLimitReached { .. }
            | RecurrenceError::RecurrenceExpired { .. }
            | RecurrenceError::ConcurrentGeneration { .. } => StatusCode::CONFLICT,
            RecurrenceError::InvalidSchedule { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            RecurrenceError::ItemCopyFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            RecurrenceError::Store(err) => err.status_code(),
        }
    }
}

impl IntoResponse for RecurrenceError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
            kind: &'static str,
        }

        let status = self.status_code();
        let error = match &self {
            RecurrenceError::Store(AppError::DatabaseError(_)) => "Database error".to_string(),
            other => other.to_string(),
        };

        (
            status,
            Json(ErrorResponse {
                error,
                kind: self.kind(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocking_errors_map_to_conflict() {
        let id = Uuid::new_v4();
        let limit = RecurrenceError::GenerationLimitReached {
            template_id: id,
            occurrences_count: 5,
            max_occurrences: 5,
        };
        assert_eq!(limit.status_code(), StatusCode::CONFLICT);
        assert_eq!(limit.kind(), "GenerationLimitReached");

        let missing = RecurrenceError::TemplateNotFound(id);
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn store_errors_keep_infrastructure_status() {
        let err = RecurrenceError::from(AppError::ServiceUnavailable);
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.kind(), "StoreError");
    }
}
