use crate::dtos::{DueTemplatesResponse, RunParams};
use crate::recurrence::RecurrenceError;
use crate::startup::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use uuid::Uuid;

/// Trigger surface for a single template.
pub async fn generate_from_template(
    State(state): State<AppState>,
    Path(template_id): Path<Uuid>,
) -> Result<impl IntoResponse, RecurrenceError> {
    let generated = state.engine.generate_from_template(template_id).await?;
    Ok((StatusCode::CREATED, Json(generated)))
}

pub async fn list_due_templates(
    State(state): State<AppState>,
    Query(params): Query<RunParams>,
) -> Result<impl IntoResponse, RecurrenceError> {
    let as_of = params.as_of.unwrap_or_else(|| Utc::now().date_naive());
    let templates = state.engine.store().find_templates_due(as_of).await?;
    Ok(Json(DueTemplatesResponse { as_of, templates }))
}

/// Called by the external scheduler.
pub async fn run_due_generations(
    State(state): State<AppState>,
    Query(params): Query<RunParams>,
) -> Result<impl IntoResponse, RecurrenceError> {
    let now = Utc::now();
    let as_of = params.as_of.unwrap_or_else(|| now.date_naive());
    let summary = state.engine.run_due_generations(as_of, now).await?;
    Ok(Json(summary))
}
