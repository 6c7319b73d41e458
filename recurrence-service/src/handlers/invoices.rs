use crate::dtos::{CreateInvoiceRequest, InvoiceResponse, OccurrencesParams, OccurrencesResponse};
use crate::models::ListInvoicesFilter;
use crate::startup::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use service_core::error::AppError;
use uuid::Uuid;

pub async fn create_invoice(
    State(state): State<AppState>,
    Json(payload): Json<CreateInvoiceRequest>,
) -> Result<impl IntoResponse, AppError> {
    let input = payload.into_create()?;
    let (invoice, line_items) = state.engine.store().create_invoice(&input).await?;

    tracing::info!(
        invoice_id = %invoice.invoice_id,
        is_recurring = %invoice.is_recurring,
        next_generation_date = ?invoice.next_generation_date,
        "Invoice created"
    );

    Ok((
        StatusCode::CREATED,
        Json(InvoiceResponse::new(
            invoice,
            line_items,
            Utc::now().date_naive(),
        )),
    ))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let store = state.engine.store();
    let invoice = store
        .get_invoice(invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice {} not found", invoice_id)))?;
    let line_items = store.get_line_items(invoice_id).await?;

    Ok(Json(InvoiceResponse::new(
        invoice,
        line_items,
        Utc::now().date_naive(),
    )))
}

/// Invoices generated from a template.
pub async fn list_occurrences(
    State(state): State<AppState>,
    Path(template_id): Path<Uuid>,
    Query(params): Query<OccurrencesParams>,
) -> Result<impl IntoResponse, AppError> {
    let store = state.engine.store();
    if store.get_invoice(template_id).await?.is_none() {
        return Err(AppError::NotFound(anyhow::anyhow!(
            "Invoice {} not found",
            template_id
        )));
    }

    let page_size = params.page_size.unwrap_or(50).clamp(1, 100);
    let occurrences = store
        .list_invoices(&ListInvoicesFilter {
            parent_invoice_id: Some(template_id),
            page_size,
            page_token: params.page_token,
        })
        .await?;

    let next_page_token = if occurrences.len() == page_size as usize {
        occurrences.last().map(|inv| inv.invoice_id)
    } else {
        None
    };

    Ok(Json(OccurrencesResponse {
        template_id,
        occurrences,
        next_page_token,
    }))
}
