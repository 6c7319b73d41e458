//! Storage seam for invoices and templates.

use crate::models::{CreateInvoice, Invoice, LineItem, ListInvoicesFilter};
use crate::recurrence::{GeneratedInvoice, GenerationPlan, RecurrenceError};
use async_trait::async_trait;
use chrono::NaiveDate;
use service_core::error::AppError;
use uuid::Uuid;

/// Row store backing the service.
///
/// Implementations: [`Database`](crate::services::Database) (PostgreSQL) and
/// [`MemoryStore`](crate::services::MemoryStore).
#[async_trait]
pub trait InvoiceStore: Send + Sync {
    /// Check the backend is reachable.
    async fn health_check(&self) -> Result<(), AppError>;

    /// Insert an invoice header and its line items.
    async fn create_invoice(
        &self,
        input: &CreateInvoice,
    ) -> Result<(Invoice, Vec<LineItem>), AppError>;

    async fn get_invoice(&self, invoice_id: Uuid) -> Result<Option<Invoice>, AppError>;

    /// Line items of an invoice in `sort_order`.
    async fn get_line_items(&self, invoice_id: Uuid) -> Result<Vec<LineItem>, AppError>;

    async fn list_invoices(&self, filter: &ListInvoicesFilter) -> Result<Vec<Invoice>, AppError>;

    /// Recurring templates whose `next_generation_date` is on or before `as_of`.
    async fn find_templates_due(&self, as_of: NaiveDate) -> Result<Vec<Invoice>, AppError>;

    /// Convert a template that can no longer generate into a one-shot
    /// invoice, clearing its next generation date.
    ///
    /// Returns `None` when the template is gone, already one-shot, or its
    /// `occurrences_count` no longer matches.
    async fn retire_template(
        &self,
        template_id: Uuid,
        expected_occurrences_count: i32,
    ) -> Result<Option<Invoice>, AppError>;

    /// Apply a generation plan as one unit: header, line items and template
    /// update all land, or none do.
    ///
    /// Fails with [`RecurrenceError::ConcurrentGeneration`] when the template's
    /// `occurrences_count` no longer matches the plan, and with
    /// [`RecurrenceError::ItemCopyFailed`] when a line item cannot be written.
    async fn commit_generation(
        &self,
        plan: &GenerationPlan,
    ) -> Result<GeneratedInvoice, RecurrenceError>;
}
