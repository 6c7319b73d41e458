//! Materialising one occurrence of a template.

use crate::models::{Cadence, Invoice, InvoiceStatus, LineItem, Recurrence};
use crate::recurrence::schedule::{compute_next_occurrence, due_date_for};
use crate::recurrence::RecurrenceError;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

/// Header of the invoice about to be generated.
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub invoice_id: Uuid,
    pub invoice_number: String,
    pub client_id: Option<Uuid>,
    pub client_name: String,
    pub status: InvoiceStatus,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub subtotal: Decimal,
    pub tax_total: Decimal,
    pub total: Decimal,
    pub notes: Option<String>,
    pub parent_invoice_id: Uuid,
}

/// Line item copied from the template.
#[derive(Debug, Clone)]
pub struct NewLineItem {
    pub line_item_id: Uuid,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub total: Decimal,
    pub sort_order: i32,
}

/// Bookkeeping written back to the template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateUpdate {
    pub occurrences_count: i32,
    pub next_generation_date: Option<NaiveDate>,
    pub recurrence: Recurrence,
}

impl TemplateUpdate {
    /// True when this generation moves the template into its terminal state.
    pub fn terminates(&self) -> bool {
        self.recurrence == Recurrence::OneShot
    }
}

/// Everything a store must write, atomically, to record one occurrence.
///
/// `expected_occurrences_count` is the counter read when the plan was built;
/// stores must reject the plan if the template has moved on since.
#[derive(Debug, Clone)]
pub struct GenerationPlan {
    pub template_id: Uuid,
    pub expected_occurrences_count: i32,
    pub invoice: NewInvoice,
    pub line_items: Vec<NewLineItem>,
    pub template_update: TemplateUpdate,
}

/// A committed occurrence together with the template as it now stands.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedInvoice {
    pub invoice: Invoice,
    pub line_items: Vec<LineItem>,
    pub template: Invoice,
}

/// Build the writes for one occurrence of `template` issued at `now`.
///
/// Totals and line items are copied verbatim; nothing is recomputed.
pub fn build_generation_plan(
    template: &Invoice,
    items: &[LineItem],
    cadence: Cadence,
    now: DateTime<Utc>,
) -> Result<GenerationPlan, RecurrenceError> {
    let template_id = template.invoice_id;
    let issue_date = now.date_naive();
    let due_date = due_date_for(issue_date).ok_or_else(|| RecurrenceError::InvalidSchedule {
        template_id,
        reason: format!("due date out of range for issue date {}", issue_date),
    })?;

    let status = if template.auto_send {
        InvoiceStatus::Sent
    } else {
        InvoiceStatus::Draft
    };

    let invoice = NewInvoice {
        invoice_id: Uuid::new_v4(),
        invoice_number: format!("{}-{}", template.invoice_number, now.timestamp_millis()),
        client_id: template.client_id,
        client_name: template.client_name.clone(),
        status,
        issue_date,
        due_date,
        subtotal: template.subtotal,
        tax_total: template.tax_total,
        total: template.total,
        notes: template.notes.clone(),
        parent_invoice_id: template_id,
    };

    let line_items = items
        .iter()
        .map(|item| NewLineItem {
            line_item_id: Uuid::new_v4(),
            description: item.description.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
            total: item.total,
            sort_order: item.sort_order,
        })
        .collect();

    let occurrences_count = template.occurrences_count + 1;
    let next_date = compute_next_occurrence(issue_date, cadence, template.anchor_day())
        .ok_or_else(|| RecurrenceError::InvalidSchedule {
            template_id,
            reason: format!("next occurrence out of range after {}", issue_date),
        })?;

    let within_limit = template
        .max_occurrences
        .map_or(true, |max| occurrences_count < max);
    let within_end_date = template.end_date.map_or(true, |end| next_date <= end);

    let template_update = if within_limit && within_end_date {
        TemplateUpdate {
            occurrences_count,
            next_generation_date: Some(next_date),
            recurrence: Recurrence::Recurring(cadence),
        }
    } else {
        TemplateUpdate {
            occurrences_count,
            next_generation_date: None,
            recurrence: Recurrence::OneShot,
        }
    };

    Ok(GenerationPlan {
        template_id,
        expected_occurrences_count: template.occurrences_count,
        invoice,
        line_items,
        template_update,
    })
}
