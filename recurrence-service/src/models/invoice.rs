//! Invoice model for recurrence-service.

use crate::models::{CreateLineItem, Recurrence};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Invoice status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceStatus {
    #[serde(rename = "brouillon")]
    Draft,
    #[serde(rename = "envoyee")]
    Sent,
    #[serde(rename = "payee")]
    Paid,
    #[serde(rename = "en_retard")]
    Overdue,
    #[serde(rename = "annulee")]
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "brouillon",
            InvoiceStatus::Sent => "envoyee",
            InvoiceStatus::Paid => "payee",
            InvoiceStatus::Overdue => "en_retard",
            InvoiceStatus::Cancelled => "annulee",
        }
    }
}

/// Invoice row. Recurring templates are invoices whose `is_recurring` is not
/// `oneshot`; generated occurrences point back at them via `parent_invoice_id`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub invoice_id: Uuid,
    pub invoice_number: String,
    pub client_id: Option<Uuid>,
    pub client_name: String,
    pub status: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub subtotal: Decimal,
    pub tax_total: Decimal,
    pub total: Decimal,
    pub notes: Option<String>,
    pub is_recurring: String,
    pub recurrence_day: Option<i32>,
    pub next_generation_date: Option<NaiveDate>,
    pub occurrences_count: i32,
    pub max_occurrences: Option<i32>,
    pub end_date: Option<NaiveDate>,
    pub auto_send: bool,
    pub parent_invoice_id: Option<Uuid>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Invoice {
    pub fn recurrence(&self) -> Recurrence {
        Recurrence::from_string(&self.is_recurring)
    }

    /// Day of month occurrences target; falls back to the issue date's day.
    pub fn anchor_day(&self) -> u32 {
        self.recurrence_day
            .and_then(|d| u32::try_from(d).ok())
            .unwrap_or_else(|| self.issue_date.day())
    }
}

/// Filter parameters for listing invoices.
#[derive(Debug, Clone, Default)]
pub struct ListInvoicesFilter {
    pub parent_invoice_id: Option<Uuid>,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}

/// Input for creating an invoice, optionally as a recurring template.
#[derive(Debug, Clone)]
pub struct CreateInvoice {
    pub invoice_number: String,
    pub client_id: Option<Uuid>,
    pub client_name: String,
    pub status: InvoiceStatus,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub notes: Option<String>,
    pub recurrence: Recurrence,
    pub recurrence_day: Option<i32>,
    pub next_generation_date: Option<NaiveDate>,
    pub max_occurrences: Option<i32>,
    pub end_date: Option<NaiveDate>,
    pub auto_send: bool,
    /// Tax rate in percent applied to the subtotal.
    pub tax_rate: Decimal,
    pub line_items: Vec<CreateLineItem>,
}

/// Stored totals of an invoice header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvoiceTotals {
    pub subtotal: Decimal,
    pub tax_total: Decimal,
    pub total: Decimal,
}

impl CreateInvoice {
    /// Subtotal is the sum of the rounded line totals, so it always matches
    /// the stored line items.
    pub fn totals(&self) -> InvoiceTotals {
        let subtotal: Decimal = self.line_items.iter().map(CreateLineItem::total).sum();
        let tax_total = (subtotal * self.tax_rate / Decimal::ONE_HUNDRED).round_dp(2);
        InvoiceTotals {
            subtotal,
            tax_total,
            total: subtotal + tax_total,
        }
    }
}
