use crate::models::{
    CreateInvoice, CreateLineItem, Invoice, InvoiceStatus, LineItem, Recurrence,
};
use crate::recurrence::{compute_next_occurrence, due_date_for, TemplateState};
use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;
use validator::{Validate, ValidationError};

fn default_recurrence() -> Recurrence {
    Recurrence::OneShot
}

fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ValidationError::new("non_negative"));
    }
    Ok(())
}

/// Unit prices are stored to the cent.
fn price_precision(value: &Decimal) -> Result<(), ValidationError> {
    non_negative(value)?;
    if value.normalize().scale() > 2 {
        return Err(ValidationError::new("price_precision"));
    }
    Ok(())
}

/// Quantities are stored with four decimals.
fn quantity_precision(value: &Decimal) -> Result<(), ValidationError> {
    non_negative(value)?;
    if value.normalize().scale() > 4 {
        return Err(ValidationError::new("quantity_precision"));
    }
    Ok(())
}

fn tax_rate_in_range(value: &Decimal) -> Result<(), ValidationError> {
    non_negative(value)?;
    if *value > Decimal::ONE_HUNDRED {
        return Err(ValidationError::new("tax_rate_range"));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
pub struct LineItemRequest {
    #[validate(length(min = 1, max = 500))]
    pub description: String,
    #[validate(custom(function = "quantity_precision"))]
    pub quantity: Decimal,
    #[validate(custom(function = "price_precision"))]
    pub unit_price: Decimal,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvoiceRequest {
    #[validate(length(min = 1, max = 64))]
    pub invoice_number: String,
    pub client_id: Option<Uuid>,
    #[validate(length(min = 1, max = 200))]
    pub client_name: String,
    pub status: Option<InvoiceStatus>,
    /// Defaults to today.
    pub issue_date: Option<NaiveDate>,
    /// Defaults to the standard payment term after the issue date.
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    #[serde(default = "default_recurrence")]
    pub is_recurring: Recurrence,
    #[validate(range(min = 1, max = 31))]
    pub recurrence_day: Option<i32>,
    #[validate(range(min = 1))]
    pub max_occurrences: Option<i32>,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub auto_send: bool,
    #[serde(default)]
    #[validate(custom(function = "tax_rate_in_range"))]
    pub tax_rate: Decimal,
    #[validate(nested)]
    pub line_items: Vec<LineItemRequest>,
}

impl CreateInvoiceRequest {
    /// Validate and resolve defaults, scheduling the first occurrence of a
    /// recurring template one cadence step after its issue date.
    pub fn into_create(self) -> Result<CreateInvoice, AppError> {
        self.validate()?;

        let issue_date = self.issue_date.unwrap_or_else(|| Utc::now().date_naive());
        let due_date = match self.due_date {
            Some(d) => d,
            None => due_date_for(issue_date).ok_or_else(|| {
                AppError::BadRequest(anyhow::anyhow!("Issue date out of range"))
            })?,
        };
        if due_date < issue_date {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Due date {} is before issue date {}",
                due_date,
                issue_date
            )));
        }

        let (recurrence_day, next_generation_date, max_occurrences, end_date, auto_send) =
            match self.is_recurring.cadence() {
                Some(cadence) => {
                    if let Some(end) = self.end_date {
                        if end < issue_date {
                            return Err(AppError::BadRequest(anyhow::anyhow!(
                                "End date {} is before issue date {}",
                                end,
                                issue_date
                            )));
                        }
                    }
                    let anchor = self
                        .recurrence_day
                        .unwrap_or_else(|| issue_date.day() as i32);
                    let next = compute_next_occurrence(issue_date, cadence, anchor as u32)
                        .ok_or_else(|| {
                            AppError::BadRequest(anyhow::anyhow!("Issue date out of range"))
                        })?;
                    (
                        Some(anchor),
                        Some(next),
                        self.max_occurrences,
                        self.end_date,
                        self.auto_send,
                    )
                }
                None => (None, None, None, None, false),
            };

        Ok(CreateInvoice {
            invoice_number: self.invoice_number,
            client_id: self.client_id,
            client_name: self.client_name,
            status: self.status.unwrap_or(InvoiceStatus::Draft),
            issue_date,
            due_date,
            notes: self.notes,
            recurrence: self.is_recurring,
            recurrence_day,
            next_generation_date,
            max_occurrences,
            end_date,
            auto_send,
            tax_rate: self.tax_rate,
            line_items: self
                .line_items
                .into_iter()
                .map(|item| CreateLineItem {
                    description: item.description,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                })
                .collect(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct InvoiceResponse {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub line_items: Vec<LineItem>,
    pub template_state: TemplateState,
}

impl InvoiceResponse {
    pub fn new(invoice: Invoice, line_items: Vec<LineItem>, today: NaiveDate) -> Self {
        let template_state = TemplateState::of(&invoice, today);
        Self {
            invoice,
            line_items,
            template_state,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct OccurrencesParams {
    pub page_size: Option<i32>,
    pub page_token: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct OccurrencesResponse {
    pub template_id: Uuid,
    pub occurrences: Vec<Invoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<Uuid>,
}
