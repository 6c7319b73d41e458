//! In-process invoice store.
//!
//! Every operation takes a single lock over both tables, which is what makes
//! `commit_generation` atomic here.

use crate::models::{CreateInvoice, Invoice, LineItem, ListInvoicesFilter};
use crate::recurrence::{GeneratedInvoice, GenerationPlan, RecurrenceError};
use crate::services::InvoiceStore;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use service_core::error::AppError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    invoices: HashMap<Uuid, Invoice>,
    line_items: Vec<LineItem>,
}

impl Tables {
    fn number_taken(&self, invoice_number: &str) -> bool {
        self.invoices
            .values()
            .any(|inv| inv.invoice_number == invoice_number)
    }

    fn items_for(&self, invoice_id: Uuid) -> Vec<LineItem> {
        let mut items: Vec<LineItem> = self
            .line_items
            .iter()
            .filter(|item| item.invoice_id == invoice_id)
            .cloned()
            .collect();
        items.sort_by_key(|item| item.sort_order);
        items
    }
}

/// Thread-safe in-memory store. Clones share the same tables.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    fail_item_copies: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent line-item copy during generation fail.
    pub fn fail_item_copies(&self, fail: bool) {
        self.fail_item_copies.store(fail, Ordering::SeqCst);
    }

    /// Number of invoice rows, templates included.
    pub async fn invoice_count(&self) -> usize {
        self.tables.lock().await.invoices.len()
    }

    /// Number of line-item rows across all invoices.
    pub async fn line_item_count(&self) -> usize {
        self.tables.lock().await.line_items.len()
    }
}

#[async_trait]
impl InvoiceStore for MemoryStore {
    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }

    #[instrument(skip(self, input), fields(invoice_number = %input.invoice_number))]
    async fn create_invoice(
        &self,
        input: &CreateInvoice,
    ) -> Result<(Invoice, Vec<LineItem>), AppError> {
        let mut tables = self.tables.lock().await;

        if tables.number_taken(&input.invoice_number) {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Invoice number '{}' already exists",
                input.invoice_number
            )));
        }

        let now = Utc::now();
        let totals = input.totals();
        let invoice = Invoice {
            invoice_id: Uuid::new_v4(),
            invoice_number: input.invoice_number.clone(),
            client_id: input.client_id,
            client_name: input.client_name.clone(),
            status: input.status.as_str().to_string(),
            issue_date: input.issue_date,
            due_date: input.due_date,
            subtotal: totals.subtotal,
            tax_total: totals.tax_total,
            total: totals.total,
            notes: input.notes.clone(),
            is_recurring: input.recurrence.as_str().to_string(),
            recurrence_day: input.recurrence_day,
            next_generation_date: input.next_generation_date,
            occurrences_count: 0,
            max_occurrences: input.max_occurrences,
            end_date: input.end_date,
            auto_send: input.auto_send,
            parent_invoice_id: None,
            created_utc: now,
            updated_utc: now,
        };

        let items: Vec<LineItem> = input
            .line_items
            .iter()
            .enumerate()
            .map(|(i, item)| LineItem {
                line_item_id: Uuid::new_v4(),
                invoice_id: invoice.invoice_id,
                description: item.description.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price,
                total: item.total(),
                sort_order: i as i32,
                created_utc: now,
            })
            .collect();

        tables.invoices.insert(invoice.invoice_id, invoice.clone());
        tables.line_items.extend(items.iter().cloned());

        info!(invoice_id = %invoice.invoice_id, "Invoice created");

        Ok((invoice, items))
    }

    async fn get_invoice(&self, invoice_id: Uuid) -> Result<Option<Invoice>, AppError> {
        Ok(self.tables.lock().await.invoices.get(&invoice_id).cloned())
    }

    async fn get_line_items(&self, invoice_id: Uuid) -> Result<Vec<LineItem>, AppError> {
        Ok(self.tables.lock().await.items_for(invoice_id))
    }

    async fn list_invoices(&self, filter: &ListInvoicesFilter) -> Result<Vec<Invoice>, AppError> {
        let limit = filter.page_size.clamp(1, 100) as usize;
        let tables = self.tables.lock().await;

        let mut invoices: Vec<Invoice> = tables
            .invoices
            .values()
            .filter(|inv| {
                filter
                    .parent_invoice_id
                    .map_or(true, |parent| inv.parent_invoice_id == Some(parent))
            })
            .filter(|inv| filter.page_token.map_or(true, |cursor| inv.invoice_id > cursor))
            .cloned()
            .collect();
        invoices.sort_by_key(|inv| inv.invoice_id);
        invoices.truncate(limit);

        Ok(invoices)
    }

    async fn find_templates_due(&self, as_of: NaiveDate) -> Result<Vec<Invoice>, AppError> {
        let tables = self.tables.lock().await;

        let mut due: Vec<Invoice> = tables
            .invoices
            .values()
            .filter(|inv| inv.recurrence().is_recurring())
            .filter(|inv| inv.next_generation_date.is_some_and(|next| next <= as_of))
            .cloned()
            .collect();
        due.sort_by_key(|inv| (inv.next_generation_date, inv.invoice_id));

        Ok(due)
    }

    #[instrument(skip(self), fields(template_id = %template_id))]
    async fn retire_template(
        &self,
        template_id: Uuid,
        expected_occurrences_count: i32,
    ) -> Result<Option<Invoice>, AppError> {
        let mut tables = self.tables.lock().await;

        let Some(template) = tables.invoices.get_mut(&template_id) else {
            return Ok(None);
        };
        if template.occurrences_count != expected_occurrences_count
            || !template.recurrence().is_recurring()
        {
            return Ok(None);
        }

        template.is_recurring = "oneshot".to_string();
        template.next_generation_date = None;
        template.updated_utc = Utc::now();

        Ok(Some(template.clone()))
    }

    #[instrument(skip(self, plan), fields(template_id = %plan.template_id))]
    async fn commit_generation(
        &self,
        plan: &GenerationPlan,
    ) -> Result<GeneratedInvoice, RecurrenceError> {
        let mut tables = self.tables.lock().await;

        let template = tables
            .invoices
            .get(&plan.template_id)
            .cloned()
            .ok_or(RecurrenceError::TemplateNotFound(plan.template_id))?;

        if template.occurrences_count != plan.expected_occurrences_count
            || !template.recurrence().is_recurring()
        {
            warn!(
                expected = plan.expected_occurrences_count,
                actual = template.occurrences_count,
                "Template changed since generation was planned"
            );
            return Err(RecurrenceError::ConcurrentGeneration {
                template_id: plan.template_id,
            });
        }

        if tables.number_taken(&plan.invoice.invoice_number) {
            return Err(RecurrenceError::Store(AppError::Conflict(anyhow::anyhow!(
                "Invoice number '{}' already exists",
                plan.invoice.invoice_number
            ))));
        }

        if !plan.line_items.is_empty() && self.fail_item_copies.load(Ordering::SeqCst) {
            return Err(RecurrenceError::ItemCopyFailed {
                template_id: plan.template_id,
                reason: "line item insert rejected".to_string(),
            });
        }

        let now = Utc::now();
        let new = &plan.invoice;
        let invoice = Invoice {
            invoice_id: new.invoice_id,
            invoice_number: new.invoice_number.clone(),
            client_id: new.client_id,
            client_name: new.client_name.clone(),
            status: new.status.as_str().to_string(),
            issue_date: new.issue_date,
            due_date: new.due_date,
            subtotal: new.subtotal,
            tax_total: new.tax_total,
            total: new.total,
            notes: new.notes.clone(),
            is_recurring: "oneshot".to_string(),
            recurrence_day: None,
            next_generation_date: None,
            occurrences_count: 0,
            max_occurrences: None,
            end_date: None,
            auto_send: false,
            parent_invoice_id: Some(new.parent_invoice_id),
            created_utc: now,
            updated_utc: now,
        };

        let items: Vec<LineItem> = plan
            .line_items
            .iter()
            .map(|item| LineItem {
                line_item_id: item.line_item_id,
                invoice_id: invoice.invoice_id,
                description: item.description.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price,
                total: item.total,
                sort_order: item.sort_order,
                created_utc: now,
            })
            .collect();

        let mut updated = template;
        updated.occurrences_count = plan.template_update.occurrences_count;
        updated.next_generation_date = plan.template_update.next_generation_date;
        updated.is_recurring = plan.template_update.recurrence.as_str().to_string();
        updated.updated_utc = now;

        tables.invoices.insert(invoice.invoice_id, invoice.clone());
        tables.line_items.extend(items.iter().cloned());
        tables.invoices.insert(updated.invoice_id, updated.clone());

        Ok(GeneratedInvoice {
            invoice,
            line_items: items,
            template: updated,
        })
    }
}
