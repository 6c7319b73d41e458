//! PostgreSQL store for recurrence-service.

use crate::models::{CreateInvoice, Invoice, LineItem, ListInvoicesFilter};
use crate::recurrence::{GeneratedInvoice, GenerationPlan, RecurrenceError};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::InvoiceStore;
use async_trait::async_trait;
use chrono::NaiveDate;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "recurrence-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Apply pending schema migrations. Runs once at startup.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl InvoiceStore for Database {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    #[instrument(skip(self, input), fields(invoice_number = %input.invoice_number))]
    async fn create_invoice(
        &self,
        input: &CreateInvoice,
    ) -> Result<(Invoice, Vec<LineItem>), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_invoice"])
            .start_timer();

        let totals = input.totals();
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            INSERT INTO invoices (
                invoice_id, invoice_number, client_id, client_name, status, issue_date, due_date,
                subtotal, tax_total, total, notes, is_recurring, recurrence_day, next_generation_date,
                occurrences_count, max_occurrences, end_date, auto_send
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, 0, $15, $16, $17)
            RETURNING invoice_id, invoice_number, client_id, client_name, status, issue_date, due_date,
                subtotal, tax_total, total, notes, is_recurring, recurrence_day, next_generation_date,
                occurrences_count, max_occurrences, end_date, auto_send, parent_invoice_id,
                created_utc, updated_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.invoice_number)
        .bind(input.client_id)
        .bind(&input.client_name)
        .bind(input.status.as_str())
        .bind(input.issue_date)
        .bind(input.due_date)
        .bind(totals.subtotal)
        .bind(totals.tax_total)
        .bind(totals.total)
        .bind(&input.notes)
        .bind(input.recurrence.as_str())
        .bind(input.recurrence_day)
        .bind(input.next_generation_date)
        .bind(input.max_occurrences)
        .bind(input.end_date)
        .bind(input.auto_send)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "Invoice number '{}' already exists",
                    input.invoice_number
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create invoice: {}", e)),
        })?;

        let mut items = Vec::with_capacity(input.line_items.len());
        for (i, item) in input.line_items.iter().enumerate() {
            let line_item = sqlx::query_as::<_, LineItem>(
                r#"
                INSERT INTO line_items (line_item_id, invoice_id, description, quantity, unit_price, total, sort_order)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING line_item_id, invoice_id, description, quantity, unit_price, total, sort_order, created_utc
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(invoice.invoice_id)
            .bind(&item.description)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.total())
            .bind(i as i32)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to add line item: {}", e))
            })?;
            items.push(line_item);
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(
            invoice_id = %invoice.invoice_id,
            is_recurring = %invoice.is_recurring,
            line_items = items.len(),
            "Invoice created"
        );

        Ok((invoice, items))
    }

    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    async fn get_invoice(&self, invoice_id: Uuid) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT invoice_id, invoice_number, client_id, client_name, status, issue_date, due_date,
                subtotal, tax_total, total, notes, is_recurring, recurrence_day, next_generation_date,
                occurrences_count, max_occurrences, end_date, auto_send, parent_invoice_id,
                created_utc, updated_utc
            FROM invoices
            WHERE invoice_id = $1
            "#,
        )
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))?;

        timer.observe_duration();

        Ok(invoice)
    }

    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    async fn get_line_items(&self, invoice_id: Uuid) -> Result<Vec<LineItem>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_line_items"])
            .start_timer();

        let items = sqlx::query_as::<_, LineItem>(
            r#"
            SELECT line_item_id, invoice_id, description, quantity, unit_price, total, sort_order, created_utc
            FROM line_items
            WHERE invoice_id = $1
            ORDER BY sort_order, created_utc
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get line items: {}", e)))?;

        timer.observe_duration();

        Ok(items)
    }

    #[instrument(skip(self, filter))]
    async fn list_invoices(&self, filter: &ListInvoicesFilter) -> Result<Vec<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let limit = filter.page_size.clamp(1, 100) as i64;

        let invoices = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT invoice_id, invoice_number, client_id, client_name, status, issue_date, due_date,
                subtotal, tax_total, total, notes, is_recurring, recurrence_day, next_generation_date,
                occurrences_count, max_occurrences, end_date, auto_send, parent_invoice_id,
                created_utc, updated_utc
            FROM invoices
            WHERE ($1::uuid IS NULL OR parent_invoice_id = $1)
              AND ($2::uuid IS NULL OR invoice_id > $2)
            ORDER BY invoice_id
            LIMIT $3
            "#,
        )
        .bind(filter.parent_invoice_id)
        .bind(filter.page_token)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list invoices: {}", e)))?;

        timer.observe_duration();

        Ok(invoices)
    }

    #[instrument(skip(self), fields(as_of = %as_of))]
    async fn find_templates_due(&self, as_of: NaiveDate) -> Result<Vec<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_templates_due"])
            .start_timer();

        let templates = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT invoice_id, invoice_number, client_id, client_name, status, issue_date, due_date,
                subtotal, tax_total, total, notes, is_recurring, recurrence_day, next_generation_date,
                occurrences_count, max_occurrences, end_date, auto_send, parent_invoice_id,
                created_utc, updated_utc
            FROM invoices
            WHERE is_recurring <> 'oneshot'
              AND next_generation_date IS NOT NULL
              AND next_generation_date <= $1
            ORDER BY next_generation_date, invoice_id
            "#,
        )
        .bind(as_of)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to find due templates: {}", e))
        })?;

        timer.observe_duration();

        Ok(templates)
    }

    #[instrument(skip(self), fields(template_id = %template_id))]
    async fn retire_template(
        &self,
        template_id: Uuid,
        expected_occurrences_count: i32,
    ) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["retire_template"])
            .start_timer();

        let template = sqlx::query_as::<_, Invoice>(
            r#"
            UPDATE invoices
            SET is_recurring = 'oneshot',
                next_generation_date = NULL,
                updated_utc = NOW()
            WHERE invoice_id = $1
              AND occurrences_count = $2
              AND is_recurring <> 'oneshot'
            RETURNING invoice_id, invoice_number, client_id, client_name, status, issue_date, due_date,
                subtotal, tax_total, total, notes, is_recurring, recurrence_day, next_generation_date,
                occurrences_count, max_occurrences, end_date, auto_send, parent_invoice_id,
                created_utc, updated_utc
            "#,
        )
        .bind(template_id)
        .bind(expected_occurrences_count)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to retire template: {}", e)))?;

        timer.observe_duration();

        Ok(template)
    }

    #[instrument(skip(self, plan), fields(template_id = %plan.template_id))]
    async fn commit_generation(
        &self,
        plan: &GenerationPlan,
    ) -> Result<GeneratedInvoice, RecurrenceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["commit_generation"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        // Conditional on the counter read at planning time; also takes the row
        // lock so a racing commit re-checks against our write.
        let template = sqlx::query_as::<_, Invoice>(
            r#"
            UPDATE invoices
            SET occurrences_count = $3,
                next_generation_date = $4,
                is_recurring = $5,
                updated_utc = NOW()
            WHERE invoice_id = $1
              AND occurrences_count = $2
              AND is_recurring <> 'oneshot'
            RETURNING invoice_id, invoice_number, client_id, client_name, status, issue_date, due_date,
                subtotal, tax_total, total, notes, is_recurring, recurrence_day, next_generation_date,
                occurrences_count, max_occurrences, end_date, auto_send, parent_invoice_id,
                created_utc, updated_utc
            "#,
        )
        .bind(plan.template_id)
        .bind(plan.expected_occurrences_count)
        .bind(plan.template_update.occurrences_count)
        .bind(plan.template_update.next_generation_date)
        .bind(plan.template_update.recurrence.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update template: {}", e))
        })?;

        let Some(template) = template else {
            tx.rollback().await.ok();
            warn!(
                expected = plan.expected_occurrences_count,
                "Template changed since generation was planned"
            );
            return Err(RecurrenceError::ConcurrentGeneration {
                template_id: plan.template_id,
            });
        };

        let new = &plan.invoice;
        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            INSERT INTO invoices (
                invoice_id, invoice_number, client_id, client_name, status, issue_date, due_date,
                subtotal, tax_total, total, notes, is_recurring, occurrences_count, auto_send,
                parent_invoice_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 'oneshot', 0, FALSE, $12)
            RETURNING invoice_id, invoice_number, client_id, client_name, status, issue_date, due_date,
                subtotal, tax_total, total, notes, is_recurring, recurrence_day, next_generation_date,
                occurrences_count, max_occurrences, end_date, auto_send, parent_invoice_id,
                created_utc, updated_utc
            "#,
        )
        .bind(new.invoice_id)
        .bind(&new.invoice_number)
        .bind(new.client_id)
        .bind(&new.client_name)
        .bind(new.status.as_str())
        .bind(new.issue_date)
        .bind(new.due_date)
        .bind(new.subtotal)
        .bind(new.tax_total)
        .bind(new.total)
        .bind(&new.notes)
        .bind(new.parent_invoice_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "Invoice number '{}' already exists",
                    new.invoice_number
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to insert invoice: {}", e)),
        })?;

        let mut line_items = Vec::with_capacity(plan.line_items.len());
        for item in &plan.line_items {
            let result = sqlx::query_as::<_, LineItem>(
                r#"
                INSERT INTO line_items (line_item_id, invoice_id, description, quantity, unit_price, total, sort_order)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING line_item_id, invoice_id, description, quantity, unit_price, total, sort_order, created_utc
                "#,
            )
            .bind(item.line_item_id)
            .bind(invoice.invoice_id)
            .bind(&item.description)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.total)
            .bind(item.sort_order)
            .fetch_one(&mut *tx)
            .await;

            match result {
                Ok(inserted) => line_items.push(inserted),
                Err(e) => {
                    tx.rollback().await.ok();
                    error!(
                        error = %e,
                        invoice_id = %invoice.invoice_id,
                        "Line item copy failed, generation rolled back"
                    );
                    return Err(RecurrenceError::ItemCopyFailed {
                        template_id: plan.template_id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        Ok(GeneratedInvoice {
            invoice,
            line_items,
            template,
        })
    }
}
