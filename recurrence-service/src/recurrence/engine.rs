//! Recurrence engine: turns eligible templates into invoices.

use crate::models::Invoice;
use crate::recurrence::eligibility::{check_eligibility, TerminalReason};
use crate::recurrence::plan::{build_generation_plan, GeneratedInvoice, GenerationPlan};
use crate::recurrence::RecurrenceError;
use crate::services::{
    record_error, record_generation, record_template_terminated, InvoiceStore,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Outcome for one template within a due run.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRunResult {
    pub template_id: Uuid,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summary of a due run.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRunSummary {
    pub as_of: NaiveDate,
    pub processed: u32,
    pub succeeded: u32,
    /// Templates found past their limit or end date and switched to one-shot.
    pub retired: u32,
    pub failed: u32,
    pub results: Vec<GenerationRunResult>,
}

#[derive(Clone)]
pub struct RecurrenceEngine {
    store: Arc<dyn InvoiceStore>,
}

impl RecurrenceEngine {
    pub fn new(store: Arc<dyn InvoiceStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn InvoiceStore> {
        &self.store
    }

    /// Generate the next occurrence of a template, issued today.
    pub async fn generate_from_template(
        &self,
        template_id: Uuid,
    ) -> Result<GeneratedInvoice, RecurrenceError> {
        self.generate_from_template_at(template_id, Utc::now()).await
    }

    /// Generate the next occurrence of a template as if issued at `now`.
    #[instrument(skip(self), fields(template_id = %template_id))]
    pub async fn generate_from_template_at(
        &self,
        template_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<GeneratedInvoice, RecurrenceError> {
        let start = Instant::now();

        let result = match self.plan_generation(template_id, now).await {
            Ok(plan) => self.commit(plan).await,
            Err(e) => Err(e),
        };

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.kind(),
        };
        record_generation(outcome, start.elapsed().as_secs_f64());

        result
    }

    /// Read the template and work out what generating at `now` would write.
    ///
    /// Performs no writes. Blocking conditions surface here, before any
    /// commit is attempted.
    #[instrument(skip(self), fields(template_id = %template_id))]
    pub async fn plan_generation(
        &self,
        template_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<GenerationPlan, RecurrenceError> {
        let template = self
            .store
            .get_invoice(template_id)
            .await?
            .ok_or(RecurrenceError::TemplateNotFound(template_id))?;

        let cadence = check_eligibility(&template, now.date_naive()).map_err(|e| {
            info!(reason = e.kind(), "Template not eligible for generation");
            e
        })?;

        let items = self.store.get_line_items(template_id).await?;

        build_generation_plan(&template, &items, cadence, now)
    }

    /// Write a plan through the store.
    #[instrument(skip(self, plan), fields(template_id = %plan.template_id))]
    pub async fn commit(&self, plan: GenerationPlan) -> Result<GeneratedInvoice, RecurrenceError> {
        let generated = self.store.commit_generation(&plan).await.map_err(|e| {
            match &e {
                RecurrenceError::ItemCopyFailed { reason, .. } => {
                    error!(reason = %reason, "Line item copy failed; nothing was written");
                }
                RecurrenceError::ConcurrentGeneration { .. } => {
                    warn!("Generation lost a race with another commit");
                }
                other => error!(error = %other, "Generation commit failed"),
            }
            record_error(e.kind());
            e
        })?;

        if plan.template_update.terminates() {
            let reason = if generated
                .template
                .max_occurrences
                .is_some_and(|max| generated.template.occurrences_count >= max)
            {
                TerminalReason::LimitReached
            } else {
                TerminalReason::PastEndDate
            };
            let reason = reason.as_str();
            record_template_terminated(reason);
            info!(
                reason = reason,
                occurrences_count = generated.template.occurrences_count,
                "Template reached its terminal state"
            );
        }

        info!(
            invoice_id = %generated.invoice.invoice_id,
            invoice_number = %generated.invoice.invoice_number,
            status = %generated.invoice.status,
            line_items = generated.line_items.len(),
            next_generation_date = ?generated.template.next_generation_date,
            "Recurring invoice generated"
        );

        Ok(generated)
    }

    /// Switch a template that can no longer generate to one-shot and clear
    /// its next date, so due runs stop picking it up.
    ///
    /// Keyed on the `occurrences_count` in `template`; a template changed
    /// since then is reported as [`RecurrenceError::ConcurrentGeneration`].
    #[instrument(skip(self, template), fields(template_id = %template.invoice_id))]
    pub async fn retire_template(
        &self,
        template: &Invoice,
        reason: TerminalReason,
    ) -> Result<Invoice, RecurrenceError> {
        let retired = self
            .store
            .retire_template(template.invoice_id, template.occurrences_count)
            .await?
            .ok_or(RecurrenceError::ConcurrentGeneration {
                template_id: template.invoice_id,
            })?;

        record_template_terminated(reason.as_str());
        info!(
            reason = reason.as_str(),
            occurrences_count = retired.occurrences_count,
            "Template retired without generating"
        );

        Ok(retired)
    }

    /// Generate one occurrence for every template due on or before `as_of`.
    ///
    /// Missed cycles are not back-filled: each due template yields a single
    /// invoice and its next date is computed from today. Due templates that
    /// are past their limit or end date are retired instead.
    #[instrument(skip(self), fields(as_of = %as_of))]
    pub async fn run_due_generations(
        &self,
        as_of: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<GenerationRunSummary, RecurrenceError> {
        let templates = self.store.find_templates_due(as_of).await?;

        info!(due = templates.len(), "Starting recurring generation run");

        let mut summary = GenerationRunSummary {
            as_of,
            processed: 0,
            succeeded: 0,
            retired: 0,
            failed: 0,
            results: Vec::with_capacity(templates.len()),
        };

        for template in templates {
            summary.processed += 1;

            match self
                .generate_from_template_at(template.invoice_id, now)
                .await
            {
                Ok(generated) => {
                    summary.succeeded += 1;
                    summary.results.push(GenerationRunResult {
                        template_id: template.invoice_id,
                        status: "success",
                        invoice_id: Some(generated.invoice.invoice_id),
                        invoice_number: Some(generated.invoice.invoice_number),
                        error_kind: None,
                        error: None,
                    });
                }
                Err(
                    e @ (RecurrenceError::RecurrenceExpired { .. }
                    | RecurrenceError::GenerationLimitReached { .. }),
                ) => {
                    let reason = match e {
                        RecurrenceError::GenerationLimitReached { .. } => {
                            TerminalReason::LimitReached
                        }
                        _ => TerminalReason::PastEndDate,
                    };
                    match self.retire_template(&template, reason).await {
                        Ok(_) => {
                            summary.retired += 1;
                            summary.results.push(GenerationRunResult {
                                template_id: template.invoice_id,
                                status: "retired",
                                invoice_id: None,
                                invoice_number: None,
                                error_kind: Some(e.kind()),
                                error: Some(e.to_string()),
                            });
                        }
                        Err(retire_err) => {
                            summary.failed += 1;
                            warn!(
                                template_id = %template.invoice_id,
                                error = %retire_err,
                                "Failed to retire template during run"
                            );
                            summary.results.push(GenerationRunResult {
                                template_id: template.invoice_id,
                                status: "failed",
                                invoice_id: None,
                                invoice_number: None,
                                error_kind: Some(retire_err.kind()),
                                error: Some(retire_err.to_string()),
                            });
                        }
                    }
                }
                Err(e) => {
                    summary.failed += 1;
                    warn!(
                        template_id = %template.invoice_id,
                        error = %e,
                        "Template generation failed during run"
                    );
                    summary.results.push(GenerationRunResult {
                        template_id: template.invoice_id,
                        status: "failed",
                        invoice_id: None,
                        invoice_number: None,
                        error_kind: Some(e.kind()),
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        info!(
            processed = summary.processed,
            succeeded = summary.succeeded,
            retired = summary.retired,
            failed = summary.failed,
            "Recurring generation run completed"
        );

        Ok(summary)
    }
}
