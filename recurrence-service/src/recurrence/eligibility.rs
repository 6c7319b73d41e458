//! Template eligibility and lifecycle state.

use crate::models::{Cadence, Invoice, Recurrence};
use crate::recurrence::RecurrenceError;
use chrono::NaiveDate;
use serde::Serialize;

/// Whether `template` may produce another occurrence on `now`.
pub fn is_eligible_to_generate(template: &Invoice, now: NaiveDate) -> bool {
    check_eligibility(template, now).is_ok()
}

/// Like [`is_eligible_to_generate`] but reports why a template is blocked.
///
/// Both bounds unset is a valid unlimited template, not a misconfiguration.
pub fn check_eligibility(template: &Invoice, now: NaiveDate) -> Result<Cadence, RecurrenceError> {
    let cadence = template
        .recurrence()
        .cadence()
        .ok_or(RecurrenceError::NotRecurring(template.invoice_id))?;

    if let Some(max_occurrences) = template.max_occurrences {
        if template.occurrences_count >= max_occurrences {
            return Err(RecurrenceError::GenerationLimitReached {
                template_id: template.invoice_id,
                occurrences_count: template.occurrences_count,
                max_occurrences,
            });
        }
    }

    if let Some(end_date) = template.end_date {
        if now > end_date {
            return Err(RecurrenceError::RecurrenceExpired {
                template_id: template.invoice_id,
                end_date,
            });
        }
    }

    Ok(cadence)
}

/// Why a template stopped recurring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalReason {
    LimitReached,
    PastEndDate,
}

impl TerminalReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminalReason::LimitReached => "limit_reached",
            TerminalReason::PastEndDate => "past_end_date",
        }
    }
}

/// Lifecycle position of an invoice row seen as a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TemplateState {
    /// One-shot from creation, or an occurrence generated from a template.
    NotRecurring,
    /// `remaining` is `None` for unlimited templates.
    Active { remaining: Option<u32> },
    Terminal { reason: TerminalReason },
}

impl TemplateState {
    pub fn of(invoice: &Invoice, today: NaiveDate) -> Self {
        let limit_reached = invoice
            .max_occurrences
            .is_some_and(|max| invoice.occurrences_count >= max);

        match invoice.recurrence() {
            Recurrence::OneShot => {
                // A retired template keeps its end date or its count.
                let was_template = invoice.occurrences_count > 0 || invoice.end_date.is_some();
                if invoice.parent_invoice_id.is_some() || !was_template {
                    TemplateState::NotRecurring
                } else if limit_reached {
                    TemplateState::Terminal {
                        reason: TerminalReason::LimitReached,
                    }
                } else {
                    TemplateState::Terminal {
                        reason: TerminalReason::PastEndDate,
                    }
                }
            }
            Recurrence::Recurring(_) => {
                if limit_reached {
                    TemplateState::Terminal {
                        reason: TerminalReason::LimitReached,
                    }
                } else if invoice.end_date.is_some_and(|end| today > end) {
                    TemplateState::Terminal {
                        reason: TerminalReason::PastEndDate,
                    }
                } else {
                    let remaining = invoice.max_occurrences.map(|max| {
                        u32::try_from(max - invoice.occurrences_count).unwrap_or_default()
                    });
                    TemplateState::Active { remaining }
                }
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TemplateState::Terminal { .. })
    }
}
