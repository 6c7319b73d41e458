//! Recurring invoice engine: date math, eligibility and generation.

pub mod eligibility;
pub mod engine;
pub mod error;
pub mod plan;
pub mod schedule;

#[cfg(test)]
pub(crate) mod fixtures;

pub use eligibility::{check_eligibility, is_eligible_to_generate, TemplateState, TerminalReason};
pub use engine::{GenerationRunResult, GenerationRunSummary, RecurrenceEngine};
pub use error::RecurrenceError;
pub use plan::{
    build_generation_plan, GeneratedInvoice, GenerationPlan, NewInvoice, NewLineItem,
    TemplateUpdate,
};
pub use schedule::{compute_next_occurrence, days_in_month, due_date_for, PAYMENT_TERM_DAYS};
