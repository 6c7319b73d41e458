pub mod health;
pub mod invoices;
pub mod recurrence;

pub use health::{health_check, metrics_handler, readiness_check};
pub use invoices::{create_invoice, get_invoice, list_occurrences};
pub use recurrence::{generate_from_template, list_due_templates, run_due_generations};
