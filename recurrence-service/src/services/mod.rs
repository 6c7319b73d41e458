//! Services module for recurrence-service.

pub mod database;
pub mod memory;
pub mod metrics;
pub mod store;

pub use database::Database;
pub use memory::MemoryStore;
pub use metrics::{
    get_metrics, init_metrics, record_error, record_generation, record_http_request,
    record_template_terminated,
};
pub use store::InvoiceStore;
