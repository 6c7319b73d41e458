//! Domain models for recurrence-service.

mod invoice;
mod line_item;
mod recurrence;

pub use invoice::{CreateInvoice, Invoice, InvoiceStatus, InvoiceTotals, ListInvoicesFilter};
pub use line_item::{CreateLineItem, LineItem};
pub use recurrence::{Cadence, Recurrence};
