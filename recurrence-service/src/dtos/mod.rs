pub mod invoices;
pub mod recurrence;

pub use invoices::{
    CreateInvoiceRequest, InvoiceResponse, LineItemRequest, OccurrencesParams,
    OccurrencesResponse,
};
pub use recurrence::{DueTemplatesResponse, RunParams};
