//! Invoice numbering and invoice documents.

mod invoice;
mod invoice_number;
mod period;

pub use invoice::{Invoice, InvoiceStatus, LineItem, SupplierInfo};
pub use invoice_number::{InvoiceNumber, MAX_SEQUENCE};
pub use period::BillingPeriod;
