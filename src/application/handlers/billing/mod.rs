//! Invoice issuance and counter administration.

pub mod counter_admin;
pub mod issue_invoice;

pub use counter_admin::CounterAdminHandler;
pub use issue_invoice::IssueInvoiceHandler;
