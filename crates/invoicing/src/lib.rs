//! Invoicing domain models.
//!
//! Invoices are created elsewhere; the billing processor only reads them and
//! moves them between statuses.

pub mod customer;
pub mod invoice;

pub use customer::Customer;
pub use invoice::{Invoice, InvoiceStatus};
