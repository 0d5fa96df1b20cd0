//! Invoice storage abstraction and implementations.
//!
//! The store is a plain data access layer: it filters and overwrites, it does
//! not decide anything. Status writes are unconditional and independent per
//! invoice; there is no multi-invoice transaction.

pub mod in_memory;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use billrun_core::{Currency, CustomerId, DomainError, InvoiceId, Money};
use billrun_invoicing::{Customer, Invoice, InvoiceStatus};

pub use in_memory::InMemoryInvoiceStore;

/// Invoice store abstraction.
pub trait InvoiceStore: Send + Sync {
    /// All invoices, any status.
    fn fetch_invoices(&self) -> Result<Vec<Invoice>, StoreError>;

    /// A single invoice, or `None` when no record matches.
    fn fetch_invoice(&self, id: InvoiceId) -> Result<Option<Invoice>, StoreError>;

    /// Pending invoices whose due date is at or before `now`.
    fn fetch_due_invoices(&self, now: DateTime<Utc>) -> Result<Vec<Invoice>, StoreError>;

    /// Overwrite the status of an invoice.
    fn set_invoice_status(&self, id: InvoiceId, status: InvoiceStatus) -> Result<(), StoreError>;

    /// Insert a new invoice and return it with its assigned id.
    ///
    /// Negative amounts are rejected with `StoreError::Invalid`.
    fn create_invoice(
        &self,
        customer_id: CustomerId,
        amount: Money,
        status: InvoiceStatus,
        due_date: DateTime<Utc>,
    ) -> Result<Invoice, StoreError>;

    /// Insert a new customer and return it with its assigned id.
    fn create_customer(&self, currency: Currency) -> Result<Customer, StoreError>;

    /// All customers.
    fn fetch_customers(&self) -> Result<Vec<Customer>, StoreError>;
}

/// Invoice store error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("invoice not found: {0}")]
    InvoiceNotFound(InvoiceId),
    #[error(transparent)]
    Invalid(#[from] DomainError),
    #[error("storage error: {0}")]
    Storage(String),
}

impl<S> InvoiceStore for Arc<S>
where
    S: InvoiceStore + ?Sized,
{
    fn fetch_invoices(&self) -> Result<Vec<Invoice>, StoreError> {
        (**self).fetch_invoices()
    }

    fn fetch_invoice(&self, id: InvoiceId) -> Result<Option<Invoice>, StoreError> {
        (**self).fetch_invoice(id)
    }

    fn fetch_due_invoices(&self, now: DateTime<Utc>) -> Result<Vec<Invoice>, StoreError> {
        (**self).fetch_due_invoices(now)
    }

    fn set_invoice_status(&self, id: InvoiceId, status: InvoiceStatus) -> Result<(), StoreError> {
        (**self).set_invoice_status(id, status)
    }

    fn create_invoice(
        &self,
        customer_id: CustomerId,
        amount: Money,
        status: InvoiceStatus,
        due_date: DateTime<Utc>,
    ) -> Result<Invoice, StoreError> {
        (**self).create_invoice(customer_id, amount, status, due_date)
    }

    fn create_customer(&self, currency: Currency) -> Result<Customer, StoreError> {
        (**self).create_customer(currency)
    }

    fn fetch_customers(&self) -> Result<Vec<Customer>, StoreError> {
        (**self).fetch_customers()
    }
}
