//! Invoice accessor: the billing processor's only way to read or write invoices.

use chrono::{DateTime, Utc};

use billrun_core::InvoiceId;
use billrun_infra::{InvoiceStore, StoreError};
use billrun_invoicing::{Invoice, InvoiceStatus};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvoiceError {
    #[error("invoice {0} not found")]
    InvoiceNotFound(InvoiceId),
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for InvoiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvoiceNotFound(id) => InvoiceError::InvoiceNotFound(id),
            other => InvoiceError::Store(other),
        }
    }
}

/// Pass-through accessor over an invoice store.
#[derive(Debug, Clone)]
pub struct InvoiceService<S> {
    store: S,
}

impl<S: InvoiceStore> InvoiceService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn fetch_all(&self) -> Result<Vec<Invoice>, InvoiceError> {
        Ok(self.store.fetch_invoices()?)
    }

    pub fn fetch(&self, id: InvoiceId) -> Result<Invoice, InvoiceError> {
        self.store
            .fetch_invoice(id)?
            .ok_or(InvoiceError::InvoiceNotFound(id))
    }

    /// Invoices due now.
    pub fn fetch_due(&self) -> Result<Vec<Invoice>, InvoiceError> {
        self.fetch_due_at(Utc::now())
    }

    pub fn fetch_due_at(&self, now: DateTime<Utc>) -> Result<Vec<Invoice>, InvoiceError> {
        Ok(self.store.fetch_due_invoices(now)?)
    }

    /// Overwrite the status unconditionally.
    pub fn set_status(&self, id: InvoiceId, status: InvoiceStatus) -> Result<(), InvoiceError> {
        Ok(self.store.set_invoice_status(id, status)?)
    }

    pub fn mark_paid(&self, invoice: &Invoice) -> Result<(), InvoiceError> {
        self.set_status(invoice.id, InvoiceStatus::Paid)
    }

    pub fn mark_rejected(&self, invoice: &Invoice) -> Result<(), InvoiceError> {
        self.set_status(invoice.id, InvoiceStatus::PaymentRejected)
    }

    pub fn mark_errored(&self, invoice: &Invoice) -> Result<(), InvoiceError> {
        self.set_status(invoice.id, InvoiceStatus::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use billrun_core::{Currency, CustomerId, Money};
    use billrun_infra::InMemoryInvoiceStore;
    use chrono::Duration;
    use rust_decimal::Decimal;
    use std::sync::Arc;

    fn service() -> (InvoiceService<Arc<InMemoryInvoiceStore>>, Arc<InMemoryInvoiceStore>) {
        let store = InMemoryInvoiceStore::arc();
        (InvoiceService::new(store.clone()), store)
    }

    fn create(store: &InMemoryInvoiceStore, status: InvoiceStatus) -> Invoice {
        store
            .create_invoice(
                CustomerId::new(1),
                Money::new(Decimal::new(100, 0), Currency::Usd),
                status,
                Utc::now() - Duration::minutes(5),
            )
            .unwrap()
    }

    #[test]
    fn fetch_missing_invoice_is_not_found() {
        let (service, _) = service();
        assert_eq!(
            service.fetch(InvoiceId::new(12)).unwrap_err(),
            InvoiceError::InvoiceNotFound(InvoiceId::new(12))
        );
    }

    #[test]
    fn fetch_all_includes_every_status() {
        let (service, store) = service();
        create(&store, InvoiceStatus::Pending);
        create(&store, InvoiceStatus::Paid);
        create(&store, InvoiceStatus::Error);
        assert_eq!(service.fetch_all().unwrap().len(), 3);
        assert_eq!(service.fetch_due().unwrap().len(), 1);
    }

    #[test]
    fn mark_helpers_write_expected_status() {
        let (service, store) = service();
        let paid = create(&store, InvoiceStatus::Pending);
        let rejected = create(&store, InvoiceStatus::Pending);
        let errored = create(&store, InvoiceStatus::Pending);

        service.mark_paid(&paid).unwrap();
        service.mark_rejected(&rejected).unwrap();
        service.mark_errored(&errored).unwrap();

        assert_eq!(service.fetch(paid.id).unwrap().status, InvoiceStatus::Paid);
        assert_eq!(
            service.fetch(rejected.id).unwrap().status,
            InvoiceStatus::PaymentRejected
        );
        assert_eq!(service.fetch(errored.id).unwrap().status, InvoiceStatus::Error);
        assert!(service.fetch_due().unwrap().is_empty());
    }

    #[test]
    fn store_not_found_maps_to_invoice_not_found() {
        let (service, _) = service();
        let err = service
            .set_status(InvoiceId::new(4), InvoiceStatus::Paid)
            .unwrap_err();
        assert_eq!(err, InvoiceError::InvoiceNotFound(InvoiceId::new(4)));
    }
}
