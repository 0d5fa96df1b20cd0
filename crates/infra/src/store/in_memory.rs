//! In-memory invoice store for tests/dev.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use billrun_core::{Currency, CustomerId, InvoiceId, Money};
use billrun_invoicing::{Customer, Invoice, InvoiceStatus};

use super::{InvoiceStore, StoreError};

#[derive(Debug, Default)]
struct Tables {
    invoices: BTreeMap<InvoiceId, Invoice>,
    customers: BTreeMap<CustomerId, Customer>,
    next_invoice_id: i32,
    next_customer_id: i32,
}

/// In-memory invoice store. Ids are assigned sequentially starting at 1.
#[derive(Debug, Default)]
pub struct InMemoryInvoiceStore {
    tables: RwLock<Tables>,
}

impl InMemoryInvoiceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Insert (or replace) an invoice with a caller-chosen id.
    ///
    /// Keeps the id sequence ahead of the inserted id so later
    /// `create_invoice` calls never collide with it.
    pub fn insert_invoice(&self, invoice: Invoice) -> Result<(), StoreError> {
        invoice.amount.non_negative()?;
        let mut tables = self.write()?;
        tables.next_invoice_id = tables.next_invoice_id.max(invoice.id.value());
        tables.invoices.insert(invoice.id, invoice);
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Storage("invoice store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::Storage("invoice store lock poisoned".to_string()))
    }
}

fn next_id(last: i32, table: &str) -> Result<i32, StoreError> {
    last.checked_add(1)
        .ok_or_else(|| StoreError::Storage(format!("{table} id sequence exhausted")))
}

impl InvoiceStore for InMemoryInvoiceStore {
    fn fetch_invoices(&self) -> Result<Vec<Invoice>, StoreError> {
        Ok(self.read()?.invoices.values().cloned().collect())
    }

    fn fetch_invoice(&self, id: InvoiceId) -> Result<Option<Invoice>, StoreError> {
        Ok(self.read()?.invoices.get(&id).cloned())
    }

    fn fetch_due_invoices(&self, now: DateTime<Utc>) -> Result<Vec<Invoice>, StoreError> {
        Ok(self
            .read()?
            .invoices
            .values()
            .filter(|invoice| invoice.is_due(now))
            .cloned()
            .collect())
    }

    fn set_invoice_status(&self, id: InvoiceId, status: InvoiceStatus) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        let invoice = tables
            .invoices
            .get_mut(&id)
            .ok_or(StoreError::InvoiceNotFound(id))?;
        invoice.status = status;
        Ok(())
    }

    fn create_invoice(
        &self,
        customer_id: CustomerId,
        amount: Money,
        status: InvoiceStatus,
        due_date: DateTime<Utc>,
    ) -> Result<Invoice, StoreError> {
        let amount = amount.non_negative()?;
        let mut tables = self.write()?;
        tables.next_invoice_id = next_id(tables.next_invoice_id, "invoice")?;
        let invoice = Invoice::new(
            InvoiceId::new(tables.next_invoice_id),
            customer_id,
            amount,
            status,
            due_date,
        );
        tables.invoices.insert(invoice.id, invoice.clone());
        Ok(invoice)
    }

    fn create_customer(&self, currency: Currency) -> Result<Customer, StoreError> {
        let mut tables = self.write()?;
        tables.next_customer_id = next_id(tables.next_customer_id, "customer")?;
        let customer = Customer::new(CustomerId::new(tables.next_customer_id), currency);
        tables.customers.insert(customer.id, customer);
        Ok(customer)
    }

    fn fetch_customers(&self) -> Result<Vec<Customer>, StoreError> {
        Ok(self.read()?.customers.values().copied().collect())
    }
}
