//! Demo data for local runs: customers, invoices and matching provider accounts.
//!
//! Everything is derived from the customer/invoice index so repeated runs
//! produce the same data set.

use std::env;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use tracing::info;

use billrun_core::{Currency, Money};
use billrun_infra::{CustomerAccount, InvoiceStore, SimulatedPaymentProvider, StoreError};
use billrun_invoicing::InvoiceStatus;

pub const ENV_SEED_CUSTOMERS: &str = "SEED_CUSTOMERS";
pub const ENV_SEED_INVOICES_PER_CUSTOMER: &str = "SEED_INVOICES_PER_CUSTOMER";
pub const ENV_PROVIDER_NETWORK_FAULT_EVERY: &str = "PROVIDER_NETWORK_FAULT_EVERY";

/// Every n-th customer is never registered with the provider.
const UNREGISTERED_EVERY: usize = 13;
/// Every n-th customer gets its pending invoice in a foreign currency.
const FOREIGN_CURRENCY_EVERY: usize = 7;
/// Historical invoices older than this share the oldest due date.
const MAX_HISTORY_MONTHS: usize = 1_200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedConfig {
    pub customers: usize,
    pub invoices_per_customer: usize,
    /// Inject a network fault every n-th charge attempt (0 disables).
    pub network_fault_every: u64,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            customers: 100,
            invoices_per_customer: 10,
            network_fault_every: 0,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid value {value:?} for {key}: {reason}")]
pub struct SeedConfigError {
    key: &'static str,
    value: String,
    reason: &'static str,
}

impl SeedConfig {
    pub fn from_env() -> Result<Self, SeedConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as `from_env`, reading values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SeedConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            customers: parse_var(&lookup, ENV_SEED_CUSTOMERS, defaults.customers)?,
            invoices_per_customer: parse_var(
                &lookup,
                ENV_SEED_INVOICES_PER_CUSTOMER,
                defaults.invoices_per_customer,
            )?,
            network_fault_every: parse_var(
                &lookup,
                ENV_PROVIDER_NETWORK_FAULT_EVERY,
                defaults.network_fault_every,
            )?,
        };

        if config.total_invoices().is_none() {
            return Err(SeedConfigError {
                key: ENV_SEED_INVOICES_PER_CUSTOMER,
                value: config.invoices_per_customer.to_string(),
                reason: "total invoice count overflows",
            });
        }
        Ok(config)
    }

    /// `customers * invoices_per_customer`, or `None` on overflow.
    pub fn total_invoices(&self) -> Option<usize> {
        self.customers.checked_mul(self.invoices_per_customer)
    }
}

fn parse_var<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, SeedConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(value) => value.trim().parse().map_err(|_| SeedConfigError {
            key,
            value,
            reason: "expected a non-negative integer",
        }),
        None => Ok(default),
    }
}

/// Populate `store` and return a provider holding accounts for the seeded customers.
///
/// Per customer: the first invoice is `PENDING` and past due, the rest are
/// historical `PAID` invoices.
pub fn populate<S: InvoiceStore>(
    store: &S,
    config: &SeedConfig,
) -> Result<SimulatedPaymentProvider, StoreError> {
    let provider =
        SimulatedPaymentProvider::new().with_network_fault_every(config.network_fault_every);
    let now = Utc::now();
    let mut seeded = 0usize;

    for i in 0..config.customers {
        let currency = Currency::ALL[i % Currency::ALL.len()];
        let customer = store.create_customer(currency)?;

        for n in 0..config.invoices_per_customer {
            let pending = n == 0;
            let foreign = pending && i % FOREIGN_CURRENCY_EVERY == FOREIGN_CURRENCY_EVERY - 1;
            let invoice_currency = if foreign {
                Currency::ALL[(i + 1) % Currency::ALL.len()]
            } else {
                currency
            };
            let amount = Money::try_new(Decimal::new(amount_cents(i, n), 2), invoice_currency)?;
            let (status, due_date) = if pending {
                (InvoiceStatus::Pending, now - Duration::hours(1))
            } else {
                let months_back = n.min(MAX_HISTORY_MONTHS) as i64;
                (InvoiceStatus::Paid, now - Duration::days(30 * months_back))
            };
            store.create_invoice(customer.id, amount, status, due_date)?;
            seeded += 1;
        }

        if i % UNREGISTERED_EVERY != UNREGISTERED_EVERY - 1 {
            provider.open_account(
                customer.id,
                CustomerAccount::new(Money::try_new(
                    Decimal::new(balance_cents(i), 2),
                    currency,
                )?),
            );
        }
    }

    info!(
        customers = config.customers,
        invoices = seeded,
        "seeded invoice store"
    );
    Ok(provider)
}

/// Between 10.00 and 500.00.
fn amount_cents(customer: usize, invoice: usize) -> i64 {
    (1_000 + (customer * 3_701 + invoice * 5_303) % 49_001) as i64
}

/// Roughly one customer in five cannot cover a pending invoice.
fn balance_cents(customer: usize) -> i64 {
    if customer % 5 == 2 {
        500
    } else {
        100_000
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use billrun_infra::InMemoryInvoiceStore;

    #[test]
    fn seeds_one_pending_invoice_per_customer() {
        let store = InMemoryInvoiceStore::new();
        let config = SeedConfig {
            customers: 20,
            invoices_per_customer: 3,
            network_fault_every: 0,
        };
        populate(&store, &config).unwrap();

        assert_eq!(store.fetch_customers().unwrap().len(), 20);
        assert_eq!(store.fetch_invoices().unwrap().len(), 60);
        assert_eq!(store.fetch_due_invoices(Utc::now()).unwrap().len(), 20);
    }

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: Vec<(String, String)> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
    }

    #[test]
    fn seed_config_reads_overrides() {
        let config = SeedConfig::from_lookup(lookup(&[
            (ENV_SEED_CUSTOMERS, "3"),
            (ENV_SEED_INVOICES_PER_CUSTOMER, " 2 "),
            (ENV_PROVIDER_NETWORK_FAULT_EVERY, ""),
        ]))
        .unwrap();
        assert_eq!(config.customers, 3);
        assert_eq!(config.invoices_per_customer, 2);
        assert_eq!(config.network_fault_every, 0);
        assert_eq!(config.total_invoices(), Some(6));
    }

    #[test]
    fn seed_config_rejects_overflowing_totals() {
        let huge = usize::MAX.to_string();
        let err = SeedConfig::from_lookup(lookup(&[
            (ENV_SEED_CUSTOMERS, huge.as_str()),
            (ENV_SEED_INVOICES_PER_CUSTOMER, "2"),
        ]))
        .unwrap_err();
        assert_eq!(err.key, ENV_SEED_INVOICES_PER_CUSTOMER);
    }

    #[test]
    fn seed_config_rejects_garbage() {
        let err = SeedConfig::from_lookup(lookup(&[(ENV_SEED_CUSTOMERS, "lots")])).unwrap_err();
        assert_eq!(err.key, ENV_SEED_CUSTOMERS);
        assert_eq!(err.value, "lots");
    }

    #[test]
    fn amounts_stay_in_range() {
        for customer in 0..200 {
            for invoice in 0..10 {
                let cents = amount_cents(customer, invoice);
                assert!((1_000..=50_000).contains(&cents));
            }
        }
    }

    #[test]
    fn some_customers_are_unregistered() {
        let store = InMemoryInvoiceStore::new();
        let config = SeedConfig {
            customers: UNREGISTERED_EVERY,
            invoices_per_customer: 1,
            network_fault_every: 0,
        };
        let provider = populate(&store, &config).unwrap();
        let customers = store.fetch_customers().unwrap();

        assert!(provider.balance(customers[0].id).is_some());
        assert!(provider.balance(customers[UNREGISTERED_EVERY - 1].id).is_none());
    }
}
