//! Simulated payment provider for local runs and tests.
//!
//! Keeps a balance per customer account and debits it on successful charges.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use rust_decimal::Decimal;
use tracing::debug;

use billrun_core::{CustomerId, Money};
use billrun_invoicing::Invoice;

use super::payment::{ChargeError, ChargeOutcome, PaymentProvider};

/// Account held by the simulated provider. The balance currency is the
/// account currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CustomerAccount {
    pub balance: Money,
}

impl CustomerAccount {
    pub fn new(balance: Money) -> Self {
        Self { balance }
    }
}

/// In-process payment provider.
///
/// - unknown customer: `CustomerNotFound`
/// - invoice currency differs from the account currency: `CurrencyMismatch`
/// - negative amount, or balance below the invoice amount: `Declined`
/// - otherwise the balance is debited: `Charged`
///
/// With `with_network_fault_every(n)`, every n-th attempt fails with a
/// `Network` fault before any of the checks above.
#[derive(Debug, Default)]
pub struct SimulatedPaymentProvider {
    accounts: Mutex<HashMap<CustomerId, CustomerAccount>>,
    network_fault_every: Option<u64>,
    attempts: AtomicU64,
}

impl SimulatedPaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(self, customer_id: CustomerId, account: CustomerAccount) -> Self {
        self.open_account(customer_id, account);
        self
    }

    pub fn with_network_fault_every(mut self, n: u64) -> Self {
        self.network_fault_every = (n > 0).then_some(n);
        self
    }

    /// Open or replace a customer account.
    pub fn open_account(&self, customer_id: CustomerId, account: CustomerAccount) {
        let mut accounts = self
            .accounts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        accounts.insert(customer_id, account);
    }

    pub fn balance(&self, customer_id: CustomerId) -> Option<Decimal> {
        let accounts = self
            .accounts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        accounts.get(&customer_id).map(|a| a.balance.value())
    }

    /// Number of charge attempts seen so far.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl PaymentProvider for SimulatedPaymentProvider {
    fn charge(&self, invoice: &Invoice) -> ChargeOutcome {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(n) = self.network_fault_every {
            if attempt % n == 0 {
                return ChargeOutcome::Failed(ChargeError::Network(format!(
                    "simulated connection reset on attempt {attempt}"
                )));
            }
        }

        let mut accounts = self
            .accounts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(account) = accounts.get_mut(&invoice.customer_id) else {
            return ChargeOutcome::Failed(ChargeError::CustomerNotFound {
                customer_id: invoice.customer_id,
            });
        };

        if !account.balance.same_currency(&invoice.amount) {
            return ChargeOutcome::Failed(ChargeError::CurrencyMismatch {
                invoice_id: invoice.id,
                customer_id: invoice.customer_id,
            });
        }

        if invoice.amount.is_negative() {
            debug!(
                invoice_id = %invoice.id,
                amount = %invoice.amount,
                "refusing to charge a negative amount"
            );
            return ChargeOutcome::Declined;
        }

        match account.balance.checked_sub(&invoice.amount) {
            Some(remaining) if !remaining.is_negative() => {
                account.balance = remaining;
                ChargeOutcome::Charged
            }
            _ => {
                debug!(
                    invoice_id = %invoice.id,
                    customer_id = %invoice.customer_id,
                    balance = %account.balance,
                    amount = %invoice.amount,
                    "insufficient funds"
                );
                ChargeOutcome::Declined
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use billrun_core::{Currency, InvoiceId};
    use billrun_invoicing::InvoiceStatus;
    use chrono::Utc;

    fn invoice(id: i32, customer: i32, amount: i64, currency: Currency) -> Invoice {
        Invoice::new(
            InvoiceId::new(id),
            CustomerId::new(customer),
            Money::new(Decimal::new(amount, 0), currency),
            InvoiceStatus::Pending,
            Utc::now(),
        )
    }

    fn account(currency: Currency, balance: i64) -> CustomerAccount {
        CustomerAccount::new(Money::new(Decimal::new(balance, 0), currency))
    }

    #[test]
    fn charges_and_debits_balance() {
        let provider = SimulatedPaymentProvider::new()
            .with_account(CustomerId::new(1), account(Currency::Usd, 150));

        let outcome = provider.charge(&invoice(1, 1, 100, Currency::Usd));
        assert_eq!(outcome, ChargeOutcome::Charged);
        assert_eq!(provider.balance(CustomerId::new(1)), Some(Decimal::new(50, 0)));
    }

    #[test]
    fn declines_when_funds_are_insufficient() {
        let provider = SimulatedPaymentProvider::new()
            .with_account(CustomerId::new(1), account(Currency::Usd, 50));

        let outcome = provider.charge(&invoice(1, 1, 100, Currency::Usd));
        assert_eq!(outcome, ChargeOutcome::Declined);
        assert_eq!(provider.balance(CustomerId::new(1)), Some(Decimal::new(50, 0)));
    }

    #[test]
    fn charging_the_exact_balance_empties_the_account() {
        let provider = SimulatedPaymentProvider::new()
            .with_account(CustomerId::new(1), account(Currency::Usd, 100));

        assert_eq!(provider.charge(&invoice(1, 1, 100, Currency::Usd)), ChargeOutcome::Charged);
        assert_eq!(provider.balance(CustomerId::new(1)), Some(Decimal::ZERO));
    }

    #[test]
    fn negative_amounts_never_credit_the_account() {
        let provider = SimulatedPaymentProvider::new()
            .with_account(CustomerId::new(1), account(Currency::Usd, 100));

        let outcome = provider.charge(&invoice(1, 1, -50, Currency::Usd));
        assert_eq!(outcome, ChargeOutcome::Declined);
        assert_eq!(provider.balance(CustomerId::new(1)), Some(Decimal::new(100, 0)));
    }

    #[test]
    fn unknown_customer_fails() {
        let provider = SimulatedPaymentProvider::new();
        let outcome = provider.charge(&invoice(3, 42, 100, Currency::Usd));
        assert_eq!(
            outcome,
            ChargeOutcome::Failed(ChargeError::CustomerNotFound {
                customer_id: CustomerId::new(42)
            })
        );
    }

    #[test]
    fn currency_mismatch_fails_without_debit() {
        let provider = SimulatedPaymentProvider::new()
            .with_account(CustomerId::new(1), account(Currency::Eur, 500));

        let outcome = provider.charge(&invoice(7, 1, 100, Currency::Usd));
        assert_eq!(
            outcome,
            ChargeOutcome::Failed(ChargeError::CurrencyMismatch {
                invoice_id: InvoiceId::new(7),
                customer_id: CustomerId::new(1)
            })
        );
        assert_eq!(provider.balance(CustomerId::new(1)), Some(Decimal::new(500, 0)));
    }

    #[test]
    fn injects_network_faults_on_schedule() {
        let provider = SimulatedPaymentProvider::new()
            .with_account(CustomerId::new(1), account(Currency::Usd, 1_000))
            .with_network_fault_every(2);

        let inv = invoice(1, 1, 1, Currency::Usd);
        assert_eq!(provider.charge(&inv), ChargeOutcome::Charged);
        assert!(matches!(
            provider.charge(&inv),
            ChargeOutcome::Failed(ChargeError::Network(_))
        ));
        assert_eq!(provider.charge(&inv), ChargeOutcome::Charged);
        assert_eq!(provider.attempts(), 3);
    }
}
