//! Payment provider port.

use std::sync::Arc;

use billrun_core::{CustomerId, InvoiceId};
use billrun_invoicing::Invoice;

/// External payment capability: one charge attempt per call.
pub trait PaymentProvider: Send + Sync {
    /// Charge the customer account behind `invoice` for `invoice.amount`.
    fn charge(&self, invoice: &Invoice) -> ChargeOutcome;
}

impl<P> PaymentProvider for Arc<P>
where
    P: PaymentProvider + ?Sized,
{
    fn charge(&self, invoice: &Invoice) -> ChargeOutcome {
        (**self).charge(invoice)
    }
}

/// Result of one charge attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeOutcome {
    /// The account was debited.
    Charged,
    /// The provider completed the attempt and refused it (e.g. insufficient funds).
    Declined,
    /// The attempt did not complete.
    Failed(ChargeError),
}

impl From<Result<bool, ChargeError>> for ChargeOutcome {
    fn from(result: Result<bool, ChargeError>) -> Self {
        match result {
            Ok(true) => ChargeOutcome::Charged,
            Ok(false) => ChargeOutcome::Declined,
            Err(err) => ChargeOutcome::Failed(err),
        }
    }
}

/// Why a charge attempt did not complete.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChargeError {
    #[error("customer {customer_id} not found")]
    CustomerNotFound { customer_id: CustomerId },
    #[error("currency of invoice {invoice_id} does not match customer {customer_id}")]
    CurrencyMismatch {
        invoice_id: InvoiceId,
        customer_id: CustomerId,
    },
    #[error("network error: {0}")]
    Network(String),
    #[error("payment provider error: {0}")]
    Other(String),
}

impl ChargeError {
    /// Recoverable faults may clear up by themselves; retrying later makes sense.
    /// The rest need the invoice or customer data fixed first.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ChargeError::Network(_) | ChargeError::Other(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boolean_results_map_to_outcomes() {
        assert_eq!(ChargeOutcome::from(Ok(true)), ChargeOutcome::Charged);
        assert_eq!(ChargeOutcome::from(Ok(false)), ChargeOutcome::Declined);
        let err = ChargeError::Network("timeout".to_string());
        assert_eq!(
            ChargeOutcome::from(Err(err.clone())),
            ChargeOutcome::Failed(err)
        );
    }

    #[test]
    fn only_reference_and_currency_faults_are_unrecoverable() {
        assert!(
            !ChargeError::CustomerNotFound {
                customer_id: CustomerId::new(1)
            }
            .is_recoverable()
        );
        assert!(
            !ChargeError::CurrencyMismatch {
                invoice_id: InvoiceId::new(1),
                customer_id: CustomerId::new(1)
            }
            .is_recoverable()
        );
        assert!(ChargeError::Network("reset".to_string()).is_recoverable());
        assert!(ChargeError::Other("boom".to_string()).is_recoverable());
    }
}
