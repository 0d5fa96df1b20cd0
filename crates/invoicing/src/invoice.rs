use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use billrun_core::{CustomerId, InvoiceId, Money};

/// Invoice status lifecycle.
///
/// `Pending` is the only state the billing processor picks up. The other three
/// are terminal: an invoice that reaches them is never charged again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    /// Not yet paid (it may not be due yet).
    #[default]
    Pending,
    /// Charged successfully.
    Paid,
    /// The payment provider declined the charge, e.g. insufficient funds.
    PaymentRejected,
    /// Charging hit an unrecoverable fault (unknown customer, currency mismatch).
    Error,
}

impl InvoiceStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, InvoiceStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "PENDING",
            InvoiceStatus::Paid => "PAID",
            InvoiceStatus::PaymentRejected => "PAYMENT_REJECTED",
            InvoiceStatus::Error => "ERROR",
        }
    }
}

impl core::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An invoice as stored. Values are snapshots; status changes go through the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub customer_id: CustomerId,
    pub amount: Money,
    pub status: InvoiceStatus,
    pub due_date: DateTime<Utc>,
}

impl Invoice {
    pub fn new(
        id: InvoiceId,
        customer_id: CustomerId,
        amount: Money,
        status: InvoiceStatus,
        due_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            customer_id,
            amount,
            status,
            due_date,
        }
    }

    /// Pending and past its due date at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == InvoiceStatus::Pending && self.due_date <= now
    }
}
