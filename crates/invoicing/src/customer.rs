use serde::{Deserialize, Serialize};

use billrun_core::{Currency, CustomerId};

/// A customer account. Invoices for the customer are expected in `currency`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub currency: Currency,
}

impl Customer {
    pub fn new(id: CustomerId, currency: Currency) -> Self {
        Self { id, currency }
    }
}
