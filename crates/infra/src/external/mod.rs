//! External service clients/adapters.

pub mod payment;
pub mod simulated;

pub use payment::{ChargeError, ChargeOutcome, PaymentProvider};
pub use simulated::{CustomerAccount, SimulatedPaymentProvider};
