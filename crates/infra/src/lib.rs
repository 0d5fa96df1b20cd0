//! Infrastructure layer: invoice storage and external payment services.

pub mod external;
pub mod store;

pub use external::{
    ChargeError, ChargeOutcome, CustomerAccount, PaymentProvider, SimulatedPaymentProvider,
};
pub use store::{InMemoryInvoiceStore, InvoiceStore, StoreError};
