//! `billrun-core` — domain building blocks shared by the billing crates.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod error;
pub mod id;
pub mod value_object;

pub use error::DomainError;
pub use id::{CustomerId, CycleId, InvoiceId};
pub use value_object::{Currency, Money};
