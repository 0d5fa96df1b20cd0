//! Recurring billing: charge due invoices on a fixed schedule.
//!
//! ## Components
//!
//! - `InvoiceService`: accessor over an `InvoiceStore` (fetch + status writes)
//! - `BillingService`: one charge attempt per due invoice, outcome -> status
//! - `BillingScheduler`: background worker running `process_invoices` at a fixed rate
//! - `BillingConfig`: interval and worker settings, loadable from env
//!
//! ## Retry model
//!
//! `PENDING` is the only retryable status. A recoverable provider fault leaves
//! the invoice `PENDING`, so the next cycle charges it again. There is no retry
//! counter and no backoff: retries continue every cycle until the invoice
//! reaches a terminal status.

pub mod config;
pub mod invoices;
pub mod scheduler;
pub mod service;

pub use config::{BillingConfig, ConfigError};
pub use invoices::{InvoiceError, InvoiceService};
pub use scheduler::{BillingScheduler, SchedulerStats};
pub use service::{BillingService, CycleReport, Resolution};
