//! Charging due invoices and recording the outcome.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use serde::Serialize;
use tracing::{error, info};

use billrun_infra::{ChargeError, ChargeOutcome, InvoiceStore, PaymentProvider};
use billrun_invoicing::{Invoice, InvoiceStatus};

use crate::invoices::{InvoiceError, InvoiceService};

/// What happened to one due invoice in a cycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Charged; status set to `PAID`.
    Paid,
    /// Declined by the provider; status set to `PAYMENT_REJECTED`.
    Rejected,
    /// Unrecoverable charge fault; status set to `ERROR`.
    Errored,
    /// Recoverable charge fault; status left `PENDING` for the next cycle.
    Deferred,
    /// Processing itself failed (status write error or panic); status as the store left it.
    Faulted,
}

impl Resolution {
    /// Classify a charge outcome.
    pub fn from_outcome(outcome: &ChargeOutcome) -> Self {
        match outcome {
            ChargeOutcome::Charged => Resolution::Paid,
            ChargeOutcome::Declined => Resolution::Rejected,
            ChargeOutcome::Failed(err) if err.is_recoverable() => Resolution::Deferred,
            ChargeOutcome::Failed(_) => Resolution::Errored,
        }
    }

    /// Status to write, if any.
    pub fn target_status(&self) -> Option<InvoiceStatus> {
        match self {
            Resolution::Paid => Some(InvoiceStatus::Paid),
            Resolution::Rejected => Some(InvoiceStatus::PaymentRejected),
            Resolution::Errored => Some(InvoiceStatus::Error),
            Resolution::Deferred | Resolution::Faulted => None,
        }
    }
}

/// Summary of one `process_invoices` pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub due: usize,
    pub paid: usize,
    pub rejected: usize,
    pub errored: usize,
    pub deferred: usize,
    pub faulted: usize,
    /// Due invoices could not be fetched; nothing was charged.
    pub fetch_failed: bool,
}

impl CycleReport {
    fn fetch_failed() -> Self {
        Self {
            fetch_failed: true,
            ..Self::default()
        }
    }

    pub fn record(&mut self, resolution: Resolution) {
        match resolution {
            Resolution::Paid => self.paid += 1,
            Resolution::Rejected => self.rejected += 1,
            Resolution::Errored => self.errored += 1,
            Resolution::Deferred => self.deferred += 1,
            Resolution::Faulted => self.faulted += 1,
        }
    }

    pub fn processed(&self) -> usize {
        self.paid + self.rejected + self.errored + self.deferred + self.faulted
    }
}

/// Charges due invoices through a payment provider and records the outcome
/// through the invoice accessor.
pub struct BillingService<P, S> {
    provider: P,
    invoices: InvoiceService<S>,
}

impl<P, S> BillingService<P, S>
where
    P: PaymentProvider,
    S: InvoiceStore,
{
    pub fn new(provider: P, invoices: InvoiceService<S>) -> Self {
        Self { provider, invoices }
    }

    pub fn invoices(&self) -> &InvoiceService<S> {
        &self.invoices
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// One pass over all due invoices.
    ///
    /// Each invoice is handled in isolation: a fault or panic while processing
    /// one invoice is logged and counted, and the pass moves on to the next.
    pub fn process_invoices(&self) -> CycleReport {
        let invoices = match self.invoices.fetch_due() {
            Ok(invoices) => invoices,
            Err(err) => {
                error!(error = %err, "failed to fetch due invoices");
                return CycleReport::fetch_failed();
            }
        };

        if invoices.is_empty() {
            return CycleReport::default();
        }

        info!(count = invoices.len(), "processing due invoices");

        let mut report = CycleReport {
            due: invoices.len(),
            ..CycleReport::default()
        };

        for invoice in &invoices {
            let resolution =
                match panic::catch_unwind(AssertUnwindSafe(|| self.process_invoice(invoice))) {
                    Ok(resolution) => resolution,
                    Err(payload) => {
                        error!(
                            invoice_id = %invoice.id,
                            panic = %panic_message(payload.as_ref()),
                            "unexpected failure while processing invoice"
                        );
                        Resolution::Faulted
                    }
                };
            report.record(resolution);
        }

        info!(
            due = report.due,
            paid = report.paid,
            rejected = report.rejected,
            errored = report.errored,
            deferred = report.deferred,
            faulted = report.faulted,
            "finished processing due invoices"
        );

        report
    }

    /// Charge a single invoice and record the outcome.
    ///
    /// Exactly one charge attempt; at most one status write.
    pub fn process_invoice(&self, invoice: &Invoice) -> Resolution {
        let outcome = self.provider.charge(invoice);
        log_outcome(invoice, &outcome);

        let resolution = Resolution::from_outcome(&outcome);
        let written = match resolution {
            Resolution::Paid => self.invoices.mark_paid(invoice),
            Resolution::Rejected => self.invoices.mark_rejected(invoice),
            Resolution::Errored => self.invoices.mark_errored(invoice),
            Resolution::Deferred | Resolution::Faulted => return resolution,
        };

        match written {
            Ok(()) => resolution,
            Err(err) => {
                log_write_failure(invoice, resolution, &err);
                Resolution::Faulted
            }
        }
    }
}

fn log_outcome(invoice: &Invoice, outcome: &ChargeOutcome) {
    match outcome {
        ChargeOutcome::Charged => {
            info!(invoice_id = %invoice.id, amount = %invoice.amount, "invoice paid");
        }
        ChargeOutcome::Declined => {
            info!(invoice_id = %invoice.id, "invoice rejected by payment provider");
        }
        ChargeOutcome::Failed(err @ ChargeError::CustomerNotFound { .. }) => {
            error!(
                invoice_id = %invoice.id,
                customer_id = %invoice.customer_id,
                error = %err,
                "attempt to charge invoice with unknown customer"
            );
        }
        ChargeOutcome::Failed(err @ ChargeError::CurrencyMismatch { .. }) => {
            error!(
                invoice_id = %invoice.id,
                customer_id = %invoice.customer_id,
                currency = %invoice.amount.currency(),
                error = %err,
                "attempt to charge invoice with a mismatching currency"
            );
        }
        ChargeOutcome::Failed(err) => {
            error!(
                invoice_id = %invoice.id,
                error = %err,
                "charge attempt failed, invoice stays pending"
            );
        }
    }
}

fn log_write_failure(invoice: &Invoice, resolution: Resolution, err: &InvoiceError) {
    error!(
        invoice_id = %invoice.id,
        resolution = ?resolution,
        error = %err,
        "failed to record invoice status"
    );
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
