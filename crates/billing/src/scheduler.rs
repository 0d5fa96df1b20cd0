//! Fixed-rate background scheduler for billing cycles.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, info_span};

use billrun_core::CycleId;
use billrun_infra::{InvoiceStore, PaymentProvider};

use crate::config::{BillingConfig, ConfigError};
use crate::service::{BillingService, CycleReport};

/// Scheduler runtime statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub cycles_run: u64,
    /// Cycles that could not fetch due invoices or panicked outside invoice handling.
    pub cycles_failed: u64,
    pub invoices_paid: u64,
    pub invoices_rejected: u64,
    pub invoices_errored: u64,
    pub invoices_deferred: u64,
    pub invoices_faulted: u64,
    pub last_report: Option<CycleReport>,
    pub last_cycle_at: Option<DateTime<Utc>>,
}

impl SchedulerStats {
    fn record(&mut self, report: Option<CycleReport>, at: DateTime<Utc>) {
        self.cycles_run += 1;
        self.last_cycle_at = Some(at);
        match report {
            Some(report) => {
                if report.fetch_failed {
                    self.cycles_failed += 1;
                }
                self.invoices_paid += report.paid as u64;
                self.invoices_rejected += report.rejected as u64;
                self.invoices_errored += report.errored as u64;
                self.invoices_deferred += report.deferred as u64;
                self.invoices_faulted += report.faulted as u64;
                self.last_report = Some(report);
            }
            None => {
                self.cycles_failed += 1;
                self.last_report = None;
            }
        }
    }
}

struct Worker {
    shutdown: mpsc::Sender<()>,
    join: thread::JoinHandle<()>,
}

/// Runs `BillingService::process_invoices` on a dedicated thread: once right
/// away, then once per `config.interval`.
///
/// Cycles never overlap. When a cycle takes longer than the interval, the next
/// one starts as soon as it finishes.
pub struct BillingScheduler<P, S> {
    service: Arc<BillingService<P, S>>,
    config: BillingConfig,
    started: AtomicBool,
    stopped: AtomicBool,
    worker: Mutex<Option<Worker>>,
    stats: Arc<Mutex<SchedulerStats>>,
}

impl<P, S> BillingScheduler<P, S>
where
    P: PaymentProvider + 'static,
    S: InvoiceStore + 'static,
{
    /// Fails when `config` does not validate (e.g. a zero interval).
    pub fn new(service: BillingService<P, S>, config: BillingConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            service: Arc::new(service),
            config,
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            worker: Mutex::new(None),
            stats: Arc::new(Mutex::new(SchedulerStats::default())),
        })
    }

    pub fn service(&self) -> &BillingService<P, S> {
        &self.service
    }

    pub fn config(&self) -> &BillingConfig {
        &self.config
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Spawn the worker thread.
    ///
    /// Returns `Ok(false)` without doing anything when the scheduler was
    /// already started or has been stopped.
    pub fn start(&self) -> io::Result<bool> {
        // Held until the worker is stored so a concurrent `stop` sees it.
        let mut slot = lock(&self.worker);
        if self.is_stopped() {
            debug!(worker = %self.config.worker_name, "billing scheduler is stopped");
            return Ok(false);
        }
        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!(worker = %self.config.worker_name, "billing scheduler already started");
            return Ok(false);
        }

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let service = Arc::clone(&self.service);
        let stats = Arc::clone(&self.stats);
        let config = self.config.clone();

        let spawned = thread::Builder::new()
            .name(config.worker_name.clone())
            .spawn(move || scheduler_loop(&*service, &config, &shutdown_rx, &*stats));

        match spawned {
            Ok(join) => {
                *slot = Some(Worker {
                    shutdown: shutdown_tx,
                    join,
                });
                Ok(true)
            }
            Err(err) => {
                self.started.store(false, Ordering::SeqCst);
                error!(
                    worker = %self.config.worker_name,
                    error = %err,
                    "failed to spawn billing scheduler"
                );
                Err(err)
            }
        }
    }

    /// Stop scheduling future cycles and wait for the worker to exit.
    ///
    /// A cycle in progress runs to completion first. The scheduler cannot be
    /// started afterwards, even when it was never running.
    pub fn stop(&self) {
        let worker = {
            let mut slot = lock(&self.worker);
            self.stopped.store(true, Ordering::SeqCst);
            slot.take()
        };
        let Some(worker) = worker else {
            return;
        };
        let _ = worker.shutdown.send(());
        if worker.join.join().is_err() {
            error!(worker = %self.config.worker_name, "billing scheduler thread panicked");
        }
    }

    /// Get current scheduler statistics.
    pub fn stats(&self) -> SchedulerStats {
        lock(&self.stats).clone()
    }
}

impl<P, S> Drop for BillingScheduler<P, S> {
    fn drop(&mut self) {
        let worker = match self.worker.get_mut() {
            Ok(worker) => worker.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(worker) = worker {
            let _ = worker.shutdown.send(());
            let _ = worker.join.join();
        }
    }
}

fn scheduler_loop<P, S>(
    service: &BillingService<P, S>,
    config: &BillingConfig,
    shutdown_rx: &mpsc::Receiver<()>,
    stats: &Mutex<SchedulerStats>,
) where
    P: PaymentProvider,
    S: InvoiceStore,
{
    info!(
        worker = %config.worker_name,
        interval_secs = config.interval.as_secs(),
        "billing scheduler started"
    );

    let mut next_run = Instant::now();
    loop {
        let wait = next_run.saturating_duration_since(Instant::now());
        match shutdown_rx.recv_timeout(wait) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }

        run_cycle(service, stats);

        let Some(scheduled) = next_run.checked_add(config.interval) else {
            // Interval beyond the clock's range: nothing more to schedule.
            let _ = shutdown_rx.recv();
            break;
        };
        next_run = scheduled.max(Instant::now());
    }

    info!(worker = %config.worker_name, "billing scheduler stopped");
}

fn run_cycle<P, S>(service: &BillingService<P, S>, stats: &Mutex<SchedulerStats>)
where
    P: PaymentProvider,
    S: InvoiceStore,
{
    let cycle_id = CycleId::new();
    let span = info_span!("billing_cycle", cycle_id = %cycle_id);
    let _entered = span.enter();

    let started = Instant::now();
    let report = match panic::catch_unwind(AssertUnwindSafe(|| service.process_invoices())) {
        Ok(report) => Some(report),
        Err(_) => {
            error!("billing cycle aborted by an unexpected panic");
            None
        }
    };

    debug!(elapsed_ms = started.elapsed().as_millis() as u64, "billing cycle done");
    lock(stats).record(report, Utc::now());
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
