mod seed;

use std::sync::Arc;

use anyhow::Context;

use billrun_billing::{BillingConfig, BillingScheduler, BillingService, InvoiceService};
use billrun_infra::InMemoryInvoiceStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    billrun_observability::init();

    let config = BillingConfig::from_env().context("invalid billing configuration")?;
    let seed_config = seed::SeedConfig::from_env().context("invalid seed configuration")?;

    let store = InMemoryInvoiceStore::arc();
    let provider = seed::populate(&store, &seed_config).context("failed to seed invoice store")?;

    let service = BillingService::new(Arc::new(provider), InvoiceService::new(store));
    let scheduler = Arc::new(
        BillingScheduler::new(service, config).context("invalid billing configuration")?,
    );
    scheduler
        .start()
        .context("failed to start billing scheduler")?;

    tracing::info!(
        interval_secs = scheduler.config().interval.as_secs(),
        "billing processor running; press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("shutdown requested");

    let stopping = Arc::clone(&scheduler);
    tokio::task::spawn_blocking(move || stopping.stop())
        .await
        .context("billing scheduler shutdown task failed")?;

    println!("{}", serde_json::to_string_pretty(&scheduler.stats())?);
    Ok(())
}
