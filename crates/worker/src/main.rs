//! BookshelfAI Background Worker
//!
//! Handles scheduled jobs including:
//! - Monthly credit reset for lapsed accounts (daily at 00:10 UTC)
//! - Webhook and audit record retention cleanup (daily at 3:00 AM UTC)
//! - Health check heartbeat (every 5 minutes)

use std::sync::Arc;
use std::time::Duration;

use bookshelf_billing::BillingService;
use bookshelf_shared::create_pool;
use time::OffsetDateTime;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

/// Days of processed-webhook and billing-event history to keep.
const RETENTION_DAYS: i32 = 180;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    info!("Starting BookshelfAI Worker");

    let database_url =
        std::env::var("DATABASE_URL").map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;
    let pool = create_pool(&database_url).await?;

    let billing = Arc::new(BillingService::from_env(pool.clone()));

    // Create scheduler
    let scheduler = JobScheduler::new().await?;

    // Job 1: Monthly credit reset (daily at 00:10 UTC)
    // Selects every ledger entry whose reset_date has lapsed, restores it to
    // the plan limit and advances the date. Running it again in the same
    // window selects nothing, so an overlapping trigger is harmless.
    let reset_billing = billing.clone();
    scheduler
        .add(Job::new_async("0 10 0 * * *", move |_uuid, _l| {
            let billing = reset_billing.clone();
            Box::pin(async move {
                info!("Running monthly credit reset job");
                match billing.reset.run_reset(OffsetDateTime::now_utc()).await {
                    Ok(summary) => {
                        info!(reset_count = summary.reset_count, "Credit reset cycle complete")
                    }
                    Err(e) => error!(error = %e, "Credit reset cycle failed"),
                }
            })
        })?)
        .await?;
    info!("Scheduled: Monthly credit reset (daily at 00:10 UTC)");

    // Job 2: Retention cleanup (daily at 3:00 AM UTC)
    // The dedup log only needs to cover the provider's retry horizon; audit
    // events follow the same retention.
    let cleanup_pool = pool.clone();
    scheduler
        .add(Job::new_async("0 0 3 * * *", move |_uuid, _l| {
            let pool = cleanup_pool.clone();
            Box::pin(async move {
                info!("Running retention cleanup job");

                let webhooks = sqlx::query(
                    "DELETE FROM processed_webhooks
                     WHERE processed_at < NOW() - ($1 || ' days')::INTERVAL",
                )
                .bind(RETENTION_DAYS)
                .execute(&pool)
                .await;

                match webhooks {
                    Ok(r) => info!(deleted = r.rows_affected(), "Webhook record cleanup complete"),
                    Err(e) => error!(error = %e, "Webhook record cleanup failed"),
                }

                let events = sqlx::query(
                    "DELETE FROM billing_events
                     WHERE created_at < NOW() - ($1 || ' days')::INTERVAL",
                )
                .bind(RETENTION_DAYS)
                .execute(&pool)
                .await;

                match events {
                    Ok(r) => info!(deleted = r.rows_affected(), "Billing event cleanup complete"),
                    Err(e) => error!(error = %e, "Billing event cleanup failed"),
                }
            })
        })?)
        .await?;
    info!("Scheduled: Retention cleanup (daily at 3:00 AM UTC)");

    // Job 3: Health check heartbeat (every 5 minutes)
    scheduler
        .add(Job::new_async("0 */5 * * * *", |_uuid, _l| {
            Box::pin(async move {
                info!("Worker heartbeat - all systems operational");
            })
        })?)
        .await?;
    info!("Scheduled: Health check heartbeat (every 5 minutes)");

    // Start the scheduler
    info!("Starting job scheduler");
    scheduler.start().await?;

    info!("BookshelfAI Worker started successfully with 3 scheduled jobs");

    // Keep the main task running
    // The scheduler runs jobs in background tasks
    loop {
        tokio::time::sleep(Duration::from_secs(3600)).await;
    }
}
