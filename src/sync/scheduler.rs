//! Cron-driven scheduling of the sync runs. Jobs only log failures; the
//! next tick is the retry.

use crate::config::CONFIG;
use crate::error::SyncError;
use crate::sync::orchestrator::{
    DAILY_TRAFFIC_DAYS, DAILY_TRAFFIC_LIMIT, PRODUCT_SYNC_TRAILING_DAYS, SyncOrchestrator,
    WEEKLY_TRAFFIC_DAYS, WEEKLY_TRAFFIC_LIMIT,
};
use crate::sync::window::DateWindow;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

/// Build and start the job scheduler, or return `None` when scheduling is
/// disabled by configuration.
pub async fn start(orchestrator: Arc<SyncOrchestrator>) -> Result<Option<JobScheduler>, SyncError> {
    if !CONFIG.scheduler_enabled {
        info!("scheduler disabled, running in on-demand mode");
        return Ok(None);
    }

    let sched = JobScheduler::new().await.map_err(to_sched_err)?;

    add_job(&sched, &CONFIG.daily_sync_cron, {
        let orch = Arc::clone(&orchestrator);
        move || {
            let orch = Arc::clone(&orch);
            async move {
                if let Err(e) = orch.run_daily().await {
                    error!(error = %e, "scheduled daily sync failed");
                }
            }
        }
    })
    .await?;

    add_job(&sched, &CONFIG.product_sync_cron, {
        let orch = Arc::clone(&orchestrator);
        move || {
            let orch = Arc::clone(&orch);
            async move {
                let window = DateWindow::trailing_days(PRODUCT_SYNC_TRAILING_DAYS);
                if let Err(e) = orch.run_products(window).await {
                    error!(error = %e, "scheduled product sync failed");
                }
            }
        }
    })
    .await?;

    add_job(&sched, &CONFIG.monthly_product_sync_cron, {
        let orch = Arc::clone(&orchestrator);
        move || {
            let orch = Arc::clone(&orch);
            async move {
                if let Err(e) = orch.run_products(DateWindow::all_time()).await {
                    error!(error = %e, "scheduled all-time product sync failed");
                }
            }
        }
    })
    .await?;

    add_job(&sched, &CONFIG.daily_traffic_cron, {
        let orch = Arc::clone(&orchestrator);
        move || {
            let orch = Arc::clone(&orch);
            async move {
                if let Err(e) = orch.run_traffic(DAILY_TRAFFIC_DAYS, DAILY_TRAFFIC_LIMIT).await {
                    error!(error = %e, "scheduled daily traffic sync failed");
                }
            }
        }
    })
    .await?;

    add_job(&sched, &CONFIG.weekly_traffic_cron, {
        let orch = Arc::clone(&orchestrator);
        move || {
            let orch = Arc::clone(&orch);
            async move {
                if let Err(e) = orch.run_traffic(WEEKLY_TRAFFIC_DAYS, WEEKLY_TRAFFIC_LIMIT).await {
                    error!(error = %e, "scheduled weekly traffic sync failed");
                }
            }
        }
    })
    .await?;

    sched.start().await.map_err(to_sched_err)?;
    info!("scheduler started with 5 jobs");
    Ok(Some(sched))
}

async fn add_job<F, Fut>(sched: &JobScheduler, cron: &str, run: F) -> Result<(), SyncError>
where
    F: Fn() -> Fut + Send + Sync + Clone + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let job = Job::new_async(cron, move |_uuid, _lock| {
        let run = run.clone();
        Box::pin(async move { run().await })
    })
    .map_err(to_sched_err)?;
    sched.add(job).await.map_err(to_sched_err)?;
    Ok(())
}

fn to_sched_err(e: tokio_cron_scheduler::JobSchedulerError) -> SyncError {
    SyncError::Scheduler(e.to_string())
}
