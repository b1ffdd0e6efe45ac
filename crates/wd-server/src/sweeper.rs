//! Periodic cleanup of expired sessions and stale audit entries

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};
use wd_services::Services;

pub fn spawn(services: Services, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match services.sweep().await {
                Ok(report) => info!(
                    sessions_deactivated = report.sessions_deactivated,
                    audit_entries_purged = report.audit_entries_purged,
                    "Sweep finished"
                ),
                Err(e) => error!(error = %e, "Sweep failed"),
            }
        }
    })
}
