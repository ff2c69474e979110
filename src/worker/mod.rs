use std::time::Duration;

use tokio::time::interval;
use tracing::{info, warn};

use crate::state::AppState;

const PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Hourly purge of runs (and their events) past the retention window.
/// Single-process; the delete is idempotent so overlapping deployments are
/// harmless.
pub fn spawn_retention_worker(state: AppState) {
    tokio::spawn(async move {
        let retention_days = state.config.run_retention_days;
        let mut ticker = interval(PURGE_INTERVAL);
        loop {
            ticker.tick().await;
            match state
                .automation_repo
                .purge_runs_older_than(retention_days)
                .await
            {
                Ok(0) => {}
                Ok(purged) => {
                    info!(purged, retention_days, "purged expired automation runs");
                }
                Err(err) => {
                    warn!(?err, "failed to purge expired automation runs");
                }
            }
        }
    });
}
