//! Snapshot file reload background task

use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::{config::load_snapshot, state::AppState};

/// Background task that re-reads the host snapshot file on an interval.
/// A file that fails to load leaves the previous snapshot in place.
pub async fn snapshot_reload_task(state: Arc<AppState>, path: PathBuf, period: Duration) {
    info!("Watching snapshot file {} every {}s", path.display(), period.as_secs());

    let mut interval = interval(period);
    let mut last_good = None;

    loop {
        interval.tick().await;

        let path_for_read = path.clone();
        let loaded = tokio::task::spawn_blocking(move || load_snapshot(&path_for_read)).await;

        match loaded {
            Ok(Ok(snapshot)) => {
                if last_good.as_ref() == Some(&snapshot) {
                    continue;
                }
                debug!("Snapshot file changed, {} entities", snapshot.len());
                if let Err(e) = state.set_snapshot(snapshot.clone()) {
                    warn!("Failed to apply snapshot: {}", e);
                    continue;
                }
                last_good = Some(snapshot);
            }
            Ok(Err(e)) => warn!("Keeping previous snapshot: {}", e),
            Err(e) => warn!("Snapshot reload task failed: {}", e),
        }
    }
}
