//! Countdown ticker background task

use std::{sync::Arc, time::Duration};
use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::state::AppState;

/// Background task that drives the countdown once per `period`.
///
/// Each tick runs on its own task so a slow value resolution never delays
/// the next tick; a tick overtaken by a newer one is discarded on commit.
pub async fn countdown_ticker_task(state: Arc<AppState>, period: Duration) {
    info!("Starting countdown ticker every {}ms", period.as_millis());

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;

        if !state.is_attached() {
            continue;
        }

        let tick_state = Arc::clone(&state);
        tokio::spawn(async move {
            let ticket = match tick_state.begin_tick() {
                Ok(Some(ticket)) => ticket,
                Ok(None) => return,
                Err(e) => {
                    error!("Failed to start countdown tick: {}", e);
                    return;
                }
            };

            let resolved = tick_state.resolve_tick(&ticket).await;
            match tick_state.commit_tick(&ticket, &resolved, Utc::now()) {
                Ok(Some(view)) => debug!(
                    "Tick {}: {}ms left, progress {:.1}%",
                    ticket.generation, view.state.total_ms, view.progress
                ),
                Ok(None) => {}
                Err(e) => error!("Failed to commit countdown tick: {}", e),
            }
        });
    }
}
