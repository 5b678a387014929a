//! Background status polling.
//!
//! Runs on its own timer, independent of request handling. Each tick
//! queries every in-flight tracking id once; a failed tick is logged and
//! the next one starts from the stored state.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::service::IssuanceService;

/// Spawn the poller on the current runtime. Abort the handle to stop it.
pub fn spawn_status_poller(service: Arc<IssuanceService>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        tracing::info!(interval_secs = interval.as_secs(), "status poller started");

        loop {
            ticker.tick().await;
            match service.poll_in_flight().await {
                Ok(0) => {}
                Ok(answered) => tracing::debug!(tracking_ids = answered, "status poll complete"),
                Err(e) => tracing::warn!(error = %e, "status poll failed"),
            }
        }
    })
}
