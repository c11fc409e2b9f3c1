//! Tick driver: steps every running game once per period.

use std::sync::Arc;

use snakebattle_tick::TickScheduler;

use crate::server::ServerState;

/// Runs forever, stepping all rooms under the registry lock.
///
/// Snapshots are queued on each player's outbound channel while the lock
/// is held; the connection writer tasks put them on the wire.
pub(crate) async fn run_tick_driver(state: Arc<ServerState>) {
    let mut scheduler = TickScheduler::new(state.config.tick.clone());
    tracing::info!(period_ms = scheduler.period().as_millis() as u64, "tick driver started");

    loop {
        let info = scheduler.wait_for_tick().await;
        let report = state.registry.lock().await.tick_all();
        scheduler.record_tick_end();

        if report.finished > 0 {
            tracing::debug!(tick = info.tick, finished = report.finished, "games finished");
        }
        tracing::trace!(tick = info.tick, stepped = report.stepped, "tick complete");
    }
}
