//! Periodic refresh tasks
//!
//! One tokio task per scheduled target calls [`PollingCoordinator::refresh`]
//! on a fixed interval. Whichever caller runs a cycle publishes it.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::coordinator::PollingCoordinator;
use crate::error::RefreshFailed;
use crate::poller::{PollUpdate, TargetHandle};
use crate::state::RefreshOutcome;

/// Spawn the polling loop for one target
///
/// The first refresh runs immediately. The loop ends when the coordinator
/// is cancelled.
pub(crate) fn spawn(
    handle: TargetHandle,
    coordinator: Arc<PollingCoordinator>,
    interval: Duration,
    updates: broadcast::Sender<PollUpdate>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        polling_loop(handle, coordinator, interval, updates).await;
    })
}

async fn polling_loop(
    handle: TargetHandle,
    coordinator: Arc<PollingCoordinator>,
    interval: Duration,
    updates: broadcast::Sender<PollUpdate>,
) {
    tracing::info!(
        "Starting polling for {} ({}) every {:?}",
        coordinator.target(),
        handle,
        interval
    );

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = coordinator.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let (outcome, ran_cycle) = coordinator.refresh_tracked().await;
        if outcome == RefreshOutcome::Failed(RefreshFailed::Cancelled) {
            break;
        }
        if ran_cycle {
            publish(&updates, handle, &coordinator, outcome);
        }
    }

    tracing::info!("Polling ended for {} ({})", coordinator.target(), handle);
}

/// Broadcast a completed cycle to subscribers
pub(crate) fn publish(
    updates: &broadcast::Sender<PollUpdate>,
    handle: TargetHandle,
    coordinator: &PollingCoordinator,
    outcome: RefreshOutcome,
) {
    let update = PollUpdate {
        handle,
        address: coordinator.target(),
        outcome,
        state: coordinator.state(),
    };

    if updates.send(update).is_err() {
        tracing::trace!("No subscribers for update from {}", handle);
    }
}
