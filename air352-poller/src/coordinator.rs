//! Per-target polling coordinator
//!
//! A [`PollingCoordinator`] owns the poll state of one sensor and serializes
//! refresh cycles for it. At most one cycle per target is in flight; a
//! refresh requested while another is outstanding waits for it and returns
//! its outcome instead of opening a second endpoint.

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use air352_protocol::DeviceAddress;

use crate::config::PollerConfig;
use crate::cycle::{self, CycleSettings};
use crate::error::RefreshFailed;
use crate::lease::PortLeases;
use crate::state::{AvailabilityPolicy, PollState, RefreshOutcome};
use crate::transport::Transport;

struct Shared {
    state: PollState,
    completed_cycles: u64,
    last_outcome: Option<RefreshOutcome>,
}

/// Runs refresh cycles for one sensor and keeps its [`PollState`]
pub struct PollingCoordinator {
    target: DeviceAddress,
    settings: CycleSettings,
    policy: AvailabilityPolicy,
    transport: Arc<dyn Transport>,
    leases: PortLeases,
    cancel: CancellationToken,
    cycle_lock: Mutex<()>,
    shared: RwLock<Shared>,
}

impl PollingCoordinator {
    /// Create a coordinator for `target`
    ///
    /// `cancel` is usually a child of the owning poller's shutdown token.
    pub fn new(
        target: DeviceAddress,
        config: &PollerConfig,
        transport: Arc<dyn Transport>,
        leases: PortLeases,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            target,
            settings: CycleSettings {
                endpoint: config.endpoint(),
                response_timeout: config.response_timeout,
                linger: config.linger,
            },
            policy: AvailabilityPolicy::after(config.failures_before_unavailable),
            transport,
            leases,
            cancel,
            cycle_lock: Mutex::new(()),
            shared: RwLock::new(Shared {
                state: PollState::new(target, config.response_timeout),
                completed_cycles: 0,
                last_outcome: None,
            }),
        }
    }

    pub fn target(&self) -> DeviceAddress {
        self.target
    }

    /// Snapshot of the current poll state
    pub fn state(&self) -> PollState {
        self.shared.read().state.clone()
    }

    /// Stop the coordinator; in-flight and later refreshes resolve Cancelled
    ///
    /// Once this returns no cycle can change the poll state.
    pub fn cancel(&self) {
        // Serialized with `complete` through the state lock
        let _shared = self.shared.write();
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the coordinator is cancelled
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    /// Run a refresh cycle, or join the one already in flight
    pub async fn refresh(&self) -> RefreshOutcome {
        self.refresh_tracked().await.0
    }

    /// Like [`refresh`](Self::refresh), also telling whether this call ran
    /// the cycle (`true`) or joined another caller's (`false`)
    pub(crate) async fn refresh_tracked(&self) -> (RefreshOutcome, bool) {
        const CANCELLED: RefreshOutcome = RefreshOutcome::Failed(RefreshFailed::Cancelled);

        if self.cancel.is_cancelled() {
            return (CANCELLED, false);
        }

        let seen = self.shared.read().completed_cycles;

        let _cycle = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return (CANCELLED, false),
            guard = self.cycle_lock.lock() => guard,
        };

        if let Some(outcome) = self.outcome_completed_since(seen) {
            tracing::debug!("Coalesced refresh for {} into the cycle in flight", self.target);
            return (outcome, false);
        }

        let _lease = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return (CANCELLED, false),
            lease = self.leases.acquire(self.settings.endpoint.bind.port()) => lease,
        };

        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                tracing::debug!("Cancelled refresh for {}", self.target);
                return (CANCELLED, false);
            }
            outcome = cycle::run(self.transport.as_ref(), &self.settings, self.target) => outcome,
        };

        match self.complete(outcome) {
            Some(outcome) => (outcome, true),
            None => (CANCELLED, false),
        }
    }

    fn outcome_completed_since(&self, seen: u64) -> Option<RefreshOutcome> {
        let shared = self.shared.read();
        if shared.completed_cycles != seen {
            shared.last_outcome.clone()
        } else {
            None
        }
    }

    /// Apply a finished cycle unless the coordinator was cancelled meanwhile
    fn complete(&self, outcome: RefreshOutcome) -> Option<RefreshOutcome> {
        let mut shared = self.shared.write();
        if self.cancel.is_cancelled() {
            return None;
        }

        shared.state.apply(&outcome, self.policy);
        shared.completed_cycles += 1;
        shared.last_outcome = Some(outcome.clone());

        if let RefreshOutcome::Failed(reason) = &outcome {
            tracing::warn!(
                "Refresh for {} failed ({} consecutive): {}",
                self.target,
                shared.state.consecutive_failures,
                reason
            );
        }

        Some(outcome)
    }
}

impl std::fmt::Debug for PollingCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingCoordinator")
            .field("target", &self.target)
            .field("settings", &self.settings)
            .field("policy", &self.policy)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
