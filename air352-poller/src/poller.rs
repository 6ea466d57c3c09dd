//! Multi-target facade over polling coordinators
//!
//! This is the interface the surrounding application talks to: register a
//! sensor, refresh it on demand or on a schedule, read its state, and
//! deregister it.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use air352_protocol::DeviceAddress;

use crate::config::PollerConfig;
use crate::coordinator::PollingCoordinator;
use crate::error::{PollerError, Result};
use crate::lease::PortLeases;
use crate::scheduler;
use crate::state::{PollState, RefreshOutcome};
use crate::transport::{MulticastTransport, Transport};

/// Identifier of a registered target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TargetHandle(u64);

impl TargetHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TargetHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "target-{}", self.0)
    }
}

/// Published after every completed refresh cycle
#[derive(Debug, Clone, Serialize)]
pub struct PollUpdate {
    pub handle: TargetHandle,
    pub address: DeviceAddress,
    pub outcome: RefreshOutcome,
    /// State after the outcome was applied
    pub state: PollState,
}

struct Target {
    coordinator: Arc<PollingCoordinator>,
    poll_interval: Duration,
    schedule: Option<JoinHandle<()>>,
}

/// Polls any number of 352Air sensors
///
/// # Example
///
/// ```rust,no_run
/// use air352_poller::{PollerConfig, SensorPoller};
/// use std::time::Duration;
///
/// # async fn run() -> air352_poller::Result<()> {
/// let poller = SensorPoller::new(PollerConfig::default())?;
/// let handle = poller.register_target("AA:BB:CC:DD:EE:FF".parse()?, Duration::from_secs(60))?;
///
/// let outcome = poller.refresh_now(handle).await?;
/// println!("{:?}", outcome);
///
/// let state = poller.current_state(handle)?;
/// println!("available={} pm25={:?}", state.available, state.pm25());
/// # Ok(())
/// # }
/// ```
pub struct SensorPoller {
    config: PollerConfig,
    transport: Arc<dyn Transport>,
    leases: PortLeases,
    targets: DashMap<TargetHandle, Target>,
    by_address: DashMap<DeviceAddress, TargetHandle>,
    next_id: AtomicU64,
    shutdown: CancellationToken,
    updates: broadcast::Sender<PollUpdate>,
}

impl SensorPoller {
    /// Create a poller that talks to the network through UDP multicast
    ///
    /// Ports are leased from the process-wide table, so several pollers in
    /// one process never bind the same port at once.
    pub fn new(config: PollerConfig) -> Result<Self> {
        Self::with_parts(config, Arc::new(MulticastTransport::new()), PortLeases::global())
    }

    /// Create a poller with a custom transport and its own lease table
    pub fn with_transport(config: PollerConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        Self::with_parts(config, transport, PortLeases::new())
    }

    /// Create a poller with a custom transport and lease table
    pub fn with_parts(
        config: PollerConfig,
        transport: Arc<dyn Transport>,
        leases: PortLeases,
    ) -> Result<Self> {
        config.validate()?;
        let (updates, _) = broadcast::channel(config.update_buffer_size);

        Ok(Self {
            config,
            transport,
            leases,
            targets: DashMap::new(),
            by_address: DashMap::new(),
            next_id: AtomicU64::new(1),
            shutdown: CancellationToken::new(),
            updates,
        })
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Register a sensor for polling
    ///
    /// Registering an address that is already registered returns the
    /// existing handle.
    pub fn register_target(
        &self,
        address: DeviceAddress,
        poll_interval_hint: Duration,
    ) -> Result<TargetHandle> {
        self.ensure_running()?;

        if poll_interval_hint == Duration::ZERO {
            return Err(PollerError::Configuration(
                "Poll interval must be greater than 0".to_string(),
            ));
        }

        match self.by_address.entry(address) {
            Entry::Occupied(existing) => Ok(*existing.get()),
            Entry::Vacant(slot) => {
                if self.targets.len() >= self.config.max_targets {
                    return Err(PollerError::Configuration(format!(
                        "Cannot register more than {} targets",
                        self.config.max_targets
                    )));
                }

                let handle = TargetHandle::new(self.next_id.fetch_add(1, Ordering::Relaxed));
                let coordinator = Arc::new(PollingCoordinator::new(
                    address,
                    &self.config,
                    Arc::clone(&self.transport),
                    self.leases.clone(),
                    self.shutdown.child_token(),
                ));

                self.targets.insert(
                    handle,
                    Target {
                        coordinator,
                        poll_interval: poll_interval_hint,
                        schedule: None,
                    },
                );
                slot.insert(handle);

                tracing::info!("Registered {} as {}", address, handle);
                Ok(handle)
            }
        }
    }

    /// Register a sensor using the configured default poll interval
    pub fn register(&self, address: DeviceAddress) -> Result<TargetHandle> {
        self.register_target(address, self.config.default_poll_interval)
    }

    /// Run a refresh cycle now, or join the one in flight for this target
    pub async fn refresh_now(&self, handle: TargetHandle) -> Result<RefreshOutcome> {
        self.ensure_running()?;
        let coordinator = self.coordinator(handle)?;

        let (outcome, ran_cycle) = coordinator.refresh_tracked().await;
        if ran_cycle {
            scheduler::publish(&self.updates, handle, &coordinator, outcome.clone());
        }
        Ok(outcome)
    }

    /// Snapshot of a target's poll state
    pub fn current_state(&self, handle: TargetHandle) -> Result<PollState> {
        Ok(self.coordinator(handle)?.state())
    }

    /// Stop polling a target and discard its state
    ///
    /// A cycle in flight for the target is cancelled and its endpoint closed.
    pub fn deregister_target(&self, handle: TargetHandle) -> Result<()> {
        let (_, target) = self
            .targets
            .remove(&handle)
            .ok_or(PollerError::UnknownTarget(handle))?;

        let address = target.coordinator.target();
        self.by_address.remove(&address);
        target.coordinator.cancel();

        tracing::info!("Deregistered {} ({})", address, handle);
        Ok(())
    }

    /// Start refreshing a target on its poll interval
    ///
    /// Must be called from within a tokio runtime. Updates are published to
    /// [`SensorPoller::subscribe`] receivers.
    pub fn start_polling(&self, handle: TargetHandle) -> Result<()> {
        self.ensure_running()?;
        let mut target = self
            .targets
            .get_mut(&handle)
            .ok_or(PollerError::UnknownTarget(handle))?;

        let running = target
            .schedule
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false);
        if running {
            return Ok(());
        }

        let task = scheduler::spawn(
            handle,
            Arc::clone(&target.coordinator),
            target.poll_interval,
            self.updates.clone(),
        );
        target.schedule = Some(task);
        Ok(())
    }

    /// Stop the scheduled task for a target, keeping its registration
    pub fn stop_polling(&self, handle: TargetHandle) -> Result<()> {
        let mut target = self
            .targets
            .get_mut(&handle)
            .ok_or(PollerError::UnknownTarget(handle))?;

        if let Some(task) = target.schedule.take() {
            task.abort();
            tracing::info!("Stopped polling {}", handle);
        }
        Ok(())
    }

    /// Whether a target has a running scheduled task
    pub fn is_polling(&self, handle: TargetHandle) -> bool {
        self.targets
            .get(&handle)
            .and_then(|target| target.schedule.as_ref().map(|task| !task.is_finished()))
            .unwrap_or(false)
    }

    /// All registered targets
    pub fn targets(&self) -> Vec<(TargetHandle, DeviceAddress)> {
        let mut targets: Vec<_> = self
            .targets
            .iter()
            .map(|entry| (*entry.key(), entry.coordinator.target()))
            .collect();
        targets.sort();
        targets
    }

    /// Handle registered for an address, if any
    pub fn handle_for(&self, address: DeviceAddress) -> Option<TargetHandle> {
        self.by_address.get(&address).map(|handle| *handle)
    }

    /// Receive an update for every completed refresh cycle
    pub fn subscribe(&self) -> broadcast::Receiver<PollUpdate> {
        self.updates.subscribe()
    }

    /// Cancel every target and wait for scheduled tasks to finish
    pub async fn shutdown(&self) {
        for target in self.targets.iter() {
            target.coordinator.cancel();
        }
        self.shutdown.cancel();

        let handles: Vec<TargetHandle> = self.targets.iter().map(|entry| *entry.key()).collect();
        let mut tasks = Vec::new();
        for handle in handles {
            if let Some((_, mut target)) = self.targets.remove(&handle) {
                target.coordinator.cancel();
                self.by_address.remove(&target.coordinator.target());
                if let Some(task) = target.schedule.take() {
                    tasks.push(task);
                }
            }
        }

        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!("Polling task ended abnormally: {}", e);
            }
        }

        tracing::info!("Sensor poller shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    fn ensure_running(&self) -> Result<()> {
        if self.shutdown.is_cancelled() {
            Err(PollerError::ShutDown)
        } else {
            Ok(())
        }
    }

    fn coordinator(&self, handle: TargetHandle) -> Result<Arc<PollingCoordinator>> {
        self.targets
            .get(&handle)
            .map(|target| Arc::clone(&target.coordinator))
            .ok_or(PollerError::UnknownTarget(handle))
    }
}

impl Drop for SensorPoller {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
