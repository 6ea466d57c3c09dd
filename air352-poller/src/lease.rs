//! Exclusive ownership of receive ports
//!
//! Every sensor answers on the same fixed port, so the local receive port is
//! a process-wide resource. A cycle holds a [`PortLease`] for as long as its
//! endpoint is open; cycles for other targets on the same port queue behind
//! it instead of failing to bind.

use dashmap::DashMap;
use std::sync::{Arc, OnceLock};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Process-wide table of per-port locks
#[derive(Debug, Clone, Default)]
pub struct PortLeases {
    ports: Arc<DashMap<u16, Arc<Mutex<()>>>>,
}

impl PortLeases {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lease table shared by every poller that uses real sockets
    pub fn global() -> Self {
        static GLOBAL: OnceLock<PortLeases> = OnceLock::new();
        GLOBAL.get_or_init(PortLeases::new).clone()
    }

    /// Wait until `port` is free and take it
    pub async fn acquire(&self, port: u16) -> PortLease {
        let lock = self
            .ports
            .entry(port)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let guard = lock.lock_owned().await;
        tracing::trace!("Leased port {}", port);

        PortLease {
            port,
            _guard: guard,
        }
    }

    /// Whether a cycle currently owns `port`
    pub fn is_leased(&self, port: u16) -> bool {
        self.ports
            .get(&port)
            .map(|lock| lock.try_lock().is_err())
            .unwrap_or(false)
    }
}

/// Ownership of one port, released on drop
#[derive(Debug)]
pub struct PortLease {
    port: u16,
    _guard: OwnedMutexGuard<()>,
}

impl PortLease {
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Drop for PortLease {
    fn drop(&mut self) {
        tracing::trace!("Released port {}", self.port);
    }
}
