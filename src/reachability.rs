//! Network reachability collaborator.
//!
//! The pipeline queries connectivity synchronously at flush time; the
//! monitor's own watching machinery (if any) is the implementor's
//! business. [`StaticReachability`] is the trivial implementation for
//! embeddings without a platform monitor, and for tests.

use std::sync::atomic::{AtomicBool, Ordering};

/// Reports whether the network is currently reachable.
pub trait ReachabilityMonitor: Send + Sync {
    /// Start watching connectivity. Called when tracking starts.
    fn start(&self);

    /// Stop watching connectivity. Called when tracking stops.
    fn cancel(&self);

    /// Synchronous connectivity check.
    fn is_connected(&self) -> bool;
}

/// A monitor that reports a fixed, settable answer.
#[derive(Debug)]
pub struct StaticReachability {
    connected: AtomicBool,
}

impl StaticReachability {
    /// Create a monitor with the given initial answer.
    pub fn new(connected: bool) -> Self {
        Self {
            connected: AtomicBool::new(connected),
        }
    }

    /// Change the reported answer.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }
}

impl Default for StaticReachability {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ReachabilityMonitor for StaticReachability {
    fn start(&self) {}

    fn cancel(&self) {}

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
