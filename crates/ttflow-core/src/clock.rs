//! Nanosecond time sources.
//!
//! One clock feeds every query against a schedule context. Production uses
//! [`SystemClock`]; tests and the deterministic simulator inject a
//! [`VirtualClock`] they control themselves.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// A nanosecond clock. Implementations must be monotonic over the lifetime
/// of the schedule they drive.
pub trait Clock: Send + Sync {
    /// Current time in nanoseconds.
    fn now_ns(&self) -> u64;
}

/// Wall-clock time since the Unix epoch. Schedules are globally aligned
/// across ports and hosts as long as their wall clocks agree.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ns(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0)
    }
}

/// A settable clock that only moves when told to.
#[derive(Debug, Default)]
pub struct VirtualClock(AtomicU64);

impl VirtualClock {
    pub fn new(start_ns: u64) -> Self {
        Self(AtomicU64::new(start_ns))
    }

    /// Move the clock forward by `delta_ns`.
    pub fn advance(&self, delta_ns: u64) {
        self.0.fetch_add(delta_ns, Ordering::Relaxed);
    }

    /// Jump the clock to an absolute time.
    pub fn set(&self, now_ns: u64) {
        self.0.store(now_ns, Ordering::Relaxed);
    }
}

impl Clock for VirtualClock {
    fn now_ns(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now_ns(&self) -> u64 {
        (**self).now_ns()
    }
}
