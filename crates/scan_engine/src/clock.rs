//! Simulation clock
//!
//! One writer (`SimulationClock`, owned by the step loop) and any number of
//! read-only `ClockHandle`s held by sensors.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

static NEXT_CLOCK_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
struct ClockState {
    id: u64,
    /// `f64` seconds stored as raw bits
    now_bits: AtomicU64,
    epoch: AtomicU64,
}

/// Authoritative simulation time source.
///
/// Not `Clone`: mutation needs `&mut self`, so there is exactly one writer.
#[derive(Debug)]
pub struct SimulationClock {
    state: Arc<ClockState>,
}

impl Default for SimulationClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulationClock {
    pub fn new() -> Self {
        Self {
            state: Arc::new(ClockState {
                id: NEXT_CLOCK_ID.fetch_add(1, Ordering::Relaxed),
                now_bits: AtomicU64::new(0f64.to_bits()),
                epoch: AtomicU64::new(0),
            }),
        }
    }

    /// Process-unique id
    pub fn id(&self) -> u64 {
        self.state.id
    }

    pub fn now(&self) -> f64 {
        f64::from_bits(self.state.now_bits.load(Ordering::Acquire))
    }

    /// Number of resets so far
    pub fn epoch(&self) -> u64 {
        self.state.epoch.load(Ordering::Acquire)
    }

    /// Move time forward by `delta_seconds` and return the new time.
    ///
    /// Negative or non-finite deltas are ignored.
    pub fn advance(&mut self, delta_seconds: f64) -> f64 {
        let now = self.now();
        if !delta_seconds.is_finite() || delta_seconds < 0.0 {
            warn!(
                clock_id = self.state.id,
                delta = delta_seconds,
                "ignoring invalid clock delta"
            );
            return now;
        }

        let next = now + delta_seconds;
        self.state.now_bits.store(next.to_bits(), Ordering::Release);
        next
    }

    /// Set time back to zero and start a new epoch
    pub fn reset(&mut self) {
        self.state.now_bits.store(0f64.to_bits(), Ordering::Release);
        let epoch = self.state.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        info!(clock_id = self.state.id, epoch, "simulation clock reset");
    }

    /// Read-only view for sensors
    pub fn handle(&self) -> ClockHandle {
        ClockHandle {
            state: Arc::clone(&self.state),
        }
    }
}

/// Read-only clock view
#[derive(Debug, Clone)]
pub struct ClockHandle {
    state: Arc<ClockState>,
}

impl ClockHandle {
    pub fn now(&self) -> f64 {
        f64::from_bits(self.state.now_bits.load(Ordering::Acquire))
    }

    pub fn epoch(&self) -> u64 {
        self.state.epoch.load(Ordering::Acquire)
    }

    pub fn clock_id(&self) -> u64 {
        self.state.id
    }

    /// True when both views read the same clock
    pub fn same_clock(&self, other: &ClockHandle) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}
