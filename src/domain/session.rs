//! Timing session state and time sources.

use crate::domain::models::{ElapsedTimePair, SessionPhase};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::Instant;

/// Millisecond timestamp source
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Milliseconds since construction, on tokio's monotonic clock.
///
/// Follows tokio's paused time in tests.
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    pub fn set(&self, now_ms: u64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: u64) {
        self.now.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// The host's view of the current attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    phase: SessionPhase,
    start_time_ms: u64,
    elapsed: ElapsedTimePair,
    // None is the "no device time" sentinel, Some(0) a cleared reading
    hard_time_ms: Option<u64>,
}

impl SessionState {
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn set_phase(&mut self, phase: SessionPhase) {
        self.phase = phase;
    }

    pub fn start_time_ms(&self) -> u64 {
        self.start_time_ms
    }

    pub fn set_start_time_ms(&mut self, start_ms: u64) {
        self.start_time_ms = start_ms;
    }

    pub fn elapsed(&self) -> ElapsedTimePair {
        self.elapsed
    }

    pub fn elapsed_mut(&mut self) -> &mut ElapsedTimePair {
        &mut self.elapsed
    }

    pub fn set_elapsed(&mut self, elapsed: ElapsedTimePair) {
        self.elapsed = elapsed;
    }

    pub fn hard_time_ms(&self) -> Option<u64> {
        self.hard_time_ms
    }

    pub fn set_hard_time_ms(&mut self, hard_time: Option<u64>) {
        self.hard_time_ms = hard_time;
    }

    /// Whether a device time is held or a phase other than idle is active
    pub fn is_active(&self) -> bool {
        matches!(self.hard_time_ms, Some(t) if t > 0) || self.phase != SessionPhase::Idle
    }

    /// Clean idle state used after a successful connection
    pub fn reset_idle(&mut self) {
        self.hard_time_ms = Some(0);
        self.phase = SessionPhase::Idle;
    }
}
