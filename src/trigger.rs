//! Debounced regeneration trigger
//!
//! Bursts of edits restart a quiet-period timer. When the timer expires the
//! trigger turns into a single pending tick, and the host's next tick runs
//! the cycle. Requesting a tick while one is already pending is a no-op, so
//! at most one cycle is ever queued.

use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct DebouncedTrigger {
    quiet: Duration,
    deadline: Option<Instant>,
    pending_tick: bool,
}

impl DebouncedTrigger {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            deadline: None,
            pending_tick: false,
        }
    }

    pub fn quiet(&self) -> Duration {
        self.quiet
    }

    /// (Re)start the quiet timer using the default quiet period.
    pub fn poke(&mut self, now: Instant) {
        self.poke_with(now, self.quiet);
    }

    /// (Re)start the quiet timer with an explicit quiet period.
    pub fn poke_with(&mut self, now: Instant, quiet: Duration) {
        self.deadline = Some(now + quiet);
    }

    /// Ask for exactly one upcoming tick. Idempotent while a tick is pending.
    /// Any running quiet timer is cancelled; its cycle is the one being requested.
    pub fn request_tick(&mut self) -> bool {
        self.deadline = None;
        if self.pending_tick {
            return false;
        }
        self.pending_tick = true;
        true
    }

    /// Whether a timer or tick is outstanding.
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some() || self.pending_tick
    }

    pub fn is_tick_pending(&self) -> bool {
        self.pending_tick
    }

    /// Called once per host tick. An expired timer becomes a pending tick;
    /// returns true (once) when a pending tick should run a cycle now.
    pub fn poll(&mut self, now: Instant) -> bool {
        if let Some(deadline) = self.deadline {
            if now >= deadline {
                self.deadline = None;
                self.pending_tick = true;
                // The timer fired during this tick; the cycle runs on the next one.
                return false;
            }
        }

        if self.pending_tick {
            self.pending_tick = false;
            return true;
        }
        false
    }
}
