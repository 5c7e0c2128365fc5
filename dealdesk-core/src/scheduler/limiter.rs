//! Concurrency limiter: decides when the next queued item may start.
//!
//! The limiter is a plain state machine. It never sleeps and never reads
//! the clock; every decision is made against the `now` passed in by the
//! scheduler loop, which keeps the admission rules testable without a
//! runtime.
//!
//! A slot is busy while its operation executes and, after the operation
//! settled, while it is still inside its pacing interval ("cooling").
//! Admission is granted only when a slot is neither.

use tokio::time::{Duration, Instant};

use super::config::{Pacing, SchedulerConfig};

/// Result of an admission attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// A slot was reserved; the caller must start exactly one item
    Granted,

    /// Every slot is executing; wait for a settlement
    Full,

    /// Capacity is held by cooling slots; the earliest frees at this instant
    CoolingUntil(Instant),
}

/// Tracks executing and cooling slots against the configured ceiling
#[derive(Debug)]
pub struct ConcurrencyLimiter {
    ceiling: usize,
    min_spacing: Duration,
    pacing: Pacing,
    /// Operations admitted and not yet settled
    in_flight: usize,
    /// Release instants of settled slots still inside their pacing interval
    cooling: Vec<Instant>,
}

impl ConcurrencyLimiter {
    pub fn new(config: &SchedulerConfig) -> Self {
        Self {
            ceiling: config.ceiling,
            min_spacing: config.min_spacing,
            pacing: config.pacing,
            in_flight: 0,
            cooling: Vec::new(),
        }
    }

    /// Try to reserve a slot for one item
    pub fn try_admit(&mut self, now: Instant) -> Admission {
        self.reclaim(now);

        if self.in_flight + self.cooling.len() < self.ceiling {
            self.in_flight += 1;
            return Admission::Granted;
        }

        match self.next_release() {
            Some(release) => Admission::CoolingUntil(release),
            None => Admission::Full,
        }
    }

    /// Record that an operation admitted at `admitted_at` has settled
    pub fn settle(&mut self, admitted_at: Instant, now: Instant) {
        debug_assert!(self.in_flight > 0, "settle without a matching admission");
        self.in_flight = self.in_flight.saturating_sub(1);

        let release = match self.pacing {
            Pacing::SinceAdmission => (admitted_at + self.min_spacing).max(now),
            Pacing::AfterSettlement => now + self.min_spacing,
        };
        if release > now {
            self.cooling.push(release);
        }
    }

    /// Earliest instant at which a cooling slot frees up
    pub fn next_release(&self) -> Option<Instant> {
        self.cooling.iter().min().copied()
    }

    /// Number of operations currently executing
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Number of settled slots still cooling at `now`
    pub fn cooling(&self, now: Instant) -> usize {
        self.cooling.iter().filter(|&&release| release > now).count()
    }

    /// Slots that could be granted at `now`
    pub fn available(&self, now: Instant) -> usize {
        self.ceiling
            .saturating_sub(self.in_flight + self.cooling(now))
    }

    /// Nothing executing and nothing cooling
    pub fn is_idle(&self, now: Instant) -> bool {
        self.in_flight == 0 && self.cooling(now) == 0
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    fn reclaim(&mut self, now: Instant) {
        self.cooling.retain(|&release| release > now);
    }
}
