//! Command counters.

use serde::{Deserialize, Serialize};

/// Monotonic counters kept by the scheduler.
///
/// Every submitted command lands in exactly one of `executed_immediately`, `queued` or
/// `dropped`, so [`is_conserved`](Self::is_conserved) holds after every call. The remaining
/// counters describe what later happened to queued work and sit outside that sum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Statistics {
    /// Every command ever submitted.
    pub total_received: u32,
    /// Commands applied on arrival.
    pub executed_immediately: u32,
    /// Commands that had to wait: queued, or parked behind a reversal dead-time.
    pub queued: u32,
    /// Commands refused because the queue was full.
    pub dropped: u32,
    /// Subset of `queued` that waited out a reversal dead-time.
    pub reversals: u32,
    /// Waiting commands that were eventually applied.
    pub released: u32,
    /// Waiting commands thrown away by a stop.
    pub discarded: u32,
}

impl Statistics {
    /// All counters at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            total_received: 0,
            executed_immediately: 0,
            queued: 0,
            dropped: 0,
            reversals: 0,
            released: 0,
            discarded: 0,
        }
    }

    /// `total_received == executed_immediately + queued + dropped`.
    #[must_use]
    pub fn is_conserved(&self) -> bool {
        u64::from(self.executed_immediately)
            .saturating_add(u64::from(self.queued))
            .saturating_add(u64::from(self.dropped))
            == u64::from(self.total_received)
    }

    /// Commands currently waiting (queued or deferred) that have not been released or discarded.
    #[must_use]
    pub const fn outstanding(&self) -> u32 {
        self.queued
            .saturating_sub(self.released)
            .saturating_sub(self.discarded)
    }

    pub(crate) const fn record_received(&mut self) {
        self.total_received = self.total_received.saturating_add(1);
    }

    pub(crate) const fn record_executed(&mut self) {
        self.executed_immediately = self.executed_immediately.saturating_add(1);
    }

    pub(crate) const fn record_queued(&mut self) {
        self.queued = self.queued.saturating_add(1);
    }

    pub(crate) const fn record_deferred(&mut self) {
        self.queued = self.queued.saturating_add(1);
        self.reversals = self.reversals.saturating_add(1);
    }

    pub(crate) const fn record_reversal(&mut self) {
        self.reversals = self.reversals.saturating_add(1);
    }

    pub(crate) const fn record_dropped(&mut self) {
        self.dropped = self.dropped.saturating_add(1);
    }

    pub(crate) const fn record_released(&mut self) {
        self.released = self.released.saturating_add(1);
    }

    pub(crate) const fn record_discarded(&mut self, count: u32) {
        self.discarded = self.discarded.saturating_add(count);
    }
}
