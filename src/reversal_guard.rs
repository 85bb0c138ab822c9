//! Dead-time before a Forward/Backward reversal.
//!
//! Flipping an H-bridge from one direction straight into the other slams the motors and the
//! supply. When a reversal is requested the scheduler stops the motors, parks the request in
//! the guard's single slot, and applies it once [`REVERSAL_DEAD_TIME`] has passed.

use embassy_time::{Duration, Instant};

use crate::command_queue::PendingCommand;

/// Pause between stopping and driving the opposite way.
pub const REVERSAL_DEAD_TIME: Duration = Duration::from_millis(150);

/// One-slot holding area for a reversal waiting out its dead-time.
#[derive(Debug, Clone, Default)]
pub struct ReversalGuard {
    pending: Option<(PendingCommand, Instant)>,
}

impl ReversalGuard {
    /// An inactive guard.
    #[must_use]
    pub const fn new() -> Self {
        Self { pending: None }
    }

    /// Hold `command` until `now + REVERSAL_DEAD_TIME`.
    ///
    /// Any command already held is replaced and returned. The scheduler never engages an
    /// active guard, so in practice this is always `None`.
    pub fn engage(&mut self, command: PendingCommand, now: Instant) -> Option<PendingCommand> {
        let deadline = now
            .checked_add(REVERSAL_DEAD_TIME)
            .unwrap_or(Instant::MAX);
        debug!("reversal deferred until {}", deadline);
        self.pending
            .replace((command, deadline))
            .map(|(previous, _)| previous)
    }

    /// Release the held command once the dead-time has passed.
    pub fn poll(&mut self, now: Instant) -> Option<PendingCommand> {
        match self.pending {
            Some((command, deadline)) if now >= deadline => {
                self.pending = None;
                Some(command)
            }
            _ => None,
        }
    }

    /// Drop the held command, returning it.
    pub const fn cancel(&mut self) -> Option<PendingCommand> {
        match self.pending.take() {
            Some((command, _)) => Some(command),
            None => None,
        }
    }

    /// True while a command is waiting out its dead-time.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.pending.is_some()
    }

    /// When the held command becomes due.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        match self.pending {
            Some((_, deadline)) => Some(deadline),
            None => None,
        }
    }

    /// The held command, if any.
    #[must_use]
    pub const fn pending(&self) -> Option<PendingCommand> {
        match self.pending {
            Some((command, _)) => Some(command),
            None => None,
        }
    }
}
