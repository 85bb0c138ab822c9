//! Fixed-capacity FIFO of commands waiting for the motors.

use crate::motion::MotionKind;

/// Default number of commands that can wait while a motion runs.
pub const DEFAULT_QUEUE_CAPACITY: usize = 5;

/// A motion request that has not been applied yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PendingCommand {
    /// Requested motion.
    pub kind: MotionKind,
    /// Requested duty, already clamped.
    pub speed: u8,
}

impl PendingCommand {
    /// Placeholder stored in free slots.
    const VACANT: Self = Self {
        kind: MotionKind::Stopped,
        speed: 0,
    };

    /// A request for `kind` at `speed`.
    #[must_use]
    pub const fn new(kind: MotionKind, speed: u8) -> Self {
        Self { kind, speed }
    }
}

/// Ring buffer of [`PendingCommand`]s over a `[_; N]` array.
///
/// `push` never blocks and never evicts: when the queue already holds `N` commands the new
/// one is handed back to the caller. No heap is used.
#[derive(Debug, Clone)]
pub struct CommandQueue<const N: usize = DEFAULT_QUEUE_CAPACITY> {
    slots: [PendingCommand; N],
    head: usize,
    len: usize,
}

impl<const N: usize> Default for CommandQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> CommandQueue<N> {
    /// An empty queue.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: [PendingCommand::VACANT; N],
            head: 0,
            len: 0,
        }
    }

    /// Append `command` at the tail.
    ///
    /// # Errors
    ///
    /// Returns the command back if the queue is full.
    pub fn push(&mut self, command: PendingCommand) -> Result<(), PendingCommand> {
        if self.is_full() {
            return Err(command);
        }
        let tail = Self::wrap(self.head.wrapping_add(self.len));
        let Some(slot) = self.slots.get_mut(tail) else {
            return Err(command);
        };
        *slot = command;
        self.len = self.len.wrapping_add(1);
        Ok(())
    }

    /// Remove and return the oldest command.
    pub fn pop(&mut self) -> Option<PendingCommand> {
        if self.is_empty() {
            return None;
        }
        let command = *self.slots.get(self.head)?;
        self.head = Self::wrap(self.head.wrapping_add(1));
        self.len = self.len.wrapping_sub(1);
        Some(command)
    }

    /// Look at the oldest command without removing it.
    #[must_use]
    pub fn peek(&self) -> Option<&PendingCommand> {
        if self.is_empty() {
            None
        } else {
            self.slots.get(self.head)
        }
    }

    /// Drop every waiting command, returning how many there were.
    pub const fn clear(&mut self) -> usize {
        let cleared = self.len;
        self.head = 0;
        self.len = 0;
        cleared
    }

    /// Number of waiting commands.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// True when nothing is waiting.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True when a `push` would be refused.
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.len >= N
    }

    /// Maximum number of waiting commands (`N`).
    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Waiting commands, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = PendingCommand> + '_ {
        (0..self.len).filter_map(move |offset| {
            self.slots
                .get(Self::wrap(self.head.wrapping_add(offset)))
                .copied()
        })
    }

    // `index` is always below `2 * N`, so one subtraction brings it back into range.
    const fn wrap(index: usize) -> usize {
        if index >= N { index.wrapping_sub(N) } else { index }
    }
}
