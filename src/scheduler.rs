//! The non-blocking motor command scheduler.
//!
//! [`CommandScheduler`] is the single owner of the motion state, the reversal guard, the
//! command queue and the counters. It never sleeps: callers hand it a timestamp with every
//! submission and call [`on_tick`](CommandScheduler::on_tick) periodically so it can stop
//! finished motions and release waiting ones.
//!
//! # Example
//!
//! ```rust
//! use drive_envoy::motion::MotionKind;
//! use drive_envoy::pwm_port::{PwmChannel, PwmOutput};
//! use drive_envoy::scheduler::{CommandScheduler, Outcome, TickEvent};
//! use embassy_time::{Duration, Instant};
//!
//! struct NullPort;
//! impl PwmOutput for NullPort {
//!     fn set_duty(&mut self, _channel: PwmChannel, _duty: u8) {}
//! }
//!
//! let start = Instant::from_millis(0);
//! let mut scheduler: CommandScheduler<_> = CommandScheduler::new(NullPort, start);
//!
//! assert_eq!(scheduler.submit(MotionKind::Forward, 150, start), Outcome::Executed);
//! assert_eq!(scheduler.submit(MotionKind::Left, 150, start), Outcome::Queued);
//!
//! // Forward runs for 1.5 s, then the queued turn takes over.
//! let later = start + Duration::from_millis(1_500);
//! assert!(matches!(scheduler.on_tick(later), TickEvent::Released(_)));
//! assert_eq!(scheduler.current().kind, MotionKind::Left);
//! ```

use serde::{Deserialize, Serialize};

use embassy_time::Instant;

use crate::command::{CommandReply, CommandRequest, DEFAULT_SPEED};
use crate::command_queue::{CommandQueue, DEFAULT_QUEUE_CAPACITY, PendingCommand};
use crate::motion::{Motion, MotionKind, MotionStateMachine};
use crate::motor_driver::MotorDriver;
use crate::pwm_port::PwmOutput;
use crate::reversal_guard::ReversalGuard;
use crate::statistics::Statistics;

/// What happened to a submitted command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    /// Applied to the motors right away.
    Executed,
    /// A reversal: the motors were stopped and the command runs after the dead-time.
    Deferred,
    /// Waiting in the queue for the current motion to finish.
    Queued,
    /// The queue was full; the command was dropped.
    Rejected,
}

/// What a call to [`CommandScheduler::on_tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TickEvent {
    /// Nothing was due.
    Idle,
    /// A motion ran out and the robot stopped; nothing was waiting.
    Completed,
    /// A motion ran out and this queued command was applied.
    Released(PendingCommand),
    /// A motion ran out and the next queued command reverses it; it waits out the dead-time.
    ReversalDeferred(PendingCommand),
    /// The reversal dead-time passed and this deferred command was applied.
    ReversalReleased(PendingCommand),
}

/// Side-effect-free snapshot of the scheduler, shaped for a stats endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Diagnostics {
    /// Counters.
    pub stats: Statistics,
    /// The motion currently applied (serialized as `STOPPED`, `FORWARD`, ...).
    pub current_state: MotionKind,
    /// True while a reversal waits out its dead-time.
    pub waiting_for_change: bool,
    /// Commands waiting in the queue.
    pub queue_size: u32,
    /// Commands that may be in flight at once, running motion included.
    pub queue_capacity: u32,
    /// True while an auto-stop deadline is armed.
    pub auto_stop_enabled: bool,
    /// Speed used when a request does not name one.
    pub default_speed: u8,
}

#[allow(
    clippy::cast_possible_truncation,
    reason = "the default capacity is a small constant"
)]
const DEFAULT_CAPACITY_U32: u32 = DEFAULT_QUEUE_CAPACITY as u32;

impl Diagnostics {
    /// What a fresh scheduler with the default capacity reports, before any command.
    #[must_use]
    pub const fn at_rest() -> Self {
        Self {
            stats: Statistics::new(),
            current_state: MotionKind::Stopped,
            waiting_for_change: false,
            queue_size: 0,
            queue_capacity: DEFAULT_CAPACITY_U32,
            auto_stop_enabled: false,
            default_speed: DEFAULT_SPEED,
        }
    }
}

/// Accepts motion commands and turns them into timed PWM output.
///
/// Decision order for [`submit`](Self::submit):
///
/// 1. [`MotionKind::Stopped`] always wins: waiting work is discarded and the motors stop.
/// 2. Reversing a running Forward/Backward motion with nothing queued stops the motors and
///    defers the command by [`REVERSAL_DEAD_TIME`](crate::reversal_guard::REVERSAL_DEAD_TIME).
/// 3. While a motion runs or a reversal is pending, the command is queued, or rejected once
///    `N` commands are in flight.
/// 4. Otherwise the command is applied at once.
///
/// `N` bounds everything admitted and not yet finished: the running (or deferred) motion
/// counts as one, so at most `N - 1` commands wait behind it. Queued commands are released
/// one per completed motion, oldest first.
/// A released command that reverses the motion it follows waits out the dead-time too.
pub struct CommandScheduler<P, const N: usize = DEFAULT_QUEUE_CAPACITY> {
    driver: MotorDriver<P>,
    machine: MotionStateMachine,
    guard: ReversalGuard,
    queue: CommandQueue<N>,
    statistics: Statistics,
    default_speed: u8,
}

impl<P: PwmOutput, const N: usize> CommandScheduler<P, N> {
    /// Take over `port`, zero all four channels and start out stopped.
    pub fn new(port: P, now: Instant) -> Self {
        let mut driver = MotorDriver::new(port);
        driver.apply(MotionKind::Stopped, 0);
        info!("scheduler ready, queue capacity {}", N);
        Self {
            driver,
            machine: MotionStateMachine::new(now),
            guard: ReversalGuard::new(),
            queue: CommandQueue::new(),
            statistics: Statistics::new(),
            default_speed: DEFAULT_SPEED,
        }
    }

    /// Submit a motion command received at `now`.
    pub fn submit(&mut self, kind: MotionKind, speed: u8, now: Instant) -> Outcome {
        self.statistics.record_received();
        let command = PendingCommand::new(kind, speed);

        if kind == MotionKind::Stopped {
            self.discard_waiting();
            self.enter(command, now);
            self.statistics.record_executed();
            info!("stop");
            return Outcome::Executed;
        }

        let current = self.machine.current().kind;
        if self.machine.is_running() && current.is_reversal_to(kind) && self.queue.is_empty() {
            self.enter(PendingCommand::new(MotionKind::Stopped, 0), now);
            self.guard.engage(command, now);
            self.statistics.record_deferred();
            info!("{} -> {}: reversal deferred", current.wire_name(), kind.wire_name());
            return Outcome::Deferred;
        }

        if self.is_busy() {
            let admitted = self.in_flight() < N && self.queue.push(command).is_ok();
            if !admitted {
                self.statistics.record_dropped();
                warn!("queue full, dropped {}", kind.wire_name());
                return Outcome::Rejected;
            }
            self.statistics.record_queued();
            debug!("queued {} ({} waiting)", kind.wire_name(), self.queue.len());
            return Outcome::Queued;
        }

        self.enter(command, now);
        self.statistics.record_executed();
        info!("executing {} speed={}", kind.wire_name(), speed);
        Outcome::Executed
    }

    /// Submit a parsed request, filling in the default speed, and describe the result.
    pub fn submit_request(&mut self, request: &CommandRequest, now: Instant) -> CommandReply {
        let speed = request.speed.unwrap_or(self.default_speed);
        let outcome = self.submit(request.kind, speed, now);
        CommandReply {
            outcome,
            action: request.kind,
            default_speed: self.default_speed,
            queue_depth: saturating_u32(self.queue.len()),
            dropped: self.statistics.dropped,
        }
    }

    /// Stop the motors now. Same as submitting [`MotionKind::Stopped`].
    pub fn stop(&mut self, now: Instant) -> Outcome {
        self.submit(MotionKind::Stopped, 0, now)
    }

    /// Advance time: release a due reversal, or auto-stop a finished motion and start the
    /// next queued command.
    pub fn on_tick(&mut self, now: Instant) -> TickEvent {
        if let Some(command) = self.guard.poll(now) {
            self.enter(command, now);
            self.statistics.record_released();
            info!("dead-time over, executing {}", command.kind.wire_name());
            return TickEvent::ReversalReleased(command);
        }
        if self.guard.is_active() {
            return TickEvent::Idle;
        }

        let finished = self.machine.current().kind;
        let Some(stopped) = self.machine.on_tick(now) else {
            return TickEvent::Idle;
        };
        self.driver.apply(stopped.kind, stopped.speed);

        match self.queue.pop() {
            Some(command) if finished.is_reversal_to(command.kind) => {
                self.guard.engage(command, now);
                self.statistics.record_reversal();
                info!(
                    "{} -> {}: queued reversal deferred",
                    finished.wire_name(),
                    command.kind.wire_name()
                );
                TickEvent::ReversalDeferred(command)
            }
            Some(command) => {
                self.enter(command, now);
                self.statistics.record_released();
                debug!("dequeued {} ({} left)", command.kind.wire_name(), self.queue.len());
                TickEvent::Released(command)
            }
            None => TickEvent::Completed,
        }
    }

    /// Change the speed used by requests that do not name one. Touches nothing else.
    pub fn set_default_speed(&mut self, speed: u8) {
        debug!("default speed {} -> {}", self.default_speed, speed);
        self.default_speed = speed;
    }

    /// Speed used by requests that do not name one.
    #[must_use]
    pub const fn default_speed(&self) -> u8 {
        self.default_speed
    }

    /// The motion currently applied.
    #[must_use]
    pub const fn current(&self) -> Motion {
        self.machine.current()
    }

    /// Counters so far.
    #[must_use]
    pub const fn statistics(&self) -> Statistics {
        self.statistics
    }

    /// Number of queued commands (not counting a deferred reversal).
    #[must_use]
    pub const fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Queued commands, oldest first.
    pub fn queued(&self) -> impl Iterator<Item = PendingCommand> + '_ {
        self.queue.iter()
    }

    /// The reversal waiting out its dead-time, if any.
    #[must_use]
    pub const fn deferred(&self) -> Option<PendingCommand> {
        self.guard.pending()
    }

    /// Commands admitted but not finished: the running or deferred motion plus the queue.
    ///
    /// New work is rejected once this reaches `N`.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        let active = usize::from(self.is_busy());
        self.queue.len().saturating_add(active)
    }

    /// True while a motion runs or a reversal is pending.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.machine.is_running() || self.guard.is_active()
    }

    /// Snapshot for a stats endpoint.
    #[must_use]
    pub fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            stats: self.statistics,
            current_state: self.machine.current().kind,
            waiting_for_change: self.guard.is_active(),
            queue_size: saturating_u32(self.queue.len()),
            queue_capacity: saturating_u32(N),
            auto_stop_enabled: self.machine.deadline().is_some(),
            default_speed: self.default_speed,
        }
    }

    /// Borrow the PWM port.
    pub const fn port(&self) -> &P {
        self.driver.port()
    }

    fn enter(&mut self, command: PendingCommand, now: Instant) {
        let motion = self.machine.enter(command.kind, command.speed, now);
        self.driver.apply(motion.kind, motion.speed);
    }

    fn discard_waiting(&mut self) {
        let mut discarded = saturating_u32(self.queue.clear());
        if self.guard.cancel().is_some() {
            discarded = discarded.saturating_add(1);
        }
        if discarded > 0 {
            self.statistics.record_discarded(discarded);
            debug!("stop discarded {} waiting command(s)", discarded);
        }
    }
}

fn saturating_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
