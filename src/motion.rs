//! Motion kinds and the auto-stopping motion state machine.
//!
//! See [`MotionStateMachine`] for the deadline rules and [`MotionKind`] for the per-kind
//! behavior table.

use embassy_time::{Duration, Instant};
use serde::{Deserialize, Serialize};

/// How long a [`MotionKind::Forward`] lasts before the robot stops on its own.
pub const FORWARD_DURATION: Duration = Duration::from_millis(1_500);

/// How long a [`MotionKind::Backward`] lasts before the robot stops on its own.
pub const BACKWARD_DURATION: Duration = Duration::from_millis(1_500);

/// How long a [`MotionKind::Left`] or [`MotionKind::Right`] spin lasts.
pub const TURN_DURATION: Duration = Duration::from_millis(400);

/// Which way the wheels push the chassis along its long axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Polarity {
    /// Both motors forward.
    Forward,
    /// Both motors in reverse.
    Reverse,
    /// Not a straight-line motion (stopped, or spinning in place).
    Neutral,
}

/// The kind of motion the robot is performing.
///
/// Each kind carries its behavior table as `const fn`s: [`duration`](Self::duration),
/// [`polarity`](Self::polarity) and [`wire_name`](Self::wire_name).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotionKind {
    /// All four motor channels at zero.
    #[default]
    Stopped,
    /// Both motors forward.
    Forward,
    /// Both motors in reverse.
    Backward,
    /// Spin counter-clockwise: left motor reverse, right motor forward.
    Left,
    /// Spin clockwise: left motor forward, right motor reverse.
    Right,
}

impl MotionKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Stopped,
        Self::Forward,
        Self::Backward,
        Self::Left,
        Self::Right,
    ];

    /// Fixed run time before auto-stop. `None` for [`Self::Stopped`].
    #[must_use]
    pub const fn duration(self) -> Option<Duration> {
        match self {
            Self::Stopped => None,
            Self::Forward => Some(FORWARD_DURATION),
            Self::Backward => Some(BACKWARD_DURATION),
            Self::Left | Self::Right => Some(TURN_DURATION),
        }
    }

    /// Straight-line direction of the motion.
    #[must_use]
    pub const fn polarity(self) -> Polarity {
        match self {
            Self::Forward => Polarity::Forward,
            Self::Backward => Polarity::Reverse,
            Self::Stopped | Self::Left | Self::Right => Polarity::Neutral,
        }
    }

    /// True when going from `self` to `next` flips Forward and Backward.
    ///
    /// Turns and anything involving [`Self::Stopped`] never count as a reversal.
    #[must_use]
    pub const fn is_reversal_to(self, next: Self) -> bool {
        matches!(
            (self.polarity(), next.polarity()),
            (Polarity::Forward, Polarity::Reverse) | (Polarity::Reverse, Polarity::Forward)
        )
    }

    /// Upper-case name used by the diagnostics endpoint.
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::Stopped => "STOPPED",
            Self::Forward => "FORWARD",
            Self::Backward => "BACKWARD",
            Self::Left => "LEFT",
            Self::Right => "RIGHT",
        }
    }

    /// Lower-case action name accepted in command requests.
    #[must_use]
    pub const fn action_name(self) -> &'static str {
        match self {
            Self::Stopped => "stop",
            Self::Forward => "forward",
            Self::Backward => "backward",
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

/// A motion that has been applied to the motors.
///
/// Replaced, never mutated, on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Motion {
    /// What the motors are doing.
    pub kind: MotionKind,
    /// PWM duty applied to the driven channels.
    pub speed: u8,
    /// When the motion was applied.
    pub started_at: Instant,
    /// Run time before auto-stop (zero for [`MotionKind::Stopped`]).
    pub duration: Duration,
}

impl Motion {
    /// The motion the robot powers up in.
    #[must_use]
    pub const fn stopped(now: Instant) -> Self {
        Self {
            kind: MotionKind::Stopped,
            speed: 0,
            started_at: now,
            duration: Duration::from_ticks(0),
        }
    }

    /// Point in time the motion auto-stops, or `None` if it never does.
    ///
    /// A deadline past the end of the clock is pinned to [`Instant::MAX`], which
    /// no tick ever reaches.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.kind.duration().map(|duration| {
            self.started_at
                .checked_add(duration)
                .unwrap_or(Instant::MAX)
        })
    }
}

/// Owns the current [`Motion`] and its auto-stop deadline.
///
/// The state machine does not touch hardware. Callers apply the returned motion
/// to a [`MotorDriver`](crate::motor_driver::MotorDriver).
#[derive(Debug, Clone)]
pub struct MotionStateMachine {
    current: Motion,
    deadline: Option<Instant>,
}

impl MotionStateMachine {
    /// Start out stopped at `now`.
    #[must_use]
    pub const fn new(now: Instant) -> Self {
        Self {
            current: Motion::stopped(now),
            deadline: None,
        }
    }

    /// Replace the current motion and arm its deadline.
    pub fn enter(&mut self, kind: MotionKind, speed: u8, now: Instant) -> Motion {
        let speed = if kind == MotionKind::Stopped { 0 } else { speed };
        let motion = Motion {
            kind,
            speed,
            started_at: now,
            duration: kind.duration().unwrap_or(Duration::from_ticks(0)),
        };
        self.current = motion;
        self.deadline = motion.deadline();
        if self.deadline == Some(Instant::MAX) {
            warn!("motion deadline overflows the clock; auto-stop disabled");
        }
        motion
    }

    /// Stop the motion if its deadline has passed.
    ///
    /// Returns the new (stopped) motion when the running motion completed on this
    /// tick. That is the only signal that lets queued commands run.
    pub fn on_tick(&mut self, now: Instant) -> Option<Motion> {
        let deadline = self.deadline?;
        if self.current.kind == MotionKind::Stopped || now < deadline {
            return None;
        }
        debug!("auto-stop after {}", self.current.kind.wire_name());
        Some(self.enter(MotionKind::Stopped, 0, now))
    }

    /// The motion currently applied.
    #[must_use]
    pub const fn current(&self) -> Motion {
        self.current
    }

    /// The armed auto-stop deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// True while anything other than [`MotionKind::Stopped`] is applied.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.current.kind != MotionKind::Stopped
    }
}
