//! Maps a [`MotionKind`] onto the four H-bridge inputs.

use crate::motion::MotionKind;
use crate::pwm_port::{PwmChannel, PwmOutput};

/// Turns motion intents into exactly four duty writes, two per motor.
///
/// Turns are spin turns: [`MotionKind::Left`] runs the left motor in reverse and the right
/// motor forward, [`MotionKind::Right`] is the mirror image.
///
/// On each motor the input being zeroed is written before the input being driven, so the
/// bridge never sees both inputs high.
///
/// # Example
///
/// ```rust
/// use drive_envoy::motion::MotionKind;
/// use drive_envoy::motor_driver::MotorDriver;
/// use drive_envoy::pwm_port::{PwmChannel, PwmOutput};
///
/// #[derive(Default)]
/// struct Duties([u8; 4]);
///
/// impl PwmOutput for Duties {
///     fn set_duty(&mut self, channel: PwmChannel, duty: u8) {
///         self.0[channel as usize] = duty;
///     }
/// }
///
/// let mut driver = MotorDriver::new(Duties::default());
/// driver.apply(MotionKind::Left, 200);
/// // left forward, left reverse, right forward, right reverse
/// assert_eq!(driver.port().0, [0, 200, 200, 0]);
/// ```
pub struct MotorDriver<P> {
    port: P,
}

/// Which way one motor turns.
#[derive(Clone, Copy)]
enum Spin {
    Forward,
    Reverse,
    Coast,
}

impl<P: PwmOutput> MotorDriver<P> {
    /// Take ownership of the port. Nothing is written until the first [`apply`](Self::apply).
    pub const fn new(port: P) -> Self {
        Self { port }
    }

    /// Drive both motors for `kind` at `speed`.
    pub fn apply(&mut self, kind: MotionKind, speed: u8) {
        let (left, right) = match kind {
            MotionKind::Stopped => (Spin::Coast, Spin::Coast),
            MotionKind::Forward => (Spin::Forward, Spin::Forward),
            MotionKind::Backward => (Spin::Reverse, Spin::Reverse),
            MotionKind::Left => (Spin::Reverse, Spin::Forward),
            MotionKind::Right => (Spin::Forward, Spin::Reverse),
        };
        trace!("motor apply {} speed={}", kind.wire_name(), speed);
        self.drive(PwmChannel::LeftForward, PwmChannel::LeftReverse, left, speed);
        self.drive(PwmChannel::RightForward, PwmChannel::RightReverse, right, speed);
    }

    fn drive(&mut self, forward: PwmChannel, reverse: PwmChannel, spin: Spin, speed: u8) {
        match spin {
            Spin::Forward => {
                self.port.set_duty(reverse, 0);
                self.port.set_duty(forward, speed);
            }
            Spin::Reverse => {
                self.port.set_duty(forward, 0);
                self.port.set_duty(reverse, speed);
            }
            Spin::Coast => {
                self.port.set_duty(forward, 0);
                self.port.set_duty(reverse, 0);
            }
        }
    }

    /// Borrow the port (useful for inspecting a mock in tests).
    pub const fn port(&self) -> &P {
        &self.port
    }

    /// Give the port back.
    pub fn into_port(self) -> P {
        self.port
    }
}
