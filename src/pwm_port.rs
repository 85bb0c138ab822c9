//! The four PWM channels that feed a dual H-bridge.
//!
//! [`PwmOutput`] is the seam between the scheduler and hardware. [`HalPwmPort`] adapts any
//! four `embedded-hal` PWM outputs to it; with the `embedded` feature,
//! [`rp_pwm::pwm_port_from_slices`] builds one from two RP PWM slices.
//!
//! Each motor has two H-bridge inputs. Driving one with PWM while the other is held at zero
//! spins the motor in that direction; both at zero lets it coast.
//!
//! | forward input | reverse input | Motor      |
//! |---------------|---------------|------------|
//! | 0             | 0             | Coast      |
//! | PWM           | 0             | Forward    |
//! | 0             | PWM           | Reverse    |

use embedded_hal::pwm::SetDutyCycle;

#[cfg(feature = "embedded")]
pub mod rp_pwm;

/// Largest duty value; `255` means "always on".
pub const DUTY_MAX: u8 = u8::MAX;

/// One H-bridge input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PwmChannel {
    /// Left motor, forward input.
    LeftForward,
    /// Left motor, reverse input.
    LeftReverse,
    /// Right motor, forward input.
    RightForward,
    /// Right motor, reverse input.
    RightReverse,
}

impl PwmChannel {
    /// All four channels.
    pub const ALL: [Self; 4] = [
        Self::LeftForward,
        Self::LeftReverse,
        Self::RightForward,
        Self::RightReverse,
    ];
}

/// Sink for duty writes.
///
/// Writes are fire-and-forget: there is nothing the scheduler could do about a failed write,
/// so implementations swallow hardware errors.
pub trait PwmOutput {
    /// Set `channel` to `duty` out of [`DUTY_MAX`].
    fn set_duty(&mut self, channel: PwmChannel, duty: u8);
}

impl<T: PwmOutput + ?Sized> PwmOutput for &mut T {
    fn set_duty(&mut self, channel: PwmChannel, duty: u8) {
        (**self).set_duty(channel, duty);
    }
}

/// A [`PwmOutput`] over four `embedded-hal` PWM outputs.
///
/// Duty values are scaled onto each output's own `max_duty_cycle`.
pub struct HalPwmPort<LF, LR, RF, RR> {
    left_forward: LF,
    left_reverse: LR,
    right_forward: RF,
    right_reverse: RR,
}

impl<LF, LR, RF, RR> HalPwmPort<LF, LR, RF, RR>
where
    LF: SetDutyCycle,
    LR: SetDutyCycle,
    RF: SetDutyCycle,
    RR: SetDutyCycle,
{
    /// Wrap four outputs. All of them are set to zero right away so the motors start coasting.
    pub fn new(left_forward: LF, left_reverse: LR, right_forward: RF, right_reverse: RR) -> Self {
        let mut port = Self {
            left_forward,
            left_reverse,
            right_forward,
            right_reverse,
        };
        for channel in PwmChannel::ALL {
            port.set_duty(channel, 0);
        }
        port
    }

    /// Give the outputs back.
    pub fn release(self) -> (LF, LR, RF, RR) {
        (
            self.left_forward,
            self.left_reverse,
            self.right_forward,
            self.right_reverse,
        )
    }
}

impl<LF, LR, RF, RR> PwmOutput for HalPwmPort<LF, LR, RF, RR>
where
    LF: SetDutyCycle,
    LR: SetDutyCycle,
    RF: SetDutyCycle,
    RR: SetDutyCycle,
{
    fn set_duty(&mut self, channel: PwmChannel, duty: u8) {
        let duty = u16::from(duty);
        let denominator = u16::from(DUTY_MAX);
        // Errors are dropped; see `PwmOutput`.
        match channel {
            PwmChannel::LeftForward => self
                .left_forward
                .set_duty_cycle_fraction(duty, denominator)
                .ok(),
            PwmChannel::LeftReverse => self
                .left_reverse
                .set_duty_cycle_fraction(duty, denominator)
                .ok(),
            PwmChannel::RightForward => self
                .right_forward
                .set_duty_cycle_fraction(duty, denominator)
                .ok(),
            PwmChannel::RightReverse => self
                .right_reverse
                .set_duty_cycle_fraction(duty, denominator)
                .ok(),
        };
    }
}
