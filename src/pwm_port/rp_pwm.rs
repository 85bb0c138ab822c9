//! RP2040/RP235x wiring: two PWM slices, one per motor.
//!
//! Channel A of each slice drives the motor forward and channel B drives it in reverse, so a
//! typical build puts the left motor on PIN_0/PIN_1 (PWM_SLICE0) and the right motor on
//! PIN_2/PIN_3 (PWM_SLICE1).
//!
//! ```rust,no_run
//! # #![no_std]
//! # #![no_main]
//! # use panic_probe as _;
//! use drive_envoy::pwm_port::rp_pwm::{pwm_config, pwm_port_from_slices};
//! use embassy_rp::pwm::Pwm;
//!
//! async fn example(p: embassy_rp::Peripherals) -> drive_envoy::Result<()> {
//!     let left = Pwm::new_output_ab(p.PWM_SLICE0, p.PIN_0, p.PIN_1, pwm_config());
//!     let right = Pwm::new_output_ab(p.PWM_SLICE1, p.PIN_2, p.PIN_3, pwm_config());
//!     let _pwm_port = pwm_port_from_slices(left, right)?;
//!     Ok(())
//! }
//! ```

use embassy_rp::clocks::clk_sys_freq;
use embassy_rp::pwm::{Config, Pwm, PwmOutput as RpOutput};

use super::HalPwmPort;
use crate::{Error, Result};

/// Counter wrap value for the motor slices.
///
/// With the divider at 1 this gives 20 kHz at 125 MHz (RP2040) and 24 kHz at 150 MHz
/// (RP235x), both above the audible range.
pub const PWM_TOP: u16 = 6_249;

/// A [`HalPwmPort`] over the four RP PWM outputs.
pub type RpPwmPort<'d> = HalPwmPort<RpOutput<'d>, RpOutput<'d>, RpOutput<'d>, RpOutput<'d>>;

/// Slice configuration for motor PWM: edge-aligned, [`PWM_TOP`], both compares at zero.
#[must_use]
pub fn pwm_config() -> Config {
    let mut cfg = Config::default();
    cfg.top = PWM_TOP;
    cfg.phase_correct = false;
    cfg.divider = 1u8.into();
    cfg.compare_a = 0;
    cfg.compare_b = 0;
    cfg.enable = true;
    cfg
}

/// Build the motor port from the left and right slices.
///
/// Both slices are (re)configured with [`pwm_config`] before being split.
///
/// # Errors
///
/// Returns [`Error::PwmChannelUnavailable`] if a slice was not created with both outputs
/// (use `Pwm::new_output_ab`).
pub fn pwm_port_from_slices<'d>(mut left: Pwm<'d>, mut right: Pwm<'d>) -> Result<RpPwmPort<'d>> {
    let cfg = pwm_config();
    left.set_config(&cfg);
    right.set_config(&cfg);
    info!("motor pwm clk={}Hz top={}", clk_sys_freq(), PWM_TOP);

    let (left_a, left_b) = left.split();
    let (right_a, right_b) = right.split();
    let (Some(left_forward), Some(left_reverse), Some(right_forward), Some(right_reverse)) =
        (left_a, left_b, right_a, right_b)
    else {
        return Err(Error::PwmChannelUnavailable);
    };
    Ok(HalPwmPort::new(
        left_forward,
        left_reverse,
        right_forward,
        right_reverse,
    ))
}
