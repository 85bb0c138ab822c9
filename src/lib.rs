//! Non-blocking command scheduling for a differential-drive robot that takes orders over the network.
//!
//! The heart of the crate is [`CommandScheduler`](scheduler::CommandScheduler): it accepts motion
//! commands, inserts a dead-time before reversing direction, stops each motion after a fixed
//! duration, and queues commands that arrive while the motors are busy (bounded, with drop counts).
//!
//! Everything in the default build is hardware independent and runs on the host. The `embedded`
//! feature adds the embassy device task and the RP2040/RP235x PWM wiring.
//!
//! # Glossary
//!
//! - **H-bridge:** driver circuit with two directional current paths per motor, each controlled
//!   by its own signal. This crate drives both inputs with PWM.
//! - **PWM duty:** fraction of a fixed period the output is held high, used here as motor
//!   speed in the range 0-255.
//! - **Dead-time:** mandatory pause inserted before a Forward/Backward reversal.
//! - **Auto-stop:** the automatic return to `Stopped` once a motion's duration has elapsed.
//! - **Backpressure:** rejecting new commands (rather than blocking or buffering without bound)
//!   once the command queue is full.
#![cfg_attr(not(test), no_std)]

// Compile-time checks: the embedded build needs exactly one board
#[cfg(all(feature = "embedded", not(any(feature = "pico1", feature = "pico2"))))]
compile_error!("The 'embedded' feature needs a board feature: 'pico1' or 'pico2'");

#[cfg(all(feature = "embedded", not(feature = "arm")))]
compile_error!("The 'embedded' feature needs the 'arm' architecture feature");

#[cfg(all(feature = "pico1", feature = "pico2"))]
compile_error!("Cannot enable both 'pico1' and 'pico2' features simultaneously");

#[macro_use]
mod log;

pub mod command;
pub mod command_queue;
#[cfg(feature = "embedded")]
pub mod controller;
mod error;
pub mod motion;
pub mod motor_driver;
pub mod pwm_port;
pub mod reversal_guard;
pub mod scheduler;
pub mod statistics;

// Re-export error types and result (used throughout)
pub use crate::error::{Error, Result};
