//! Crate-wide error type.

use derive_more::{Debug, Display, Error};

/// Errors returned by `drive_envoy`.
///
/// A full command queue is not an error: it is reported as
/// [`Outcome::Rejected`](crate::scheduler::Outcome::Rejected) because backpressure is an
/// expected result of submitting work to a busy robot.
#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The action is not one of `forward`, `backward`, `left`, `right`, `stop`.
    #[display("unrecognized action")]
    UnknownAction,

    /// A query string had no `action` (or, for speed requests, no value).
    #[display("query is missing a required field")]
    InvalidQuery,

    /// A PWM slice did not yield both of its output channels.
    #[display("PWM channel unavailable")]
    PwmChannelUnavailable,

    /// The motor controller task could not be spawned.
    #[cfg(feature = "embedded")]
    #[display("failed to spawn task: {_0:?}")]
    TaskSpawn(#[error(not(source))] embassy_executor::SpawnError),
}

#[cfg(feature = "embedded")]
impl From<embassy_executor::SpawnError> for Error {
    fn from(err: embassy_executor::SpawnError) -> Self {
        Self::TaskSpawn(err)
    }
}

/// Result alias using the crate's [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;
