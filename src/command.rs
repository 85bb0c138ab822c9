//! Command requests as they arrive from the network, and the replies sent back.
//!
//! The router hands over the raw query string of `GET /command?action=forward&speed=150`
//! (or `GET /speed?value=200`); this module turns it into typed requests.
//!
//! # Example
//!
//! ```rust
//! use drive_envoy::command::CommandRequest;
//! use drive_envoy::motion::MotionKind;
//!
//! let request = CommandRequest::from_query("speed=300&action=Forward")?;
//! assert_eq!(request.kind, MotionKind::Forward);
//! assert_eq!(request.speed, Some(255)); // clamped
//! # Ok::<(), drive_envoy::Error>(())
//! ```

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::motion::MotionKind;
use crate::scheduler::Outcome;
use crate::{Error, Result};

/// Speed used when a request does not name one.
pub const DEFAULT_SPEED: u8 = 150;

impl FromStr for MotionKind {
    type Err = Error;

    /// Parse an action name, ignoring ASCII case and surrounding whitespace.
    fn from_str(action: &str) -> Result<Self> {
        let action = action.trim();
        MotionKind::ALL
            .into_iter()
            .find(|kind| kind.action_name().eq_ignore_ascii_case(action))
            .ok_or(Error::UnknownAction)
    }
}

/// A motion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CommandRequest {
    /// Requested motion.
    pub kind: MotionKind,
    /// Requested duty; `None` means "use the default speed".
    pub speed: Option<u8>,
}

impl CommandRequest {
    /// A request for `kind`, optionally at `speed`.
    #[must_use]
    pub const fn new(kind: MotionKind, speed: Option<u8>) -> Self {
        Self { kind, speed }
    }

    /// Build a request from an action name and optional speed text.
    ///
    /// A speed that is not a number falls back to the default speed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownAction`] if `action` is not a known action.
    pub fn parse(action: &str, speed: Option<&str>) -> Result<Self> {
        let kind = action.parse()?;
        Ok(Self::new(kind, speed.and_then(parse_speed)))
    }

    /// Build a request from a URL query such as `action=left&speed=120`.
    ///
    /// Keys may come in any order; unknown keys are ignored. A leading `?` is allowed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidQuery`] if there is no `action`, or [`Error::UnknownAction`] if
    /// the action is not recognized.
    pub fn from_query(query: &str) -> Result<Self> {
        let action = query_value(query, &["action"]).ok_or(Error::InvalidQuery)?;
        Self::parse(action, query_value(query, &["speed"]))
    }
}

/// A request that only changes the default speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SetSpeedRequest {
    /// New default speed, clamped.
    pub speed: u8,
}

impl SetSpeedRequest {
    /// Build a request from a URL query such as `value=200` or `speed=200`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidQuery`] if neither key is present or the value is not a number.
    pub fn from_query(query: &str) -> Result<Self> {
        let speed = query_value(query, &["speed", "value"])
            .and_then(parse_speed)
            .ok_or(Error::InvalidQuery)?;
        Ok(Self { speed })
    }
}

/// The reply to a [`CommandRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CommandReply {
    /// What the scheduler did with the command.
    pub outcome: Outcome,
    /// The requested action, echoed back.
    pub action: MotionKind,
    /// The default speed after the request.
    pub default_speed: u8,
    /// Commands waiting in the queue after the request.
    pub queue_depth: u32,
    /// Total commands dropped so far.
    pub dropped: u32,
}

/// Clamp any integer into the duty range `0..=255`.
#[must_use]
pub fn clamp_speed(value: i64) -> u8 {
    u8::try_from(value.clamp(0, i64::from(u8::MAX))).unwrap_or(u8::MAX)
}

/// Parse speed text, clamping out-of-range values.
///
/// Returns `None` when the text is not an integer at all.
#[must_use]
pub fn parse_speed(text: &str) -> Option<u8> {
    let text = text.trim();
    if let Ok(value) = text.parse::<i64>() {
        return Some(clamp_speed(value));
    }
    // Integers too long for i64 still saturate by sign.
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    Some(if negative { 0 } else { u8::MAX })
}

/// The value of the first pair whose key matches one of `keys` (ASCII case-insensitive).
fn query_value<'a>(query: &'a str, keys: &[&str]) -> Option<&'a str> {
    let query = query.strip_prefix('?').unwrap_or(query);
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        keys.iter()
            .any(|wanted| wanted.eq_ignore_ascii_case(key.trim()))
            .then_some(value)
    })
}
