//! Result of a single BLE operation.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The outcome of a connect, discover, read or disconnect request.
///
/// Outcomes are compared by their message, so `Failed("timeout")` equals
/// [`Outcome::TimedOut`]. This keeps outcomes that crossed a string boundary
/// (logs, event channels, platform callbacks) comparable with the canonical
/// variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    /// The completion signal did not arrive within the budget.
    TimedOut,
    /// Another operation was already in flight.
    Busy,
    NotConnected,
    /// Services have not been discovered yet.
    NotDiscovered,
    /// Failure reported by the transport or the peripheral.
    Failed(String),
}

impl Outcome {
    pub const TIMEOUT_MESSAGE: &'static str = "timeout";
    pub const BUSY_MESSAGE: &'static str = "busy";
    pub const NOT_CONNECTED_MESSAGE: &'static str = "not connected";
    pub const NOT_DISCOVERED_MESSAGE: &'static str = "not discovered";

    /// Create a failure with a custom message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn is_error(&self) -> bool {
        !self.is_success()
    }

    /// The error message, or `None` for [`Outcome::Success`].
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success => None,
            Self::TimedOut => Some(Self::TIMEOUT_MESSAGE),
            Self::Busy => Some(Self::BUSY_MESSAGE),
            Self::NotConnected => Some(Self::NOT_CONNECTED_MESSAGE),
            Self::NotDiscovered => Some(Self::NOT_DISCOVERED_MESSAGE),
            Self::Failed(message) => Some(message),
        }
    }

    /// Convert into a `Result` for callers that prefer `?`.
    pub fn into_result(self) -> Result<()> {
        match self {
            Self::Success => Ok(()),
            Self::TimedOut => Err(Error::TimedOut),
            Self::Busy => Err(Error::Busy),
            Self::NotConnected => Err(Error::NotConnected),
            Self::NotDiscovered => Err(Error::NotDiscovered),
            Self::Failed(message) => Err(Error::OperationFailed(message)),
        }
    }
}

impl PartialEq for Outcome {
    fn eq(&self, other: &Self) -> bool {
        self.message() == other.message()
    }
}

impl Eq for Outcome {}

impl Hash for Outcome {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.message().hash(state);
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message() {
            None => write!(f, "Success"),
            Some(message) => write!(f, "Error({})", message),
        }
    }
}

impl From<Error> for Outcome {
    fn from(err: Error) -> Self {
        match err {
            Error::TimedOut | Error::Timeout { .. } => Self::TimedOut,
            Error::Busy => Self::Busy,
            Error::NotConnected => Self::NotConnected,
            Error::NotDiscovered => Self::NotDiscovered,
            Error::OperationFailed(message) => Self::Failed(message),
            other => Self::Failed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Outcome::Success.to_string(), "Success");
        assert_eq!(Outcome::TimedOut.to_string(), "Error(timeout)");
        assert_eq!(Outcome::Busy.to_string(), "Error(busy)");
        assert_eq!(Outcome::NotConnected.to_string(), "Error(not connected)");
        assert_eq!(Outcome::NotDiscovered.to_string(), "Error(not discovered)");
        assert_eq!(
            Outcome::failed("read not permitted (2)").to_string(),
            "Error(read not permitted (2))"
        );
    }

    #[test]
    fn test_equality_by_message() {
        assert_eq!(Outcome::failed("timeout"), Outcome::TimedOut);
        assert_eq!(Outcome::failed("busy"), Outcome::Busy);
        assert_ne!(Outcome::failed("x"), Outcome::failed("y"));
        assert_ne!(Outcome::Success, Outcome::failed("Success"));

        let set: HashSet<Outcome> = [Outcome::TimedOut, Outcome::failed("timeout")]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_into_result() {
        assert!(Outcome::Success.into_result().is_ok());
        assert!(matches!(
            Outcome::NotConnected.into_result(),
            Err(Error::NotConnected)
        ));
        match Outcome::failed("boom").into_result() {
            Err(Error::OperationFailed(message)) => assert_eq!(message, "boom"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_from_error() {
        assert_eq!(Outcome::from(Error::Busy), Outcome::Busy);
        assert_eq!(Outcome::from(Error::NoAdapter).message(), Some("No Bluetooth adapter available"));
    }

    #[test]
    fn test_serde_roundtrip() {
        let json = serde_json::to_string(&Outcome::failed("boom")).unwrap();
        assert_eq!(json, r#"{"failed":"boom"}"#);
        let back: Outcome = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Outcome::failed("boom"));
        assert_eq!(serde_json::to_string(&Outcome::TimedOut).unwrap(), r#""timed_out""#);
    }
}
