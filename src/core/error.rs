// Comparator Errors
// Failure taxonomy for the temporal-precedence comparator

use std::fmt;
use thiserror::Error;

/// Which input of a comparison an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    A,
    B,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::A => f.write_str("A"),
            Side::B => f.write_str("B"),
        }
    }
}

/// Why an argument was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidReason {
    /// The record reference itself was absent
    Absent,
    /// The record has no entry under the named field
    MissingField(String),
}

/// Coarse error category, for callers that only branch on the kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    MalformedTimestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComparatorError {
    #[error("{}", invalid_message(.side, .reason))]
    InvalidArgument { side: Side, reason: InvalidReason },

    #[error("the record {side} has a malformed timestamp: {value:?}")]
    MalformedTimestamp { side: Side, value: String },
}

fn invalid_message(side: &Side, reason: &InvalidReason) -> String {
    match reason {
        InvalidReason::Absent => format!("the record {side} should not be absent"),
        InvalidReason::MissingField(field) => {
            format!("the record {side} should contain the field {field}")
        }
    }
}

impl ComparatorError {
    pub fn absent(side: Side) -> Self {
        Self::InvalidArgument { side, reason: InvalidReason::Absent }
    }

    pub fn missing_field(side: Side, field: impl Into<String>) -> Self {
        Self::InvalidArgument {
            side,
            reason: InvalidReason::MissingField(field.into()),
        }
    }

    pub fn malformed(side: Side, value: impl Into<String>) -> Self {
        Self::MalformedTimestamp { side, value: value.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::MalformedTimestamp { .. } => ErrorKind::MalformedTimestamp,
        }
    }

    /// The side the error was raised for
    pub fn side(&self) -> Side {
        match self {
            Self::InvalidArgument { side, .. } | Self::MalformedTimestamp { side, .. } => *side,
        }
    }
}
