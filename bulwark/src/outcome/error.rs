//! Structured error values carried by failed outcomes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a failure, used by transport glue to pick a response code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Generic or unexpected failure.
    #[default]
    Failure,
    /// The addressed entity does not exist.
    NotFound,
    /// Input constraints were violated.
    Validation,
    /// The operation conflicts with current state.
    Conflict,
    /// The caller is not allowed to perform the operation.
    Unauthorized,
}

impl ErrorKind {
    /// Returns the conventional HTTP status code for this kind.
    #[must_use]
    pub const fn status_code(self) -> u16 {
        match self {
            Self::Failure => 500,
            Self::NotFound => 404,
            Self::Validation => 400,
            Self::Conflict => 409,
            Self::Unauthorized => 401,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failure => write!(f, "failure"),
            Self::NotFound => write!(f, "not_found"),
            Self::Validation => write!(f, "validation"),
            Self::Conflict => write!(f, "conflict"),
            Self::Unauthorized => write!(f, "unauthorized"),
        }
    }
}

/// An immutable error value with a stable code, a message and a kind.
///
/// Two errors are equal when all three parts are equal. [`Error::NONE`] is
/// the "no error" sentinel reported by successful outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Error {
    code: String,
    message: String,
    kind: ErrorKind,
}

/// Backing storage so `&Error::NONE` can be handed out with a static lifetime.
pub(crate) static NONE: Error = Error::NONE;

impl Error {
    /// Sentinel representing the absence of an error.
    pub const NONE: Self = Self {
        code: String::new(),
        message: String::new(),
        kind: ErrorKind::Failure,
    };

    /// Creates a new error.
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            kind,
        }
    }

    /// Creates a generic failure.
    #[must_use]
    pub fn failure(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(code, message, ErrorKind::Failure)
    }

    /// Creates an error for a fault nobody anticipated.
    ///
    /// Unexpected faults share the [`ErrorKind::Failure`] kind.
    #[must_use]
    pub fn unexpected(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(code, message, ErrorKind::Failure)
    }

    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(code, message, ErrorKind::NotFound)
    }

    /// Creates a validation error.
    #[must_use]
    pub fn validation(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(code, message, ErrorKind::Validation)
    }

    /// Creates a conflict error.
    #[must_use]
    pub fn conflict(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(code, message, ErrorKind::Conflict)
    }

    /// Creates an unauthorized error.
    #[must_use]
    pub fn unauthorized(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(code, message, ErrorKind::Unauthorized)
    }

    /// Returns the error code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Returns the human readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns true if this is the [`Error::NONE`] sentinel.
    #[must_use]
    pub fn is_none(&self) -> bool {
        self == &NONE
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            return write!(f, "none");
        }
        write!(f, "[{}] {}: {}", self.kind, self.code, self.message)
    }
}

impl std::error::Error for Error {}
