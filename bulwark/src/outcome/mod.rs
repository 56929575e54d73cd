//! Outcome and error model.
//!
//! Handlers report expected failures as data: an [`Outcome`] is either a
//! success value or a structured [`Error`]. The [`Response`] trait lets the
//! request pipeline build the failure form of any response type at compile
//! time.

mod error;
mod result;

pub use error::{Error, ErrorKind};
pub use result::Outcome;

/// Capability shared by every type a handler may return.
///
/// Responses with an error channel ([`Outcome`]) can be synthesized from an
/// [`Error`]; plain responses keep the defaults and let faults propagate as
/// errors instead.
pub trait Response: Sized + Send + 'static {
    /// Whether this response type can represent a failure as data.
    const CARRIES_ERRORS: bool = false;

    /// Builds the failure form of this response, if it has one.
    fn from_error(error: Error) -> Option<Self> {
        let _ = error;
        None
    }

    /// Returns the error this response reports, if it is a failure.
    fn reported_error(&self) -> Option<&Error> {
        None
    }
}

impl<T: Send + 'static> Response for Outcome<T> {
    const CARRIES_ERRORS: bool = true;

    fn from_error(error: Error) -> Option<Self> {
        Some(Self::failure(error))
    }

    fn reported_error(&self) -> Option<&Error> {
        self.is_failure().then(|| self.error())
    }
}

impl Response for () {}

impl Response for String {}

impl Response for serde_json::Value {}
