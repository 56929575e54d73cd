//! The success-or-failure outcome type.

use super::error::{Error, NONE};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum State<T> {
    Success(T),
    Failure(Error),
}

/// Outcome of an operation: a success value or a structured [`Error`].
///
/// `Outcome<()>` is the shape for operations that return nothing on success.
/// A failed outcome never carries [`Error::NONE`]; a successful one always
/// reports it from [`Outcome::error`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Outcome<T = ()> {
    state: State<T>,
}

impl Outcome<()> {
    /// Creates a successful outcome for an operation with no value.
    #[must_use]
    pub const fn ok() -> Self {
        Self {
            state: State::Success(()),
        }
    }
}

impl<T> Outcome<T> {
    /// Creates a successful outcome carrying `value`.
    #[must_use]
    pub const fn success(value: T) -> Self {
        Self {
            state: State::Success(value),
        }
    }

    /// Creates a failed outcome.
    ///
    /// # Panics
    ///
    /// Panics if `error` is [`Error::NONE`]; a failure must say what failed.
    #[must_use]
    pub fn failure(error: Error) -> Self {
        assert!(
            !error.is_none(),
            "a failed outcome must carry an error, got Error::NONE"
        );
        Self {
            state: State::Failure(error),
        }
    }

    /// Returns true if the operation succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.state, State::Success(_))
    }

    /// Returns true if the operation failed.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        !self.is_success()
    }

    /// Returns the error, or [`Error::NONE`] on success.
    #[must_use]
    pub fn error(&self) -> &Error {
        match &self.state {
            State::Success(_) => &NONE,
            State::Failure(error) => error,
        }
    }

    /// Returns the success value.
    ///
    /// # Panics
    ///
    /// Panics on a failed outcome. Reading a value that does not exist is a
    /// programming error, not a business failure.
    #[must_use]
    pub fn value(&self) -> &T {
        match &self.state {
            State::Success(value) => value,
            State::Failure(error) => panic!("cannot access the value of a failed outcome: {error}"),
        }
    }

    /// Consumes the outcome and returns the success value.
    ///
    /// # Panics
    ///
    /// Panics on a failed outcome, like [`Outcome::value`].
    #[must_use]
    pub fn into_value(self) -> T {
        match self.state {
            State::Success(value) => value,
            State::Failure(error) => panic!("cannot access the value of a failed outcome: {error}"),
        }
    }

    /// Converts into a standard `Result`.
    pub fn into_result(self) -> Result<T, Error> {
        match self.state {
            State::Success(value) => Ok(value),
            State::Failure(error) => Err(error),
        }
    }

    /// Maps the success value, leaving failures untouched.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self.state {
            State::Success(value) => Outcome::success(f(value)),
            State::Failure(error) => Outcome {
                state: State::Failure(error),
            },
        }
    }

    /// Chains another fallible step onto a success.
    pub fn and_then<U, F: FnOnce(T) -> Outcome<U>>(self, f: F) -> Outcome<U> {
        match self.state {
            State::Success(value) => f(value),
            State::Failure(error) => Outcome {
                state: State::Failure(error),
            },
        }
    }
}

impl<T> From<Error> for Outcome<T> {
    fn from(error: Error) -> Self {
        Self::failure(error)
    }
}

impl<T> From<Outcome<T>> for Result<T, Error> {
    fn from(outcome: Outcome<T>) -> Self {
        outcome.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::ErrorKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_success_reports_none_error() {
        let outcome = Outcome::success(42);
        assert!(outcome.is_success());
        assert!(!outcome.is_failure());
        assert!(outcome.error().is_none());
        assert_eq!(*outcome.value(), 42);
    }

    #[test]
    fn test_void_success() {
        let outcome = Outcome::ok();
        assert!(outcome.is_success());
        assert_eq!(outcome.error(), &Error::NONE);
    }

    #[test]
    fn test_failure_carries_error() {
        let error = Error::not_found("Basket.NotFound", "no basket for alice");
        let outcome: Outcome<String> = Outcome::failure(error.clone());

        assert!(outcome.is_failure());
        assert_eq!(outcome.error(), &error);
        assert_eq!(outcome.error().kind(), ErrorKind::NotFound);
    }

    #[test]
    #[should_panic(expected = "must carry an error")]
    fn test_failure_with_none_panics() {
        let _ = Outcome::<()>::failure(Error::NONE);
    }

    #[test]
    #[should_panic(expected = "cannot access the value")]
    fn test_value_on_failure_panics() {
        let outcome: Outcome<i32> = Outcome::failure(Error::failure("x", "boom"));
        let _ = outcome.value();
    }

    #[test]
    fn test_invariant_holds_for_all_constructors() {
        let outcomes: Vec<Outcome<u8>> = vec![
            Outcome::success(1),
            Outcome::failure(Error::failure("a", "b")),
            Error::conflict("c", "d").into(),
        ];

        for outcome in outcomes {
            assert_eq!(outcome.is_success(), outcome.error().is_none());
        }
    }

    #[test]
    fn test_map_and_then() {
        let doubled = Outcome::success(21).map(|v| v * 2);
        assert_eq!(*doubled.value(), 42);

        let failed: Outcome<i32> = Outcome::success(1)
            .and_then(|_| Outcome::<i32>::failure(Error::validation("V", "bad")));
        assert_eq!(failed.error().code(), "V");

        let untouched: Outcome<i32> =
            Outcome::<i32>::failure(Error::failure("F", "x")).map(|v| v + 1);
        assert_eq!(untouched.error().code(), "F");
    }

    #[test]
    fn test_into_result() {
        assert_eq!(Outcome::success("v").into_result(), Ok("v"));

        let err = Error::unauthorized("Auth", "nope");
        let res: Result<(), Error> = Outcome::failure(err.clone()).into();
        assert_eq!(res, Err(err));
    }
}
