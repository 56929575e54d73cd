//! Test assertions for outcomes and emitted events.

use crate::events::CollectingEventSink;
use crate::outcome::{ErrorKind, Outcome};
use std::fmt::Debug;

/// Asserts that the outcome succeeded.
pub fn assert_success<T: Debug>(outcome: &Outcome<T>) {
    assert!(
        outcome.is_success(),
        "Expected success, got failure: {}",
        outcome.error()
    );
}

/// Asserts that the outcome failed.
pub fn assert_failure<T: Debug>(outcome: &Outcome<T>) {
    assert!(
        outcome.is_failure(),
        "Expected failure, got success: {:?}",
        outcome
    );
}

/// Asserts that the outcome failed with the given kind.
pub fn assert_failure_kind<T: Debug>(outcome: &Outcome<T>, expected: ErrorKind) {
    assert_failure(outcome);
    assert_eq!(
        outcome.error().kind(),
        expected,
        "Expected error kind {}, got {}",
        expected,
        outcome.error().kind()
    );
}

/// Asserts that the outcome failed with the given error code.
pub fn assert_error_code<T: Debug>(outcome: &Outcome<T>, code: &str) {
    assert_failure(outcome);
    assert_eq!(
        outcome.error().code(),
        code,
        "Expected error code '{}', got '{}'",
        code,
        outcome.error().code()
    );
}

/// Asserts that the outcome's error message contains `fragment`.
pub fn assert_error_contains<T: Debug>(outcome: &Outcome<T>, fragment: &str) {
    assert_failure(outcome);
    assert!(
        outcome.error().message().contains(fragment),
        "Expected error message to contain '{}', got '{}'",
        fragment,
        outcome.error().message()
    );
}

/// Asserts that exactly `expected` events of `event_type` were collected.
pub fn assert_event_count(sink: &CollectingEventSink, event_type: &str, expected: usize) {
    let actual = sink.count(event_type);
    assert_eq!(
        actual, expected,
        "Expected {} '{}' events, got {}",
        expected, event_type, actual
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::Error;

    #[test]
    fn test_assertions_accept_matching_outcomes() {
        assert_success(&Outcome::success(1));

        let failed: Outcome<u32> = Outcome::failure(Error::not_found("Product.NotFound", "Product 7 was not found"));
        assert_failure(&failed);
        assert_failure_kind(&failed, ErrorKind::NotFound);
        assert_error_code(&failed, "Product.NotFound");
        assert_error_contains(&failed, "was not found");
    }

    #[test]
    #[should_panic(expected = "Expected failure")]
    fn test_assert_failure_rejects_success() {
        assert_failure(&Outcome::ok());
    }

    #[test]
    #[should_panic(expected = "Expected error kind")]
    fn test_assert_failure_kind_rejects_other_kind() {
        let failed: Outcome = Outcome::failure(Error::conflict("Basket.Conflict", "taken"));
        assert_failure_kind(&failed, ErrorKind::Validation);
    }
}
