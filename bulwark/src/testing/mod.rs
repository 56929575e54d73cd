//! Testing utilities for request pipelines and resilience policies.
//!
//! This module provides:
//! - Mock handlers and validators
//! - A flaky dependency for exercising retries and the circuit breaker
//! - Assertions for outcomes and collected events

mod assertions;
mod mocks;

pub use assertions::{
    assert_error_code, assert_error_contains, assert_event_count, assert_failure,
    assert_failure_kind, assert_success,
};
pub use mocks::{
    FailingHandler, FlakyOperation, PanickingHandler, SlowHandler, StaticHandler,
    StaticValidator, TransientError,
};
