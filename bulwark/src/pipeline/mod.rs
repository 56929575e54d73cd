//! Request pipeline: behaviors composed around a handler.
//!
//! Every request passes through the same fixed order of behaviors:
//!
//! 1. [`LoggingBehavior`] (outermost) logs start, end, and elapsed time
//! 2. [`ValidationBehavior`] rejects invalid requests before the handler
//! 3. [`ExceptionHandlingBehavior`] turns handler faults into failed outcomes
//! 4. the [`Handler`] itself
//!
//! The [`Mediator`] keeps one such pipeline per request type.

mod behavior;
mod builder;
mod exception;
mod integration_tests;
mod logging;
mod mediator;
mod request;
mod validation;

pub use behavior::{Behavior, Next};
pub use builder::{PipelineBuilder, RequestPipeline};
pub use exception::{ExceptionHandlingBehavior, UNHANDLED_ERROR_CODE};
pub use logging::{LoggingBehavior, DEFAULT_SLOW_THRESHOLD};
pub use mediator::Mediator;
pub use request::{DispatchContext, FnHandler, Handler, Request};
pub use validation::{ValidationBehavior, VALIDATION_ERROR_CODE};
