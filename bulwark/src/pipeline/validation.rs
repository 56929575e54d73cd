//! Pre-handler validation gate.

use super::{Behavior, DispatchContext, Next, Request};
use crate::events::{timestamped, types, EventSink};
use crate::outcome::{Error, Response};
use crate::validation::{validate_all, ValidatorRegistry};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Error code carried by validation failures.
pub const VALIDATION_ERROR_CODE: &str = "Validation";

/// Runs the validators registered for a request before the handler.
///
/// Only responses with an error channel are validated; other response types
/// and requests without validators pass straight through. All violations are
/// joined with `"; "` into a single validation error, and the inner chain is
/// not invoked.
pub struct ValidationBehavior {
    validators: Arc<ValidatorRegistry>,
    events: Arc<dyn EventSink>,
}

impl ValidationBehavior {
    /// Creates a validation behavior backed by `validators`.
    #[must_use]
    pub fn new(validators: Arc<ValidatorRegistry>, events: Arc<dyn EventSink>) -> Self {
        Self { validators, events }
    }
}

impl std::fmt::Debug for ValidationBehavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationBehavior")
            .field("validators", &self.validators)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<Q: Request> Behavior<Q> for ValidationBehavior {
    fn name(&self) -> &'static str {
        "validation"
    }

    async fn handle(
        &self,
        request: &Q,
        ctx: &DispatchContext,
        next: Next<'_, Q>,
    ) -> anyhow::Result<Q::Response> {
        if !<Q::Response as Response>::CARRIES_ERRORS {
            return next.run(request, ctx).await;
        }

        let validators = self.validators.validators_for::<Q>();
        if validators.is_empty() {
            return next.run(request, ctx).await;
        }

        let violations = validate_all(&validators, request).await;
        if violations.is_empty() {
            debug!(request = Q::name(), validators = validators.len(), "Validation passed");
            return next.run(request, ctx).await;
        }

        let message = violations.join("; ");
        warn!(
            request = Q::name(),
            request_id = %ctx.request_id,
            violations = violations.len(),
            "Validation failed: {}",
            message
        );
        self.events.try_emit(
            types::REQUEST_INVALID,
            Some(timestamped(serde_json::json!({
                "request": Q::name(),
                "request_id": ctx.request_id.to_string(),
                "violations": violations,
            }))),
        );

        match Q::Response::from_error(Error::validation(VALIDATION_ERROR_CODE, message)) {
            Some(response) => Ok(response),
            // Unreachable for responses that carry errors.
            None => next.run(request, ctx).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{CollectingEventSink, NoOpEventSink};
    use crate::outcome::{ErrorKind, Outcome};
    use crate::pipeline::{FnHandler, Handler};
    use crate::validation::RuleSet;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone)]
    struct DeleteBasket {
        user_name: String,
    }

    impl Request for DeleteBasket {
        type Response = Outcome;
    }

    #[derive(Debug, Clone)]
    struct Ping {
        text: String,
    }

    impl Request for Ping {
        type Response = String;
    }

    async fn run<Q: Request>(
        registry: Arc<ValidatorRegistry>,
        sink: Arc<dyn EventSink>,
        handler: &dyn Handler<Q>,
        request: Q,
    ) -> anyhow::Result<Q::Response> {
        let behaviors: Vec<Arc<dyn Behavior<Q>>> = vec![Arc::new(ValidationBehavior::new(registry, sink))];
        Next::new(&behaviors, handler)
            .run(&request, &DispatchContext::default())
            .await
    }

    fn counting_handler(calls: Arc<AtomicUsize>) -> impl Handler<DeleteBasket> {
        FnHandler::new(move |_: DeleteBasket, _| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Outcome::ok())
            }
        })
    }

    #[tokio::test]
    async fn test_no_validators_reaches_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = counting_handler(calls.clone());

        let response = run(
            Arc::new(ValidatorRegistry::new()),
            Arc::new(NoOpEventSink),
            &handler,
            DeleteBasket {
                user_name: String::new(),
            },
        )
        .await
        .unwrap();

        assert!(response.is_success());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_violations_short_circuit_with_joined_message() {
        let registry = Arc::new(ValidatorRegistry::new());
        registry.register::<DeleteBasket, _>(
            RuleSet::<DeleteBasket>::new()
                .not_empty(|q: &DeleteBasket| q.user_name.as_str(), "UserName is required."),
        );
        registry.register::<DeleteBasket, _>(
            RuleSet::<DeleteBasket>::new()
                .rule(|q: &DeleteBasket| q.user_name.len() >= 3, "UserName is too short.")
                .rule(|q: &DeleteBasket| !q.user_name.contains(' '), "UserName has spaces."),
        );

        let calls = Arc::new(AtomicUsize::new(0));
        let handler = counting_handler(calls.clone());
        let sink = Arc::new(CollectingEventSink::new());

        let response = run(
            registry,
            sink.clone(),
            &handler,
            DeleteBasket {
                user_name: " ".to_string(),
            },
        )
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(response.error().kind(), ErrorKind::Validation);
        assert_eq!(response.error().code(), "Validation");
        assert_eq!(
            response.error().message(),
            "UserName is required.; UserName is too short.; UserName has spaces."
        );
        assert_eq!(sink.count(types::REQUEST_INVALID), 1);
    }

    #[tokio::test]
    async fn test_valid_request_reaches_handler() {
        let registry = Arc::new(ValidatorRegistry::new());
        registry.register::<DeleteBasket, _>(
            RuleSet::<DeleteBasket>::new()
                .not_empty(|q: &DeleteBasket| q.user_name.as_str(), "UserName is required."),
        );
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = counting_handler(calls.clone());

        let response = run(
            registry,
            Arc::new(NoOpEventSink),
            &handler,
            DeleteBasket {
                user_name: "alice".to_string(),
            },
        )
        .await
        .unwrap();

        assert!(response.is_success());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_plain_response_is_never_validated() {
        let registry = Arc::new(ValidatorRegistry::new());
        registry.register::<Ping, _>(RuleSet::<Ping>::new().rule(|_: &Ping| false, "always fails"));
        let handler = FnHandler::new(|q: Ping, _| async move { Ok(q.text) });

        let response = run(
            registry,
            Arc::new(NoOpEventSink),
            &handler,
            Ping {
                text: "pong".to_string(),
            },
        )
        .await
        .unwrap();

        assert_eq!(response, "pong");
    }
}
