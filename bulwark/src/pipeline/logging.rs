//! Start/end/duration logging around request handling.

use super::{Behavior, DispatchContext, Next, Request};
use crate::events::{timestamped, types, EventSink};
use crate::observability::SpanTimer;
use crate::outcome::Response;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Requests slower than this are reported at warn level.
pub const DEFAULT_SLOW_THRESHOLD: Duration = Duration::from_millis(500);

/// Outermost behavior: logs every request's start, end, and elapsed time.
///
/// The elapsed time covers the whole inner chain, validation rejections
/// included. The inner response or error is returned untouched.
pub struct LoggingBehavior {
    events: Arc<dyn EventSink>,
    slow_threshold: Duration,
}

impl LoggingBehavior {
    /// Creates a logging behavior with the default slow threshold.
    #[must_use]
    pub fn new(events: Arc<dyn EventSink>) -> Self {
        Self {
            events,
            slow_threshold: DEFAULT_SLOW_THRESHOLD,
        }
    }

    /// Overrides the slow request threshold.
    #[must_use]
    pub fn with_slow_threshold(mut self, threshold: Duration) -> Self {
        self.slow_threshold = threshold;
        self
    }

    /// Returns the slow request threshold.
    #[must_use]
    pub const fn slow_threshold(&self) -> Duration {
        self.slow_threshold
    }
}

impl std::fmt::Debug for LoggingBehavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggingBehavior")
            .field("slow_threshold", &self.slow_threshold)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<Q: Request> Behavior<Q> for LoggingBehavior {
    fn name(&self) -> &'static str {
        "logging"
    }

    async fn handle(
        &self,
        request: &Q,
        ctx: &DispatchContext,
        next: Next<'_, Q>,
    ) -> anyhow::Result<Q::Response> {
        let name = Q::name();
        let request_id = ctx.request_id.to_string();

        info!(request = name, request_id = %request_id, "[START] {}", name);
        self.events.try_emit(
            types::REQUEST_STARTED,
            Some(timestamped(serde_json::json!({
                "request": name,
                "request_id": request_id,
            }))),
        );

        let timer = SpanTimer::start(name);
        let response = next.run(request, ctx).await;
        let elapsed = timer.elapsed();
        let elapsed_ms = timer.elapsed_ms();

        if elapsed > self.slow_threshold {
            warn!(
                request = name,
                request_id = %request_id,
                elapsed_ms,
                threshold_ms = u64::try_from(self.slow_threshold.as_millis()).unwrap_or(u64::MAX),
                "[SLOW] {} took {}ms",
                name,
                elapsed_ms
            );
            self.events.try_emit(
                types::REQUEST_SLOW,
                Some(timestamped(serde_json::json!({
                    "request": name,
                    "request_id": request_id,
                    "elapsed_ms": elapsed_ms,
                }))),
            );
        }

        let succeeded = match &response {
            Ok(value) => value.reported_error().is_none(),
            Err(_) => false,
        };

        info!(
            request = name,
            request_id = %request_id,
            elapsed_ms,
            succeeded,
            "[END] {} completed in {}ms",
            name,
            elapsed_ms
        );
        self.events.try_emit(
            types::REQUEST_COMPLETED,
            Some(timestamped(serde_json::json!({
                "request": name,
                "request_id": request_id,
                "elapsed_ms": elapsed_ms,
                "succeeded": succeeded,
            }))),
        );

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingEventSink;
    use crate::outcome::{Error, Outcome};
    use crate::pipeline::{FnHandler, Handler};

    #[derive(Clone)]
    struct GetOrders;

    impl Request for GetOrders {
        type Response = Outcome<u32>;
    }

    async fn run_with(
        behavior: LoggingBehavior,
        handler: &dyn Handler<GetOrders>,
    ) -> anyhow::Result<Outcome<u32>> {
        let behaviors: Vec<Arc<dyn Behavior<GetOrders>>> = vec![Arc::new(behavior)];
        Next::new(&behaviors, handler)
            .run(&GetOrders, &DispatchContext::default())
            .await
    }

    #[tokio::test]
    async fn test_emits_start_and_end_without_altering_response() {
        let sink = Arc::new(CollectingEventSink::new());
        let handler = FnHandler::new(|_: GetOrders, _| async {
            Ok(Outcome::failure(Error::not_found("Orders.NotFound", "none")))
        });

        let response = run_with(LoggingBehavior::new(sink.clone()), &handler)
            .await
            .unwrap();

        assert_eq!(response.error().code(), "Orders.NotFound");
        assert_eq!(sink.count(types::REQUEST_STARTED), 1);
        assert_eq!(sink.count(types::REQUEST_COMPLETED), 1);
        assert_eq!(sink.count(types::REQUEST_SLOW), 0);

        let completed = sink.payloads(types::REQUEST_COMPLETED);
        assert_eq!(completed[0]["succeeded"], false);
        assert_eq!(completed[0]["request"], "GetOrders");
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_request_is_reported() {
        let sink = Arc::new(CollectingEventSink::new());
        let handler = FnHandler::new(|_: GetOrders, _| async {
            tokio::time::sleep(Duration::from_millis(600)).await;
            Ok(Outcome::success(3))
        });

        let response = run_with(LoggingBehavior::new(sink.clone()), &handler)
            .await
            .unwrap();

        assert_eq!(*response.value(), 3);
        assert_eq!(sink.count(types::REQUEST_SLOW), 1);
        let slow = sink.payloads(types::REQUEST_SLOW);
        assert!(slow[0]["elapsed_ms"].as_u64().unwrap() >= 600);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_threshold() {
        let sink = Arc::new(CollectingEventSink::new());
        let handler = FnHandler::new(|_: GetOrders, _| async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(Outcome::success(1))
        });

        let behavior = LoggingBehavior::new(sink.clone()).with_slow_threshold(Duration::from_millis(10));
        assert_eq!(behavior.slow_threshold(), Duration::from_millis(10));
        run_with(behavior, &handler).await.unwrap();

        assert_eq!(sink.count(types::REQUEST_SLOW), 1);
    }

    #[tokio::test]
    async fn test_errors_pass_through() {
        let sink = Arc::new(CollectingEventSink::new());
        let handler = FnHandler::new(|_: GetOrders, _| async { Err(anyhow::anyhow!("boom")) });

        let err = run_with(LoggingBehavior::new(sink.clone()), &handler)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "boom");
        assert_eq!(sink.count(types::REQUEST_COMPLETED), 1);
    }
}
