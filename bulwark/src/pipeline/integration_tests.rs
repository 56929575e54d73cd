//! End-to-end tests: mediator dispatch over resilient dependencies.

#[cfg(test)]
mod tests {
    use crate::cancellation::CancellationToken;
    use crate::events::{types, CollectingEventSink};
    use crate::outcome::{Error, ErrorKind, Outcome};
    use crate::pipeline::{
        DispatchContext, FnHandler, Handler, Mediator, Request, UNHANDLED_ERROR_CODE, VALIDATION_ERROR_CODE,
    };
    use crate::resilience::{CircuitState, ResilienceOptions, ResiliencePipeline, ResiliencePipelineRegistry};
    use crate::store::{get_json, CachedStore, KeyValueStore, MockKeyValueStore, ResilientStore, StoreError};
    use crate::testing::{
        assert_error_code, assert_error_contains, assert_event_count, assert_failure_kind, assert_success,
        FailingHandler, FlakyOperation, PanickingHandler, StaticHandler, StaticValidator,
    };
    use crate::validation::RuleSet;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde::{Deserialize, Serialize};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    const ALICE_BASKET: &str = r#"{"user_name":"alice","items":["p-1","p-2"]}"#;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct ShoppingCart {
        user_name: String,
        items: Vec<String>,
    }

    #[derive(Debug, Clone)]
    struct GetBasket {
        user_name: String,
    }

    impl GetBasket {
        fn of(user_name: &str) -> Self {
            Self {
                user_name: user_name.to_string(),
            }
        }
    }

    impl Request for GetBasket {
        type Response = Outcome<ShoppingCart>;
    }

    struct GetBasketHandler {
        store: Arc<dyn KeyValueStore>,
    }

    #[async_trait]
    impl Handler<GetBasket> for GetBasketHandler {
        async fn handle(&self, request: &GetBasket, ctx: &DispatchContext) -> anyhow::Result<Outcome<ShoppingCart>> {
            let key = format!("basket:{}", request.user_name);
            let cart = get_json::<ShoppingCart, _>(self.store.as_ref(), &key, &ctx.cancellation).await?;
            Ok(match cart {
                Some(cart) => Outcome::success(cart),
                None => Outcome::failure(Error::not_found(
                    "Basket.NotFound",
                    format!("Basket for '{}' was not found", request.user_name),
                )),
            })
        }
    }

    struct BasketService {
        mediator: Arc<Mediator>,
        pipeline: Arc<ResiliencePipeline>,
        events: Arc<CollectingEventSink>,
    }

    fn basket_service<F>(store: MockKeyValueStore, configure: F) -> BasketService
    where
        F: FnOnce(&mut ResilienceOptions),
    {
        let events = Arc::new(CollectingEventSink::new());
        let registry = ResiliencePipelineRegistry::with_events(events.clone());
        registry.add_with("redis-pipeline", configure).unwrap();

        let pipeline = registry.get("redis-pipeline").unwrap();
        let store = ResilientStore::new(store, pipeline.clone());

        let mediator = Mediator::new().with_events(events.clone());
        mediator
            .register::<GetBasket, _>(GetBasketHandler { store: Arc::new(store) })
            .unwrap();

        BasketService {
            mediator: Arc::new(mediator),
            pipeline,
            events,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_outage_is_retried_inside_dispatch() {
        let mut store = MockKeyValueStore::new();
        let mut calls = 0;
        store.expect_get().times(3).returning(move |_, _| {
            calls += 1;
            if calls <= 2 {
                Err(StoreError::unavailable("connection refused"))
            } else {
                Ok(Some(ALICE_BASKET.to_string()))
            }
        });
        let service = basket_service(store, |_| {});

        let start = Instant::now();
        let basket = service.mediator.send(GetBasket::of("alice")).await.unwrap();
        let elapsed = start.elapsed();

        assert_success(&basket);
        assert_eq!(basket.value().items, vec!["p-1".to_string(), "p-2".to_string()]);
        assert!(elapsed >= Duration::from_millis(1500), "elapsed {elapsed:?}");
        assert!(elapsed <= Duration::from_secs(30), "elapsed {elapsed:?}");
        assert_event_count(&service.events, types::RESILIENCE_RETRY, 2);
        assert_eq!(service.pipeline.circuit_state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_become_unhandled_failure() {
        let mut store = MockKeyValueStore::new();
        store
            .expect_get()
            .times(3)
            .returning(|_, _| Err(StoreError::unavailable("connection refused")));
        let service = basket_service(store, |o| o.max_retry_attempts = 2);

        let basket = service.mediator.send(GetBasket::of("alice")).await.unwrap();

        assert_failure_kind(&basket, ErrorKind::Failure);
        assert_error_code(&basket, UNHANDLED_ERROR_CODE);
        assert_error_contains(&basket, "connection refused");
        assert_event_count(&service.events, types::REQUEST_UNHANDLED, 1);
        assert_event_count(&service.events, types::REQUEST_COMPLETED, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_circuit_fails_fast_until_break_elapses() {
        let mut store = MockKeyValueStore::new();
        let mut calls = 0;
        store.expect_get().times(3).returning(move |_, _| {
            calls += 1;
            if calls <= 2 {
                Err(StoreError::unavailable("connection refused"))
            } else {
                Ok(Some(ALICE_BASKET.to_string()))
            }
        });
        let service = basket_service(store, |o| {
            o.max_retry_attempts = 0;
            o.circuit_breaker_min_throughput = 2;
            o.circuit_breaker_break_duration = Duration::from_secs(30);
        });

        for _ in 0..2 {
            let basket = service.mediator.send(GetBasket::of("alice")).await.unwrap();
            assert_error_contains(&basket, "connection refused");
        }
        assert_eq!(service.pipeline.circuit_state(), CircuitState::Open);

        let rejected = service.mediator.send(GetBasket::of("alice")).await.unwrap();
        assert_error_code(&rejected, UNHANDLED_ERROR_CODE);
        assert_error_contains(&rejected, "is open");

        tokio::time::advance(Duration::from_secs(30)).await;
        let basket = service.mediator.send(GetBasket::of("alice")).await.unwrap();

        assert_success(&basket);
        assert_eq!(service.pipeline.circuit_state(), CircuitState::Closed);
        assert_event_count(&service.events, types::CIRCUIT_OPENED, 1);
        assert_event_count(&service.events, types::CIRCUIT_HALF_OPENED, 1);
        assert_event_count(&service.events, types::CIRCUIT_CLOSED, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_during_backoff_is_not_a_failure() {
        let mut store = MockKeyValueStore::new();
        store
            .expect_get()
            .times(1)
            .returning(|_, _| Err(StoreError::unavailable("connection refused")));
        let service = basket_service(store, |_| {});

        let token = Arc::new(CancellationToken::new());
        let task = {
            let mediator = service.mediator.clone();
            let token = token.clone();
            tokio::spawn(async move { mediator.send_with(GetBasket::of("alice"), token).await })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel("client disconnected");

        let err = task.await.unwrap().unwrap_err();
        assert!(err.is_cancelled());
        assert!(err.to_string().contains("client disconnected"));

        let snapshot = service.pipeline.circuit_breaker().snapshot();
        assert_eq!(snapshot.failures, 1);
        assert_eq!(snapshot.samples, 1);
        assert_event_count(&service.events, types::RESILIENCE_RETRY, 1);
        assert_event_count(&service.events, types::REQUEST_UNHANDLED, 0);
    }

    #[tokio::test]
    async fn test_invalid_request_never_reaches_dependency() {
        let mut store = MockKeyValueStore::new();
        store.expect_get().times(0);
        let service = basket_service(store, |_| {});
        service.mediator.add_validator::<GetBasket, _>(
            RuleSet::<GetBasket>::new().not_empty(|q: &GetBasket| q.user_name.as_str(), "UserName is required."),
        );
        service
            .mediator
            .add_validator::<GetBasket, _>(StaticValidator::new(["Basket service is read-only"]));

        let basket = service.mediator.send(GetBasket::of("")).await.unwrap();

        assert_failure_kind(&basket, ErrorKind::Validation);
        assert_error_code(&basket, VALIDATION_ERROR_CODE);
        assert_error_contains(&basket, "UserName is required.");
        assert_error_contains(&basket, "Basket service is read-only");
        assert_event_count(&service.events, types::REQUEST_INVALID, 1);
        assert_event_count(&service.events, types::REQUEST_COMPLETED, 1);
    }

    #[tokio::test]
    async fn test_cached_store_serves_repeat_reads() {
        let mut inner = MockKeyValueStore::new();
        inner
            .expect_get()
            .times(1)
            .returning(|_, _| Ok(Some(ALICE_BASKET.to_string())));

        let registry = ResiliencePipelineRegistry::new();
        let pipeline = registry.add("redis-pipeline", ResilienceOptions::default()).unwrap();
        let store = CachedStore::new(ResilientStore::new(inner, pipeline), Duration::from_secs(60));

        let mediator = Mediator::new();
        mediator
            .register::<GetBasket, _>(GetBasketHandler { store: Arc::new(store) })
            .unwrap();

        for _ in 0..3 {
            let basket = mediator.send(GetBasket::of("alice")).await.unwrap();
            assert_eq!(basket.value().user_name, "alice");
        }
    }

    #[tokio::test]
    async fn test_missing_basket_is_a_business_failure() {
        let mut store = MockKeyValueStore::new();
        store.expect_get().times(1).returning(|_, _| Ok(None));
        let service = basket_service(store, |_| {});

        let basket = service.mediator.send(GetBasket::of("bob")).await.unwrap();

        assert_failure_kind(&basket, ErrorKind::NotFound);
        assert_error_code(&basket, "Basket.NotFound");
        assert_event_count(&service.events, types::REQUEST_UNHANDLED, 0);
    }

    #[derive(Debug, Clone)]
    struct GetDiscount {
        product: String,
    }

    impl Request for GetDiscount {
        type Response = Outcome<u32>;
    }

    #[tokio::test(start_paused = true)]
    async fn test_total_timeout_bounds_stalled_attempts() {
        let events = Arc::new(CollectingEventSink::new());
        let registry = ResiliencePipelineRegistry::with_events(events.clone());
        let pipeline = registry
            .add(
                "discount-pipeline",
                ResilienceOptions::new()
                    .with_per_attempt_timeout(Duration::from_secs(5))
                    .with_total_timeout(Duration::from_secs(8)),
            )
            .unwrap();
        let discount_service = Arc::new(FlakyOperation::new(0).with_delay(Duration::from_secs(60)));

        let mediator = Mediator::new().with_events(events.clone());
        let op = discount_service.clone();
        mediator
            .register::<GetDiscount, _>(FnHandler::new(move |q: GetDiscount, ctx: DispatchContext| {
                let pipeline = pipeline.clone();
                let op = op.clone();
                async move {
                    assert!(!q.product.is_empty());
                    let amount = pipeline.execute(&ctx.cancellation, || op.call()).await?;
                    Ok::<_, anyhow::Error>(Outcome::success(amount))
                }
            }))
            .unwrap();

        let start = Instant::now();
        let discount = mediator
            .send(GetDiscount {
                product: "p-1".to_string(),
            })
            .await
            .unwrap();
        let elapsed = start.elapsed();

        assert_error_contains(&discount, "timed out after 8s");
        assert!(elapsed >= Duration::from_secs(8), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_millis(8050), "elapsed {elapsed:?}");
        assert_eq!(discount_service.call_count(), 2);
        assert_event_count(&events, types::RESILIENCE_TOTAL_TIMEOUT, 1);
        assert_event_count(&events, types::REQUEST_SLOW, 1);
    }

    #[tokio::test]
    async fn test_no_validators_matches_direct_handler_call() {
        let handler = Arc::new(StaticHandler::<GetDiscount>::new(Outcome::success(15)));
        let mediator = Mediator::new();
        mediator.register::<GetDiscount, _>(handler.clone()).unwrap();

        let request = GetDiscount {
            product: "p-1".to_string(),
        };
        let direct = handler.handle(&request, &DispatchContext::default()).await.unwrap();
        let dispatched = mediator.send(request).await.unwrap();

        assert_eq!(dispatched, direct);
        assert_eq!(handler.call_count(), 2);
    }

    #[tokio::test]
    async fn test_handler_fault_is_absorbed_once() {
        let handler = Arc::new(FailingHandler::<GetDiscount>::new("discount database offline"));
        let mediator = Mediator::new();
        mediator.register::<GetDiscount, _>(handler.clone()).unwrap();

        let discount = mediator
            .send(GetDiscount {
                product: "p-1".to_string(),
            })
            .await
            .unwrap();

        assert_error_code(&discount, UNHANDLED_ERROR_CODE);
        assert_eq!(discount.error().message(), "discount database offline");
        assert_eq!(handler.call_count(), 1);
    }

    #[tokio::test]
    async fn test_handler_panic_is_absorbed() {
        let mediator = Mediator::new();
        mediator
            .register::<GetDiscount, _>(PanickingHandler::new("index out of bounds"))
            .unwrap();

        let discount = mediator
            .send(GetDiscount {
                product: "p-1".to_string(),
            })
            .await
            .unwrap();

        assert_failure_kind(&discount, ErrorKind::Failure);
        assert_error_contains(&discount, "index out of bounds");
    }
}
