//! Request and handler contracts.

use crate::cancellation::CancellationToken;
use crate::outcome::Response;
use async_trait::async_trait;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use uuid::Uuid;

/// A named, typed operation entering the pipeline.
///
/// Commands and queries are both requests; their `Response` is usually an
/// [`Outcome`](crate::outcome::Outcome).
pub trait Request: Send + Sync + 'static {
    /// What the handler returns.
    type Response: Response;

    /// Name used in logs and events. Defaults to the unqualified type name.
    fn name() -> &'static str {
        short_type_name::<Self>()
    }
}

/// Returns a type name without its module path.
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    match base.rfind("::") {
        Some(idx) => &full[idx + 2..],
        None => full,
    }
}

/// Per-dispatch context shared by every behavior and the handler.
#[derive(Debug, Clone)]
pub struct DispatchContext {
    /// Unique id of this dispatch.
    pub request_id: Uuid,
    /// Caller-supplied cancellation signal.
    pub cancellation: Arc<CancellationToken>,
}

impl DispatchContext {
    /// Creates a context with a fresh request id.
    #[must_use]
    pub fn new(cancellation: Arc<CancellationToken>) -> Self {
        Self {
            request_id: Uuid::now_v7(),
            cancellation,
        }
    }

    /// Returns true if the caller cancelled this dispatch.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

impl Default for DispatchContext {
    fn default() -> Self {
        Self::new(Arc::new(CancellationToken::new()))
    }
}

/// The terminal step of a request pipeline.
///
/// Returning `Err` is the fault channel: the exception handling behavior
/// turns it into a failed outcome or lets it escape.
#[async_trait]
pub trait Handler<Q: Request>: Send + Sync {
    /// Handles the request.
    async fn handle(&self, request: &Q, ctx: &DispatchContext) -> anyhow::Result<Q::Response>;
}

#[async_trait]
impl<Q: Request, H: Handler<Q> + ?Sized> Handler<Q> for Arc<H> {
    async fn handle(&self, request: &Q, ctx: &DispatchContext) -> anyhow::Result<Q::Response> {
        (**self).handle(request, ctx).await
    }
}

/// A closure-based handler.
///
/// The closure receives owned copies of the request and the context.
pub struct FnHandler<Q, F> {
    func: F,
    _request: PhantomData<fn(Q)>,
}

impl<Q, F, Fut> FnHandler<Q, F>
where
    Q: Request + Clone,
    F: Fn(Q, DispatchContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Q::Response>> + Send,
{
    /// Wraps a closure as a handler.
    pub fn new(func: F) -> Self {
        Self {
            func,
            _request: PhantomData,
        }
    }
}

impl<Q, F> std::fmt::Debug for FnHandler<Q, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}

#[async_trait]
impl<Q, F, Fut> Handler<Q> for FnHandler<Q, F>
where
    Q: Request + Clone,
    F: Fn(Q, DispatchContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Q::Response>> + Send,
{
    async fn handle(&self, request: &Q, ctx: &DispatchContext) -> anyhow::Result<Q::Response> {
        (self.func)(request.clone(), ctx.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::Outcome;

    #[derive(Debug, Clone)]
    struct GetProductById {
        id: u32,
    }

    impl Request for GetProductById {
        type Response = Outcome<String>;
    }

    struct Renamed;

    impl Request for Renamed {
        type Response = ();

        fn name() -> &'static str {
            "custom-name"
        }
    }

    #[test]
    fn test_default_request_name_is_unqualified() {
        assert_eq!(GetProductById::name(), "GetProductById");
        assert_eq!(Renamed::name(), "custom-name");
    }

    #[test]
    fn test_short_type_name_keeps_generics() {
        assert_eq!(short_type_name::<Vec<String>>(), "Vec<alloc::string::String>");
        assert_eq!(short_type_name::<u8>(), "u8");
    }

    #[tokio::test]
    async fn test_fn_handler() {
        let handler = FnHandler::new(|q: GetProductById, _ctx: DispatchContext| async move {
            Ok(Outcome::success(format!("product-{}", q.id)))
        });

        let outcome = handler
            .handle(&GetProductById { id: 7 }, &DispatchContext::default())
            .await
            .unwrap();
        assert_eq!(outcome.value(), "product-7");
    }

    #[test]
    fn test_context_ids_are_unique() {
        let a = DispatchContext::default();
        let b = DispatchContext::default();
        assert_ne!(a.request_id, b.request_id);
        assert!(!a.is_cancelled());
    }
}
