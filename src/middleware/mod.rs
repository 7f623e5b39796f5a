//! Middleware pipeline: composable logic wrapped around endpoint handlers.
//!
//! Every matched route runs behind an ordered chain of middleware: the host-wide stack
//! first, then whatever the enclosing groups and the route itself added. Each layer
//! receives the [`Context`] and a [`Next`] cursor and may pass the request on,
//! short-circuit with its own [`Response`], or decorate the downstream response.
//!
//! ## Core types
//!
//! - [`Middleware`]: trait implemented by all middleware.
//! - [`Next`]: cursor into the remaining chain; [`Next::run`] advances it.
//! - [`MiddlewareHandler`]: type-erased, cheaply-cloneable middleware function.
//! - [`from_middleware`]: turns a [`Middleware`] into a [`MiddlewareHandler`].
//! - [`Recovery`]: converts handler panics into `500` responses.
//! - [`StaticFiles`]: answers unmatched `GET` requests from a folder on disk.

use std::{future::Future, pin::Pin, sync::Arc};

use crate::{Response, context::Context, host::Handler};

mod recovery;
mod static_files;

pub use recovery::{Recovery, RecoveryCollector};
pub use static_files::StaticFiles;

/// A type-erased, reference-counted middleware function.
///
/// ```
/// use std::{future::Future, pin::Pin, sync::Arc};
/// use waypath::{Context, Response, middleware::{MiddlewareHandler, Next}};
///
/// let handler: MiddlewareHandler = Arc::new(
///     |ctx: Context, next: Next| -> Pin<Box<dyn Future<Output = Response> + Send>> {
///         Box::pin(async move { next.run(ctx).await })
///     },
/// );
/// ```
pub type MiddlewareHandler = Arc<
    dyn Fn(Context, Next) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync + 'static,
>;

/// Converts a [`Middleware`] implementation into a [`MiddlewareHandler`].
pub fn from_middleware<M>(middleware: M) -> MiddlewareHandler
where
    M: Middleware + 'static,
{
    let middleware = Arc::new(middleware);
    Arc::new(move |ctx: Context, next: Next| middleware.handle(ctx, next))
}

/// A cursor into the remaining middleware chain for a single request.
///
/// Once every middleware has run, [`run`](Self::run) invokes the endpoint the chain
/// was built around. `Next` is consumed by `run`, so a layer can forward at most once.
pub struct Next {
    chain: Arc<[MiddlewareHandler]>,
    index: usize,
    endpoint: Handler,
}

impl Next {
    /// Positions a cursor at the start of `chain`, ending in `endpoint`.
    pub fn new(chain: Arc<[MiddlewareHandler]>, endpoint: Handler) -> Self {
        Self {
            chain,
            index: 0,
            endpoint,
        }
    }

    /// Invokes the next middleware, or the endpoint once the chain is exhausted.
    pub async fn run(mut self, ctx: Context) -> Response {
        let middleware = self.chain.get(self.index).cloned();
        match middleware {
            Some(middleware) => {
                self.index += 1;
                middleware(ctx, self).await
            }
            None => (self.endpoint)(ctx).await,
        }
    }
}

/// The core trait for all middleware.
///
/// Implementors may:
///
/// - **Pass through**: `next.run(ctx).await` unchanged.
/// - **Short-circuit**: return a [`Response`] without calling `next`.
/// - **Decorate**: call `next`, then adjust the response before returning it.
///
/// Middleware is shared across tasks, so it must be `Send + Sync` and return a `Send`
/// future.
pub trait Middleware: Send + Sync {
    /// Handles the request, optionally delegating to the rest of the chain.
    fn handle(&self, ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::handler;
    use crate::{Method, Request, StatusCode};

    struct Tag(&'static str);

    impl Middleware for Tag {
        fn handle(
            &self,
            ctx: Context,
            next: Next,
        ) -> Pin<Box<dyn Future<Output = Response> + Send>> {
            let tag = self.0;
            Box::pin(async move {
                let mut response = next.run(ctx).await;
                response.add_header("X-Layer", tag);
                response
            })
        }
    }

    struct Deny;

    impl Middleware for Deny {
        fn handle(
            &self,
            _ctx: Context,
            _next: Next,
        ) -> Pin<Box<dyn Future<Output = Response> + Send>> {
            Box::pin(async { Response::new(StatusCode::BadRequest) })
        }
    }

    fn endpoint() -> Handler {
        handler(|ctx: Context| async move {
            Response::new(StatusCode::Ok).body(ctx.args().join(","))
        })
    }

    fn ctx() -> Context {
        Context::with_args(Request::new(Method::Get, "/"), vec!["a".into(), "b".into()])
    }

    #[tokio::test]
    async fn empty_chain_runs_endpoint() {
        let response = Next::new(Arc::from(Vec::new()), endpoint()).run(ctx()).await;
        assert_eq!(response.status(), StatusCode::Ok);
        assert_eq!(response.payload(), b"a,b");
    }

    #[tokio::test]
    async fn layers_unwind_inside_out() {
        let chain: Vec<MiddlewareHandler> =
            vec![from_middleware(Tag("outer")), from_middleware(Tag("inner"))];
        let response = Next::new(Arc::from(chain), endpoint()).run(ctx()).await;

        let layers: Vec<_> = response
            .headers()
            .iter()
            .filter(|(name, _)| *name == "X-Layer")
            .map(|(_, value)| value)
            .collect();
        assert_eq!(layers, ["inner", "outer"]);
    }

    #[tokio::test]
    async fn short_circuit_skips_endpoint() {
        let chain: Vec<MiddlewareHandler> = vec![from_middleware(Deny), from_middleware(Tag("x"))];
        let response = Next::new(Arc::from(chain), endpoint()).run(ctx()).await;
        assert_eq!(response.status(), StatusCode::BadRequest);
        assert!(response.headers().is_empty());
    }
}
