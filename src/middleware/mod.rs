//! Middleware pipeline: ordered request interception in front of an endpoint.
//!
//! The host framework hands each incoming request to a [`Pipeline`]. Every
//! [`Middleware`] in the pipeline may pass the request on through [`Next`],
//! short-circuit with its own [`Response`], or decorate the downstream
//! response. When the chain is exhausted the pipeline's endpoint runs.
//!
//! ## Core types
//!
//! - [`Middleware`]: trait implemented by interceptors such as
//!   [`RouteGuard`](crate::security::RouteGuard).
//! - [`Next`]: cursor into the remaining chain.
//! - [`MiddlewareHandler`] / [`Endpoint`]: type-erased, cheaply-cloneable functions.
//! - [`Pipeline`]: the ordered stack plus its endpoint.

use std::{future::Future, pin::Pin, sync::Arc};

use crate::{Request, Response, context::Context};

/// Boxed future returned by middleware and endpoints.
pub type BoxResponse = Pin<Box<dyn Future<Output = Response> + Send>>;

/// A type-erased, reference-counted middleware function.
pub type MiddlewareHandler = Arc<dyn Fn(Context, Next) -> BoxResponse + Send + Sync + 'static>;

/// The handler that runs once every middleware has passed the request on.
pub type Endpoint = Arc<dyn Fn(Context) -> BoxResponse + Send + Sync + 'static>;

/// Converts a [`Middleware`] implementation into a [`MiddlewareHandler`].
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use folio::middleware::from_middleware;
/// use folio::security::{RouteGuard, AuthDecision};
///
/// let guard = RouteGuard::with_defaults(Arc::new(|_req: &folio::Request| AuthDecision::Allow));
/// let handler = from_middleware(Arc::new(guard));
/// ```
pub fn from_middleware<M>(middleware: Arc<M>) -> MiddlewareHandler
where
    M: Middleware + 'static,
{
    Arc::new(move |ctx: Context, next: Next| middleware.handle(ctx, next))
}

/// A cursor into the remaining middleware chain for a single request.
///
/// `Next` is consumed by [`run`](Self::run), so a middleware can forward a
/// request at most once.
pub struct Next {
    middlewares: Arc<[MiddlewareHandler]>,
    endpoint: Endpoint,
    // Position of the middleware invoked by the next `run` call.
    index: usize,
}

impl Next {
    fn new(middlewares: Arc<[MiddlewareHandler]>, endpoint: Endpoint) -> Self {
        Self {
            middlewares,
            endpoint,
            index: 0,
        }
    }

    /// Invokes the next middleware, or the endpoint once the chain is exhausted.
    pub async fn run(mut self, ctx: Context) -> Response {
        match self.middlewares.get(self.index).cloned() {
            Some(handler) => {
                self.index += 1;
                handler(ctx, self).await
            }
            None => (self.endpoint)(ctx).await,
        }
    }
}

/// The core trait for request interceptors.
///
/// Implementors receive a [`Context`] and a [`Next`] cursor. They may:
///
/// - **Pass through**: call `next.run(ctx).await` without modification.
/// - **Short-circuit**: return a [`Response`] directly without calling `next`.
/// - **Decorate**: call `next.run(ctx).await` and modify the response.
///
/// Implementations are shared across Tokio tasks, hence `Send + Sync`, and
/// must return a `Send` future.
pub trait Middleware: Send + Sync {
    fn handle(&self, ctx: Context, next: Next) -> BoxResponse;
}

/// An ordered middleware stack terminating in an endpoint.
///
/// # Examples
///
/// ```rust
/// use folio::middleware::Pipeline;
/// use folio::{Request, Response, StatusCode};
///
/// # async fn demo() {
/// let pipeline = Pipeline::new(|_ctx| async { Response::new(StatusCode::Ok) });
/// let (request, _) = Request::parse(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();
/// assert_eq!(pipeline.handle(request).await.status(), StatusCode::Ok);
/// # }
/// ```
#[derive(Clone)]
pub struct Pipeline {
    middlewares: Arc<[MiddlewareHandler]>,
    endpoint: Endpoint,
}

impl Pipeline {
    /// Creates a pipeline with no middleware in front of `endpoint`.
    pub fn new<F, Fut>(endpoint: F) -> Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        Self {
            middlewares: Arc::from(Vec::new()),
            endpoint: Arc::new(move |ctx: Context| -> BoxResponse { Box::pin(endpoint(ctx)) }),
        }
    }

    /// Appends a middleware; earlier layers see the request first.
    #[must_use]
    pub fn layer<M>(self, middleware: M) -> Self
    where
        M: Middleware + 'static,
    {
        let mut middlewares = self.middlewares.to_vec();
        middlewares.push(from_middleware(Arc::new(middleware)));
        Self {
            middlewares: Arc::from(middlewares),
            endpoint: self.endpoint,
        }
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Runs `request` through every layer and the endpoint.
    pub async fn handle(&self, request: Request) -> Response {
        let next = Next::new(Arc::clone(&self.middlewares), Arc::clone(&self.endpoint));
        next.run(Context::new(request)).await
    }
}
