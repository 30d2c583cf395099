//! Route guard middleware: enforce authentication on protected paths.

use std::{future::Future, pin::Pin, sync::Arc};

use tracing::{debug, info};

use crate::{
    Request, Response, StatusCode,
    context::Context,
    middleware::{BoxResponse, Middleware, Next},
};

use super::{GuardScope, RouteClass, RouteMatcher};

/// What the authenticator decided for a protected request.
#[derive(Debug)]
pub enum AuthDecision {
    /// A valid session exists; the request continues down the pipeline.
    Allow,
    /// No valid session; the response replaces the downstream handler.
    Deny(Response),
}

impl AuthDecision {
    /// The usual denial: page loads are redirected to `sign_in_url` with the
    /// original target as `redirect_url`, API calls and mutations get a
    /// `401` JSON body instead.
    ///
    /// # Examples
    ///
    /// ```
    /// use folio::{Request, StatusCode};
    /// use folio::security::AuthDecision;
    ///
    /// let (req, _) = Request::parse(b"GET /dashboard?tab=1 HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();
    /// let AuthDecision::Deny(res) = AuthDecision::sign_in(&req, "/sign-in") else { unreachable!() };
    /// assert_eq!(res.status(), StatusCode::TemporaryRedirect);
    /// assert_eq!(res.headers().get("location"), Some("/sign-in?redirect_url=%2Fdashboard%3Ftab%3D1"));
    /// ```
    pub fn sign_in(request: &Request, sign_in_url: &str) -> Self {
        if request.path().starts_with("/api") || !request.method().is_safe() {
            return Self::Deny(
                Response::new(StatusCode::Unauthorized)
                    .json(&serde_json::json!({ "error": "Unauthenticated" })),
            );
        }

        let target: String =
            url::form_urlencoded::byte_serialize(request.path_and_query().as_bytes()).collect();
        Self::Deny(Response::redirect(format!(
            "{sign_in_url}?redirect_url={target}"
        )))
    }
}

/// Boxed future returned by [`Authenticator::protect`].
pub type AuthFuture<'a> = Pin<Box<dyn Future<Output = AuthDecision> + Send + 'a>>;

/// The external session check.
///
/// The guard never inspects credentials itself; it only asks the
/// authenticator to protect a request it has classified as protected.
/// Plain closures `Fn(&Request) -> AuthDecision` implement this trait.
pub trait Authenticator: Send + Sync {
    fn protect<'a>(&'a self, request: &'a Request) -> AuthFuture<'a>;
}

impl<F> Authenticator for F
where
    F: Fn(&Request) -> AuthDecision + Send + Sync,
{
    fn protect<'a>(&'a self, request: &'a Request) -> AuthFuture<'a> {
        Box::pin(std::future::ready(self(request)))
    }
}

/// Middleware that classifies each in-scope request and enforces
/// authentication on protected ones.
///
/// # Behavior
///
/// - Paths outside the [`GuardScope`] pass through untouched.
/// - Every evaluated request gets its [`RouteClass`] recorded in the context
///   extensions.
/// - Public requests pass through.
/// - Protected requests are handed to the [`Authenticator`]; a
///   [`AuthDecision::Deny`] short-circuits with its response and the
///   downstream handler is **not** called.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use folio::middleware::Pipeline;
/// use folio::security::{AuthDecision, RouteGuard};
/// use folio::{Request, Response, StatusCode};
///
/// # async fn demo() {
/// let guard = RouteGuard::with_defaults(Arc::new(|req: &Request| {
///     if req.headers().cookie("__session").is_some() {
///         AuthDecision::Allow
///     } else {
///         AuthDecision::sign_in(req, "/sign-in")
///     }
/// }));
/// let pipeline = Pipeline::new(|_ctx| async { Response::new(StatusCode::Ok) }).layer(guard);
///
/// let (req, _) = Request::parse(b"GET /dashboard HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();
/// assert_eq!(pipeline.handle(req).await.status(), StatusCode::TemporaryRedirect);
/// # }
/// ```
pub struct RouteGuard {
    matcher: RouteMatcher,
    scope: GuardScope,
    authenticator: Arc<dyn Authenticator>,
}

impl RouteGuard {
    pub fn new(
        matcher: RouteMatcher,
        scope: GuardScope,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        Self {
            matcher,
            scope,
            authenticator,
        }
    }

    /// Guard with the default protected routes and scope.
    pub fn with_defaults(authenticator: Arc<dyn Authenticator>) -> Self {
        Self::new(RouteMatcher::default(), GuardScope::default(), authenticator)
    }

    pub fn matcher(&self) -> &RouteMatcher {
        &self.matcher
    }

    pub fn scope(&self) -> &GuardScope {
        &self.scope
    }

    /// Classify `path`, or `None` when the guard does not run for it.
    pub fn evaluate(&self, path: &str) -> Option<RouteClass> {
        self.scope
            .applies_to(path)
            .then(|| self.matcher.classify(path))
    }
}

impl Middleware for RouteGuard {
    fn handle(&self, mut ctx: Context, next: Next) -> BoxResponse {
        let Some(class) = self.evaluate(ctx.request().path()) else {
            debug!(path = %ctx.request().path(), "outside guard scope");
            return Box::pin(next.run(ctx));
        };

        ctx.extensions_mut().insert(class);
        if class == RouteClass::Public {
            return Box::pin(next.run(ctx));
        }

        let authenticator = Arc::clone(&self.authenticator);
        Box::pin(async move {
            match authenticator.protect(ctx.request()).await {
                AuthDecision::Allow => next.run(ctx).await,
                AuthDecision::Deny(response) => {
                    info!(
                        method = %ctx.request().method(),
                        path = %ctx.request().path(),
                        status = response.status().as_u16(),
                        "protected route denied"
                    );
                    response
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::middleware::Pipeline;

    fn request(method: &str, path: &str, cookie: Option<&str>) -> Request {
        let cookie = cookie
            .map(|c| format!("Cookie: {c}\r\n"))
            .unwrap_or_default();
        let raw = format!("{method} {path} HTTP/1.1\r\nHost: localhost\r\n{cookie}\r\n");
        Request::parse(raw.as_bytes()).unwrap().0
    }

    // Counts protect() calls and allows requests carrying a `__session` cookie.
    struct CountingAuth {
        calls: AtomicUsize,
    }

    impl Authenticator for CountingAuth {
        fn protect<'a>(&'a self, request: &'a Request) -> AuthFuture<'a> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                match request.headers().cookie("__session") {
                    Some(_) => AuthDecision::Allow,
                    None => AuthDecision::sign_in(request, "/sign-in"),
                }
            })
        }
    }

    fn pipeline(auth: Arc<CountingAuth>) -> Pipeline {
        Pipeline::new(|ctx: Context| async move {
            let class = match ctx.extensions().get::<RouteClass>() {
                Some(RouteClass::Protected) => "protected",
                Some(RouteClass::Public) => "public",
                None => "unguarded",
            };
            Response::new(StatusCode::Ok).body(class)
        })
        .layer(RouteGuard::with_defaults(auth))
    }

    fn counting() -> Arc<CountingAuth> {
        Arc::new(CountingAuth {
            calls: AtomicUsize::new(0),
        })
    }

    #[test]
    fn evaluate_skips_out_of_scope_paths() {
        let guard = RouteGuard::with_defaults(Arc::new(|_: &Request| AuthDecision::Allow));
        assert_eq!(guard.evaluate("/_next/static/chunk.js"), None);
        assert_eq!(
            guard.evaluate("/dashboard/settings"),
            Some(RouteClass::Protected)
        );
        assert_eq!(guard.evaluate("/about"), Some(RouteClass::Public));
    }

    #[tokio::test]
    async fn protected_without_session_redirects() {
        let auth = counting();
        let res = pipeline(Arc::clone(&auth))
            .handle(request("GET", "/dashboard/settings", None))
            .await;
        assert_eq!(res.status(), StatusCode::TemporaryRedirect);
        assert_eq!(
            res.headers().get("location"),
            Some("/sign-in?redirect_url=%2Fdashboard%2Fsettings")
        );
        assert_eq!(auth.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn protected_with_session_reaches_handler() {
        let auth = counting();
        let res = pipeline(Arc::clone(&auth))
            .handle(request("GET", "/profile", Some("__session=abc")))
            .await;
        assert_eq!(res.status(), StatusCode::Ok);
        assert_eq!(res.body_bytes(), b"protected");
    }

    #[tokio::test]
    async fn upper_case_protected_path_still_asks_authenticator() {
        let auth = counting();
        let res = pipeline(Arc::clone(&auth))
            .handle(request("GET", "/Dashboard/settings", None))
            .await;
        assert_eq!(res.status(), StatusCode::TemporaryRedirect);
        assert_eq!(
            res.headers().get("location"),
            Some("/sign-in?redirect_url=%2FDashboard%2Fsettings")
        );
        assert_eq!(auth.calls.load(Ordering::SeqCst), 1);

        let res = pipeline(Arc::clone(&auth))
            .handle(request("GET", "/PROFILE", Some("__session=abc")))
            .await;
        assert_eq!(res.body_bytes(), b"protected");
        assert_eq!(auth.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn public_route_skips_authenticator() {
        let auth = counting();
        let res = pipeline(Arc::clone(&auth))
            .handle(request("GET", "/about", None))
            .await;
        assert_eq!(res.status(), StatusCode::Ok);
        assert_eq!(res.body_bytes(), b"public");
        assert_eq!(auth.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn static_assets_bypass_guard() {
        let auth = counting();
        let res = pipeline(Arc::clone(&auth))
            .handle(request("GET", "/_next/static/chunk.js", None))
            .await;
        assert_eq!(res.body_bytes(), b"unguarded");
        assert_eq!(auth.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn api_denial_is_unauthorized_json() {
        let guard = RouteGuard::new(
            RouteMatcher::new(["/api/admin(.*)"]),
            GuardScope::default(),
            counting(),
        );
        let pipeline = Pipeline::new(|_ctx| async { Response::new(StatusCode::Ok) }).layer(guard);
        let res = pipeline
            .handle(request("POST", "/api/admin/reindex", None))
            .await;
        assert_eq!(res.status(), StatusCode::Unauthorized);
        assert_eq!(res.headers().get("content-type"), Some("application/json"));
    }
}
