//! Route protection: decide per request whether a session is required.
//!
//! - [`RouteMatcher`] classifies a path as [`RouteClass::Protected`] or
//!   [`RouteClass::Public`] from an ordered pattern list.
//! - [`GuardScope`] decides whether the guard runs for a path at all.
//! - [`RouteGuard`] is the [`Middleware`](crate::middleware::Middleware) tying
//!   both to an external [`Authenticator`].
//!
//! No state survives between requests; every request is evaluated on its own.

mod guard;
mod matcher;
mod scope;

pub use guard::{AuthDecision, AuthFuture, Authenticator, RouteGuard};
pub use matcher::{DEFAULT_PROTECTED, RouteClass, RouteMatcher};
pub use scope::GuardScope;
