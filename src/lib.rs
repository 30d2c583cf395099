//! # folio
//!
//! The server- and client-side plumbing behind a personal site:
//!
//! - [`contact`]: validate and submit the contact form.
//! - [`fetch`] and [`cache`]: timeout-bounded JSON reads behind a shared
//!   deduplicating, retrying, revalidating cache.
//! - [`security`]: the route guard that sends visitors without a session
//!   away from protected pages.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use folio::config::SiteConfig;
//! use folio::cache::GITHUB_PROJECTS;
//! use folio::middleware::Pipeline;
//! use folio::security::AuthDecision;
//! use folio::{Request, Response, StatusCode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SiteConfig::from_json(r#"{ "base_url": "https://example.dev" }"#)?;
//!     let client = reqwest::Client::new();
//!
//!     let cache = config.fetch_cache(client.clone());
//!     let projects = cache.read(GITHUB_PROJECTS).await?;
//!     println!("{projects}");
//!
//!     let guard = config.route_guard(Arc::new(|req: &Request| {
//!         match req.headers().cookie("__session") {
//!             Some(_) => AuthDecision::Allow,
//!             None => AuthDecision::sign_in(req, "/sign-in"),
//!         }
//!     }));
//!     let pipeline = Pipeline::new(|_ctx| async { Response::new(StatusCode::Ok).body("hi") })
//!         .layer(guard);
//!     let (req, _) = Request::parse(b"GET /dashboard HTTP/1.1\r\nHost: example.dev\r\n\r\n")?;
//!     println!("{}", pipeline.handle(req).await.status());
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod contact;
pub mod context;
pub mod fetch;
pub mod http;
pub mod middleware;
pub mod security;

pub use http::{Headers, Method, Request, Response, StatusCode};
