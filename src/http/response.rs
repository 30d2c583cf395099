//! Response builder for guard short-circuits and endpoint handlers.

use super::{Headers, StatusCode};

/// An HTTP response produced inside the pipeline.
///
/// The host owns serialization; the guard only needs to build a status, a few
/// headers, and an optional body.
///
/// # Examples
///
/// ```
/// use folio::http::{Response, StatusCode};
///
/// let response = Response::redirect("/sign-in?redirect_url=%2Fdashboard");
/// assert_eq!(response.status(), StatusCode::TemporaryRedirect);
/// assert_eq!(response.headers().get("location"), Some("/sign-in?redirect_url=%2Fdashboard"));
/// ```
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Vec<u8>,
}

impl Response {
    /// Creates a new response with the given status and an empty body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    /// A `307 Temporary Redirect` to `location`; the method is preserved.
    pub fn redirect(location: impl Into<String>) -> Self {
        Self::new(StatusCode::TemporaryRedirect).header("Location", location)
    }

    /// Appends a response header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Appends a header in place, for middleware decorating a downstream response.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name, value);
    }

    /// Sets a plain-text body.
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into().into_bytes();
        if !self.headers.contains("content-type") {
            self.headers
                .insert("Content-Type", "text/plain; charset=utf-8");
        }
        self
    }

    /// Sets a JSON body and the matching `Content-Type`.
    #[must_use]
    pub fn json(mut self, value: &serde_json::Value) -> Self {
        self.body = value.to_string().into_bytes();
        self.headers.set("Content-Type", "application/json");
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body_bytes(&self) -> &[u8] {
        &self.body
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new(StatusCode::Ok)
    }
}
