//! The contact form controller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::{ApiResponse, CONTACT_SCHEMA, FieldErrors, Notice, RawFormInput};

/// Path of the contact endpoint relative to the site origin.
pub const CONTACT_PATH: &str = "/api/contact";

pub const SUCCESS_MESSAGE: &str =
    "Message sent! Thanks for reaching out. I'll get back to you soon.";

/// Shown when the endpoint rejects a submission without an error message.
pub const FALLBACK_FAILURE: &str = "Failed to send message. Please try again.";

/// Shown when the request never completed.
pub const NETWORK_FAILURE: &str = "Something went wrong. Please try again later.";

/// Why a submission did not succeed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("invalid form input: {0}")]
    Invalid(FieldErrors),

    #[error("a submission is already in flight")]
    Busy,

    #[error("contact endpoint rejected the message (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("contact request failed: {message}")]
    Transport { message: String },
}

impl SubmitError {
    /// The submission-level notification, if any.
    ///
    /// Validation errors are shown next to their fields instead, and a busy
    /// form shows nothing.
    pub fn notice(&self) -> Option<Notice> {
        match self {
            SubmitError::Invalid(_) | SubmitError::Busy => None,
            SubmitError::Rejected { message, .. } => Some(Notice::error(message.clone())),
            SubmitError::Transport { .. } => Some(Notice::error(NETWORK_FAILURE)),
        }
    }
}

#[derive(Debug, Default)]
struct FormState {
    values: RawFormInput,
    errors: FieldErrors,
}

// Clears the busy flag when a submission ends, whichever way it ends.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Validates and submits the contact form.
///
/// At most one submission is in flight at a time; every accepted submission
/// makes exactly one POST and never retries.
///
/// # Examples
///
/// ```rust,no_run
/// use folio::contact::{ContactForm, RawFormInput};
///
/// # async fn demo() {
/// let form = ContactForm::new(reqwest::Client::new(), "https://example.dev");
/// let outcome = form
///     .submit(RawFormInput {
///         name: "Ada".into(),
///         email: "ada@example.com".into(),
///         subject: "Hello there".into(),
///         message: "Loved the latest post!".into(),
///     })
///     .await;
/// match outcome {
///     Ok(notice) => println!("{}", notice.message),
///     Err(err) => println!("{err}"),
/// }
/// # }
/// ```
#[derive(Debug)]
pub struct ContactForm {
    client: reqwest::Client,
    endpoint: String,
    busy: AtomicBool,
    state: Mutex<FormState>,
}

impl ContactForm {
    /// A form posting to [`CONTACT_PATH`] under `base_url`.
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self::with_endpoint(
            client,
            format!("{}{CONTACT_PATH}", base_url.trim_end_matches('/')),
        )
    }

    /// A form posting to an arbitrary endpoint URL.
    pub fn with_endpoint(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            busy: AtomicBool::new(false),
            state: Mutex::new(FormState::default()),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// `true` while a submission is in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Current field values.
    pub fn values(&self) -> RawFormInput {
        self.state().values.clone()
    }

    /// Field errors from the last validation.
    pub fn errors(&self) -> FieldErrors {
        self.state().errors.clone()
    }

    /// Validate `input` and, when every field passes, POST it as JSON.
    ///
    /// The values stay in the form unless the endpoint answers 2xx, in which
    /// case all four fields are reset to empty.
    ///
    /// # Errors
    ///
    /// - [`SubmitError::Busy`]: another submission is in flight; nothing is sent.
    /// - [`SubmitError::Invalid`]: one or more fields failed; nothing is sent.
    /// - [`SubmitError::Rejected`]: the endpoint answered non-2xx.
    /// - [`SubmitError::Transport`]: the request never completed.
    pub async fn submit(&self, input: RawFormInput) -> Result<Notice, SubmitError> {
        let Some(_busy) = self.begin() else {
            debug!("submission ignored while another is in flight");
            return Err(SubmitError::Busy);
        };

        let validated = CONTACT_SCHEMA.validate(&input);
        {
            let mut state = self.state();
            state.values = input;
            state.errors = validated.as_ref().err().cloned().unwrap_or_default();
        }
        let submission = validated.map_err(SubmitError::Invalid)?;

        let response = self
            .client
            .post(&self.endpoint)
            .json(&submission)
            .send()
            .await
            .map_err(|e| {
                error!(endpoint = %self.endpoint, error = %e, "contact request failed");
                SubmitError::Transport {
                    message: e.to_string(),
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            error!(endpoint = %self.endpoint, error = %e, "failed to read contact response");
            SubmitError::Transport {
                message: e.to_string(),
            }
        })?;
        let api: ApiResponse = serde_json::from_str(&body).unwrap_or_default();

        if status.is_success() {
            info!(
                status = status.as_u16(),
                id = api.id.as_deref().unwrap_or("-"),
                "contact message sent"
            );
            self.state().values = RawFormInput::default();
            return Ok(Notice::success(SUCCESS_MESSAGE));
        }

        let message = api
            .error
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| FALLBACK_FAILURE.to_string());
        warn!(
            status = status.as_u16(),
            server_message = api.message.as_deref().unwrap_or("-"),
            "contact message rejected"
        );
        Err(SubmitError::Rejected {
            status: status.as_u16(),
            message,
        })
    }

    fn begin(&self) -> Option<BusyGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard(&self.busy))
    }

    fn state(&self) -> MutexGuard<'_, FormState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::contact::{Field, NoticeLevel};

    fn valid() -> RawFormInput {
        RawFormInput {
            name: "Grace Hopper".into(),
            email: "grace@example.com".into(),
            subject: "Compiler question".into(),
            message: "How did you get the first compiler working?".into(),
        }
    }

    fn expected_body() -> serde_json::Value {
        json!({
            "name": "Grace Hopper",
            "email": "grace@example.com",
            "subject": "Compiler question",
            "message": "How did you get the first compiler working?",
        })
    }

    #[tokio::test]
    async fn valid_submission_posts_once_and_resets() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/contact"))
            .and(header("content-type", "application/json"))
            .and(body_json(expected_body()))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({ "message": "ok", "id": "m_1" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let form = ContactForm::new(reqwest::Client::new(), &server.uri());
        let notice = form.submit(valid()).await.unwrap();

        assert_eq!(notice.level, NoticeLevel::Success);
        assert_eq!(notice.message, SUCCESS_MESSAGE);
        assert!(form.values().is_empty());
        assert!(form.errors().is_empty());
        assert!(!form.is_busy());
    }

    #[tokio::test]
    async fn invalid_submission_never_hits_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let form = ContactForm::new(reqwest::Client::new(), &server.uri());
        let input = RawFormInput {
            name: "G".into(),
            email: "grace-at-example".into(),
            subject: "Hi".into(),
            message: "short".into(),
        };
        let err = form.submit(input.clone()).await.unwrap_err();

        let SubmitError::Invalid(errors) = &err else {
            panic!("expected validation failure, got {err:?}");
        };
        assert_eq!(errors.len(), 4);
        for field in Field::ALL {
            assert!(!errors.get(field).unwrap_or_default().is_empty());
        }
        assert_eq!(err.notice(), None);
        assert_eq!(form.values(), input);
        assert_eq!(&form.errors(), errors);
    }

    #[tokio::test]
    async fn rejection_uses_server_error_and_keeps_values() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/contact"))
            .respond_with(
                ResponseTemplate::new(429).set_body_json(json!({ "error": "Too many messages" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let form = ContactForm::new(reqwest::Client::new(), &server.uri());
        let err = form.submit(valid()).await.unwrap_err();

        assert_eq!(
            err,
            SubmitError::Rejected {
                status: 429,
                message: "Too many messages".into()
            }
        );
        assert_eq!(err.notice(), Some(Notice::error("Too many messages")));
        assert_eq!(form.values(), valid());
    }

    #[tokio::test]
    async fn rejection_without_error_field_uses_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("<html>oops</html>"))
            .expect(1)
            .mount(&server)
            .await;

        let form = ContactForm::new(reqwest::Client::new(), &server.uri());
        let err = form.submit(valid()).await.unwrap_err();

        assert_eq!(err.notice(), Some(Notice::error(FALLBACK_FAILURE)));
        assert_eq!(form.values(), valid());
    }

    #[tokio::test]
    async fn network_failure_reports_try_again_later() {
        // Nothing listens on port 1.
        let form = ContactForm::new(reqwest::Client::new(), "http://127.0.0.1:1");
        let err = form.submit(valid()).await.unwrap_err();

        assert!(matches!(err, SubmitError::Transport { .. }));
        assert_eq!(err.notice(), Some(Notice::error(NETWORK_FAILURE)));
        assert_eq!(form.values(), valid());
        assert!(!form.is_busy());
    }

    #[tokio::test]
    async fn second_submission_while_busy_is_refused() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(300)))
            .expect(1)
            .mount(&server)
            .await;

        let form = Arc::new(ContactForm::new(reqwest::Client::new(), &server.uri()));
        assert!(!form.is_busy());

        let first = tokio::spawn({
            let form = Arc::clone(&form);
            async move { form.submit(valid()).await }
        });

        while !form.is_busy() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(form.submit(valid()).await, Err(SubmitError::Busy));

        let notice = first.await.unwrap().unwrap();
        assert_eq!(notice.level, NoticeLevel::Success);
        assert!(!form.is_busy());
    }

    #[test]
    fn endpoint_joins_base_url() {
        let form = ContactForm::new(reqwest::Client::new(), "https://example.dev/");
        assert_eq!(form.endpoint(), "https://example.dev/api/contact");
    }
}
