//! Contact form: validate four fields and submit them to `/api/contact`.
//!
//! - [`CONTACT_SCHEMA`] describes the per-field constraints declaratively.
//! - [`ContactForm`] owns the field values, the busy flag, and the single POST
//!   per submission.
//! - [`Notice`] is the toast-style outcome shown to the visitor.

mod form;
mod schema;

use serde::{Deserialize, Serialize};

pub use form::{
    CONTACT_PATH, ContactForm, FALLBACK_FAILURE, NETWORK_FAILURE, SUCCESS_MESSAGE, SubmitError,
};
pub use schema::{CONTACT_SCHEMA, Constraint, Field, FieldErrors, FieldRule, Schema};

/// The form values as typed by the visitor, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawFormInput {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

impl RawFormInput {
    pub fn is_empty(&self) -> bool {
        Field::ALL.iter().all(|f| f.value(self).is_empty())
    }
}

/// A validated submission; serializes to exactly the four payload keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactSubmission {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

// Body returned by the contact endpoint.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ApiResponse {
    pub error: Option<String>,
    pub message: Option<String>,
    pub id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Error,
}

/// A transient notification about a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}
