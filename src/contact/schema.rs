//! Declarative constraints for the contact form and the validator that
//! evaluates them.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{ContactSubmission, RawFormInput};

// Local part may not start with a dot or contain `..`; checked separately
// because the regex engine has no lookaround.
static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[A-Z0-9_'+\-.]*[A-Z0-9_+\-]@([A-Z0-9][A-Z0-9\-]*\.)+[A-Z]{2,}$")
        .expect("email pattern compiles")
});

/// One of the four contact form fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Name,
    Email,
    Subject,
    Message,
}

impl Field {
    pub const ALL: [Field; 4] = [Field::Name, Field::Email, Field::Subject, Field::Message];

    pub fn as_str(self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Email => "email",
            Field::Subject => "subject",
            Field::Message => "message",
        }
    }

    /// The raw value of this field in `input`.
    pub fn value(self, input: &RawFormInput) -> &str {
        match self {
            Field::Name => &input.name,
            Field::Email => &input.email,
            Field::Subject => &input.subject,
            Field::Message => &input.message,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single check on a field value. Lengths count characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    MinLength { min: usize, message: &'static str },
    MaxLength { max: usize, message: &'static str },
    Email { message: &'static str },
}

impl Constraint {
    /// `None` when `value` satisfies the constraint, the message otherwise.
    pub fn check(&self, value: &str) -> Option<&'static str> {
        let ok = match *self {
            Constraint::MinLength { min, .. } => value.chars().count() >= min,
            Constraint::MaxLength { max, .. } => value.chars().count() <= max,
            Constraint::Email { .. } => is_email(value),
        };
        (!ok).then_some(self.message())
    }

    pub fn message(&self) -> &'static str {
        match *self {
            Constraint::MinLength { message, .. }
            | Constraint::MaxLength { message, .. }
            | Constraint::Email { message } => message,
        }
    }
}

fn is_email(value: &str) -> bool {
    let local = value.split('@').next().unwrap_or_default();
    !local.starts_with('.') && !local.contains("..") && EMAIL.is_match(value)
}

/// The constraints applied to one field, in evaluation order.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub field: Field,
    pub constraints: &'static [Constraint],
}

/// A full form schema: one rule per field.
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    pub rules: &'static [FieldRule],
}

/// The contact form schema.
pub const CONTACT_SCHEMA: Schema = Schema {
    rules: &[
        FieldRule {
            field: Field::Name,
            constraints: &[
                Constraint::MinLength {
                    min: 2,
                    message: "Name must be at least 2 characters",
                },
                Constraint::MaxLength {
                    max: 50,
                    message: "Name must be less than 50 characters",
                },
            ],
        },
        FieldRule {
            field: Field::Email,
            constraints: &[Constraint::Email {
                message: "Please enter a valid email address",
            }],
        },
        FieldRule {
            field: Field::Subject,
            constraints: &[
                Constraint::MinLength {
                    min: 5,
                    message: "Subject must be at least 5 characters",
                },
                Constraint::MaxLength {
                    max: 100,
                    message: "Subject must be less than 100 characters",
                },
            ],
        },
        FieldRule {
            field: Field::Message,
            constraints: &[
                Constraint::MinLength {
                    min: 10,
                    message: "Message must be at least 10 characters",
                },
                Constraint::MaxLength {
                    max: 1000,
                    message: "Message must be less than 1000 characters",
                },
            ],
        },
    ],
};

impl Schema {
    /// Validate every field independently.
    ///
    /// Each failing field reports the message of its first violated
    /// constraint. Only input where no field fails becomes a
    /// [`ContactSubmission`].
    pub fn validate(&self, input: &RawFormInput) -> Result<ContactSubmission, FieldErrors> {
        let mut errors = FieldErrors::default();
        for rule in self.rules {
            let value = rule.field.value(input);
            if let Some(message) = rule.constraints.iter().find_map(|c| c.check(value)) {
                errors.insert(rule.field, message);
            }
        }

        if errors.is_empty() {
            Ok(ContactSubmission {
                name: input.name.clone(),
                email: input.email.clone(),
                subject: input.subject.clone(),
                message: input.message.clone(),
            })
        } else {
            Err(errors)
        }
    }
}

/// Per-field violation messages, ordered by field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors {
    inner: BTreeMap<Field, String>,
}

impl FieldErrors {
    pub fn insert(&mut self, field: Field, message: impl Into<String>) {
        self.inner.insert(field, message.into());
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.inner.get(&field).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.inner.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        self.inner.iter().map(|(f, m)| (*f, m.as_str()))
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (field, message)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {message}")?;
        }
        Ok(())
    }
}
