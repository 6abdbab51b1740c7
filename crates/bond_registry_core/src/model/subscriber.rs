//! Subscriber model and boundary validation.
//!
//! The bond engine stores subscribers as given. Callers that accept
//! subscriber input from outside (CLI, API) run [`Subscriber::validate`]
//! before handing it to the engine.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)+$")
        .expect("valid email regex")
});

/// Subscriber identifier, unique within one bond.
pub type SubscriberId = String;

/// Individual authorized under a bond to request host services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    pub sid: SubscriberId,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriberValidationError {
    EmptySid,
    EmptyName { sid: SubscriberId },
    InvalidEmail { sid: SubscriberId, email: String },
}

impl Display for SubscriberValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptySid => write!(f, "subscriber sid must not be empty"),
            Self::EmptyName { sid } => write!(f, "subscriber `{sid}` has an empty name"),
            Self::InvalidEmail { sid, email } => {
                write!(f, "subscriber `{sid}` has an invalid email address `{email}`")
            }
        }
    }
}

impl Error for SubscriberValidationError {}

impl Subscriber {
    pub fn new(
        sid: impl Into<SubscriberId>,
        name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            sid: sid.into(),
            name: name.into(),
            email: email.into(),
        }
    }

    /// Checks the fields a presentation layer must guarantee.
    pub fn validate(&self) -> Result<(), SubscriberValidationError> {
        if self.sid.trim().is_empty() {
            return Err(SubscriberValidationError::EmptySid);
        }
        if self.name.trim().is_empty() {
            return Err(SubscriberValidationError::EmptyName {
                sid: self.sid.clone(),
            });
        }
        if !is_valid_email(&self.email) {
            return Err(SubscriberValidationError::InvalidEmail {
                sid: self.sid.clone(),
                email: self.email.clone(),
            });
        }
        Ok(())
    }
}

/// Syntactic email check: dotted domain, no whitespace, one `@`.
pub fn is_valid_email(value: &str) -> bool {
    value.len() <= 254 && EMAIL_RE.is_match(value)
}
