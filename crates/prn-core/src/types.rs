//! Core type definitions with validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::User;

/// Identifier of a pull request, unique within the remote server.
pub type PullRequestId = i64;

/// Identifier of an activity or comment.
///
/// Activity and comment IDs share one namespace in the logbook and are assumed
/// to be globally unique across pull requests.
pub type ActivityId = i64;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },
}

/// The configured user, matched against activity actors.
///
/// Servers authenticate either by username or by email, so the configured
/// value is compared against both the actor's slug and email address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    /// Creates a new identity after validation.
    pub fn new(username: impl Into<String>) -> Result<Self, ValidationError> {
        let username = username.into();
        if username.trim().is_empty() {
            return Err(ValidationError::Empty { field: "username" });
        }
        Ok(Self(username))
    }

    /// Returns the configured username as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true when `user` is the configured identity.
    pub fn matches(&self, user: &User) -> bool {
        user.slug == self.0 || user.email_address == self.0
    }
}

impl TryFrom<String> for Identity {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Identity> for String {
    fn from(identity: Identity) -> Self {
        identity.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
