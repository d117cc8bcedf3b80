//! Activity actions and pull request states as reported by the server.
//!
//! Both vocabularies evolve on the server side, so unrecognised values are
//! kept verbatim in an `Other` variant instead of failing deserialization.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What happened in a pull request activity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActivityAction {
    Opened,
    Commented,
    Rescoped,
    Updated,
    Approved,
    Declined,
    Merged,
    Reviewed,
    /// An action this crate does not know how to notify about.
    Other(String),
}

impl ActivityAction {
    /// Parses a server action string. Never fails.
    pub fn parse(s: &str) -> Self {
        match s {
            "OPENED" => Self::Opened,
            "COMMENTED" => Self::Commented,
            "RESCOPED" => Self::Rescoped,
            "UPDATED" => Self::Updated,
            "APPROVED" => Self::Approved,
            "DECLINED" => Self::Declined,
            "MERGED" => Self::Merged,
            "REVIEWED" => Self::Reviewed,
            other => Self::Other(other.to_string()),
        }
    }

    /// String representation as used on the wire.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Opened => "OPENED",
            Self::Commented => "COMMENTED",
            Self::Rescoped => "RESCOPED",
            Self::Updated => "UPDATED",
            Self::Approved => "APPROVED",
            Self::Declined => "DECLINED",
            Self::Merged => "MERGED",
            Self::Reviewed => "REVIEWED",
            Self::Other(s) => s,
        }
    }
}

/// A missing action is treated like an unknown one.
impl Default for ActivityAction {
    fn default() -> Self {
        Self::Other(String::new())
    }
}

impl fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for ActivityAction {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ActivityAction {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}

/// Current state of a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum PullRequestState {
    #[default]
    Open,
    Declined,
    Merged,
    Unapproved,
    Deleted,
    Other(String),
}

impl PullRequestState {
    /// Parses a server state string. Never fails.
    pub fn parse(s: &str) -> Self {
        match s {
            "OPEN" => Self::Open,
            "DECLINED" => Self::Declined,
            "MERGED" => Self::Merged,
            "UNAPPROVED" => Self::Unapproved,
            "DELETED" => Self::Deleted,
            other => Self::Other(other.to_string()),
        }
    }

    /// String representation as used on the wire.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Open => "OPEN",
            Self::Declined => "DECLINED",
            Self::Merged => "MERGED",
            Self::Unapproved => "UNAPPROVED",
            Self::Deleted => "DELETED",
            Self::Other(s) => s,
        }
    }

    /// Comments on pull requests in these states are never notified.
    pub const fn is_closed(&self) -> bool {
        matches!(
            self,
            Self::Declined | Self::Merged | Self::Unapproved | Self::Deleted
        )
    }
}

impl fmt::Display for PullRequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for PullRequestState {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PullRequestState {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}
