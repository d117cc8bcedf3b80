//! Semantic notifications and the notifier seam.
//!
//! The engine emits one [`Notification`] per semantic event. Delivery (desktop,
//! push, webhook) belongs to the [`Notifier`] implementation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What a notification is about, with its kind-specific fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationKind {
    Opened { description: String },
    /// The pull request was rescoped.
    Amended { file: String },
    /// New commits were pushed.
    NewCommit { file: String },
    Approved,
    Declined,
    Merged,
    Reviewed,
    Comment { text: String, path: Option<String> },
    NewTask { text: String, path: Option<String> },
    ClosedTask { text: String, path: Option<String> },
}

impl NotificationKind {
    pub const fn category(&self) -> NotificationCategory {
        match self {
            Self::Comment { .. } => NotificationCategory::Comments,
            Self::NewTask { .. } | Self::ClosedTask { .. } => NotificationCategory::Tasks,
            Self::Opened { .. }
            | Self::Amended { .. }
            | Self::NewCommit { .. }
            | Self::Approved
            | Self::Reviewed => NotificationCategory::Status,
            Self::Declined | Self::Merged => NotificationCategory::Completion,
        }
    }
}

/// Preference groups notifications can be toggled by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationCategory {
    Comments,
    Tasks,
    Status,
    Completion,
}

/// A notification about one pull request event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub repository: String,
    /// Display name of the user who caused the event.
    pub actor: String,
    /// Title of the pull request.
    pub title: String,
    /// True when the actor is the configured identity.
    pub own_activity: bool,
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] ", self.repository)?;
        match &self.kind {
            NotificationKind::Opened { description } => {
                write!(f, "{} opened \"{}\"", self.actor, self.title)?;
                if !description.is_empty() {
                    write!(f, ": {description}")?;
                }
                Ok(())
            }
            NotificationKind::Amended { file } => {
                write!(f, "{} amended \"{}\" ({file})", self.actor, self.title)
            }
            NotificationKind::NewCommit { file } => {
                write!(f, "{} pushed to \"{}\" ({file})", self.actor, self.title)
            }
            NotificationKind::Approved => write!(f, "{} approved \"{}\"", self.actor, self.title),
            NotificationKind::Declined => write!(f, "{} declined \"{}\"", self.actor, self.title),
            NotificationKind::Merged => write!(f, "{} merged \"{}\"", self.actor, self.title),
            NotificationKind::Reviewed => write!(f, "{} reviewed \"{}\"", self.actor, self.title),
            NotificationKind::Comment { text, path } => write_with_path(
                f,
                &self.actor,
                "commented on",
                &self.title,
                path.as_deref(),
                text,
            ),
            NotificationKind::NewTask { text, path } => write_with_path(
                f,
                &self.actor,
                "opened a task on",
                &self.title,
                path.as_deref(),
                text,
            ),
            NotificationKind::ClosedTask { text, path } => write_with_path(
                f,
                &self.actor,
                "resolved a task on",
                &self.title,
                path.as_deref(),
                text,
            ),
        }
    }
}

fn write_with_path(
    f: &mut fmt::Formatter<'_>,
    actor: &str,
    verb: &str,
    title: &str,
    path: Option<&str>,
    text: &str,
) -> fmt::Result {
    write!(f, "{actor} {verb} \"{title}\"")?;
    if let Some(path) = path {
        write!(f, " at {path}")?;
    }
    write!(f, ": {text}")
}

/// Receives notifications from the engine.
pub trait Notifier {
    fn notify(&mut self, notification: Notification);
}

impl<N: Notifier + ?Sized> Notifier for &mut N {
    fn notify(&mut self, notification: Notification) {
        (**self).notify(notification);
    }
}

/// Collects notifications in memory.
impl Notifier for Vec<Notification> {
    fn notify(&mut self, notification: Notification) {
        self.push(notification);
    }
}

/// Which notifications the user wants delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationPreferences {
    pub comments: bool,
    pub tasks: bool,
    pub status: bool,
    pub completion: bool,
    /// Drop notifications about your own activity.
    pub filter_own_activities: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            comments: true,
            tasks: true,
            status: true,
            completion: true,
            filter_own_activities: false,
        }
    }
}

impl NotificationPreferences {
    pub const fn allows(&self, notification: &Notification) -> bool {
        if self.filter_own_activities && notification.own_activity {
            return false;
        }
        match notification.kind.category() {
            NotificationCategory::Comments => self.comments,
            NotificationCategory::Tasks => self.tasks,
            NotificationCategory::Status => self.status,
            NotificationCategory::Completion => self.completion,
        }
    }
}

/// Forwards only the notifications allowed by the preferences.
///
/// Filtered notifications still count as handled by the engine and are
/// recorded in the logbook like delivered ones.
#[derive(Debug)]
pub struct FilteredNotifier<N> {
    inner: N,
    preferences: NotificationPreferences,
    filtered: usize,
}

impl<N: Notifier> FilteredNotifier<N> {
    pub const fn new(inner: N, preferences: NotificationPreferences) -> Self {
        Self {
            inner,
            preferences,
            filtered: 0,
        }
    }

    /// Number of notifications dropped so far.
    pub const fn filtered(&self) -> usize {
        self.filtered
    }

    pub fn into_inner(self) -> N {
        self.inner
    }
}

impl<N: Notifier> Notifier for FilteredNotifier<N> {
    fn notify(&mut self, notification: Notification) {
        if self.preferences.allows(&notification) {
            self.inner.notify(notification);
        } else {
            tracing::debug!(
                category = ?notification.kind.category(),
                title = %notification.title,
                "notification filtered by preferences"
            );
            self.filtered += 1;
        }
    }
}
