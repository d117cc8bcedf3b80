//! Core domain logic for the pull request notifier.
//!
//! This crate contains the fundamental types and logic for:
//! - Event log: pull requests, activities and threaded comments as fetched
//! - Logbook: per-pull-request notification and lifecycle state
//! - Reconciliation: deciding which activities are new and notifying each once

pub mod action;
mod dispatch;
pub mod logbook;
pub mod model;
pub mod notify;
mod novelty;
mod reconcile;
pub mod types;
pub mod walker;

pub use action::{ActivityAction, PullRequestState};
pub use dispatch::{Dispatch, dispatch};
pub use logbook::{LifecycleDelta, Logbook, PersistentPullRequest};
pub use model::{
    Activity, ActivityBatch, ActivityPage, BranchRef, Comment, CommentAnchor, CommentSeverity,
    CommentState, Diff, DiffPath, PullRequest, Repository, Task, User,
};
pub use notify::{
    FilteredNotifier, Notification, NotificationCategory, NotificationKind,
    NotificationPreferences, Notifier,
};
pub use novelty::Novelty;
pub use reconcile::{LogbookSink, PassSummary, ReconcileError, Reconciler};
pub use types::{ActivityId, Identity, PullRequestId, ValidationError};
pub use walker::{ThreadNode, ThreadWalk, walk_thread};
