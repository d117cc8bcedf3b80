//! Reconciliation passes over freshly fetched activity.
//!
//! A pass walks pull requests and their activity batches in lock-step. Each
//! activity not yet in the logbook is dispatched and then recorded, together
//! with every reply ID of its comment thread once the pull request has an
//! entry. The logbook is handed to the [`LogbookSink`] once, after the whole
//! pass.
//!
//! # Thread Safety
//!
//! A [`Reconciler`] owns its logbook and mutates it through `&mut self`, so a
//! pass always runs to completion before another can start on the same value.

use std::iter;

use thiserror::Error;

use crate::action::ActivityAction;
use crate::dispatch::{Dispatch, dispatch};
use crate::logbook::{LifecycleDelta, Logbook};
use crate::model::{Activity, Comment, PullRequest};
use crate::notify::Notifier;
use crate::types::Identity;

/// Errors aborting a reconciliation pass.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Caller supplied a different number of pull requests and batches.
    #[error("mismatch of pull requests ({pull_requests}) and activity batches ({batches})")]
    BatchCountMismatch { pull_requests: usize, batches: usize },
    /// The logbook could not be persisted after the pass.
    #[error("failed to persist logbook")]
    Persist(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Durable storage for the logbook, invoked once per pass.
pub trait LogbookSink {
    type Error: std::error::Error + Send + Sync + 'static;

    fn save(&mut self, logbook: &Logbook) -> Result<(), Self::Error>;
}

/// Counters for one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub pull_requests: usize,
    /// Activities dispatched for the first time.
    pub new_activities: usize,
    pub notifications: usize,
    /// New comments dropped because their pull request is closed.
    pub suppressed: usize,
    /// New activities with an unknown action or a missing payload.
    pub skipped: usize,
    /// Comments, replies included, on open pull requests in this pass.
    pub active_comments: usize,
    /// Unresolved tasks on open pull requests in this pass.
    pub active_tasks: usize,
}

/// Owns the logbook and runs reconciliation passes against it.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    logbook: Logbook,
    identity: Option<Identity>,
}

impl Reconciler {
    pub const fn new(logbook: Logbook, identity: Option<Identity>) -> Self {
        Self { logbook, identity }
    }

    pub const fn logbook(&self) -> &Logbook {
        &self.logbook
    }

    pub fn into_logbook(self) -> Logbook {
        self.logbook
    }

    /// Runs one pass and persists the logbook through `sink`.
    ///
    /// `batches[i]` holds the activities of `pull_requests[i]`, in server
    /// order. If the lengths differ nothing is notified, recorded or saved.
    pub fn reconcile<N, S>(
        &mut self,
        pull_requests: &[PullRequest],
        batches: &[Vec<Activity>],
        notifier: &mut N,
        sink: &mut S,
    ) -> Result<PassSummary, ReconcileError>
    where
        N: Notifier,
        S: LogbookSink,
    {
        if pull_requests.len() != batches.len() {
            return Err(ReconcileError::BatchCountMismatch {
                pull_requests: pull_requests.len(),
                batches: batches.len(),
            });
        }

        let mut summary = PassSummary {
            pull_requests: pull_requests.len(),
            ..PassSummary::default()
        };
        for (pr, activities) in pull_requests.iter().zip(batches) {
            for activity in activities {
                self.handle_activity(pr, activity, notifier, &mut summary);
            }
            if !pr.state.is_closed() {
                count_active(activities, &mut summary);
            }
        }

        sink.save(&self.logbook)
            .map_err(|e| ReconcileError::Persist(Box::new(e)))?;

        tracing::info!(
            pull_requests = summary.pull_requests,
            new_activities = summary.new_activities,
            notifications = summary.notifications,
            suppressed = summary.suppressed,
            skipped = summary.skipped,
            "reconciliation pass complete"
        );
        Ok(summary)
    }

    fn handle_activity<N: Notifier>(
        &mut self,
        pr: &PullRequest,
        activity: &Activity,
        notifier: &mut N,
        summary: &mut PassSummary,
    ) {
        if !self.logbook.classify(activity.id).is_new() {
            return;
        }
        match dispatch(pr, activity, &self.logbook, self.identity.as_ref(), notifier) {
            Dispatch::Notified {
                delta,
                notifications,
            } => {
                summary.new_activities += 1;
                summary.notifications += notifications;
                self.record(pr, activity, &delta);
            }
            Dispatch::Suppressed => {
                tracing::debug!(
                    pr_id = pr.id,
                    activity_id = activity.id,
                    state = %pr.state,
                    "comment on closed pull request suppressed"
                );
                summary.suppressed += 1;
            }
            Dispatch::Skipped => {
                tracing::debug!(
                    pr_id = pr.id,
                    activity_id = activity.id,
                    action = %activity.action,
                    "activity skipped"
                );
                summary.skipped += 1;
                self.record(pr, activity, &LifecycleDelta::default());
            }
        }
    }

    fn record(&mut self, pr: &PullRequest, activity: &Activity, delta: &LifecycleDelta) {
        // A new entry starts from the activity ID alone.
        let replies = if self.logbook.find(pr.id).is_some() {
            activity
                .comment
                .as_ref()
                .map(Comment::reply_ids)
                .unwrap_or_default()
        } else {
            Vec::new()
        };
        self.logbook
            .upsert(pr.id, iter::once(activity.id).chain(replies), delta);
    }
}

fn count_active(activities: &[Activity], summary: &mut PassSummary) {
    let comments = activities
        .iter()
        .filter(|activity| activity.action == ActivityAction::Commented)
        .filter_map(|activity| activity.comment.as_ref());
    for comment in comments {
        summary.active_comments += comment.thread_len();
        summary.active_tasks += comment.open_task_count();
    }
}
