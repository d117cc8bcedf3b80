//! Maps a new activity to its notifications and lifecycle delta.

use crate::action::ActivityAction;
use crate::logbook::{LifecycleDelta, Logbook};
use crate::model::{Activity, Comment, PullRequest, User};
use crate::notify::{Notification, NotificationKind, Notifier};
use crate::types::Identity;
use crate::walker::walk_thread;

/// Outcome of dispatching one activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Notifications were sent; `delta` must be merged into the logbook.
    Notified {
        delta: LifecycleDelta,
        notifications: usize,
    },
    /// A comment on a closed pull request. Nothing is notified or recorded.
    Suppressed,
    /// Unknown action or missing payload. Nothing is notified.
    Skipped,
}

/// Sends the notifications for `activity` and returns its lifecycle delta.
///
/// `logbook` is only read, to find which thread replies are already known.
pub fn dispatch<N: Notifier>(
    pr: &PullRequest,
    activity: &Activity,
    logbook: &Logbook,
    identity: Option<&Identity>,
    notifier: &mut N,
) -> Dispatch {
    let mut out = Emitter {
        pr,
        identity,
        notifier,
        sent: 0,
    };
    let user = &activity.user;

    let delta = match &activity.action {
        ActivityAction::Opened => {
            out.emit(
                user,
                NotificationKind::Opened {
                    description: pr.description.clone(),
                },
            );
            LifecycleDelta::opened(activity.created_date, out.is_you(user))
        }
        ActivityAction::Commented => {
            if pr.state.is_closed() {
                return Dispatch::Suppressed;
            }
            let Some(comment) = &activity.comment else {
                return Dispatch::Skipped;
            };
            notify_comment(&mut out, activity, comment, logbook);
            LifecycleDelta::commented(author_is_you(comment, identity))
        }
        ActivityAction::Rescoped => {
            out.emit(
                user,
                NotificationKind::Amended {
                    file: activity.changed_file().to_string(),
                },
            );
            LifecycleDelta::default()
        }
        ActivityAction::Updated => {
            out.emit(
                user,
                NotificationKind::NewCommit {
                    file: activity.changed_file().to_string(),
                },
            );
            LifecycleDelta::default()
        }
        ActivityAction::Approved => {
            out.emit(user, NotificationKind::Approved);
            LifecycleDelta::default()
        }
        ActivityAction::Declined => {
            out.emit(user, NotificationKind::Declined);
            LifecycleDelta::finished(activity.created_date)
        }
        ActivityAction::Merged => {
            out.emit(user, NotificationKind::Merged);
            LifecycleDelta::finished(activity.created_date)
        }
        ActivityAction::Reviewed => {
            out.emit(user, NotificationKind::Reviewed);
            LifecycleDelta::default()
        }
        ActivityAction::Other(_) => return Dispatch::Skipped,
    };

    Dispatch::Notified {
        delta,
        notifications: out.sent,
    }
}

/// Notifies new thread replies, then the outer comment.
///
/// A task fires its task notification(s) and then the plain comment
/// notification as well.
fn notify_comment<N: Notifier>(
    out: &mut Emitter<'_, N>,
    activity: &Activity,
    comment: &Comment,
    logbook: &Logbook,
) {
    let path = activity.anchor_path().map(str::to_string);

    let walk = walk_thread(&comment.replies, |id| !logbook.classify(id).is_new());
    for reply in walk.new_replies() {
        out.emit(
            &reply.author,
            NotificationKind::Comment {
                text: reply.text.clone(),
                path: path.clone(),
            },
        );
    }
    if let Some(id) = walk.stopped_at {
        tracing::debug!(
            activity_id = activity.id,
            reply_id = id,
            "reached known reply, thread walk stopped"
        );
    }

    if comment.is_task() {
        if comment.is_resolved() {
            out.emit(
                &activity.user,
                NotificationKind::ClosedTask {
                    text: comment.text.clone(),
                    path: path.clone(),
                },
            );
        }
        out.emit(
            &activity.user,
            NotificationKind::NewTask {
                text: comment.text.clone(),
                path: path.clone(),
            },
        );
    }
    out.emit(
        &activity.user,
        NotificationKind::Comment {
            text: comment.text.clone(),
            path,
        },
    );
}

/// Whether the configured identity wrote the latest part of a comment.
///
/// With replies present only the first reply's author is checked.
fn author_is_you(comment: &Comment, identity: Option<&Identity>) -> bool {
    let Some(identity) = identity else {
        return false;
    };
    if comment.text.is_empty() {
        return false;
    }
    let author = comment
        .replies
        .first()
        .map_or(&comment.author, |reply| &reply.author);
    identity.matches(author)
}

struct Emitter<'a, N> {
    pr: &'a PullRequest,
    identity: Option<&'a Identity>,
    notifier: &'a mut N,
    sent: usize,
}

impl<N: Notifier> Emitter<'_, N> {
    fn is_you(&self, user: &User) -> bool {
        self.identity.is_some_and(|identity| identity.matches(user))
    }

    fn emit(&mut self, actor: &User, kind: NotificationKind) {
        let notification = Notification {
            kind,
            repository: self.pr.repository_name().to_string(),
            actor: actor.display_name.clone(),
            title: self.pr.title.clone(),
            own_activity: self.is_you(actor),
        };
        self.notifier.notify(notification);
        self.sent += 1;
    }
}
