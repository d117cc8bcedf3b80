//! Pull requests and their activity log as fetched from the server.
//!
//! These are read-only snapshots. Field names follow the Bitbucket Server REST
//! payloads so responses deserialize directly; fields the engine never reads
//! are not modelled.

use serde::{Deserialize, Serialize};

use crate::action::{ActivityAction, PullRequestState};
use crate::types::{ActivityId, PullRequestId};

/// A user as embedded in activities and comments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct User {
    pub name: String,
    pub slug: String,
    pub email_address: String,
    pub display_name: String,
}

/// Repository a branch ref lives in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Repository {
    pub slug: String,
    pub name: String,
}

/// Source or destination branch of a pull request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BranchRef {
    pub id: String,
    pub display_id: String,
    pub repository: Repository,
}

/// A live pull request as currently reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
    pub id: PullRequestId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub state: PullRequestState,
    #[serde(default)]
    pub from_ref: BranchRef,
    #[serde(default)]
    pub to_ref: BranchRef,
}

impl PullRequest {
    /// Name of the repository the pull request originates from.
    pub fn repository_name(&self) -> &str {
        &self.from_ref.repository.name
    }
}

/// Comment severity. `Blocker` comments are tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommentSeverity {
    #[default]
    Normal,
    Blocker,
    #[serde(other)]
    Unknown,
}

/// Comment or task state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommentState {
    #[default]
    Open,
    Pending,
    Resolved,
    #[serde(other)]
    Unknown,
}

/// A legacy task attached to a comment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Task {
    pub id: ActivityId,
    pub text: String,
    pub author: User,
    pub created_date: i64,
    pub state: CommentState,
}

/// A comment with its threaded replies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Comment {
    pub id: ActivityId,
    pub text: String,
    pub author: User,
    pub created_date: i64,
    /// Replies, in the order the server delivers them.
    #[serde(rename = "comments")]
    pub replies: Vec<Comment>,
    pub tasks: Vec<Task>,
    pub severity: CommentSeverity,
    pub state: CommentState,
}

impl Comment {
    pub fn is_task(&self) -> bool {
        self.severity == CommentSeverity::Blocker
    }

    pub fn is_resolved(&self) -> bool {
        self.state == CommentState::Resolved
    }

    /// IDs of every reply below this comment, depth-first.
    pub fn reply_ids(&self) -> Vec<ActivityId> {
        let mut ids = Vec::new();
        collect_reply_ids(&self.replies, &mut ids);
        ids
    }

    /// Number of comments in this thread, this one included.
    pub fn thread_len(&self) -> usize {
        1 + self.replies.iter().map(Self::thread_len).sum::<usize>()
    }

    /// Unresolved tasks in this thread: blocker comments plus legacy tasks.
    pub fn open_task_count(&self) -> usize {
        let own = usize::from(self.is_task() && !self.is_resolved());
        let legacy = self
            .tasks
            .iter()
            .filter(|task| task.state == CommentState::Open)
            .count();
        own + legacy
            + self
                .replies
                .iter()
                .map(Self::open_task_count)
                .sum::<usize>()
    }
}

fn collect_reply_ids(replies: &[Comment], ids: &mut Vec<ActivityId>) {
    for reply in replies {
        ids.push(reply.id);
        collect_reply_ids(&reply.replies, ids);
    }
}

/// Location in the diff a comment is attached to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CommentAnchor {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

/// A path on one side of a diff.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DiffPath {
    pub name: String,
    pub parent: String,
}

/// Diff attached to an activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Diff {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<DiffPath>,
}

/// One event in a pull request's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: ActivityId,
    #[serde(default)]
    pub created_date: i64,
    #[serde(default)]
    pub user: User,
    #[serde(default)]
    pub action: ActivityAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<Comment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment_anchor: Option<CommentAnchor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<Diff>,
}

impl Activity {
    /// File path the activity's comment is anchored to, if any.
    pub fn anchor_path(&self) -> Option<&str> {
        self.comment_anchor
            .as_ref()
            .map(|anchor| anchor.path.as_str())
            .filter(|path| !path.is_empty())
    }

    /// Name of the changed file for rescope and update activities.
    pub fn changed_file(&self) -> &str {
        self.diff
            .as_ref()
            .and_then(|diff| diff.destination.as_ref())
            .map_or("", |destination| destination.name.as_str())
    }
}

/// One page of the activity endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ActivityPage {
    pub size: usize,
    pub limit: usize,
    pub is_last_page: bool,
    pub start: usize,
    pub values: Vec<Activity>,
}

/// The activities fetched for one pull request, either raw or as a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActivityBatch {
    List(Vec<Activity>),
    Page(ActivityPage),
}

impl ActivityBatch {
    pub fn into_activities(self) -> Vec<Activity> {
        match self {
            Self::List(activities) => activities,
            Self::Page(page) => page.values,
        }
    }
}
