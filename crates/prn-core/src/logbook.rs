//! The logbook: durable per-pull-request reconciliation state.
//!
//! One [`PersistentPullRequest`] exists per pull request ID. It records which
//! activity and comment IDs were already notified and the lifecycle of the
//! pull request (open and finish time, derived duration, authorship).
//!
//! # Merge policy
//!
//! - Notified IDs only grow.
//! - Timestamps are overwritten only by values greater than zero. The new value
//!   wins unconditionally, so callers must supply each bound at most once per
//!   pull request history.
//! - The duration is recomputed whenever both bounds are set and stays `None`
//!   otherwise.
//! - `is_yours` and `have_commented` are sticky: a `false` delta never resets
//!   them.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::{ActivityId, PullRequestId};

/// Lifecycle changes carried by a single activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LifecycleDelta {
    pub time_opened: Option<i64>,
    pub time_finished: Option<i64>,
    pub is_yours: bool,
    pub have_commented: bool,
}

impl LifecycleDelta {
    /// Delta of an OPENED activity.
    pub const fn opened(at: i64, is_yours: bool) -> Self {
        Self {
            time_opened: Some(at),
            time_finished: None,
            is_yours,
            have_commented: false,
        }
    }

    /// Delta of a DECLINED or MERGED activity.
    pub const fn finished(at: i64) -> Self {
        Self {
            time_opened: None,
            time_finished: Some(at),
            is_yours: false,
            have_commented: false,
        }
    }

    /// Delta of a COMMENTED activity.
    pub const fn commented(have_commented: bool) -> Self {
        Self {
            time_opened: None,
            time_finished: None,
            is_yours: false,
            have_commented,
        }
    }
}

/// Logbook entry for one pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistentPullRequest {
    pub id: PullRequestId,
    pub notified_activity_ids: BTreeSet<ActivityId>,
    /// Epoch milliseconds.
    pub time_opened: Option<i64>,
    /// Epoch milliseconds.
    pub time_finished: Option<i64>,
    /// Milliseconds between open and finish, never negative.
    pub duration_open_to_finish: Option<i64>,
    pub is_yours: bool,
    pub have_commented: bool,
}

impl PersistentPullRequest {
    /// Creates an empty entry with unset lifecycle fields.
    pub const fn new(id: PullRequestId) -> Self {
        Self {
            id,
            notified_activity_ids: BTreeSet::new(),
            time_opened: None,
            time_finished: None,
            duration_open_to_finish: None,
            is_yours: false,
            have_commented: false,
        }
    }

    /// Records `id` as notified. Returns false if it was already present.
    pub fn record(&mut self, id: ActivityId) -> bool {
        self.notified_activity_ids.insert(id)
    }

    /// Merges a lifecycle delta into this entry.
    pub fn merge(&mut self, delta: &LifecycleDelta) {
        if let Some(opened) = delta.time_opened.filter(|t| *t > 0) {
            self.time_opened = Some(opened);
        }
        if let Some(finished) = delta.time_finished.filter(|t| *t > 0) {
            self.time_finished = Some(finished);
        }
        if let (Some(opened), Some(finished)) = (self.time_opened, self.time_finished) {
            self.duration_open_to_finish = Some((finished - opened).max(0));
        }
        if delta.is_yours {
            self.is_yours = true;
        }
        if delta.have_commented {
            self.have_commented = true;
        }
    }
}

/// All logbook entries, addressed by pull request ID.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Logbook {
    entries: Vec<PersistentPullRequest>,
}

impl Logbook {
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Builds a logbook from stored entries.
    ///
    /// Entries sharing an ID are folded into one so lookups stay unambiguous.
    pub fn from_entries(entries: impl IntoIterator<Item = PersistentPullRequest>) -> Self {
        let mut logbook = Self::new();
        for entry in entries {
            match logbook.position(entry.id) {
                Some(idx) => {
                    let existing = &mut logbook.entries[idx];
                    existing
                        .notified_activity_ids
                        .extend(entry.notified_activity_ids.iter().copied());
                    existing.merge(&LifecycleDelta {
                        time_opened: entry.time_opened,
                        time_finished: entry.time_finished,
                        is_yours: entry.is_yours,
                        have_commented: entry.have_commented,
                    });
                }
                None => logbook.entries.push(entry),
            }
        }
        logbook
    }

    /// Looks up the entry for a pull request.
    pub fn find(&self, pr_id: PullRequestId) -> Option<&PersistentPullRequest> {
        self.entries.iter().find(|entry| entry.id == pr_id)
    }

    /// Returns true if any entry has already notified `id`.
    ///
    /// This scans every entry, not just the one for the activity's pull
    /// request: IDs are assumed globally unique.
    pub fn contains(&self, id: ActivityId) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.notified_activity_ids.contains(&id))
    }

    /// Records `ids` against a pull request and merges `delta`, creating the
    /// entry on first sight.
    pub fn upsert(
        &mut self,
        pr_id: PullRequestId,
        ids: impl IntoIterator<Item = ActivityId>,
        delta: &LifecycleDelta,
    ) -> &PersistentPullRequest {
        let idx = self.position(pr_id).unwrap_or_else(|| {
            self.entries.push(PersistentPullRequest::new(pr_id));
            self.entries.len() - 1
        });
        let entry = &mut self.entries[idx];
        for id in ids {
            entry.record(id);
        }
        entry.merge(delta);
        entry
    }

    pub fn entries(&self) -> &[PersistentPullRequest] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, pr_id: PullRequestId) -> Option<usize> {
        self.entries.iter().position(|entry| entry.id == pr_id)
    }
}
