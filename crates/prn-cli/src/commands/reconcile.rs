//! Reconcile command: one pass over freshly fetched activity.
//!
//! The input is the JSON the fetcher produced:
//!
//! ```json
//! {"pullRequests": [...], "activities": [[...], {"values": [...], ...}]}
//! ```
//!
//! `activities[i]` belongs to `pullRequests[i]` and is either a plain list or
//! a page envelope as returned by the activity endpoint.

use std::fs::File;
use std::io::{self, Write};

use anyhow::{Context, Result};
use chrono::Utc;
use fs2::FileExt;
use serde::Deserialize;

use prn_core::{
    Activity, ActivityBatch, FilteredNotifier, Notification, Notifier, PassSummary, PullRequest,
    Reconciler,
};
use prn_db::Database;

use crate::Config;

/// Pull requests and their activity, as fetched from the server.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileInput {
    #[serde(default)]
    pub pull_requests: Vec<PullRequest>,
    #[serde(default)]
    pub activities: Vec<ActivityBatch>,
}

impl ReconcileInput {
    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("failed to parse reconcile input")
    }

    fn into_parts(self) -> (Vec<PullRequest>, Vec<Vec<Activity>>) {
        let batches = self
            .activities
            .into_iter()
            .map(ActivityBatch::into_activities)
            .collect();
        (self.pull_requests, batches)
    }
}

/// Writes each notification as one line.
///
/// The first write error is kept and reported after the pass.
pub struct LineNotifier<W> {
    writer: W,
    error: Option<io::Error>,
}

impl<W: Write> LineNotifier<W> {
    pub const fn new(writer: W) -> Self {
        Self {
            writer,
            error: None,
        }
    }

    pub fn finish(mut self) -> io::Result<W> {
        if let Some(e) = self.error {
            return Err(e);
        }
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl<W: Write> Notifier for LineNotifier<W> {
    fn notify(&mut self, notification: Notification) {
        if self.error.is_some() {
            return;
        }
        if let Err(e) = writeln!(self.writer, "{notification}") {
            self.error = Some(e);
        }
    }
}

/// Runs one pass and records it in the database.
///
/// Holds an exclusive lock next to the database so concurrent passes
/// cannot interleave their logbook writes.
pub fn run<W: Write>(writer: &mut W, config: &Config, input: &str) -> Result<PassSummary> {
    let input = ReconcileInput::parse(input)?;
    let identity = config.identity().context("invalid username in configuration")?;

    let lock_file = File::create(config.lock_path()).context("failed to create lock file")?;
    lock_file
        .lock_exclusive()
        .context("failed to acquire lock")?;

    let mut db = Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    let logbook = db.load_logbook().context("failed to load logbook")?;
    tracing::debug!(entries = logbook.len(), "loaded logbook");

    let (pull_requests, batches) = input.into_parts();
    let mut notifier = FilteredNotifier::new(LineNotifier::new(writer), config.notifications);
    let mut reconciler = Reconciler::new(logbook, identity);
    let summary = reconciler.reconcile(&pull_requests, &batches, &mut notifier, &mut db)?;

    if notifier.filtered() > 0 {
        tracing::debug!(filtered = notifier.filtered(), "notifications filtered");
    }
    notifier
        .into_inner()
        .finish()
        .context("failed to write notifications")?;

    db.record_pass(&summary, Utc::now())
        .context("failed to record pass")?;

    // Lock is released when lock_file is dropped
    drop(lock_file);

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::Path;

    use prn_core::{NotificationPreferences, ReconcileError};

    const INPUT: &str = r#"{
        "pullRequests": [
            {
                "id": 7,
                "title": "Add frobnicator",
                "description": "Frobs things",
                "state": "OPEN",
                "fromRef": {"repository": {"slug": "widgets", "name": "widgets"}}
            }
        ],
        "activities": [
            {
                "size": 2, "limit": 25, "isLastPage": true, "start": 0,
                "values": [
                    {
                        "id": 2,
                        "createdDate": 1735718460000,
                        "user": {"slug": "bob", "displayName": "Bob"},
                        "action": "COMMENTED",
                        "comment": {
                            "id": 20,
                            "text": "Please rename",
                            "author": {"slug": "bob", "displayName": "Bob"},
                            "comments": [
                                {
                                    "id": 21,
                                    "text": "Done",
                                    "author": {"slug": "asmith", "displayName": "Anna Smith"}
                                }
                            ]
                        },
                        "commentAnchor": {"path": "src/lib.rs"}
                    },
                    {
                        "id": 1,
                        "createdDate": 1735718400000,
                        "user": {"slug": "asmith", "displayName": "Anna Smith"},
                        "action": "OPENED"
                    }
                ]
            }
        ]
    }"#;

    fn config(dir: &Path) -> Config {
        Config {
            database_path: dir.join("prn.db"),
            username: Some("asmith".to_string()),
            notifications: NotificationPreferences::default(),
        }
    }

    #[test]
    fn reconcile_prints_each_event_once() {
        let temp = tempfile::tempdir().unwrap();
        let config = config(temp.path());

        let mut output = Vec::new();
        let summary = run(&mut output, &config, INPUT).unwrap();
        let output = String::from_utf8(output).unwrap();

        assert_eq!(
            output.lines().collect::<Vec<_>>(),
            vec![
                "[widgets] Anna Smith commented on \"Add frobnicator\" at src/lib.rs: Done",
                "[widgets] Bob commented on \"Add frobnicator\" at src/lib.rs: Please rename",
                "[widgets] Anna Smith opened \"Add frobnicator\": Frobs things",
            ]
        );
        assert_eq!(summary.notifications, 3);
        assert_eq!(summary.new_activities, 2);
        assert_eq!(summary.active_comments, 2);

        let mut second = Vec::new();
        let summary = run(&mut second, &config, INPUT).unwrap();
        assert!(second.is_empty());
        assert_eq!(summary.notifications, 0);

        let db = Database::open(&config.database_path).unwrap();
        let logbook = db.load_logbook().unwrap();
        let entry = logbook.find(7).unwrap();
        assert!(entry.is_yours);
        assert!(entry.have_commented);
        assert_eq!(entry.time_opened, Some(1_735_718_400_000));
        assert_eq!(db.last_pass().unwrap().unwrap().notifications, 0);
    }

    #[test]
    fn reconcile_applies_notification_preferences() {
        let temp = tempfile::tempdir().unwrap();
        let mut config = config(temp.path());
        config.notifications.comments = false;

        let mut output = Vec::new();
        run(&mut output, &config, INPUT).unwrap();
        let output = String::from_utf8(output).unwrap();

        assert_eq!(output.lines().count(), 1);
        assert!(output.contains("opened"));

        // Filtered comments are still recorded as handled.
        config.notifications.comments = true;
        let mut output = Vec::new();
        run(&mut output, &config, INPUT).unwrap();
        assert!(output.is_empty());
    }

    #[test]
    fn reconcile_rejects_mismatched_batches() {
        let temp = tempfile::tempdir().unwrap();
        let config = config(temp.path());
        let input = r#"{"pullRequests": [{"id": 1}, {"id": 2}], "activities": [[]]}"#;

        let mut output = Vec::new();
        let err = run(&mut output, &config, input).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ReconcileError>(),
            Some(ReconcileError::BatchCountMismatch {
                pull_requests: 2,
                batches: 1
            })
        ));
        assert!(output.is_empty());
        let db = Database::open(&config.database_path).unwrap();
        assert!(db.load_logbook().unwrap().is_empty());
        assert!(db.last_pass().unwrap().is_none());
    }

    #[test]
    fn reconcile_skips_activity_without_action() {
        let temp = tempfile::tempdir().unwrap();
        let input = r#"{
            "pullRequests": [{"id": 1, "title": "Add frobnicator"}],
            "activities": [[
                {"id": 2, "user": {"displayName": "Bob"}},
                {"id": 1, "user": {"displayName": "Bob"}, "action": "APPROVED"}
            ]]
        }"#;

        let mut output = Vec::new();
        let summary = run(&mut output, &config(temp.path()), input).unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "[] Bob approved \"Add frobnicator\"\n"
        );
    }

    #[test]
    fn reconcile_rejects_malformed_input() {
        let temp = tempfile::tempdir().unwrap();
        let mut output = Vec::new();
        assert!(run(&mut output, &config(temp.path()), "not json").is_err());
    }

    #[test]
    fn line_notifier_reports_write_errors() {
        struct Broken;

        impl Write for Broken {
            fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
                Err(io::Error::other("closed"))
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let mut notifier = LineNotifier::new(Broken);
        notifier.notify(Notification {
            kind: prn_core::NotificationKind::Approved,
            repository: "widgets".to_string(),
            actor: "Bob".to_string(),
            title: "Add frobnicator".to_string(),
            own_activity: false,
        });
        assert!(notifier.finish().is_err());
    }
}
