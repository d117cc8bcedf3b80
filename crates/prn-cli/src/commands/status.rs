//! Status command for showing the logbook and the last pass.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::DateTime;

use prn_core::PersistentPullRequest;
use prn_db::{Database, PassRecord};

use crate::Config;

pub fn run<W: Write>(writer: &mut W, config: &Config) -> Result<()> {
    let db = Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    let logbook = db.load_logbook()?;
    let last_pass = db.last_pass()?;

    writeln!(writer, "Pull request notifier status")?;
    writeln!(writer, "Database: {}", config.database_path.display())?;

    if logbook.is_empty() {
        writeln!(writer, "No pull requests recorded.")?;
    } else {
        writeln!(writer, "Pull requests:")?;
        for entry in logbook.entries() {
            writeln!(writer, "- #{}: {}", entry.id, describe(entry))?;
        }
    }

    match last_pass {
        Some(pass) => write_pass(writer, &pass)?,
        None => writeln!(writer, "No passes recorded.")?,
    }

    Ok(())
}

fn describe(entry: &PersistentPullRequest) -> String {
    let mut parts = vec![format!("opened {}", format_millis(entry.time_opened))];
    match entry.time_finished {
        Some(finished) => parts.push(format!("finished {}", format_millis(Some(finished)))),
        None => parts.push("still open".to_string()),
    }
    if let Some(duration) = entry.duration_open_to_finish {
        parts.push(format!("took {}", format_duration(duration)));
    }
    if entry.is_yours {
        parts.push("yours".to_string());
    }
    if entry.have_commented {
        parts.push("commented".to_string());
    }
    parts.push(format!("{} notified", entry.notified_activity_ids.len()));
    parts.join(", ")
}

fn write_pass<W: Write>(writer: &mut W, pass: &PassRecord) -> Result<()> {
    writeln!(
        writer,
        "Last pass: {}",
        pass.completed_at.format("%Y-%m-%dT%H:%M:%SZ")
    )?;
    writeln!(
        writer,
        "  {} pull requests, {} new activities, {} notifications ({} suppressed, {} skipped)",
        pass.pull_requests, pass.new_activities, pass.notifications, pass.suppressed, pass.skipped
    )?;
    writeln!(
        writer,
        "  {} active comments, {} active tasks",
        pass.active_comments, pass.active_tasks
    )?;
    Ok(())
}

/// Formats epoch milliseconds as a UTC minute.
fn format_millis(millis: Option<i64>) -> String {
    millis
        .and_then(DateTime::from_timestamp_millis)
        .map_or_else(
            || "unknown".to_string(),
            |dt| dt.format("%Y-%m-%d %H:%M UTC").to_string(),
        )
}

fn format_duration(millis: i64) -> String {
    let minutes = millis / 60_000;
    let (hours, minutes) = (minutes / 60, minutes % 60);
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{TimeZone, Utc};
    use prn_core::{LifecycleDelta, Logbook, NotificationPreferences, PassSummary};

    use insta::assert_snapshot;

    fn config(database_path: std::path::PathBuf) -> Config {
        Config {
            database_path,
            username: None,
            notifications: NotificationPreferences::default(),
        }
    }

    #[test]
    fn status_command_outputs_entries_and_last_pass() {
        let temp = tempfile::tempdir().unwrap();
        let db_path = temp.path().join("prn.db");
        let mut db = Database::open(&db_path).unwrap();

        // 2025-01-01 08:00 UTC, merged two and a half hours later
        let mut logbook = Logbook::new();
        logbook.upsert(
            1,
            [100, 101],
            &LifecycleDelta::opened(1_735_718_400_000, true),
        );
        logbook.upsert(1, [102], &LifecycleDelta::finished(1_735_727_400_000));
        logbook.upsert(2, [200], &LifecycleDelta::commented(true));
        db.save_logbook(&logbook).unwrap();

        let summary = PassSummary {
            pull_requests: 2,
            new_activities: 3,
            notifications: 4,
            suppressed: 1,
            skipped: 0,
            active_comments: 5,
            active_tasks: 1,
        };
        db.record_pass(&summary, Utc.with_ymd_and_hms(2025, 1, 2, 9, 0, 0).unwrap())
            .unwrap();

        let mut output = Vec::new();
        run(&mut output, &config(db_path.clone())).unwrap();

        let output = String::from_utf8(output).unwrap();
        let output = output.replace(&db_path.display().to_string(), "[TEMP]/prn.db");
        assert_snapshot!(output);
    }

    #[test]
    fn status_command_on_empty_database() {
        let temp = tempfile::tempdir().unwrap();
        let db_path = temp.path().join("prn.db");

        let mut output = Vec::new();
        run(&mut output, &config(db_path)).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("No pull requests recorded."));
        assert!(output.contains("No passes recorded."));
    }

    #[test]
    fn durations_are_rendered_in_hours_and_minutes() {
        assert_eq!(format_duration(9_000_000), "2h 30m");
        assert_eq!(format_duration(59_999), "0m");
        assert_eq!(format_duration(300_000), "5m");
        assert_eq!(format_millis(None), "unknown");
    }
}
