//! Storage layer for the pull request notifier.
//!
//! Persists the logbook and a history of reconciliation passes using
//! `rusqlite`.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! A `Database` instance can be moved between threads but cannot be shared
//! across threads without external synchronization. The CLI additionally holds
//! an exclusive file lock for the duration of a pass.
//!
//! # Schema
//!
//! Timestamps of pull request lifecycles are stored as INTEGER epoch
//! milliseconds, exactly as reported by the server. Pass completion times are
//! stored as TEXT in RFC 3339 format (e.g., `2024-01-15T10:30:00Z`).

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, params};
use thiserror::Error;

use prn_core::{Logbook, LogbookSink, PassSummary, PersistentPullRequest, PullRequestId};

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Failed to parse a stored pass timestamp.
    #[error("invalid timestamp for pass {pass_id}: {timestamp}")]
    TimestampParse {
        pass_id: i64,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// A completed reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassRecord {
    pub id: i64,
    pub completed_at: DateTime<Utc>,
    pub pull_requests: i64,
    pub new_activities: i64,
    pub notifications: i64,
    pub suppressed: i64,
    pub skipped: i64,
    pub active_comments: i64,
    pub active_tasks: i64,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            -- One row per logbook entry
            -- time_*: epoch milliseconds, NULL while unknown
            CREATE TABLE IF NOT EXISTS pull_requests (
                id INTEGER PRIMARY KEY,
                time_opened INTEGER,
                time_finished INTEGER,
                duration_open_to_finish INTEGER,
                is_yours INTEGER NOT NULL DEFAULT 0,
                have_commented INTEGER NOT NULL DEFAULT 0
            );

            -- Activity and comment IDs already notified
            CREATE TABLE IF NOT EXISTS notified_activities (
                pull_request_id INTEGER NOT NULL,
                activity_id INTEGER NOT NULL,
                PRIMARY KEY (pull_request_id, activity_id),
                FOREIGN KEY (pull_request_id) REFERENCES pull_requests(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_notified_activity ON notified_activities(activity_id);

            CREATE TABLE IF NOT EXISTS passes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                completed_at TEXT NOT NULL,
                pull_requests INTEGER NOT NULL DEFAULT 0,
                new_activities INTEGER NOT NULL DEFAULT 0,
                notifications INTEGER NOT NULL DEFAULT 0,
                suppressed INTEGER NOT NULL DEFAULT 0,
                skipped INTEGER NOT NULL DEFAULT 0,
                active_comments INTEGER NOT NULL DEFAULT 0,
                active_tasks INTEGER NOT NULL DEFAULT 0
            );
            ",
        )?;
        Ok(())
    }

    /// Loads every logbook entry with its notified IDs.
    pub fn load_logbook(&self) -> Result<Logbook, DbError> {
        let mut ids: HashMap<PullRequestId, Vec<i64>> = HashMap::new();
        {
            let mut stmt = self.conn.prepare(
                "
                SELECT pull_request_id, activity_id
                FROM notified_activities
                ORDER BY pull_request_id ASC, activity_id ASC
                ",
            )?;
            let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
            for row in rows {
                let (pr_id, activity_id): (i64, i64) = row?;
                ids.entry(pr_id).or_default().push(activity_id);
            }
        }

        let mut stmt = self.conn.prepare(
            "
            SELECT id, time_opened, time_finished, duration_open_to_finish,
                   is_yours, have_commented
            FROM pull_requests
            ORDER BY id ASC
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(PersistentPullRequest {
                id: row.get(0)?,
                notified_activity_ids: BTreeSet::new(),
                time_opened: row.get(1)?,
                time_finished: row.get(2)?,
                duration_open_to_finish: row.get(3)?,
                is_yours: row.get(4)?,
                have_commented: row.get(5)?,
            })
        })?;
        let mut entries = Vec::new();
        for row in rows {
            let mut entry = row?;
            if let Some(notified) = ids.remove(&entry.id) {
                entry.notified_activity_ids.extend(notified);
            }
            entries.push(entry);
        }
        Ok(Logbook::from_entries(entries))
    }

    /// Writes the logbook, returning how many notified IDs were new.
    ///
    /// Entries are upserted and IDs are only ever added, so saving the same
    /// logbook twice is a no-op.
    pub fn save_logbook(&mut self, logbook: &Logbook) -> Result<usize, DbError> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut entry_stmt = tx.prepare(
                "
                INSERT INTO pull_requests
                (id, time_opened, time_finished, duration_open_to_finish, is_yours, have_commented)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    time_opened = excluded.time_opened,
                    time_finished = excluded.time_finished,
                    duration_open_to_finish = excluded.duration_open_to_finish,
                    is_yours = excluded.is_yours,
                    have_commented = excluded.have_commented
                ",
            )?;
            let mut id_stmt = tx.prepare(
                "
                INSERT OR IGNORE INTO notified_activities (pull_request_id, activity_id)
                VALUES (?, ?)
                ",
            )?;
            for entry in logbook.entries() {
                entry_stmt.execute(params![
                    entry.id,
                    entry.time_opened,
                    entry.time_finished,
                    entry.duration_open_to_finish,
                    entry.is_yours,
                    entry.have_commented,
                ])?;
                for activity_id in &entry.notified_activity_ids {
                    inserted += id_stmt.execute(params![entry.id, activity_id])?;
                }
            }
        }
        tx.commit()?;
        tracing::debug!(
            entries = logbook.len(),
            new_ids = inserted,
            "saved logbook"
        );
        Ok(inserted)
    }

    /// Records a completed pass.
    pub fn record_pass(
        &mut self,
        summary: &PassSummary,
        completed_at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "
            INSERT INTO passes
            (completed_at, pull_requests, new_activities, notifications,
             suppressed, skipped, active_comments, active_tasks)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ",
            params![
                format_timestamp(completed_at),
                count(summary.pull_requests),
                count(summary.new_activities),
                count(summary.notifications),
                count(summary.suppressed),
                count(summary.skipped),
                count(summary.active_comments),
                count(summary.active_tasks),
            ],
        )?;
        Ok(())
    }

    /// Returns the most recently recorded pass.
    pub fn last_pass(&self) -> Result<Option<PassRecord>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, completed_at, pull_requests, new_activities, notifications,
                   suppressed, skipped, active_comments, active_tasks
            FROM passes
            ORDER BY id DESC
            LIMIT 1
            ",
        )?;
        let mut rows = stmt.query([])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let id: i64 = row.get(0)?;
        let timestamp: String = row.get(1)?;
        Ok(Some(PassRecord {
            id,
            completed_at: parse_timestamp(&timestamp, id)?,
            pull_requests: row.get(2)?,
            new_activities: row.get(3)?,
            notifications: row.get(4)?,
            suppressed: row.get(5)?,
            skipped: row.get(6)?,
            active_comments: row.get(7)?,
            active_tasks: row.get(8)?,
        }))
    }
}

impl LogbookSink for Database {
    type Error = DbError;

    fn save(&mut self, logbook: &Logbook) -> Result<(), Self::Error> {
        self.save_logbook(logbook).map(|_| ())
    }
}

fn count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn parse_timestamp(timestamp: &str, pass_id: i64) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            pass_id,
            timestamp: timestamp.to_string(),
            source,
        })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashSet;

    use chrono::TimeZone;
    use prn_core::LifecycleDelta;

    #[test]
    fn open_in_memory_database() {
        let db = Database::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn schema_matches_data_model() {
        let db = Database::open_in_memory().expect("open in-memory db");

        assert_eq!(
            table_columns(&db.conn, "pull_requests"),
            vec![
                "id",
                "time_opened",
                "time_finished",
                "duration_open_to_finish",
                "is_yours",
                "have_commented",
            ]
        );
        assert_eq!(
            table_columns(&db.conn, "notified_activities"),
            vec!["pull_request_id", "activity_id"]
        );

        let indexes = index_names(&db.conn, "notified_activities");
        assert!(indexes.contains("idx_notified_activity"));
    }

    fn table_columns(conn: &Connection, table: &str) -> Vec<String> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({table})"))
            .expect("prepare table_info");
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .expect("query table_info");
        rows.map(|row| row.expect("table_info row")).collect()
    }

    fn index_names(conn: &Connection, table: &str) -> HashSet<String> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA index_list({table})"))
            .expect("prepare index_list");
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .expect("query index_list");
        rows.map(|row| row.expect("index_list row")).collect()
    }

    fn sample_logbook() -> Logbook {
        let mut logbook = Logbook::new();
        logbook.upsert(1, [100, 101], &LifecycleDelta::opened(1_000, true));
        logbook.upsert(1, [102], &LifecycleDelta::finished(5_000));
        logbook.upsert(2, [200], &LifecycleDelta::commented(true));
        logbook
    }

    #[test]
    fn logbook_roundtrips_through_database() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        let logbook = sample_logbook();

        db.save_logbook(&logbook).unwrap();
        let loaded = db.load_logbook().unwrap();

        assert_eq!(loaded, logbook);
        let entry = loaded.find(1).unwrap();
        assert_eq!(entry.notified_activity_ids, BTreeSet::from([100, 101, 102]));
        assert_eq!(entry.duration_open_to_finish, Some(4_000));
        assert!(entry.is_yours);
        assert_eq!(loaded.find(2).unwrap().time_opened, None);
    }

    #[test]
    fn save_logbook_is_idempotent() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        let logbook = sample_logbook();

        assert_eq!(db.save_logbook(&logbook).unwrap(), 4);
        assert_eq!(db.save_logbook(&logbook).unwrap(), 0);

        let count: i64 = db
            .conn
            .query_row("SELECT COUNT(*) FROM notified_activities", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(count, 4);
    }

    #[test]
    fn save_updates_lifecycle_of_existing_entry() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        let mut logbook = Logbook::new();
        logbook.upsert(1, [100], &LifecycleDelta::opened(1_000, false));
        db.save_logbook(&logbook).unwrap();

        logbook.upsert(1, [101], &LifecycleDelta::finished(3_000));
        db.save_logbook(&logbook).unwrap();

        let loaded = db.load_logbook().unwrap();
        let entry = loaded.find(1).unwrap();
        assert_eq!(entry.time_finished, Some(3_000));
        assert_eq!(entry.duration_open_to_finish, Some(2_000));
    }

    #[test]
    fn database_is_a_logbook_sink() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        LogbookSink::save(&mut db, &sample_logbook()).unwrap();
        assert_eq!(db.load_logbook().unwrap().len(), 2);
    }

    #[test]
    fn last_pass_returns_most_recent() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        assert_eq!(db.last_pass().unwrap(), None);

        let first = PassSummary {
            pull_requests: 1,
            ..PassSummary::default()
        };
        let second = PassSummary {
            pull_requests: 2,
            new_activities: 3,
            notifications: 4,
            active_comments: 5,
            active_tasks: 1,
            ..PassSummary::default()
        };
        let t1 = Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2025, 1, 1, 9, 30, 0).unwrap();
        db.record_pass(&first, t1).unwrap();
        db.record_pass(&second, t2).unwrap();

        let last = db.last_pass().unwrap().unwrap();
        assert_eq!(last.completed_at, t2);
        assert_eq!(last.pull_requests, 2);
        assert_eq!(last.new_activities, 3);
        assert_eq!(last.notifications, 4);
        assert_eq!(last.active_comments, 5);
        assert_eq!(last.active_tasks, 1);
    }

    #[test]
    fn open_persists_to_disk() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("prn.db");
        {
            let mut db = Database::open(&path).unwrap();
            db.save_logbook(&sample_logbook()).unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert!(db.load_logbook().unwrap().contains(200));
    }
}
