use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{History, HistoryEntry, HistoryError};
use crate::episode::EpisodeRef;
use crate::quality::PackedStatus;
use crate::result::SearchResult;
use crate::store::StatusChange;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS failed (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        release TEXT NOT NULL,
        size INTEGER NOT NULL,
        provider TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS snatched (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp TEXT NOT NULL,
        release TEXT NOT NULL,
        size INTEGER NOT NULL,
        provider TEXT NOT NULL,
        show_id INTEGER NOT NULL,
        season INTEGER NOT NULL,
        episode INTEGER NOT NULL,
        old_status INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp TEXT NOT NULL,
        action INTEGER NOT NULL,
        release TEXT NOT NULL,
        provider TEXT NOT NULL,
        show_id INTEGER NOT NULL,
        season INTEGER NOT NULL,
        episode INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_failed_release ON failed(release);
    CREATE INDEX IF NOT EXISTS idx_snatched_episode ON snatched(show_id, season, episode);
    CREATE INDEX IF NOT EXISTS idx_history_timestamp ON history(timestamp);
"#;

/// Unknown sizes are stored as -1.
fn size_column(size: Option<u64>) -> i64 {
    size.map(|s| s as i64).unwrap_or(-1)
}

fn db_err(e: rusqlite::Error) -> HistoryError {
    HistoryError::Database(e.to_string())
}

/// SQLite-backed history.
pub struct SqliteHistory {
    conn: Mutex<Connection>,
}

impl SqliteHistory {
    /// Open (or create) the history database at `path`.
    pub fn new(path: &Path) -> Result<Self, HistoryError> {
        let conn = Connection::open(path).map_err(db_err)?;
        Self::init(conn)
    }

    /// In-memory history (useful for testing)
    pub fn in_memory() -> Result<Self, HistoryError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, HistoryError> {
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, HistoryError> {
        self.conn
            .lock()
            .map_err(|e| HistoryError::Database(format!("connection lock poisoned: {}", e)))
    }
}

impl History for SqliteHistory {
    fn has_failed(&self, release: &str, size: Option<u64>, provider: &str) -> Result<bool, HistoryError> {
        let conn = self.conn()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM failed WHERE release = ?1 AND provider = ?2 \
                 AND (?3 < 0 OR size < 0 OR size = ?3)",
                params![release, provider, size_column(size)],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        Ok(count > 0)
    }

    fn mark_failed(&self, release: &str, size: Option<u64>, provider: &str) -> Result<(), HistoryError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO failed (release, size, provider) VALUES (?1, ?2, ?3)",
            params![release, size_column(size), provider],
        )
        .map_err(db_err)?;
        Ok(())
    }

    fn add_snatched(
        &self,
        result: &SearchResult,
        changes: &[(EpisodeRef, StatusChange)],
    ) -> Result<(), HistoryError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(db_err)?;
        let now = Utc::now().to_rfc3339();
        for (episode, change) in changes {
            tx.execute(
                "INSERT INTO snatched (timestamp, release, size, provider, show_id, season, episode, old_status) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    now,
                    result.name,
                    size_column(result.size),
                    result.provider_id(),
                    episode.show_id as i64,
                    episode.season,
                    episode.episode,
                    change.old.raw(),
                ],
            )
            .map_err(db_err)?;
        }
        tx.commit().map_err(db_err)
    }

    fn find_old_status(&self, episode: &EpisodeRef) -> Result<Option<PackedStatus>, HistoryError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT old_status FROM snatched WHERE show_id = ?1 AND season = ?2 AND episode = ?3 \
             ORDER BY id DESC LIMIT 1",
            params![episode.show_id as i64, episode.season, episode.episode],
            |row| row.get::<_, i32>(0),
        )
        .optional()
        .map(|raw| raw.map(PackedStatus::from_raw))
        .map_err(db_err)
    }

    fn log_snatch(
        &self,
        result: &SearchResult,
        changes: &[(EpisodeRef, StatusChange)],
    ) -> Result<(), HistoryError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(db_err)?;
        let now = Utc::now().to_rfc3339();
        for (episode, change) in changes {
            tx.execute(
                "INSERT INTO history (timestamp, action, release, provider, show_id, season, episode) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    now,
                    change.new.raw(),
                    result.name,
                    result.provider_id(),
                    episode.show_id as i64,
                    episode.season,
                    episode.episode,
                ],
            )
            .map_err(db_err)?;
        }
        tx.commit().map_err(db_err)
    }

    fn recent(&self, limit: usize) -> Result<Vec<HistoryEntry>, HistoryError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT timestamp, action, release, provider, show_id, season, episode \
                 FROM history ORDER BY id DESC LIMIT ?1",
            )
            .map_err(db_err)?;

        let rows = stmt
            .query_map(params![limit as i64], |row| {
                let timestamp: String = row.get(0)?;
                let action = PackedStatus::from_raw(row.get(1)?);
                Ok(HistoryEntry {
                    timestamp: DateTime::parse_from_rfc3339(&timestamp)
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                    episode: EpisodeRef::new(row.get::<_, i64>(4)? as u64, row.get(5)?, row.get(6)?),
                    quality: action.quality(),
                    action,
                    release: row.get(2)?,
                    provider: row.get(3)?,
                })
            })
            .map_err(db_err)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(db_err)
    }
}
