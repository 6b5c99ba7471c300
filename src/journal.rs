use chrono::{DateTime, Utc};
use csv::WriterBuilder;
use directories::ProjectDirs;
use rusqlite::{params, Connection};
use serde::Serialize;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use crate::error::GameError;
use crate::events::{EventKind, GameOverCause, LogEvent};
use crate::logger::EventSink;
use crate::session::SessionState;

/// Durable journal behind the logger's side channel. One row per event,
/// with the frozen state and payload stored as JSON text.
#[derive(Debug)]
pub struct SqliteJournal {
    conn: Connection,
}

impl SqliteJournal {
    /// Open (or create) the journal at its default location.
    pub fn new() -> Result<Self, GameError> {
        let path = Self::default_path().unwrap_or_else(|| PathBuf::from("mathdrop_journal.db"));
        Self::with_path(path)
    }

    pub fn with_path<P: AsRef<Path>>(path: P) -> Result<Self, GameError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                elapsed_ms INTEGER NOT NULL,
                state TEXT NOT NULL,
                payload TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_events_session ON events(session_id)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_events_kind ON events(kind)",
            [],
        )?;

        Ok(Self { conn })
    }

    /// Journal file under `$HOME/.local/state/mathdrop`, falling back to
    /// the platform data directory.
    pub fn default_path() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            Some(
                PathBuf::from(home)
                    .join(".local")
                    .join("state")
                    .join("mathdrop")
                    .join("journal.db"),
            )
        } else {
            ProjectDirs::from("", "", "mathdrop")
                .map(|pd| pd.data_local_dir().join("journal.db"))
        }
    }

    pub fn session_event_count(&self, session_id: &str) -> Result<usize, GameError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM events WHERE session_id = ?1",
            [session_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Distinct sessions in insert order.
    pub fn session_ids(&self) -> Result<Vec<String>, GameError> {
        let mut stmt = self
            .conn
            .prepare("SELECT session_id FROM events GROUP BY session_id ORDER BY MIN(id)")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        let mut ids = Vec::new();
        for id in rows {
            ids.push(id?);
        }
        Ok(ids)
    }

    /// Per-kind event counts for one session, alphabetical by kind tag.
    pub fn kind_counts(&self, session_id: &str) -> Result<Vec<(String, usize)>, GameError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT kind, COUNT(*)
            FROM events
            WHERE session_id = ?1
            GROUP BY kind
            ORDER BY kind
            "#,
        )?;
        let rows = stmt.query_map([session_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
        })?;
        let mut counts = Vec::new();
        for row in rows {
            counts.push(row?);
        }
        Ok(counts)
    }

    /// Rehydrate one session's events, oldest first.
    pub fn session_events(&self, session_id: &str) -> Result<Vec<LogEvent>, GameError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT kind, timestamp, elapsed_ms, session_id, state, payload
            FROM events
            WHERE session_id = ?1
            ORDER BY id
            "#,
        )?;
        let rows = stmt.query_map([session_id], |row| {
            let kind_tag: String = row.get(0)?;
            let kind: EventKind = serde_json::from_value(serde_json::Value::String(kind_tag))
                .map_err(|_| {
                    rusqlite::Error::InvalidColumnType(
                        0,
                        "kind".to_string(),
                        rusqlite::types::Type::Text,
                    )
                })?;
            let timestamp_str: String = row.get(1)?;
            let timestamp = DateTime::parse_from_rfc3339(&timestamp_str)
                .map_err(|_| {
                    rusqlite::Error::InvalidColumnType(
                        1,
                        "timestamp".to_string(),
                        rusqlite::types::Type::Text,
                    )
                })?
                .with_timezone(&Utc);
            let state_json: String = row.get(4)?;
            let state = serde_json::from_str(&state_json).map_err(|_| {
                rusqlite::Error::InvalidColumnType(
                    4,
                    "state".to_string(),
                    rusqlite::types::Type::Text,
                )
            })?;
            let payload_json: String = row.get(5)?;
            let payload = serde_json::from_str(&payload_json).map_err(|_| {
                rusqlite::Error::InvalidColumnType(
                    5,
                    "payload".to_string(),
                    rusqlite::types::Type::Text,
                )
            })?;
            Ok(LogEvent {
                kind,
                timestamp,
                elapsed_ms: row.get(2)?,
                session_id: row.get(3)?,
                state,
                payload,
            })
        })?;

        let mut events = Vec::new();
        for event in rows {
            events.push(event?);
        }
        Ok(events)
    }
}

impl EventSink for SqliteJournal {
    /// Batch insert in one transaction, matching the logger's flush
    /// granularity.
    fn append(&mut self, events: &[LogEvent]) -> Result<(), GameError> {
        let tx = self.conn.transaction()?;
        for event in events {
            tx.execute(
                r#"
                INSERT INTO events (session_id, kind, timestamp, elapsed_ms, state, payload)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    event.session_id,
                    event.kind.to_string(),
                    event.timestamp.to_rfc3339(),
                    event.elapsed_ms,
                    serde_json::to_string(&event.state).unwrap_or_default(),
                    serde_json::to_string(&event.payload).unwrap_or_default(),
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

/// One-row rollup of a finished session for the cumulative results file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub date: String,
    pub session_id: String,
    pub cause: GameOverCause,
    pub questions_shown: u32,
    pub questions_answered: u32,
    pub correct_count: u32,
    pub incorrect_count: u32,
    pub longest_streak: u32,
    pub hints_used: u32,
    pub elapsed_secs: u64,
}

impl SessionSummary {
    pub fn from_session(session_id: &str, cause: GameOverCause, session: &SessionState) -> Self {
        Self {
            date: Utc::now().to_rfc3339(),
            session_id: session_id.to_string(),
            cause,
            questions_shown: session.questions_shown,
            questions_answered: session.questions_answered,
            correct_count: session.correct_count,
            incorrect_count: session.incorrect_count,
            longest_streak: session.longest_streak,
            hints_used: session.hint_uses + session.power_tool_uses,
            elapsed_secs: session.elapsed_ms / 1000,
        }
    }
}

/// Default results file next to the config.
pub fn summary_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "mathdrop").map(|pd| pd.config_dir().join("summaries.csv"))
}

/// Append one summary row, emitting the header only when the file is new.
pub fn append_summary<P: AsRef<Path>>(path: P, summary: &SessionSummary) -> Result<(), GameError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let needs_header = !path.exists();
    let file = OpenOptions::new().append(true).create(true).open(path)?;
    let mut writer = WriterBuilder::new().has_headers(needs_header).from_writer(file);
    writer.serialize(summary)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use serde_json::json;
    use tempfile::tempdir;

    fn event(kind: EventKind, session_id: &str, elapsed_ms: u64) -> LogEvent {
        LogEvent {
            kind,
            timestamp: Utc::now(),
            elapsed_ms,
            session_id: session_id.to_string(),
            state: SessionState::new(&GameConfig::default()).snapshot(),
            payload: json!({ "elapsed": elapsed_ms }),
        }
    }

    #[test]
    fn test_append_then_rehydrate_round_trips() {
        let dir = tempdir().unwrap();
        let mut journal = SqliteJournal::with_path(dir.path().join("journal.db")).unwrap();
        let events = vec![
            event(EventKind::SessionStarted, "s1", 0),
            event(EventKind::QuestionShown, "s1", 100),
            event(EventKind::ResponseSubmitted, "s1", 2500),
        ];
        journal.append(&events).unwrap();
        let stored = journal.session_events("s1").unwrap();
        assert_eq!(stored, events);
    }

    #[test]
    fn test_counts_and_kind_breakdown() {
        let dir = tempdir().unwrap();
        let mut journal = SqliteJournal::with_path(dir.path().join("journal.db")).unwrap();
        journal
            .append(&[
                event(EventKind::KeyDown, "s1", 0),
                event(EventKind::KeyDown, "s1", 50),
                event(EventKind::KeyUp, "s1", 90),
            ])
            .unwrap();
        assert_eq!(journal.session_event_count("s1").unwrap(), 3);
        assert_eq!(journal.session_event_count("absent").unwrap(), 0);
        assert_eq!(
            journal.kind_counts("s1").unwrap(),
            vec![("key_down".to_string(), 2), ("key_up".to_string(), 1)]
        );
    }

    #[test]
    fn test_sessions_are_isolated() {
        let dir = tempdir().unwrap();
        let mut journal = SqliteJournal::with_path(dir.path().join("journal.db")).unwrap();
        journal
            .append(&[event(EventKind::SessionStarted, "s1", 0)])
            .unwrap();
        journal
            .append(&[
                event(EventKind::SessionStarted, "s2", 0),
                event(EventKind::SessionEnded, "s2", 60_000),
            ])
            .unwrap();
        assert_eq!(
            journal.session_ids().unwrap(),
            vec!["s1".to_string(), "s2".to_string()]
        );
        assert_eq!(journal.session_events("s1").unwrap().len(), 1);
        assert_eq!(journal.session_events("s2").unwrap().len(), 2);
    }

    #[test]
    fn test_reopening_keeps_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("journal.db");
        {
            let mut journal = SqliteJournal::with_path(&path).unwrap();
            journal
                .append(&[event(EventKind::LifeLost, "s1", 500)])
                .unwrap();
        }
        let journal = SqliteJournal::with_path(&path).unwrap();
        assert_eq!(journal.session_event_count("s1").unwrap(), 1);
    }

    fn summary(session_id: &str) -> SessionSummary {
        let mut session = SessionState::new(&GameConfig::default());
        session.questions_shown = 5;
        session.questions_answered = 4;
        session.correct_count = 3;
        session.incorrect_count = 1;
        session.longest_streak = 2;
        session.hint_uses = 1;
        session.elapsed_ms = 83_000;
        SessionSummary::from_session(session_id, GameOverCause::TimeUp, &session)
    }

    #[test]
    fn test_summary_derives_from_session_counters() {
        let s = summary("abc");
        assert_eq!(s.session_id, "abc");
        assert_eq!(s.cause, GameOverCause::TimeUp);
        assert_eq!(s.questions_shown, 5);
        assert_eq!(s.correct_count, 3);
        assert_eq!(s.hints_used, 1);
        assert_eq!(s.elapsed_secs, 83);
    }

    #[test]
    fn test_summary_csv_appends_with_single_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("summaries.csv");
        append_summary(&path, &summary("s1")).unwrap();
        append_summary(&path, &summary("s2")).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("date,session_id,cause"));
        assert!(lines[1].contains("s1"));
        assert!(lines[2].contains("s2"));
        assert!(lines[2].contains("time_up"));
    }
}
