//! Note model
//!
//! Free-text tasting notes. A note never changes once written.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbResult;
use super::{from_db_time, to_db_time};

/// Prefix of notes written by the suggestion service
pub const AI_NOTE_MARKER: &str = "🤖 AI Suggestion:";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Note {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    /// A note carrying the rationale of an AI-suggested batch
    pub fn ai_suggestion(explanation: &str) -> Self {
        Self::new(format!("{} {}", AI_NOTE_MARKER, explanation))
    }

    pub fn is_ai_suggestion(&self) -> bool {
        self.content.starts_with(AI_NOTE_MARKER)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let created_at: String = row.get(1)?;
        Ok(Self {
            content: row.get(0)?,
            created_at: from_db_time(1, &created_at)?,
        })
    }

    /// Load the notes of a batch in the order they were written
    pub fn list_for_batch(conn: &Connection, batch_id: i64) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT content, created_at FROM batch_notes WHERE batch_id = ?1 ORDER BY position",
        )?;
        let notes = stmt
            .query_map([batch_id], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(notes)
    }

    /// Replace every note of a batch
    pub fn replace_for_batch(conn: &Connection, batch_id: i64, notes: &[Self]) -> DbResult<()> {
        conn.execute("DELETE FROM batch_notes WHERE batch_id = ?1", [batch_id])?;

        let mut stmt = conn.prepare(
            "INSERT INTO batch_notes (batch_id, position, content, created_at) VALUES (?1, ?2, ?3, ?4)",
        )?;
        for (position, note) in notes.iter().enumerate() {
            stmt.execute(params![
                batch_id,
                position as i64,
                note.content,
                to_db_time(&note.created_at),
            ])?;
        }
        Ok(())
    }
}

/// A note as a client sent it; `createdAt` is echoed back for existing notes
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteInput {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl NoteInput {
    /// Keep the original timestamp when present, stamp new notes with `now`
    pub fn into_note(self, now: DateTime<Utc>) -> Note {
        Note {
            content: self.content.unwrap_or_default(),
            created_at: self.created_at.unwrap_or(now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_ai_suggestion_note() {
        let note = Note::ai_suggestion("reduced ice ratio");
        assert!(note.is_ai_suggestion());
        assert!(note.content.contains("reduced ice ratio"));
        assert!(!Note::new("too icy").is_ai_suggestion());
    }

    #[test]
    fn test_input_keeps_existing_timestamp() {
        let now = Utc.with_ymd_and_hms(2024, 5, 5, 0, 0, 0).unwrap();
        let old: NoteInput = serde_json::from_value(json!({
            "content": "too icy",
            "createdAt": "2024-01-01T08:00:00Z"
        }))
        .unwrap();
        let fresh: NoteInput = serde_json::from_value(json!({"content": "smoother"})).unwrap();

        assert_eq!(
            old.into_note(now).created_at,
            Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap()
        );
        assert_eq!(fresh.into_note(now).created_at, now);
    }
}
