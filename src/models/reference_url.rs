//! Reference URL model
//!
//! External pages whose extracted text grounds batch suggestions.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbResult;
use super::{from_db_time, to_db_time};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceUrl {
    pub id: i64,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default)]
    pub last_indexed: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Text of an indexed page, as handed to the suggestion prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedContent {
    pub url: String,
    pub content: String,
}

impl ReferenceUrl {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let last_indexed: Option<String> = row.get(3)?;
        let created_at: String = row.get(4)?;
        Ok(Self {
            id: row.get(0)?,
            url: row.get(1)?,
            content: row.get(2)?,
            last_indexed: last_indexed.map(|t| from_db_time(3, &t)).transpose()?,
            created_at: from_db_time(4, &created_at)?,
        })
    }

    /// Insert a url; `None` if it is already stored
    pub fn create(conn: &Connection, url: &str, now: DateTime<Utc>) -> DbResult<Option<Self>> {
        let rows = conn.execute(
            "INSERT OR IGNORE INTO reference_urls (url, created_at) VALUES (?1, ?2)",
            params![url, to_db_time(&now)],
        )?;
        if rows == 0 {
            return Ok(None);
        }
        Self::get_by_id(conn, conn.last_insert_rowid())
    }

    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let result = conn.query_row(
            "SELECT id, url, content, last_indexed, created_at FROM reference_urls WHERE id = ?1",
            [id],
            Self::from_row,
        );
        match result {
            Ok(url) => Ok(Some(url)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List every url, newest first
    pub fn list(conn: &Connection) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, url, content, last_indexed, created_at FROM reference_urls
             ORDER BY created_at DESC, id DESC",
        )?;
        let urls = stmt
            .query_map([], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(urls)
    }

    /// Store extracted text and stamp the indexing time
    pub fn set_content(
        conn: &Connection,
        id: i64,
        content: &str,
        indexed_at: DateTime<Utc>,
    ) -> DbResult<Option<Self>> {
        let rows = conn.execute(
            "UPDATE reference_urls SET content = ?1, last_indexed = ?2 WHERE id = ?3",
            params![content, to_db_time(&indexed_at), id],
        )?;
        if rows == 0 {
            return Ok(None);
        }
        Self::get_by_id(conn, id)
    }

    pub fn delete(conn: &Connection, id: i64) -> DbResult<bool> {
        let rows = conn.execute("DELETE FROM reference_urls WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }

    /// Urls that have been indexed, oldest first
    pub fn find_indexed(conn: &Connection) -> DbResult<Vec<IndexedContent>> {
        let mut stmt = conn.prepare(
            "SELECT url, content FROM reference_urls
             WHERE content IS NOT NULL AND content != ''
             ORDER BY created_at ASC, id ASC",
        )?;
        let indexed = stmt
            .query_map([], |row| {
                Ok(IndexedContent {
                    url: row.get(0)?,
                    content: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(indexed)
    }

    pub fn count(conn: &Connection) -> DbResult<i64> {
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM reference_urls", [], |row| row.get(0))?;
        Ok(count)
    }
}
