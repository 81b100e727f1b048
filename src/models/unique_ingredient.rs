//! Unique ingredient model
//!
//! Remembers every ingredient name used per kind, for name suggestions.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use serde::Serialize;

use crate::db::DbResult;
use super::ingredient::{IngredientKind, IngredientSet};
use super::{from_db_time, to_db_time};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UniqueIngredient {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: IngredientKind,
    pub last_used: DateTime<Utc>,
    pub use_count: i64,
}

impl UniqueIngredient {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let kind: String = row.get(1)?;
        let last_used: String = row.get(2)?;
        Ok(Self {
            name: row.get(0)?,
            kind: IngredientKind::from_str(&kind).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    1,
                    rusqlite::types::Type::Text,
                    format!("unknown ingredient kind '{}'", kind).into(),
                )
            })?,
            last_used: from_db_time(2, &last_used)?,
            use_count: row.get(3)?,
        })
    }

    /// Count one use of a name for a kind
    pub fn record_use(conn: &Connection, name: &str, kind: IngredientKind, now: DateTime<Utc>) -> DbResult<()> {
        conn.execute(
            r#"
            INSERT INTO unique_ingredients (name, kind, last_used, use_count)
            VALUES (?1, ?2, ?3, 1)
            ON CONFLICT(name, kind) DO UPDATE SET
                use_count = use_count + 1,
                last_used = excluded.last_used
            "#,
            params![name, kind.as_str(), to_db_time(&now)],
        )?;
        Ok(())
    }

    /// Count one use of every ingredient in the set
    pub fn record_set(conn: &Connection, set: &IngredientSet, now: DateTime<Utc>) -> DbResult<()> {
        for (kind, ing) in set.iter() {
            Self::record_use(conn, &ing.name, kind, now)?;
        }
        Ok(())
    }

    /// Names for a kind, most used first, optionally filtered by substring
    pub fn search(
        conn: &Connection,
        kind: IngredientKind,
        query: Option<&str>,
        limit: i64,
    ) -> DbResult<Vec<Self>> {
        let pattern = match query.map(str::trim) {
            Some(q) if !q.is_empty() => format!("%{}%", escape_like(q)),
            _ => "%".to_string(),
        };

        let mut stmt = conn.prepare(
            r#"
            SELECT name, kind, last_used, use_count FROM unique_ingredients
            WHERE kind = ?1 AND name LIKE ?2 ESCAPE '\'
            ORDER BY use_count DESC, last_used DESC
            LIMIT ?3
            "#,
        )?;
        let items = stmt
            .query_map(params![kind.as_str(), pattern, limit], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
