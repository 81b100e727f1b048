//! Batch model
//!
//! The aggregate root: one ice cream attempt with its ingredient lists,
//! notes and grading. Ingredients and notes are owned by the batch and are
//! replaced wholesale on every edit.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbResult;
use super::ingredient::{Ingredient, IngredientSet, IngredientSetInput};
use super::note::{Note, NoteInput};
use super::{from_db_time, to_db_time};

/// Name given to batches saved without one
pub const DEFAULT_BATCH_NAME: &str = "Untitled Batch";

const BATCH_COLUMNS: &str = "id, name, created_at, final_served_weight, number_of_servings, rating, \
     reference_urls, is_ai_generated, parent_batch_id, \
     grade_flavor, grade_texture, grade_overall, grade_notes";

/// Subjective 0-10 scoring of a batch
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Grade {
    #[serde(default)]
    pub flavor: f64,
    #[serde(default)]
    pub texture: f64,
    #[serde(default)]
    pub overall: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Grade {
    pub const MIN_SCORE: f64 = 0.0;
    pub const MAX_SCORE: f64 = 10.0;

    /// Check every score lies in [0, 10]
    pub fn validate(&self) -> Result<(), String> {
        for (label, score) in [
            ("flavor", self.flavor),
            ("texture", self.texture),
            ("overall", self.overall),
        ] {
            if !score.is_finite() || !(Self::MIN_SCORE..=Self::MAX_SCORE).contains(&score) {
                return Err(format!(
                    "grade.{} must be between {} and {}, got {}",
                    label,
                    Self::MIN_SCORE,
                    Self::MAX_SCORE,
                    score
                ));
            }
        }
        Ok(())
    }
}

/// A stored batch with its owned collections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub ingredients: IngredientSet,
    pub notes: Vec<Note>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<Grade>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub final_served_weight: Option<f64>,
    #[serde(default)]
    pub number_of_servings: Option<f64>,
    #[serde(default)]
    pub reference_urls: Vec<String>,
    pub is_ai_generated: bool,
    /// Weak link to the batch this one was derived from; may dangle
    #[serde(default)]
    pub parent_batch_id: Option<i64>,
}

/// Data for inserting a new batch
#[derive(Debug, Clone, PartialEq)]
pub struct BatchCreate {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub ingredients: IngredientSet,
    pub notes: Vec<Note>,
    pub grade: Option<Grade>,
    pub rating: Option<f64>,
    pub final_served_weight: Option<f64>,
    pub number_of_servings: Option<f64>,
    pub reference_urls: Vec<String>,
    pub is_ai_generated: bool,
    pub parent_batch_id: Option<i64>,
}

impl From<&Batch> for BatchCreate {
    /// Copy every field of a stored batch except its identity
    fn from(batch: &Batch) -> Self {
        Self {
            name: batch.name.clone(),
            created_at: batch.created_at,
            ingredients: batch.ingredients.clone(),
            notes: batch.notes.clone(),
            grade: batch.grade.clone(),
            rating: batch.rating,
            final_served_weight: batch.final_served_weight,
            number_of_servings: batch.number_of_servings,
            reference_urls: batch.reference_urls.clone(),
            is_ai_generated: batch.is_ai_generated,
            parent_batch_id: batch.parent_batch_id,
        }
    }
}

/// Data for a full replace of an existing batch
///
/// Creation time and provenance (`isAiGenerated`, `parentBatchId`) are
/// not replaceable.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchUpdate {
    pub name: String,
    pub ingredients: IngredientSet,
    pub notes: Vec<Note>,
    pub grade: Option<Grade>,
    pub rating: Option<f64>,
    pub final_served_weight: Option<f64>,
    pub number_of_servings: Option<f64>,
    pub reference_urls: Vec<String>,
}

/// A batch document as a client sent it, for create and replace
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub ingredients: IngredientSetInput,
    #[serde(default)]
    pub notes: Option<Vec<NoteInput>>,
    #[serde(default)]
    pub grade: Option<Grade>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub final_served_weight: Option<f64>,
    #[serde(default)]
    pub number_of_servings: Option<f64>,
    #[serde(default)]
    pub reference_urls: Option<Vec<String>>,
}

/// Neighbours of a batch in creation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Adjacent {
    pub previous_id: Option<i64>,
    pub next_id: Option<i64>,
}

/// Normalise a client-supplied name, falling back to the default
pub fn batch_name_or_default(name: Option<&str>) -> String {
    match name.map(str::trim) {
        Some(n) if !n.is_empty() => n.to_string(),
        _ => DEFAULT_BATCH_NAME.to_string(),
    }
}

impl Batch {
    /// Create a Batch from a row selected with `BATCH_COLUMNS`; collections are empty
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let created_at: String = row.get(2)?;
        let reference_urls: String = row.get(6)?;
        let reference_urls: Vec<String> = serde_json::from_str(&reference_urls)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?;

        let flavor: Option<f64> = row.get(9)?;
        let texture: Option<f64> = row.get(10)?;
        let overall: Option<f64> = row.get(11)?;
        let grade_notes: Option<String> = row.get(12)?;
        let grade = if flavor.is_none() && texture.is_none() && overall.is_none() && grade_notes.is_none() {
            None
        } else {
            Some(Grade {
                flavor: flavor.unwrap_or(0.0),
                texture: texture.unwrap_or(0.0),
                overall: overall.unwrap_or(0.0),
                notes: grade_notes,
            })
        };

        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            created_at: from_db_time(2, &created_at)?,
            ingredients: IngredientSet::default(),
            notes: Vec::new(),
            grade,
            rating: row.get(5)?,
            final_served_weight: row.get(3)?,
            number_of_servings: row.get(4)?,
            reference_urls,
            is_ai_generated: row.get::<_, i32>(7)? != 0,
            parent_batch_id: row.get(8)?,
        })
    }

    fn with_children(mut self, conn: &Connection) -> DbResult<Self> {
        self.ingredients = Ingredient::list_for_batch(conn, self.id)?;
        self.notes = Note::list_for_batch(conn, self.id)?;
        Ok(self)
    }

    fn query_many(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(|b| b.with_children(conn)).collect()
    }

    /// Insert a new batch with its ingredients and notes
    ///
    /// Run inside a transaction so that a failure leaves nothing behind.
    pub fn create(conn: &Connection, data: &BatchCreate) -> DbResult<Self> {
        let reference_urls = serde_json::to_string(&data.reference_urls)?;
        let grade = data.grade.as_ref();

        conn.execute(
            r#"
            INSERT INTO batches (
                name, created_at, final_served_weight, number_of_servings, rating,
                reference_urls, is_ai_generated, parent_batch_id,
                grade_flavor, grade_texture, grade_overall, grade_notes
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                data.name,
                to_db_time(&data.created_at),
                data.final_served_weight,
                data.number_of_servings,
                data.rating,
                reference_urls,
                data.is_ai_generated as i32,
                data.parent_batch_id,
                grade.map(|g| g.flavor),
                grade.map(|g| g.texture),
                grade.map(|g| g.overall),
                grade.and_then(|g| g.notes.clone()),
            ],
        )?;

        let id = conn.last_insert_rowid();
        Ingredient::replace_for_batch(conn, id, &data.ingredients)?;
        Note::replace_for_batch(conn, id, &data.notes)?;

        Self::get_by_id(conn, id)?.ok_or_else(|| {
            crate::db::DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows)
        })
    }

    /// Get a batch by ID
    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let sql = format!("SELECT {} FROM batches WHERE id = ?1", BATCH_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;

        let result = stmt.query_row([id], Self::from_row);
        match result {
            Ok(batch) => Ok(Some(batch.with_children(conn)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List every batch, newest first
    pub fn list(conn: &Connection) -> DbResult<Vec<Self>> {
        let sql = format!(
            "SELECT {} FROM batches ORDER BY created_at DESC, id DESC",
            BATCH_COLUMNS
        );
        Self::query_many(conn, &sql, [])
    }

    /// List the batches derived from the given one, oldest first
    pub fn list_children(conn: &Connection, parent_id: i64) -> DbResult<Vec<Self>> {
        let sql = format!(
            "SELECT {} FROM batches WHERE parent_batch_id = ?1 ORDER BY created_at ASC, id ASC",
            BATCH_COLUMNS
        );
        Self::query_many(conn, &sql, [parent_id])
    }

    /// Replace a batch document; `None` if the batch does not exist
    ///
    /// Run inside a transaction so the row and its collections change together.
    pub fn replace(conn: &Connection, id: i64, data: &BatchUpdate) -> DbResult<Option<Self>> {
        let reference_urls = serde_json::to_string(&data.reference_urls)?;
        let grade = data.grade.as_ref();

        let rows = conn.execute(
            r#"
            UPDATE batches SET
                name = ?1,
                final_served_weight = ?2,
                number_of_servings = ?3,
                rating = ?4,
                reference_urls = ?5,
                grade_flavor = ?6,
                grade_texture = ?7,
                grade_overall = ?8,
                grade_notes = ?9
            WHERE id = ?10
            "#,
            params![
                data.name,
                data.final_served_weight,
                data.number_of_servings,
                data.rating,
                reference_urls,
                grade.map(|g| g.flavor),
                grade.map(|g| g.texture),
                grade.map(|g| g.overall),
                grade.and_then(|g| g.notes.clone()),
                id,
            ],
        )?;

        if rows == 0 {
            return Ok(None);
        }

        Ingredient::replace_for_batch(conn, id, &data.ingredients)?;
        Note::replace_for_batch(conn, id, &data.notes)?;

        Self::get_by_id(conn, id)
    }

    /// Delete a batch and its owned collections
    ///
    /// Batches derived from it keep their `parent_batch_id`.
    /// Returns Ok(true) if deleted, Ok(false) if not found.
    pub fn delete(conn: &Connection, id: i64) -> DbResult<bool> {
        let rows = conn.execute("DELETE FROM batches WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }

    /// Previous and next batch by creation time; `None` if the batch does not exist
    pub fn adjacent(conn: &Connection, id: i64) -> DbResult<Option<Adjacent>> {
        let created_at: String = match conn.query_row(
            "SELECT created_at FROM batches WHERE id = ?1",
            [id],
            |row| row.get(0),
        ) {
            Ok(t) => t,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        // Ties on created_at fall back to id so that the walk is total
        let previous_id = Self::neighbour(
            conn,
            "SELECT id FROM batches
             WHERE created_at < ?1 OR (created_at = ?1 AND id < ?2)
             ORDER BY created_at DESC, id DESC LIMIT 1",
            &created_at,
            id,
        )?;
        let next_id = Self::neighbour(
            conn,
            "SELECT id FROM batches
             WHERE created_at > ?1 OR (created_at = ?1 AND id > ?2)
             ORDER BY created_at ASC, id ASC LIMIT 1",
            &created_at,
            id,
        )?;

        Ok(Some(Adjacent { previous_id, next_id }))
    }

    fn neighbour(conn: &Connection, sql: &str, created_at: &str, id: i64) -> DbResult<Option<i64>> {
        match conn.query_row(sql, params![created_at, id], |row| row.get(0)) {
            Ok(id) => Ok(Some(id)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Count batches
    pub fn count(conn: &Connection) -> DbResult<i64> {
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM batches", [], |row| row.get(0))?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use chrono::{Duration, TimeZone};

    fn draft(name: &str, created_at: DateTime<Utc>) -> BatchCreate {
        BatchCreate {
            name: name.to_string(),
            created_at,
            ingredients: IngredientSet {
                wet_ingredients: vec![Ingredient::new("milk", 500.0, 2.113, 0.5)],
                ..Default::default()
            },
            notes: vec![Note::new("too icy")],
            grade: None,
            rating: None,
            final_served_weight: None,
            number_of_servings: None,
            reference_urls: Vec::new(),
            is_ai_generated: false,
            parent_batch_id: None,
        }
    }

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_create_and_get() {
        let db = Database::in_memory().unwrap();
        let mut data = draft("Vanilla", base_time());
        data.grade = Some(Grade { flavor: 7.0, texture: 6.5, overall: 7.0, notes: Some("ok".into()) });
        data.reference_urls = vec!["https://example.com/a".into()];
        data.rating = Some(8.0);

        let created = db.with_conn(|conn| Batch::create(conn, &data)).unwrap();
        let fetched = db.with_conn(|conn| Batch::get_by_id(conn, created.id)).unwrap().unwrap();

        assert_eq!(created, fetched);
        assert_eq!(fetched.name, "Vanilla");
        assert_eq!(fetched.created_at, base_time());
        assert_eq!(fetched.ingredients, data.ingredients);
        assert_eq!(fetched.notes.len(), 1);
        assert_eq!(fetched.grade, data.grade);
        assert_eq!(fetched.reference_urls, data.reference_urls);
        assert!(!fetched.is_ai_generated);
    }

    #[test]
    fn test_get_missing_returns_none() {
        let db = Database::in_memory().unwrap();
        assert!(db.with_conn(|conn| Batch::get_by_id(conn, 42)).unwrap().is_none());
    }

    #[test]
    fn test_list_newest_first() {
        let db = Database::in_memory().unwrap();
        let t = base_time();
        db.with_conn(|conn| {
            Batch::create(conn, &draft("old", t))?;
            Batch::create(conn, &draft("new", t + Duration::hours(2)))?;
            Batch::create(conn, &draft("mid", t + Duration::hours(1)))?;
            Ok(())
        })
        .unwrap();

        let names: Vec<String> = db
            .with_conn(Batch::list)
            .unwrap()
            .into_iter()
            .map(|b| b.name)
            .collect();
        assert_eq!(names, vec!["new", "mid", "old"]);
    }

    #[test]
    fn test_replace_swaps_collections_and_keeps_provenance() {
        let db = Database::in_memory().unwrap();
        let mut data = draft("child", base_time());
        data.is_ai_generated = true;
        data.parent_batch_id = Some(99);
        let created = db.with_conn(|conn| Batch::create(conn, &data)).unwrap();

        let update = BatchUpdate {
            name: "renamed".into(),
            ingredients: IngredientSet::default(),
            notes: vec![Note::new("better"), Note::new("still icy")],
            grade: Some(Grade { flavor: 9.0, texture: 8.0, overall: 8.5, notes: None }),
            rating: None,
            final_served_weight: Some(900.0),
            number_of_servings: Some(6.0),
            reference_urls: Vec::new(),
        };
        let replaced = db
            .with_conn(|conn| Batch::replace(conn, created.id, &update))
            .unwrap()
            .unwrap();

        assert_eq!(replaced.name, "renamed");
        assert!(replaced.ingredients.is_empty());
        assert_eq!(replaced.notes.len(), 2);
        assert_eq!(replaced.grade, update.grade);
        assert_eq!(replaced.final_served_weight, Some(900.0));
        assert!(replaced.is_ai_generated);
        assert_eq!(replaced.parent_batch_id, Some(99));
        assert_eq!(replaced.created_at, created.created_at);
    }

    #[test]
    fn test_replace_missing_returns_none() {
        let db = Database::in_memory().unwrap();
        let update = BatchUpdate {
            name: "x".into(),
            ingredients: IngredientSet::default(),
            notes: Vec::new(),
            grade: None,
            rating: None,
            final_served_weight: None,
            number_of_servings: None,
            reference_urls: Vec::new(),
        };
        assert!(db.with_conn(|conn| Batch::replace(conn, 7, &update)).unwrap().is_none());
    }

    #[test]
    fn test_delete_parent_leaves_dangling_child() {
        let db = Database::in_memory().unwrap();
        let parent = db.with_conn(|conn| Batch::create(conn, &draft("parent", base_time()))).unwrap();
        let mut child_data = draft("child", base_time() + Duration::minutes(5));
        child_data.parent_batch_id = Some(parent.id);
        child_data.is_ai_generated = true;
        let child = db.with_conn(|conn| Batch::create(conn, &child_data)).unwrap();

        assert!(db.with_conn(|conn| Batch::delete(conn, parent.id)).unwrap());
        assert!(!db.with_conn(|conn| Batch::delete(conn, parent.id)).unwrap());

        let reread = db.with_conn(|conn| Batch::get_by_id(conn, child.id)).unwrap().unwrap();
        assert_eq!(reread.parent_batch_id, Some(parent.id));
        assert!(db.with_conn(|conn| Batch::get_by_id(conn, parent.id)).unwrap().is_none());
        assert_eq!(db.with_conn(Batch::count).unwrap(), 1);
    }

    #[test]
    fn test_delete_cascades_to_owned_rows() {
        let db = Database::in_memory().unwrap();
        let batch = db.with_conn(|conn| Batch::create(conn, &draft("b", base_time()))).unwrap();
        db.with_conn(|conn| Batch::delete(conn, batch.id)).unwrap();

        let leftovers: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT (SELECT COUNT(*) FROM batch_ingredients) + (SELECT COUNT(*) FROM batch_notes)",
                    [],
                    |row| row.get(0),
                )?)
            })
            .unwrap();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_adjacent() {
        let db = Database::in_memory().unwrap();
        let t = base_time();
        let (a, b, c) = db
            .with_conn(|conn| {
                let a = Batch::create(conn, &draft("a", t))?;
                let c = Batch::create(conn, &draft("c", t + Duration::hours(2)))?;
                let b = Batch::create(conn, &draft("b", t + Duration::hours(1)))?;
                Ok((a, b, c))
            })
            .unwrap();

        let mid = db.with_conn(|conn| Batch::adjacent(conn, b.id)).unwrap().unwrap();
        assert_eq!(mid, Adjacent { previous_id: Some(a.id), next_id: Some(c.id) });

        let first = db.with_conn(|conn| Batch::adjacent(conn, a.id)).unwrap().unwrap();
        assert_eq!(first, Adjacent { previous_id: None, next_id: Some(b.id) });

        let last = db.with_conn(|conn| Batch::adjacent(conn, c.id)).unwrap().unwrap();
        assert_eq!(last, Adjacent { previous_id: Some(b.id), next_id: None });

        assert!(db.with_conn(|conn| Batch::adjacent(conn, 1000)).unwrap().is_none());
    }

    #[test]
    fn test_list_children() {
        let db = Database::in_memory().unwrap();
        let parent = db.with_conn(|conn| Batch::create(conn, &draft("p", base_time()))).unwrap();
        let mut child = draft("c", base_time() + Duration::hours(1));
        child.parent_batch_id = Some(parent.id);
        db.with_conn(|conn| Batch::create(conn, &child)).unwrap();

        let children = db.with_conn(|conn| Batch::list_children(conn, parent.id)).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].name, "c");
    }

    #[test]
    fn test_grade_validate() {
        assert!(Grade { flavor: 0.0, texture: 10.0, overall: 5.0, notes: None }.validate().is_ok());
        assert!(Grade { flavor: 11.0, ..Default::default() }.validate().is_err());
        assert!(Grade { texture: -0.5, ..Default::default() }.validate().is_err());
        assert!(Grade { overall: f64::NAN, ..Default::default() }.validate().is_err());
    }

    #[test]
    fn test_batch_name_or_default() {
        assert_eq!(batch_name_or_default(None), DEFAULT_BATCH_NAME);
        assert_eq!(batch_name_or_default(Some("   ")), DEFAULT_BATCH_NAME);
        assert_eq!(batch_name_or_default(Some(" Mango ")), "Mango");
    }

    #[test]
    fn test_batch_serializes_flat_lists() {
        let batch = Batch {
            id: 1,
            name: "x".into(),
            created_at: base_time(),
            ingredients: IngredientSet::default(),
            notes: Vec::new(),
            grade: None,
            rating: None,
            final_served_weight: None,
            number_of_servings: None,
            reference_urls: Vec::new(),
            is_ai_generated: true,
            parent_batch_id: Some(3),
        };
        let value = serde_json::to_value(&batch).unwrap();
        assert!(value["dryIngredients"].is_array());
        assert_eq!(value["isAiGenerated"], serde_json::json!(true));
        assert_eq!(value["parentBatchId"], serde_json::json!(3));
        assert!(value.get("grade").is_none());
    }
}
