//! Data models
//!
//! Rust structs representing database entities.

mod batch;
mod ingredient;
mod note;
mod reference_url;
mod unique_ingredient;

pub use batch::{batch_name_or_default, Adjacent, Batch, BatchCreate, BatchInput, BatchUpdate, Grade, DEFAULT_BATCH_NAME};
pub use ingredient::{Ingredient, IngredientInput, IngredientKind, IngredientSet, IngredientSetInput};
pub use note::{Note, NoteInput, AI_NOTE_MARKER};
pub use reference_url::{IndexedContent, ReferenceUrl};
pub use unique_ingredient::UniqueIngredient;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;

/// Format a timestamp for storage
///
/// Fixed-width RFC 3339 in UTC so that text ordering matches time ordering.
pub(crate) fn to_db_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp, reporting failures against the given column
pub(crate) fn from_db_time(column: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}
