//! Ingredient tools
//!
//! Name suggestions from past batches, and the single-field unit edit the
//! batch editor calls whenever one measurement changes.

use serde::Deserialize;
use serde_json::Value;

use crate::db::Database;
use crate::error::{AppError, AppResult};
use crate::measure::{coerce_quantity, MeasureField};
use crate::models::{Ingredient, IngredientInput, IngredientKind, UniqueIngredient};

/// Suggestions returned per query
pub const SUGGESTION_LIMIT: i64 = 10;

/// Query string of a name-suggestion request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SuggestionQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
}

/// One measurement edit on an ingredient line
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub field: String,
    #[serde(default)]
    pub value: Value,
    /// Current line; its amounts are coerced like any other client input
    #[serde(default)]
    pub ingredient: IngredientInput,
}

fn parse_kind(raw: Option<&str>) -> AppResult<IngredientKind> {
    let raw = raw.unwrap_or_default();
    IngredientKind::from_str(raw.trim())
        .ok_or_else(|| AppError::Validation(format!("unknown ingredient type '{}'", raw)))
}

/// Previously used names for a kind, most used first
pub fn suggest_names(db: &Database, query: SuggestionQuery) -> AppResult<Vec<UniqueIngredient>> {
    let kind = parse_kind(query.kind.as_deref())?;
    Ok(db.with_conn(|conn| {
        UniqueIngredient::search(conn, kind, query.search.as_deref(), SUGGESTION_LIMIT)
    })?)
}

/// Apply an edit to one field and recompute the others
///
/// Non-numeric or negative values count as 0, in the edit and in the
/// fields it leaves alone.
pub fn convert(request: ConvertRequest) -> AppResult<Ingredient> {
    let kind = parse_kind(Some(&request.kind))?;
    let field = MeasureField::from_str(request.field.trim())
        .ok_or_else(|| AppError::Validation(format!("unknown measurement '{}'", request.field)))?;
    let value = coerce_quantity(&request.value);
    Ok(request.ingredient.coerce().with_edit(kind, field, value))
}
