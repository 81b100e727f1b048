//! Batch tools
//!
//! Create, read, replace and delete batches, walk them in creation order,
//! and derive AI-suggested variants.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use crate::db::Database;
use crate::error::{AppError, AppResult};
use crate::models::{
    batch_name_or_default, Adjacent, Batch, BatchCreate, BatchInput, BatchUpdate, Grade, Note,
    ReferenceUrl, UniqueIngredient,
};
use crate::suggest::{derive_batch, TextGenerator};

pub const MIN_RATING: f64 = 1.0;
pub const MAX_RATING: f64 = 10.0;

/// Body of a suggestion request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SuggestRequest {
    #[serde(default)]
    pub instructions: Option<String>,
}

fn validate_rating(rating: Option<f64>) -> AppResult<()> {
    match rating {
        Some(r) if !r.is_finite() || !(MIN_RATING..=MAX_RATING).contains(&r) => Err(
            AppError::Validation(format!(
                "rating must be between {} and {}, got {}",
                MIN_RATING, MAX_RATING, r
            )),
        ),
        _ => Ok(()),
    }
}

fn validate_grade(grade: Option<&Grade>) -> AppResult<()> {
    match grade {
        Some(g) => g.validate().map_err(AppError::Validation),
        None => Ok(()),
    }
}

/// Optional non-negative measurement; anything else is dropped
fn optional_amount(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v >= 0.0)
}

/// Sanitise a client document into an update
fn sanitize_input(input: BatchInput, now: DateTime<Utc>) -> AppResult<BatchUpdate> {
    validate_rating(input.rating)?;
    validate_grade(input.grade.as_ref())?;

    let notes = input
        .notes
        .unwrap_or_default()
        .into_iter()
        .filter(|n| n.content.as_deref().map_or(false, |c| !c.trim().is_empty()))
        .map(|n| n.into_note(now))
        .collect::<Vec<Note>>();

    let reference_urls = input
        .reference_urls
        .unwrap_or_default()
        .into_iter()
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .collect();

    Ok(BatchUpdate {
        name: batch_name_or_default(input.name.as_deref()),
        ingredients: input.ingredients.into_set(),
        notes,
        grade: input.grade,
        rating: input.rating,
        final_served_weight: optional_amount(input.final_served_weight),
        number_of_servings: optional_amount(input.number_of_servings),
        reference_urls,
    })
}

/// List every batch, newest first
pub fn list_batches(db: &Database) -> AppResult<Vec<Batch>> {
    Ok(db.with_conn(Batch::list)?)
}

pub fn get_batch(db: &Database, id: i64) -> AppResult<Batch> {
    db.with_conn(|conn| Batch::get_by_id(conn, id))?
        .ok_or_else(|| AppError::batch_not_found(id))
}

/// Create a batch from a client document
pub fn create_batch(db: &Database, input: BatchInput) -> AppResult<Batch> {
    let now = Utc::now();
    let update = sanitize_input(input, now)?;
    let data = BatchCreate {
        name: update.name,
        created_at: now,
        ingredients: update.ingredients,
        notes: update.notes,
        grade: update.grade,
        rating: update.rating,
        final_served_weight: update.final_served_weight,
        number_of_servings: update.number_of_servings,
        reference_urls: update.reference_urls,
        is_ai_generated: false,
        parent_batch_id: None,
    };

    let batch = db.with_transaction(|tx| {
        let batch = Batch::create(tx, &data)?;
        UniqueIngredient::record_set(tx, &batch.ingredients, now)?;
        Ok(batch)
    })?;

    info!("Created batch {} '{}'", batch.id, batch.name);
    Ok(batch)
}

/// Replace a batch document wholesale
pub fn replace_batch(db: &Database, id: i64, input: BatchInput) -> AppResult<Batch> {
    let now = Utc::now();
    let update = sanitize_input(input, now)?;

    let batch = db.with_transaction(|tx| {
        let batch = Batch::replace(tx, id, &update)?;
        if let Some(batch) = &batch {
            UniqueIngredient::record_set(tx, &batch.ingredients, now)?;
        }
        Ok(batch)
    })?;

    match batch {
        Some(batch) => {
            info!("Replaced batch {}", id);
            Ok(batch)
        }
        None => Err(AppError::batch_not_found(id)),
    }
}

/// Delete a batch; batches derived from it keep their parent link
pub fn delete_batch(db: &Database, id: i64) -> AppResult<()> {
    if db.with_conn(|conn| Batch::delete(conn, id))? {
        info!("Deleted batch {}", id);
        Ok(())
    } else {
        Err(AppError::batch_not_found(id))
    }
}

pub fn adjacent_batches(db: &Database, id: i64) -> AppResult<Adjacent> {
    db.with_conn(|conn| Batch::adjacent(conn, id))?
        .ok_or_else(|| AppError::batch_not_found(id))
}

/// Batches derived from the given one, oldest first
pub fn list_children(db: &Database, id: i64) -> AppResult<Vec<Batch>> {
    Ok(db.with_conn(|conn| Batch::list_children(conn, id))?)
}

/// Derive a new batch from an existing one
///
/// The connection is released before the generator is called.
pub async fn suggest_batch(
    db: &Database,
    generator: &dyn TextGenerator,
    id: i64,
    request: SuggestRequest,
) -> AppResult<Batch> {
    let (source, references) = db.with_conn(|conn| {
        let source = Batch::get_by_id(conn, id)?;
        let references = ReferenceUrl::find_indexed(conn)?;
        Ok((source, references))
    })?;

    let source = match source {
        Some(batch) => batch,
        None => {
            warn!("Suggestion requested for missing batch {}", id);
            return Err(AppError::batch_not_found(id));
        }
    };

    derive_batch(db, generator, &source, request.instructions.as_deref(), &references).await
}
