//! Batch derivation
//!
//! Turns a source batch plus generator output into a new, independent
//! batch linked back to its parent. Nothing is written unless the proposal
//! validates, and the write itself is a single transaction.

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::db::Database;
use crate::error::{AppError, AppResult};
use crate::models::{Batch, BatchCreate, IndexedContent, Note, UniqueIngredient};

use super::generator::{GenerationError, TextGenerator};
use super::prompt::{system_prompt, user_prompt};
use super::proposal::{proposal_schema, RawProposal, ValidProposal};

/// Build the record for a derived batch
///
/// Starts from a copy of the source, then takes the proposal's name and
/// ingredient lists, stamps a fresh creation time, marks it AI-generated,
/// links the parent, drops the grade and replaces the notes with a single
/// rationale note.
pub fn derived_batch(source: &Batch, proposal: ValidProposal, now: DateTime<Utc>) -> BatchCreate {
    let mut data = BatchCreate::from(source);
    data.name = proposal.name;
    data.ingredients = proposal.ingredients;
    data.created_at = now;
    data.is_ai_generated = true;
    data.parent_batch_id = Some(source.id);
    data.grade = None;
    let mut note = Note::ai_suggestion(&proposal.explanation);
    note.created_at = now;
    data.notes = vec![note];
    data
}

/// Ask the generator for a variant of `source` and store it
pub async fn derive_batch(
    db: &Database,
    generator: &dyn TextGenerator,
    source: &Batch,
    instructions: Option<&str>,
    references: &[IndexedContent],
) -> AppResult<Batch> {
    let system = system_prompt(references, instructions);
    let user = user_prompt(source).map_err(GenerationError::Decode)?;
    let schema = proposal_schema();

    info!(
        "Requesting suggestion for batch {} ({} reference texts)",
        source.id,
        references.len()
    );

    let raw = generator.generate(&system, &user, &schema).await.map_err(|e| {
        error!("Suggestion request for batch {} failed: {}", source.id, e);
        AppError::GenerationFailed(e)
    })?;

    let fields = RawProposal::from_value(raw)
        .map_err(|e| {
            error!("Suggestion for batch {} did not match the schema: {}", source.id, e);
            AppError::GenerationFailed(GenerationError::Decode(e))
        })?
        .into_fields();

    let proposal = fields.validate().map_err(|e| {
        warn!("Rejected suggestion for batch {}: {}", source.id, e);
        e
    })?;

    if proposal.explanation.is_empty() {
        warn!("Suggestion for batch {} came without an explanation", source.id);
    }

    let now = Utc::now();
    let data = derived_batch(source, proposal, now);

    let created = db.with_transaction(|tx| {
        let batch = Batch::create(tx, &data)?;
        UniqueIngredient::record_set(tx, &batch.ingredients, now)?;
        Ok(batch)
    })?;

    info!(
        "Created suggested batch {} '{}' from batch {}",
        created.id, created.name, source.id
    );
    Ok(created)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{Grade, Ingredient, IngredientSet};
    use crate::suggest::generator::ResponseSchema;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    /// Generator returning a fixed answer and recording every prompt it saw
    pub(crate) struct ScriptedGenerator {
        answer: Option<Value>,
        pub calls: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedGenerator {
        pub(crate) fn answering(answer: Value) -> Self {
            Self {
                answer: Some(answer),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn failing() -> Self {
            Self {
                answer: None,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(
            &self,
            system_prompt: &str,
            user_prompt: &str,
            schema: &ResponseSchema,
        ) -> Result<Value, GenerationError> {
            assert_eq!(schema.name, "modify_ingredients");
            self.calls
                .lock()
                .unwrap()
                .push((system_prompt.to_string(), user_prompt.to_string()));
            match &self.answer {
                Some(answer) => Ok(answer.clone()),
                None => Err(GenerationError::Api {
                    status: 529,
                    body: "overloaded".into(),
                }),
            }
        }
    }

    pub(crate) fn creamier_mix() -> Value {
        json!({
            "name": "Creamier Mix",
            "dryIngredients": [],
            "wetIngredients": [{"name": "milk", "grams": 450, "cups": 1.902, "liters": 0.45},
                               {"name": "cream", "grams": 150, "cups": 0.634, "liters": 0.15}],
            "stabilizers": [{"name": "guar gum", "grams": 1, "cups": 0.004, "liters": 0.001}],
            "ice": [{"name": "ice", "cups": 0.5, "liters": 0.118}],
            "explanation": "reduced ice ratio"
        })
    }

    fn source_batch(db: &Database) -> Batch {
        let data = BatchCreate {
            name: "Icy Base".into(),
            created_at: Utc.with_ymd_and_hms(2024, 7, 1, 10, 0, 0).unwrap(),
            ingredients: IngredientSet {
                wet_ingredients: vec![Ingredient::new("milk", 500.0, 2.113, 0.5)],
                ice: vec![Ingredient::new("ice", 0.0, 1.0, 0.237)],
                ..Default::default()
            },
            notes: vec![Note::new("too icy")],
            grade: Some(Grade { flavor: 6.0, texture: 3.0, overall: 4.0, notes: None }),
            rating: Some(4.0),
            final_served_weight: Some(800.0),
            number_of_servings: Some(5.0),
            reference_urls: vec!["https://scoops.test/".into()],
            is_ai_generated: false,
            parent_batch_id: None,
        };
        db.with_conn(|conn| Batch::create(conn, &data)).unwrap()
    }

    #[tokio::test]
    async fn test_derive_creates_linked_batch() {
        let db = Database::in_memory().unwrap();
        let source = source_batch(&db);
        let generator = ScriptedGenerator::answering(creamier_mix());

        let derived = derive_batch(&db, &generator, &source, Some("less ice"), &[]).await.unwrap();

        assert_ne!(derived.id, source.id);
        assert_eq!(derived.name, "Creamier Mix");
        assert!(derived.is_ai_generated);
        assert_eq!(derived.parent_batch_id, Some(source.id));
        assert!(derived.grade.is_none());
        assert_eq!(derived.notes.len(), 1);
        assert!(derived.notes[0].is_ai_suggestion());
        assert!(derived.notes[0].content.contains("reduced ice ratio"));
        assert_eq!(derived.ingredients.wet_ingredients.len(), 2);
        assert_eq!(derived.ingredients.ice, vec![Ingredient::new("ice", 0.0, 0.5, 0.118)]);
        assert!(derived.created_at > source.created_at);

        // fields outside the proposal are inherited
        assert_eq!(derived.rating, Some(4.0));
        assert_eq!(derived.final_served_weight, Some(800.0));
        assert_eq!(derived.reference_urls, source.reference_urls);

        // the source is untouched
        let reread = db.with_conn(|conn| Batch::get_by_id(conn, source.id)).unwrap().unwrap();
        assert_eq!(reread, source);

        let calls = generator.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].0.contains("less ice"));
        assert!(calls[0].1.contains("too icy"));
    }

    #[tokio::test]
    async fn test_derive_unwraps_properties() {
        let db = Database::in_memory().unwrap();
        let source = source_batch(&db);
        let generator = ScriptedGenerator::answering(json!({ "properties": creamier_mix() }));

        let derived = derive_batch(&db, &generator, &source, None, &[]).await.unwrap();
        assert_eq!(derived.name, "Creamier Mix");
        assert_eq!(derived.ingredients.stabilizers[0].name, "guar gum");
    }

    #[tokio::test]
    async fn test_incomplete_suggestion_persists_nothing() {
        let db = Database::in_memory().unwrap();
        let source = source_batch(&db);
        let mut answer = creamier_mix();
        answer.as_object_mut().unwrap().remove("ice");
        let generator = ScriptedGenerator::answering(answer);

        let err = derive_batch(&db, &generator, &source, None, &[]).await.unwrap_err();
        assert!(matches!(err, AppError::IncompleteSuggestion(ref m) if m == &vec!["ice"]));
        assert_eq!(db.with_conn(Batch::count).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_generation_failure_persists_nothing() {
        let db = Database::in_memory().unwrap();
        let source = source_batch(&db);
        let generator = ScriptedGenerator::failing();

        let err = derive_batch(&db, &generator, &source, None, &[]).await.unwrap_err();
        assert!(matches!(err, AppError::GenerationFailed(_)));
        assert_eq!(db.with_conn(Batch::count).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_malformed_lists_are_generation_failures() {
        let db = Database::in_memory().unwrap();
        let source = source_batch(&db);
        let generator = ScriptedGenerator::answering(json!({
            "name": "Odd", "dryIngredients": "none", "wetIngredients": [],
            "stabilizers": [], "ice": []
        }));

        let err = derive_batch(&db, &generator, &source, None, &[]).await.unwrap_err();
        assert!(matches!(err, AppError::GenerationFailed(GenerationError::Decode(_))));
        assert_eq!(db.with_conn(Batch::count).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_malformed_wrapped_lists_are_generation_failures() {
        let db = Database::in_memory().unwrap();
        let source = source_batch(&db);
        let mut inner = creamier_mix();
        inner["ice"] = json!({"name": "ice"});
        let generator = ScriptedGenerator::answering(json!({ "properties": inner }));

        let err = derive_batch(&db, &generator, &source, None, &[]).await.unwrap_err();
        assert!(matches!(err, AppError::GenerationFailed(GenerationError::Decode(_))));
        assert_eq!(db.with_conn(Batch::count).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reference_texts_reach_prompt() {
        let db = Database::in_memory().unwrap();
        let source = source_batch(&db);
        let generator = ScriptedGenerator::answering(creamier_mix());
        let refs = vec![IndexedContent {
            url: "https://scoops.test/".into(),
            content: "Overrun is air.".into(),
        }];

        derive_batch(&db, &generator, &source, None, &refs).await.unwrap();
        let calls = generator.calls.lock().unwrap();
        assert!(calls[0].0.contains("Content from https://scoops.test/:\nOverrun is air."));
    }

    #[test]
    fn test_derived_batch_record() {
        let source = Batch {
            id: 9,
            name: "Src".into(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            ingredients: IngredientSet::default(),
            notes: vec![Note::new("a"), Note::new("b")],
            grade: Some(Grade::default()),
            rating: Some(2.0),
            final_served_weight: None,
            number_of_servings: None,
            reference_urls: Vec::new(),
            is_ai_generated: false,
            parent_batch_id: None,
        };
        let now = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let proposal = ValidProposal {
            name: "New".into(),
            ingredients: IngredientSet::default(),
            explanation: String::new(),
        };

        let data = derived_batch(&source, proposal, now);
        assert_eq!(data.created_at, now);
        assert_eq!(data.parent_batch_id, Some(9));
        assert!(data.grade.is_none());
        assert_eq!(data.notes.len(), 1);
        assert_eq!(data.notes[0].created_at, now);
        assert!(data.notes[0].is_ai_suggestion());
        assert_eq!(data.rating, Some(2.0));
    }
}
