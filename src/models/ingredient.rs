//! Ingredient model
//!
//! A named amount measured three ways, grouped into the four ingredient
//! lists a batch owns.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::DbResult;
use crate::measure::{coerce_quantity, convert_edit, sanitize_quantity, MeasureField, Quantities, Tracking};

/// Which list of a batch an ingredient belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngredientKind {
    Dry,
    Wet,
    Stabilizer,
    Ice,
}

impl IngredientKind {
    pub const ALL: [IngredientKind; 4] = [
        IngredientKind::Dry,
        IngredientKind::Wet,
        IngredientKind::Stabilizer,
        IngredientKind::Ice,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IngredientKind::Dry => "dry",
            IngredientKind::Wet => "wet",
            IngredientKind::Stabilizer => "stabilizer",
            IngredientKind::Ice => "ice",
        }
    }

    /// Parse a kind, accepting the plural spellings some clients send
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "dry" | "dryingredients" => Some(IngredientKind::Dry),
            "wet" | "wetingredients" => Some(IngredientKind::Wet),
            "stabilizer" | "stabilizers" => Some(IngredientKind::Stabilizer),
            "ice" => Some(IngredientKind::Ice),
            _ => None,
        }
    }

    /// Ice is tracked by volume only
    pub fn tracking(&self) -> Tracking {
        match self {
            IngredientKind::Ice => Tracking::VolumeOnly,
            _ => Tracking::Full,
        }
    }
}

/// One ingredient line
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    #[serde(default)]
    pub grams: f64,
    #[serde(default)]
    pub cups: f64,
    #[serde(default)]
    pub liters: f64,
}

impl Ingredient {
    pub fn new(name: impl Into<String>, grams: f64, cups: f64, liters: f64) -> Self {
        Self {
            name: name.into(),
            grams,
            cups,
            liters,
        }
    }

    pub fn quantities(&self) -> Quantities {
        Quantities::new(self.grams, self.cups, self.liters)
    }

    /// Apply a single-field edit, recomputing the sibling fields for this kind
    pub fn with_edit(&self, kind: IngredientKind, field: MeasureField, value: f64) -> Self {
        let q = convert_edit(self.quantities(), field, value, kind.tracking());
        Self {
            name: self.name.clone(),
            grams: q.grams,
            cups: q.cups,
            liters: q.liters,
        }
    }

    /// Trim the name and clamp the amounts; `None` if the name is blank
    pub fn sanitized(&self) -> Option<Self> {
        let name = self.name.trim();
        if name.is_empty() {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            grams: sanitize_quantity(self.grams),
            cups: sanitize_quantity(self.cups),
            liters: sanitize_quantity(self.liters),
        })
    }

    fn from_row(row: &Row) -> rusqlite::Result<(String, Self)> {
        Ok((
            row.get("kind")?,
            Self {
                name: row.get("name")?,
                grams: row.get("grams")?,
                cups: row.get("cups")?,
                liters: row.get("liters")?,
            },
        ))
    }

    /// Load all ingredient lists of a batch, in their stored order
    pub fn list_for_batch(conn: &Connection, batch_id: i64) -> DbResult<IngredientSet> {
        let mut stmt = conn.prepare(
            "SELECT kind, name, grams, cups, liters FROM batch_ingredients
             WHERE batch_id = ?1 ORDER BY kind, position",
        )?;

        let rows = stmt
            .query_map([batch_id], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut set = IngredientSet::default();
        for (kind, ingredient) in rows {
            // The CHECK constraint keeps unknown kinds out of the table
            if let Some(kind) = IngredientKind::from_str(&kind) {
                set.list_mut(kind).push(ingredient);
            }
        }
        Ok(set)
    }

    /// Replace every ingredient of a batch with the given lists
    pub fn replace_for_batch(conn: &Connection, batch_id: i64, set: &IngredientSet) -> DbResult<()> {
        conn.execute("DELETE FROM batch_ingredients WHERE batch_id = ?1", [batch_id])?;

        let mut stmt = conn.prepare(
            "INSERT INTO batch_ingredients (batch_id, kind, position, name, grams, cups, liters)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;

        for kind in IngredientKind::ALL {
            for (position, ing) in set.list(kind).iter().enumerate() {
                stmt.execute(params![
                    batch_id,
                    kind.as_str(),
                    position as i64,
                    ing.name,
                    ing.grams,
                    ing.cups,
                    ing.liters,
                ])?;
            }
        }
        Ok(())
    }
}

/// The four ingredient lists of a batch
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngredientSet {
    #[serde(default)]
    pub dry_ingredients: Vec<Ingredient>,
    #[serde(default)]
    pub wet_ingredients: Vec<Ingredient>,
    #[serde(default)]
    pub stabilizers: Vec<Ingredient>,
    #[serde(default)]
    pub ice: Vec<Ingredient>,
}

impl IngredientSet {
    pub fn list(&self, kind: IngredientKind) -> &[Ingredient] {
        match kind {
            IngredientKind::Dry => &self.dry_ingredients,
            IngredientKind::Wet => &self.wet_ingredients,
            IngredientKind::Stabilizer => &self.stabilizers,
            IngredientKind::Ice => &self.ice,
        }
    }

    pub fn list_mut(&mut self, kind: IngredientKind) -> &mut Vec<Ingredient> {
        match kind {
            IngredientKind::Dry => &mut self.dry_ingredients,
            IngredientKind::Wet => &mut self.wet_ingredients,
            IngredientKind::Stabilizer => &mut self.stabilizers,
            IngredientKind::Ice => &mut self.ice,
        }
    }

    /// Iterate every ingredient together with its kind
    pub fn iter(&self) -> impl Iterator<Item = (IngredientKind, &Ingredient)> {
        IngredientKind::ALL
            .into_iter()
            .flat_map(move |kind| self.list(kind).iter().map(move |ing| (kind, ing)))
    }

    pub fn len(&self) -> usize {
        IngredientKind::ALL.iter().map(|k| self.list(*k).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop blank-named lines and clamp amounts in every list
    pub fn sanitized(&self) -> Self {
        let mut out = Self::default();
        for kind in IngredientKind::ALL {
            *out.list_mut(kind) = self.list(kind).iter().filter_map(Ingredient::sanitized).collect();
        }
        out
    }
}

/// An ingredient line as a client sent it
///
/// Every field is optional and loosely typed; see [`IngredientInput::into_ingredient`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IngredientInput {
    #[serde(default)]
    pub name: Value,
    #[serde(default)]
    pub grams: Value,
    #[serde(default)]
    pub cups: Value,
    #[serde(default)]
    pub liters: Value,
}

impl IngredientInput {
    /// Coerce into an ingredient; non-numeric amounts become 0, a blank
    /// or non-string name drops the line
    pub fn into_ingredient(self) -> Option<Ingredient> {
        if !self.name.is_string() {
            return None;
        }
        self.coerce().sanitized()
    }

    /// Coerce every field without dropping the line; a non-string name becomes empty
    pub fn coerce(self) -> Ingredient {
        let name = match self.name {
            Value::String(s) => s,
            _ => String::new(),
        };
        Ingredient {
            name,
            grams: coerce_quantity(&self.grams),
            cups: coerce_quantity(&self.cups),
            liters: coerce_quantity(&self.liters),
        }
    }
}

/// The four ingredient lists as a client sent them
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngredientSetInput {
    #[serde(default)]
    pub dry_ingredients: Option<Vec<IngredientInput>>,
    #[serde(default)]
    pub wet_ingredients: Option<Vec<IngredientInput>>,
    #[serde(default)]
    pub stabilizers: Option<Vec<IngredientInput>>,
    #[serde(default)]
    pub ice: Option<Vec<IngredientInput>>,
}

impl IngredientSetInput {
    pub fn into_set(self) -> IngredientSet {
        fn clean(list: Option<Vec<IngredientInput>>) -> Vec<Ingredient> {
            list.unwrap_or_default()
                .into_iter()
                .filter_map(IngredientInput::into_ingredient)
                .collect()
        }
        IngredientSet {
            dry_ingredients: clean(self.dry_ingredients),
            wet_ingredients: clean(self.wet_ingredients),
            stabilizers: clean(self.stabilizers),
            ice: clean(self.ice),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_from_str_accepts_plural() {
        assert_eq!(IngredientKind::from_str("stabilizer"), Some(IngredientKind::Stabilizer));
        assert_eq!(IngredientKind::from_str("stabilizers"), Some(IngredientKind::Stabilizer));
        assert_eq!(IngredientKind::from_str("ICE"), Some(IngredientKind::Ice));
        assert_eq!(IngredientKind::from_str("frozen"), None);
    }

    #[test]
    fn test_sugar_grams_edit() {
        let sugar = Ingredient::new("sugar", 0.0, 0.0, 0.0);
        let edited = sugar.with_edit(IngredientKind::Dry, MeasureField::Grams, 100.0);
        assert_eq!(edited.name, "sugar");
        assert!((edited.cups - 0.423).abs() < 1e-9);
        assert!((edited.liters - 0.100).abs() < 1e-9);
    }

    #[test]
    fn test_ice_edit_keeps_grams_stale() {
        let ice = Ingredient::new("ice", 12.0, 0.0, 0.0);
        let edited = ice.with_edit(IngredientKind::Ice, MeasureField::Cups, 2.0);
        assert_eq!(edited.grams, 12.0);
        assert!((edited.liters - 0.473).abs() < 1e-9);
    }

    #[test]
    fn test_input_coercion() {
        let input: IngredientSetInput = serde_json::from_value(json!({
            "dryIngredients": [
                {"name": "  sugar ", "grams": "100", "cups": "x", "liters": null},
                {"name": "   ", "grams": 5},
                {"grams": 5}
            ],
            "wetIngredients": null,
            "ice": [{"name": "ice", "cups": -1, "liters": 0.2}]
        }))
        .unwrap();

        let set = input.into_set();
        assert_eq!(set.dry_ingredients, vec![Ingredient::new("sugar", 100.0, 0.0, 0.0)]);
        assert!(set.wet_ingredients.is_empty());
        assert!(set.stabilizers.is_empty());
        assert_eq!(set.ice, vec![Ingredient::new("ice", 0.0, 0.0, 0.2)]);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_set_serializes_camel_case() {
        let set = IngredientSet {
            ice: vec![Ingredient::new("ice", 0.0, 1.0, 0.237)],
            ..Default::default()
        };
        let value = serde_json::to_value(&set).unwrap();
        assert!(value.get("dryIngredients").is_some());
        assert!(value.get("wetIngredients").is_some());
        assert_eq!(value["ice"][0]["cups"], json!(1.0));
    }

    #[test]
    fn test_ingredient_defaults_missing_grams() {
        let ing: Ingredient = serde_json::from_value(json!({"name": "ice", "cups": 1, "liters": 0.237})).unwrap();
        assert_eq!(ing.grams, 0.0);
    }

    #[test]
    fn test_replace_and_list_for_batch() {
        let db = crate::db::Database::in_memory().unwrap();
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO batches (name, created_at) VALUES ('b', '2024-01-01T00:00:00.000000Z')",
                [],
            )?;
            let id = conn.last_insert_rowid();
            let set = IngredientSet {
                dry_ingredients: vec![
                    Ingredient::new("sugar", 100.0, 0.423, 0.1),
                    Ingredient::new("salt", 1.0, 0.004, 0.001),
                ],
                ice: vec![Ingredient::new("ice", 0.0, 1.0, 0.237)],
                ..Default::default()
            };
            Ingredient::replace_for_batch(conn, id, &set)?;
            assert_eq!(Ingredient::list_for_batch(conn, id)?, set);

            Ingredient::replace_for_batch(conn, id, &IngredientSet::default())?;
            assert!(Ingredient::list_for_batch(conn, id)?.is_empty());
            Ok(())
        })
        .unwrap();
    }
}
