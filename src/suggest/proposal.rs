//! Batch proposals returned by the text generator
//!
//! The declared response schema is generated from [`BatchProposal`]. What
//! actually comes back is decoded as a [`RawProposal`], unwrapped, and
//! validated into a [`ValidProposal`] before anything is stored.

use schemars::generate::SchemaSettings;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;
use crate::models::{IngredientInput, IngredientSet, IngredientSetInput};

use super::generator::ResponseSchema;

pub const TOOL_NAME: &str = "modify_ingredients";
pub const TOOL_DESCRIPTION: &str = "Modify ice cream ingredients based on analysis.";

/// An ingredient line in a proposal
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProposedIngredient {
    pub name: String,
    pub grams: f64,
    pub cups: f64,
    pub liters: f64,
}

/// An ice line in a proposal; ice is measured by volume only
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProposedIce {
    pub name: String,
    pub cups: f64,
    pub liters: f64,
}

/// The shape the generator is asked to produce
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchProposal {
    /// A creative, descriptive name for the new batch
    pub name: String,
    pub dry_ingredients: Vec<ProposedIngredient>,
    pub wet_ingredients: Vec<ProposedIngredient>,
    pub stabilizers: Vec<ProposedIngredient>,
    pub ice: Vec<ProposedIce>,
    /// Why the changes should improve the batch
    pub explanation: String,
}

/// Tool schema sent along with every suggestion request
pub fn proposal_schema() -> ResponseSchema {
    let generator = SchemaSettings::draft2020_12()
        .with(|s| s.inline_subschemas = true)
        .into_generator();
    let mut schema = generator.into_root_schema_for::<BatchProposal>().to_value();
    if let Some(obj) = schema.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
    }

    ResponseSchema {
        name: TOOL_NAME.to_string(),
        description: TOOL_DESCRIPTION.to_string(),
        schema,
    }
}

/// Proposal fields as received, each possibly missing
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalFields {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub dry_ingredients: Option<Vec<IngredientInput>>,
    #[serde(default)]
    pub wet_ingredients: Option<Vec<IngredientInput>>,
    #[serde(default)]
    pub stabilizers: Option<Vec<IngredientInput>>,
    #[serde(default)]
    pub ice: Option<Vec<IngredientInput>>,
    #[serde(default)]
    pub explanation: Option<String>,
}

/// A proposal either at the top level or nested under `properties`
#[derive(Debug, Clone)]
pub enum RawProposal {
    Wrapped { properties: ProposalFields },
    Flat(ProposalFields),
}

impl RawProposal {
    /// Pick the shape from the presence of an object-valued `properties`
    /// key, then decode that shape strictly
    pub fn from_value(mut value: Value) -> Result<Self, serde_json::Error> {
        let wrapped = value
            .as_object_mut()
            .filter(|obj| obj.get("properties").map_or(false, Value::is_object))
            .and_then(|obj| obj.remove("properties"));

        match wrapped {
            Some(properties) => Ok(RawProposal::Wrapped {
                properties: serde_json::from_value(properties)?,
            }),
            None => Ok(RawProposal::Flat(serde_json::from_value(value)?)),
        }
    }

    /// Resolve the wrapper so both shapes read the same
    pub fn into_fields(self) -> ProposalFields {
        match self {
            RawProposal::Wrapped { properties } => properties,
            RawProposal::Flat(fields) => fields,
        }
    }
}

/// A proposal with every required field present
#[derive(Debug, Clone, PartialEq)]
pub struct ValidProposal {
    pub name: String,
    pub ingredients: IngredientSet,
    /// Empty when the generator left it out
    pub explanation: String,
}

impl ProposalFields {
    /// Names of required fields that are absent
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.name.as_deref().map_or(true, |n| n.trim().is_empty()) {
            missing.push("name");
        }
        if self.dry_ingredients.is_none() {
            missing.push("dryIngredients");
        }
        if self.wet_ingredients.is_none() {
            missing.push("wetIngredients");
        }
        if self.stabilizers.is_none() {
            missing.push("stabilizers");
        }
        if self.ice.is_none() {
            missing.push("ice");
        }
        missing
    }

    /// Check required fields and clean the ingredient lines
    pub fn validate(self) -> Result<ValidProposal, AppError> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(AppError::IncompleteSuggestion(missing));
        }

        let ingredients = IngredientSetInput {
            dry_ingredients: self.dry_ingredients,
            wet_ingredients: self.wet_ingredients,
            stabilizers: self.stabilizers,
            ice: self.ice,
        }
        .into_set();

        Ok(ValidProposal {
            name: self.name.unwrap_or_default().trim().to_string(),
            ingredients,
            explanation: self.explanation.unwrap_or_default(),
        })
    }
}
