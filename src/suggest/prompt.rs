//! Prompt construction for batch suggestions

use crate::models::{Batch, IndexedContent};

use super::proposal::TOOL_NAME;

const PERSONA: &str = "You are an expert ice cream maker. Analyze the ingredients and notes from an ice cream batch and suggest improvements. Focus on:
1. Ingredient ratios and proportions
2. Addressing issues mentioned in notes
3. Maintaining or improving texture and flavor
4. Scientific explanations for changes

Please generate a creative and descriptive name for the new batch that reflects its key characteristics or improvements.";

/// System prompt: persona, optional grounding text and optional instructions
pub fn system_prompt(references: &[IndexedContent], instructions: Option<&str>) -> String {
    let mut prompt = String::from(PERSONA);

    if !references.is_empty() {
        prompt.push_str("\n\nUse this reference information when making suggestions:\n");
        for reference in references {
            prompt.push_str(&format!("Content from {}:\n{}\n\n", reference.url, reference.content));
        }
    }

    if let Some(instructions) = instructions.map(str::trim).filter(|i| !i.is_empty()) {
        prompt.push_str("\n\nSpecific instructions for this version:\n");
        prompt.push_str(instructions);
    }

    prompt.push_str(&format!(
        "\n\nUse the {} tool to implement your suggested changes.",
        TOOL_NAME
    ));
    prompt
}

/// User prompt: the source batch's ingredient lists and notes
pub fn user_prompt(batch: &Batch) -> Result<String, serde_json::Error> {
    let notes = batch
        .notes
        .iter()
        .map(|n| n.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    Ok(format!(
        "Current Batch:\n\
         Dry Ingredients: {}\n\
         Wet Ingredients: {}\n\
         Stabilizers: {}\n\
         Ice: {}\n\
         Notes: {}\n\n\
         Please analyze this batch and suggest improvements by modifying the ingredients.",
        serde_json::to_string(&batch.ingredients.dry_ingredients)?,
        serde_json::to_string(&batch.ingredients.wet_ingredients)?,
        serde_json::to_string(&batch.ingredients.stabilizers)?,
        serde_json::to_string(&batch.ingredients.ice)?,
        notes,
    ))
}
