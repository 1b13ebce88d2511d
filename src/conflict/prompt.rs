// src/conflict/prompt.rs
// Prompt template for pairwise conflict classification

use super::pairs::RequirementPair;
use super::weights::WeightHistogram;

/// Example labels offered to the model; the vocabulary stays open
pub const SUGGESTED_TYPES: &[&str] = &[
    "Performance Conflict",
    "Compliance Conflict",
    "Safety Conflict",
    "Cost Conflict",
    "Battery Conflict",
    "Environmental Conflict",
    "Structural Conflict",
    "Comfort Conflict",
    "Power Source Conflict",
    "Design Conflict",
    "Material Conflict",
    "Technology Conflict",
];

/// Build the prompt for one pair. A non-empty histogram is appended as a
/// frequency hint, so prompts (and cache keys) change as weights change.
pub fn build_prompt(pair: &RequirementPair, weights: Option<&WeightHistogram>) -> String {
    let mut prompt = format!(
        "You are a requirements engineer. Decide whether the following two product \
         requirements conflict with each other.\n\
         Requirement 1: {}\n\
         Requirement 2: {}\n\n\
         Typical conflict types include: {}. Use another short label ending in \
         \"Conflict\" if none fits, or \"No Conflict\" if the requirements are compatible.\n\
         Answer on a single line in exactly this format:\n\
         Conflict_Type: <type>||Reason: <one sentence reason>",
        pair.first(),
        pair.second(),
        SUGGESTED_TYPES.join(", ")
    );

    if let Some(hint) = weights.and_then(render_weight_hint) {
        prompt.push_str("\n\n");
        prompt.push_str(&hint);
    }

    prompt
}

/// `Conflict types confirmed in earlier rounds (highest weight first): A (weight: 2.00), B (weight: 0.50)`
pub fn render_weight_hint(weights: &WeightHistogram) -> Option<String> {
    if weights.is_empty() {
        return None;
    }
    let entries: Vec<String> = weights
        .ranked()
        .into_iter()
        .map(|(label, weight)| format!("{} (weight: {:.2})", label, weight))
        .collect();
    Some(format!(
        "Conflict types confirmed in earlier rounds (highest weight first): {}",
        entries.join(", ")
    ))
}
