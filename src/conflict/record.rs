// src/conflict/record.rs
// Conflict records produced by evaluating one requirement pair

use super::pairs::RequirementPair;
use serde::{Deserialize, Serialize};

/// Parsed label meaning the model found the requirements compatible
pub const NO_CONFLICT: &str = "No Conflict";

/// Label used whenever no usable answer was obtained
pub const UNKNOWN: &str = "Unknown";

/// Reason paired with [`UNKNOWN`]
pub const MANUAL_REVIEW: &str = "Requires manual review";

/// Reason carried by records of pairs skipped after cancellation
pub const INTERRUPTED_REASON: &str = "Interrupted by user";

/// Result of evaluating one canonical pair. Field names on the wire match
/// the tabular column headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRecord {
    #[serde(rename = "Requirement_1")]
    pub requirement_1: String,
    #[serde(rename = "Requirement_2")]
    pub requirement_2: String,
    #[serde(rename = "Conflict_Type")]
    pub conflict_type: String,
    #[serde(rename = "Conflict_Reason")]
    pub conflict_reason: String,
    #[serde(rename = "Expected_Conflict", default, skip_serializing_if = "Option::is_none")]
    pub expected_conflict: Option<String>,
    #[serde(rename = "Expected_Reason", default, skip_serializing_if = "Option::is_none")]
    pub expected_reason: Option<String>,
}

impl ConflictRecord {
    pub fn new(
        pair: &RequirementPair,
        conflict_type: impl Into<String>,
        conflict_reason: impl Into<String>,
    ) -> Self {
        Self {
            requirement_1: pair.first().to_string(),
            requirement_2: pair.second().to_string(),
            conflict_type: conflict_type.into(),
            conflict_reason: conflict_reason.into(),
            expected_conflict: None,
            expected_reason: None,
        }
    }

    /// Placeholder for a pair whose evaluation was cancelled
    pub fn interrupted(pair: &RequirementPair) -> Self {
        Self::new(pair, UNKNOWN, INTERRUPTED_REASON)
    }

    /// Attach ground-truth labels
    pub fn with_expected(mut self, conflict: impl Into<String>, reason: impl Into<String>) -> Self {
        self.expected_conflict = Some(conflict.into());
        self.expected_reason = Some(reason.into());
        self
    }

    /// Canonical pair key of this record
    pub fn key(&self) -> String {
        super::pairs::canonical_key(&self.requirement_1, &self.requirement_2)
    }

    /// The model reported an actual conflict (not "No Conflict", not "Unknown")
    pub fn is_conflict(&self) -> bool {
        self.conflict_type != NO_CONFLICT && self.conflict_type != UNKNOWN
    }

    pub fn is_unknown(&self) -> bool {
        self.conflict_type == UNKNOWN
    }

    pub fn has_expected(&self) -> bool {
        self.expected_conflict.is_some()
    }
}
