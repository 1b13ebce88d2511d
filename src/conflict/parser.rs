// src/conflict/parser.rs
// Output grammar: "Conflict_Type: <type>||Reason: <reason>"
//
// The model does not always follow the grammar. Anything that cannot be read
// degrades to the Unknown / manual-review sentinel, never to an error.

use super::record::{MANUAL_REVIEW, UNKNOWN};
use crate::llm::client::is_failure_marker;

const TYPE_PREFIX: &str = "Conflict_Type:";
const REASON_PREFIX: &str = "Reason:";
const SEGMENT_DELIMITER: &str = "||";
const FALLBACK_SEPARATOR: &str = ": ";

/// Third column of the parser triple; always this value
pub const NOTE_NOT_APPLICABLE: &str = "Not applicable";

/// Typed parse result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedAnswer {
    Conflict { conflict_type: String, reason: String },
    Unparseable,
}

impl ParsedAnswer {
    fn conflict(conflict_type: &str, reason: &str) -> Self {
        Self::Conflict {
            conflict_type: conflict_type.to_string(),
            reason: reason.to_string(),
        }
    }

    /// `(conflict_type, conflict_reason, note)`
    pub fn into_fields(self) -> (String, String, String) {
        match self {
            Self::Conflict { conflict_type, reason } => {
                (conflict_type, reason, NOTE_NOT_APPLICABLE.to_string())
            }
            Self::Unparseable => (
                UNKNOWN.to_string(),
                MANUAL_REVIEW.to_string(),
                NOTE_NOT_APPLICABLE.to_string(),
            ),
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Parse raw model output (or a failure marker)
pub fn parse(raw: &str) -> ParsedAnswer {
    let text = raw.trim();
    if text.is_empty() || is_failure_marker(text) {
        return ParsedAnswer::Unparseable;
    }

    if text.contains(SEGMENT_DELIMITER) {
        return parse_delimited(text);
    }

    if let Some((conflict_type, reason)) = text.split_once(FALLBACK_SEPARATOR) {
        let (conflict_type, reason) = (conflict_type.trim(), reason.trim());
        if conflict_type.is_empty() || reason.is_empty() {
            return ParsedAnswer::Unparseable;
        }
        return ParsedAnswer::conflict(conflict_type, reason);
    }

    ParsedAnswer::Unparseable
}

fn parse_delimited(text: &str) -> ParsedAnswer {
    let segments: Vec<&str> = text
        .split(SEGMENT_DELIMITER)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    let [type_segment, reason_segment, ..] = segments.as_slice() else {
        return ParsedAnswer::Unparseable;
    };

    let Some(conflict_type) = type_segment.strip_prefix(TYPE_PREFIX).map(str::trim) else {
        return ParsedAnswer::Unparseable;
    };
    if conflict_type.is_empty() {
        return ParsedAnswer::Unparseable;
    }

    let reason = reason_segment
        .strip_prefix(REASON_PREFIX)
        .map(str::trim)
        .unwrap_or(*reason_segment);

    ParsedAnswer::conflict(conflict_type, reason)
}
