// src/conflict/pairs.rs
// Canonical, duplicate-free requirement pair generation

use super::record::UNKNOWN;
use std::collections::HashSet;

/// Separator joining the two sorted texts of a canonical key
pub const KEY_SEPARATOR: &str = "||";

/// Unordered pair of distinct requirements, stored in lexicographic order
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequirementPair {
    first: String,
    second: String,
}

impl RequirementPair {
    /// Build a canonical pair. Returns `None` for `(A, A)` or an empty side.
    pub fn new(a: impl AsRef<str>, b: impl AsRef<str>) -> Option<Self> {
        let a = a.as_ref().trim();
        let b = b.as_ref().trim();
        if a.is_empty() || b.is_empty() || a == b {
            return None;
        }
        let (first, second) = canonicalize(a, b);
        Some(Self {
            first: first.to_string(),
            second: second.to_string(),
        })
    }

    pub fn first(&self) -> &str {
        &self.first
    }

    pub fn second(&self) -> &str {
        &self.second
    }

    pub fn key(&self) -> String {
        format!("{}{}{}", self.first, KEY_SEPARATOR, self.second)
    }
}

/// Sort two texts so `(a, b)` and `(b, a)` give the same order
pub fn canonicalize<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b { (a, b) } else { (b, a) }
}

/// `A||B` with A <= B
pub fn canonical_key(a: &str, b: &str) -> String {
    let (first, second) = canonicalize(a.trim(), b.trim());
    format!("{}{}{}", first, KEY_SEPARATOR, second)
}

/// Trim, drop empties, and de-duplicate preserving first-seen order
pub fn unique_requirements<I, S>(requirements: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    for req in requirements {
        let text = req.as_ref().trim();
        if !text.is_empty() && seen.insert(text.to_string()) {
            unique.push(text.to_string());
        }
    }
    unique
}

/// All C(n, 2) combinations of the unique requirements
pub fn exhaustive_pairs<S: AsRef<str>>(requirements: &[S]) -> Vec<RequirementPair> {
    let unique = unique_requirements(requirements);
    let mut pairs = Vec::with_capacity(unique.len() * unique.len().saturating_sub(1) / 2);
    for (i, a) in unique.iter().enumerate() {
        for b in &unique[i + 1..] {
            pairs.extend(RequirementPair::new(a, b));
        }
    }
    pairs
}

/// The first requirement paired against each of the others (n - 1 pairs)
pub fn baseline_pairs<S: AsRef<str>>(requirements: &[S]) -> Vec<RequirementPair> {
    let unique = unique_requirements(requirements);
    let Some((baseline, rest)) = unique.split_first() else {
        return Vec::new();
    };
    rest.iter()
        .filter_map(|other| RequirementPair::new(baseline, other))
        .collect()
}

/// A new requirement paired against every distinct existing one, in input order
pub fn incremental_pairs<S: AsRef<str>>(new_requirement: &str, existing: &[S]) -> Vec<RequirementPair> {
    unique_requirements(existing)
        .iter()
        .filter_map(|other| RequirementPair::new(new_requirement, other))
        .collect()
}

/// One row of a pre-paired input table, as read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairRow {
    pub requirement_1: String,
    pub requirement_2: String,
    pub conflict_type: Option<String>,
    pub conflict_reason: Option<String>,
}

impl PairRow {
    pub fn new(requirement_1: impl Into<String>, requirement_2: impl Into<String>) -> Self {
        Self {
            requirement_1: requirement_1.into(),
            requirement_2: requirement_2.into(),
            conflict_type: None,
            conflict_reason: None,
        }
    }

    pub fn labeled(mut self, conflict_type: impl Into<String>, conflict_reason: impl Into<String>) -> Self {
        self.conflict_type = Some(conflict_type.into());
        self.conflict_reason = Some(conflict_reason.into());
        self
    }
}

/// Canonical pair plus the ground-truth labels it came with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledPair {
    pub pair: RequirementPair,
    pub expected_conflict: String,
    pub expected_reason: String,
}

/// Canonicalize every row and keep the first occurrence of each key.
/// Missing labels default to "Unknown" / "".
pub fn normalize_pair_rows(rows: &[PairRow]) -> Vec<LabeledPair> {
    let mut seen = HashSet::new();
    let mut labeled = Vec::new();
    for row in rows {
        let Some(pair) = RequirementPair::new(&row.requirement_1, &row.requirement_2) else {
            continue;
        };
        if !seen.insert(pair.key()) {
            continue;
        }
        let expected_conflict = row
            .conflict_type
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(UNKNOWN)
            .to_string();
        let expected_reason = row
            .conflict_reason
            .as_deref()
            .map(str::trim)
            .unwrap_or("")
            .to_string();
        labeled.push(LabeledPair {
            pair,
            expected_conflict,
            expected_reason,
        });
    }
    labeled
}
