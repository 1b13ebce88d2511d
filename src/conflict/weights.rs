// src/conflict/weights.rs
// Conflict type weight histogram for the pseudo-training loop

use super::record::UNKNOWN;
use serde::Serialize;
use std::collections::BTreeMap;

/// Score added to the expected label on an exact match
pub const MATCH_WEIGHT: f64 = 1.0;

/// Score added to the predicted label when it is recognized but wrong
pub const MISMATCH_WEIGHT: f64 = 0.5;

/// How one prediction compared to its label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictionMatch {
    Exact,
    Mismatch,
    Unrecognized,
}

/// Accumulating, non-negative score per conflict type
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct WeightHistogram {
    weights: BTreeMap<String, f64>,
}

impl WeightHistogram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, label: &str, amount: f64) {
        if amount <= 0.0 || label.trim().is_empty() {
            return;
        }
        *self.weights.entry(label.trim().to_string()).or_insert(0.0) += amount;
    }

    pub fn get(&self, label: &str) -> f64 {
        self.weights.get(label).copied().unwrap_or(0.0)
    }

    /// Score one prediction against its expected label
    pub fn record_prediction(&mut self, predicted: &str, expected: &str) -> PredictionMatch {
        let predicted = predicted.trim();
        if predicted == expected.trim() {
            self.add(predicted, MATCH_WEIGHT);
            PredictionMatch::Exact
        } else if !predicted.is_empty() && predicted != UNKNOWN {
            self.add(predicted, MISMATCH_WEIGHT);
            PredictionMatch::Mismatch
        } else {
            PredictionMatch::Unrecognized
        }
    }

    /// Labels by descending weight, ties broken alphabetically
    pub fn ranked(&self) -> Vec<(&str, f64)> {
        let mut ranked: Vec<(&str, f64)> = self
            .weights
            .iter()
            .map(|(label, weight)| (label.as_str(), *weight))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }
}
