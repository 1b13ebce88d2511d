// src/conflict/trainer.rs
// Pseudo-training: repeated labeled runs feeding a weight hint back into prompts

use super::analyzer::{Analyzer, DedupSet, RunOutcome};
use super::pairs::{LabeledPair, RequirementPair};
use super::record::ConflictRecord;
use super::weights::{PredictionMatch, WeightHistogram};
use crate::error::{ConflictError, Result};
use std::collections::HashMap;
use tracing::{info, warn};

/// Accuracy of one completed iteration
#[derive(Debug, Clone, PartialEq)]
pub struct IterationReport {
    pub iteration: usize,
    pub correct: usize,
    pub total: usize,
    pub accuracy: f64,
}

impl IterationReport {
    fn new(iteration: usize, correct: usize, total: usize) -> Self {
        let accuracy = if total == 0 {
            0.0
        } else {
            correct as f64 / total as f64
        };
        Self {
            iteration,
            correct,
            total,
            accuracy,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    /// Prediction table of the last completed iteration, expected labels attached
    pub predictions: Vec<ConflictRecord>,
    pub weights: WeightHistogram,
    pub reports: Vec<IterationReport>,
    pub interrupted: bool,
}

impl TrainingOutcome {
    pub fn accuracies(&self) -> Vec<f64> {
        self.reports.iter().map(|r| r.accuracy).collect()
    }
}

pub struct PseudoTrainer<'a> {
    analyzer: &'a Analyzer,
}

impl<'a> PseudoTrainer<'a> {
    pub fn new(analyzer: &'a Analyzer) -> Self {
        Self { analyzer }
    }

    /// Run `iterations` labeled passes over `labeled`.
    ///
    /// Each pass evaluates every pair sequentially with a fresh dedup set and
    /// the histogram as it stood when the pass began. Scores are applied after
    /// the pass. Its predictions become the next pass's expected labels, so
    /// later passes measure agreement with the previous pass.
    pub async fn train(&self, labeled: &[LabeledPair], iterations: usize) -> Result<TrainingOutcome> {
        if iterations == 0 {
            return Err(ConflictError::InvalidInput(
                "iteration count must be at least 1".to_string(),
            ));
        }

        let mut working: Vec<LabeledPair> = labeled.to_vec();
        let mut weights = WeightHistogram::new();
        let mut reports = Vec::with_capacity(iterations);
        let mut predictions: Vec<ConflictRecord> = Vec::new();

        for iteration in 1..=iterations {
            info!(iteration, pairs = working.len(), "Starting training iteration");

            let pairs: Vec<RequirementPair> = working.iter().map(|l| l.pair.clone()).collect();
            let outcome = self
                .analyzer
                .run_sequential(&pairs, &DedupSet::new(), Some(&weights))
                .await;

            let expected: HashMap<String, &LabeledPair> =
                working.iter().map(|l| (l.pair.key(), l)).collect();

            let (interrupted, records) = match outcome {
                RunOutcome::Completed(records) => (false, records),
                RunOutcome::Interrupted(records) => (true, records),
            };

            let labeled_records: Vec<ConflictRecord> = records
                .into_iter()
                .filter_map(|record| {
                    let label = expected.get(&record.key())?;
                    Some(record.with_expected(&label.expected_conflict, &label.expected_reason))
                })
                .collect();

            if interrupted {
                warn!(iteration, completed = reports.len(), "Training interrupted");
                if reports.is_empty() {
                    predictions = labeled_records;
                }
                return Ok(TrainingOutcome {
                    predictions,
                    weights,
                    reports,
                    interrupted: true,
                });
            }

            let mut correct = 0;
            for record in &labeled_records {
                let expected = record.expected_conflict.as_deref().unwrap_or_default();
                if weights.record_prediction(&record.conflict_type, expected) == PredictionMatch::Exact {
                    correct += 1;
                }
            }

            let report = IterationReport::new(iteration, correct, labeled_records.len());
            info!(
                iteration,
                correct = report.correct,
                total = report.total,
                accuracy = report.accuracy,
                labels = weights.len(),
                "Training iteration complete"
            );
            reports.push(report);

            working = labeled_records
                .iter()
                .filter_map(|record| {
                    let pair = RequirementPair::new(&record.requirement_1, &record.requirement_2)?;
                    Some(LabeledPair {
                        pair,
                        expected_conflict: record.conflict_type.clone(),
                        expected_reason: record.conflict_reason.clone(),
                    })
                })
                .collect();
            predictions = labeled_records;
        }

        Ok(TrainingOutcome {
            predictions,
            weights,
            reports,
            interrupted: false,
        })
    }
}
