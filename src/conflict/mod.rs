// src/conflict/mod.rs
// Requirement pairing, prompting, parsing and the analysis modes built on them

pub mod analyzer;
pub mod pairs;
pub mod parser;
pub mod prompt;
pub mod record;
pub mod trainer;
pub mod weights;

pub use analyzer::{Analyzer, DedupSet, RunOutcome};
pub use pairs::{
    LabeledPair, PairRow, RequirementPair, baseline_pairs, canonical_key, exhaustive_pairs,
    incremental_pairs, normalize_pair_rows, unique_requirements,
};
pub use parser::{ParsedAnswer, parse};
pub use prompt::build_prompt;
pub use record::{ConflictRecord, INTERRUPTED_REASON, MANUAL_REVIEW, NO_CONFLICT, UNKNOWN};
pub use trainer::{IterationReport, PseudoTrainer, TrainingOutcome};
pub use weights::WeightHistogram;
