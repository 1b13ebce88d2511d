// src/conflict/analyzer.rs
// Conflict analyzer: drives pair evaluation in baseline, exhaustive and
// incremental modes.
//
// Exhaustive mode keeps `workers` spawned tasks in flight and gates the
// network call behind a separate semaphore of `max_in_flight` permits. The
// collection loop below is the only writer of the result table.

use super::pairs::{RequirementPair, baseline_pairs, exhaustive_pairs, incremental_pairs};
use super::parser::parse;
use super::prompt::build_prompt;
use super::record::{ConflictRecord, NO_CONFLICT};
use super::weights::WeightHistogram;
use crate::config::AnalysisConfig;
use crate::llm::cache::CachedInference;
use crate::llm::client::InferenceFailure;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Canonical pair keys already evaluated. Share one set across several
/// runs to avoid re-querying pairs.
#[derive(Debug, Default)]
pub struct DedupSet {
    keys: Mutex<HashSet<String>>,
}

impl DedupSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the key was not present
    pub fn insert(&self, key: String) -> bool {
        self.keys.lock().unwrap_or_else(|e| e.into_inner()).insert(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.lock().unwrap_or_else(|e| e.into_inner()).contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// How a run ended, with the records collected either way
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed(Vec<ConflictRecord>),
    Interrupted(Vec<ConflictRecord>),
}

impl RunOutcome {
    pub fn records(&self) -> &[ConflictRecord] {
        match self {
            Self::Completed(records) | Self::Interrupted(records) => records,
        }
    }

    pub fn into_records(self) -> Vec<ConflictRecord> {
        match self {
            Self::Completed(records) | Self::Interrupted(records) => records,
        }
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted(_))
    }

    fn map_records(self, f: impl FnOnce(Vec<ConflictRecord>) -> Vec<ConflictRecord>) -> Self {
        match self {
            Self::Completed(records) => Self::Completed(f(records)),
            Self::Interrupted(records) => Self::Interrupted(f(records)),
        }
    }
}

/// What a single evaluation task hands back to the collector
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Evaluated { key: String, record: ConflictRecord },
    Interrupted { key: String, record: ConflictRecord },
}

/// Per-run counters, logged at the end of each run
#[derive(Debug, Default)]
struct RunStats {
    evaluated: usize,
    skipped: usize,
    duplicates: usize,
    failed_tasks: usize,
}

pub struct Analyzer {
    inference: Arc<CachedInference>,
    config: AnalysisConfig,
    cancel: CancellationToken,
}

impl Analyzer {
    pub fn new(inference: Arc<CachedInference>, config: AnalysisConfig, cancel: CancellationToken) -> Self {
        Self {
            inference,
            config,
            cancel,
        }
    }

    pub fn inference(&self) -> &Arc<CachedInference> {
        &self.inference
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Baseline mode: the first requirement against each of the others, sequentially
    pub async fn run_baseline(&self, requirements: &[String], dedup: &DedupSet) -> RunOutcome {
        let pairs = baseline_pairs(requirements);
        info!(requirements = requirements.len(), pairs = pairs.len(), "Starting baseline run");
        self.run_sequential(&pairs, dedup, None).await
    }

    /// Exhaustive mode: all C(n, 2) pairs, concurrently. Weights from a
    /// training run, when given, are appended to every prompt as a hint.
    pub async fn run_exhaustive(
        &self,
        requirements: &[String],
        dedup: &DedupSet,
        weights: Option<&WeightHistogram>,
    ) -> RunOutcome {
        let pairs = exhaustive_pairs(requirements);
        info!(
            requirements = requirements.len(),
            pairs = pairs.len(),
            weighted = weights.is_some_and(|w| !w.is_empty()),
            "Starting exhaustive run"
        );
        self.run_concurrent(pairs, dedup, weights).await
    }

    /// Incremental mode: one new requirement against the existing ones.
    /// Only pairs that resolve to something other than "No Conflict" are kept.
    pub async fn run_incremental(
        &self,
        new_requirement: &str,
        existing: &[String],
        dedup: &DedupSet,
        weights: Option<&WeightHistogram>,
    ) -> RunOutcome {
        let pairs = incremental_pairs(new_requirement, existing);
        info!(existing = existing.len(), pairs = pairs.len(), "Checking new requirement");
        self.run_sequential(&pairs, dedup, weights)
            .await
            .map_records(|records| {
                records
                    .into_iter()
                    .filter(|r| r.conflict_type != NO_CONFLICT)
                    .collect()
            })
    }

    /// Evaluate `pairs` one at a time in the given order, pausing
    /// `request_delay` between calls.
    pub async fn run_sequential(
        &self,
        pairs: &[RequirementPair],
        dedup: &DedupSet,
        weights: Option<&WeightHistogram>,
    ) -> RunOutcome {
        let start = Instant::now();
        let mut stats = RunStats::default();
        let mut records = Vec::with_capacity(pairs.len());

        for pair in pairs {
            let key = pair.key();
            if dedup.contains(&key) {
                stats.skipped += 1;
                continue;
            }

            if stats.evaluated > 0 && !self.pause(self.config.request_delay).await {
                return self.finish("sequential", stats, start, records, true);
            }

            let prompt = build_prompt(pair, weights);
            match evaluate(&self.inference, &self.cancel, pair, &prompt).await {
                TaskOutcome::Evaluated { key, record } => {
                    stats.evaluated += 1;
                    if dedup.insert(key) {
                        records.push(record);
                    } else {
                        stats.duplicates += 1;
                    }
                }
                TaskOutcome::Interrupted { .. } => {
                    return self.finish("sequential", stats, start, records, true);
                }
            }
        }

        self.finish("sequential", stats, start, records, false)
    }

    /// Evaluate `pairs` with a bounded worker pool. Completions are collected
    /// in arrival order; each canonical key is appended at most once.
    pub async fn run_concurrent(
        &self,
        pairs: Vec<RequirementPair>,
        dedup: &DedupSet,
        weights: Option<&WeightHistogram>,
    ) -> RunOutcome {
        let start = Instant::now();
        let mut stats = RunStats::default();
        let workers = self.config.workers.max(1);
        let gate = Arc::new(Semaphore::new(self.config.max_in_flight.max(1)));

        let total = pairs.len();
        let mut submitted = HashSet::new();
        let pending: Vec<RequirementPair> = pairs
            .into_iter()
            .filter(|pair| {
                let key = pair.key();
                !dedup.contains(&key) && submitted.insert(key)
            })
            .collect();
        stats.skipped = total - pending.len();
        let mut queue = pending.into_iter();

        let mut in_flight = FuturesUnordered::new();
        let mut records = Vec::new();

        for _ in 0..workers {
            let Some(pair) = queue.next() else { break };
            in_flight.push(self.spawn_task(pair, gate.clone(), weights));
        }

        let mut interrupted = false;
        while let Some(joined) = in_flight.next().await {
            match joined {
                Ok(TaskOutcome::Evaluated { key, record }) => {
                    stats.evaluated += 1;
                    if dedup.insert(key) {
                        records.push(record);
                    } else {
                        stats.duplicates += 1;
                    }
                }
                Ok(TaskOutcome::Interrupted { key, .. }) => {
                    debug!(key = %key, "Task interrupted before inference");
                    interrupted = true;
                }
                Err(e) => {
                    warn!(error = %e, "Evaluation task failed");
                    stats.failed_tasks += 1;
                }
            }

            if self.cancel.is_cancelled() {
                // Drain what is already running, submit nothing new
                interrupted = true;
                continue;
            }
            if let Some(pair) = queue.next() {
                in_flight.push(self.spawn_task(pair, gate.clone(), weights));
            }
        }

        let interrupted = interrupted || self.cancel.is_cancelled();
        self.finish("exhaustive", stats, start, records, interrupted)
    }

    fn spawn_task(
        &self,
        pair: RequirementPair,
        gate: Arc<Semaphore>,
        weights: Option<&WeightHistogram>,
    ) -> tokio::task::JoinHandle<TaskOutcome> {
        let inference = self.inference.clone();
        let cancel = self.cancel.clone();
        let prompt = build_prompt(&pair, weights);
        tokio::spawn(async move { gated_evaluate(inference, gate, cancel, pair, prompt).await })
    }

    /// Sleep for `delay` unless cancelled first. Returns false on cancellation.
    async fn pause(&self, delay: Duration) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        if delay.is_zero() {
            return true;
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    fn finish(
        &self,
        mode: &str,
        stats: RunStats,
        start: Instant,
        records: Vec<ConflictRecord>,
        interrupted: bool,
    ) -> RunOutcome {
        let conflicts = records.iter().filter(|r| r.is_conflict()).count();
        let unknown = records.iter().filter(|r| r.is_unknown()).count();
        let cache = self.inference.stats();
        info!(
            mode,
            evaluated = stats.evaluated,
            recorded = records.len(),
            skipped = stats.skipped,
            duplicates = stats.duplicates,
            failed_tasks = stats.failed_tasks,
            conflicts,
            unknown,
            cache_hits = cache.hits,
            cache_misses = cache.misses,
            duration_ms = start.elapsed().as_millis() as u64,
            interrupted,
            "Analysis run finished"
        );

        if interrupted {
            warn!(records = records.len(), "Run interrupted by user, returning partial results");
            RunOutcome::Interrupted(records)
        } else {
            RunOutcome::Completed(records)
        }
    }
}

/// One exhaustive-mode task. Cancellation is checked before the gate so
/// queued work aborts without waiting for a permit.
pub async fn gated_evaluate(
    inference: Arc<CachedInference>,
    gate: Arc<Semaphore>,
    cancel: CancellationToken,
    pair: RequirementPair,
    prompt: String,
) -> TaskOutcome {
    if cancel.is_cancelled() {
        return interrupted(&pair);
    }

    let _permit = tokio::select! {
        biased;
        _ = cancel.cancelled() => return interrupted(&pair),
        permit = gate.acquire_owned() => match permit {
            Ok(permit) => permit,
            Err(_) => return interrupted(&pair),
        },
    };

    evaluate(&inference, &cancel, &pair, &prompt).await
}

/// Check cancellation, call the cached client, parse the answer
async fn evaluate(
    inference: &CachedInference,
    cancel: &CancellationToken,
    pair: &RequirementPair,
    prompt: &str,
) -> TaskOutcome {
    if cancel.is_cancelled() {
        return interrupted(pair);
    }

    let raw = match inference.infer(prompt, cancel).await {
        Ok(text) => text,
        Err(InferenceFailure::Interrupted) => return interrupted(pair),
        Err(failure) => {
            debug!(key = %pair.key(), failure = %failure, "Inference failed, marking for review");
            failure.marker()
        }
    };

    let (conflict_type, conflict_reason, _note) = parse(&raw).into_fields();
    TaskOutcome::Evaluated {
        key: pair.key(),
        record: ConflictRecord::new(pair, conflict_type, conflict_reason),
    }
}

fn interrupted(pair: &RequirementPair) -> TaskOutcome {
    TaskOutcome::Interrupted {
        key: pair.key(),
        record: ConflictRecord::interrupted(pair),
    }
}
