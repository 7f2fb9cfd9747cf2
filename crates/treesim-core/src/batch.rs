//! Parallel pairwise comparison across a set of documents.
//!
//! # Overview
//!
//! [`BatchComparator`] takes a [`TreeSet`] (document identifier to tree) and a
//! list of identifier pairs, and scores every pair on a dedicated rayon
//! thread pool. Pairs are independent units of work: the trees are shared
//! read-only through [`Arc`], each worker returns its outcome, and the
//! coordinator assembles the [`PairwiseScores`] once all work is collected.
//!
//! Completion order is not deterministic; the resulting scores are.
//!
//! ## Failure isolation
//!
//! A pair whose identifier is unknown, whose scorer panics, or whose trees
//! exceed the depth limit is recorded as [`PairOutcome::Failed`]. The
//! remaining pairs still run.
//!
//! Scoring recurses once per tree level, and a stack overflow aborts the
//! process rather than unwinding, so `catch_unwind` cannot contain it. Trees
//! taller than [`BatchComparator::max_depth`] are therefore rejected before
//! scoring, and workers run on [`WORKER_STACK_SIZE`] stacks sized for the
//! largest accepted limit.
//!
//! ## Usage
//!
//! ```rust
//! use treesim_core::batch::{BatchComparator, NoopObserver, TreeSet};
//! use treesim_core::tree::Node;
//!
//! let mut trees = TreeSet::new();
//! trees.insert("a.md", Node::leaf("paragraph", "hello world"));
//! trees.insert("b.md", Node::leaf("paragraph", "hello word"));
//!
//! let comparator = BatchComparator::default();
//! let run = comparator.compare_all(&trees, &NoopObserver).expect("pool starts");
//! assert!(run.scores.score("b.md", "a.md").is_some());
//! ```

use std::collections::{BTreeMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{Config, DEFAULT_MAX_DEPTH, MaxWorkers};
use crate::engine::{MemoTable, SimilarityEngine};
use crate::error::{ErrorCode, Result};
use crate::scores::{PairOutcome, PairwiseScores};
use crate::tree::Node;

// ---------------------------------------------------------------------------
// TreeSet
// ---------------------------------------------------------------------------

/// Documents to compare, keyed by identifier (usually a canonical path).
#[derive(Debug, Clone, Default)]
pub struct TreeSet {
    trees: BTreeMap<String, Arc<Node>>,
}

impl TreeSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a document.
    pub fn insert(&mut self, id: impl Into<String>, tree: impl Into<Arc<Node>>) {
        self.trees.insert(id.into(), tree.into());
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Arc<Node>> {
        self.trees.get(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.trees.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    /// Identifiers in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.trees.keys().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<(S, Node)> for TreeSet {
    fn from_iter<I: IntoIterator<Item = (S, Node)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (id, tree) in iter {
            set.insert(id, tree);
        }
        set
    }
}

/// Stack size of each batch worker thread.
pub const WORKER_STACK_SIZE: usize = 32 * 1024 * 1024;

/// Every unordered 2-combination of `ids`, in input order.
///
/// `(a, b)` is produced once and never also as `(b, a)`.
#[must_use]
pub fn all_pairs<S: AsRef<str>>(ids: &[S]) -> Vec<(String, String)> {
    ids.iter()
        .enumerate()
        .flat_map(|(i, first)| {
            ids[i + 1..]
                .iter()
                .map(move |second| (first.as_ref().to_string(), second.as_ref().to_string()))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Scoring seam
// ---------------------------------------------------------------------------

/// Scores one pair of trees. Implementations must be pure.
pub trait PairScorer: Sync {
    /// Per-worker scratch state reused across the pairs one worker handles.
    type Scratch: Default + Send;

    fn score_pair(&self, a: &Node, b: &Node, scratch: &mut Self::Scratch) -> f64;
}

impl PairScorer for SimilarityEngine {
    type Scratch = MemoTable;

    fn score_pair(&self, a: &Node, b: &Node, memo: &mut MemoTable) -> f64 {
        if self.memoizes() {
            self.similarity_memoized(a, b, memo)
        } else {
            self.similarity(a, b)
        }
    }
}

// ---------------------------------------------------------------------------
// Progress and cancellation
// ---------------------------------------------------------------------------

/// Receives progress notifications from a batch run.
///
/// `on_pair_done` is called from worker threads as pairs finish, in
/// completion order; implementations must not block.
pub trait ProgressObserver: Send + Sync {
    fn on_start(&self, _total: usize) {}
    fn on_pair_done(&self, _completed: usize, _total: usize) {}
    fn on_finish(&self, _summary: &BatchSummary) {}
}

/// Observer that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {}

/// Shared flag that stops a batch from starting further pairs.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// BatchComparator
// ---------------------------------------------------------------------------

/// Counters for one batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    /// Distinct pairs requested.
    pub total: usize,
    /// Submitted pairs dropped because the same unordered pair came earlier.
    pub duplicates: usize,
    /// Pairs that produced an outcome, failed ones included.
    pub completed: usize,
    /// Pairs recorded as failed.
    pub failed: usize,
    /// Pairs never started because the run was cancelled.
    pub skipped: usize,
    pub cancelled: bool,
    pub workers: usize,
    pub elapsed: Duration,
}

/// Outcome of [`BatchComparator::compare`].
#[derive(Debug, Clone)]
pub struct BatchRun {
    pub scores: PairwiseScores,
    pub summary: BatchSummary,
}

/// Runs a [`PairScorer`] over many document pairs in parallel.
#[derive(Debug, Clone)]
pub struct BatchComparator<S = SimilarityEngine> {
    scorer: S,
    workers: MaxWorkers,
    max_depth: usize,
    cancel: Option<CancelToken>,
}

impl Default for BatchComparator {
    fn default() -> Self {
        Self::new(SimilarityEngine::default())
    }
}

impl BatchComparator {
    /// Engine weights, depth limit, worker count and memoization from
    /// `config`.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let engine = SimilarityEngine::from_config(&config.engine)
            .with_memoization(config.batch.memoize);
        Self::new(engine)
            .with_workers(config.batch.max_workers)
            .with_max_depth(config.engine.max_depth)
    }
}

impl<S: PairScorer> BatchComparator<S> {
    #[must_use]
    pub fn new(scorer: S) -> Self {
        Self {
            scorer,
            workers: MaxWorkers::default(),
            max_depth: DEFAULT_MAX_DEPTH,
            cancel: None,
        }
    }

    #[must_use]
    pub const fn with_workers(mut self, workers: MaxWorkers) -> Self {
        self.workers = workers;
        self
    }

    /// Pairs with a tree taller than `max_depth` fail instead of scoring.
    #[must_use]
    pub const fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    #[must_use]
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    #[must_use]
    pub const fn scorer(&self) -> &S {
        &self.scorer
    }

    #[must_use]
    pub const fn workers(&self) -> MaxWorkers {
        self.workers
    }

    #[must_use]
    pub const fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Compare every unordered pair of documents in `trees`.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker pool cannot be started.
    pub fn compare_all(&self, trees: &TreeSet, observer: &dyn ProgressObserver) -> Result<BatchRun> {
        let ids: Vec<&str> = trees.ids().collect();
        self.compare(trees, &all_pairs(&ids), observer)
    }

    /// Compare exactly the requested pairs.
    ///
    /// Result keys are the submitted `(first, second)` tuples. A pair
    /// submitted again, in the same or the mirrored orientation, is compared
    /// once under its first orientation and counted in
    /// [`BatchSummary::duplicates`].
    ///
    /// # Errors
    ///
    /// Returns an error if the worker pool cannot be started. Individual
    /// comparisons never fail the batch.
    #[instrument(skip_all, fields(pairs = pairs.len(), documents = trees.len()))]
    pub fn compare(
        &self,
        trees: &TreeSet,
        pairs: &[(String, String)],
        observer: &dyn ProgressObserver,
    ) -> Result<BatchRun> {
        let workers = self.workers.resolve();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|index| format!("treesim-worker-{index}"))
            .stack_size(WORKER_STACK_SIZE)
            .build()?;

        let mut seen = HashSet::with_capacity(pairs.len());
        let unique: Vec<&(String, String)> = pairs
            .iter()
            .filter(|(first, second)| seen.insert(unordered(first, second)))
            .collect();
        let duplicates = pairs.len() - unique.len();
        if duplicates > 0 {
            debug!(duplicates, "dropped repeated pairs");
        }

        let total = unique.len();
        let completed = AtomicUsize::new(0);
        let started = Instant::now();
        info!(total, workers, "comparing document pairs");
        observer.on_start(total);

        let outcomes: Vec<Option<PairOutcome>> = pool.install(|| {
            unique
                .par_iter()
                .map_init(S::Scratch::default, |scratch, (first, second)| {
                    if self.is_cancelled() {
                        return None;
                    }
                    let outcome = self.compare_pair(trees, first, second, scratch);
                    let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                    observer.on_pair_done(done, total);
                    Some(outcome)
                })
                .collect()
        });

        let mut scores = PairwiseScores::new();
        let mut summary = BatchSummary {
            total,
            duplicates,
            completed: 0,
            failed: 0,
            skipped: 0,
            cancelled: self.is_cancelled(),
            workers,
            elapsed: Duration::ZERO,
        };
        for ((first, second), outcome) in unique.into_iter().zip(outcomes) {
            match outcome {
                Some(outcome) => {
                    summary.completed += 1;
                    if outcome.is_failed() {
                        summary.failed += 1;
                    }
                    scores.insert(first.as_str(), second.as_str(), outcome);
                }
                None => summary.skipped += 1,
            }
        }
        summary.elapsed = started.elapsed();

        info!(
            completed = summary.completed,
            failed = summary.failed,
            skipped = summary.skipped,
            elapsed_ms = summary.elapsed.as_millis(),
            "batch finished"
        );
        observer.on_finish(&summary);

        Ok(BatchRun { scores, summary })
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    fn compare_pair(
        &self,
        trees: &TreeSet,
        first: &str,
        second: &str,
        scratch: &mut S::Scratch,
    ) -> PairOutcome {
        let (left, right) = match (trees.get(first), trees.get(second)) {
            (Some(left), Some(right)) => (left, right),
            (None, _) => return unknown_document(first, second, first),
            (_, None) => return unknown_document(first, second, second),
        };

        for (id, tree) in [(first, left), (second, right)] {
            if tree.depth() > self.max_depth {
                warn!(
                    first,
                    second,
                    document = id,
                    depth = tree.depth(),
                    max_depth = self.max_depth,
                    code = %ErrorCode::ComparisonFailed,
                    "tree too deep to compare"
                );
                return PairOutcome::Failed(format!(
                    "tree too deep: {id} has depth {}, limit is {}",
                    tree.depth(),
                    self.max_depth
                ));
            }
        }

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.scorer.score_pair(left, right, scratch)
        }));

        match result {
            Ok(score) => {
                debug!(first, second, score, "pair scored");
                PairOutcome::Score(score)
            }
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                error!(
                    first,
                    second,
                    reason = %reason,
                    code = %ErrorCode::ComparisonFailed,
                    "comparison panicked"
                );
                PairOutcome::Failed(format!("comparison panicked: {reason}"))
            }
        }
    }
}

/// Order-independent key of a pair.
fn unordered<'a>(first: &'a str, second: &'a str) -> (&'a str, &'a str) {
    if first <= second {
        (first, second)
    } else {
        (second, first)
    }
}

fn unknown_document(first: &str, second: &str, missing: &str) -> PairOutcome {
    warn!(
        first,
        second,
        missing,
        code = %ErrorCode::ComparisonFailed,
        "pair references an unknown document"
    );
    PairOutcome::Failed(format!("unknown document: {missing}"))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
