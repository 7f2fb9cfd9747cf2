//! Recursive node similarity and ordered child alignment.
//!
//! # Scoring
//!
//! For two nodes `a` and `b`:
//!
//! 1. An absent or malformed node (empty kind label) scores `0.0`.
//! 2. Different kinds score `0.0`; there is no partial credit.
//! 3. `text_sim` is `1.0` when either node is filtered, otherwise the
//!    symmetric matching-block ratio of the two texts.
//! 4. `child_sim` is the best order-preserving alignment of the two child
//!    sequences, see [`SimilarityEngine::align_children`].
//! 5. The score is `text_weight * text_sim + structure_weight * child_sim`.
//!
//! The weights are used as configured; they are not renormalized.
//!
//! # Alignment
//!
//! Child alignment is a weighted longest-common-subsequence:
//!
//! ```text
//! dp[i][j] = max(dp[i-1][j], dp[i][j-1], dp[i-1][j-1] + similarity(A[i], B[j]))
//! ```
//!
//! normalized by the longer sequence. Every cell recurses into a full node
//! comparison, so cost and stack use grow with tree depth. The engine does not
//! limit depth itself; [`crate::batch::BatchComparator`] rejects trees taller
//! than its configured `max_depth` before scoring. A
//! [`MemoTable`] keyed by subtree fingerprints can be threaded through to reuse
//! scores for repeated subtree shapes without changing any result.

use std::collections::HashMap;

use crate::config::EngineConfig;
use crate::ratio::text_similarity;
use crate::tree::{Fingerprint, Node, Text};

/// Relative weights of the text and structure components.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights {
    pub text: f64,
    pub structure: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            text: 0.4,
            structure: 0.6,
        }
    }
}

/// Scores already computed for pairs of subtree fingerprints.
///
/// Keys are stored in ascending fingerprint order; node similarity is exactly
/// symmetric, so `(a, b)` and `(b, a)` share one entry.
#[derive(Debug, Default)]
pub struct MemoTable {
    scores: HashMap<(Fingerprint, Fingerprint), f64>,
    hits: u64,
}

impl MemoTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Number of lookups answered from the table.
    #[must_use]
    pub const fn hits(&self) -> u64 {
        self.hits
    }

    fn key(a: &Node, b: &Node) -> (Fingerprint, Fingerprint) {
        let (fa, fb) = (a.fingerprint(), b.fingerprint());
        if fa <= fb { (fa, fb) } else { (fb, fa) }
    }

    fn get(&mut self, a: &Node, b: &Node) -> Option<f64> {
        let score = self.scores.get(&Self::key(a, b)).copied();
        if score.is_some() {
            self.hits += 1;
        }
        score
    }

    fn insert(&mut self, a: &Node, b: &Node, score: f64) {
        self.scores.insert(Self::key(a, b), score);
    }
}

/// Compares normalized trees.
#[derive(Debug, Clone, Default)]
pub struct SimilarityEngine {
    weights: Weights,
    memoize: bool,
}

impl SimilarityEngine {
    #[must_use]
    pub const fn new(weights: Weights) -> Self {
        Self {
            weights,
            memoize: false,
        }
    }

    #[must_use]
    pub const fn from_config(config: &EngineConfig) -> Self {
        Self::new(Weights {
            text: config.text_weight,
            structure: config.structure_weight,
        })
    }

    /// Reuse subtree scores within a batch worker. Output is unchanged.
    #[must_use]
    pub const fn with_memoization(mut self, memoize: bool) -> Self {
        self.memoize = memoize;
        self
    }

    #[must_use]
    pub const fn weights(&self) -> Weights {
        self.weights
    }

    #[must_use]
    pub const fn memoizes(&self) -> bool {
        self.memoize
    }

    /// Similarity of two trees in `[0, 1]` for weights summing to at most 1.
    #[must_use]
    pub fn similarity(&self, a: &Node, b: &Node) -> f64 {
        self.score(a, b, None)
    }

    /// Like [`similarity`](Self::similarity); an absent side scores `0.0`.
    #[must_use]
    pub fn similarity_opt(&self, a: Option<&Node>, b: Option<&Node>) -> f64 {
        match (a, b) {
            (Some(a), Some(b)) => self.similarity(a, b),
            _ => 0.0,
        }
    }

    /// [`similarity`](Self::similarity) reusing and filling `memo`.
    #[must_use]
    pub fn similarity_memoized(&self, a: &Node, b: &Node, memo: &mut MemoTable) -> f64 {
        self.score(a, b, Some(memo))
    }

    /// Best order-preserving alignment of two child sequences in `[0, 1]`.
    ///
    /// Two empty sequences score `1.0`; exactly one empty sequence scores `0.0`.
    #[must_use]
    pub fn align_children(&self, a: &[Node], b: &[Node]) -> f64 {
        self.align(a, b, None)
    }

    fn score(&self, a: &Node, b: &Node, mut memo: Option<&mut MemoTable>) -> f64 {
        if !a.is_well_formed() || !b.is_well_formed() || a.kind() != b.kind() {
            return 0.0;
        }

        if let Some(score) = memo.as_deref_mut().and_then(|memo| memo.get(a, b)) {
            return score;
        }

        let text_sim = match (a.text(), b.text()) {
            (Text::Plain(left), Text::Plain(right)) => text_similarity(left, right),
            _ => 1.0,
        };
        let child_sim = self.align(a.children(), b.children(), memo.as_deref_mut());
        let score = self.weights.text.mul_add(text_sim, self.weights.structure * child_sim);

        if let Some(memo) = memo {
            memo.insert(a, b, score);
        }
        score
    }

    fn align(&self, a: &[Node], b: &[Node], mut memo: Option<&mut MemoTable>) -> f64 {
        let (m, n) = (a.len(), b.len());
        if m == 0 && n == 0 {
            return 1.0;
        }
        if m == 0 || n == 0 {
            return 0.0;
        }

        // Two rolling rows of the dp table; `prev` holds row i - 1.
        let mut prev = vec![0.0_f64; n + 1];
        let mut curr = vec![0.0_f64; n + 1];
        for left in a {
            curr[0] = 0.0;
            for (j, right) in b.iter().enumerate() {
                let aligned = prev[j] + self.score(left, right, memo.as_deref_mut());
                curr[j + 1] = prev[j + 1].max(curr[j]).max(aligned);
            }
            std::mem::swap(&mut prev, &mut curr);
        }

        prev[n] / m.max(n) as f64
    }
}
