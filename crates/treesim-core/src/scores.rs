//! Pairwise similarity results.
//!
//! [`PairwiseScores`] is the sparse mapping a batch run hands to presentation
//! code. Keys are stored as submitted, but every lookup is symmetric: asking
//! for `(b, a)` finds an entry stored as `(a, b)`, and a document compared
//! with itself scores `1.0` without being stored.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::ErrorCode;

/// Result of comparing one pair of documents.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PairOutcome {
    /// The engine produced a score.
    Score(f64),
    /// The comparison could not be completed; carries the reason.
    Failed(String),
}

impl PairOutcome {
    #[must_use]
    pub const fn score(&self) -> Option<f64> {
        match self {
            Self::Score(score) => Some(*score),
            Self::Failed(_) => None,
        }
    }

    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Error code for a failed comparison, `None` for a score.
    #[must_use]
    pub const fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Score(_) => None,
            Self::Failed(_) => Some(ErrorCode::ComparisonFailed),
        }
    }
}

/// One scored pair, borrowed from a [`PairwiseScores`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedPair<'a> {
    pub first: &'a str,
    pub second: &'a str,
    pub score: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PairwiseScores {
    entries: BTreeMap<(String, String), PairOutcome>,
}

impl PairwiseScores {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the outcome for `(first, second)`, replacing any earlier
    /// outcome recorded for the pair in either orientation.
    pub fn insert(&mut self, first: impl Into<String>, second: impl Into<String>, outcome: PairOutcome) {
        let key = (first.into(), second.into());
        let mirrored = (key.1.clone(), key.0.clone());
        if mirrored != key {
            self.entries.remove(&mirrored);
        }
        self.entries.insert(key, outcome);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stored outcome for the pair in either orientation.
    #[must_use]
    pub fn outcome(&self, a: &str, b: &str) -> Option<&PairOutcome> {
        self.entries
            .get(&(a.to_string(), b.to_string()))
            .or_else(|| self.entries.get(&(b.to_string(), a.to_string())))
    }

    /// Score for the pair; identical identifiers score `1.0`.
    ///
    /// Returns `None` when the pair was not computed or failed.
    #[must_use]
    pub fn score(&self, a: &str, b: &str) -> Option<f64> {
        if a == b {
            return Some(1.0);
        }
        self.outcome(a, b).and_then(PairOutcome::score)
    }

    /// All entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &PairOutcome)> {
        self.entries
            .iter()
            .map(|((first, second), outcome)| (first.as_str(), second.as_str(), outcome))
    }

    /// Entries whose comparison failed.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.iter().filter_map(|(first, second, outcome)| match outcome {
            PairOutcome::Failed(reason) => Some((first, second, reason.as_str())),
            PairOutcome::Score(_) => None,
        })
    }

    /// Scored pairs of distinct documents, best first.
    ///
    /// Ties keep key order, so the ranking is deterministic.
    #[must_use]
    pub fn ranked(&self) -> Vec<RankedPair<'_>> {
        let mut ranked: Vec<RankedPair<'_>> = self
            .iter()
            .filter(|(first, second, _)| first != second)
            .filter_map(|(first, second, outcome)| {
                outcome.score().map(|score| RankedPair {
                    first,
                    second,
                    score,
                })
            })
            .collect();
        ranked.sort_by(|x, y| y.score.total_cmp(&x.score));
        ranked
    }
}

impl Extend<((String, String), PairOutcome)> for PairwiseScores {
    fn extend<I: IntoIterator<Item = ((String, String), PairOutcome)>>(&mut self, iter: I) {
        for ((first, second), outcome) in iter {
            self.insert(first, second, outcome);
        }
    }
}
