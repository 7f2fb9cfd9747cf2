//! Text similarity ratio based on matching blocks.
//!
//! The ratio of two sequences is `2 * M / (len(a) + len(b))`, where `M` is the
//! total size of the matching blocks found by recursively taking the longest
//! common run and then repeating on the pieces to its left and right.
//!
//! Tie-breaking is pinned to leftmost-longest: among equally long runs the
//! one starting earliest in `a` wins, then the one starting earliest in `b`.
//! When `b` has at least [`POPULAR_MIN_LEN`] elements, elements that occur in
//! more than 1% of `b` (plus one) do not seed matches, though a match may
//! still extend across them. Together these rules reproduce the classic
//! sequence-matcher ratio, so scores line up with tools built on it.
//!
//! Sequences are compared as Unicode scalar values.

use std::collections::HashMap;

/// Minimum length of `b` at which popular elements stop seeding matches.
pub const POPULAR_MIN_LEN: usize = 200;

/// A run where `a[a..a + size] == b[b..b + size]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MatchingBlock {
    pub a: usize,
    pub b: usize,
    pub size: usize,
}

/// Longest-matching-block decomposition of two sequences.
#[derive(Debug)]
pub struct SequenceMatcher<'s, T> {
    a: &'s [T],
    b: &'s [T],
    /// Positions of every seeding element in `b`, ascending.
    b2j: HashMap<&'s T, Vec<usize>>,
}

impl<'s, T: Eq + std::hash::Hash> SequenceMatcher<'s, T> {
    #[must_use]
    pub fn new(a: &'s [T], b: &'s [T]) -> Self {
        let mut b2j: HashMap<&T, Vec<usize>> = HashMap::new();
        for (j, elt) in b.iter().enumerate() {
            b2j.entry(elt).or_default().push(j);
        }

        if b.len() >= POPULAR_MIN_LEN {
            let limit = b.len() / 100 + 1;
            b2j.retain(|_, positions| positions.len() <= limit);
        }

        Self { a, b, b2j }
    }

    /// Longest matching block in `a[alo..ahi]` and `b[blo..bhi]`.
    ///
    /// Returns a block of size 0 at `(alo, blo)` when nothing matches.
    #[must_use]
    pub fn find_longest_match(&self, alo: usize, ahi: usize, blo: usize, bhi: usize) -> MatchingBlock {
        let mut best = MatchingBlock {
            a: alo,
            b: blo,
            size: 0,
        };

        // j2len[j] = length of the match ending at a[i - 1], b[j].
        let mut j2len: HashMap<usize, usize> = HashMap::new();
        for i in alo..ahi {
            let mut next: HashMap<usize, usize> = HashMap::new();
            if let Some(positions) = self.b2j.get(&self.a[i]) {
                for &j in positions {
                    if j < blo {
                        continue;
                    }
                    if j >= bhi {
                        break;
                    }
                    let k = j
                        .checked_sub(1)
                        .and_then(|prev| j2len.get(&prev))
                        .copied()
                        .unwrap_or(0)
                        + 1;
                    next.insert(j, k);
                    if k > best.size {
                        best = MatchingBlock {
                            a: i + 1 - k,
                            b: j + 1 - k,
                            size: k,
                        };
                    }
                }
            }
            j2len = next;
        }

        // Popular elements never seed a match, so grow the winner across
        // any equal neighbours on both sides.
        while best.a > alo && best.b > blo && self.a[best.a - 1] == self.b[best.b - 1] {
            best.a -= 1;
            best.b -= 1;
            best.size += 1;
        }
        while best.a + best.size < ahi
            && best.b + best.size < bhi
            && self.a[best.a + best.size] == self.b[best.b + best.size]
        {
            best.size += 1;
        }

        best
    }

    /// All non-empty matching blocks, ascending, with adjacent blocks merged.
    #[must_use]
    pub fn matching_blocks(&self) -> Vec<MatchingBlock> {
        let mut blocks = Vec::new();
        let mut pending = vec![(0, self.a.len(), 0, self.b.len())];

        while let Some((alo, ahi, blo, bhi)) = pending.pop() {
            let block = self.find_longest_match(alo, ahi, blo, bhi);
            if block.size == 0 {
                continue;
            }
            if alo < block.a && blo < block.b {
                pending.push((alo, block.a, blo, block.b));
            }
            if block.a + block.size < ahi && block.b + block.size < bhi {
                pending.push((block.a + block.size, ahi, block.b + block.size, bhi));
            }
            blocks.push(block);
        }
        blocks.sort_unstable();

        let mut merged: Vec<MatchingBlock> = Vec::with_capacity(blocks.len());
        for block in blocks {
            match merged.last_mut() {
                Some(last) if last.a + last.size == block.a && last.b + last.size == block.b => {
                    last.size += block.size;
                }
                _ => merged.push(block),
            }
        }
        merged
    }

    /// Total number of matched elements.
    #[must_use]
    pub fn matched(&self) -> usize {
        self.matching_blocks().iter().map(|block| block.size).sum()
    }

    /// `2 * M / (len(a) + len(b))`; two empty sequences score 1.0.
    #[must_use]
    pub fn ratio(&self) -> f64 {
        let total = self.a.len() + self.b.len();
        if total == 0 {
            return 1.0;
        }
        2.0 * self.matched() as f64 / total as f64
    }
}

/// Matching-block ratio of `a` against `b`, in that order.
///
/// The decomposition can depend on argument order for ambiguous inputs; use
/// [`text_similarity`] where a symmetric score is required.
#[must_use]
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    SequenceMatcher::new(&a, &b).ratio()
}

/// Symmetric text similarity in `[0, 1]`.
///
/// Identical strings score exactly 1.0. Otherwise the lexicographically
/// smaller string is matched against the larger, so swapping the arguments
/// never changes the score.
#[must_use]
pub fn text_similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    if a <= b { ratio(a, b) } else { ratio(b, a) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-12,
            "expected {expected}, got {actual}"
        );
    }

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    // -----------------------------------------------------------------------
    // Reference vectors
    // -----------------------------------------------------------------------

    #[test]
    fn reference_ratios() {
        assert_close(ratio("abcd", "bcde"), 0.75);
        assert_close(ratio("hello world", "hello word"), 20.0 / 21.0);
        assert_close(ratio("abc", "xyz"), 0.0);
        assert_close(ratio("", ""), 1.0);
        assert_close(ratio("abc", ""), 0.0);
        assert_close(ratio("private Thread currentThread;", "private volatile Thread currentThread;"), 58.0 / 67.0);
    }

    #[test]
    fn qabxcd_matching_blocks() {
        let a = chars("qabxcd");
        let b = chars("abycdf");
        let matcher = SequenceMatcher::new(&a, &b);
        assert_eq!(
            matcher.matching_blocks(),
            vec![
                MatchingBlock { a: 1, b: 0, size: 2 },
                MatchingBlock { a: 4, b: 3, size: 2 },
            ]
        );
        assert_close(matcher.ratio(), 8.0 / 12.0);
    }

    #[test]
    fn longest_match_prefers_leftmost_in_a() {
        // " abcd" vs "abcd abcd": the run "abcd" exists twice in b; the
        // earliest start in a wins, then the earliest start in b.
        let a = chars(" abcd");
        let b = chars("abcd abcd");
        let matcher = SequenceMatcher::new(&a, &b);
        assert_eq!(
            matcher.find_longest_match(0, 5, 0, 9),
            MatchingBlock { a: 0, b: 4, size: 5 }
        );
    }

    #[test]
    fn no_match_reports_empty_block_at_lower_bounds() {
        let a = chars("abc");
        let b = chars("xyz");
        let matcher = SequenceMatcher::new(&a, &b);
        assert_eq!(
            matcher.find_longest_match(1, 3, 2, 3),
            MatchingBlock { a: 1, b: 2, size: 0 }
        );
    }

    #[test]
    fn popular_elements_still_extend_matches() {
        // 300 identical characters: every element is popular, so nothing
        // seeds, but the boundary extension recovers the full match.
        let text = "a".repeat(300);
        assert_close(ratio(&text, &text), 1.0);
    }

    #[test]
    fn unicode_is_compared_by_scalar_value() {
        assert_close(ratio("héllo", "hello"), 0.8);
        assert_close(ratio("日本語", "日本"), 0.8);
    }

    // -----------------------------------------------------------------------
    // text_similarity()
    // -----------------------------------------------------------------------

    #[test]
    fn text_similarity_is_symmetric() {
        let pairs = [
            ("abcd", "bcda"),
            ("tide", "diet"),
            ("hello world", "world hello"),
            ("aaab", "abaa"),
        ];
        for (a, b) in pairs {
            assert_eq!(text_similarity(a, b).to_bits(), text_similarity(b, a).to_bits(), "{a:?} vs {b:?}");
        }
    }

    #[test]
    fn text_similarity_of_identical_strings_is_one() {
        assert_close(text_similarity("same", "same"), 1.0);
        assert_close(text_similarity("", ""), 1.0);
    }

    #[test]
    fn text_similarity_stays_in_unit_interval() {
        for (a, b) in [("", "x"), ("abc", "abd"), ("x", "yyyyyy")] {
            let score = text_similarity(a, b);
            assert!((0.0..=1.0).contains(&score), "{a:?} vs {b:?} -> {score}");
        }
    }
}
