use proptest::prelude::*;
use treesim_core::engine::{MemoTable, SimilarityEngine, Weights};
use treesim_core::ratio::{ratio, text_similarity};
use treesim_core::tree::Node;

#[path = "generators.rs"]
mod generators;
use generators::*;

const EPS: f64 = 1e-9;

fn engine() -> SimilarityEngine {
    SimilarityEngine::default()
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(512))]

    #[test]
    fn similarity_is_symmetric(a in arb_node(), b in arb_node()) {
        prop_assert_eq!(engine().similarity(&a, &b), engine().similarity(&b, &a));
    }

    #[test]
    fn similarity_of_self_is_one(a in arb_node()) {
        prop_assert!((engine().similarity(&a, &a) - 1.0).abs() < EPS);
    }

    #[test]
    fn similarity_is_bounded(a in arb_node(), b in arb_node()) {
        let score = engine().similarity(&a, &b);
        prop_assert!((0.0..=1.0 + EPS).contains(&score), "score {}", score);
    }

    #[test]
    fn different_root_kinds_score_zero(a in arb_node(), b in arb_node()) {
        prop_assume!(a.kind() != b.kind());
        prop_assert_eq!(engine().similarity(&a, &b), 0.0);
    }

    #[test]
    fn memoized_matches_plain(a in arb_node(), b in arb_node()) {
        let engine = engine();
        let mut memo = MemoTable::new();
        let plain = engine.similarity(&a, &b);
        prop_assert_eq!(engine.similarity_memoized(&a, &b, &mut memo), plain);
        // A warm table gives the same answer again.
        prop_assert_eq!(engine.similarity_memoized(&a, &b, &mut memo), plain);
    }

    #[test]
    fn alignment_is_bounded(a in arb_children(), b in arb_children()) {
        let aligned = engine().align_children(&a, &b);
        prop_assert!((0.0..=1.0 + EPS).contains(&aligned), "alignment {}", aligned);
    }

    #[test]
    fn alignment_never_drops_when_appending_identical_child(
        a in arb_children(),
        b in arb_children(),
        extra in arb_node(),
    ) {
        let engine = engine();
        let before = engine.align_children(&a, &b);
        let sum_before = before * a.len().max(b.len()) as f64;

        let mut a2 = a.clone();
        a2.push(extra.clone());
        let mut b2 = b.clone();
        b2.push(extra);
        let after = engine.align_children(&a2, &b2);
        let sum_after = after * a2.len().max(b2.len()) as f64;

        // The unnormalized alignment sum grows by at least one full match.
        prop_assert!(sum_after + EPS >= sum_before + 1.0);
    }

    #[test]
    fn leaf_score_is_the_weighted_text_ratio(
        left in arb_text(),
        right in arb_text(),
        text in 0.0_f64..1.0,
    ) {
        let engine = SimilarityEngine::new(Weights { text, structure: 1.0 - text });
        let a = Node::leaf("paragraph", left.clone());
        let b = Node::leaf("paragraph", right.clone());
        let expected = text * text_similarity(&left, &right) + (1.0 - text);
        prop_assert!((engine.similarity(&a, &b) - expected).abs() < EPS);
    }

    #[test]
    fn ratio_is_bounded_and_reflexive(a in ".{0,40}", b in ".{0,40}") {
        let r = ratio(&a, &b);
        prop_assert!((0.0..=1.0).contains(&r));
        prop_assert_eq!(ratio(&a, &a), 1.0);
        prop_assert_eq!(text_similarity(&a, &b), text_similarity(&b, &a));
    }
}
