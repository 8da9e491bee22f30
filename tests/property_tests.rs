//! Property-based tests.
//!
//! Uses proptest to verify invariants across random inputs:
//! - Hamming distance is a metric on signatures
//! - Text normalization is idempotent
//! - The difficulty controller moves at most one level per answer
//! - Fingerprint stores and pools never exceed their caps

// Property tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use proptest::prelude::*;
use quizpool::config::{CategorySpec, PoolSettings};
use quizpool::models::{ContentItem, DifficultyLevel, PerformanceSample, Provenance, Signature};
use quizpool::services::deduplication::{Fingerprinter, normalize};
use quizpool::services::difficulty::{DifficultyConfig, speed_score};
use quizpool::services::{CategoryPool, DifficultyController};
use quizpool::{FingerprintStore, MemoryFingerprintStore};

fn level_strategy() -> impl Strategy<Value = DifficultyLevel> {
    prop::sample::select(DifficultyLevel::all().to_vec())
}

proptest! {
    /// Property: distance is symmetric, zero on itself and at most 64.
    #[test]
    fn prop_hamming_is_symmetric(a in any::<u64>(), b in any::<u64>()) {
        let (a, b) = (Signature::new(a), Signature::new(b));
        prop_assert_eq!(a.hamming_distance(b), b.hamming_distance(a));
        prop_assert_eq!(a.hamming_distance(a), 0);
        prop_assert!(a.hamming_distance(b) <= 64);
    }

    /// Property: the triangle inequality holds.
    #[test]
    fn prop_hamming_triangle(a in any::<u64>(), b in any::<u64>(), c in any::<u64>()) {
        let (a, b, c) = (Signature::new(a), Signature::new(b), Signature::new(c));
        prop_assert!(a.hamming_distance(c) <= a.hamming_distance(b) + b.hamming_distance(c));
    }

    /// Property: normalizing twice changes nothing.
    #[test]
    fn prop_normalize_idempotent(s in "[a-zA-Z0-9À-ÿ \\t,.?!'-]{0,200}") {
        let once = normalize(&s);
        let twice = normalize(&once);
        prop_assert_eq!(once, twice);
    }

    /// Property: normalized text has no leading, trailing or doubled spaces.
    #[test]
    fn prop_normalize_collapses_whitespace(s in "[a-zA-Z0-9 \\t\\n,.?!]{0,120}") {
        let normalized = normalize(&s);
        prop_assert!(!normalized.starts_with(' '));
        prop_assert!(!normalized.ends_with(' '));
        prop_assert!(!normalized.contains("  "));
    }

    /// Property: case and punctuation do not change the signature.
    #[test]
    fn prop_fingerprint_ignores_case_and_punctuation(s in "[a-zA-Z0-9 ]{1,120}") {
        let fp = Fingerprinter::default();
        let shouted = format!("{}?!", s.to_uppercase());
        prop_assert_eq!(fp.fingerprint_text(&s), fp.fingerprint_text(&shouted));
    }

    /// Property: each answer moves the level by at most one step.
    #[test]
    fn prop_controller_moves_one_step_at_most(
        start in level_strategy(),
        min_samples in 1usize..5,
        answers in prop::collection::vec((any::<bool>(), 1i64..200_000), 1..60),
    ) {
        let config = DifficultyConfig::default()
            .with_initial_level(start)
            .with_min_samples(min_samples);
        let mut controller = DifficultyController::new(config);

        for (correct, response_ms) in answers {
            let before = controller.current_level();
            let state = controller.submit_result(PerformanceSample::new(correct, response_ms, 30_000));
            prop_assert!(before.index().abs_diff(state.level.index()) <= 1);
            prop_assert_eq!(state.level, controller.current_level());
        }
    }

    /// Property: after a change, the level holds for `min_samples - 1` answers.
    #[test]
    fn prop_controller_waits_between_changes(
        min_samples in 2usize..6,
        answers in prop::collection::vec((any::<bool>(), 1i64..200_000), 1..60),
    ) {
        let config = DifficultyConfig::default().with_min_samples(min_samples);
        let mut controller = DifficultyController::new(config);
        let mut since_change = 0usize;

        for (correct, response_ms) in answers {
            let before = controller.current_level();
            let state = controller.submit_result(PerformanceSample::new(correct, response_ms, 30_000));
            since_change += 1;
            if state.level != before {
                prop_assert!(since_change >= min_samples);
                since_change = 0;
            }
        }
    }

    /// Property: slower answers never score higher on speed.
    #[test]
    fn prop_speed_score_non_increasing(a in 0.0f64..5.0, b in 0.0f64..5.0) {
        let (fast, slow) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(speed_score(fast) >= speed_score(slow));
    }

    /// Property: a store never holds more than its capacity and keeps the
    /// newest signature.
    #[test]
    fn prop_store_never_exceeds_capacity(
        capacity in 1usize..40,
        values in prop::collection::vec(any::<u64>(), 1..200),
    ) {
        let store = MemoryFingerprintStore::with_capacity(capacity);
        for value in &values {
            store.insert(Signature::new(*value)).unwrap();
            prop_assert!(store.len().unwrap() <= capacity);
        }
        let last = Signature::new(*values.last().unwrap());
        prop_assert!(store.load().unwrap().contains(&last));
    }

    /// Property: a pool never holds more than its capacity.
    #[test]
    fn prop_pool_never_exceeds_capacity(
        capacity in 1usize..20,
        ops in prop::collection::vec(any::<bool>(), 1..100),
    ) {
        let settings = PoolSettings::default().with_bounds(capacity, capacity / 2);
        let pool = CategoryPool::new(CategorySpec::new("science"), &settings);
        let mut expected = 0usize;

        for (n, push) in ops.into_iter().enumerate() {
            if push {
                let item = ContentItem::new(
                    "science",
                    "science",
                    format!("Question {n}"),
                    "answer",
                    DifficultyLevel::Basic,
                    Provenance::Local,
                );
                if pool.push(item) {
                    expected += 1;
                }
            } else if pool.dequeue().is_some() {
                expected -= 1;
            }
            prop_assert!(pool.len() <= capacity);
            prop_assert_eq!(pool.len(), expected);
        }
    }
}
