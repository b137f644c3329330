//! Property-based tests for correspondence parsing and reconciliation.
//!
//! The indexed engine is checked against the quadratic reference engine on
//! random inputs, and the output invariants are asserted directly.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p scorealign-tests --test proptest_reconcile
//! ```

use std::collections::HashSet;

use proptest::prelude::*;

use scorealign_core::verification::cross_check;
use scorealign_core::{
    parse_corresp, reconcile_with_report, RawAlignmentRow, ReconcileConfig, ScoreNoteAttribute,
    DEFAULT_INSERTION_PREFIX,
};
use scorealign_tests::fixtures::{aligned_row, inserted_row};

// ============================================================================
// Strategies
// ============================================================================

/// Score notes with unique ids on a 10 ms grid, so onsets and pitches
/// collide often.
fn arbitrary_attributes() -> impl Strategy<Value = Vec<ScoreNoteAttribute>> {
    prop::collection::vec((0u32..200, 60i32..66), 0..40).prop_map(|notes| {
        notes
            .into_iter()
            .enumerate()
            .map(|(i, (slot, pitch))| ScoreNoteAttribute::new(format!("n{}", i), slot as f64 * 10.0, pitch))
            .collect()
    })
}

fn arbitrary_row() -> impl Strategy<Value = RawAlignmentRow> {
    prop_oneof![
        4 => (0u32..2000, 0u32..2000, 60i32..66, 1i32..128).prop_map(|(ref_ms, align_ms, pitch, velocity)| {
            aligned_row(
                &format!("r{}", ref_ms),
                align_ms as f64 / 1000.0,
                ref_ms as f64 / 1000.0,
                pitch,
                velocity,
            )
        }),
        1 => (0u32..2000, prop::sample::select(vec!["C#4", "D4", "F#5", "Bb3"]), 1i32..128)
            .prop_map(|(align_ms, name, velocity)| inserted_row(align_ms as f64 / 1000.0, name, 61, velocity)),
    ]
}

fn arbitrary_rows() -> impl Strategy<Value = Vec<RawAlignmentRow>> {
    prop::collection::vec(arbitrary_row(), 0..40)
}

// ============================================================================
// 1. Engine equivalence
// ============================================================================

proptest! {
    /// The indexed engine agrees with the reference engine.
    #[test]
    fn indexed_engine_matches_reference(
        rows in arbitrary_rows(),
        attrs in arbitrary_attributes(),
        threshold in prop::sample::select(vec![0.0, 5.0, 20.0, 100.0]),
    ) {
        let result = cross_check(&rows, &attrs, threshold);
        prop_assert!(result.is_ok(), "{:?}", result.err());
    }
}

// ============================================================================
// 2. Output invariants
// ============================================================================

proptest! {
    /// Observations are sorted by onset and numbered from 1.
    #[test]
    fn observations_are_ordered(rows in arbitrary_rows(), attrs in arbitrary_attributes()) {
        let report = reconcile_with_report(&rows, &attrs, &ReconcileConfig::default());
        for pair in report.observations.windows(2) {
            prop_assert!(pair[0].obs_mean_onset <= pair[1].obs_mean_onset);
        }
        for (i, obs) in report.observations.iter().enumerate() {
            prop_assert_eq!(obs.obs_num, i + 1);
        }
    }

    /// Each score note appears at most once, and every link is counted.
    #[test]
    fn score_notes_are_linked_once(rows in arbitrary_rows(), attrs in arbitrary_attributes()) {
        let report = reconcile_with_report(&rows, &attrs, &ReconcileConfig::default());

        let mut seen = HashSet::new();
        let mut linked = 0usize;
        for obs in &report.observations {
            prop_assert_eq!(obs.xml_id().len(), obs.velocity().len());
            for id in obs.xml_id().as_slice() {
                linked += 1;
                if !id.starts_with(DEFAULT_INSERTION_PREFIX) {
                    prop_assert!(seen.insert(id.clone()), "duplicate score note {}", id);
                }
            }
        }
        prop_assert_eq!(linked, report.matched_count + report.inserted_count);
        prop_assert_eq!(
            report.inserted_count,
            rows.iter().filter(|r| r.is_insertion()).count()
        );
    }

    /// A wider threshold never links fewer score notes.
    #[test]
    fn wider_threshold_links_at_least_as_many(
        rows in arbitrary_rows(),
        attrs in arbitrary_attributes(),
    ) {
        let narrow = reconcile_with_report(&rows, &attrs, &ReconcileConfig::default().threshold_ms(0.0));
        let wide = reconcile_with_report(&rows, &attrs, &ReconcileConfig::default().threshold_ms(50.0));
        prop_assert!(wide.matched_count >= narrow.matched_count);
    }
}

// ============================================================================
// 3. Corresp parsing
// ============================================================================

proptest! {
    /// Arbitrary text never panics and every data line is accounted for.
    #[test]
    fn corresp_parsing_accounts_for_lines(body in "[0-9a-zA-Z#*.\\t\\- \\n]{0,400}") {
        let text = format!("//Version: PianoRollToCorresp_v170101\n{}", body);
        let table = parse_corresp(&text);
        let data_lines = text
            .lines()
            .skip(1)
            .filter(|line| !line.trim().is_empty() && !line.starts_with("//"))
            .count();
        prop_assert_eq!(table.rows.len() + table.skipped_rows(), data_lines);
    }
}
