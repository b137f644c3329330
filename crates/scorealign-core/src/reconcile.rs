//! Note reconciliation.
//!
//! Merges the aligner's correspondence rows with the score's own note
//! timing to produce MAPS observations:
//!
//! 1. Rows whose `refID` is the sentinel are insertions; the rest are aligned.
//! 2. Score attributes are indexed by MIDI pitch. Each bucket is ordered by
//!    identifier so that candidate generation order does not depend on input
//!    order.
//! 3. Every aligned row proposes a candidate for each same-pitch attribute
//!    whose onset lies within `threshold_ms` (inclusive).
//! 4. Per score identifier the closest candidate survives. On equal distance
//!    the first candidate generated wins.
//! 5. Aligned rows whose `refID` no surviving candidate claims are match
//!    failures. They are counted and dropped.
//! 6. Surviving matches are sorted by `(alignOntime, distance, id)` and runs
//!    with exactly equal `alignOntime` become one observation.
//! 7. Insertions are appended with a synthetic identifier.
//! 8. The combined list is stably sorted by onset (matches stay ahead of
//!    insertions at equal onsets) and numbered from 1.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;

use crate::attributes::ScoreNoteAttribute;
use crate::corresp::RawAlignmentRow;
use crate::error::{InputWarning, WarningCode};
use crate::observation::{insertion_id, MapsObservation, DEFAULT_INSERTION_PREFIX};

/// Default matching threshold in milliseconds.
pub const DEFAULT_THRESHOLD_MS: f64 = 5.0;

/// Configuration for the reconciliation engine.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileConfig {
    /// Maximum (inclusive) onset distance for a candidate, in milliseconds.
    pub threshold_ms: f64,
    /// Prefix for identifiers synthesised for inserted notes.
    pub insertion_prefix: String,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            threshold_ms: DEFAULT_THRESHOLD_MS,
            insertion_prefix: DEFAULT_INSERTION_PREFIX.to_string(),
        }
    }
}

impl ReconcileConfig {
    /// Sets the matching threshold.
    pub fn threshold_ms(mut self, threshold_ms: f64) -> Self {
        self.threshold_ms = threshold_ms;
        self
    }

    /// Sets the insertion identifier prefix.
    pub fn insertion_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.insertion_prefix = prefix.into();
        self
    }
}

/// A candidate pairing of an aligned row with a score note.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconciledMatch<'a> {
    /// The aligned correspondence row.
    pub row: &'a RawAlignmentRow,
    /// The score note it was matched to.
    pub attribute: &'a ScoreNoteAttribute,
    /// `|row.timestamp_ms - attribute.timestamp_ms|`.
    pub distance: f64,
}

/// Outcome of one reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcileReport {
    /// Final numbered observations.
    pub observations: Vec<MapsObservation>,
    /// Score notes that were reconciled to a performed note.
    pub matched_count: usize,
    /// Performed notes with no reference note.
    pub inserted_count: usize,
    /// Aligned rows that could not be reconciled within the threshold.
    pub match_failures: usize,
    /// Rows ignored because they carried unusable values.
    pub skipped_rows: usize,
    /// Attributes ignored because they carried unusable values.
    pub skipped_attributes: usize,
    /// Diagnostics for everything counted above.
    #[serde(skip)]
    pub warnings: Vec<InputWarning>,
}

/// Score attributes grouped by MIDI pitch.
#[derive(Debug, Default)]
pub struct PitchIndex<'a> {
    buckets: BTreeMap<i32, Vec<&'a ScoreNoteAttribute>>,
    skipped: Vec<InputWarning>,
}

impl<'a> PitchIndex<'a> {
    /// Indexes `attrs`, skipping entries with an empty id or non-finite time.
    pub fn build(attrs: &'a [ScoreNoteAttribute]) -> Self {
        let mut index = PitchIndex::default();
        for (position, attr) in attrs.iter().enumerate() {
            if attr.id.is_empty() || !attr.timestamp_ms.is_finite() {
                index.skipped.push(InputWarning::at(
                    WarningCode::MalformedAttribute,
                    "attribute has no id or no usable tstamp",
                    format!("attrs[{}]", position),
                ));
                continue;
            }
            index.buckets.entry(attr.midi_pitch).or_default().push(attr);
        }
        for bucket in index.buckets.values_mut() {
            bucket.sort_by(|a, b| {
                a.id.cmp(&b.id)
                    .then_with(|| a.timestamp_ms.total_cmp(&b.timestamp_ms))
            });
        }
        index
    }

    /// Attributes sharing `pitch`, ordered by identifier.
    pub fn with_pitch(&self, pitch: i32) -> &[&'a ScoreNoteAttribute] {
        self.buckets.get(&pitch).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of attributes that were not indexed.
    pub fn skipped(&self) -> usize {
        self.skipped.len()
    }
}

/// Reconciles alignment rows with score attributes using the default
/// insertion prefix.
pub fn reconcile(
    rows: &[RawAlignmentRow],
    attrs: &[ScoreNoteAttribute],
    threshold_ms: f64,
) -> Vec<MapsObservation> {
    let config = ReconcileConfig::default().threshold_ms(threshold_ms);
    reconcile_with_report(rows, attrs, &config).observations
}

/// Reconciles alignment rows with score attributes and reports counts.
pub fn reconcile_with_report(
    rows: &[RawAlignmentRow],
    attrs: &[ScoreNoteAttribute],
    config: &ReconcileConfig,
) -> ReconcileReport {
    let mut report = ReconcileReport::default();

    let (inserted, aligned): (Vec<&RawAlignmentRow>, Vec<&RawAlignmentRow>) =
        rows.iter().partition(|row| row.is_insertion());

    let aligned: Vec<&RawAlignmentRow> = aligned
        .into_iter()
        .filter(|row| {
            let usable = row.ref_onset_time.is_finite() && row.align_onset_time.is_finite();
            if !usable {
                report.warnings.push(InputWarning::new(
                    WarningCode::MalformedRow,
                    format!("row {} has a non-finite onset", row.align_id),
                ));
                report.skipped_rows += 1;
            }
            usable
        })
        .collect();

    let index = PitchIndex::build(attrs);
    report.skipped_attributes = index.skipped();
    report.warnings.extend(index.skipped.iter().cloned());

    let candidates = generate_candidates(&aligned, &index, config.threshold_ms);
    let matches = select_closest_per_note(candidates);

    let claimed: HashSet<&str> = matches.iter().map(|m| m.row.ref_id.as_str()).collect();
    for row in aligned.iter().filter(|row| !claimed.contains(row.ref_id.as_str())) {
        tracing::debug!(
            ref_id = %row.ref_id,
            onset = row.ref_onset_time,
            pitch = row.ref_pitch,
            "no score note within threshold"
        );
        report.warnings.push(InputWarning::at(
            WarningCode::MatchFailure,
            format!("no score note with pitch {} within threshold", row.ref_pitch),
            format!("refID {}", row.ref_id),
        ));
        report.match_failures += 1;
    }

    report.matched_count = matches.len();
    report.inserted_count = inserted.len();

    let mut observations = group_by_onset(matches);
    observations.extend(inserted.iter().map(|row| {
        MapsObservation::single(
            row.align_onset_time,
            insertion_id(&config.insertion_prefix, &row.align_pitch_name),
            row.align_velocity,
        )
    }));

    // sort_by is stable: matches precede insertions at equal onsets
    observations.sort_by(|a, b| a.obs_mean_onset.total_cmp(&b.obs_mean_onset));
    for (i, obs) in observations.iter_mut().enumerate() {
        obs.obs_num = i + 1;
    }

    tracing::info!(
        matched = report.matched_count,
        inserted = report.inserted_count,
        match_failures = report.match_failures,
        skipped_rows = report.skipped_rows,
        skipped_attributes = report.skipped_attributes,
        observations = observations.len(),
        "reconciliation complete"
    );

    report.observations = observations;
    report
}

/// Pairs every aligned row with each same-pitch attribute within threshold.
///
/// Output order is row order, then attribute order within the pitch bucket.
pub fn generate_candidates<'a>(
    aligned: &[&'a RawAlignmentRow],
    index: &PitchIndex<'a>,
    threshold_ms: f64,
) -> Vec<ReconciledMatch<'a>> {
    let mut candidates = Vec::new();
    for &row in aligned {
        let row_ms = row.timestamp_ms();
        for &attribute in index.with_pitch(row.ref_pitch) {
            let distance = (row_ms - attribute.timestamp_ms).abs();
            if distance <= threshold_ms {
                candidates.push(ReconciledMatch {
                    row,
                    attribute,
                    distance,
                });
            }
        }
    }
    candidates
}

/// Keeps the closest candidate per score identifier.
///
/// A later candidate replaces the current best only when strictly closer.
/// The result is in order of each identifier's first appearance.
pub fn select_closest_per_note(candidates: Vec<ReconciledMatch<'_>>) -> Vec<ReconciledMatch<'_>> {
    let mut best: Vec<ReconciledMatch<'_>> = Vec::new();
    let mut slot_by_id: HashMap<&str, usize> = HashMap::new();

    for candidate in candidates {
        match slot_by_id.get(candidate.attribute.id.as_str()) {
            Some(&slot) => {
                if candidate.distance < best[slot].distance {
                    best[slot] = candidate;
                }
            }
            None => {
                slot_by_id.insert(candidate.attribute.id.as_str(), best.len());
                best.push(candidate);
            }
        }
    }

    best
}

fn compare_matches(a: &ReconciledMatch<'_>, b: &ReconciledMatch<'_>) -> Ordering {
    a.row
        .align_onset_time
        .total_cmp(&b.row.align_onset_time)
        .then_with(|| a.distance.total_cmp(&b.distance))
        .then_with(|| a.attribute.id.cmp(&b.attribute.id))
}

/// Groups matches that share an exactly equal performed onset.
pub fn group_by_onset(mut matches: Vec<ReconciledMatch<'_>>) -> Vec<MapsObservation> {
    matches.sort_by(compare_matches);

    let mut observations = Vec::new();
    let mut iter = matches.into_iter().peekable();
    while let Some(first) = iter.next() {
        let onset = first.row.align_onset_time;
        let mut ids = vec![first.attribute.id.clone()];
        let mut velocities = vec![first.row.align_velocity];
        while let Some(next) = iter.next_if(|m| m.row.align_onset_time == onset) {
            ids.push(next.attribute.id.clone());
            velocities.push(next.row.align_velocity);
        }
        observations.push(MapsObservation::from_parts(onset, ids, velocities));
    }
    observations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::{maps_to_json, OneOrMany};
    use pretty_assertions::assert_eq;

    fn aligned(ref_id: &str, onset: f64, pitch: i32, velocity: i32) -> RawAlignmentRow {
        RawAlignmentRow {
            align_id: format!("a-{}", ref_id),
            align_onset_time: onset,
            align_pitch_name: "C4".to_string(),
            align_pitch: pitch,
            align_velocity: velocity,
            ref_id: ref_id.to_string(),
            ref_onset_time: onset,
            ref_pitch_name: "C4".to_string(),
            ref_pitch: pitch,
            ref_velocity: 80,
        }
    }

    fn inserted(onset: f64, pitch_name: &str, velocity: i32) -> RawAlignmentRow {
        RawAlignmentRow {
            align_id: "ins".to_string(),
            align_onset_time: onset,
            align_pitch_name: pitch_name.to_string(),
            align_pitch: 61,
            align_velocity: velocity,
            ref_id: "-1".to_string(),
            ref_onset_time: -1.0,
            ref_pitch_name: "-1".to_string(),
            ref_pitch: -1,
            ref_velocity: -1,
        }
    }

    fn ids(obs: &MapsObservation) -> Vec<&str> {
        obs.xml_id().as_slice().iter().map(String::as_str).collect()
    }

    #[test]
    fn test_end_to_end_scenario() {
        let attrs = vec![
            ScoreNoteAttribute::new("n1", 1000.0, 60),
            ScoreNoteAttribute::new("n2", 1000.0, 64),
            ScoreNoteAttribute::new("n3", 2000.0, 67),
        ];
        let mut r1 = aligned("n1", 1.001, 60, 50);
        r1.ref_onset_time = 1.001;
        let mut r2 = aligned("n2", 1.001, 64, 55);
        r2.ref_onset_time = 1.002;
        let mut r3 = inserted(3.0, "A4", 70);
        r3.align_pitch = 69;
        let rows = vec![r1, r2, r3];

        let out = reconcile(&rows, &attrs, 5.0);
        assert_eq!(out.len(), 2);

        assert_eq!(out[0].obs_mean_onset, 1.001);
        assert_eq!(ids(&out[0]), vec!["n1", "n2"]);
        assert_eq!(out[0].velocity(), &OneOrMany::Many(vec![50, 55]));
        assert_eq!(out[0].obs_num, 1);

        assert_eq!(out[1].obs_mean_onset, 3.0);
        assert_eq!(
            out[1].xml_id(),
            &OneOrMany::One("trompa-align_inserted_A4".to_string())
        );
        assert_eq!(out[1].velocity(), &OneOrMany::One(70));
        assert_eq!(out[1].obs_num, 2);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let attrs = vec![
            ScoreNoteAttribute::new("exact", 1000.0, 60),
            ScoreNoteAttribute::new("beyond", 3000.0, 62),
        ];
        let mut at_limit = aligned("exact", 1.0, 60, 40);
        at_limit.ref_onset_time = 1.005;
        let mut past_limit = aligned("beyond", 3.0, 62, 40);
        past_limit.ref_onset_time = 3.005001;

        let report = reconcile_with_report(
            &[at_limit, past_limit],
            &attrs,
            &ReconcileConfig::default().threshold_ms(5.0),
        );
        assert_eq!(report.observations.len(), 1);
        assert_eq!(ids(&report.observations[0]), vec!["exact"]);
        assert_eq!(report.match_failures, 1);
    }

    #[test]
    fn test_distance_boundary_with_exact_millis() {
        let attrs = vec![
            ScoreNoteAttribute::new("a", 1000.0, 60),
            ScoreNoteAttribute::new("b", 2000.0, 60),
        ];
        let mut accepted = aligned("a", 1.0, 60, 40);
        accepted.ref_onset_time = 1.0;
        let mut rejected = aligned("b", 2.0, 60, 40);
        rejected.ref_onset_time = 2.0;

        let index = PitchIndex::build(&attrs);
        let rows = [&accepted, &rejected];
        let shifted_attrs = vec![
            ScoreNoteAttribute::new("a", 1005.0, 60),
            ScoreNoteAttribute::new("b", 2005.001, 60),
        ];
        let shifted = PitchIndex::build(&shifted_attrs);

        assert_eq!(generate_candidates(&rows, &index, 5.0).len(), 2);
        let candidates = generate_candidates(&rows, &shifted, 5.0);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].attribute.id, "a");
        assert_eq!(candidates[0].distance, 5.0);
    }

    #[test]
    fn test_insertion_identifier_sanitized() {
        let out = reconcile(&[inserted(0.5, "C#4", 90)], &[], 5.0);
        assert_eq!(out.len(), 1);
        assert_eq!(
            out[0].xml_id(),
            &OneOrMany::One("trompa-align_inserted_Cs4".to_string())
        );
    }

    #[test]
    fn test_custom_insertion_prefix() {
        let config = ReconcileConfig::default().insertion_prefix("perf_extra_");
        let report = reconcile_with_report(&[inserted(0.5, "Eb5", 90)], &[], &config);
        assert_eq!(ids(&report.observations[0]), vec!["perf_extra_Eb5"]);
        assert_eq!(report.inserted_count, 1);
    }

    #[test]
    fn test_closest_candidate_wins_per_note() {
        let attrs = vec![ScoreNoteAttribute::new("n1", 1000.0, 60)];
        let mut far = aligned("n1", 1.0, 60, 10);
        far.ref_onset_time = 1.004;
        let mut near = aligned("n1", 1.2, 60, 20);
        near.ref_onset_time = 0.999;

        let out = reconcile(&[far, near], &attrs, 5.0);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].obs_mean_onset, 1.2);
        assert_eq!(out[0].velocity(), &OneOrMany::One(20));
    }

    #[test]
    fn test_distance_tie_keeps_first_generated() {
        let attrs = vec![ScoreNoteAttribute::new("n1", 1000.0, 60)];
        let mut first = aligned("n1", 1.0, 60, 11);
        first.ref_onset_time = 1.0;
        let mut second = aligned("n1", 1.1, 60, 22);
        second.ref_onset_time = 1.0;

        let out = reconcile(&[first, second], &attrs, 5.0);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].velocity(), &OneOrMany::One(11));
    }

    #[test]
    fn test_unmatched_aligned_rows_are_dropped_and_counted() {
        let attrs = vec![ScoreNoteAttribute::new("n1", 1000.0, 60)];
        let wrong_pitch = aligned("x", 1.0, 61, 30);
        let report = reconcile_with_report(&[wrong_pitch], &attrs, &ReconcileConfig::default());
        assert!(report.observations.is_empty());
        assert_eq!(report.match_failures, 1);
        assert_eq!(report.warnings[0].code, WarningCode::MatchFailure);
    }

    #[test]
    fn test_malformed_attributes_skipped_during_indexing() {
        let attrs = vec![
            ScoreNoteAttribute::new("", 1000.0, 60),
            ScoreNoteAttribute::new("n2", f64::NAN, 60),
            ScoreNoteAttribute::new("n3", 1000.0, 60),
        ];
        let report = reconcile_with_report(
            &[aligned("n3", 1.0, 60, 30)],
            &attrs,
            &ReconcileConfig::default(),
        );
        assert_eq!(report.skipped_attributes, 2);
        assert_eq!(ids(&report.observations[0]), vec!["n3"]);
    }

    #[test]
    fn test_matches_precede_insertions_at_equal_onset() {
        let attrs = vec![ScoreNoteAttribute::new("n1", 2000.0, 60)];
        let out = reconcile(
            &[inserted(2.0, "D4", 1), aligned("n1", 2.0, 60, 2)],
            &attrs,
            5.0,
        );
        assert_eq!(ids(&out[0]), vec!["n1"]);
        assert_eq!(ids(&out[1]), vec!["trompa-align_inserted_D4"]);
    }

    #[test]
    fn test_ordering_and_numbering() {
        let attrs = vec![
            ScoreNoteAttribute::new("n1", 3000.0, 60),
            ScoreNoteAttribute::new("n2", 1000.0, 62),
            ScoreNoteAttribute::new("n3", 2000.0, 64),
        ];
        let out = reconcile(
            &[
                aligned("n1", 3.0, 60, 1),
                inserted(0.5, "B3", 2),
                aligned("n2", 1.0, 62, 3),
                aligned("n3", 2.0, 64, 4),
            ],
            &attrs,
            5.0,
        );
        let nums: Vec<usize> = out.iter().map(|o| o.obs_num).collect();
        assert_eq!(nums, vec![1, 2, 3, 4]);
        let onsets: Vec<f64> = out.iter().map(|o| o.obs_mean_onset).collect();
        assert_eq!(onsets, vec![0.5, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_grouped_members_sorted_by_distance_then_id() {
        let attrs = vec![
            ScoreNoteAttribute::new("b", 1000.0, 60),
            ScoreNoteAttribute::new("a", 1000.0, 64),
            ScoreNoteAttribute::new("c", 1000.0, 67),
        ];
        let mut rb = aligned("b", 1.0, 60, 1);
        rb.ref_onset_time = 1.0;
        let mut ra = aligned("a", 1.0, 64, 2);
        ra.ref_onset_time = 1.003;
        let mut rc = aligned("c", 1.0, 67, 3);
        rc.ref_onset_time = 1.0;

        let out = reconcile(&[ra, rb, rc], &attrs, 5.0);
        assert_eq!(out.len(), 1);
        assert_eq!(ids(&out[0]), vec!["b", "c", "a"]);
        assert_eq!(out[0].velocity(), &OneOrMany::Many(vec![1, 3, 2]));
    }

    #[test]
    fn test_reconcile_is_deterministic() {
        let attrs = vec![
            ScoreNoteAttribute::new("n2", 1000.0, 60),
            ScoreNoteAttribute::new("n1", 1000.0, 60),
            ScoreNoteAttribute::new("n3", 1500.0, 62),
        ];
        let rows = vec![
            aligned("n1", 1.0, 60, 10),
            aligned("n3", 1.5, 62, 20),
            inserted(1.2, "F#4", 30),
        ];
        let first = maps_to_json(&reconcile(&rows, &attrs, 5.0)).unwrap();
        let second = maps_to_json(&reconcile(&rows, &attrs, 5.0)).unwrap();
        assert_eq!(first, second);

        let mut shuffled = attrs.clone();
        shuffled.reverse();
        let third = maps_to_json(&reconcile(&rows, &shuffled, 5.0)).unwrap();
        assert_eq!(first, third);
    }
}
