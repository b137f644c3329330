//! Cross-validation of the reconciliation engine.
//!
//! [`legacy_reconcile`] is a deliberately naive implementation: no pitch
//! index, a quadratic scan over every attribute for every row. Running it
//! beside [`crate::reconcile::reconcile`] and comparing the outputs with
//! [`verify_equivalent`] catches regressions in the indexed engine.
//!
//! Only compiled for tests or with the `verification` feature.

use std::collections::HashMap;

use crate::attributes::ScoreNoteAttribute;
use crate::corresp::RawAlignmentRow;
use crate::error::{CoreError, CoreResult};
use crate::observation::{insertion_id, MapsObservation, DEFAULT_INSERTION_PREFIX};

/// Reconciles by scanning every attribute for every aligned row.
pub fn legacy_reconcile(
    rows: &[RawAlignmentRow],
    attrs: &[ScoreNoteAttribute],
    threshold_ms: f64,
) -> Vec<MapsObservation> {
    let mut usable: Vec<&ScoreNoteAttribute> = attrs
        .iter()
        .filter(|a| !a.id.is_empty() && a.timestamp_ms.is_finite())
        .collect();
    usable.sort_by(|a, b| {
        a.id.cmp(&b.id)
            .then_with(|| a.timestamp_ms.total_cmp(&b.timestamp_ms))
    });

    // id -> (row, distance); replaced only by a strictly closer row
    let mut best: HashMap<&str, (&RawAlignmentRow, f64)> = HashMap::new();
    for row in rows.iter().filter(|r| !r.is_insertion()) {
        if !row.ref_onset_time.is_finite() || !row.align_onset_time.is_finite() {
            continue;
        }
        for attr in &usable {
            if attr.midi_pitch != row.ref_pitch {
                continue;
            }
            let distance = (row.ref_onset_time * 1000.0 - attr.timestamp_ms).abs();
            if distance > threshold_ms {
                continue;
            }
            match best.get(attr.id.as_str()) {
                Some(&(_, current)) if current <= distance => {}
                _ => {
                    best.insert(attr.id.as_str(), (row, distance));
                }
            }
        }
    }

    let mut matched: Vec<(&str, &RawAlignmentRow, f64)> = best
        .into_iter()
        .map(|(id, (row, distance))| (id, row, distance))
        .collect();
    matched.sort_by(|a, b| {
        a.1.align_onset_time
            .total_cmp(&b.1.align_onset_time)
            .then_with(|| a.2.total_cmp(&b.2))
            .then_with(|| a.0.cmp(b.0))
    });

    let mut out: Vec<MapsObservation> = Vec::new();
    let mut start = 0;
    while start < matched.len() {
        let onset = matched[start].1.align_onset_time;
        let end = matched[start..]
            .iter()
            .position(|m| m.1.align_onset_time != onset)
            .map_or(matched.len(), |offset| start + offset);
        let (ids, velocities): (Vec<String>, Vec<i32>) = matched[start..end]
            .iter()
            .map(|(id, row, _)| (id.to_string(), row.align_velocity))
            .unzip();
        out.push(MapsObservation::from_parts(onset, ids, velocities));
        start = end;
    }

    for row in rows.iter().filter(|r| r.is_insertion()) {
        out.push(MapsObservation::single(
            row.align_onset_time,
            insertion_id(DEFAULT_INSERTION_PREFIX, &row.align_pitch_name),
            row.align_velocity,
        ));
    }

    out.sort_by(|a, b| a.obs_mean_onset.total_cmp(&b.obs_mean_onset));
    for (i, obs) in out.iter_mut().enumerate() {
        obs.obs_num = i + 1;
    }
    out
}

fn sort_key(obs: &MapsObservation) -> (f64, String) {
    let first = obs
        .xml_id()
        .as_slice()
        .first()
        .cloned()
        .unwrap_or_default();
    (obs.obs_mean_onset, first)
}

/// Asserts that two reconciliation outputs are structurally equal.
///
/// Both lists are sorted by `(obs_mean_onset, first xml_id)` before
/// comparison. The first differing record is reported as JSON.
pub fn verify_equivalent(left: &[MapsObservation], right: &[MapsObservation]) -> CoreResult<()> {
    let mut left_sorted: Vec<&MapsObservation> = left.iter().collect();
    let mut right_sorted: Vec<&MapsObservation> = right.iter().collect();
    let by_key = |a: &&MapsObservation, b: &&MapsObservation| {
        let (ka, ia) = sort_key(a);
        let (kb, ib) = sort_key(b);
        ka.total_cmp(&kb).then_with(|| ia.cmp(&ib))
    };
    left_sorted.sort_by(by_key);
    right_sorted.sort_by(by_key);

    let longest = left_sorted.len().max(right_sorted.len());
    for index in 0..longest {
        let l = left_sorted.get(index).copied();
        let r = right_sorted.get(index).copied();
        if l != r {
            return Err(CoreError::VerificationMismatch {
                index,
                left: render(l)?,
                right: render(r)?,
                left_len: left.len(),
                right_len: right.len(),
            });
        }
    }
    Ok(())
}

fn render(obs: Option<&MapsObservation>) -> CoreResult<String> {
    match obs {
        Some(obs) => Ok(serde_json::to_string(obs)?),
        None => Ok("<missing>".to_string()),
    }
}

/// Runs both implementations and verifies they agree.
pub fn cross_check(
    rows: &[RawAlignmentRow],
    attrs: &[ScoreNoteAttribute],
    threshold_ms: f64,
) -> CoreResult<Vec<MapsObservation>> {
    let indexed = crate::reconcile::reconcile(rows, attrs, threshold_ms);
    let legacy = legacy_reconcile(rows, attrs, threshold_ms);
    verify_equivalent(&indexed, &legacy)?;
    Ok(indexed)
}
