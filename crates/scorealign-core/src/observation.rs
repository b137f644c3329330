//! MAPS observations, the final output unit of reconciliation.
//!
//! An observation is one performed onset. It links to one score note, to
//! several score notes sounded together, or to a synthetic identifier for a
//! performed note that the score does not contain.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Default prefix for identifiers synthesised for inserted notes.
pub const DEFAULT_INSERTION_PREFIX: &str = "trompa-align_inserted_";

/// A value that serialises as a scalar when there is one of it and as an
/// array otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    /// Exactly one value.
    One(T),
    /// A list of values (a grouped onset).
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    /// Number of values.
    pub fn len(&self) -> usize {
        match self {
            OneOrMany::One(_) => 1,
            OneOrMany::Many(v) => v.len(),
        }
    }

    /// Returns true if there are no values.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if this is the list form.
    pub fn is_many(&self) -> bool {
        matches!(self, OneOrMany::Many(_))
    }

    /// Borrows the values as a slice.
    pub fn as_slice(&self) -> &[T] {
        match self {
            OneOrMany::One(v) => std::slice::from_ref(v),
            OneOrMany::Many(v) => v.as_slice(),
        }
    }

    /// Builds the scalar form for one value and the list form otherwise.
    pub fn from_vec(mut values: Vec<T>) -> Self {
        if values.len() == 1 {
            OneOrMany::One(values.remove(0))
        } else {
            OneOrMany::Many(values)
        }
    }
}

/// One performed onset linked to score note identifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ObservationRecord")]
pub struct MapsObservation {
    /// Performed onset in seconds.
    pub obs_mean_onset: f64,
    xml_id: OneOrMany<String>,
    velocity: OneOrMany<i32>,
    /// Reserved, always 0.
    pub confidence: i32,
    /// 1-based position after final ordering (0 until numbered).
    pub obs_num: usize,
}

impl MapsObservation {
    /// Creates an observation for a single score note (or an insertion).
    pub fn single(onset: f64, xml_id: impl Into<String>, velocity: i32) -> Self {
        Self {
            obs_mean_onset: onset,
            xml_id: OneOrMany::One(xml_id.into()),
            velocity: OneOrMany::One(velocity),
            confidence: 0,
            obs_num: 0,
        }
    }

    /// Creates an observation for notes sharing one onset.
    ///
    /// A single member produces the scalar form. Empty groups are rejected.
    pub fn group(onset: f64, members: Vec<(String, i32)>) -> CoreResult<Self> {
        if members.is_empty() {
            return Err(CoreError::InvalidObservation(
                "observation group has no members".to_string(),
            ));
        }
        let (ids, velocities): (Vec<String>, Vec<i32>) = members.into_iter().unzip();
        Ok(Self {
            obs_mean_onset: onset,
            xml_id: OneOrMany::from_vec(ids),
            velocity: OneOrMany::from_vec(velocities),
            confidence: 0,
            obs_num: 0,
        })
    }

    /// Builds a grouped observation from parallel, non-empty lists.
    pub(crate) fn from_parts(onset: f64, ids: Vec<String>, velocities: Vec<i32>) -> Self {
        debug_assert!(!ids.is_empty() && ids.len() == velocities.len());
        Self {
            obs_mean_onset: onset,
            xml_id: OneOrMany::from_vec(ids),
            velocity: OneOrMany::from_vec(velocities),
            confidence: 0,
            obs_num: 0,
        }
    }

    /// Linked identifiers.
    pub fn xml_id(&self) -> &OneOrMany<String> {
        &self.xml_id
    }

    /// Velocities, positionally matching [`Self::xml_id`].
    pub fn velocity(&self) -> &OneOrMany<i32> {
        &self.velocity
    }

    /// Iterates `(identifier, velocity)` pairs.
    pub fn members(&self) -> impl Iterator<Item = (&str, i32)> {
        self.xml_id
            .as_slice()
            .iter()
            .map(String::as_str)
            .zip(self.velocity.as_slice().iter().copied())
    }

    /// Mean velocity of the observation's notes.
    pub fn mean_velocity(&self) -> f64 {
        let values = self.velocity.as_slice();
        values.iter().map(|&v| v as f64).sum::<f64>() / values.len() as f64
    }
}

#[derive(Debug, Deserialize)]
struct ObservationRecord {
    obs_mean_onset: f64,
    xml_id: OneOrMany<String>,
    velocity: OneOrMany<i32>,
    #[serde(default)]
    confidence: i32,
    #[serde(default)]
    obs_num: usize,
}

impl TryFrom<ObservationRecord> for MapsObservation {
    type Error = CoreError;

    fn try_from(record: ObservationRecord) -> Result<Self, Self::Error> {
        if record.xml_id.is_many() != record.velocity.is_many()
            || record.xml_id.len() != record.velocity.len()
        {
            return Err(CoreError::InvalidObservation(format!(
                "xml_id has {} value(s) but velocity has {}",
                record.xml_id.len(),
                record.velocity.len()
            )));
        }
        if record.xml_id.is_empty() {
            return Err(CoreError::InvalidObservation(
                "observation has no xml_id".to_string(),
            ));
        }
        Ok(Self {
            obs_mean_onset: record.obs_mean_onset,
            xml_id: record.xml_id,
            velocity: record.velocity,
            confidence: record.confidence,
            obs_num: record.obs_num,
        })
    }
}

fn non_uri_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9_\-]").expect("static regex"))
}

/// Makes a spelled pitch name safe for use in an identifier.
///
/// `#` becomes `s` (so `C#4` becomes `Cs4`); any other character outside
/// `[A-Za-z0-9_-]` becomes `_`.
pub fn sanitize_pitch_name(pitch_name: &str) -> String {
    let sharps = pitch_name.replace('#', "s");
    non_uri_chars().replace_all(&sharps, "_").into_owned()
}

/// Builds the synthetic identifier for an inserted note.
pub fn insertion_id(prefix: &str, pitch_name: &str) -> String {
    format!("{}{}", prefix, sanitize_pitch_name(pitch_name))
}

/// Returns true if `xml_id` was synthesised for an inserted note.
pub fn is_insertion_id(prefix: &str, xml_id: &str) -> bool {
    xml_id.starts_with(prefix)
}

/// Serialises observations as the MAPS JSON array.
pub fn maps_to_json(observations: &[MapsObservation]) -> CoreResult<String> {
    Ok(serde_json::to_string(observations)?)
}

/// Parses a MAPS JSON array, enforcing the cardinality rule.
pub fn maps_from_json(text: &str) -> CoreResult<Vec<MapsObservation>> {
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_single_serializes_scalars() {
        let mut obs = MapsObservation::single(1.5, "n1", 64);
        obs.obs_num = 1;
        assert_eq!(
            maps_to_json(&[obs]).unwrap(),
            r#"[{"obs_mean_onset":1.5,"xml_id":"n1","velocity":64,"confidence":0,"obs_num":1}]"#
        );
    }

    #[test]
    fn test_group_serializes_lists() {
        let obs = MapsObservation::group(
            2.0,
            vec![("n1".to_string(), 60), ("n2".to_string(), 70)],
        )
        .unwrap();
        let json = maps_to_json(&[obs]).unwrap();
        assert!(json.contains(r#""xml_id":["n1","n2"]"#));
        assert!(json.contains(r#""velocity":[60,70]"#));
    }

    #[test]
    fn test_group_of_one_is_scalar() {
        let obs = MapsObservation::group(2.0, vec![("n1".to_string(), 60)]).unwrap();
        assert!(!obs.xml_id().is_many());
        assert!(!obs.velocity().is_many());
    }

    #[test]
    fn test_empty_group_rejected() {
        assert!(MapsObservation::group(2.0, Vec::new()).is_err());
    }

    #[test]
    fn test_deserialize_rejects_cardinality_mismatch() {
        let json = r#"[{"obs_mean_onset":1.0,"xml_id":["a","b"],"velocity":64,"confidence":0,"obs_num":1}]"#;
        assert!(maps_from_json(json).is_err());

        let json = r#"[{"obs_mean_onset":1.0,"xml_id":["a","b"],"velocity":[64],"confidence":0,"obs_num":1}]"#;
        assert!(maps_from_json(json).is_err());
    }

    #[test]
    fn test_deserialize_roundtrip_preserves_shape() {
        let json = r#"[{"obs_mean_onset":0.25,"xml_id":["a","b"],"velocity":[10,20],"confidence":0,"obs_num":1},{"obs_mean_onset":0.5,"xml_id":"c","velocity":30,"confidence":0,"obs_num":2}]"#;
        let parsed = maps_from_json(json).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(
            parsed[0].members().collect::<Vec<_>>(),
            vec![("a", 10), ("b", 20)]
        );
        assert_eq!(maps_to_json(&parsed).unwrap(), json);
    }

    #[test]
    fn test_mean_velocity() {
        let obs = MapsObservation::group(
            0.0,
            vec![("a".to_string(), 64), ("b".to_string(), 65)],
        )
        .unwrap();
        assert_eq!(obs.mean_velocity(), 64.5);
    }

    #[test]
    fn test_insertion_id_sanitizes_sharps() {
        assert_eq!(
            insertion_id(DEFAULT_INSERTION_PREFIX, "C#4"),
            "trompa-align_inserted_Cs4"
        );
        assert_eq!(insertion_id("ins_", "Bb3"), "ins_Bb3");
        assert_eq!(insertion_id("ins_", "F##5"), "ins_Fss5");
        assert_eq!(insertion_id("ins_", "E 4/"), "ins_E_4_");
        assert!(is_insertion_id(DEFAULT_INSERTION_PREFIX, "trompa-align_inserted_A4"));
        assert!(!is_insertion_id(DEFAULT_INSERTION_PREFIX, "note-0001"));
    }
}
