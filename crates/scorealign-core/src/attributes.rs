//! Score note attributes: identifier, rendered onset, and MIDI pitch for
//! every notated note.

use serde::{Deserialize, Serialize};

use crate::error::{CoreResult, InputWarning, WarningCode};

/// Timing and pitch of one notated score note.
///
/// Serialises as `{"id": .., "tstamp": .., "midiPitch": ..}`, the shape of
/// the note position file written by the score note extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreNoteAttribute {
    /// The score's identifier for this note (MEI `xml:id`).
    pub id: String,
    /// Onset in milliseconds from the start of the rendering.
    #[serde(rename = "tstamp")]
    pub timestamp_ms: f64,
    /// MIDI pitch number.
    #[serde(rename = "midiPitch")]
    pub midi_pitch: i32,
}

impl ScoreNoteAttribute {
    /// Creates a new attribute.
    pub fn new(id: impl Into<String>, timestamp_ms: f64, midi_pitch: i32) -> Self {
        Self {
            id: id.into(),
            timestamp_ms,
            midi_pitch,
        }
    }
}

/// Loosely typed attribute record as found in note position JSON.
#[derive(Debug, Clone, Default, Deserialize)]
struct AttributeRecord {
    id: Option<String>,
    tstamp: Option<f64>,
    #[serde(rename = "midiPitch")]
    midi_pitch: Option<i64>,
}

impl AttributeRecord {
    fn validate(self) -> Result<ScoreNoteAttribute, &'static str> {
        let id = self.id.filter(|id| !id.is_empty()).ok_or("missing id")?;
        let timestamp_ms = self
            .tstamp
            .filter(|t| t.is_finite())
            .ok_or("missing tstamp")?;
        let midi_pitch = self
            .midi_pitch
            .and_then(|p| i32::try_from(p).ok())
            .ok_or("missing midiPitch")?;
        Ok(ScoreNoteAttribute {
            id,
            timestamp_ms,
            midi_pitch,
        })
    }
}

/// Validated attributes plus the records that had to be skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeSet {
    /// Valid attributes in input order.
    pub attributes: Vec<ScoreNoteAttribute>,
    /// One warning per skipped record.
    pub warnings: Vec<InputWarning>,
}

impl AttributeSet {
    /// Number of skipped records.
    pub fn skipped_attributes(&self) -> usize {
        self.warnings.len()
    }
}

/// Parses a note position JSON document.
///
/// The document is either an array of records or a single record. Records
/// missing `id`, `tstamp` or `midiPitch` (or holding values of the wrong
/// type) are skipped and counted. Only a document that is not JSON at all is
/// an error.
pub fn parse_attributes_json(text: &str) -> CoreResult<AttributeSet> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    let records = match value {
        serde_json::Value::Array(items) => items,
        other => vec![other],
    };

    let mut set = AttributeSet::default();
    for (index, record) in records.into_iter().enumerate() {
        let parsed = serde_json::from_value::<AttributeRecord>(record)
            .map_err(|_| "record has wrong field types")
            .and_then(AttributeRecord::validate);
        match parsed {
            Ok(attr) => set.attributes.push(attr),
            Err(reason) => {
                let warning =
                    InputWarning::at(WarningCode::MalformedAttribute, reason, format!("[{}]", index));
                tracing::debug!(%warning, "skipping score note attribute");
                set.warnings.push(warning);
            }
        }
    }

    Ok(set)
}

/// Serialises attributes to the note position JSON format.
pub fn attributes_to_json(attributes: &[ScoreNoteAttribute]) -> CoreResult<String> {
    Ok(serde_json::to_string(attributes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_valid_attributes() {
        let json = r#"[
            {"id": "n1", "tstamp": 1000, "midiPitch": 60},
            {"id": "n2", "tstamp": 1000.5, "midiPitch": 64}
        ]"#;
        let set = parse_attributes_json(json).unwrap();
        assert_eq!(
            set.attributes,
            vec![
                ScoreNoteAttribute::new("n1", 1000.0, 60),
                ScoreNoteAttribute::new("n2", 1000.5, 64),
            ]
        );
        assert_eq!(set.skipped_attributes(), 0);
    }

    #[test]
    fn test_malformed_attributes_are_skipped() {
        let json = r#"[
            {"id": "n1", "tstamp": 1000, "midiPitch": 60},
            {"tstamp": 1200, "midiPitch": 62},
            {"id": "n3", "midiPitch": 64},
            {"id": "n4", "tstamp": 1400},
            {"id": "n5", "tstamp": "late", "midiPitch": 65}
        ]"#;
        let set = parse_attributes_json(json).unwrap();
        assert_eq!(set.attributes.len(), 1);
        assert_eq!(set.skipped_attributes(), 4);
        assert_eq!(set.warnings[0].message, "missing id");
        assert_eq!(set.warnings[1].message, "missing tstamp");
        assert_eq!(set.warnings[2].message, "missing midiPitch");
        assert_eq!(set.warnings[3].location.as_deref(), Some("[4]"));
    }

    #[test]
    fn test_single_record_document() {
        let set = parse_attributes_json(r#"{"id": "n9", "tstamp": 0, "midiPitch": 72}"#).unwrap();
        assert_eq!(set.attributes, vec![ScoreNoteAttribute::new("n9", 0.0, 72)]);
    }

    #[test]
    fn test_not_json_is_an_error() {
        assert!(parse_attributes_json("not json").is_err());
    }

    #[test]
    fn test_serialized_field_names() {
        let json = attributes_to_json(&[ScoreNoteAttribute::new("n1", 250.0, 67)]).unwrap();
        assert_eq!(json, r#"[{"id":"n1","tstamp":250.0,"midiPitch":67}]"#);
    }
}
