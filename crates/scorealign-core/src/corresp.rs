//! Correspondence ("corresp") table parsing.
//!
//! The aligner's final stage writes a tab-separated table with one row per
//! performed note. The first line is a header. Each data row has ten columns
//! in fixed order:
//!
//! ```text
//! alignID  alignOntime  alignSitch  alignPitch  alignOnvel  refID  refOntime  refSitch  refPitch  refOnvel
//! ```
//!
//! A `*` field is the aligner's "nothing here" marker and is normalised to
//! `-1` before parsing. A `refID` of `-1` marks a performed note with no
//! reference note (an insertion).

use serde::{Deserialize, Serialize};

use crate::error::{InputWarning, WarningCode};

/// Sentinel identifier used for "no reference note".
pub const NO_REFERENCE: &str = "-1";

/// Number of columns in a corresp data row.
pub const CORRESP_COLUMNS: usize = 10;

/// One row of the aligner's correspondence table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAlignmentRow {
    /// Identifier of the performed note.
    pub align_id: String,
    /// Performed onset in seconds.
    pub align_onset_time: f64,
    /// Spelled pitch name of the performed note (e.g. "C#4").
    pub align_pitch_name: String,
    /// MIDI pitch of the performed note.
    pub align_pitch: i32,
    /// MIDI velocity of the performed note.
    pub align_velocity: i32,
    /// Identifier into the canonical MIDI, or [`NO_REFERENCE`].
    pub ref_id: String,
    /// Reference onset in seconds.
    pub ref_onset_time: f64,
    /// Spelled pitch name of the reference note.
    pub ref_pitch_name: String,
    /// MIDI pitch of the reference note.
    pub ref_pitch: i32,
    /// MIDI velocity of the reference note.
    pub ref_velocity: i32,
}

impl RawAlignmentRow {
    /// Returns true if this performed note has no reference note.
    pub fn is_insertion(&self) -> bool {
        self.ref_id == NO_REFERENCE
    }

    /// Reference onset in milliseconds, the unit used for matching.
    pub fn timestamp_ms(&self) -> f64 {
        self.ref_onset_time * 1000.0
    }

    /// Parses a single tab-separated data row.
    ///
    /// Returns `Err` with a warning when the row is short or a numeric field
    /// does not parse.
    pub fn from_tsv_line(line: &str) -> Result<Self, InputWarning> {
        let fields: Vec<&str> = line.split('\t').map(normalize_field).collect();
        if fields.len() < CORRESP_COLUMNS {
            return Err(InputWarning::new(
                WarningCode::ShortRow,
                format!(
                    "expected {} columns, found {}",
                    CORRESP_COLUMNS,
                    fields.len()
                ),
            ));
        }

        Ok(Self {
            align_id: fields[0].to_string(),
            align_onset_time: parse_field(fields[1], "alignOntime")?,
            align_pitch_name: fields[2].to_string(),
            align_pitch: parse_field(fields[3], "alignPitch")?,
            align_velocity: parse_field(fields[4], "alignOnvel")?,
            ref_id: fields[5].to_string(),
            ref_onset_time: parse_field(fields[6], "refOntime")?,
            ref_pitch_name: fields[7].to_string(),
            ref_pitch: parse_field(fields[8], "refPitch")?,
            ref_velocity: parse_field(fields[9], "refOnvel")?,
        })
    }
}

fn normalize_field(field: &str) -> &str {
    let field = field.trim();
    if field == "*" {
        NO_REFERENCE
    } else {
        field
    }
}

fn parse_field<T: std::str::FromStr>(value: &str, column: &str) -> Result<T, InputWarning> {
    value.parse().map_err(|_| {
        InputWarning::new(
            WarningCode::MalformedRow,
            format!("column {} has unparsable value '{}'", column, value),
        )
    })
}

/// A parsed correspondence table plus the rows that had to be skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorrespTable {
    /// Successfully parsed rows in file order.
    pub rows: Vec<RawAlignmentRow>,
    /// One warning per skipped row.
    pub warnings: Vec<InputWarning>,
}

impl CorrespTable {
    /// Number of rows that were skipped as malformed.
    pub fn skipped_rows(&self) -> usize {
        self.warnings.len()
    }

    /// Number of rows marked as insertions.
    pub fn insertion_count(&self) -> usize {
        self.rows.iter().filter(|r| r.is_insertion()).count()
    }
}

/// Parses the aligner's corresp text.
///
/// The first line is always treated as the header. Blank lines and `//`
/// comment lines are ignored without a warning; short or unparsable rows are
/// skipped and recorded in [`CorrespTable::warnings`].
pub fn parse_corresp(text: &str) -> CorrespTable {
    let mut table = CorrespTable::default();

    for (index, line) in text.lines().enumerate().skip(1) {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() || line.starts_with("//") {
            continue;
        }
        match RawAlignmentRow::from_tsv_line(line) {
            Ok(row) => table.rows.push(row),
            Err(mut warning) => {
                warning.location = Some(format!("line {}", index + 1));
                tracing::debug!(%warning, "skipping corresp row");
                table.warnings.push(warning);
            }
        }
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const HEADER: &str = "//Version: PianoRollToCorresp_v170101";

    #[test]
    fn test_parse_aligned_row() {
        let text = format!(
            "{}\n0\t1.001\tC4\t60\t64\tP1-1-1\t1.000\tC4\t60\t80\n",
            HEADER
        );
        let table = parse_corresp(&text);
        assert_eq!(table.skipped_rows(), 0);
        assert_eq!(
            table.rows,
            vec![RawAlignmentRow {
                align_id: "0".to_string(),
                align_onset_time: 1.001,
                align_pitch_name: "C4".to_string(),
                align_pitch: 60,
                align_velocity: 64,
                ref_id: "P1-1-1".to_string(),
                ref_onset_time: 1.0,
                ref_pitch_name: "C4".to_string(),
                ref_pitch: 60,
                ref_velocity: 80,
            }]
        );
        assert!(!table.rows[0].is_insertion());
        assert_eq!(table.rows[0].timestamp_ms(), 1000.0);
    }

    #[test]
    fn test_star_fields_become_insertions() {
        let text = format!("{}\n4\t3.0\tA4\t69\t70\t*\t-1\t*\t-1\t-1\n", HEADER);
        let table = parse_corresp(&text);
        assert_eq!(table.rows.len(), 1);
        let row = &table.rows[0];
        assert!(row.is_insertion());
        assert_eq!(row.ref_id, "-1");
        assert_eq!(row.ref_pitch_name, "-1");
        assert_eq!(table.insertion_count(), 1);
    }

    #[test]
    fn test_short_rows_are_skipped_and_counted() {
        let text = format!(
            "{}\n1\t0.5\tD4\t62\n2\t0.7\tE4\t64\t50\tP1-1-2\t0.7\tE4\t64\t80\n",
            HEADER
        );
        let table = parse_corresp(&text);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.skipped_rows(), 1);
        assert_eq!(table.warnings[0].code, WarningCode::ShortRow);
        assert_eq!(table.warnings[0].location.as_deref(), Some("line 2"));
    }

    #[test]
    fn test_unparsable_numbers_are_skipped() {
        let text = format!("{}\n1\tsoon\tD4\t62\t50\tP1\t0.5\tD4\t62\t80\n", HEADER);
        let table = parse_corresp(&text);
        assert!(table.rows.is_empty());
        assert_eq!(table.warnings[0].code, WarningCode::MalformedRow);
        assert!(table.warnings[0].message.contains("alignOntime"));
    }

    #[test]
    fn test_header_blank_and_comment_lines_ignored() {
        let text = "alignID\talignOntime\n\n// trailing comment\n";
        let table = parse_corresp(text);
        assert!(table.rows.is_empty());
        assert_eq!(table.skipped_rows(), 0);
    }

    #[test]
    fn test_crlf_line_endings() {
        let text = format!(
            "{}\r\n0\t1.5\tG4\t67\t90\tP1-2-1\t1.5\tG4\t67\t80\r\n",
            HEADER
        );
        let table = parse_corresp(&text);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].ref_velocity, 80);
    }
}
