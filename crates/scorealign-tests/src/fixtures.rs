//! Test fixtures: a small two-section score, its timemap, and corresp
//! tables for the standard expansions.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use scorealign_core::{RawAlignmentRow, ScoreNoteAttribute};

/// A two-section score. Section A holds a C4/E4 chord and a G4, section B
/// a single C5. `expansion-default` repeats A, `expansion-minimal` does not.
pub const SCORE_MEI: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<mei xmlns="http://www.music-encoding.org/ns/mei" meiversion="4.0.1">
  <meiHead>
    <fileDesc>
      <titleStmt>
        <title>Bagatelle in G minor</title>
        <respStmt><persName role="composer">Ludwig van Beethoven</persName></respStmt>
      </titleStmt>
    </fileDesc>
  </meiHead>
  <music><body><mdiv><score>
    <scoreDef key.sig="0"/>
    <section>
      <expansion xml:id="expansion-default" plist="#A #A #B"/>
      <expansion xml:id="expansion-minimal" plist="#A #B"/>
      <section xml:id="A">
        <measure n="1"><staff n="1"><layer n="1">
          <chord xml:id="c1"><note xml:id="a1" pname="c" oct="4"/><note xml:id="a2" pname="e" oct="4"/></chord>
          <note xml:id="a3" pname="g" oct="4"/>
        </layer></staff></measure>
      </section>
      <section xml:id="B">
        <measure n="2"><staff n="1"><layer n="1">
          <note xml:id="b1" pname="c" oct="5"/>
        </layer></staff></measure>
      </section>
    </section>
  </score></mdiv></body></music>
</mei>
"##;

/// Timemap the stand-in renderer returns for [`SCORE_MEI`].
pub const TIMEMAP: &str = r#"[
  {"tstamp": 0, "qstamp": 0, "tempo": 120, "on": ["a1", "a2"]},
  {"tstamp": 500, "qstamp": 1, "on": ["a3"], "off": ["a1", "a2"]},
  {"tstamp": 1000, "qstamp": 2, "on": ["b1"], "off": ["a3"]},
  {"tstamp": 1500, "qstamp": 3, "off": ["b1"]}
]"#;

/// Header line written by the final SMAT stage.
pub const CORRESP_HEADER: &str = "//Version: PianoRollToCorresp_v170101";

/// Aligned rows for every note of the minimal rendering.
pub const CORRESP_MATCHED: &[&str] = &[
    "0\t0.010\tC4\t60\t70\tr0\t0.0\tC4\t60\t80",
    "1\t0.010\tE4\t64\t72\tr1\t0.0\tE4\t64\t80",
    "2\t0.520\tG4\t67\t65\tr2\t0.5\tG4\t67\t80",
    "3\t1.030\tC5\t72\t60\tr3\t1.0\tC5\t72\t80",
];

/// Performed notes with no reference note.
pub const CORRESP_INSERTED: &[&str] = &[
    "4\t1.600\tF#4\t66\t40\t*\t*\t*\t*\t*",
    "5\t1.700\tA4\t69\t45\t*\t*\t*\t*\t*",
];

/// Corresp table with the given rows under the standard header.
pub fn corresp(rows: &[&str]) -> String {
    let mut text = String::from(CORRESP_HEADER);
    text.push('\n');
    for row in rows {
        text.push_str(row);
        text.push('\n');
    }
    text
}

/// Table produced when the performance matches the minimal rendering.
pub fn corresp_minimal() -> String {
    corresp(CORRESP_MATCHED)
}

/// Table produced for the default rendering: the same matches plus two
/// insertions.
pub fn corresp_default() -> String {
    let rows: Vec<&str> = CORRESP_MATCHED
        .iter()
        .chain(CORRESP_INSERTED)
        .copied()
        .collect();
    corresp(&rows)
}

/// Score attributes matching [`TIMEMAP`].
pub fn score_attributes() -> Vec<ScoreNoteAttribute> {
    vec![
        ScoreNoteAttribute::new("a1", 0.0, 60),
        ScoreNoteAttribute::new("a2", 0.0, 64),
        ScoreNoteAttribute::new("a3", 500.0, 67),
        ScoreNoteAttribute::new("b1", 1000.0, 72),
    ]
}

/// An aligned row with reference onset `ref_onset` seconds.
pub fn aligned_row(ref_id: &str, align_onset: f64, ref_onset: f64, pitch: i32, velocity: i32) -> RawAlignmentRow {
    RawAlignmentRow {
        align_id: format!("p-{}", ref_id),
        align_onset_time: align_onset,
        align_pitch_name: "C4".to_string(),
        align_pitch: pitch,
        align_velocity: velocity,
        ref_id: ref_id.to_string(),
        ref_onset_time: ref_onset,
        ref_pitch_name: "C4".to_string(),
        ref_pitch: pitch,
        ref_velocity: 80,
    }
}

/// A performed note with no reference note.
pub fn inserted_row(align_onset: f64, pitch_name: &str, pitch: i32, velocity: i32) -> RawAlignmentRow {
    RawAlignmentRow {
        align_id: format!("p-ins-{}", pitch_name),
        align_onset_time: align_onset,
        align_pitch_name: pitch_name.to_string(),
        align_pitch: pitch,
        align_velocity: velocity,
        ref_id: "-1".to_string(),
        ref_onset_time: -1.0,
        ref_pitch_name: "-1".to_string(),
        ref_pitch: -1,
        ref_velocity: -1,
    }
}

/// Bytes standing in for a performance MIDI file.
pub fn performance_midi(label: &str) -> Vec<u8> {
    format!("MThd performance {}\n", label).into_bytes()
}

/// A scratch directory holding the score and performances.
pub struct Fixture {
    pub root: TempDir,
    pub score: PathBuf,
    pub performances: PathBuf,
    pub out: PathBuf,
}

impl Fixture {
    /// Create a fixture with the score written and empty performance and
    /// output directories.
    pub fn new() -> Self {
        let root = TempDir::new().expect("Failed to create temp dir");
        let score = root.path().join("bagatelle.mei");
        fs::write(&score, SCORE_MEI).expect("Failed to write score");
        let performances = root.path().join("performances");
        fs::create_dir_all(&performances).expect("Failed to create performance dir");
        let out = root.path().join("out");
        Self {
            root,
            score,
            performances,
            out,
        }
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    /// Adds a performance file and returns its path.
    pub fn add_performance(&self, name: &str, content: &[u8]) -> PathBuf {
        let path = self.performances.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create performance subdir");
        }
        fs::write(&path, content).expect("Failed to write performance");
        path
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}
