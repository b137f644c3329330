//! MEI inspection.
//!
//! Streaming reads over MEI markup with `quick-xml`: per-note MIDI pitch,
//! expansion lists, note counts per expansion, and header metadata.

use std::collections::{BTreeSet, HashMap};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Serialize;

use crate::error::MeiError;

/// A named linearisation of the score's sections (`<expansion plist=..>`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Expansion {
    pub id: String,
    /// Referenced element identifiers in play order, e.g. `["#A", "#A", "#B"]`.
    pub elements: Vec<String>,
}

/// Number of notes sounded when a score is rendered under one expansion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpansionNoteCount {
    pub id: String,
    pub note_count: usize,
}

/// Title and composer from the MEI header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScoreMetadata {
    pub title: String,
    pub composer: String,
}

fn reader(mei: &str) -> Reader<&[u8]> {
    let mut reader = Reader::from_str(mei);
    reader.trim_text(true);
    reader
}

fn xml_error(reader: &Reader<&[u8]>, err: quick_xml::Error) -> MeiError {
    MeiError {
        position: reader.buffer_position(),
        message: err.to_string(),
    }
}

fn attr(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name)
        .and_then(|a| a.unescape_value().ok().map(|v| v.trim().to_string()))
        .filter(|v| !v.is_empty())
}

fn xml_id(e: &BytesStart<'_>) -> Option<String> {
    attr(e, b"xml:id")
}

// ---------------------------------------------------------------------------
// Pitch
// ---------------------------------------------------------------------------

const STEPS: [u8; 7] = [b'c', b'd', b'e', b'f', b'g', b'a', b'b'];
const STEP_SEMITONES: [i32; 7] = [0, 2, 4, 5, 7, 9, 11];
const SHARP_ORDER: [u8; 7] = [b'f', b'c', b'g', b'd', b'a', b'e', b'b'];
const FLAT_ORDER: [u8; 7] = [b'b', b'e', b'a', b'd', b'g', b'c', b'f'];

/// Alteration per diatonic step (c..b) implied by a key signature.
pub type KeyAlterations = [i32; 7];

fn step_index(pname: &str) -> Option<usize> {
    let first = pname.bytes().next()?.to_ascii_lowercase();
    STEPS.iter().position(|&s| s == first)
}

/// Parses an MEI key signature value such as `"0"`, `"3s"` or `"2f"`.
pub fn parse_key_sig(sig: &str) -> Option<KeyAlterations> {
    let sig = sig.trim();
    let mut alterations = [0; 7];
    if sig == "0" {
        return Some(alterations);
    }
    let kind = sig.chars().last()?;
    let count: usize = sig[..sig.len() - kind.len_utf8()].parse().ok()?;
    let (order, delta) = match kind {
        's' => (SHARP_ORDER, 1),
        'f' => (FLAT_ORDER, -1),
        _ => return None,
    };
    for step in order.iter().take(count.min(7)) {
        if let Some(i) = STEPS.iter().position(|s| s == step) {
            alterations[i] = delta;
        }
    }
    Some(alterations)
}

/// Semitone offset of an MEI accidental value.
pub fn accid_alteration(accid: &str) -> Option<i32> {
    match accid {
        "n" | "nf" | "ns" => Some(0),
        "s" | "su" | "sd" => Some(1),
        "f" | "fu" | "fd" => Some(-1),
        "ss" | "x" | "xs" | "sx" => Some(2),
        "ff" => Some(-2),
        "ts" | "sxs" => Some(3),
        "tf" => Some(-3),
        _ => None,
    }
}

/// MIDI pitch for a spelled note.
pub fn midi_pitch(pname: &str, octave: i32, alteration: i32) -> Option<i32> {
    let step = step_index(pname)?;
    Some((octave + 1) * 12 + STEP_SEMITONES[step] + alteration)
}

#[derive(Debug, Default)]
struct PendingNote {
    id: Option<String>,
    pnum: Option<String>,
    pname: Option<String>,
    oct: Option<String>,
    accid_ges: Option<String>,
    accid: Option<String>,
    child_accid_ges: Option<String>,
    child_accid: Option<String>,
}

impl PendingNote {
    fn from_element(e: &BytesStart<'_>) -> Self {
        Self {
            id: xml_id(e),
            pnum: attr(e, b"pnum"),
            pname: attr(e, b"pname.ges").or_else(|| attr(e, b"pname")),
            oct: attr(e, b"oct.ges").or_else(|| attr(e, b"oct")),
            accid_ges: attr(e, b"accid.ges"),
            accid: attr(e, b"accid"),
            ..Self::default()
        }
    }

    fn add_child_accid(&mut self, e: &BytesStart<'_>) {
        if self.child_accid_ges.is_none() {
            self.child_accid_ges = attr(e, b"accid.ges");
        }
        if self.child_accid.is_none() {
            self.child_accid = attr(e, b"accid");
        }
    }

    fn resolve(&self, key: &KeyAlterations, staff: Option<&str>, carried: &mut MeasureAccidentals) -> Option<i32> {
        if let Some(pnum) = self.pnum.as_deref().and_then(|p| p.parse().ok()) {
            return Some(pnum);
        }
        let pname = self.pname.as_deref()?;
        let step = step_index(pname)?;
        let octave: i32 = self.oct.as_deref()?.parse().ok()?;
        let slot = (staff.map(str::to_string), step, octave);

        let written = [&self.accid, &self.child_accid]
            .into_iter()
            .flatten()
            .find_map(|a| accid_alteration(a));
        if let Some(a) = written {
            carried.0.insert(slot.clone(), a);
        }

        let explicit = [
            &self.accid_ges,
            &self.accid,
            &self.child_accid_ges,
            &self.child_accid,
        ]
        .into_iter()
        .flatten()
        .find_map(|a| accid_alteration(a));
        let alteration = explicit
            .or_else(|| carried.0.get(&slot).copied())
            .unwrap_or(key[step]);
        midi_pitch(pname, octave, alteration)
    }
}

/// Written accidentals in force until the end of the current measure, keyed
/// by staff, step and octave.
#[derive(Debug, Default)]
struct MeasureAccidentals(HashMap<(Option<String>, usize, i32), i32>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DefContext {
    Score,
    Staff,
}

/// Key signature state while walking the document.
#[derive(Debug, Default)]
struct KeyState {
    default: KeyAlterations,
    per_staff: HashMap<String, KeyAlterations>,
    current_staff: Option<String>,
    def_stack: Vec<(DefContext, Option<String>)>,
}

impl KeyState {
    fn current(&self) -> &KeyAlterations {
        self.current_staff
            .as_ref()
            .and_then(|n| self.per_staff.get(n))
            .unwrap_or(&self.default)
    }

    fn set_score_key(&mut self, key: KeyAlterations) {
        self.default = key;
        self.per_staff.clear();
    }

    fn apply_key_sig(&mut self, key: KeyAlterations) {
        match self.def_stack.last().cloned() {
            Some((DefContext::Score, _)) => self.set_score_key(key),
            Some((DefContext::Staff, Some(n))) => {
                self.per_staff.insert(n, key);
            }
            Some((DefContext::Staff, None)) => self.default = key,
            None => match self.current_staff.clone() {
                Some(n) => {
                    self.per_staff.insert(n, key);
                }
                None => self.default = key,
            },
        }
    }
}

/// Maps every identified note in an MEI document to its MIDI pitch.
///
/// `@pnum` wins when present. Otherwise the pitch is spelled from
/// `@pname`/`@oct` (or their `.ges` forms) with the first accidental found
/// among `@accid.ges`, `@accid` and a child `<accid>`. A written accidental
/// carries to later notes of the same step and octave on the same staff
/// until the measure ends; otherwise the prevailing key signature applies.
/// Notes whose pitch cannot be determined are left out.
pub fn note_pitches(mei: &str) -> Result<HashMap<String, i32>, MeiError> {
    let mut reader = reader(mei);
    let mut pitches = HashMap::new();
    let mut keys = KeyState::default();
    let mut carried = MeasureAccidentals::default();
    let mut pending: Option<PendingNote> = None;

    loop {
        let event = reader.read_event().map_err(|e| xml_error(&reader, e))?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                let name = e.local_name();
                match name.as_ref() {
                    b"scoreDef" => {
                        if let Some(key) = attr(e, b"key.sig").and_then(|s| parse_key_sig(&s)) {
                            keys.set_score_key(key);
                        }
                        if !is_empty {
                            keys.def_stack.push((DefContext::Score, None));
                        }
                    }
                    b"staffDef" => {
                        let n = attr(e, b"n");
                        if let Some(key) = attr(e, b"key.sig").and_then(|s| parse_key_sig(&s)) {
                            match n.clone() {
                                Some(n) => {
                                    keys.per_staff.insert(n, key);
                                }
                                None => keys.default = key,
                            }
                        }
                        if !is_empty {
                            keys.def_stack.push((DefContext::Staff, n));
                        }
                    }
                    b"keySig" => {
                        if let Some(key) = attr(e, b"sig").and_then(|s| parse_key_sig(&s)) {
                            keys.apply_key_sig(key);
                        }
                    }
                    b"measure" => carried.0.clear(),
                    b"staff" => keys.current_staff = attr(e, b"n"),
                    b"note" => {
                        let note = PendingNote::from_element(e);
                        if is_empty {
                            insert_pitch(&mut pitches, &note, &keys, &mut carried);
                        } else {
                            pending = Some(note);
                        }
                    }
                    b"accid" => {
                        if let Some(note) = pending.as_mut() {
                            note.add_child_accid(e);
                        }
                    }
                    _ => {}
                }
            }
            Event::End(ref e) => match e.local_name().as_ref() {
                b"note" => {
                    if let Some(note) = pending.take() {
                        insert_pitch(&mut pitches, &note, &keys, &mut carried);
                    }
                }
                b"scoreDef" | b"staffDef" => {
                    keys.def_stack.pop();
                }
                b"staff" => keys.current_staff = None,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(pitches)
}

fn insert_pitch(
    pitches: &mut HashMap<String, i32>,
    note: &PendingNote,
    keys: &KeyState,
    carried: &mut MeasureAccidentals,
) {
    let Some(id) = note.id.as_ref() else {
        return;
    };
    match note.resolve(keys.current(), keys.current_staff.as_deref(), carried) {
        Some(pitch) => {
            pitches.insert(id.clone(), pitch);
        }
        None => tracing::debug!(note = %id, "note has no determinable pitch"),
    }
}

// ---------------------------------------------------------------------------
// Expansions
// ---------------------------------------------------------------------------

/// Lists the expansions defined in an MEI document, in document order.
pub fn expansions(mei: &str) -> Result<Vec<Expansion>, MeiError> {
    let mut reader = reader(mei);
    let mut found = Vec::new();
    loop {
        match reader.read_event().map_err(|e| xml_error(&reader, e))? {
            Event::Start(ref e) | Event::Empty(ref e) if e.local_name().as_ref() == b"expansion" => {
                if let Some(id) = xml_id(e) {
                    let elements = attr(e, b"plist")
                        .map(|plist| plist.split_whitespace().map(str::to_string).collect())
                        .unwrap_or_default();
                    found.push(Expansion { id, elements });
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(found)
}

/// Counts notes per identified element (each note counts toward every
/// identified ancestor).
fn notes_per_element(mei: &str) -> Result<HashMap<String, usize>, MeiError> {
    let mut reader = reader(mei);
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut stack: Vec<Option<String>> = Vec::new();

    loop {
        match reader.read_event().map_err(|e| xml_error(&reader, e))? {
            Event::Start(ref e) => {
                if e.local_name().as_ref() == b"note" {
                    count_note(&mut counts, &stack);
                }
                stack.push(xml_id(e));
            }
            Event::Empty(ref e) => {
                if e.local_name().as_ref() == b"note" {
                    count_note(&mut counts, &stack);
                }
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(counts)
}

fn count_note(counts: &mut HashMap<String, usize>, stack: &[Option<String>]) {
    for id in stack.iter().flatten() {
        *counts.entry(id.clone()).or_default() += 1;
    }
}

/// Number of notes each expansion plays, following nested expansions.
///
/// A reference to an unknown element contributes nothing. A cycle of
/// expansions is cut at the point where it repeats.
pub fn count_notes_in_expansions(mei: &str) -> Result<Vec<ExpansionNoteCount>, MeiError> {
    let expansions = expansions(mei)?;
    let per_element = notes_per_element(mei)?;
    let by_id: HashMap<&str, &Expansion> =
        expansions.iter().map(|e| (e.id.as_str(), e)).collect();

    Ok(expansions
        .iter()
        .map(|expansion| {
            let mut visiting = BTreeSet::new();
            ExpansionNoteCount {
                id: expansion.id.clone(),
                note_count: expansion_notes(expansion, &by_id, &per_element, &mut visiting),
            }
        })
        .collect())
}

fn expansion_notes<'a>(
    expansion: &'a Expansion,
    by_id: &HashMap<&str, &'a Expansion>,
    per_element: &HashMap<String, usize>,
    visiting: &mut BTreeSet<&'a str>,
) -> usize {
    if !visiting.insert(expansion.id.as_str()) {
        tracing::warn!(expansion = %expansion.id, "expansion refers to itself");
        return 0;
    }
    let total = expansion
        .elements
        .iter()
        .map(|reference| {
            let id = reference.trim_start_matches('#');
            match by_id.get(id) {
                Some(&nested) => expansion_notes(nested, by_id, per_element, visiting),
                None => per_element.get(id).copied().unwrap_or(0),
            }
        })
        .sum();
    visiting.remove(expansion.id.as_str());
    total
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Composer,
}

/// Reads the title and composer from the first `<titleStmt>`.
///
/// The composer is the first `<persName role="composer">` in the title
/// statement. Missing values are empty strings.
pub fn metadata(mei: &str) -> Result<ScoreMetadata, MeiError> {
    let mut reader = reader(mei);
    let mut meta = ScoreMetadata::default();
    let mut in_title_stmt = false;
    let mut capture: Option<(Field, usize, String)> = None;
    let mut depth = 0usize;

    loop {
        match reader.read_event().map_err(|e| xml_error(&reader, e))? {
            Event::Start(ref e) => {
                depth += 1;
                let name = e.local_name();
                match name.as_ref() {
                    b"titleStmt" => in_title_stmt = true,
                    b"title" if in_title_stmt && capture.is_none() && meta.title.is_empty() => {
                        capture = Some((Field::Title, depth, String::new()));
                    }
                    b"persName"
                        if in_title_stmt
                            && capture.is_none()
                            && meta.composer.is_empty()
                            && attr(e, b"role").as_deref() == Some("composer") =>
                    {
                        capture = Some((Field::Composer, depth, String::new()));
                    }
                    _ => {}
                }
            }
            Event::Text(ref t) => {
                if let Some((_, _, ref mut text)) = capture {
                    let chunk = t.unescape().map_err(|e| xml_error(&reader, e))?;
                    if !text.is_empty() {
                        text.push(' ');
                    }
                    text.push_str(chunk.trim());
                }
            }
            Event::End(ref e) => {
                if let Some((field, at, _)) = capture.as_ref() {
                    if *at == depth {
                        let field = *field;
                        if let Some((_, _, text)) = capture.take() {
                            match field {
                                Field::Title => meta.title = text,
                                Field::Composer => meta.composer = text,
                            }
                        }
                    }
                }
                if e.local_name().as_ref() == b"titleStmt" && in_title_stmt {
                    break;
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    pub(crate) const SCORE: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<mei xmlns="http://www.music-encoding.org/ns/mei" meiversion="4.0.1">
  <meiHead>
    <fileDesc>
      <titleStmt>
        <title>Bagatelle <title type="subordinate">Op. 119 Nr. 8</title></title>
        <respStmt>
          <persName role="editor">Someone Else</persName>
          <persName role="composer">Ludwig van Beethoven</persName>
        </respStmt>
      </titleStmt>
    </fileDesc>
  </meiHead>
  <music>
    <body>
      <mdiv>
        <score>
          <scoreDef key.sig="1s">
            <staffGrp>
              <staffDef n="1" lines="5"/>
              <staffDef n="2" lines="5"><keySig sig="2f"/></staffDef>
            </staffGrp>
          </scoreDef>
          <section xml:id="root">
            <expansion xml:id="expansion-default" plist="#A #A #B #B"/>
            <expansion xml:id="expansion-minimal" plist="#A #B"/>
            <expansion xml:id="expansion-nested" plist="#expansion-default #expansion-minimal"/>
            <section xml:id="A">
              <measure xml:id="m1" n="1">
                <staff n="1">
                  <layer n="1">
                    <note xml:id="n1" pname="c" oct="4" dur="4"/>
                    <note xml:id="n2" pname="f" oct="4" dur="4"/>
                    <chord xml:id="c1" dur="4">
                      <note xml:id="n3" pname="f" oct="4" accid.ges="n"/>
                      <note xml:id="n4" pname="a" oct="4"><accid accid="f"/></note>
                    </chord>
                  </layer>
                </staff>
                <staff n="2">
                  <layer n="1">
                    <note xml:id="n5" pname="b" oct="2" dur="2"/>
                    <note xml:id="n6" pnum="40" pname="e" oct="2" dur="2"/>
                  </layer>
                </staff>
              </measure>
            </section>
            <section xml:id="B">
              <measure xml:id="m2" n="2">
                <staff n="1">
                  <layer n="1">
                    <note xml:id="n7" pname="g" oct="5" accid="s" dur="2"/>
                    <rest xml:id="r1" dur="2"/>
                    <note pname="d" oct="5" dur="4"/>
                  </layer>
                </staff>
              </measure>
            </section>
          </section>
        </score>
      </mdiv>
    </body>
  </music>
</mei>
"##;

    #[test]
    fn test_note_pitches_spelling_and_key() {
        let pitches = note_pitches(SCORE).unwrap();
        assert_eq!(pitches.get("n1"), Some(&60));
        // F# from the key signature
        assert_eq!(pitches.get("n2"), Some(&66));
        assert_eq!(pitches.get("n3"), Some(&65));
        assert_eq!(pitches.get("n4"), Some(&68));
        // staff 2 is in B-flat major
        assert_eq!(pitches.get("n5"), Some(&46));
        assert_eq!(pitches.get("n6"), Some(&40));
        assert_eq!(pitches.get("n7"), Some(&80));
        assert_eq!(pitches.len(), 7);
    }

    #[test]
    fn test_written_accidental_carries_through_measure() {
        let mei = r#"<mei xmlns="http://www.music-encoding.org/ns/mei"><music><body><mdiv><score>
          <scoreDef key.sig="0"/>
          <section>
            <measure n="1">
              <staff n="1"><layer n="1">
                <note xml:id="a" pname="c" oct="4" accid="s"/>
                <note xml:id="b" pname="c" oct="4"/>
                <note xml:id="c" pname="c" oct="5"/>
                <note xml:id="d" pname="c" oct="4" accid="n"/>
                <note xml:id="e" pname="c" oct="4"/>
              </layer></staff>
              <staff n="2"><layer n="1">
                <note xml:id="f" pname="c" oct="4"/>
              </layer></staff>
            </measure>
            <measure n="2">
              <staff n="1"><layer n="1">
                <note xml:id="g" pname="c" oct="4"/>
              </layer></staff>
            </measure>
          </section>
        </score></mdiv></body></music></mei>"#;

        let pitches = note_pitches(mei).unwrap();
        let got: Vec<i32> = ["a", "b", "c", "d", "e", "f", "g"]
            .iter()
            .map(|id| pitches[*id])
            .collect();
        assert_eq!(got, vec![61, 61, 72, 60, 60, 60, 60]);
    }

    #[test]
    fn test_parse_key_sig() {
        assert_eq!(parse_key_sig("0"), Some([0; 7]));
        assert_eq!(parse_key_sig("2s"), Some([1, 0, 0, 1, 0, 0, 0]));
        assert_eq!(parse_key_sig("3f"), Some([0, 0, -1, 0, 0, -1, -1]));
        assert_eq!(parse_key_sig("mixed"), None);
        assert_eq!(parse_key_sig(""), None);
    }

    #[test]
    fn test_midi_pitch() {
        assert_eq!(midi_pitch("a", 4, 0), Some(69));
        assert_eq!(midi_pitch("C", 4, 1), Some(61));
        assert_eq!(midi_pitch("b", 3, 1), Some(60));
        assert_eq!(midi_pitch("h", 4, 0), None);
    }

    #[test]
    fn test_expansions_in_document_order() {
        let found = expansions(SCORE).unwrap();
        assert_eq!(
            found,
            vec![
                Expansion {
                    id: "expansion-default".to_string(),
                    elements: vec!["#A".into(), "#A".into(), "#B".into(), "#B".into()],
                },
                Expansion {
                    id: "expansion-minimal".to_string(),
                    elements: vec!["#A".into(), "#B".into()],
                },
                Expansion {
                    id: "expansion-nested".to_string(),
                    elements: vec!["#expansion-default".into(), "#expansion-minimal".into()],
                },
            ]
        );
    }

    #[test]
    fn test_count_notes_in_expansions() {
        let counts = count_notes_in_expansions(SCORE).unwrap();
        // section A has 6 notes, section B has 2
        assert_eq!(
            counts,
            vec![
                ExpansionNoteCount {
                    id: "expansion-default".to_string(),
                    note_count: 16
                },
                ExpansionNoteCount {
                    id: "expansion-minimal".to_string(),
                    note_count: 8
                },
                ExpansionNoteCount {
                    id: "expansion-nested".to_string(),
                    note_count: 24
                },
            ]
        );
    }

    #[test]
    fn test_cyclic_expansion_terminates() {
        let mei = r##"<mei><section xml:id="A"><note/></section>
            <expansion xml:id="x" plist="#A #y"/>
            <expansion xml:id="y" plist="#x #A"/></mei>"##;
        let counts = count_notes_in_expansions(mei).unwrap();
        assert_eq!(counts[0].note_count, 2);
        assert_eq!(counts[1].note_count, 2);
    }

    #[test]
    fn test_metadata() {
        let meta = metadata(SCORE).unwrap();
        assert_eq!(
            meta,
            ScoreMetadata {
                title: "Bagatelle Op. 119 Nr. 8".to_string(),
                composer: "Ludwig van Beethoven".to_string(),
            }
        );
    }

    #[test]
    fn test_metadata_missing_fields() {
        let meta = metadata("<mei><meiHead/></mei>").unwrap();
        assert_eq!(meta, ScoreMetadata::default());
    }

    #[test]
    fn test_malformed_markup_reports_position() {
        let err = note_pitches("<mei><note xml:id=\"n1\" pname=\"c\" oct=\"4\"></mei>").unwrap_err();
        assert!(!err.message.is_empty());
    }
}
