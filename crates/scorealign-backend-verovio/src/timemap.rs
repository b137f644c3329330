//! Verovio timemap parsing.
//!
//! A timemap is a JSON array of events, one per distinct onset or offset
//! time in the rendering:
//!
//! ```json
//! [{"tstamp": 0, "qstamp": 0, "on": ["n1", "n2"], "tempo": 120},
//!  {"tstamp": 500, "qstamp": 1, "off": ["n1"], "on": ["n3"]}]
//! ```
//!
//! `tstamp` is in milliseconds. Only `on` lists matter for note extraction.

use serde::Deserialize;

/// One timemap event.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TimemapEntry {
    /// Milliseconds from the start of the rendering.
    pub tstamp: f64,
    /// Score time in quarter notes.
    #[serde(default)]
    pub qstamp: Option<f64>,
    /// Identifiers of notes starting at this time.
    #[serde(default)]
    pub on: Vec<String>,
    /// Identifiers of notes ending at this time.
    #[serde(default)]
    pub off: Vec<String>,
    /// Tempo change at this time, if any.
    #[serde(default)]
    pub tempo: Option<f64>,
}

/// Parses a timemap document.
pub fn parse_timemap(text: &str) -> serde_json::Result<Vec<TimemapEntry>> {
    serde_json::from_str(text)
}

/// Iterates `(note id, tstamp)` for every note-on, in timemap order.
pub fn note_onsets(entries: &[TimemapEntry]) -> impl Iterator<Item = (&str, f64)> {
    entries
        .iter()
        .flat_map(|entry| entry.on.iter().map(move |id| (id.as_str(), entry.tstamp)))
}
