//! Performance descriptions (`mo:Performance` and its recorded signal).

use chrono::{Local, NaiveDateTime};

use crate::error::ExportResult;
use crate::turtle::{check_uri, literal, write_prefixes, DCTERMS, MELD, MO, RDF, RDFS, SO, TL};

/// Offset applied by players when synchronising audio with the timeline.
pub const DEFAULT_PLAYBACK_OFFSET: &str = "-0.2";

/// A recorded performance of a score.
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceDescription {
    pub performance_uri: String,
    pub score_uri: String,
    pub audio_uri: String,
    /// Creation time, used for the label and `dcterms:created`.
    pub created: NaiveDateTime,
}

impl PerformanceDescription {
    /// Describes a performance created now.
    pub fn new(
        performance_uri: impl Into<String>,
        score_uri: impl Into<String>,
        audio_uri: impl Into<String>,
    ) -> Self {
        Self {
            performance_uri: performance_uri.into(),
            score_uri: score_uri.into(),
            audio_uri: audio_uri.into(),
            created: Local::now().naive_local(),
        }
    }

    /// Sets the creation time.
    pub fn created_at(mut self, created: NaiveDateTime) -> Self {
        self.created = created;
        self
    }

    /// Human-readable label, `dd.mm.YYYY HH:MM:SS`.
    pub fn label(&self) -> String {
        self.created.format("%d.%m.%Y %H:%M:%S").to_string()
    }

    /// ISO 8601 creation timestamp.
    pub fn created_iso(&self) -> String {
        self.created.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
    }

    pub(crate) fn validate(&self) -> ExportResult<()> {
        check_uri("performance", &self.performance_uri)?;
        check_uri("score", &self.score_uri)?;
        check_uri("audio", &self.audio_uri)
    }

    /// Signal resource of the recording.
    pub fn signal_uri(&self) -> String {
        format!("{}#Signal", self.performance_uri)
    }
}

/// Writes the performance triples (no prefixes) for a recording placed on
/// `timeline_uri`.
pub(crate) fn write_performance_triples(
    out: &mut String,
    performance: &PerformanceDescription,
    timeline_uri: &str,
) {
    out.push_str(&format!(
        "<{}> a mo:Performance ;\n    mo:performance_of <{}> ;\n    mo:recorded_as <{}> ;\n    rdfs:label {} ;\n    dcterms:created {} ;\n    meld:offset {} .\n",
        performance.performance_uri,
        performance.score_uri,
        performance.signal_uri(),
        literal(&performance.label()),
        literal(&performance.created_iso()),
        literal(DEFAULT_PLAYBACK_OFFSET),
    ));
    out.push_str(&format!(
        "<{}> mo:available_as <{}> ;\n    mo:time [ a tl:Interval ; tl:onTimeLine <{}> ] .\n",
        performance.signal_uri(),
        performance.audio_uri,
        timeline_uri,
    ));
}

/// Renders a standalone Turtle document describing `performance`.
pub fn performance_turtle(
    performance: &PerformanceDescription,
    timeline_uri: &str,
) -> ExportResult<String> {
    performance.validate()?;
    check_uri("timeline", timeline_uri)?;

    let mut out = String::new();
    write_prefixes(
        &mut out,
        &[
            ("mo", MO),
            ("so", SO),
            ("rdf", RDF),
            ("rdfs", RDFS),
            ("meld", MELD),
            ("tl", TL),
            ("dcterms", DCTERMS),
        ],
    );
    out.push('\n');
    write_performance_triples(&mut out, performance, timeline_uri);
    Ok(out)
}
