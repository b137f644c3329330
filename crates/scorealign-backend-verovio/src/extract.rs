//! Score note extraction.
//!
//! Renders a score (under an optional expansion) and pairs every note-on in
//! the resulting timemap with the note's MIDI pitch.

use std::path::Path;

use scorealign_core::ScoreNoteAttribute;

use crate::error::{RenderError, RenderResult};
use crate::mei::{expansions, note_pitches};
use crate::renderer::{RenderFormat, ScoreRenderer};
use crate::timemap::{note_onsets, parse_timemap};

/// A score document and the name used for it in errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreSource {
    /// Identifier of the score resource (file name or URI).
    pub resource: String,
    /// MEI text.
    pub mei: String,
}

impl ScoreSource {
    pub fn new(resource: impl Into<String>, mei: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            mei: mei.into(),
        }
    }

    /// Reads a score from disk, naming it by its file name.
    pub fn from_path(path: &Path) -> RenderResult<Self> {
        if !path.is_file() {
            return Err(RenderError::ScoreNotFound {
                path: path.to_path_buf(),
            });
        }
        let mei = std::fs::read_to_string(path)?;
        let resource = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { resource, mei })
    }
}

/// Result of extracting note attributes from a score.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    /// One attribute per note-on, in timemap order.
    pub attributes: Vec<ScoreNoteAttribute>,
    /// Note-ons whose pitch could not be determined.
    pub unpitched: Vec<String>,
    /// The rendered (expanded) MEI the identifiers refer to.
    pub rendered_mei: String,
}

/// Extracts note attributes and renders canonical MIDI.
pub struct NoteExtractor<R> {
    renderer: R,
}

impl<R: ScoreRenderer> NoteExtractor<R> {
    pub fn new(renderer: R) -> Self {
        Self { renderer }
    }

    fn check_expansion(&self, score: &ScoreSource, expansion: Option<&str>) -> RenderResult<()> {
        let Some(expansion) = expansion else {
            return Ok(());
        };
        let defined = expansions(&score.mei)
            .map_err(|e| RenderError::mei_parse(&score.resource, e))?;
        if defined.iter().any(|e| e.id == expansion) {
            Ok(())
        } else {
            Err(RenderError::UnknownExpansion {
                resource: score.resource.clone(),
                expansion: expansion.to_string(),
            })
        }
    }

    /// Renders the score to MEI with `expansion` applied.
    ///
    /// Rendering through Verovio also gives every note an identifier, so
    /// the result is the document the timemap and pitch lookup agree on.
    pub fn render_mei(&self, score: &ScoreSource, expansion: Option<&str>) -> RenderResult<String> {
        self.check_expansion(score, expansion)?;
        let bytes = self
            .renderer
            .render(&score.mei, &score.resource, RenderFormat::Mei, expansion)?;
        String::from_utf8(bytes).map_err(|_| {
            RenderError::render_failed(&score.resource, "rendered MEI is not valid UTF-8")
        })
    }

    /// Extracts one [`ScoreNoteAttribute`] per note-on.
    ///
    /// A chord's note-on lists several identifiers; each becomes its own
    /// attribute with the shared timestamp.
    pub fn extract_note_attributes(
        &self,
        score: &ScoreSource,
        expansion: Option<&str>,
    ) -> RenderResult<Extraction> {
        let rendered_mei = self.render_mei(score, expansion)?;
        let pitches = note_pitches(&rendered_mei)
            .map_err(|e| RenderError::mei_parse(&score.resource, e))?;

        let timemap_bytes =
            self.renderer
                .render(&rendered_mei, &score.resource, RenderFormat::Timemap, None)?;
        let timemap_text = String::from_utf8_lossy(&timemap_bytes);
        let entries = parse_timemap(&timemap_text).map_err(|source| RenderError::TimemapParse {
            resource: score.resource.clone(),
            source,
        })?;

        let mut attributes = Vec::new();
        let mut unpitched = Vec::new();
        for (id, tstamp) in note_onsets(&entries) {
            match pitches.get(id) {
                Some(&pitch) => attributes.push(ScoreNoteAttribute::new(id, tstamp, pitch)),
                None => unpitched.push(id.to_string()),
            }
        }

        if !unpitched.is_empty() {
            tracing::warn!(
                resource = %score.resource,
                count = unpitched.len(),
                "note-ons without a pitch were skipped"
            );
        }
        tracing::info!(
            resource = %score.resource,
            expansion = expansion.unwrap_or("none"),
            notes = attributes.len(),
            "extracted score note attributes"
        );

        Ok(Extraction {
            attributes,
            unpitched,
            rendered_mei,
        })
    }

    /// Renders the canonical MIDI used as the alignment reference.
    ///
    /// The MIDI comes from the document the [`Extraction`] was taken from,
    /// so the MIDI and the attributes describe the same expanded score.
    pub fn render_midi(&self, resource: &str, extraction: &Extraction) -> RenderResult<Vec<u8>> {
        self.renderer
            .render(&extraction.rendered_mei, resource, RenderFormat::Midi, None)
    }

    /// Renders the canonical MIDI and writes it to `out`.
    pub fn write_midi(&self, resource: &str, extraction: &Extraction, out: &Path) -> RenderResult<()> {
        let bytes = self.render_midi(resource, extraction)?;
        std::fs::write(out, bytes)?;
        Ok(())
    }
}
