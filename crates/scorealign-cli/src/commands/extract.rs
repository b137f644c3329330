//! Extract command implementation
//!
//! Writes the note position JSON for a score, optionally alongside the
//! canonical MIDI rendered under the same expansion.

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;
use std::process::ExitCode;

use scorealign_backend_verovio::{NoteExtractor, ScoreRenderer, ScoreSource, VerovioCli};
use scorealign_core::attributes_to_json;

use super::ToolOptions;

/// Run the extract command
///
/// # Arguments
/// * `mei` - Path to the MEI score
/// * `expansion` - Expansion to render under
/// * `out` - Output path for the note JSON (default: stdout)
/// * `midi` - Also write the canonical MIDI here
pub fn run(
    mei: &str,
    expansion: Option<&str>,
    out: Option<&str>,
    midi: Option<&str>,
    tools: &ToolOptions,
) -> Result<ExitCode> {
    let extractor = NoteExtractor::new(VerovioCli::with_config(tools.verovio_config()));
    extract_with(
        &extractor,
        Path::new(mei),
        expansion,
        out.map(Path::new),
        midi.map(Path::new),
    )
}

pub(crate) fn extract_with<R: ScoreRenderer>(
    extractor: &NoteExtractor<R>,
    mei: &Path,
    expansion: Option<&str>,
    out: Option<&Path>,
    midi: Option<&Path>,
) -> Result<ExitCode> {
    let score = ScoreSource::from_path(mei)
        .with_context(|| format!("Failed to read score: {}", mei.display()))?;
    let extraction = extractor.extract_note_attributes(&score, expansion)?;
    let json = attributes_to_json(&extraction.attributes)?;

    if let Some(path) = midi {
        extractor
            .write_midi(&score.resource, &extraction, path)
            .with_context(|| format!("Failed to write MIDI file: {}", path.display()))?;
    }

    match out {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write note positions: {}", path.display()))?;
            println!(
                "{} {} notes from {} -> {}",
                "Extracted".green().bold(),
                extraction.attributes.len(),
                score.resource,
                path.display()
            );
            if !extraction.unpitched.is_empty() {
                println!(
                    "  {} {} note-on(s) without a pitch were skipped",
                    "!!".yellow(),
                    extraction.unpitched.len()
                );
            }
        }
        None => println!("{}", json),
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use scorealign_backend_verovio::{RenderFormat, RenderResult};
    use scorealign_core::parse_attributes_json;

    const MEI: &str = r#"<mei xmlns="http://www.music-encoding.org/ns/mei">
  <music><body><mdiv><score><section>
    <measure><staff n="1"><layer n="1">
      <note xml:id="a1" pname="a" oct="4"/>
      <note xml:id="b1" pname="b" oct="4" accid="f"/>
    </layer></staff></measure>
  </section></score></mdiv></body></music>
</mei>"#;

    struct FakeRenderer;

    impl ScoreRenderer for FakeRenderer {
        fn render(
            &self,
            mei: &str,
            _resource: &str,
            format: RenderFormat,
            _expansion: Option<&str>,
        ) -> RenderResult<Vec<u8>> {
            Ok(match format {
                RenderFormat::Mei => mei.as_bytes().to_vec(),
                RenderFormat::Timemap => {
                    br#"[{"tstamp": 0, "on": ["a1"]}, {"tstamp": 250, "on": ["b1"], "off": ["a1"]}]"#.to_vec()
                }
                RenderFormat::Midi => b"MThd".to_vec(),
            })
        }
    }

    #[test]
    fn test_extract_writes_notes_and_midi() {
        let dir = tempfile::tempdir().unwrap();
        let mei = dir.path().join("piece.mei");
        std::fs::write(&mei, MEI).unwrap();
        let out = dir.path().join("piece.notes.json");
        let midi = dir.path().join("piece.mid");

        let extractor = NoteExtractor::new(FakeRenderer);
        let code = extract_with(&extractor, &mei, None, Some(&out), Some(&midi)).unwrap();
        assert_eq!(code, ExitCode::SUCCESS);

        let set = parse_attributes_json(&std::fs::read_to_string(&out).unwrap()).unwrap();
        let pitches: Vec<i32> = set.attributes.iter().map(|a| a.midi_pitch).collect();
        assert_eq!(pitches, vec![69, 70]);
        assert_eq!(std::fs::read(&midi).unwrap(), b"MThd".to_vec());
    }

    #[test]
    fn test_missing_score() {
        let extractor = NoteExtractor::new(FakeRenderer);
        let err = extract_with(&extractor, Path::new("/nonexistent.mei"), None, None, None).unwrap_err();
        assert!(err.to_string().contains("nonexistent.mei"));
    }
}
