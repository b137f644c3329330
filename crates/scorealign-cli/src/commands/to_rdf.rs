//! To-RDF command implementation
//!
//! Exports an existing MAPS file as a timeline in Turtle and/or JSON-LD.

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use scorealign_core::maps_from_json;
use scorealign_rdf::{timeline_jsonld_string, timeline_turtle};

use super::TimelineOptions;
use crate::pipeline::RdfFormat;

/// Output files for a format, derived from `out`.
///
/// A single format is written to `out` as given; both formats replace the
/// extension with `.ttl` and `.jsonld`.
pub fn output_paths(out: &Path, format: RdfFormat) -> Vec<(RdfFormat, PathBuf)> {
    match format {
        RdfFormat::Both => vec![
            (RdfFormat::Ttl, out.with_extension("ttl")),
            (RdfFormat::Jsonld, out.with_extension("jsonld")),
        ],
        single => vec![(single, out.to_path_buf())],
    }
}

/// Run the to-rdf command
///
/// # Arguments
/// * `maps` - MAPS JSON file
/// * `timeline` - Timeline URIs and format
/// * `out` - Output path (default: stdout, single format only)
pub fn run(maps: &str, timeline: &TimelineOptions, out: Option<&str>) -> Result<ExitCode> {
    let maps_path = Path::new(maps);
    let text = std::fs::read_to_string(maps_path)
        .with_context(|| format!("Failed to read MAPS file: {}", maps_path.display()))?;
    let observations = maps_from_json(&text)
        .with_context(|| format!("Failed to parse MAPS file: {}", maps_path.display()))?;
    let export = timeline.export()?;

    let render = |format: RdfFormat| -> Result<String> {
        Ok(match format {
            RdfFormat::Jsonld => timeline_jsonld_string(&observations, &export.config)?,
            _ => timeline_turtle(&observations, &export.config)?,
        })
    };

    match out {
        Some(out) => {
            for (format, path) in output_paths(Path::new(out), export.format) {
                std::fs::write(&path, render(format)?)
                    .with_context(|| format!("Failed to write timeline: {}", path.display()))?;
                println!("{} {}", "Wrote".green().bold(), path.display());
            }
        }
        None => {
            if export.format == RdfFormat::Both {
                anyhow::bail!("--format both requires --out");
            }
            print!("{}", render(export.format)?);
        }
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MAPS: &str = r#"[
        {"obs_num": 1, "obs_mean_onset": 0.5, "xml_id": "n1", "velocity": 64, "confidence": 0},
        {"obs_num": 2, "obs_mean_onset": 1.0, "xml_id": ["n2", "n3"], "velocity": [60, 70], "confidence": 0}
    ]"#;

    #[test]
    fn test_output_paths() {
        assert_eq!(
            output_paths(Path::new("out/take.rdf"), RdfFormat::Both),
            vec![
                (RdfFormat::Ttl, PathBuf::from("out/take.ttl")),
                (RdfFormat::Jsonld, PathBuf::from("out/take.jsonld")),
            ]
        );
        assert_eq!(
            output_paths(Path::new("take.n3"), RdfFormat::Ttl),
            vec![(RdfFormat::Ttl, PathBuf::from("take.n3"))]
        );
    }

    #[test]
    fn test_writes_both_formats() {
        let dir = tempfile::tempdir().unwrap();
        let maps = dir.path().join("take.maps.json");
        std::fs::write(&maps, MAPS).unwrap();
        let out = dir.path().join("take.rdf");
        let timeline = TimelineOptions::new(
            "https://pod.example/timeline/take",
            "https://pod.example/score.mei",
            RdfFormat::Both,
        );

        let code = run(maps.to_str().unwrap(), &timeline, out.to_str()).unwrap();
        assert_eq!(code, ExitCode::SUCCESS);

        let ttl = std::fs::read_to_string(dir.path().join("take.ttl")).unwrap();
        assert!(ttl.contains("tlUri:1 a tl:Instant ;"));
        assert!(ttl.contains("frbr:embodimentOf meiUri:n3 ."));
        let jsonld: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("take.jsonld")).unwrap())
                .unwrap();
        assert!(jsonld.get("@graph").is_some());
    }

    #[test]
    fn test_both_formats_need_output() {
        let dir = tempfile::tempdir().unwrap();
        let maps = dir.path().join("take.maps.json");
        std::fs::write(&maps, MAPS).unwrap();
        let timeline = TimelineOptions::new("https://a.example/t", "https://a.example/s", RdfFormat::Both);
        assert!(run(maps.to_str().unwrap(), &timeline, None).is_err());
    }
}
