//! Inspect command implementation
//!
//! Summarises an MEI score: header metadata, content hash, and the notes
//! played under each declared expansion. With `--score-uri` the summary is
//! printed as a Turtle score description instead.

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;
use std::path::Path;
use std::process::ExitCode;

use scorealign_backend_verovio::{count_notes_in_expansions, metadata, RenderError};
use scorealign_core::hash::short_hash;
use scorealign_core::score_content_hash;
use scorealign_rdf::{score_turtle, ScoreDescription};

use crate::json_output::CommandOutput;

/// What `inspect` reports about a score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreSummary {
    pub file: String,
    pub title: String,
    pub composer: String,
    /// BLAKE3 hex digest of the MEI text.
    pub hash: String,
    pub expansions: Vec<ExpansionSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpansionSummary {
    pub id: String,
    pub elements: usize,
    pub note_count: usize,
}

/// URIs for the Turtle score description.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreUris {
    pub score_uri: String,
    /// Defaults to the file name.
    pub mei_uri: Option<String>,
    pub segments_uri: Option<String>,
    pub performance_uri: Option<String>,
}

/// Reads and summarises a score.
pub fn summarize(path: &Path) -> Result<ScoreSummary> {
    let mei = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read score: {}", path.display()))?;
    let resource = path.display().to_string();
    let meta = metadata(&mei).map_err(|e| RenderError::mei_parse(&resource, e))?;
    let declared = scorealign_backend_verovio::expansions(&mei)
        .map_err(|e| RenderError::mei_parse(&resource, e))?;
    let counts = count_notes_in_expansions(&mei).map_err(|e| RenderError::mei_parse(&resource, e))?;

    let expansions = declared
        .iter()
        .zip(counts)
        .map(|(expansion, count)| ExpansionSummary {
            id: expansion.id.clone(),
            elements: expansion.elements.len(),
            note_count: count.note_count,
        })
        .collect();

    Ok(ScoreSummary {
        file: resource,
        title: meta.title,
        composer: meta.composer,
        hash: score_content_hash(mei.as_bytes()),
        expansions,
    })
}

/// Builds the score description for `summary`.
pub fn describe(summary: &ScoreSummary, uris: &ScoreUris) -> ScoreDescription {
    let mei_uri = uris.mei_uri.clone().unwrap_or_else(|| summary.file.clone());
    let mut description = ScoreDescription::new(&uris.score_uri, mei_uri, &summary.title);
    if let Some(ref uri) = uris.segments_uri {
        description = description.segments(uri);
    }
    if let Some(ref uri) = uris.performance_uri {
        description = description.performance(uri);
    }
    for expansion in &summary.expansions {
        description = description.expansion(&expansion.id, expansion.note_count);
    }
    description
}

/// Run the inspect command
pub fn run(mei: &str, uris: Option<&ScoreUris>, json: bool) -> Result<ExitCode> {
    let summary = summarize(Path::new(mei))?;

    if let Some(uris) = uris {
        print!("{}", score_turtle(&describe(&summary, uris))?);
        return Ok(ExitCode::SUCCESS);
    }

    if json {
        CommandOutput::success(summary, Vec::new()).print()?;
        return Ok(ExitCode::SUCCESS);
    }

    println!("{}", summary.file.cyan().bold());
    println!("  Title:    {}", display_or_dash(&summary.title));
    println!("  Composer: {}", display_or_dash(&summary.composer));
    println!("  Hash:     {}", short_hash(&summary.hash).dimmed());
    if summary.expansions.is_empty() {
        println!("  {} no expansions declared", "!!".yellow());
    } else {
        println!("  Expansions:");
        for expansion in &summary.expansions {
            println!(
                "    {} {} ({} sections, {} notes)",
                "->".green(),
                expansion.id,
                expansion.elements,
                expansion.note_count
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn display_or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}
