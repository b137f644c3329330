//! Batch command implementation
//!
//! Runs the pipeline for every performance under a directory against one
//! score. A failing performance is logged and skipped.

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use walkdir::WalkDir;

use scorealign_backend_smat::ProcessRunner;
use scorealign_backend_verovio::{ScoreRenderer, ScoreSource};

use super::run::{json_error, print_outcome, RunOptions};
use super::ToolOptions;
use crate::json_output::{BatchItem, BatchSummary, CommandOutput, JsonError};
use crate::pipeline::{Pipeline, PipelineOutcome};

/// Batch results for `--json`.
#[derive(Debug, Serialize)]
pub struct BatchOutput {
    pub summary: BatchSummary,
    pub items: Vec<BatchItem<PipelineOutcome>>,
}

/// Finds performance files under `dir`, sorted by path.
///
/// Standard MIDI files are picked up by default; WebMIDI captures (`*.json`)
/// when `webmidi` is set.
pub fn find_performances(dir: &Path, webmidi: bool) -> Vec<PathBuf> {
    let wanted = if webmidi { "json" } else { "mid" };
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .map(|ext| ext.eq_ignore_ascii_case(wanted))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    files
}

/// Timeline URI for one performance under a base URI.
pub fn timeline_uri_for(base: &str, performance: &Path) -> String {
    let stem = performance
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    format!("{}/{}", base.trim_end_matches('/'), stem)
}

/// Run the batch command
///
/// # Returns
/// Exit code: 0 if every performance aligned, 1 otherwise
pub fn run(mei: &str, performance_dir: &str, options: &RunOptions, tools: &ToolOptions, json: bool) -> Result<ExitCode> {
    let pipeline = Pipeline::system(tools.verovio_config(), tools.aligner_config());
    batch_with(&pipeline, Path::new(mei), Path::new(performance_dir), options, json)
}

pub(crate) fn batch_with<R, P>(
    pipeline: &Pipeline<R, P>,
    mei: &Path,
    performance_dir: &Path,
    options: &RunOptions,
    json: bool,
) -> Result<ExitCode>
where
    R: ScoreRenderer + Sync,
    P: ProcessRunner,
{
    if !performance_dir.is_dir() {
        anyhow::bail!("Performance directory not found: {}", performance_dir.display());
    }
    let score = ScoreSource::from_path(mei)
        .with_context(|| format!("Failed to read score: {}", mei.display()))?;
    let performances = find_performances(performance_dir, options.webmidi);

    if performances.is_empty() && !json {
        println!("No performances found under: {}", performance_dir.display());
        return Ok(ExitCode::SUCCESS);
    }

    let mut items = Vec::new();
    for (i, performance) in performances.iter().enumerate() {
        let input = performance.display().to_string();
        if !json {
            let progress = format!("[{}/{}]", i + 1, performances.len()).cyan().bold();
            println!("\n{} {}", progress, input);
        }

        let timeline = options
            .timeline
            .as_ref()
            .map(|t| t.for_timeline(timeline_uri_for(&t.timeline_uri, performance)));
        let result = options
            .pipeline_config(timeline.as_ref())
            .and_then(|config| pipeline.run(&score, performance, &config));

        match result {
            Ok(outcome) => {
                if !json {
                    print_outcome(&outcome);
                }
                items.push(BatchItem::success(input, outcome));
            }
            Err(e) => {
                tracing::error!(performance = %input, error = %format!("{:#}", e), "performance skipped");
                if !json {
                    println!("  {} {:#}", "FAIL".red().bold(), e);
                }
                items.push(BatchItem::failure(input, json_error(&e, performance)));
            }
        }
    }

    let summary = BatchSummary::of(&items);
    let failed = summary.failed;

    if json {
        let errors: Vec<JsonError> = items.iter().filter_map(|i| i.error.clone()).collect();
        let mut output = CommandOutput::success(BatchOutput { summary, items }, Vec::new());
        output.errors = errors;
        output.success = failed == 0;
        output.print()?;
    } else {
        println!("\n{}", "=".repeat(60));
        println!("{}", "Batch Summary".bold());
        println!("  Total:     {}", summary.total);
        println!("  Succeeded: {}", summary.succeeded.to_string().green());
        println!(
            "  Failed:    {}",
            if failed > 0 {
                failed.to_string().red()
            } else {
                failed.to_string().normal()
            }
        );
    }

    if failed > 0 {
        Ok(ExitCode::from(1))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
