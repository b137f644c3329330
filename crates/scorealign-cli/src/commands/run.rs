//! Run command implementation
//!
//! Full pipeline for one performance: render, align, reconcile, keep the
//! best expansion, and optionally export the timeline.

use anyhow::Result;
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use scorealign_backend_smat::ProcessRunner;
use scorealign_backend_verovio::{ScoreRenderer, ScoreSource};
use scorealign_core::ReconcileConfig;

use super::{TimelineOptions, ToolOptions};
use crate::json_output::{error_codes, CommandOutput, JsonError, JsonWarning};
use crate::pipeline::{ExpansionChoice, Pipeline, PipelineConfig, PipelineOutcome};
use crate::webmidi::WebMidiConfig;

/// Options shared by `run` and `batch`.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub out_dir: PathBuf,
    pub expansion: ExpansionChoice,
    pub threshold_ms: f64,
    pub parallel: bool,
    pub keep_expanded_mei: bool,
    /// Treat performances as WebMIDI JSON.
    pub webmidi: bool,
    pub timeline: Option<TimelineOptions>,
}

impl RunOptions {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            expansion: ExpansionChoice::default(),
            threshold_ms: scorealign_core::DEFAULT_THRESHOLD_MS,
            parallel: false,
            keep_expanded_mei: false,
            webmidi: false,
            timeline: None,
        }
    }

    /// Pipeline settings, with `timeline` overriding the configured one.
    pub fn pipeline_config(&self, timeline: Option<&TimelineOptions>) -> Result<PipelineConfig> {
        let mut config = PipelineConfig::new(&self.out_dir)
            .reconcile(ReconcileConfig::default().threshold_ms(self.threshold_ms))
            .expansions(self.expansion.clone())
            .parallel(self.parallel)
            .keep_expanded_mei(self.keep_expanded_mei);
        if self.webmidi {
            config = config.webmidi(WebMidiConfig::default());
        }
        if let Some(timeline) = timeline.or(self.timeline.as_ref()) {
            config = config.timeline(timeline.export()?);
        }
        Ok(config)
    }
}

/// Run the run command
///
/// # Returns
/// Exit code: 0 success, 1 if no expansion could be aligned
pub fn run(mei: &str, performance: &str, options: &RunOptions, tools: &ToolOptions, json: bool) -> Result<ExitCode> {
    let pipeline = Pipeline::system(tools.verovio_config(), tools.aligner_config());
    run_with(&pipeline, Path::new(mei), Path::new(performance), options, json)
}

pub(crate) fn run_with<R, P>(
    pipeline: &Pipeline<R, P>,
    mei: &Path,
    performance: &Path,
    options: &RunOptions,
    json: bool,
) -> Result<ExitCode>
where
    R: ScoreRenderer + Sync,
    P: ProcessRunner,
{
    let result = ScoreSource::from_path(mei)
        .map_err(anyhow::Error::from)
        .and_then(|score| {
            let config = options.pipeline_config(None)?;
            pipeline.run(&score, performance, &config)
        });

    if json {
        let output = match result {
            Ok(outcome) => {
                let warnings = outcome_warnings(&outcome);
                CommandOutput::success(outcome, warnings)
            }
            Err(e) => CommandOutput::failure(vec![json_error(&e, performance)]),
        };
        output.print()?;
        return Ok(if output.success {
            ExitCode::SUCCESS
        } else {
            ExitCode::from(1)
        });
    }

    let outcome = result?;
    print_outcome(&outcome);
    Ok(ExitCode::SUCCESS)
}

/// Maps a pipeline failure onto a JSON error.
pub(crate) fn json_error(err: &anyhow::Error, input: &Path) -> JsonError {
    JsonError::from_anyhow(err).with_file(input.display().to_string())
}

/// Input warnings of the winning candidate, then one warning per failed
/// candidate expansion.
pub(crate) fn outcome_warnings(outcome: &PipelineOutcome) -> Vec<JsonWarning> {
    let mut warnings: Vec<JsonWarning> = outcome.warnings.iter().map(JsonWarning::from).collect();
    warnings.extend(outcome.failures.iter().map(|failure| {
        JsonWarning::new(
            failure.code.unwrap_or(error_codes::PIPELINE),
            format!("expansion failed: {}", failure.message),
        )
        .at(failure.expansion.clone())
    }));
    warnings
}

pub(crate) fn print_outcome(outcome: &PipelineOutcome) {
    println!(
        "{} {} with {}",
        "Aligned".green().bold(),
        outcome.performance,
        outcome.expansion.cyan()
    );
    for candidate in &outcome.candidates {
        match candidate.inserted_count {
            Some(inserted) => println!(
                "  {} {} ({} inserted)",
                "->".green(),
                candidate.expansion,
                inserted
            ),
            None => println!("  {} {} (failed)", "!!".yellow(), candidate.expansion),
        }
    }
    for failure in &outcome.failures {
        println!("     {}", failure.message.dimmed());
    }
    let stats = &outcome.stats;
    println!(
        "  {} observations: matched {}, inserted {}, match failures {}, skipped rows {}",
        outcome.observations, stats.matched, stats.inserted, stats.match_failures, stats.skipped_rows
    );
    println!("  {} {}", "ok".green(), outcome.maps_file.display());
    for file in &outcome.rdf_files {
        println!("  {} {}", "ok".green(), file.display());
    }
}
