//! scorealign CLI - Score-to-performance alignment
//!
//! This binary provides commands for aligning performances with MEI scores,
//! reconciling the results into MAPS files, and exporting RDF timelines.

use clap::Parser;
use std::process::ExitCode;

mod cli_args;

use cli_args::{Cli, Commands};
use scorealign_cli::commands::{self, inspect::ScoreUris, run::RunOptions};
use scorealign_cli::{logging, webmidi::WebMidiConfig};

fn run_options(pipeline: &cli_args::PipelineArgs) -> RunOptions {
    let mut options = RunOptions::new(&pipeline.out_dir);
    options.expansion = pipeline.expansion.choice();
    options.threshold_ms = pipeline.threshold;
    options.parallel = pipeline.parallel;
    options.keep_expanded_mei = pipeline.keep_expanded_mei;
    options.webmidi = pipeline.webmidi;
    options.timeline = pipeline.timeline.options();
    options
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let result = match cli.command {
        Commands::Align {
            canonical,
            performance,
            out,
            tools,
        } => commands::align::run(&canonical, &performance, out.as_deref(), &tools.options()),
        Commands::Extract {
            mei,
            expansion,
            out,
            midi,
            tools,
        } => commands::extract::run(
            &mei,
            expansion.as_deref(),
            out.as_deref(),
            midi.as_deref(),
            &tools.options(),
        ),
        Commands::Reconcile {
            corresp,
            notes,
            out,
            threshold,
            json,
        } => commands::reconcile::run(&corresp, &notes, &out, threshold, json),
        Commands::Run {
            mei,
            performance,
            pipeline,
        } => commands::run::run(
            &mei,
            &performance,
            &run_options(&pipeline),
            &pipeline.tools.options(),
            pipeline.json,
        ),
        Commands::Batch {
            mei,
            performance_dir,
            pipeline,
        } => commands::batch::run(
            &mei,
            &performance_dir,
            &run_options(&pipeline),
            &pipeline.tools.options(),
            pipeline.json,
        ),
        Commands::ToRdf { maps, timeline, out } => match timeline.options() {
            Some(options) => commands::to_rdf::run(&maps, &options, out.as_deref()),
            None => Err(anyhow::anyhow!("--timeline-uri and --mei-uri are required")),
        },
        Commands::Webmidi {
            input,
            output,
            ticks_per_beat,
            tempo,
            json,
        } => {
            let config = WebMidiConfig {
                ticks_per_beat,
                tempo_bpm: tempo,
            };
            commands::webmidi::run(&input, &output, &config, json)
        }
        Commands::Inspect {
            mei,
            score_uri,
            mei_uri,
            segments_uri,
            performance_uri,
            json,
        } => {
            let uris = score_uri.map(|score_uri| ScoreUris {
                score_uri,
                mei_uri,
                segments_uri,
                performance_uri,
            });
            commands::inspect::run(&mei, uris.as_ref(), json)
        }
        Commands::Doctor { tools } => commands::doctor::run(&tools.options()),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:#}", colored::Colorize::red("error"), e);
            ExitCode::from(1)
        }
    }
}
