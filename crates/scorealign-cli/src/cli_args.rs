//! CLI argument definitions for the scorealign command-line interface.
//!
//! All `#[derive(Parser)]` and `#[derive(Subcommand)]` types are defined here,
//! keeping `main.rs` focused on dispatch logic.

use clap::{Args, Parser, Subcommand};

use scorealign_cli::commands::{PerformanceOptions, TimelineOptions, ToolOptions};
use scorealign_cli::pipeline::{ExpansionChoice, RdfFormat};
use scorealign_core::DEFAULT_THRESHOLD_MS;

/// scorealign - Score-to-performance alignment
#[derive(Parser)]
#[command(name = "scorealign")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub(crate) struct Cli {
    /// Log debug output to stderr (SCOREALIGN_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Overrides for the external tools.
#[derive(Args, Debug, Clone, Default)]
pub(crate) struct ToolArgs {
    /// Directory holding the SMAT executables (default: SMAT_BIN_DIR, then PATH)
    #[arg(long)]
    pub smat_dir: Option<String>,

    /// Path to the verovio executable (default: VEROVIO_PATH, then PATH)
    #[arg(long)]
    pub verovio: Option<String>,

    /// Timeout in seconds for each external process
    #[arg(long)]
    pub timeout: Option<u64>,
}

impl ToolArgs {
    pub fn options(&self) -> ToolOptions {
        ToolOptions {
            smat_dir: self.smat_dir.clone(),
            verovio: self.verovio.clone(),
            timeout_secs: self.timeout,
        }
    }
}

/// Expansion selection flags.
#[derive(Args, Debug, Clone, Default)]
pub(crate) struct ExpansionArgs {
    /// Render under this expansion ("none" renders the score as notated)
    #[arg(long, conflicts_with = "standard_expansions")]
    pub expansion: Option<String>,

    /// Try expansion-default and expansion-minimal, keeping the one with fewer insertions
    #[arg(long)]
    pub standard_expansions: bool,
}

impl ExpansionArgs {
    pub fn choice(&self) -> ExpansionChoice {
        ExpansionChoice::from_args(self.expansion.as_deref(), self.standard_expansions)
    }
}

/// Timeline export flags.
#[derive(Args, Debug, Clone, Default)]
pub(crate) struct TimelineArgs {
    /// URI of the timeline to export (enables RDF output)
    #[arg(long, requires = "mei_uri")]
    pub timeline_uri: Option<String>,

    /// URI of the MEI score the timeline points into
    #[arg(long, requires = "timeline_uri")]
    pub mei_uri: Option<String>,

    /// RDF serialization(s) to write
    #[arg(long, value_enum, default_value = "ttl")]
    pub format: RdfFormat,

    /// Also describe the performance (mo:Performance) with this URI
    #[arg(long, requires_all = ["timeline_uri", "audio_uri"])]
    pub performance_uri: Option<String>,

    /// Score URI for the performance description (default: --mei-uri)
    #[arg(long, requires = "performance_uri")]
    pub score_uri: Option<String>,

    /// Audio signal URI for the performance description
    #[arg(long, requires = "performance_uri")]
    pub audio_uri: Option<String>,

    /// Performance creation time, YYYY-MM-DDTHH:MM:SS (default: now)
    #[arg(long, requires = "performance_uri")]
    pub created: Option<String>,
}

impl TimelineArgs {
    pub fn options(&self) -> Option<TimelineOptions> {
        let timeline_uri = self.timeline_uri.as_ref()?;
        let mei_uri = self.mei_uri.as_ref()?;
        let mut options = TimelineOptions::new(timeline_uri, mei_uri, self.format);
        options.performance = self.performance_uri.as_ref().map(|uri| PerformanceOptions {
            performance_uri: uri.clone(),
            score_uri: self.score_uri.clone(),
            audio_uri: self.audio_uri.clone().unwrap_or_default(),
            created: self.created.clone(),
        });
        Some(options)
    }
}

/// Pipeline flags shared by `run` and `batch`.
#[derive(Args, Debug, Clone)]
pub(crate) struct PipelineArgs {
    /// Output directory for MAPS files and timelines
    #[arg(long)]
    pub out_dir: String,

    #[command(flatten)]
    pub expansion: ExpansionArgs,

    /// Matching threshold in milliseconds
    #[arg(long, default_value_t = DEFAULT_THRESHOLD_MS)]
    pub threshold: f64,

    /// Align candidate expansions concurrently
    #[arg(long)]
    pub parallel: bool,

    /// Keep each candidate's expanded MEI in the output directory
    #[arg(long)]
    pub keep_expanded_mei: bool,

    /// Performances are WebMIDI JSON captures
    #[arg(long)]
    pub webmidi: bool,

    #[command(flatten)]
    pub timeline: TimelineArgs,

    #[command(flatten)]
    pub tools: ToolArgs,

    /// Output machine-readable JSON (no colored output)
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Align a canonical MIDI file with a performance MIDI file
    Align {
        /// MIDI rendered from the score
        #[arg(long)]
        canonical: String,

        /// Performed MIDI file
        #[arg(long)]
        performance: String,

        /// Output path for the corresp table (default: stdout)
        #[arg(short, long)]
        out: Option<String>,

        #[command(flatten)]
        tools: ToolArgs,
    },

    /// Extract note positions (id, onset, MIDI pitch) from an MEI score
    Extract {
        /// Path to the MEI score
        #[arg(long)]
        mei: String,

        /// Render under this expansion
        #[arg(long)]
        expansion: Option<String>,

        /// Output path for the note JSON (default: stdout)
        #[arg(short, long)]
        out: Option<String>,

        /// Also write the canonical MIDI rendering here
        #[arg(long)]
        midi: Option<String>,

        #[command(flatten)]
        tools: ToolArgs,
    },

    /// Reconcile a corresp table with note positions into a MAPS file
    Reconcile {
        /// Corresp table produced by `align`
        #[arg(long)]
        corresp: String,

        /// Note position JSON produced by `extract`
        #[arg(long)]
        notes: String,

        /// Output MAPS file
        #[arg(short, long)]
        out: String,

        /// Matching threshold in milliseconds
        #[arg(long, default_value_t = DEFAULT_THRESHOLD_MS)]
        threshold: f64,

        /// Output machine-readable JSON (no colored output)
        #[arg(long)]
        json: bool,
    },

    /// Align one performance against a score, choosing the best expansion
    Run {
        /// Path to the MEI score
        #[arg(long)]
        mei: String,

        /// Performance MIDI (or WebMIDI JSON with --webmidi)
        #[arg(long)]
        performance: String,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },

    /// Run the pipeline for every performance under a directory
    Batch {
        /// Path to the MEI score
        #[arg(long)]
        mei: String,

        /// Directory scanned recursively for *.mid (or *.json with --webmidi)
        #[arg(long)]
        performance_dir: String,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },

    /// Export a MAPS file as an RDF timeline
    ToRdf {
        /// MAPS JSON file
        #[arg(long)]
        maps: String,

        #[command(flatten)]
        timeline: TimelineArgs,

        /// Output path (default: stdout)
        #[arg(short, long)]
        out: Option<String>,
    },

    /// Convert a WebMIDI JSON capture into a MIDI file
    Webmidi {
        /// WebMIDI JSON event list
        #[arg(short, long)]
        input: String,

        /// Output MIDI file
        #[arg(short, long)]
        output: String,

        /// Ticks per beat of the written file
        #[arg(long, default_value_t = 5000)]
        ticks_per_beat: u16,

        /// Tempo in beats per minute
        #[arg(long, default_value_t = 120)]
        tempo: u32,

        /// Output machine-readable JSON (no colored output)
        #[arg(long)]
        json: bool,
    },

    /// Show title, composer, content hash and expansions of an MEI score
    Inspect {
        /// Path to the MEI score
        #[arg(long)]
        mei: String,

        /// Print a Turtle score description with this score URI
        #[arg(long)]
        score_uri: Option<String>,

        /// MEI URI for the description (default: the file path)
        #[arg(long, requires = "score_uri")]
        mei_uri: Option<String>,

        /// Structural segmentation URI for the description
        #[arg(long, requires = "score_uri")]
        segments_uri: Option<String>,

        /// Related performance URI for the description
        #[arg(long, requires = "score_uri")]
        performance_uri: Option<String>,

        /// Output machine-readable JSON (no colored output)
        #[arg(long)]
        json: bool,
    },

    /// Check that SMAT and Verovio can be found
    Doctor {
        #[command(flatten)]
        tools: ToolArgs,
    },
}
