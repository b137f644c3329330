//! CLI command implementations

pub mod align;
pub mod batch;
pub mod doctor;
pub mod extract;
pub mod inspect;
pub mod reconcile;
pub mod run;
pub mod to_rdf;
pub mod webmidi;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;

use scorealign_backend_smat::AlignerConfig;
use scorealign_backend_verovio::VerovioConfig;
use scorealign_rdf::{PerformanceDescription, TimelineConfig};

use crate::pipeline::{RdfFormat, TimelineExport};

/// Format accepted by `--created`.
pub const CREATED_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// External tool overrides shared by the commands that render or align.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolOptions {
    /// Directory holding the SMAT executables.
    pub smat_dir: Option<String>,
    /// Path to the verovio executable.
    pub verovio: Option<String>,
    /// Per-process timeout in seconds.
    pub timeout_secs: Option<u64>,
}

impl ToolOptions {
    pub fn aligner_config(&self) -> AlignerConfig {
        let mut config = AlignerConfig::default();
        if let Some(ref dir) = self.smat_dir {
            config = config.tool_dir(dir);
        }
        if let Some(secs) = self.timeout_secs {
            config = config.timeout_secs(secs);
        }
        config
    }

    pub fn verovio_config(&self) -> VerovioConfig {
        let mut config = VerovioConfig::default();
        if let Some(ref path) = self.verovio {
            config = config.verovio_path(path);
        }
        if let Some(secs) = self.timeout_secs {
            config = config.timeout_secs(secs);
        }
        config
    }
}

/// Optional `mo:Performance` description attached to a timeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerformanceOptions {
    pub performance_uri: String,
    /// Defaults to the MEI URI.
    pub score_uri: Option<String>,
    pub audio_uri: String,
    /// Creation time, `YYYY-MM-DDTHH:MM:SS`; now when absent.
    pub created: Option<String>,
}

/// Timeline export flags.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineOptions {
    pub timeline_uri: String,
    pub mei_uri: String,
    pub format: RdfFormat,
    pub performance: Option<PerformanceOptions>,
}

impl TimelineOptions {
    pub fn new(timeline_uri: impl Into<String>, mei_uri: impl Into<String>, format: RdfFormat) -> Self {
        Self {
            timeline_uri: timeline_uri.into(),
            mei_uri: mei_uri.into(),
            format,
            performance: None,
        }
    }

    /// Same options for another timeline.
    pub fn for_timeline(&self, timeline_uri: impl Into<String>) -> Self {
        Self {
            timeline_uri: timeline_uri.into(),
            ..self.clone()
        }
    }

    /// Builds the export settings, parsing `--created` if given.
    pub fn export(&self) -> Result<TimelineExport> {
        let mut config = TimelineConfig::new(&self.timeline_uri, &self.mei_uri);
        if let Some(ref perf) = self.performance {
            let score_uri = perf.score_uri.as_deref().unwrap_or(&self.mei_uri);
            let mut description =
                PerformanceDescription::new(&perf.performance_uri, score_uri, &perf.audio_uri);
            if let Some(ref created) = perf.created {
                let created = NaiveDateTime::parse_from_str(created, CREATED_FORMAT)
                    .with_context(|| format!("Invalid --created timestamp '{}'", created))?;
                description = description.created_at(created);
            }
            config = config.with_performance(description);
        }
        Ok(TimelineExport {
            config,
            format: self.format,
        })
    }
}
