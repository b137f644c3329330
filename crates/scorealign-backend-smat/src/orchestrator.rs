//! SMAT alignment orchestrator.
//!
//! Copies both MIDI files into a private scratch directory under fixed
//! stems, then runs the stage chain from [`crate::stage::plan`] one step at
//! a time. The scratch directory is a [`tempfile::TempDir`] owned by the
//! call, so it is removed on every return path.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use crate::error::{AlignError, AlignResult};
use crate::process::{CancelToken, Invocation, ProcessRunner, RunFailure, SystemRunner};
use crate::stage::{plan, Stage, StageStep, CANONICAL_STEM, PERFORMANCE_STEM};

/// Default wall-clock limit per stage (5 minutes).
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Environment variable naming the directory holding the SMAT binaries.
pub const SMAT_BIN_DIR_ENV: &str = "SMAT_BIN_DIR";

/// Configuration for the aligner.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignerConfig {
    /// Directory holding the SMAT executables.
    pub tool_dir: Option<PathBuf>,
    /// Wall-clock limit for each stage.
    pub timeout: Duration,
    /// Whether to capture stderr for error reports.
    pub capture_output: bool,
    /// Tuning parameter passed to `ScorePerfmMatcher`.
    pub match_tuning: f64,
    /// Flag passed to `ErrorDetection`.
    pub error_detection_flag: u32,
    /// Tuning parameter passed to `RealignmentMOHMM`.
    pub realign_tuning: f64,
}

impl Default for AlignerConfig {
    fn default() -> Self {
        Self {
            tool_dir: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            capture_output: true,
            match_tuning: 0.001,
            error_detection_flag: 0,
            realign_tuning: 0.3,
        }
    }
}

impl AlignerConfig {
    /// Sets the directory holding the SMAT executables.
    pub fn tool_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.tool_dir = Some(dir.into());
        self
    }

    /// Sets the per-stage timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the per-stage timeout in seconds.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    /// Sets the `ScorePerfmMatcher` tuning parameter.
    pub fn match_tuning(mut self, value: f64) -> Self {
        self.match_tuning = value;
        self
    }

    /// Sets the `RealignmentMOHMM` tuning parameter.
    pub fn realign_tuning(mut self, value: f64) -> Self {
        self.realign_tuning = value;
        self
    }
}

/// Availability of one SMAT executable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolStatus {
    pub tool: &'static str,
    pub path: Option<PathBuf>,
}

/// Aligns a canonical MIDI rendering of a score with a performance MIDI.
pub struct Aligner<R = SystemRunner> {
    config: AlignerConfig,
    runner: R,
    cancel: CancelToken,
}

impl Aligner<SystemRunner> {
    /// Creates an aligner with default configuration.
    pub fn new() -> Self {
        Self::with_config(AlignerConfig::default())
    }

    /// Creates an aligner with the given configuration.
    pub fn with_config(config: AlignerConfig) -> Self {
        Self::with_runner(config, SystemRunner)
    }
}

impl Default for Aligner<SystemRunner> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: ProcessRunner> Aligner<R> {
    /// Creates an aligner that runs tools through `runner`.
    pub fn with_runner(config: AlignerConfig, runner: R) -> Self {
        Self {
            config,
            runner,
            cancel: CancelToken::new(),
        }
    }

    /// Uses `token` for cancellation instead of a private one.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Returns a handle that cancels this aligner's runs.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// The aligner's configuration.
    pub fn config(&self) -> &AlignerConfig {
        &self.config
    }

    /// Locates a tool: config `tool_dir`, then `SMAT_BIN_DIR`, then `PATH`.
    pub fn find_tool(&self, tool: &str) -> Option<PathBuf> {
        if let Some(ref dir) = self.config.tool_dir {
            let path = dir.join(tool);
            if path.exists() {
                return Some(path);
            }
        }

        if let Ok(dir) = std::env::var(SMAT_BIN_DIR_ENV) {
            let path = PathBuf::from(dir).join(tool);
            if path.exists() {
                return Some(path);
            }
        }

        which::which(tool).ok()
    }

    /// Reports which SMAT executables can be located.
    pub fn check_tools(&self) -> Vec<ToolStatus> {
        Stage::ALL
            .iter()
            .map(|stage| ToolStatus {
                tool: stage.tool(),
                path: self.find_tool(stage.tool()),
            })
            .collect()
    }

    /// Aligns `canonical` against `performance` and returns the
    /// correspondence table text.
    pub fn align(&self, canonical: &Path, performance: &Path) -> AlignResult<String> {
        for input in [canonical, performance] {
            if !input.is_file() {
                return Err(AlignError::InputNotFound {
                    path: input.to_path_buf(),
                });
            }
        }

        let scratch = tempfile::Builder::new()
            .prefix("scorealign-smat-")
            .tempdir()?;
        tracing::debug!(scratch = %scratch.path().display(), "created alignment scratch directory");

        std::fs::copy(canonical, scratch.path().join(format!("{}.mid", CANONICAL_STEM)))?;
        std::fs::copy(performance, scratch.path().join(format!("{}.mid", PERFORMANCE_STEM)))?;

        let steps = plan(&self.config);
        for step in &steps {
            self.run_step(step, scratch.path())?;
        }

        let corresp_path = scratch.path().join(format!("{}_corresp.txt", PERFORMANCE_STEM));
        let text = std::fs::read_to_string(&corresp_path).map_err(|source| {
            AlignError::ReadCorrespFailed {
                path: corresp_path.clone(),
                source,
            }
        })?;

        tracing::info!(
            lines = text.lines().count(),
            "alignment produced correspondence table"
        );
        Ok(text)
    }

    fn run_step(&self, step: &StageStep, scratch: &Path) -> AlignResult<()> {
        let name = step.stage.tool();
        if self.cancel.is_cancelled() {
            return Err(AlignError::Cancelled {
                stage: name.to_string(),
            });
        }

        let program = self.find_tool(name).ok_or_else(|| AlignError::ToolNotFound {
            tool: name.to_string(),
        })?;

        tracing::debug!(stage = name, args = ?step.args, "running alignment stage");
        let invocation = Invocation {
            program: &program,
            args: &step.args,
            cwd: scratch,
            timeout: self.config.timeout,
            capture_output: self.config.capture_output,
            cancel: &self.cancel,
        };

        let output = self.runner.run(&invocation).map_err(|failure| match failure {
            RunFailure::Spawn(source) | RunFailure::Wait(source) => AlignError::SpawnFailed {
                stage: name.to_string(),
                source,
            },
            RunFailure::TimedOut(limit) => AlignError::timeout(name, limit.as_secs()),
            RunFailure::Cancelled => AlignError::Cancelled {
                stage: name.to_string(),
            },
        })?;

        if !output.success {
            let code = output
                .exit_code
                .map_or_else(|| "signal".to_string(), |c| c.to_string());
            return Err(AlignError::stage_failed(
                name,
                format!("exited with status {}: {}", code, output.stderr.trim()),
            ));
        }

        if !scratch.join(&step.output).exists() {
            return Err(AlignError::stage_failed(
                name,
                format!("expected output {} was not produced", step.output),
            ));
        }

        Ok(())
    }
}
