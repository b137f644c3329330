//! Score/performance alignment backend: SMAT
//!
//! Aligns two MIDI files (a canonical rendering of a score and a recorded
//! performance) with the Symbolic Music Alignment Tool chain and returns the
//! resulting correspondence table.
//!
//! # Architecture
//!
//! SMAT is a set of standalone executables that communicate through files.
//! The orchestrator:
//!
//! 1. copies both inputs into a private scratch directory as
//!    `canonical.mid` and `performance.mid`,
//! 2. runs each [`stage::Stage`] in sequence, checking its exit status and
//!    its expected output file,
//! 3. reads `performance_corresp.txt` and discards the scratch directory.
//!
//! A missing output or a non-zero exit surfaces as
//! [`AlignError::StageFailed`] naming the failing tool. Each stage has a
//! wall-clock limit; expiry is reported with stage name `"timeout"`.
//!
//! # Example
//!
//! ```ignore
//! use scorealign_backend_smat::{Aligner, AlignerConfig};
//! use std::path::Path;
//!
//! let aligner = Aligner::with_config(AlignerConfig::default().tool_dir("/opt/smat/bin"));
//! let corresp = aligner.align(Path::new("score.mid"), Path::new("take-1.mid"))?;
//! ```
//!
//! # Tool lookup
//!
//! 1. [`AlignerConfig::tool_dir`]
//! 2. `SMAT_BIN_DIR` environment variable
//! 3. System PATH

pub mod error;
pub mod orchestrator;
pub mod process;
pub mod stage;

pub use error::{AlignError, AlignResult, TIMEOUT_STAGE};
pub use orchestrator::{Aligner, AlignerConfig, ToolStatus, DEFAULT_TIMEOUT_SECS, SMAT_BIN_DIR_ENV};
pub use process::{CancelToken, Invocation, ProcessOutput, ProcessRunner, RunFailure, SystemRunner};
pub use stage::{plan, Stage, StageStep};
