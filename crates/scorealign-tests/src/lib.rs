//! scorealign End-to-End Test Infrastructure
//!
//! This crate provides integration tests for the alignment pipeline:
//!
//! - Pipeline: score + performance -> MAPS file, with the real process
//!   runner driving stand-in SMAT and Verovio executables (unix only)
//! - Reconciliation: the observable properties of the MAPS output
//! - Export: timelines and score descriptions built from pipeline output
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p scorealign-tests
//! ```

pub mod fixtures;
#[cfg(unix)]
pub mod harness;

pub use fixtures::{Fixture, SCORE_MEI, TIMEMAP};
#[cfg(unix)]
pub use harness::{StageCall, StandInTools};
