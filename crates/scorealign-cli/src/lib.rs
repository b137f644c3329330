//! scorealign CLI library.
//!
//! Command implementations for the `scorealign` binary, plus the pipeline
//! that ties score rendering, alignment, reconciliation and RDF export
//! together.

pub mod commands;
pub mod json_output;
pub mod logging;
pub mod pipeline;
pub mod webmidi;
