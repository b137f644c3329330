//! Score/performance alignment backend: Verovio
//!
//! Turns an MEI score into the two things alignment needs:
//!
//! - the **canonical MIDI** rendering used as the aligner's reference, and
//! - the **score note attributes** (identifier, onset in ms, MIDI pitch) for
//!   every note-on in the rendering.
//!
//! Both honour an optional named expansion (a repeat/section ordering
//! defined in the score).
//!
//! Rendering goes through the [`ScoreRenderer`] trait. [`VerovioCli`]
//! implements it by running the `verovio` executable, located via
//! [`VerovioConfig::verovio_path`], the `VEROVIO_PATH` environment variable,
//! or PATH.
//!
//! The [`mei`] module reads MEI directly for what the renderer does not
//! report: note pitches, expansion lists and note counts, and header
//! metadata.

pub mod error;
pub mod extract;
pub mod mei;
pub mod renderer;
pub mod timemap;

pub use error::{MeiError, RenderError, RenderResult};
pub use extract::{Extraction, NoteExtractor, ScoreSource};
pub use mei::{
    count_notes_in_expansions, expansions, metadata, note_pitches, Expansion, ExpansionNoteCount,
    ScoreMetadata,
};
pub use renderer::{RenderFormat, ScoreRenderer, VerovioCli, VerovioConfig, VEROVIO_PATH_ENV};
pub use timemap::{parse_timemap, TimemapEntry};
