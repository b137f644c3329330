//! Linked-data export for score/performance alignments.
//!
//! Turns reconciled MAPS observations into a performance timeline (Turtle or
//! JSON-LD), and describes the performance and the score it realises.
//!
//! ```
//! use scorealign_core::MapsObservation;
//! use scorealign_rdf::{timeline_turtle, TimelineConfig};
//!
//! let observations = vec![MapsObservation::single(1.5, "note-1", 64)];
//! let config = TimelineConfig::new("https://pod.example/tl/1", "https://pod.example/score.mei");
//! let ttl = timeline_turtle(&observations, &config).unwrap();
//! assert!(ttl.contains("tl:at \"P1.5S\""));
//! ```

pub mod error;
pub mod jsonld;
pub mod performance;
pub mod score;
pub mod timeline;
mod turtle;

pub use error::{ExportError, ExportResult};
pub use jsonld::{timeline_context, timeline_jsonld, timeline_jsonld_string};
pub use performance::{performance_turtle, PerformanceDescription, DEFAULT_PLAYBACK_OFFSET};
pub use score::{score_turtle, ExpansionCount, ScoreDescription};
pub use timeline::{instant_offset, timeline_turtle, TimelineConfig};
