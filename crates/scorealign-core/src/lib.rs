//! Score/performance alignment core.
//!
//! This crate holds the data model and the algorithms that do not touch
//! external tools: parsing the aligner's correspondence table, validating
//! score note attributes, reconciling the two into MAPS observations, and
//! choosing between score expansions.
//!
//! # Example
//!
//! ```
//! use scorealign_core::{parse_corresp, reconcile, ScoreNoteAttribute};
//!
//! let corresp = "//header\n0\t1.0\tC4\t60\t64\tn1\t1.0\tC4\t60\t80\n";
//! let table = parse_corresp(corresp);
//! let attrs = vec![ScoreNoteAttribute::new("n1", 1000.0, 60)];
//!
//! let observations = reconcile(&table.rows, &attrs, 5.0);
//! assert_eq!(observations.len(), 1);
//! assert_eq!(observations[0].obs_num, 1);
//! ```
//!
//! # Modules
//!
//! - [`corresp`]: correspondence table parsing
//! - [`attributes`]: score note attributes and their JSON form
//! - [`observation`]: MAPS observations and insertion identifiers
//! - [`reconcile`]: the reconciliation engine
//! - [`expansion`]: best-expansion selection
//! - [`hash`]: content hashing
//! - [`error`]: errors, warnings and the backend error trait

pub mod attributes;
pub mod corresp;
pub mod error;
pub mod expansion;
pub mod hash;
pub mod observation;
pub mod reconcile;
#[cfg(any(test, feature = "verification"))]
pub mod verification;

pub use attributes::{attributes_to_json, parse_attributes_json, AttributeSet, ScoreNoteAttribute};
pub use corresp::{parse_corresp, CorrespTable, RawAlignmentRow, NO_REFERENCE};
pub use error::{
    BackendError, CoreError, CoreResult, ExpansionFailure, InputWarning, PipelineError,
    WarningCode,
};
pub use expansion::{
    select_best_expansion, select_best_expansion_parallel, standard_expansions,
    CandidateSummary, ExpansionRun, ExpansionSelection, STANDARD_EXPANSIONS,
};
pub use hash::{maps_hash, score_content_hash};
pub use observation::{
    insertion_id, is_insertion_id, maps_from_json, maps_to_json, sanitize_pitch_name,
    MapsObservation, OneOrMany, DEFAULT_INSERTION_PREFIX,
};
pub use reconcile::{
    reconcile, reconcile_with_report, ReconcileConfig, ReconcileReport, DEFAULT_THRESHOLD_MS,
};
