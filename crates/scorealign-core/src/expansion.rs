//! Score expansion selection.
//!
//! A score may be rendered under several expansions (with or without
//! repeats, for example). Each candidate is aligned in turn and the one
//! yielding the fewest inserted notes is kept. Failing candidates are logged
//! and skipped; artifacts of losing candidates are deleted.

use std::path::PathBuf;

use serde::Serialize;

use crate::error::{CoreError, CoreResult, ExpansionFailure, PipelineError};
use crate::observation::MapsObservation;

/// Expansion identifiers tried when no explicit expansion is requested.
pub const STANDARD_EXPANSIONS: [&str; 2] = ["expansion-default", "expansion-minimal"];

/// Output of aligning a performance against one expansion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpansionRun {
    /// Reconciled observations.
    pub observations: Vec<MapsObservation>,
    /// Number of inserted (unnotated) notes.
    pub inserted_count: usize,
    /// Files written for this candidate, removed if it does not win.
    pub artifacts: Vec<PathBuf>,
}

/// Per-candidate summary, in candidate order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateSummary {
    pub expansion: String,
    /// `None` when the candidate failed.
    pub inserted_count: Option<usize>,
}

/// The winning expansion and what happened to the others.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpansionSelection {
    /// Identifier of the winning expansion.
    pub expansion: String,
    /// The winner's output.
    pub run: ExpansionRun,
    /// Every candidate in the order it was supplied.
    pub candidates: Vec<CandidateSummary>,
    /// Candidates that failed.
    pub failures: Vec<ExpansionFailure>,
}

/// Runs each candidate in sequence and keeps the one with the fewest
/// insertions.
///
/// A candidate replaces the current best only with a strictly smaller
/// inserted-note count, so the first of several equal candidates wins.
pub fn select_best_expansion<F>(candidates: &[String], mut run_one: F) -> CoreResult<ExpansionSelection>
where
    F: FnMut(&str) -> Result<ExpansionRun, PipelineError>,
{
    reduce_runs(
        candidates
            .iter()
            .map(|expansion| (expansion.clone(), run_one(expansion))),
    )
}

/// Like [`select_best_expansion`] but runs candidates on scoped threads.
///
/// Results are collected in candidate order and reduced sequentially, so the
/// outcome is identical to the sequential version.
pub fn select_best_expansion_parallel<F>(
    candidates: &[String],
    run_one: F,
) -> CoreResult<ExpansionSelection>
where
    F: Fn(&str) -> Result<ExpansionRun, PipelineError> + Sync,
{
    let run_one = &run_one;
    let results: Vec<(String, Result<ExpansionRun, PipelineError>)> = std::thread::scope(|scope| {
        let handles: Vec<_> = candidates
            .iter()
            .map(|expansion| (expansion, scope.spawn(move || run_one(expansion))))
            .collect();
        handles
            .into_iter()
            .map(|(expansion, handle)| {
                let result = handle.join().unwrap_or_else(|_| {
                    Err(PipelineError::new(
                        "PIPELINE_001",
                        "expansion worker panicked",
                        "pipeline",
                    ))
                });
                (expansion.clone(), result)
            })
            .collect()
    });
    reduce_runs(results)
}

fn reduce_runs<I>(results: I) -> CoreResult<ExpansionSelection>
where
    I: IntoIterator<Item = (String, Result<ExpansionRun, PipelineError>)>,
{
    let mut best: Option<(String, ExpansionRun)> = None;
    let mut candidates = Vec::new();
    let mut failures = Vec::new();

    for (expansion, result) in results {
        match result {
            Ok(run) => {
                tracing::info!(
                    expansion = %expansion,
                    inserted = run.inserted_count,
                    "expansion aligned"
                );
                candidates.push(CandidateSummary {
                    expansion: expansion.clone(),
                    inserted_count: Some(run.inserted_count),
                });
                match best.take() {
                    Some((current, current_run)) if current_run.inserted_count <= run.inserted_count => {
                        discard_artifacts(&expansion, &run.artifacts);
                        best = Some((current, current_run));
                    }
                    previous => {
                        if let Some((loser, loser_run)) = previous {
                            discard_artifacts(&loser, &loser_run.artifacts);
                        }
                        best = Some((expansion, run));
                    }
                }
            }
            Err(err) => {
                tracing::warn!(expansion = %expansion, error = %err, "skipping expansion");
                candidates.push(CandidateSummary {
                    expansion: expansion.clone(),
                    inserted_count: None,
                });
                failures.push(err.into_expansion_failure(expansion));
            }
        }
    }

    match best {
        Some((expansion, run)) => Ok(ExpansionSelection {
            expansion,
            run,
            candidates,
            failures,
        }),
        None if failures.is_empty() => Err(CoreError::NoExpansions),
        None => Err(CoreError::AllExpansionsFailed { failures }),
    }
}

fn discard_artifacts(expansion: &str, artifacts: &[PathBuf]) {
    for path in artifacts {
        match std::fs::remove_file(path) {
            Ok(()) => tracing::debug!(expansion, path = %path.display(), "removed losing artifact"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => tracing::warn!(
                expansion,
                path = %path.display(),
                error = %err,
                "could not remove artifact"
            ),
        }
    }
}

/// Standard expansion identifiers as owned strings.
pub fn standard_expansions() -> Vec<String> {
    STANDARD_EXPANSIONS.iter().map(|s| s.to_string()).collect()
}
