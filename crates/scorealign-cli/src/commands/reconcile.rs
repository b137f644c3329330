//! Reconcile command implementation
//!
//! Combines a corresp table with the score's note positions into a MAPS
//! file.

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;
use std::path::Path;
use std::process::ExitCode;

use scorealign_core::{
    maps_to_json, parse_attributes_json, parse_corresp, reconcile_with_report, InputWarning,
    ReconcileConfig,
};

use crate::json_output::{CommandOutput, JsonError, JsonWarning};
use crate::pipeline::write_failure;

/// Counts reported by the reconcile command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub output: String,
    pub observations: usize,
    pub matched: usize,
    pub inserted: usize,
    pub match_failures: usize,
    pub skipped_rows: usize,
    pub skipped_attributes: usize,
}

/// Run the reconcile command
///
/// # Arguments
/// * `corresp` - Correspondence table from `align`
/// * `notes` - Note position JSON from `extract`
/// * `out` - Output MAPS file
/// * `threshold_ms` - Matching threshold
/// * `json` - Output machine-readable JSON
pub fn run(corresp: &str, notes: &str, out: &str, threshold_ms: f64, json: bool) -> Result<ExitCode> {
    let config = ReconcileConfig::default().threshold_ms(threshold_ms);
    let result = reconcile_files(Path::new(corresp), Path::new(notes), Path::new(out), &config);

    if json {
        let output = match result {
            Ok((summary, warnings)) => CommandOutput::success(
                summary,
                warnings.iter().map(JsonWarning::from).collect(),
            ),
            Err(e) => CommandOutput::failure(vec![JsonError::from_anyhow(&e)]),
        };
        output.print()?;
        return Ok(if output.success {
            ExitCode::SUCCESS
        } else {
            ExitCode::from(1)
        });
    }

    let (summary, warnings) = result?;
    for warning in &warnings {
        println!("  {} {}", "!!".yellow(), warning);
    }
    println!(
        "{} {} observations -> {}",
        "Reconciled".green().bold(),
        summary.observations,
        summary.output
    );
    println!(
        "  matched {}, inserted {}, match failures {}, skipped rows {}, skipped notes {}",
        summary.matched,
        summary.inserted,
        summary.match_failures,
        summary.skipped_rows,
        summary.skipped_attributes
    );
    Ok(ExitCode::SUCCESS)
}

/// Reconciles two files and writes the MAPS result.
pub fn reconcile_files(
    corresp: &Path,
    notes: &Path,
    out: &Path,
    config: &ReconcileConfig,
) -> Result<(ReconcileSummary, Vec<InputWarning>)> {
    let corresp_text = std::fs::read_to_string(corresp)
        .with_context(|| format!("Failed to read corresp table: {}", corresp.display()))?;
    let notes_text = std::fs::read_to_string(notes)
        .with_context(|| format!("Failed to read note positions: {}", notes.display()))?;

    let table = parse_corresp(&corresp_text);
    let attributes = parse_attributes_json(&notes_text)
        .with_context(|| format!("Failed to parse note positions: {}", notes.display()))?;
    let report = reconcile_with_report(&table.rows, &attributes.attributes, config);

    std::fs::write(out, maps_to_json(&report.observations)?).map_err(|e| write_failure(out, e))?;

    let summary = ReconcileSummary {
        output: out.display().to_string(),
        observations: report.observations.len(),
        matched: report.matched_count,
        inserted: report.inserted_count,
        match_failures: report.match_failures,
        skipped_rows: table.skipped_rows() + report.skipped_rows,
        skipped_attributes: attributes.skipped_attributes() + report.skipped_attributes,
    };
    let mut warnings = table.warnings;
    warnings.extend(attributes.warnings);
    warnings.extend(report.warnings);
    Ok((summary, warnings))
}
