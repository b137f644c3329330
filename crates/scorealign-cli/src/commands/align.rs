//! Align command implementation
//!
//! Runs the SMAT tool chain on a canonical and a performance MIDI file and
//! emits the raw correspondence table.

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;
use std::process::ExitCode;

use scorealign_backend_smat::{Aligner, ProcessRunner};
use scorealign_core::parse_corresp;

use super::ToolOptions;

/// Run the align command
///
/// # Arguments
/// * `canonical` - MIDI rendered from the score
/// * `performance` - Performed MIDI
/// * `out` - Output path for the corresp table (default: stdout)
///
/// # Returns
/// Exit code: 0 success, 1 alignment failure
pub fn run(canonical: &str, performance: &str, out: Option<&str>, tools: &ToolOptions) -> Result<ExitCode> {
    let aligner = Aligner::with_config(tools.aligner_config());
    align_with(&aligner, Path::new(canonical), Path::new(performance), out.map(Path::new))
}

pub(crate) fn align_with<R: ProcessRunner>(
    aligner: &Aligner<R>,
    canonical: &Path,
    performance: &Path,
    out: Option<&Path>,
) -> Result<ExitCode> {
    let text = aligner
        .align(canonical, performance)
        .with_context(|| format!("Alignment failed for {}", performance.display()))?;

    match out {
        Some(path) => {
            std::fs::write(path, &text)
                .with_context(|| format!("Failed to write corresp table: {}", path.display()))?;
            let table = parse_corresp(&text);
            println!(
                "{} {} ({} rows, {} insertions)",
                "Aligned".green().bold(),
                path.display(),
                table.rows.len(),
                table.insertion_count()
            );
        }
        None => print!("{}", text),
    }
    Ok(ExitCode::SUCCESS)
}
