//! Doctor command implementation
//!
//! Checks that the external tools the pipeline drives can be found.

use anyhow::Result;
use colored::Colorize;
use std::process::ExitCode;

use scorealign_backend_smat::{Aligner, SMAT_BIN_DIR_ENV};
use scorealign_backend_verovio::{VerovioCli, VEROVIO_PATH_ENV};

use super::ToolOptions;

/// Run the doctor command
///
/// Checks:
/// - SMAT tool chain executables
/// - Verovio installation
///
/// # Returns
/// Exit code: 0 if all tools resolve, 1 if any are missing
pub fn run(tools: &ToolOptions) -> Result<ExitCode> {
    println!("{}", "scorealign doctor".cyan().bold());
    println!("{}", "=================".cyan());
    println!();

    let mut all_ok = true;

    println!("{}", "Versions:".bold());
    println!(
        "  {} scorealign-cli v{}",
        "->".green(),
        env!("CARGO_PKG_VERSION")
    );
    println!();

    println!("{}", "SMAT tool chain:".bold());
    let aligner = Aligner::with_config(tools.aligner_config());
    for status in aligner.check_tools() {
        match status.path {
            Some(path) => println!("  {} {} ({})", "ok".green(), status.tool, path.display()),
            None => {
                println!("  {} {} not found", "!!".red(), status.tool);
                all_ok = false;
            }
        }
    }
    if !all_ok {
        println!(
            "     {}",
            format!("Set {} or pass --smat-dir to locate the SMAT binaries.", SMAT_BIN_DIR_ENV)
                .dimmed()
        );
    }
    println!();

    println!("{}", "Score renderer:".bold());
    let verovio = VerovioCli::with_config(tools.verovio_config());
    match verovio.find_verovio() {
        Ok(path) => {
            let version = verovio
                .version()
                .ok()
                .and_then(|text| parse_verovio_version(&text))
                .unwrap_or_else(|| "unknown version".to_string());
            println!("  {} Verovio {} ({})", "ok".green(), version, path.display());
        }
        Err(_) => {
            println!("  {} Verovio not found", "!!".red());
            println!(
                "     {}",
                format!("Set {} or pass --verovio, or install verovio on PATH.", VEROVIO_PATH_ENV)
                    .dimmed()
            );
            all_ok = false;
        }
    }
    println!();

    if all_ok {
        println!("{}", "All checks passed.".green().bold());
        Ok(ExitCode::SUCCESS)
    } else {
        println!("{}", "Some tools are missing.".yellow().bold());
        Ok(ExitCode::from(1))
    }
}

/// Extracts the version number from `verovio --version` output.
///
/// Output looks like "Verovio 4.1.0-dev-abc1234" or just "4.1.0".
fn parse_verovio_version(text: &str) -> Option<String> {
    text.split_whitespace()
        .find(|word| word.chars().next().is_some_and(|c| c.is_ascii_digit()))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_verovio_version() {
        assert_eq!(
            parse_verovio_version("Verovio 4.1.0-dev-abc1234"),
            Some("4.1.0-dev-abc1234".to_string())
        );
        assert_eq!(parse_verovio_version("3.16.0"), Some("3.16.0".to_string()));
    }

    #[test]
    fn test_parse_verovio_version_invalid() {
        assert_eq!(parse_verovio_version(""), None);
        assert_eq!(parse_verovio_version("Verovio"), None);
    }
}
