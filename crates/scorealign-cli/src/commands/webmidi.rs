//! WebMIDI command implementation

use anyhow::Result;
use colored::Colorize;
use std::path::Path;
use std::process::ExitCode;

use crate::json_output::CommandOutput;
use crate::webmidi::{convert_file, WebMidiConfig};

/// Run the webmidi command
///
/// Converts a WebMIDI JSON capture into a Standard MIDI File.
pub fn run(input: &str, output: &str, config: &WebMidiConfig, json: bool) -> Result<ExitCode> {
    let summary = convert_file(Path::new(input), Path::new(output), config)?;

    if json {
        CommandOutput::success(summary, Vec::new()).print()?;
        return Ok(ExitCode::SUCCESS);
    }

    println!("{} {} -> {}", "Converted".green().bold(), input, output);
    println!(
        "  note on {}, note off {}, control change {}",
        summary.note_on, summary.note_off, summary.control_change
    );
    if summary.skipped > 0 {
        println!("  {} {} event(s) dropped", "!!".yellow(), summary.skipped);
    }
    Ok(ExitCode::SUCCESS)
}
