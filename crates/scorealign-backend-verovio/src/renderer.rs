//! Score rendering through the Verovio command-line tool.

use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use crate::error::{RenderError, RenderResult};

/// Default timeout for one Verovio run (2 minutes).
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Environment variable naming the Verovio executable.
pub const VEROVIO_PATH_ENV: &str = "VEROVIO_PATH";

/// Output produced by a rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderFormat {
    /// MEI, with any requested expansion applied.
    Mei,
    /// JSON timemap of note on/off events.
    Timemap,
    /// Standard MIDI file.
    Midi,
}

impl RenderFormat {
    /// The value passed to verovio's `-t` option.
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderFormat::Mei => "mei",
            RenderFormat::Timemap => "timemap",
            RenderFormat::Midi => "midi",
        }
    }

    /// File extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            RenderFormat::Mei => "mei",
            RenderFormat::Timemap => "json",
            RenderFormat::Midi => "mid",
        }
    }
}

/// Renders MEI documents.
pub trait ScoreRenderer {
    /// Renders `mei` to `format`, optionally applying `expansion` first.
    ///
    /// `resource` names the score in error messages.
    fn render(
        &self,
        mei: &str,
        resource: &str,
        format: RenderFormat,
        expansion: Option<&str>,
    ) -> RenderResult<Vec<u8>>;
}

impl<R: ScoreRenderer + ?Sized> ScoreRenderer for &R {
    fn render(
        &self,
        mei: &str,
        resource: &str,
        format: RenderFormat,
        expansion: Option<&str>,
    ) -> RenderResult<Vec<u8>> {
        (**self).render(mei, resource, format, expansion)
    }
}

/// Configuration for the Verovio renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct VerovioConfig {
    /// Path to the Verovio executable.
    pub verovio_path: Option<PathBuf>,
    /// Timeout for each Verovio run.
    pub timeout: Duration,
}

impl Default for VerovioConfig {
    fn default() -> Self {
        Self {
            verovio_path: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl VerovioConfig {
    /// Sets the Verovio executable path.
    pub fn verovio_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.verovio_path = Some(path.into());
        self
    }

    /// Sets the timeout in seconds.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }
}

/// Runs the `verovio` executable.
#[derive(Debug, Clone, Default)]
pub struct VerovioCli {
    config: VerovioConfig,
}

impl VerovioCli {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: VerovioConfig) -> Self {
        Self { config }
    }

    /// Finds the Verovio executable: config, then `VEROVIO_PATH`, then PATH.
    pub fn find_verovio(&self) -> RenderResult<PathBuf> {
        if let Some(ref path) = self.config.verovio_path {
            if path.exists() {
                return Ok(path.clone());
            }
        }

        if let Ok(path) = std::env::var(VEROVIO_PATH_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Ok(path);
            }
        }

        which::which("verovio").map_err(|_| RenderError::VerovioNotFound)
    }

    /// Returns the first line of `verovio --version`.
    pub fn version(&self) -> RenderResult<String> {
        let verovio = self.find_verovio()?;
        let output = Command::new(verovio)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .map_err(RenderError::SpawnFailed)?;
        let text = String::from_utf8_lossy(&output.stdout);
        Ok(text.lines().next().unwrap_or_default().trim().to_string())
    }
}

impl ScoreRenderer for VerovioCli {
    fn render(
        &self,
        mei: &str,
        resource: &str,
        format: RenderFormat,
        expansion: Option<&str>,
    ) -> RenderResult<Vec<u8>> {
        let verovio = self.find_verovio()?;
        let work = tempfile::Builder::new()
            .prefix("scorealign-verovio-")
            .tempdir()?;
        let input = work.path().join("input.mei");
        let output = work.path().join(format!("output.{}", format.extension()));
        std::fs::write(&input, mei)?;

        let mut cmd = Command::new(&verovio);
        if let Some(expansion) = expansion {
            cmd.arg("--expand").arg(expansion);
        }
        cmd.arg("-t")
            .arg(format.as_str())
            .arg("-o")
            .arg(&output)
            .arg(&input)
            .current_dir(work.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        tracing::debug!(
            resource,
            format = format.as_str(),
            expansion = expansion.unwrap_or(""),
            "rendering score with verovio"
        );
        let child = cmd.spawn().map_err(RenderError::SpawnFailed)?;
        let (status, stderr) = wait_with_timeout(child, self.config.timeout, resource)?;

        if !status.success() {
            return Err(RenderError::render_failed(
                resource,
                format!(
                    "verovio exited with status {}: {}",
                    status.code().unwrap_or(-1),
                    stderr.trim()
                ),
            ));
        }

        match std::fs::read(&output) {
            Ok(bytes) if !bytes.is_empty() => Ok(bytes),
            _ => Err(RenderError::render_failed(
                resource,
                format!(
                    "verovio produced no {} output: {}",
                    format.as_str(),
                    stderr.trim()
                ),
            )),
        }
    }
}

fn wait_with_timeout(
    mut child: Child,
    timeout: Duration,
    resource: &str,
) -> RenderResult<(ExitStatus, String)> {
    let start = Instant::now();

    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if start.elapsed() > timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(RenderError::Timeout {
                        resource: resource.to_string(),
                        timeout_secs: timeout.as_secs(),
                    });
                }
                std::thread::sleep(Duration::from_millis(50));
            }
            Err(e) => return Err(RenderError::SpawnFailed(e)),
        }
    };

    let mut stderr = String::new();
    if let Some(mut err) = child.stderr.take() {
        let _ = err.read_to_string(&mut stderr);
    }

    Ok((status, stderr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_strings() {
        assert_eq!(RenderFormat::Mei.as_str(), "mei");
        assert_eq!(RenderFormat::Timemap.as_str(), "timemap");
        assert_eq!(RenderFormat::Timemap.extension(), "json");
        assert_eq!(RenderFormat::Midi.extension(), "mid");
    }

    #[test]
    fn test_config_builder() {
        let config = VerovioConfig::default()
            .verovio_path("/usr/local/bin/verovio")
            .timeout_secs(30);
        assert_eq!(config.verovio_path, Some(PathBuf::from("/usr/local/bin/verovio")));
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[cfg(unix)]
    #[test]
    fn test_render_with_stand_in_executable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("verovio");
        // writes the input back out as the output, or fails on "--expand bad"
        std::fs::write(
            &fake,
            "#!/bin/sh\n\
             if [ \"$1\" = \"--expand\" ] && [ \"$2\" = \"bad\" ]; then echo 'unknown expansion' 1>&2; exit 1; fi\n\
             while [ \"$1\" != \"-o\" ]; do shift; done\n\
             cp \"$3\" \"$2\"\n",
        )
        .unwrap();
        std::fs::set_permissions(&fake, std::fs::Permissions::from_mode(0o755)).unwrap();

        let cli = VerovioCli::with_config(VerovioConfig::default().verovio_path(&fake));
        let bytes = cli
            .render("<mei/>", "score.mei", RenderFormat::Mei, Some("expansion-default"))
            .unwrap();
        assert_eq!(bytes, b"<mei/>");

        let err = cli
            .render("<mei/>", "score.mei", RenderFormat::Timemap, Some("bad"))
            .unwrap_err();
        assert!(matches!(err, RenderError::RenderFailed { .. }));
        assert!(err.to_string().contains("unknown expansion"));
        assert_eq!(err.resource(), Some("score.mei"));
    }
}
