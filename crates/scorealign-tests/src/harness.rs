//! Stand-in executables for the external tools.
//!
//! [`StandInTools`] writes shell scripts named after the SMAT binaries and a
//! `verovio` script, so tests exercise the real process runner, scratch
//! directories and exit-status handling without the actual tools.
//!
//! The SMAT scripts append one line per call to `calls.log` and write the
//! output file each stage is expected to leave behind. `MatchToCorresp`
//! copies `corresp-minimal.txt` when the canonical MIDI was rendered under
//! `expansion-minimal`, and `corresp-default.txt` otherwise.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use scorealign_backend_smat::{AlignerConfig, Stage};
use scorealign_backend_verovio::VerovioConfig;
use scorealign_cli::commands::ToolOptions;

use crate::fixtures::{corresp_default, corresp_minimal, TIMEMAP};

const SMAT_SCRIPT: &str = r#"#!/bin/sh
tool=$(basename "$0")
echo "$tool $(pwd) $*" >> "@DIR@/calls.log"
if [ -f "@DIR@/fail-$tool" ]; then echo "$tool failed on purpose" 1>&2; exit 3; fi
if [ -f "@DIR@/silent-$tool" ]; then exit 0; fi
case "$tool" in
  midi2pianoroll)
    if grep -q BROKEN "$2.mid"; then echo "unreadable MIDI file" 1>&2; exit 2; fi
    : > "$2_spr.txt"
    ;;
  MatchToCorresp)
    if grep -q '<!-- expansion-minimal -->' canonical.mid; then
      cp "@DIR@/corresp-minimal.txt" "$3"
    else
      cp "@DIR@/corresp-default.txt" "$3"
    fi
    ;;
  *)
    out=""
    for arg in "$@"; do
      case "$arg" in *.txt) out="$arg" ;; esac
    done
    : > "$out"
    ;;
esac
"#;

const VEROVIO_SCRIPT: &str = r#"#!/bin/sh
expand=none
if [ "$1" = "--expand" ]; then expand="$2"; shift 2; fi
format="$2"
out="$4"
in="$5"
case "$format" in
  mei) { cat "$in"; printf '<!-- %s -->\n' "$expand"; } > "$out" ;;
  timemap) cp "@DIR@/timemap.json" "$out" ;;
  midi) { printf 'MThd'; cat "$in"; } > "$out" ;;
  *) echo "unsupported output type $format" 1>&2; exit 1 ;;
esac
"#;

/// One recorded SMAT invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageCall {
    pub tool: String,
    /// Working directory the tool ran in.
    pub cwd: PathBuf,
    pub args: Vec<String>,
}

/// A directory of stand-in tool executables.
pub struct StandInTools {
    pub dir: TempDir,
}

impl StandInTools {
    /// Create the stand-ins with the default fixture outputs.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create tool dir");
        let tools = Self { dir };
        let root = tools.path().display().to_string();

        for stage in Stage::ALL {
            tools.write_script(stage.tool(), &SMAT_SCRIPT.replace("@DIR@", &root));
        }
        tools.write_script("verovio", &VEROVIO_SCRIPT.replace("@DIR@", &root));
        tools.set_corresp_minimal(&corresp_minimal());
        tools.set_corresp_default(&corresp_default());
        fs::write(tools.path().join("timemap.json"), TIMEMAP).expect("Failed to write timemap");
        tools
    }

    fn write_script(&self, name: &str, body: &str) {
        let path = self.path().join(name);
        fs::write(&path, body).expect("Failed to write stand-in script");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
            .expect("Failed to make stand-in executable");
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn verovio(&self) -> PathBuf {
        self.path().join("verovio")
    }

    /// Corresp table returned for the minimal rendering.
    pub fn set_corresp_minimal(&self, text: &str) {
        fs::write(self.path().join("corresp-minimal.txt"), text).expect("Failed to write corresp");
    }

    /// Corresp table returned for every other rendering.
    pub fn set_corresp_default(&self, text: &str) {
        fs::write(self.path().join("corresp-default.txt"), text).expect("Failed to write corresp");
    }

    /// Make `tool` exit with status 3.
    pub fn fail_tool(&self, tool: &str) {
        fs::write(self.path().join(format!("fail-{}", tool)), "").expect("Failed to write marker");
    }

    /// Make `tool` exit successfully without writing its output.
    pub fn silence_tool(&self, tool: &str) {
        fs::write(self.path().join(format!("silent-{}", tool)), "").expect("Failed to write marker");
    }

    /// SMAT invocations recorded so far.
    pub fn calls(&self) -> Vec<StageCall> {
        let log = fs::read_to_string(self.path().join("calls.log")).unwrap_or_default();
        log.lines()
            .filter_map(|line| {
                let mut parts = line.split_whitespace();
                let tool = parts.next()?.to_string();
                let cwd = PathBuf::from(parts.next()?);
                Some(StageCall {
                    tool,
                    cwd,
                    args: parts.map(str::to_string).collect(),
                })
            })
            .collect()
    }

    pub fn aligner_config(&self) -> AlignerConfig {
        AlignerConfig::default().tool_dir(self.path()).timeout_secs(30)
    }

    pub fn verovio_config(&self) -> VerovioConfig {
        VerovioConfig::default().verovio_path(self.verovio()).timeout_secs(30)
    }

    /// Tool overrides for the CLI command functions.
    pub fn options(&self) -> ToolOptions {
        ToolOptions {
            smat_dir: Some(self.path().display().to_string()),
            verovio: Some(self.verovio().display().to_string()),
            timeout_secs: Some(30),
        }
    }
}

impl Default for StandInTools {
    fn default() -> Self {
        Self::new()
    }
}
