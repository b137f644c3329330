//! End-to-end alignment of one performance against one score.
//!
//! For every candidate expansion the pipeline renders the score, extracts
//! its note attributes, aligns the canonical MIDI with the performance and
//! reconciles the result into `<performance>.maps.<expansion>.json`. The
//! expansion with the fewest inserted notes wins; the other candidates' MAPS
//! files are removed. The winner can then be exported as an RDF timeline.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde::Serialize;

use scorealign_backend_smat::{Aligner, AlignerConfig, ProcessRunner, SystemRunner};
use scorealign_backend_verovio::{
    expansions, Expansion, NoteExtractor, RenderError, ScoreRenderer, ScoreSource, VerovioCli,
    VerovioConfig,
};
use scorealign_core::{
    maps_to_json, parse_corresp, reconcile_with_report, select_best_expansion,
    select_best_expansion_parallel, standard_expansions, CandidateSummary, ExpansionFailure,
    ExpansionRun, InputWarning, MapsObservation, PipelineError, ReconcileConfig,
};
use scorealign_rdf::{timeline_jsonld_string, timeline_turtle, TimelineConfig};

use crate::json_output::error_codes;
use crate::webmidi::{self, WebMidiConfig};

/// Candidate name meaning "render the score as notated".
pub const NO_EXPANSION: &str = "none";

/// Expansion used when none is requested and the score declares it.
pub const DEFAULT_EXPANSION: &str = "expansion-default";

const PIPELINE_CATEGORY: &str = "pipeline";

/// An expansion name that cannot be used as a file name component.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid expansion name '{0}': expected a plain identifier without path separators")]
pub struct InvalidExpansionName(pub String);

/// Checks that `name` is safe to embed in scratch and output paths.
pub fn validate_expansion_name(name: &str) -> Result<(), InvalidExpansionName> {
    let unsafe_name = name.is_empty()
        || name == "."
        || name == ".."
        || name.chars().any(|c| c == '/' || c == '\\' || c == '\0');
    if unsafe_name {
        return Err(InvalidExpansionName(name.to_string()));
    }
    Ok(())
}

/// Which expansions to try.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ExpansionChoice {
    /// Exactly this expansion.
    Explicit(String),
    /// `expansion-default` and `expansion-minimal`, keeping the better one.
    Standard,
    /// `expansion-default` if the score declares it, otherwise none.
    #[default]
    Default,
}

impl ExpansionChoice {
    /// Builds the choice from the `--expansion` / `--standard-expansions`
    /// flags.
    pub fn from_args(expansion: Option<&str>, standard: bool) -> Self {
        match (expansion, standard) {
            (Some(expansion), _) => ExpansionChoice::Explicit(expansion.to_string()),
            (None, true) => ExpansionChoice::Standard,
            (None, false) => ExpansionChoice::Default,
        }
    }

    /// Rejects an explicit expansion that could escape the output directory.
    pub fn validate(&self) -> Result<(), InvalidExpansionName> {
        match self {
            ExpansionChoice::Explicit(expansion) => validate_expansion_name(expansion),
            _ => Ok(()),
        }
    }

    /// Candidate names for a score declaring `declared`.
    pub fn candidates(&self, declared: &[Expansion]) -> Vec<String> {
        match self {
            ExpansionChoice::Explicit(expansion) => vec![expansion.clone()],
            ExpansionChoice::Standard => standard_expansions(),
            ExpansionChoice::Default => {
                if declared.iter().any(|e| e.id == DEFAULT_EXPANSION) {
                    vec![DEFAULT_EXPANSION.to_string()]
                } else {
                    vec![NO_EXPANSION.to_string()]
                }
            }
        }
    }
}

/// RDF serializations to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum RdfFormat {
    #[default]
    Ttl,
    Jsonld,
    Both,
}

impl RdfFormat {
    pub fn turtle(&self) -> bool {
        matches!(self, RdfFormat::Ttl | RdfFormat::Both)
    }

    pub fn jsonld(&self) -> bool {
        matches!(self, RdfFormat::Jsonld | RdfFormat::Both)
    }
}

/// Timeline export settings.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineExport {
    pub config: TimelineConfig,
    pub format: RdfFormat,
}

/// Settings for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory receiving MAPS files and RDF output.
    pub out_dir: PathBuf,
    pub reconcile: ReconcileConfig,
    pub expansions: ExpansionChoice,
    /// Try candidate expansions concurrently.
    pub parallel: bool,
    /// Write each candidate's expanded MEI to `out_dir`.
    pub keep_expanded_mei: bool,
    /// Treat the performance as WebMIDI JSON and convert it first.
    pub webmidi: Option<WebMidiConfig>,
    pub timeline: Option<TimelineExport>,
}

impl PipelineConfig {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            reconcile: ReconcileConfig::default(),
            expansions: ExpansionChoice::default(),
            parallel: false,
            keep_expanded_mei: false,
            webmidi: None,
            timeline: None,
        }
    }

    pub fn reconcile(mut self, reconcile: ReconcileConfig) -> Self {
        self.reconcile = reconcile;
        self
    }

    pub fn expansions(mut self, choice: ExpansionChoice) -> Self {
        self.expansions = choice;
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn keep_expanded_mei(mut self, keep: bool) -> Self {
        self.keep_expanded_mei = keep;
        self
    }

    pub fn webmidi(mut self, config: WebMidiConfig) -> Self {
        self.webmidi = Some(config);
        self
    }

    pub fn timeline(mut self, export: TimelineExport) -> Self {
        self.timeline = Some(export);
        self
    }
}

/// Counts from reconciling one candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub matched: usize,
    pub inserted: usize,
    pub match_failures: usize,
    pub skipped_rows: usize,
    pub skipped_attributes: usize,
    /// Score note-ons without a resolvable pitch.
    pub unpitched_notes: usize,
}

#[derive(Debug, Default)]
struct CandidateDetail {
    stats: RunStats,
    warnings: Vec<InputWarning>,
}

/// Result of a pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub performance: String,
    /// The winning expansion.
    pub expansion: String,
    pub maps_file: PathBuf,
    pub observations: usize,
    pub stats: RunStats,
    pub candidates: Vec<CandidateSummary>,
    pub failures: Vec<ExpansionFailure>,
    pub rdf_files: Vec<PathBuf>,
    #[serde(skip)]
    pub warnings: Vec<InputWarning>,
    #[serde(skip)]
    pub maps: Vec<MapsObservation>,
}

/// Name of the MAPS file for a performance and expansion.
pub fn maps_file_name(performance_name: &str, expansion: &str) -> String {
    format!("{}.maps.{}.json", performance_name, expansion)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "performance".to_string())
}

fn resource_stem(resource: &str) -> String {
    Path::new(resource)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "score".to_string())
}

pub(crate) fn write_failure(path: &Path, err: std::io::Error) -> PipelineError {
    PipelineError::new(
        error_codes::FILE_WRITE,
        format!("Failed to write {}: {}", path.display(), err),
        PIPELINE_CATEGORY,
    )
}

/// Writes the timeline for `observations` and returns the files written.
pub fn write_timeline(
    observations: &[MapsObservation],
    export: &TimelineExport,
    out_dir: &Path,
    base_name: &str,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    if export.format.turtle() {
        let path = out_dir.join(format!("{}.ttl", base_name));
        let ttl = timeline_turtle(observations, &export.config)?;
        std::fs::write(&path, ttl)
            .with_context(|| format!("Failed to write timeline: {}", path.display()))?;
        written.push(path);
    }
    if export.format.jsonld() {
        let path = out_dir.join(format!("{}.jsonld", base_name));
        let jsonld = timeline_jsonld_string(observations, &export.config)?;
        std::fs::write(&path, jsonld)
            .with_context(|| format!("Failed to write timeline: {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

/// Score renderer, aligner and reconciliation wired together.
pub struct Pipeline<R, P = SystemRunner> {
    extractor: NoteExtractor<R>,
    aligner: Aligner<P>,
}

impl Pipeline<VerovioCli, SystemRunner> {
    /// A pipeline driving the real Verovio and SMAT executables.
    pub fn system(verovio: VerovioConfig, aligner: AlignerConfig) -> Self {
        Self::new(VerovioCli::with_config(verovio), Aligner::with_config(aligner))
    }
}

impl<R, P> Pipeline<R, P>
where
    R: ScoreRenderer + Sync,
    P: ProcessRunner,
{
    pub fn new(renderer: R, aligner: Aligner<P>) -> Self {
        Self {
            extractor: NoteExtractor::new(renderer),
            aligner,
        }
    }

    /// Aligns `performance` against `score`, choosing the best expansion.
    pub fn run(
        &self,
        score: &ScoreSource,
        performance: &Path,
        config: &PipelineConfig,
    ) -> Result<PipelineOutcome> {
        config.expansions.validate()?;
        if !performance.is_file() {
            anyhow::bail!("Performance file not found: {}", performance.display());
        }
        std::fs::create_dir_all(&config.out_dir).with_context(|| {
            format!(
                "Failed to create output directory: {}",
                config.out_dir.display()
            )
        })?;
        let scratch = tempfile::Builder::new()
            .prefix("scorealign-run-")
            .tempdir()
            .context("Failed to create scratch directory")?;

        let (performance_midi, performance_name) = match config.webmidi {
            Some(ref webmidi_config) => {
                let stem = performance
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_else(|| "performance".to_string());
                let name = format!("{}.mid", stem);
                let converted = scratch.path().join(&name);
                webmidi::convert_file(performance, &converted, webmidi_config)?;
                (converted, name)
            }
            None => (performance.to_path_buf(), file_name(performance)),
        };

        let declared = expansions(&score.mei)
            .map_err(|e| RenderError::mei_parse(&score.resource, e))
            .with_context(|| format!("Failed to read expansions of {}", score.resource))?;
        let candidates = config.expansions.candidates(&declared);
        tracing::info!(
            performance = %performance_name,
            score = %score.resource,
            candidates = ?candidates,
            "aligning performance"
        );

        let details: Mutex<BTreeMap<String, CandidateDetail>> = Mutex::new(BTreeMap::new());
        let run_one = |expansion: &str| -> Result<ExpansionRun, PipelineError> {
            let (run, detail) = self.run_expansion(
                score,
                expansion,
                &performance_midi,
                &performance_name,
                scratch.path(),
                config,
            )?;
            if let Ok(mut details) = details.lock() {
                details.insert(expansion.to_string(), detail);
            }
            Ok(run)
        };

        let selection = if config.parallel && candidates.len() > 1 {
            select_best_expansion_parallel(&candidates, run_one)?
        } else {
            select_best_expansion(&candidates, run_one)?
        };

        let detail = details
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&selection.expansion)
            .unwrap_or_default();

        let rdf_files = match config.timeline {
            Some(ref export) => write_timeline(
                &selection.run.observations,
                export,
                &config.out_dir,
                &performance_name,
            )?,
            None => Vec::new(),
        };

        let maps_file = config
            .out_dir
            .join(maps_file_name(&performance_name, &selection.expansion));
        tracing::info!(
            performance = %performance_name,
            expansion = %selection.expansion,
            inserted = selection.run.inserted_count,
            "selected expansion"
        );

        Ok(PipelineOutcome {
            performance: performance_name,
            expansion: selection.expansion,
            maps_file,
            observations: selection.run.observations.len(),
            stats: detail.stats,
            candidates: selection.candidates,
            failures: selection.failures,
            rdf_files,
            warnings: detail.warnings,
            maps: selection.run.observations,
        })
    }

    fn run_expansion(
        &self,
        score: &ScoreSource,
        expansion: &str,
        performance_midi: &Path,
        performance_name: &str,
        scratch: &Path,
        config: &PipelineConfig,
    ) -> Result<(ExpansionRun, CandidateDetail), PipelineError> {
        let expansion_arg = (expansion != NO_EXPANSION).then_some(expansion);
        let extraction = self
            .extractor
            .extract_note_attributes(score, expansion_arg)
            .map_err(PipelineError::from_backend)?;

        if config.keep_expanded_mei {
            let path = config
                .out_dir
                .join(format!("{}.{}.mei", resource_stem(&score.resource), expansion));
            std::fs::write(&path, &extraction.rendered_mei).map_err(|e| write_failure(&path, e))?;
        }

        let work = scratch.join(expansion);
        std::fs::create_dir_all(&work).map_err(|e| write_failure(&work, e))?;
        let canonical = work.join(format!("{}.canonical.mid", expansion));
        self.extractor
            .write_midi(&score.resource, &extraction, &canonical)
            .map_err(PipelineError::from_backend)?;

        let corresp = self
            .aligner
            .align(&canonical, performance_midi)
            .map_err(PipelineError::from_backend)?;
        let table = parse_corresp(&corresp);
        let report = reconcile_with_report(&table.rows, &extraction.attributes, &config.reconcile);

        let maps_path = config
            .out_dir
            .join(maps_file_name(performance_name, expansion));
        let json = maps_to_json(&report.observations).map_err(|e| {
            PipelineError::new(error_codes::PIPELINE, e.to_string(), PIPELINE_CATEGORY)
        })?;
        std::fs::write(&maps_path, json).map_err(|e| write_failure(&maps_path, e))?;

        let stats = RunStats {
            matched: report.matched_count,
            inserted: report.inserted_count,
            match_failures: report.match_failures,
            skipped_rows: table.skipped_rows() + report.skipped_rows,
            skipped_attributes: report.skipped_attributes,
            unpitched_notes: extraction.unpitched.len(),
        };
        let mut warnings = table.warnings;
        warnings.extend(report.warnings);

        Ok((
            ExpansionRun {
                observations: report.observations,
                inserted_count: report.inserted_count,
                artifacts: vec![maps_path],
            },
            CandidateDetail { stats, warnings },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use scorealign_backend_smat::{Invocation, ProcessOutput, RunFailure, Stage};
    use scorealign_backend_verovio::{RenderFormat, RenderResult};

    const MEI: &str = r##"<mei xmlns="http://www.music-encoding.org/ns/mei">
  <music><body><mdiv><score>
    <scoreDef key.sig="0"/>
    <section>
      <expansion xml:id="expansion-default" plist="#A #A"/>
      <expansion xml:id="expansion-minimal" plist="#A"/>
      <section xml:id="A">
        <measure><staff n="1"><layer n="1">
          <note xml:id="n1" pname="c" oct="4"/>
          <note xml:id="n2" pname="e" oct="4"/>
        </layer></staff></measure>
      </section>
    </section>
  </score></mdiv></body></music>
</mei>"##;

    const TIMEMAP: &str = r#"[
        {"tstamp": 0, "on": ["n1"]},
        {"tstamp": 500, "on": ["n2"], "off": ["n1"]},
        {"tstamp": 1000, "off": ["n2"]}
    ]"#;

    const HEADER: &str = "//Version: PianoRollToCorresp_v170101\n";
    const MATCHED: &str = "0\t0.0\tC4\t60\t70\tr1\t0.0\tC4\t60\t80\n1\t0.5\tE4\t64\t72\tr2\t0.5\tE4\t64\t80\n";
    const INSERTED: &str = "2\t0.8\tG4\t67\t50\t*\t-1\t*\t-1\t-1\n";

    /// Marks rendered MEI with the expansion and embeds it in the MIDI.
    struct FakeRenderer;

    impl ScoreRenderer for FakeRenderer {
        fn render(
            &self,
            mei: &str,
            _resource: &str,
            format: RenderFormat,
            expansion: Option<&str>,
        ) -> RenderResult<Vec<u8>> {
            Ok(match format {
                RenderFormat::Mei => {
                    format!("{}<!-- {} -->", mei, expansion.unwrap_or(NO_EXPANSION)).into_bytes()
                }
                RenderFormat::Timemap => TIMEMAP.as_bytes().to_vec(),
                RenderFormat::Midi => [b"MThd".as_slice(), mei.as_bytes()].concat(),
            })
        }
    }

    /// Writes each stage's output; the correspondence table has an extra
    /// inserted note unless the canonical MIDI came from expansion-minimal.
    struct FakeRunner;

    impl ProcessRunner for FakeRunner {
        fn run(&self, inv: &Invocation<'_>) -> Result<ProcessOutput, RunFailure> {
            let tool = inv.program.file_name().unwrap().to_string_lossy().to_string();
            let output = if tool == "midi2pianoroll" {
                format!("{}_spr.txt", inv.args[1])
            } else {
                inv.args.iter().filter(|a| a.ends_with(".txt")).last().unwrap().clone()
            };
            let content = if output.ends_with("_corresp.txt") {
                let canonical = std::fs::read(inv.cwd.join("canonical.mid")).unwrap();
                let minimal = String::from_utf8_lossy(&canonical).contains("<!-- expansion-minimal -->");
                if minimal {
                    format!("{}{}", HEADER, MATCHED)
                } else {
                    format!("{}{}{}", HEADER, MATCHED, INSERTED)
                }
            } else {
                String::new()
            };
            std::fs::write(inv.cwd.join(output), content).unwrap();
            Ok(ProcessOutput::ok())
        }
    }

    /// Produces a correspondence table with no rows.
    struct SilentPerformanceRunner;

    impl ProcessRunner for SilentPerformanceRunner {
        fn run(&self, inv: &Invocation<'_>) -> Result<ProcessOutput, RunFailure> {
            let tool = inv.program.file_name().unwrap().to_string_lossy().to_string();
            let output = if tool == "midi2pianoroll" {
                format!("{}_spr.txt", inv.args[1])
            } else {
                inv.args.iter().filter(|a| a.ends_with(".txt")).last().unwrap().clone()
            };
            let content = if output.ends_with("_corresp.txt") { HEADER } else { "" };
            std::fs::write(inv.cwd.join(output), content).unwrap();
            Ok(ProcessOutput::ok())
        }
    }

    struct Fixture<P = FakeRunner> {
        dir: tempfile::TempDir,
        performance: PathBuf,
        pipeline: Pipeline<FakeRenderer, P>,
    }

    fn fixture() -> Fixture {
        fixture_with(FakeRunner)
    }

    fn fixture_with<P: ProcessRunner>(runner: P) -> Fixture<P> {
        let dir = tempfile::tempdir().unwrap();
        let tools = dir.path().join("bin");
        std::fs::create_dir(&tools).unwrap();
        for stage in Stage::ALL {
            std::fs::write(tools.join(stage.tool()), "").unwrap();
        }
        let performance = dir.path().join("take-1.mid");
        std::fs::write(&performance, b"MThd").unwrap();
        let aligner = Aligner::with_runner(AlignerConfig::default().tool_dir(&tools), runner);
        Fixture {
            performance,
            pipeline: Pipeline::new(FakeRenderer, aligner),
            dir,
        }
    }

    fn score() -> ScoreSource {
        ScoreSource::new("op126.mei", MEI)
    }

    #[test]
    fn test_expansion_choice() {
        assert_eq!(
            ExpansionChoice::from_args(Some("expansion-x"), true),
            ExpansionChoice::Explicit("expansion-x".to_string())
        );
        assert_eq!(ExpansionChoice::from_args(None, true), ExpansionChoice::Standard);

        let declared = vec![Expansion {
            id: DEFAULT_EXPANSION.to_string(),
            elements: vec!["#A".to_string()],
        }];
        assert_eq!(
            ExpansionChoice::Default.candidates(&declared),
            vec![DEFAULT_EXPANSION.to_string()]
        );
        assert_eq!(
            ExpansionChoice::Default.candidates(&[]),
            vec![NO_EXPANSION.to_string()]
        );
    }

    #[test]
    fn test_standard_expansions_keep_fewest_insertions() {
        let fx = fixture();
        let out = fx.dir.path().join("out");
        let config = PipelineConfig::new(&out).expansions(ExpansionChoice::Standard);

        let outcome = fx.pipeline.run(&score(), &fx.performance, &config).unwrap();
        assert_eq!(outcome.expansion, "expansion-minimal");
        assert_eq!(outcome.performance, "take-1.mid");
        assert_eq!(
            outcome.candidates,
            vec![
                CandidateSummary {
                    expansion: "expansion-default".to_string(),
                    inserted_count: Some(1),
                },
                CandidateSummary {
                    expansion: "expansion-minimal".to_string(),
                    inserted_count: Some(0),
                },
            ]
        );
        assert_eq!(outcome.stats.matched, 2);
        assert_eq!(outcome.observations, 2);
        assert!(out.join("take-1.mid.maps.expansion-minimal.json").is_file());
        assert!(!out.join("take-1.mid.maps.expansion-default.json").exists());
        assert_eq!(outcome.maps_file, out.join("take-1.mid.maps.expansion-minimal.json"));
    }

    #[test]
    fn test_parallel_selection_matches_sequential() {
        let fx = fixture();
        let out = fx.dir.path().join("out");
        let config = PipelineConfig::new(&out)
            .expansions(ExpansionChoice::Standard)
            .parallel(true);
        let outcome = fx.pipeline.run(&score(), &fx.performance, &config).unwrap();
        assert_eq!(outcome.expansion, "expansion-minimal");
    }

    #[test]
    fn test_unknown_expansion_fails_run() {
        let fx = fixture();
        let config = PipelineConfig::new(fx.dir.path().join("out"))
            .expansions(ExpansionChoice::Explicit("expansion-ossia".to_string()));
        let err = fx.pipeline.run(&score(), &fx.performance, &config).unwrap_err();
        assert!(err.to_string().contains("expansion-ossia"));
    }

    #[test]
    fn test_timeline_and_expanded_mei_written() {
        let fx = fixture();
        let out = fx.dir.path().join("out");
        let config = PipelineConfig::new(&out)
            .keep_expanded_mei(true)
            .timeline(TimelineExport {
                config: TimelineConfig::new(
                    "https://pod.example/timeline/take-1",
                    "https://pod.example/op126.mei",
                ),
                format: RdfFormat::Both,
            });

        let outcome = fx.pipeline.run(&score(), &fx.performance, &config).unwrap();
        assert_eq!(outcome.expansion, DEFAULT_EXPANSION);
        assert_eq!(outcome.stats.inserted, 1);
        assert_eq!(
            outcome.rdf_files,
            vec![out.join("take-1.mid.ttl"), out.join("take-1.mid.jsonld")]
        );
        let ttl = std::fs::read_to_string(out.join("take-1.mid.ttl")).unwrap();
        assert!(ttl.contains("frbr:embodimentOf maps:inserted_G4 ."));
        assert!(out.join("op126.expansion-default.mei").is_file());
    }

    #[test]
    fn test_zero_observations_still_export_timeline() {
        let fx = fixture_with(SilentPerformanceRunner);
        let out = fx.dir.path().join("out");
        let config = PipelineConfig::new(&out).timeline(TimelineExport {
            config: TimelineConfig::new(
                "https://pod.example/timeline/take-1",
                "https://pod.example/op126.mei",
            ),
            format: RdfFormat::Both,
        });

        let outcome = fx.pipeline.run(&score(), &fx.performance, &config).unwrap();
        assert_eq!(outcome.observations, 0);
        assert_eq!(
            outcome.rdf_files,
            vec![out.join("take-1.mid.ttl"), out.join("take-1.mid.jsonld")]
        );
        let ttl = std::fs::read_to_string(out.join("take-1.mid.ttl")).unwrap();
        assert!(ttl.contains("<https://pod.example/timeline/take-1> a tl:Timeline ."));
        assert!(!ttl.contains("tl:Instant"));
        assert!(outcome.maps_file.is_file());
    }

    #[test]
    fn test_webmidi_performance_is_converted() {
        let fx = fixture();
        let input = fx.dir.path().join("take-2.json");
        std::fs::write(
            &input,
            r#"[{"timestamp": 0, "data": {"_data": {"0": 144, "1": 60, "2": 70}}}]"#,
        )
        .unwrap();
        let config = PipelineConfig::new(fx.dir.path().join("out")).webmidi(WebMidiConfig::default());
        let outcome = fx.pipeline.run(&score(), &input, &config).unwrap();
        assert_eq!(outcome.performance, "take-2.mid");
    }

    #[test]
    fn test_expansion_names_with_separators_are_rejected() {
        assert!(validate_expansion_name("expansion-default").is_ok());
        for name in ["../x", "a/b", "a\\b", "..", ".", ""] {
            assert_eq!(
                validate_expansion_name(name),
                Err(InvalidExpansionName(name.to_string()))
            );
        }
    }

    #[test]
    fn test_path_like_expansion_fails_before_alignment() {
        let fx = fixture();
        let out = fx.dir.path().join("out");
        let config = PipelineConfig::new(&out)
            .expansions(ExpansionChoice::Explicit("../escaped".to_string()));

        let err = fx.pipeline.run(&score(), &fx.performance, &config).unwrap_err();
        assert_eq!(
            err.downcast_ref::<InvalidExpansionName>(),
            Some(&InvalidExpansionName("../escaped".to_string()))
        );
        assert!(!out.exists());
        assert!(!fx.dir.path().join("escaped").exists());
    }

    #[test]
    fn test_missing_performance() {
        let fx = fixture();
        let config = PipelineConfig::new(fx.dir.path().join("out"));
        assert!(fx
            .pipeline
            .run(&score(), Path::new("/nonexistent/take.mid"), &config)
            .is_err());
    }
}
