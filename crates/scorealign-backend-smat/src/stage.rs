//! The SMAT tool chain as typed stages.
//!
//! Every step names the tool it runs, the arguments it passes, and the file
//! it must leave behind in the scratch directory. Steps consume the previous
//! steps' outputs, so they run strictly in [`plan`] order.

use crate::orchestrator::AlignerConfig;

/// File stem of the copied canonical MIDI inside the scratch directory.
pub const CANONICAL_STEM: &str = "canonical";

/// File stem of the copied performance MIDI inside the scratch directory.
pub const PERFORMANCE_STEM: &str = "performance";

/// One SMAT executable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Piano-roll extraction from a MIDI file.
    PianoRoll,
    /// Piano-roll to fmt3x score representation.
    SprToFmt3x,
    /// fmt3x to hidden Markov model.
    Fmt3xToHmm,
    /// Coarse score-to-performance match.
    ScorePerfmMatcher,
    /// Error detection over the coarse match.
    ErrorDetection,
    /// Realignment with the merged-output HMM.
    RealignmentMohmm,
    /// Final correspondence extraction.
    MatchToCorresp,
}

impl Stage {
    /// All stages in chain order.
    pub const ALL: [Stage; 7] = [
        Stage::PianoRoll,
        Stage::SprToFmt3x,
        Stage::Fmt3xToHmm,
        Stage::ScorePerfmMatcher,
        Stage::ErrorDetection,
        Stage::RealignmentMohmm,
        Stage::MatchToCorresp,
    ];

    /// The executable name, also used as the stage name in errors.
    pub fn tool(&self) -> &'static str {
        match self {
            Stage::PianoRoll => "midi2pianoroll",
            Stage::SprToFmt3x => "SprToFmt3x",
            Stage::Fmt3xToHmm => "Fmt3xToHmm",
            Stage::ScorePerfmMatcher => "ScorePerfmMatcher",
            Stage::ErrorDetection => "ErrorDetection",
            Stage::RealignmentMohmm => "RealignmentMOHMM",
            Stage::MatchToCorresp => "MatchToCorresp",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tool())
    }
}

/// A single tool invocation in the chain.
#[derive(Debug, Clone, PartialEq)]
pub struct StageStep {
    pub stage: Stage,
    /// Arguments, relative to the scratch directory.
    pub args: Vec<String>,
    /// File the step must produce, relative to the scratch directory.
    pub output: String,
}

impl StageStep {
    fn new(stage: Stage, args: Vec<String>, output: String) -> Self {
        Self {
            stage,
            args,
            output,
        }
    }
}

fn file(stem: &str, kind: &str) -> String {
    format!("{}_{}.txt", stem, kind)
}

/// Builds the full chain of steps for one alignment.
pub fn plan(config: &AlignerConfig) -> Vec<StageStep> {
    let c = CANONICAL_STEM;
    let p = PERFORMANCE_STEM;

    vec![
        StageStep::new(
            Stage::PianoRoll,
            vec!["0".to_string(), c.to_string()],
            file(c, "spr"),
        ),
        StageStep::new(
            Stage::PianoRoll,
            vec!["0".to_string(), p.to_string()],
            file(p, "spr"),
        ),
        StageStep::new(
            Stage::SprToFmt3x,
            vec![file(c, "spr"), file(c, "fmt3x")],
            file(c, "fmt3x"),
        ),
        StageStep::new(
            Stage::Fmt3xToHmm,
            vec![file(c, "fmt3x"), file(c, "hmm")],
            file(c, "hmm"),
        ),
        StageStep::new(
            Stage::ScorePerfmMatcher,
            vec![
                file(c, "hmm"),
                file(p, "spr"),
                file(p, "pre_match"),
                config.match_tuning.to_string(),
            ],
            file(p, "pre_match"),
        ),
        StageStep::new(
            Stage::ErrorDetection,
            vec![
                file(c, "fmt3x"),
                file(c, "hmm"),
                file(p, "pre_match"),
                file(p, "err_match"),
                config.error_detection_flag.to_string(),
            ],
            file(p, "err_match"),
        ),
        StageStep::new(
            Stage::RealignmentMohmm,
            vec![
                file(c, "fmt3x"),
                file(c, "hmm"),
                file(p, "err_match"),
                file(p, "realigned_match"),
                config.realign_tuning.to_string(),
            ],
            file(p, "realigned_match"),
        ),
        StageStep::new(
            Stage::MatchToCorresp,
            vec![file(p, "realigned_match"), file(c, "spr"), file(p, "corresp")],
            file(p, "corresp"),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plan_order_and_outputs() {
        let steps = plan(&AlignerConfig::default());
        let tools: Vec<&str> = steps.iter().map(|s| s.stage.tool()).collect();
        assert_eq!(
            tools,
            vec![
                "midi2pianoroll",
                "midi2pianoroll",
                "SprToFmt3x",
                "Fmt3xToHmm",
                "ScorePerfmMatcher",
                "ErrorDetection",
                "RealignmentMOHMM",
                "MatchToCorresp",
            ]
        );
        assert_eq!(steps[0].output, "canonical_spr.txt");
        assert_eq!(steps[1].output, "performance_spr.txt");
        assert_eq!(steps.last().map(|s| s.output.as_str()), Some("performance_corresp.txt"));
    }

    #[test]
    fn test_tuning_parameters_in_args() {
        let steps = plan(&AlignerConfig::default());
        assert_eq!(
            steps[4].args,
            vec![
                "canonical_hmm.txt",
                "performance_spr.txt",
                "performance_pre_match.txt",
                "0.001"
            ]
        );
        assert_eq!(steps[5].args.last().map(String::as_str), Some("0"));
        assert_eq!(steps[6].args.last().map(String::as_str), Some("0.3"));

        let tuned = AlignerConfig::default().realign_tuning(0.5);
        assert_eq!(plan(&tuned)[6].args.last().map(String::as_str), Some("0.5"));
    }

    #[test]
    fn test_every_step_consumes_earlier_outputs() {
        let steps = plan(&AlignerConfig::default());
        let mut produced: Vec<&str> = Vec::new();
        for step in &steps {
            for arg in step.args.iter().filter(|a| a.ends_with(".txt") && **a != step.output) {
                assert!(produced.contains(&arg.as_str()), "{} reads {} before it exists", step.stage, arg);
            }
            produced.push(&step.output);
        }
    }
}
