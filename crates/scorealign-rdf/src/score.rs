//! Score descriptions.

use serde::{Deserialize, Serialize};

use crate::error::ExportResult;
use crate::turtle::{check_uri, literal, write_prefixes, DCTERMS, MELD, MO, SKOS};

/// Number of notes a score plays under one expansion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpansionCount {
    pub expansion: String,
    pub note_count: usize,
}

/// A published score and the resources related to it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScoreDescription {
    pub score_uri: String,
    /// The MEI file the score is published as.
    pub mei_uri: String,
    pub title: String,
    /// Structural segmentation of the score.
    pub segments_uri: Option<String>,
    /// A related performance resource.
    pub performance_uri: Option<String>,
    /// A copy of the MEI file that should be treated as identical.
    pub mei_copy_uri: Option<String>,
    pub expansions: Vec<ExpansionCount>,
}

impl ScoreDescription {
    pub fn new(
        score_uri: impl Into<String>,
        mei_uri: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            score_uri: score_uri.into(),
            mei_uri: mei_uri.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn segments(mut self, uri: impl Into<String>) -> Self {
        self.segments_uri = Some(uri.into());
        self
    }

    pub fn performance(mut self, uri: impl Into<String>) -> Self {
        self.performance_uri = Some(uri.into());
        self
    }

    pub fn mei_copy(mut self, uri: impl Into<String>) -> Self {
        self.mei_copy_uri = Some(uri.into());
        self
    }

    /// Adds an expansion and its note count.
    pub fn expansion(mut self, expansion: impl Into<String>, note_count: usize) -> Self {
        self.expansions.push(ExpansionCount {
            expansion: expansion.into(),
            note_count,
        });
        self
    }

    fn validate(&self) -> ExportResult<()> {
        check_uri("score", &self.score_uri)?;
        check_uri("MEI", &self.mei_uri)?;
        for (role, uri) in [
            ("segments", &self.segments_uri),
            ("performance", &self.performance_uri),
            ("MEI copy", &self.mei_copy_uri),
        ] {
            if let Some(uri) = uri {
                check_uri(role, uri)?;
            }
        }
        Ok(())
    }
}

/// Renders a Turtle document describing a score.
pub fn score_turtle(score: &ScoreDescription) -> ExportResult<String> {
    score.validate()?;

    let mut out = String::new();
    write_prefixes(
        &mut out,
        &[
            ("dcterms", DCTERMS),
            ("meld", MELD),
            ("mo", MO),
            ("skos", SKOS),
        ],
    );
    out.push('\n');

    if let Some(ref copy) = score.mei_copy_uri {
        out.push_str(&format!(
            "<{}> a mo:PublishedScore ;\n    skos:exactMatch <{}> .\n\n",
            copy, score.mei_uri
        ));
    }

    let mut predicates = vec![
        format!("dcterms:title {}", literal(&score.title)),
        format!("mo:published_as <{}>", score.mei_uri),
    ];
    if let Some(ref performance) = score.performance_uri {
        predicates.push(format!("skos:related <{}>", performance));
    }
    if !score.expansions.is_empty() {
        let names: Vec<String> = score
            .expansions
            .iter()
            .map(|e| literal(&e.expansion))
            .collect();
        predicates.push(format!("meld:expansion {}", names.join(", ")));

        let counts: Vec<String> = score
            .expansions
            .iter()
            .map(|e| {
                format!(
                    "[ meld:expansionId {} ; meld:noteCount {} ]",
                    literal(&e.expansion),
                    e.note_count
                )
            })
            .collect();
        predicates.push(format!(
            "meld:expansionNoteCount {}",
            counts.join(",\n        ")
        ));
    }
    if let Some(ref segments) = score.segments_uri {
        predicates.push(format!("meld:segments <{}>", segments));
    }

    out.push_str(&format!("<{}> a mo:Score ;\n    ", score.score_uri));
    out.push_str(&predicates.join(" ;\n    "));
    out.push_str(" .\n\n");
    out.push_str(&format!("<{}> a mo:PublishedScore .\n\n", score.mei_uri));
    Ok(out)
}
