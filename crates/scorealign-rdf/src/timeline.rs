//! Performance timelines.
//!
//! Each observation becomes a `tl:Instant` on the performance timeline,
//! linked with `frbr:embodimentOf` to the score notes it realises. Every
//! performed velocity additionally gets an `oa:Annotation` whose target is
//! scoped to the timeline.
//!
//! Notes the performer added (insertion identifiers) are written in the
//! `maps:` namespace; notated notes are written relative to the MEI file.

use scorealign_core::{is_insertion_id, MapsObservation, DEFAULT_INSERTION_PREFIX};

use crate::error::ExportResult;
use crate::performance::{write_performance_triples, PerformanceDescription};
use crate::turtle::{
    check_uri, decimal, is_plain_local_name, literal, mean, write_prefixes, DCTERMS, FRBR, MAPS,
    MELD, MO, OA, RDF, RDFS, SO, TL,
};

/// Where a timeline lives and what it refers to.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineConfig {
    /// URI of the timeline document.
    pub timeline_uri: String,
    /// URI of the MEI file the note identifiers belong to.
    pub mei_uri: String,
    /// Prefix marking synthesised insertion identifiers.
    pub insertion_prefix: String,
    /// Performance to describe alongside the timeline.
    pub include_performance: Option<PerformanceDescription>,
}

impl TimelineConfig {
    pub fn new(timeline_uri: impl Into<String>, mei_uri: impl Into<String>) -> Self {
        Self {
            timeline_uri: timeline_uri.into(),
            mei_uri: mei_uri.into(),
            insertion_prefix: DEFAULT_INSERTION_PREFIX.to_string(),
            include_performance: None,
        }
    }

    /// Sets the insertion identifier prefix.
    pub fn insertion_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.insertion_prefix = prefix.into();
        self
    }

    /// Describes `performance` in the same document.
    pub fn with_performance(mut self, performance: PerformanceDescription) -> Self {
        self.include_performance = Some(performance);
        self
    }

    pub(crate) fn validate(&self) -> ExportResult<()> {
        check_uri("timeline", &self.timeline_uri)?;
        check_uri("MEI", &self.mei_uri)?;
        if let Some(ref performance) = self.include_performance {
            performance.validate()?;
        }
        Ok(())
    }

    /// Local name of an insertion in the `maps:` namespace, or `None` for a
    /// score note identifier.
    pub fn inserted_local_name<'a>(&self, xml_id: &'a str) -> Option<&'a str> {
        if !is_insertion_id(&self.insertion_prefix, xml_id) {
            return None;
        }
        Some(&xml_id[self.insertion_prefix.len()..])
    }

    /// Full IRI of the resource an identifier embodies.
    pub fn embodiment_iri(&self, xml_id: &str) -> String {
        match self.inserted_local_name(xml_id) {
            Some(pitch) => format!("{}inserted_{}", MAPS, pitch),
            None => format!("{}#{}", self.mei_uri, xml_id),
        }
    }

    /// Turtle term for the resource an identifier embodies.
    pub(crate) fn embodiment_term(&self, xml_id: &str) -> String {
        match self.inserted_local_name(xml_id) {
            Some(pitch) if is_plain_local_name(pitch) => format!("maps:inserted_{}", pitch),
            None if is_plain_local_name(xml_id) => format!("meiUri:{}", xml_id),
            _ => format!("<{}>", self.embodiment_iri(xml_id)),
        }
    }
}

/// Time offset literal for an onset in seconds (`P{onset}S`).
pub fn instant_offset(onset: f64) -> String {
    format!("P{}S", decimal(onset))
}

/// Renders observations as a Turtle timeline document.
pub fn timeline_turtle(
    observations: &[MapsObservation],
    config: &TimelineConfig,
) -> ExportResult<String> {
    config.validate()?;

    let tl = config.timeline_uri.as_str();
    let tl_prefix = format!("{}#", tl);
    let mei_prefix = format!("{}#", config.mei_uri);

    let mut out = String::new();
    let mut prefixes = vec![
        ("mo", MO),
        ("so", SO),
        ("frbr", FRBR),
        ("rdf", RDF),
        ("rdfs", RDFS),
        ("oa", OA),
        ("meld", MELD),
        ("maps", MAPS),
        ("tl", TL),
        ("tlUri", tl_prefix.as_str()),
        ("meiUri", mei_prefix.as_str()),
    ];
    if config.include_performance.is_some() {
        prefixes.push(("dcterms", DCTERMS));
    }
    write_prefixes(&mut out, &prefixes);
    out.push_str(&format!("@base <{}> .\n\n", tl));
    out.push_str(&format!("<{}> a tl:Timeline .\n\n", tl));

    let mut annotation = 0usize;
    for (ix, obs) in observations.iter().enumerate() {
        out.push_str(&format!(
            "tlUri:{} a tl:Instant ;\n    tl:onTimeLine <{}> ;\n    maps:confidence {} ;\n    maps:velocity {} ;\n    tl:at {} ;\n",
            ix,
            tl,
            literal(&obs.confidence.to_string()),
            literal(&mean(obs.mean_velocity())),
            literal(&instant_offset(obs.obs_mean_onset)),
        ));

        let ids = obs.xml_id().as_slice();
        let links: Vec<String> = ids
            .iter()
            .map(|id| format!("    frbr:embodimentOf {}", config.embodiment_term(id)))
            .collect();
        out.push_str(&links.join(" ;\n"));
        out.push_str(" .\n");

        for (xml_id, velocity) in obs.members() {
            out.push_str(&format!(
                "<#v{n}> a oa:Annotation ;\n    oa:motivatedBy oa:describing ;\n    oa:hasTarget <#t{n}> ;\n    oa:bodyValue {vel} .\n<#t{n}> oa:hasScope <{tl}> ;\n    oa:hasSource {src} .\n",
                n = annotation,
                vel = literal(&velocity.to_string()),
                tl = tl,
                src = config.embodiment_term(xml_id),
            ));
            annotation += 1;
        }
    }

    if let Some(ref performance) = config.include_performance {
        out.push('\n');
        write_performance_triples(&mut out, performance, tl);
    }

    tracing::debug!(
        timeline = tl,
        instants = observations.len(),
        annotations = annotation,
        "rendered timeline turtle"
    );
    Ok(out)
}
