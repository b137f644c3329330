//! JSON-LD rendering of performance timelines.

use serde_json::{json, Map, Value};

use scorealign_core::MapsObservation;

use crate::error::ExportResult;
use crate::performance::PerformanceDescription;
use crate::timeline::{instant_offset, TimelineConfig};
use crate::turtle::{mean, DCTERMS, FRBR, MAPS, MO, OA, TL};

/// The compaction context shared by timeline documents.
pub fn timeline_context(config: &TimelineConfig) -> Value {
    let mut context = Map::new();
    for (term, iri) in [
        ("mo", MO),
        ("dcterms", DCTERMS),
        ("ldp", "http://www.w3.org/ns/ldp#"),
        ("stat", "http://www.w3.org/ns/posix/stat#"),
        ("mime", "http://www.w3.org/ns/iana/media-types/"),
        ("schema", "https://schema.org/about/"),
        ("oa", OA),
        ("maps", MAPS),
        ("frbr", FRBR),
        ("tl", TL),
        ("rdfs", "http://www.w3.org/2000/01/rdf-schema#"),
        ("meld", "https://meld.linkedmusic.org/terms/"),
    ] {
        context.insert(term.to_string(), Value::String(iri.to_string()));
    }
    context.insert(
        "meiUri".to_string(),
        Value::String(format!("{}#", config.mei_uri)),
    );
    context.insert(
        "tlUriFrag".to_string(),
        Value::String(format!("{}#", config.timeline_uri)),
    );
    context.insert(
        "tlUri".to_string(),
        Value::String(config.timeline_uri.clone()),
    );
    Value::Object(context)
}

fn id(iri: impl Into<String>) -> Value {
    json!({ "@id": iri.into() })
}

fn performance_nodes(performance: &PerformanceDescription, timeline_uri: &str) -> Vec<Value> {
    vec![
        json!({
            "@id": performance.performance_uri,
            "@type": "mo:Performance",
            "mo:performance_of": id(&performance.score_uri),
            "mo:recorded_as": id(performance.signal_uri()),
            "rdfs:label": performance.label(),
            "dcterms:created": performance.created_iso(),
            "meld:offset": crate::performance::DEFAULT_PLAYBACK_OFFSET,
        }),
        json!({
            "@id": performance.signal_uri(),
            "mo:available_as": id(&performance.audio_uri),
            "mo:time": {
                "@type": "tl:Interval",
                "tl:onTimeLine": id(timeline_uri),
            },
        }),
    ]
}

/// Builds a JSON-LD document (`@context` + `@graph`) carrying the same
/// statements as [`crate::timeline_turtle`].
pub fn timeline_jsonld(
    observations: &[MapsObservation],
    config: &TimelineConfig,
) -> ExportResult<Value> {
    config.validate()?;

    let tl = config.timeline_uri.as_str();
    let mut graph = vec![json!({ "@id": tl, "@type": "tl:Timeline" })];

    let mut annotation = 0usize;
    for (ix, obs) in observations.iter().enumerate() {
        let embodiments: Vec<Value> = obs
            .xml_id()
            .as_slice()
            .iter()
            .map(|xml_id| id(config.embodiment_iri(xml_id)))
            .collect();
        graph.push(json!({
            "@id": format!("{}#{}", tl, ix),
            "@type": "tl:Instant",
            "tl:onTimeLine": id(tl),
            "maps:confidence": obs.confidence.to_string(),
            "maps:velocity": mean(obs.mean_velocity()),
            "tl:at": instant_offset(obs.obs_mean_onset),
            "frbr:embodimentOf": embodiments,
        }));

        for (xml_id, velocity) in obs.members() {
            let target = format!("{}#t{}", tl, annotation);
            graph.push(json!({
                "@id": format!("{}#v{}", tl, annotation),
                "@type": "oa:Annotation",
                "oa:motivatedBy": id("oa:describing"),
                "oa:hasTarget": id(&target),
                "oa:bodyValue": velocity.to_string(),
            }));
            graph.push(json!({
                "@id": target,
                "oa:hasScope": id(tl),
                "oa:hasSource": id(config.embodiment_iri(xml_id)),
            }));
            annotation += 1;
        }
    }

    if let Some(ref performance) = config.include_performance {
        graph.extend(performance_nodes(performance, tl));
    }

    Ok(json!({
        "@context": timeline_context(config),
        "@graph": graph,
    }))
}

/// [`timeline_jsonld`] serialized with two-space indentation.
pub fn timeline_jsonld_string(
    observations: &[MapsObservation],
    config: &TimelineConfig,
) -> ExportResult<String> {
    let document = timeline_jsonld(observations, config)?;
    Ok(serde_json::to_string_pretty(&document)?)
}
