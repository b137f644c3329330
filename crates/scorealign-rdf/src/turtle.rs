//! Small helpers for writing Turtle text.

use crate::error::{ExportError, ExportResult};

pub const MO: &str = "http://purl.org/ontology/mo/";
pub const SO: &str = "http://www.linkedmusic.org/ontologies/segment/";
pub const FRBR: &str = "http://purl.org/vocab/frbr/core#";
pub const RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
pub const RDFS: &str = "http://www.w3.org/2000/01/rdf-schema#";
pub const OA: &str = "http://www.w3.org/ns/oa#";
pub const MELD: &str = "https://meld.linkedmusic.org/terms/";
pub const MAPS: &str = "https://terms.trompamusic.eu/maps#";
pub const TL: &str = "http://purl.org/NET/c4dm/timeline.owl#";
pub const DCTERMS: &str = "http://purl.org/dc/terms/";
pub const SKOS: &str = "http://www.w3.org/2004/02/skos/core#";

/// Appends `@prefix name: <iri> .` for each pair.
pub fn write_prefixes(out: &mut String, prefixes: &[(&str, &str)]) {
    for (name, iri) in prefixes {
        out.push_str(&format!("@prefix {}: <{}> .\n", name, iri));
    }
}

/// Rejects URIs that cannot appear inside `<...>`.
pub fn check_uri(role: &'static str, uri: &str) -> ExportResult<()> {
    let reason = if uri.is_empty() {
        Some("is empty")
    } else if uri.chars().any(char::is_whitespace) {
        Some("contains whitespace")
    } else if uri
        .chars()
        .any(|c| matches!(c, '<' | '>' | '"' | '{' | '}' | '|' | '^' | '`' | '\\'))
    {
        Some("contains a character not allowed in an IRI")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(ExportError::InvalidUri {
            role,
            uri: uri.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

/// Quotes `value` as a Turtle string literal.
pub fn literal(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '"' => quoted.push_str("\\\""),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

/// Formats a float the way a decimal literal is written in timeline data:
/// whole numbers keep one fractional digit (`3.0`), others use the shortest
/// round-trip form.
pub fn decimal(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

/// Formats a mean velocity: integral means print without a fraction.
pub fn mean(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Returns true if `local` can follow `prefix:` without escaping.
pub fn is_plain_local_name(local: &str) -> bool {
    !local.is_empty()
        && !local.ends_with('.')
        && !local.starts_with(['-', '.'])
        && local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}
