//! File-level provenance recovery.
//!
//! Ties the crates together: pull textual payloads out of a PNG, find the
//! graph document among them, then extract parameters and fingerprint it.
//! When no graph is present, a plain-text parameter block is the last
//! resort. All entry points degrade to `None` instead of failing.

use std::path::Path;

use prov_png::{LegacyParams, parse_legacy_params, read_text_fields};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::TRACING_TARGET;
use crate::document::parse_relaxed;
use crate::extract::{ExtractionResult, extract};
use crate::fingerprint::Fingerprint;
use crate::graph::Graph;
use crate::roles::RoleRegistry;

/// Field keys that may carry a graph document or parameter block.
const CANDIDATE_KEYS: &[&str] = &[
    "prompt",
    "workflow",
    "parameters",
    "comment",
    "description",
    "usercomment",
];

/// Everything recoverable about how an asset was generated.
#[derive(Debug, Clone, Serialize)]
pub struct Provenance {
    pub fingerprint: Fingerprint,
    pub params: ExtractionResult,
    /// Plain-text parameter block result, only set when no graph was found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legacy: Option<LegacyParams>,
}

impl Provenance {
    /// Returns whether anything generation-related was recovered.
    pub fn has_generation_data(&self) -> bool {
        self.params.has_generation_data
            || self.legacy.as_ref().is_some_and(|params| !params.is_empty())
    }
}

/// Derives provenance from an in-memory graph document.
pub fn provenance_of_document(document: &Value, registry: &RoleRegistry) -> Provenance {
    let graph = Graph::from_document(document);
    Provenance {
        fingerprint: Fingerprint::of(document),
        params: extract(&graph, registry),
        legacy: None,
    }
}

/// Derives provenance from raw PNG bytes.
///
/// Scans the textual chunks for a graph document, preferring the execution
/// form under `prompt` over the editor form under `workflow`; falls back to
/// a plain-text parameter block. Returns `None` when nothing was found.
pub fn provenance_from_png_bytes(bytes: &[u8], registry: &RoleRegistry) -> Option<Provenance> {
    let fields = read_text_fields(bytes);

    // Explicit keys first, in priority order.
    for key in CANDIDATE_KEYS {
        let Some(text) = lookup(&fields, key) else {
            continue;
        };
        if let Some(document) = parse_relaxed(text).filter(is_graph_document) {
            debug!(target: TRACING_TARGET, key, "graph document found in chunk");
            return Some(provenance_of_document(&document, registry));
        }
    }

    // Last resort: a plain-text parameter block under any candidate key.
    for key in CANDIDATE_KEYS {
        let Some(text) = lookup(&fields, key) else {
            continue;
        };
        let legacy = parse_legacy_params(text);
        if !legacy.is_empty() {
            debug!(target: TRACING_TARGET, key, "legacy parameter block found in chunk");
            return Some(Provenance {
                fingerprint: Fingerprint::of(&Value::Null),
                params: ExtractionResult::default(),
                legacy: Some(legacy),
            });
        }
    }

    None
}

/// Derives provenance from a file on disk.
///
/// Read failures are logged and yield `None`; a failed recovery shows up as
/// an asset without generation metadata, never as an error.
pub fn provenance_from_file(path: &Path, registry: &RoleRegistry) -> Option<Provenance> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(
                target: TRACING_TARGET,
                path = %path.display(),
                %err,
                "cannot read file for provenance recovery"
            );
            return None;
        }
    };
    provenance_from_png_bytes(&bytes, registry)
}

fn lookup<'a>(fields: &'a indexmap::IndexMap<String, String>, key: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(key))
        .map(|(_, value)| value.as_str())
}

/// Returns whether a parsed payload looks like a graph document.
///
/// Either the editor form (a `nodes` list) or the execution form (a map
/// whose entries carry `class_type`/`inputs`).
fn is_graph_document(value: &Value) -> bool {
    let Some(map) = value.as_object() else {
        return false;
    };
    if map.get("nodes").is_some_and(Value::is_array) {
        return true;
    }
    map.values().any(|entry| {
        entry
            .as_object()
            .is_some_and(|node| node.contains_key("class_type") || node.contains_key("inputs"))
    })
}

/// Similarity verdict between two graph documents.
#[derive(Debug, Clone, Serialize)]
pub struct Comparison {
    pub identical_hash: bool,
    pub hash_a: String,
    pub hash_b: String,
    pub same_model: bool,
    pub same_prompts: bool,
    pub same_sampler: bool,
    /// 0.0 to 1.0; 1.0 iff the hashes match.
    pub similarity_score: f64,
}

/// Compares two graph documents by fingerprint and extracted components.
pub fn compare(a: &Value, b: &Value, registry: &RoleRegistry) -> Comparison {
    let prov_a = provenance_of_document(a, registry);
    let prov_b = provenance_of_document(b, registry);

    let identical_hash =
        prov_a.fingerprint.is_present() && prov_a.fingerprint.hash == prov_b.fingerprint.hash;
    let same_model =
        prov_a.params.model.is_some() && prov_a.params.model == prov_b.params.model;
    let same_prompts = prov_a.params.positive_prompt.is_some()
        && prov_a.params.positive_prompt == prov_b.params.positive_prompt;
    let same_sampler = prov_a.params.sampler_name.is_some()
        && prov_a.params.sampler_name == prov_b.params.sampler_name;

    let similarity_score = if identical_hash {
        1.0
    } else {
        let components = [
            (
                prov_a.params.model.is_some() && prov_b.params.model.is_some(),
                same_model,
            ),
            (
                prov_a.params.positive_prompt.is_some() && prov_b.params.positive_prompt.is_some(),
                same_prompts,
            ),
            (
                prov_a.params.sampler_name.is_some() && prov_b.params.sampler_name.is_some(),
                same_sampler,
            ),
        ];
        let comparable = components.iter().filter(|(present, _)| *present).count();
        let matching = components.iter().filter(|(present, same)| *present && *same).count();
        if comparable == 0 {
            0.0
        } else {
            matching as f64 / comparable as f64
        }
    };

    Comparison {
        identical_hash,
        hash_a: prov_a.fingerprint.hash,
        hash_b: prov_b.fingerprint.hash,
        same_model,
        same_prompts,
        same_sampler,
        similarity_score,
    }
}
