//! Graph document parsing and normalization.
//!
//! Two document shapes are consumed: a flat id-to-node map (the execution
//! form) and a richer editor form with a `nodes` list plus a `links` table.
//! Everything downstream works on the flat form, so the editor form is
//! normalized first: each node entry becomes a map entry keyed by its own id,
//! and its `inputs` list is rewritten into a name-to-link map via the links
//! table.

use serde_json::{Map, Value, json};
use tracing::debug;

use crate::TRACING_TARGET;

/// Parses JSON, tolerating bare `NaN`/`Infinity` tokens.
///
/// Some producers emit non-finite literals (e.g. `"is_changed": NaN`) which
/// strict JSON rejects. The fallback rewrites those tokens to `null` outside
/// of strings and parses again.
pub fn parse_relaxed(text: &str) -> Option<Value> {
    serde_json::from_str(text)
        .or_else(|_| serde_json::from_str(&sanitize_nonfinite(text)))
        .ok()
}

/// Replaces bare `NaN`/`Infinity`/`-Infinity` tokens with `null`.
///
/// Tokens inside JSON strings are left untouched.
pub fn sanitize_nonfinite(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    let mut in_string = false;
    let mut escape = false;

    while let Some(ch) = text[i..].chars().next() {
        if in_string {
            out.push(ch);
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
            }
            i += ch.len_utf8();
            continue;
        }
        if ch == '"' {
            in_string = true;
            out.push('"');
            i += 1;
            continue;
        }
        let skipped = ["-Infinity", "Infinity", "NaN"]
            .iter()
            .find(|token| text[i..].starts_with(**token))
            .map(|token| token.len());
        match skipped {
            Some(len) => {
                out.push_str("null");
                i += len;
            }
            None => {
                out.push(ch);
                i += ch.len_utf8();
            }
        }
    }
    out
}

/// Accepts a JSON object or a JSON-encoded string of one.
pub fn ensure_object(value: &Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map.clone()),
        Value::String(text) => match parse_relaxed(text)? {
            Value::Object(map) => Some(map),
            _ => None,
        },
        _ => None,
    }
}

/// Normalizes any supported document shape into a flat id-to-node map.
///
/// Editor-form documents (`nodes` list) are converted node by node; a node's
/// type is taken from `class_type`, falling back to `type` then `title`.
/// Already-flat documents pass through with non-object entries dropped.
/// Returns `None` when nothing node-like remains.
pub fn normalize_to_prompt_graph(document: &Value) -> Option<Map<String, Value>> {
    let root = document.as_object()?;

    if let Some(nodes) = root.get("nodes").and_then(Value::as_array) {
        let links = link_table(root.get("links"));
        let mut graph = Map::new();

        for entry in nodes {
            let Some(node) = entry.as_object() else {
                continue;
            };
            let Some(id) = node.get("id") else {
                continue;
            };
            let class_type = node
                .get("class_type")
                .or_else(|| node.get("type"))
                .or_else(|| node.get("title"))
                .cloned()
                .unwrap_or(Value::Null);

            graph.insert(
                id_string(id),
                json!({
                    "class_type": class_type,
                    "inputs": normalize_inputs(node.get("inputs"), &links),
                    "_meta": node.get("_meta").cloned().unwrap_or_else(|| json!({})),
                    "title": node.get("title").cloned().unwrap_or(Value::Null),
                    "widgets_values": node.get("widgets_values").cloned().unwrap_or(Value::Null),
                }),
            );
        }

        if graph.is_empty() {
            debug!(target: TRACING_TARGET, "editor document contained no usable nodes");
            return None;
        }
        return Some(graph);
    }

    let graph: Map<String, Value> = root
        .iter()
        .filter(|(_, node)| node.is_object())
        .map(|(id, node)| (id.clone(), node.clone()))
        .collect();
    if graph.is_empty() { None } else { Some(graph) }
}

/// Builds `link_id -> (source_id, source_slot)` from the editor links table.
///
/// Each entry is `[link_id, source_id, source_slot, target_id, target_slot,
/// type]`; short or malformed entries are skipped.
fn link_table(links: Option<&Value>) -> Map<String, Value> {
    let mut table = Map::new();
    let Some(entries) = links.and_then(Value::as_array) else {
        return table;
    };
    for entry in entries {
        let Some(fields) = entry.as_array() else {
            continue;
        };
        if fields.len() < 3 {
            continue;
        }
        table.insert(
            id_string(&fields[0]),
            json!([id_string(&fields[1]), fields[2].clone()]),
        );
    }
    table
}

/// Rewrites an editor-form `inputs` list into a name-to-value map.
///
/// Entries carrying a `link` id become `[source_id, slot]` pairs; entries
/// with no resolvable link are dropped. An already-map-shaped `inputs` is
/// kept as is.
fn normalize_inputs(inputs: Option<&Value>, links: &Map<String, Value>) -> Value {
    match inputs {
        Some(Value::Object(map)) => Value::Object(map.clone()),
        Some(Value::Array(entries)) => {
            let mut map = Map::new();
            for entry in entries {
                let Some(input) = entry.as_object() else {
                    continue;
                };
                let Some(name) = input.get("name").and_then(Value::as_str) else {
                    continue;
                };
                if let Some(link_id) = input.get("link").filter(|v| !v.is_null())
                    && let Some(target) = links.get(&id_string(link_id))
                {
                    map.insert(name.to_string(), target.clone());
                }
            }
            Value::Object(map)
        }
        _ => json!({}),
    }
}

/// Renders a node/link id in its canonical string form.
pub fn id_string(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
