//! Generation parameter extraction.
//!
//! Extraction anchors on a sampler node, then walks outward: prompts come
//! from the conditioning inputs, the model and LoRA stack from the model
//! chain, scalar settings straight from the sampler's inputs. Every field
//! is optional; a partial graph yields a partial result, never an error.

use std::collections::{HashSet, VecDeque};

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::TRACING_TARGET;
use crate::graph::{Graph, InputValue, MAX_TRAVERSAL_DEPTH, Node};
use crate::resolve::resolve;
use crate::roles::{Role, RoleRegistry};

/// Input fields that may hold prompt text on a text-encoder-like node.
const TEXT_FIELDS: &[&str] = &[
    "text", "text_g", "text_l", "prompt", "string", "value", "content", "input_text",
    "prompt_text", "clip_l", "clip_g", "t5xxl",
];

/// Type-name fragments marking a node as text-bearing during tracing.
const TEXT_CLASS_HINTS: &[&str] = &[
    "cliptextencode",
    "clip_text_encode",
    "textencode",
    "textencoder",
    "promptbuilder",
    "stringliteral",
    "t5textencode",
    "sd3textencoder",
    "dualcliptextencodeflux",
];

/// Extra type-name fragments accepted by the whole-graph text sweep, where
/// recall matters more than precision.
const SWEEP_CLASS_HINTS: &[&str] = &[
    "prompt",
    "fluxguidance",
    "conditioningcombine",
    "conditioningconcat",
    "conditioningaverage",
    "conditioningsetarea",
    "conditioningsetmask",
    "clipsetlastlayer",
    "ellatextencode",
    "textconcat",
    "text_multiline",
    "dynamicprompt",
    "wildcardprocessor",
    "promptcomposer",
    "customtext",
    "text_node",
    "llama",
    "qwen",
    "gpt",
];

/// Fields inspected by the whole-graph sweep, a superset of [`TEXT_FIELDS`].
const SWEEP_TEXT_FIELDS: &[&str] = &[
    "text", "text_g", "text_l", "prompt", "positive", "negative", "string", "value",
    "content", "input_text", "prompt_text", "caption", "description", "instruction",
    "clip_l", "clip_g", "t5xxl",
];

/// Title fragments marking a node as holding the negative prompt.
const NEGATIVE_TITLE_HINTS: &[&str] = &["negative", "neg", "bad", "unwanted"];

/// Prompt content fragments typical of negative prompts. Two or more hits
/// classify an untitled text node as negative.
const NEGATIVE_CONTENT_HINTS: &[&str] = &[
    "low quality",
    "worst quality",
    "bad anatomy",
    "bad hands",
    "blurry",
    "watermark",
    "jpeg artifacts",
    "deformed",
];

/// Sampler-typical input fields used by the heuristic fallback.
const SAMPLER_HINT_FIELDS: &[&str] = &["seed", "steps", "cfg", "sampler_name", "scheduler"];

/// One LoRA application on the model chain, in chain order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoraRecord {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strength_model: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strength_clip: Option<Value>,
}

/// Parameters recovered from a graph.
///
/// Scalar settings are passed through as raw JSON values; the consumer
/// decides typing.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractionResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub positive_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cfg: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampler_name: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduler: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denoise: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_at_step: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_at_step: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub add_noise: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_with_leftover_noise: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vae: Option<String>,
    pub loras: Vec<LoraRecord>,
    pub node_count: usize,
    pub has_generation_data: bool,
}

/// Extracts generation parameters from a graph.
pub fn extract(graph: &Graph, registry: &RoleRegistry) -> ExtractionResult {
    let mut result = ExtractionResult {
        node_count: graph.node_count(),
        has_generation_data: !graph.is_empty(),
        ..Default::default()
    };
    if graph.is_empty() {
        return result;
    }

    let Some(sampler_id) = pick_sampler(graph, registry) else {
        debug!(target: TRACING_TARGET, "no sampler node, sweeping all text nodes");
        let (positive, negative) = sweep_all_texts(graph);
        result.positive_prompt = join_texts(positive);
        result.negative_prompt = join_texts(negative);
        return result;
    };
    let Some(sampler) = graph.node(&sampler_id) else {
        return result;
    };

    result.seed = sampler.first_value(&["seed", "noise_seed"]);
    result.cfg = sampler.first_value(&["cfg", "cfg_scale", "guidance", "guidance_scale"]);
    result.steps = sampler.first_value(&["steps"]);
    result.sampler_name = sampler.first_value(&["sampler_name", "sampler"]);
    result.scheduler = sampler.first_value(&["scheduler"]);
    result.denoise = sampler.first_value(&["denoise"]);
    result.start_at_step = sampler.first_value(&["start_at_step"]);
    result.end_at_step = sampler.first_value(&["end_at_step"]);
    result.add_noise = sampler.first_value(&["add_noise"]);
    result.return_with_leftover_noise = sampler.first_value(&["return_with_leftover_noise"]);

    result.positive_prompt = prompt_from_input(graph, registry, sampler.inputs.get("positive"));
    result.negative_prompt = prompt_from_input(graph, registry, sampler.inputs.get("negative"));

    if result.positive_prompt.is_none() || result.negative_prompt.is_none() {
        let (positive, negative) = sweep_all_texts(graph);
        if result.positive_prompt.is_none() {
            result.positive_prompt = join_texts(positive);
        }
        if result.negative_prompt.is_none() {
            result.negative_prompt = join_texts(negative);
        }
    }

    let model_start = sampler
        .first_input(&["model", "guider"])
        .and_then(InputValue::link_target)
        .map(|id| resolve(graph, registry, &id, MAX_TRAVERSAL_DEPTH))
        .or_else(|| fallback_loader(graph, registry));
    let (model, vae, loras) = walk_model_chain(graph, registry, model_start);
    result.model = model;
    result.vae = vae;
    result.loras = loras;

    result
}

/// Selects the sampler node to anchor extraction on.
///
/// Exact role matches win over a `sampler` substring match, which wins over
/// the scored input heuristic. Within a tier, numeric ids beat non-numeric
/// ones and the largest numeric id wins.
pub fn pick_sampler(graph: &Graph, registry: &RoleRegistry) -> Option<String> {
    let exact = graph.nodes_with_role(registry, Role::Sampler);
    if let Some(best) = best_by_id(exact.into_iter()) {
        return Some(best);
    }

    let loose: Vec<String> = graph
        .nodes()
        .filter(|node| node.type_name().contains("sampler"))
        .map(|node| node.id.clone())
        .collect();
    if let Some(best) = best_by_id(loose.into_iter()) {
        return Some(best);
    }

    let scored: Vec<(String, u32)> = graph
        .nodes()
        .map(|node| (node.id.clone(), sampler_score(node)))
        .filter(|(_, score)| *score >= 2)
        .collect();
    let top = scored.iter().map(|(_, score)| *score).max()?;
    best_by_id(
        scored
            .into_iter()
            .filter(|(_, score)| *score == top)
            .map(|(id, _)| id),
    )
}

/// Scores how sampler-like a node's inputs look.
///
/// Exact field match counts 2, a substring match on any input name counts 1;
/// a total of 2 or more makes the node a candidate.
fn sampler_score(node: &Node) -> u32 {
    let mut score = 0;
    for field in SAMPLER_HINT_FIELDS {
        if node.inputs.contains_key(*field) {
            score += 2;
        } else if node.inputs.keys().any(|key| key.to_lowercase().contains(field)) {
            score += 1;
        }
    }
    score
}

/// Picks the best candidate id: numeric over non-numeric, then largest
/// numeric value, keeping the first non-numeric id otherwise.
fn best_by_id(candidates: impl Iterator<Item = String>) -> Option<String> {
    let mut best: Option<(bool, i64, String)> = None;
    for id in candidates {
        let rank = match id.parse::<i64>() {
            Ok(value) => (true, value),
            Err(_) => (false, i64::MIN),
        };
        let replace = match &best {
            None => true,
            Some((numeric, value, _)) => rank > (*numeric, *value),
        };
        if replace {
            best = Some((rank.0, rank.1, id));
        }
    }
    best.map(|(_, _, id)| id)
}

/// Recovers a prompt string behind one of the sampler's conditioning inputs.
fn prompt_from_input(
    graph: &Graph,
    registry: &RoleRegistry,
    input: Option<&InputValue>,
) -> Option<String> {
    let input = input?;
    if let Some(text) = input.as_str() {
        // Inlined prompt, no tracing needed.
        let text = text.trim();
        return (!text.is_empty()).then(|| text.to_string());
    }
    let start = input.link_target()?;
    join_texts(collect_conditioning_texts(graph, registry, &start))
}

/// Breadth-first text collection from a conditioning input.
///
/// Each visited node is resolved through indirection first; text-encoder
/// nodes contribute their text fields, and traversal continues through all
/// `conditioning*`-prefixed inputs (combiners, controlnet applications) as
/// well as the common passthrough fields. Texts are deduplicated in
/// first-seen order.
fn collect_conditioning_texts(graph: &Graph, registry: &RoleRegistry, start: &str) -> Vec<String> {
    let mut texts = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<(String, usize)> = VecDeque::from([(start.to_string(), 0)]);

    while let Some((id, depth)) = queue.pop_front() {
        if depth > MAX_TRAVERSAL_DEPTH {
            continue;
        }
        let id = resolve(graph, registry, &id, MAX_TRAVERSAL_DEPTH);
        if !visited.insert(id.clone()) {
            continue;
        }
        let Some(node) = graph.node(&id) else {
            continue;
        };

        if is_text_node(node, registry) {
            for field in TEXT_FIELDS {
                if let Some(text) = node.inputs.get(*field).and_then(InputValue::as_str) {
                    let text = text.trim();
                    if !text.is_empty() && seen.insert(text.to_string()) {
                        texts.push(text.to_string());
                    }
                }
            }
        }

        for (name, input) in &node.inputs {
            if !is_trace_field(name) {
                continue;
            }
            if let Some(next) = input.link_target() {
                queue.push_back((next, depth + 1));
            }
        }
    }
    texts
}

fn is_text_node(node: &Node, registry: &RoleRegistry) -> bool {
    let class = node.type_name();
    registry.matches(Role::TextEncoder, &class)
        || TEXT_CLASS_HINTS.iter().any(|hint| class.contains(hint))
}

fn is_trace_field(name: &str) -> bool {
    name.starts_with("conditioning")
        || matches!(name, "text" | "clip" | "positive" | "negative")
}

/// Whole-graph text sweep for graphs without a usable sampler.
///
/// Classifies each text-bearing node as positive or negative using title
/// hints, input field names, and as a last resort the prompt content itself.
fn sweep_all_texts(graph: &Graph) -> (Vec<String>, Vec<String>) {
    let mut positive = Vec::new();
    let mut negative = Vec::new();
    let mut seen_pos: HashSet<String> = HashSet::new();
    let mut seen_neg: HashSet<String> = HashSet::new();

    for node in graph.nodes() {
        let class = node.type_name();
        let title = node.title_lower();

        let class_hit = TEXT_CLASS_HINTS.iter().chain(SWEEP_CLASS_HINTS).any(|hint| class.contains(hint));
        let field_hit = SWEEP_TEXT_FIELDS.iter().any(|field| {
            node.inputs
                .get(*field)
                .and_then(InputValue::as_str)
                .is_some_and(|text| !text.trim().is_empty())
        });
        if !class_hit && !field_hit {
            continue;
        }

        let node_negative = NEGATIVE_TITLE_HINTS.iter().any(|hint| title.contains(hint))
            || class.contains("negative");

        for field in SWEEP_TEXT_FIELDS {
            let Some(text) = node.inputs.get(*field).and_then(InputValue::as_str) else {
                continue;
            };
            let text = text.trim();
            if text.is_empty() {
                continue;
            }
            let is_negative = node_negative
                || field.contains("negative")
                || looks_negative(text);
            if is_negative {
                if seen_neg.insert(text.to_string()) {
                    negative.push(text.to_string());
                }
            } else if seen_pos.insert(text.to_string()) {
                positive.push(text.to_string());
            }
        }
    }
    (positive, negative)
}

/// Content-based negative classification: two or more stock
/// quality-degrading phrases.
fn looks_negative(text: &str) -> bool {
    let lower = text.to_lowercase();
    NEGATIVE_CONTENT_HINTS
        .iter()
        .filter(|hint| lower.contains(**hint))
        .count()
        >= 2
}

fn join_texts(texts: Vec<String>) -> Option<String> {
    if texts.is_empty() { None } else { Some(texts.join(" | ")) }
}

/// Picks a model loader when the sampler exposes no model link.
///
/// Some video pipelines drive the sampler indirectly; fall back to the
/// checkpoint/unet loader with the largest numeric id.
fn fallback_loader(graph: &Graph, registry: &RoleRegistry) -> Option<String> {
    let mut loaders = graph.nodes_with_role(registry, Role::CheckpointLoader);
    loaders.extend(graph.nodes_with_role(registry, Role::UnetLoader));
    loaders
        .into_iter()
        .max_by_key(|id| (id.parse::<i64>().unwrap_or(-1), id.clone()))
}

/// Walks the model chain from a starting node.
///
/// LoRA loaders are recorded in order and walked through via their `model`
/// input; checkpoint/unet/diffusers loaders terminate the walk and name the
/// model (and VAE for checkpoints). Every hop is resolved through
/// indirection, and a visited set guards against cycles.
fn walk_model_chain(
    graph: &Graph,
    registry: &RoleRegistry,
    start: Option<String>,
) -> (Option<String>, Option<String>, Vec<LoraRecord>) {
    let mut model = None;
    let mut vae = None;
    let mut loras = Vec::new();
    let mut visited: HashSet<String> = HashSet::new();

    let mut current = start;
    while let Some(id) = current.take() {
        if !visited.insert(id.clone()) {
            break;
        }
        let Some(node) = graph.node(&id) else {
            break;
        };
        let class = node.type_name();

        if registry.matches(Role::CheckpointLoader, &class) {
            model = node
                .first_input(&["ckpt_name", "ckpt_file"])
                .and_then(InputValue::as_str)
                .map(str::to_string);
            vae = node
                .inputs
                .get("vae_name")
                .and_then(InputValue::as_str)
                .map(str::to_string);
            break;
        }
        if registry.matches(Role::UnetLoader, &class) {
            model = node
                .first_input(&["unet_name", "model_name"])
                .and_then(InputValue::as_str)
                .map(str::to_string);
            break;
        }
        if registry.matches(Role::DiffusersLoader, &class) {
            model = node
                .first_input(&["model_path", "model_name"])
                .and_then(InputValue::as_str)
                .map(str::to_string);
            break;
        }

        if registry.matches(Role::LoraLoader, &class)
            && let Some(name) = node.inputs.get("lora_name").and_then(InputValue::as_str)
        {
            loras.push(LoraRecord {
                name: name.to_string(),
                strength_model: node.inputs.get("strength_model").map(InputValue::to_value),
                strength_clip: node.inputs.get("strength_clip").map(InputValue::to_value),
            });
        }

        current = node
            .inputs
            .get("model")
            .and_then(InputValue::link_target)
            .map(|next| resolve(graph, registry, &next, MAX_TRAVERSAL_DEPTH));
    }

    (model, vae, loras)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn extract_doc(doc: serde_json::Value) -> ExtractionResult {
        extract(&Graph::from_document(&doc), &RoleRegistry::new())
    }

    fn five_node_graph() -> serde_json::Value {
        json!({
            "1": {
                "class_type": "CheckpointLoaderSimple",
                "inputs": {"ckpt_name": "sd_xl_base_1.0.safetensors"},
            },
            "2": {
                "class_type": "CLIPTextEncode",
                "inputs": {"text": "portrait of a woman, photorealistic", "clip": ["1", 1]},
                "_meta": {"title": "Positive"},
            },
            "3": {
                "class_type": "CLIPTextEncode",
                "inputs": {"text": "low quality, blurry", "clip": ["1", 1]},
                "_meta": {"title": "Negative"},
            },
            "4": {
                "class_type": "KSampler",
                "inputs": {
                    "seed": 123456,
                    "steps": 20,
                    "cfg": 7.5,
                    "sampler_name": "euler_ancestral",
                    "scheduler": "normal",
                    "positive": ["2", 0],
                    "negative": ["3", 0],
                    "model": ["1", 0],
                },
            },
            "5": {"class_type": "SaveImage", "inputs": {"images": ["4", 0]}},
        })
    }

    #[test]
    fn test_end_to_end_five_node_graph() {
        let result = extract_doc(five_node_graph());
        assert_eq!(result.model.as_deref(), Some("sd_xl_base_1.0.safetensors"));
        assert!(
            result.positive_prompt.as_deref().unwrap().contains("portrait of a woman")
        );
        assert_eq!(result.negative_prompt.as_deref(), Some("low quality, blurry"));
        assert_eq!(result.seed, Some(json!(123456)));
        assert_eq!(result.steps, Some(json!(20)));
        assert_eq!(result.cfg, Some(json!(7.5)));
        assert_eq!(result.sampler_name, Some(json!("euler_ancestral")));
        assert_eq!(result.node_count, 5);
        assert!(result.has_generation_data);
    }

    #[test]
    fn test_empty_graph() {
        let result = extract_doc(json!({}));
        assert_eq!(result.node_count, 0);
        assert!(!result.has_generation_data);
        assert!(result.positive_prompt.is_none());
    }

    #[test]
    fn test_prompt_behind_reroute_chain() {
        let result = extract_doc(json!({
            "1": {"class_type": "CLIPTextEncode", "inputs": {"text": "hidden prompt"}},
            "2": {"class_type": "Reroute", "inputs": {"value": ["1", 0]}},
            "3": {"class_type": "Reroute", "inputs": {"value": ["2", 0]}},
            "4": {"class_type": "Reroute", "inputs": {"value": ["3", 0]}},
            "5": {"class_type": "KSampler", "inputs": {"positive": ["4", 0], "seed": 1}},
        }));
        assert_eq!(result.positive_prompt.as_deref(), Some("hidden prompt"));
    }

    #[test]
    fn test_combiner_collects_all_branches() {
        let result = extract_doc(json!({
            "1": {"class_type": "CLIPTextEncode", "inputs": {"text": "first part"}},
            "2": {"class_type": "CLIPTextEncode", "inputs": {"text": "second part"}},
            "3": {
                "class_type": "ConditioningCombine",
                "inputs": {"conditioning_1": ["1", 0], "conditioning_2": ["2", 0]},
            },
            "4": {"class_type": "KSampler", "inputs": {"positive": ["3", 0], "seed": 1}},
        }));
        let prompt = result.positive_prompt.unwrap();
        assert!(prompt.contains("first part"));
        assert!(prompt.contains("second part"));
    }

    #[test]
    fn test_inline_prompt_string() {
        let result = extract_doc(json!({
            "1": {"class_type": "KSampler", "inputs": {"positive": "inline text", "seed": 1}},
        }));
        assert_eq!(result.positive_prompt.as_deref(), Some("inline text"));
    }

    #[test]
    fn test_no_sampler_classifies_by_title() {
        let result = extract_doc(json!({
            "1": {
                "class_type": "CLIPTextEncode",
                "inputs": {"text": "a sunny meadow"},
                "_meta": {"title": "Prompt"},
            },
            "2": {
                "class_type": "CLIPTextEncode",
                "inputs": {"text": "ugly, distorted"},
                "_meta": {"title": "Negative Prompt"},
            },
        }));
        assert_eq!(result.positive_prompt.as_deref(), Some("a sunny meadow"));
        assert_eq!(result.negative_prompt.as_deref(), Some("ugly, distorted"));
        assert!(result.sampler_name.is_none());
    }

    #[test]
    fn test_no_sampler_content_classification() {
        let result = extract_doc(json!({
            "1": {"class_type": "CLIPTextEncode", "inputs": {"text": "a castle at dawn"}},
            "2": {
                "class_type": "CLIPTextEncode",
                "inputs": {"text": "low quality, blurry, watermark"},
            },
        }));
        assert_eq!(result.positive_prompt.as_deref(), Some("a castle at dawn"));
        assert_eq!(
            result.negative_prompt.as_deref(),
            Some("low quality, blurry, watermark")
        );
    }

    #[test]
    fn test_lora_chain() {
        let result = extract_doc(json!({
            "1": {"class_type": "CheckpointLoaderSimple", "inputs": {"ckpt_name": "base.safetensors"}},
            "2": {
                "class_type": "LoraLoader",
                "inputs": {
                    "lora_name": "detail.safetensors",
                    "strength_model": 0.8,
                    "strength_clip": 0.7,
                    "model": ["1", 0],
                },
            },
            "3": {
                "class_type": "LoraLoader",
                "inputs": {"lora_name": "style.safetensors", "strength_model": 0.5, "model": ["2", 0]},
            },
            "4": {"class_type": "KSampler", "inputs": {"model": ["3", 0], "seed": 1}},
        }));
        assert_eq!(result.model.as_deref(), Some("base.safetensors"));
        assert_eq!(result.loras.len(), 2);
        assert_eq!(result.loras[0].name, "style.safetensors");
        assert_eq!(result.loras[1].name, "detail.safetensors");
        assert_eq!(result.loras[1].strength_clip, Some(json!(0.7)));
    }

    #[test]
    fn test_model_chain_through_reroute() {
        let result = extract_doc(json!({
            "1": {"class_type": "UNETLoader", "inputs": {"unet_name": "flux-dev.sft"}},
            "2": {"class_type": "Reroute", "inputs": {"value": ["1", 0]}},
            "3": {"class_type": "KSampler", "inputs": {"model": ["2", 0], "seed": 1}},
        }));
        assert_eq!(result.model.as_deref(), Some("flux-dev.sft"));
    }

    #[test]
    fn test_fallback_loader_without_model_link() {
        let result = extract_doc(json!({
            "3": {"class_type": "CheckpointLoaderSimple", "inputs": {"ckpt_name": "old.safetensors"}},
            "7": {"class_type": "CheckpointLoaderSimple", "inputs": {"ckpt_name": "new.safetensors"}},
            "9": {"class_type": "KSampler", "inputs": {"seed": 1, "steps": 10}},
        }));
        assert_eq!(result.model.as_deref(), Some("new.safetensors"));
    }

    #[test]
    fn test_vae_from_checkpoint() {
        let result = extract_doc(json!({
            "1": {
                "class_type": "CheckpointLoaderSimple",
                "inputs": {"ckpt_name": "m.safetensors", "vae_name": "v.vae.pt"},
            },
            "2": {"class_type": "KSampler", "inputs": {"model": ["1", 0], "seed": 1}},
        }));
        assert_eq!(result.vae.as_deref(), Some("v.vae.pt"));
    }

    #[test]
    fn test_pick_sampler_prefers_exact_role_and_largest_id() {
        let graph = Graph::from_document(&json!({
            "2": {"class_type": "KSampler", "inputs": {}},
            "10": {"class_type": "KSampler", "inputs": {}},
            "30": {"class_type": "MyFancySamplerWrapper", "inputs": {}},
        }));
        assert_eq!(
            pick_sampler(&graph, &RoleRegistry::new()),
            Some("10".to_string())
        );
    }

    #[test]
    fn test_pick_sampler_substring_tier() {
        let graph = Graph::from_document(&json!({
            "5": {"class_type": "TurboSamplerXL", "inputs": {}},
            "6": {"class_type": "CLIPTextEncode", "inputs": {"text": "x"}},
        }));
        assert_eq!(
            pick_sampler(&graph, &RoleRegistry::new()),
            Some("5".to_string())
        );
    }

    #[test]
    fn test_pick_sampler_heuristic_tier() {
        let graph = Graph::from_document(&json!({
            "5": {
                "class_type": "MysteryNode",
                "inputs": {"seed": 1, "steps": 20, "cfg_scale": 7.0},
            },
            "6": {"class_type": "OtherNode", "inputs": {"frames": 12}},
        }));
        assert_eq!(
            pick_sampler(&graph, &RoleRegistry::new()),
            Some("5".to_string())
        );
    }

    #[test]
    fn test_advanced_sampler_fields() {
        let result = extract_doc(json!({
            "1": {
                "class_type": "KSamplerAdvanced",
                "inputs": {
                    "noise_seed": 77,
                    "steps": 30,
                    "cfg": 4.0,
                    "start_at_step": 0,
                    "end_at_step": 20,
                    "add_noise": "enable",
                    "return_with_leftover_noise": "disable",
                },
            },
        }));
        assert_eq!(result.seed, Some(json!(77)));
        assert_eq!(result.start_at_step, Some(json!(0)));
        assert_eq!(result.end_at_step, Some(json!(20)));
        assert_eq!(result.add_noise, Some(json!("enable")));
        assert_eq!(result.return_with_leftover_noise, Some(json!("disable")));
    }
}
