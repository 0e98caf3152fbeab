//! Plain-text generation parameter parsing.
//!
//! Some producers write generation settings as a single free-text block:
//! positive prompt, an optional `Negative prompt:` section, then a
//! `Steps: 20, Sampler: Euler, ...` parameter line. This parser is the
//! last-resort fallback when no structured graph document is present.

use serde::Serialize;
use serde_json::Value;

/// Parameters recovered from a plain-text block.
///
/// Every field is optional; unknown keys in the source text are dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LegacyParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub positive_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampler_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduler: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cfg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    /// Output dimensions as `(width, height)`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<(u32, u32)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denoising_strength: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hires_upscale: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hires_steps: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hires_upscaler: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Model hash table, JSON when the value parses, raw string otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hashes: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lora_hashes: Option<Value>,
    /// The untrimmed source block, kept for audit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters_raw: Option<String>,
}

impl LegacyParams {
    /// Returns whether nothing beyond the raw text was recovered.
    pub fn is_empty(&self) -> bool {
        self.positive_prompt.is_none()
            && self.negative_prompt.is_none()
            && self.steps.is_none()
            && self.sampler_name.is_none()
            && self.scheduler.is_none()
            && self.cfg.is_none()
            && self.seed.is_none()
            && self.size.is_none()
            && self.model.is_none()
            && self.model_hash.is_none()
            && self.denoising_strength.is_none()
            && self.hires_upscale.is_none()
            && self.hires_steps.is_none()
            && self.hires_upscaler.is_none()
            && self.version.is_none()
            && self.hashes.is_none()
            && self.lora_hashes.is_none()
    }
}

const NEGATIVE_MARKER: &str = "negative prompt:";
const STEPS_MARKER: &str = "steps:";

/// Parses a plain-text parameter block.
///
/// Returns an empty [`LegacyParams`] (including no raw text) when nothing
/// useful could be recovered.
pub fn parse_legacy_params(text: &str) -> LegacyParams {
    let raw = text.trim();
    if raw.is_empty() {
        return LegacyParams::default();
    }

    let mut positive = raw;
    let mut negative = "";
    let mut param_section = "";

    if let Some(idx_neg) = find_marker(raw, NEGATIVE_MARKER) {
        positive = raw[..idx_neg].trim();
        let rest = raw[idx_neg + NEGATIVE_MARKER.len()..].trim();
        match find_marker(rest, STEPS_MARKER) {
            Some(idx_steps) => {
                negative = rest[..idx_steps].trim();
                param_section = &rest[idx_steps..];
            }
            None => negative = rest,
        }
    } else if let Some(idx_steps) = find_marker(raw, STEPS_MARKER) {
        positive = raw[..idx_steps].trim();
        param_section = &raw[idx_steps..];
    }

    let mut params = LegacyParams::default();
    for token in split_top_level(param_section) {
        let Some((key, value)) = token.split_once(':') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        apply_field(&mut params, &key, value);
    }

    if !positive.is_empty() {
        params.positive_prompt = Some(positive.to_string());
    }
    if !negative.is_empty() {
        params.negative_prompt = Some(negative.to_string());
    }
    if params.is_empty() {
        return LegacyParams::default();
    }
    params.parameters_raw = Some(raw.to_string());
    params
}

fn apply_field(params: &mut LegacyParams, key: &str, value: &str) {
    match key {
        "steps" => params.steps = lenient_int(value),
        "sampler" => params.sampler_name = Some(value.to_string()),
        "schedule type" | "schedulertype" | "scheduler" => {
            params.scheduler = Some(value.to_string());
        }
        "cfg scale" | "cfg" => params.cfg = lenient_float(value),
        "seed" => params.seed = lenient_int(value),
        "size" => params.size = parse_size(value),
        "model" => params.model = Some(value.to_string()),
        "model hash" => params.model_hash = Some(value.to_string()),
        "denoising strength" => params.denoising_strength = lenient_float(value),
        "hires upscale" => params.hires_upscale = lenient_float(value),
        "hires steps" => params.hires_steps = lenient_int(value),
        "hires upscaler" => params.hires_upscaler = Some(value.to_string()),
        "version" => params.version = Some(value.to_string()),
        _ if key.starts_with("hashes") => params.hashes = Some(json_or_string(value)),
        _ if key.starts_with("lora hashes") => {
            params.lora_hashes = Some(json_or_string(value));
        }
        _ => {}
    }
}

/// Finds a marker ASCII-case-insensitively, returning its byte offset.
fn find_marker(haystack: &str, marker: &str) -> Option<usize> {
    let bytes = haystack.as_bytes();
    let marker = marker.as_bytes();
    bytes
        .windows(marker.len())
        .position(|window| window.eq_ignore_ascii_case(marker))
}

/// Splits on commas outside quoted strings and bracketed structures.
fn split_top_level(section: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut in_quote = false;
    let mut escape = false;

    for ch in section.chars() {
        if in_quote {
            current.push(ch);
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_quote = false;
            }
            continue;
        }
        match ch {
            '"' => {
                in_quote = true;
                current.push(ch);
            }
            '{' | '[' => {
                depth += 1;
                current.push(ch);
            }
            '}' | ']' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            ',' if depth == 0 => {
                let token = current.trim();
                if !token.is_empty() {
                    tokens.push(token.to_string());
                }
                current.clear();
            }
            _ => current.push(ch),
        }
    }

    let token = current.trim();
    if !token.is_empty() {
        tokens.push(token.to_string());
    }
    tokens
}

/// Parses the first whitespace-delimited token as an integer.
fn lenient_int(value: &str) -> Option<i64> {
    value.split_whitespace().next()?.parse().ok()
}

/// Parses the first whitespace-delimited token as a float.
fn lenient_float(value: &str) -> Option<f64> {
    value.split_whitespace().next()?.parse().ok()
}

/// Parses `WxH` dimensions.
fn parse_size(value: &str) -> Option<(u32, u32)> {
    let (w, h) = value.to_lowercase().split_once('x').map(|(w, h)| {
        (w.trim().to_string(), h.trim().to_string())
    })?;
    Some((w.parse().ok()?, h.parse().ok()?))
}

fn json_or_string(value: &str) -> Value {
    serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()))
}
