//! Node role classification.
//!
//! Graph node types are free-form strings chosen by whichever node pack
//! defined them. Extraction only cares about a node's *role* (sampler,
//! loader, reroute, text encoder, ...), so each role is backed by a default
//! set of known type names, optionally extended from an external JSON
//! mapping. Matching is case-insensitive; an unknown type simply matches no
//! role.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde_json::Value;
use strum::{Display, EnumIter, IntoEnumIterator};
use tracing::{debug, warn};

use crate::TRACING_TARGET;

/// A semantic role a graph node can play during extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    Sampler,
    CheckpointLoader,
    UnetLoader,
    DiffusersLoader,
    LoraLoader,
    Reroute,
    GetVariable,
    SetVariable,
    ConditioningCombiner,
    ControlnetApply,
    TextEncoder,
    Output,
}

impl Role {
    /// Key under which extensions for this role appear in the mapping file.
    pub fn config_key(self) -> &'static str {
        match self {
            Self::Sampler => "sampler_classes",
            Self::CheckpointLoader => "checkpoint_loader_classes",
            Self::UnetLoader => "unet_loader_classes",
            Self::DiffusersLoader => "diffusers_loader_classes",
            Self::LoraLoader => "lora_classes",
            Self::Reroute => "reroute_classes",
            Self::GetVariable => "get_variable_classes",
            Self::SetVariable => "set_variable_classes",
            Self::ConditioningCombiner => "conditioning_classes",
            Self::ControlnetApply => "controlnet_classes",
            Self::TextEncoder => "clip_text_encode_classes",
            Self::Output => "output_classes",
        }
    }

    /// Default type names for this role, lowercase.
    fn default_names(self) -> &'static [&'static str] {
        match self {
            Self::Sampler => &[
                // Core samplers
                "ksampler",
                "samplercustom",
                "ksampleradvanced",
                "ksamplercustom",
                "ksamplercustomadvanced",
                "ksamplerhires",
                "ksamplerupscale",
                // Efficiency pack
                "ksampler (efficient)",
                "ksampler adv. (efficient)",
                "ksamplerefficient",
                "ksampleradvefficient",
                // Impact pack
                "impactksampleradvanced",
                "ksamplerprovider",
                "impactksampler",
                // AnimateDiff
                "animatediffsampler",
                "animatediffksampleradvanced",
                "animatediffksampler",
                // Flux / SD3 / SDXL
                "fluxsampler",
                "fluxguidance",
                "sd3sampler",
                "sdxlsampler",
                "sdxlksampleradvanced",
                // Custom sampler objects
                "samplerdpmpp_sde",
                "samplerdpmpp_2m",
                "samplerdpmpp_3m_sde",
                "samplerlms",
                "samplereulera",
                "samplereulerancestral",
                "samplerdpm2",
                "samplerdpm2ancestral",
                "samplerheun",
                "samplerdpm_fast",
                "samplerdpm_adaptive",
                "samplerlcm",
                "samplerddim",
                "samplerddpm",
                "sampleruni_pc",
                "sampleruni_pc_bh2",
                // Video wrappers
                "wanvideosampler",
                "wanvideoksampler",
                "wanmoeksampler",
                "videoksampler",
                "frameksampler",
                "batchksampler",
                // Assorted custom packs
                "ttn_ksampler",
                "bnsrksampleradv",
                "bnk_sampler",
                "rgthreesampler",
                "rg_sampler",
                "was_sampler",
                "civitai_sampler",
                "adv_sampler",
                "custom_sampler",
                "restart_sampler",
            ],
            Self::CheckpointLoader => &[
                "checkpointloadersimple",
                "checkpointloader",
                "checkpointloadersdxl",
                "unclipcheckpointloader",
            ],
            Self::UnetLoader => &["unetloader", "loaddiffusionmodel"],
            Self::DiffusersLoader => &["diffusersloader"],
            Self::LoraLoader => &["loraloader", "loraloadermodelonly"],
            Self::Reroute => &["reroute", "reroutenode"],
            Self::GetVariable => &["getnode", "easy getnode"],
            Self::SetVariable => &["setnode", "easy setnode"],
            Self::ConditioningCombiner => &[
                "conditioningcombine",
                "conditioningconcat",
                "conditioningaverage",
                "conditioningsetarea",
                "conditioningsetmask",
            ],
            Self::ControlnetApply => &["controlnetapply", "controlnetapplyadvanced"],
            Self::TextEncoder => &[
                "cliptextencode",
                "cliptextencodesdxl",
                "cliptextencodesdxlrefiner",
                "bnk_cliptextencodeadvanced",
                "smz cliptextencode",
                "advancedcliptextencode",
                "dualcliptextencodeflux",
                "t5textencode",
                "sd3textencoder",
                "ellatextencode",
            ],
            Self::Output => &[
                "saveimage",
                "previewimage",
                "vhs_videocombine",
                "saveimagewebsocket",
                "saveanimatedwebp",
                "saveanimatedpng",
                "imageuploads3",
            ],
        }
    }
}

/// Role membership sets: defaults merged with external extensions.
///
/// Built once and passed explicitly into extraction, never held as global
/// state, so tests can inject a custom registry.
#[derive(Debug, Clone)]
pub struct RoleRegistry {
    sets: HashMap<Role, HashSet<String>>,
}

impl Default for RoleRegistry {
    fn default() -> Self {
        let sets = Role::iter()
            .map(|role| {
                let names = role
                    .default_names()
                    .iter()
                    .map(|name| name.to_string())
                    .collect();
                (role, names)
            })
            .collect();
        Self { sets }
    }
}

impl RoleRegistry {
    /// Creates a registry with the built-in role sets only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges extension arrays from a mapping document into the defaults.
    ///
    /// Keys with a leading underscore are comments and skipped; unknown keys
    /// and non-array values are ignored.
    pub fn with_extensions(mut self, mapping: &Value) -> Self {
        let Some(entries) = mapping.as_object() else {
            return self;
        };
        for role in Role::iter() {
            let Some(names) = entries.get(role.config_key()).and_then(Value::as_array) else {
                continue;
            };
            let set = self.sets.entry(role).or_default();
            for name in names.iter().filter_map(Value::as_str) {
                set.insert(name.to_lowercase());
            }
        }
        for key in entries.keys() {
            if !key.starts_with('_') && !Role::iter().any(|role| role.config_key() == key) {
                debug!(target: TRACING_TARGET, key, "unknown role mapping key ignored");
            }
        }
        self
    }

    /// Loads a registry from a mapping file.
    ///
    /// A missing or unparsable file yields the defaults, never an error.
    pub fn load(path: &Path) -> Self {
        let registry = Self::new();
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) => {
                debug!(
                    target: TRACING_TARGET,
                    path = %path.display(),
                    %err,
                    "no role mapping file, using defaults"
                );
                return registry;
            }
        };
        match serde_json::from_str::<Value>(&text) {
            Ok(mapping) => registry.with_extensions(&mapping),
            Err(err) => {
                warn!(
                    target: TRACING_TARGET,
                    path = %path.display(),
                    %err,
                    "invalid role mapping file, using defaults"
                );
                registry
            }
        }
    }

    /// Returns whether a class type plays the given role.
    pub fn matches(&self, role: Role, class_type: &str) -> bool {
        let name = class_type.to_lowercase();
        self.sets.get(&role).is_some_and(|set| set.contains(&name))
    }

    /// Returns whether a class type is any kind of indirection node.
    pub fn is_indirection(&self, class_type: &str) -> bool {
        [Role::Reroute, Role::GetVariable, Role::SetVariable]
            .into_iter()
            .any(|role| self.matches(role, class_type))
    }
}
