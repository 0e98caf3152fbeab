#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod document;
pub mod extract;
pub mod fingerprint;
pub mod graph;
pub mod recover;
pub mod resolve;
pub mod roles;

pub use extract::{ExtractionResult, LoraRecord, extract};
pub use fingerprint::{AlgorithmInfo, Fingerprint};
pub use graph::{Graph, InputValue, MAX_TRAVERSAL_DEPTH, Node};
pub use recover::{
    Comparison, Provenance, compare, provenance_from_file, provenance_from_png_bytes,
    provenance_of_document,
};
pub use resolve::resolve;
pub use roles::{Role, RoleRegistry};

/// Tracing target for provenance operations.
pub const TRACING_TARGET: &str = "prov_workflow";
