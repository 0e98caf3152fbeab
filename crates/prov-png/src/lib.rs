#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod chunk;
pub mod codec;
pub mod comment;
mod error;
pub mod params;

pub use chunk::{Chunk, METADATA_NAMESPACE, PNG_SIGNATURE};
pub use codec::{inject_into, inject_metadata, read_metadata, read_text_fields, remove_metadata};
pub use comment::decode_comment;
pub use error::{CodecError, CodecResult};
pub use params::{LegacyParams, parse_legacy_params};

/// Tracing target for codec operations.
pub const TRACING_TARGET: &str = "prov_png";
