//! Provenance metadata read/write over PNG chunks.
//!
//! Keys live in `iTXt` chunks under the [`METADATA_NAMESPACE`] prefix.
//! Injection rebuilds the file as signature + kept chunks + new chunks +
//! `IEND`, so pixel data is never re-encoded. File mutation follows a
//! backup-verify-write-verify-rollback protocol: the target is never left in
//! a partially written state relative to what existed before the call.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tracing::{debug, error, info};

use crate::TRACING_TARGET;
use crate::chunk::{self, Chunk, METADATA_NAMESPACE, PNG_SIGNATURE};
use crate::error::{CodecError, CodecResult};

/// Reads namespaced provenance metadata from raw PNG bytes.
///
/// Only keys under the `mjr:` namespace are returned, in file order.
pub fn read_metadata(bytes: &[u8]) -> IndexMap<String, String> {
    let mut metadata = IndexMap::new();
    let Some(chunks) = chunk::read_chunks(bytes) else {
        return metadata;
    };

    for c in &chunks {
        if let Some((key, value)) = chunk::parse_itxt(c)
            && key.starts_with(METADATA_NAMESPACE)
        {
            metadata.insert(key, value);
        }
    }
    metadata
}

/// Reads every textual chunk key/value pair (`tEXt` and uncompressed `iTXt`).
///
/// Used to discover provenance payloads written by other producers, which
/// store graph documents under keys like `prompt` and `workflow`. Order is
/// file order; a repeated key keeps its first value.
pub fn read_text_fields(bytes: &[u8]) -> IndexMap<String, String> {
    let mut fields = IndexMap::new();
    let Some(chunks) = chunk::read_chunks(bytes) else {
        return fields;
    };

    for c in &chunks {
        let parsed = chunk::parse_itxt(c).or_else(|| chunk::parse_text(c));
        if let Some((key, value)) = parsed {
            fields.entry(key).or_insert(value);
        }
    }
    fields
}

/// Injects metadata into PNG bytes, returning the rebuilt file.
///
/// Existing `iTXt` chunks whose keyword matches an updated key are removed;
/// new chunks are appended immediately before `IEND`. Keys missing the
/// namespace prefix are prefixed automatically. Returns `None` when the
/// bytes are not a PNG.
pub fn inject_into(bytes: &[u8], updates: &IndexMap<String, String>) -> Option<Vec<u8>> {
    let chunks = chunk::read_chunks(bytes)?;
    if chunks.is_empty() {
        return None;
    }

    let namespaced: IndexMap<String, &String> = updates
        .iter()
        .map(|(key, value)| {
            let key = if key.starts_with(METADATA_NAMESPACE) {
                key.clone()
            } else {
                format!("{METADATA_NAMESPACE}{key}")
            };
            (key, value)
        })
        .collect();

    let mut output = Vec::with_capacity(bytes.len());
    output.extend_from_slice(&PNG_SIGNATURE);

    let mut iend: Option<&Chunk> = None;
    for c in &chunks {
        if c.is_iend() {
            iend = Some(c);
            continue;
        }
        if let Some((key, _)) = chunk::parse_itxt(c)
            && namespaced.contains_key(&key)
        {
            continue; // replaced below
        }
        output.extend_from_slice(&c.to_bytes());
    }

    for (key, value) in &namespaced {
        output.extend_from_slice(&chunk::itxt_chunk(key, value.as_str()).to_bytes());
    }

    match iend {
        Some(c) => output.extend_from_slice(&c.to_bytes()),
        None => output.extend_from_slice(&Chunk::new(chunk::CHUNK_IEND, Vec::new()).to_bytes()),
    }

    Some(output)
}

/// Injects metadata into a PNG file with backup/rollback safety.
///
/// When `make_backup` is set (or forced by platform policy on Windows), the
/// original is copied to `<file>.png.backup` and the copy is verified to
/// exist with a matching byte size before anything is written. If the final
/// write fails its on-disk size check, the original is restored from the
/// backup and the failure propagates.
pub fn inject_metadata(
    path: &Path,
    updates: &IndexMap<String, String>,
    make_backup: bool,
) -> CodecResult<()> {
    let original = fs::read(path)?;
    let Some(output) = inject_into(&original, updates) else {
        return Err(CodecError::NotPng { path: path.to_path_buf() });
    };

    // Windows file replacement is not atomic, always keep a backup there.
    let make_backup = make_backup || cfg!(windows);
    let backup = if make_backup {
        Some(create_verified_backup(path, original.len() as u64)?)
    } else {
        None
    };

    write_with_rollback(path, &output, backup.as_deref())?;
    debug!(
        target: TRACING_TARGET,
        path = %path.display(),
        keys = updates.len(),
        "injected provenance metadata"
    );
    Ok(())
}

/// Removes provenance metadata chunks from a PNG file.
///
/// With `keys = None` every namespaced key is dropped; otherwise only exact
/// keyword matches are removed. Uses the same backup protocol as
/// [`inject_metadata`].
pub fn remove_metadata(path: &Path, keys: Option<&[&str]>, make_backup: bool) -> CodecResult<()> {
    let original = fs::read(path)?;
    let Some(chunks) = chunk::read_chunks(&original) else {
        return Err(CodecError::NotPng { path: path.to_path_buf() });
    };

    let mut output = Vec::with_capacity(original.len());
    output.extend_from_slice(&PNG_SIGNATURE);
    for c in &chunks {
        if let Some((key, _)) = chunk::parse_itxt(c) {
            let drop = match keys {
                None => key.starts_with(METADATA_NAMESPACE),
                Some(keys) => keys.contains(&key.as_str()),
            };
            if drop {
                continue;
            }
        }
        output.extend_from_slice(&c.to_bytes());
    }

    let make_backup = make_backup || cfg!(windows);
    let backup = if make_backup {
        Some(create_verified_backup(path, original.len() as u64)?)
    } else {
        None
    };

    write_with_rollback(path, &output, backup.as_deref())
}

/// Copies the target aside and verifies the copy before any mutation.
fn create_verified_backup(path: &Path, original_len: u64) -> CodecResult<PathBuf> {
    let backup_path = path.with_extension("png.backup");
    fs::copy(path, &backup_path).map_err(|err| CodecError::BackupFailed {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;

    let backup_len = fs::metadata(&backup_path).map(|m| m.len()).unwrap_or(0);
    if backup_len != original_len {
        return Err(CodecError::BackupFailed {
            path: path.to_path_buf(),
            message: format!("backup size mismatch: {backup_len} != {original_len}"),
        });
    }

    debug!(
        target: TRACING_TARGET,
        backup = %backup_path.display(),
        "created and verified backup"
    );
    Ok(backup_path)
}

/// Writes the rebuilt file, restoring from backup when verification fails.
fn write_with_rollback(path: &Path, output: &[u8], backup: Option<&Path>) -> CodecResult<()> {
    let write_result = fs::write(path, output).map_err(CodecError::from).and_then(|()| {
        let written = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        if written < output.len() as u64 {
            Err(CodecError::WriteVerification { path: path.to_path_buf() })
        } else {
            Ok(())
        }
    });

    if let Err(write_error) = write_result {
        if let Some(backup) = backup {
            match fs::copy(backup, path) {
                Ok(_) => {
                    info!(
                        target: TRACING_TARGET,
                        path = %path.display(),
                        "restored original from backup after failed write"
                    );
                }
                Err(rollback_error) => {
                    error!(
                        target: TRACING_TARGET,
                        path = %path.display(),
                        %rollback_error,
                        "failed to restore from backup"
                    );
                }
            }
        }
        return Err(write_error);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{CHUNK_IEND, CHUNK_ITXT};

    /// Minimal valid PNG: IHDR (1x1 RGBA), IDAT, IEND.
    fn minimal_png() -> Vec<u8> {
        let ihdr = Chunk::new(
            *b"IHDR",
            vec![0, 0, 0, 1, 0, 0, 0, 1, 8, 6, 0, 0, 0],
        );
        let idat = Chunk::new(
            *b"IDAT",
            vec![0x78, 0x9c, 0x62, 0x00, 0x01, 0x00, 0x00, 0x05, 0x00, 0x01],
        );
        let iend = Chunk::new(CHUNK_IEND, Vec::new());

        let mut bytes = PNG_SIGNATURE.to_vec();
        bytes.extend_from_slice(&ihdr.to_bytes());
        bytes.extend_from_slice(&idat.to_bytes());
        bytes.extend_from_slice(&iend.to_bytes());
        bytes
    }

    fn updates(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_inject_and_read_round_trip() {
        let injected = inject_into(&minimal_png(), &updates(&[("mjr:rating", "5")])).unwrap();
        let metadata = read_metadata(&injected);
        assert_eq!(metadata.get("mjr:rating").map(String::as_str), Some("5"));
    }

    #[test]
    fn test_reinjection_keeps_single_chunk_per_key() {
        let once = inject_into(&minimal_png(), &updates(&[("mjr:rating", "5")])).unwrap();
        let twice = inject_into(&once, &updates(&[("mjr:rating", "5")])).unwrap();

        let rating_chunks = chunk::read_chunks(&twice)
            .unwrap()
            .iter()
            .filter(|c| {
                chunk::parse_itxt(c).is_some_and(|(key, _)| key == "mjr:rating")
            })
            .count();
        assert_eq!(rating_chunks, 1);
    }

    #[test]
    fn test_inject_auto_prefixes_keys() {
        let injected = inject_into(&minimal_png(), &updates(&[("rating", "4")])).unwrap();
        let metadata = read_metadata(&injected);
        assert_eq!(metadata.get("mjr:rating").map(String::as_str), Some("4"));
    }

    #[test]
    fn test_inject_preserves_structure() {
        let injected =
            inject_into(&minimal_png(), &updates(&[("mjr:tags", "[\"portrait\"]")])).unwrap();
        let chunks = chunk::read_chunks(&injected).unwrap();

        // Terminal chunk still present and still last.
        assert!(chunks.last().unwrap().is_iend());
        // Non-text chunks preserved in original relative order.
        let kinds: Vec<[u8; 4]> = chunks
            .iter()
            .filter(|c| c.kind != CHUNK_ITXT)
            .map(|c| c.kind)
            .collect();
        assert_eq!(kinds, vec![*b"IHDR", *b"IDAT", CHUNK_IEND]);
    }

    #[test]
    fn test_inject_updates_existing_value() {
        let first = inject_into(
            &minimal_png(),
            &updates(&[("mjr:rating", "5"), ("mjr:tags", "[\"test\"]")]),
        )
        .unwrap();
        let second = inject_into(&first, &updates(&[("mjr:rating", "4")])).unwrap();

        let metadata = read_metadata(&second);
        assert_eq!(metadata.get("mjr:rating").map(String::as_str), Some("4"));
        assert_eq!(metadata.get("mjr:tags").map(String::as_str), Some("[\"test\"]"));
    }

    #[test]
    fn test_inject_rejects_non_png() {
        assert!(inject_into(b"GIF89a....", &updates(&[("mjr:rating", "1")])).is_none());
    }

    #[test]
    fn test_read_text_fields_covers_text_chunks() {
        let mut bytes = PNG_SIGNATURE.to_vec();
        bytes.extend_from_slice(
            &Chunk::new(*b"IHDR", vec![0, 0, 0, 1, 0, 0, 0, 1, 8, 6, 0, 0, 0]).to_bytes(),
        );
        bytes.extend_from_slice(&Chunk::new(*b"tEXt", b"prompt\0{}".to_vec()).to_bytes());
        bytes.extend_from_slice(&chunk::itxt_chunk("mjr:rating", "3").to_bytes());
        bytes.extend_from_slice(&Chunk::new(CHUNK_IEND, Vec::new()).to_bytes());

        let fields = read_text_fields(&bytes);
        assert_eq!(fields.get("prompt").map(String::as_str), Some("{}"));
        assert_eq!(fields.get("mjr:rating").map(String::as_str), Some("3"));
    }

    #[test]
    fn test_inject_metadata_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("asset.png");
        fs::write(&path, minimal_png()).unwrap();

        inject_metadata(&path, &updates(&[("mjr:rating", "5")]), true).unwrap();

        let metadata = read_metadata(&fs::read(&path).unwrap());
        assert_eq!(metadata.get("mjr:rating").map(String::as_str), Some("5"));

        // Backup was created next to the original.
        assert!(path.with_extension("png.backup").exists());
    }

    #[test]
    fn test_inject_metadata_rejects_non_png_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("asset.png");
        fs::write(&path, b"not a png").unwrap();

        let err = inject_metadata(&path, &updates(&[("mjr:rating", "5")]), false).unwrap_err();
        assert!(matches!(err, CodecError::NotPng { .. }));
        // Target untouched.
        assert_eq!(fs::read(&path).unwrap(), b"not a png");
    }

    #[test]
    fn test_remove_metadata_selected_and_all() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("asset.png");
        fs::write(&path, minimal_png()).unwrap();

        inject_metadata(
            &path,
            &updates(&[("mjr:rating", "5"), ("mjr:notes", "keep me not")]),
            false,
        )
        .unwrap();

        remove_metadata(&path, Some(&["mjr:notes"]), false).unwrap();
        let metadata = read_metadata(&fs::read(&path).unwrap());
        assert!(metadata.contains_key("mjr:rating"));
        assert!(!metadata.contains_key("mjr:notes"));

        remove_metadata(&path, None, false).unwrap();
        assert!(read_metadata(&fs::read(&path).unwrap()).is_empty());
    }
}
