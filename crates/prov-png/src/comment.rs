//! EXIF `UserComment` decoding.
//!
//! `UserComment` payloads start with an 8-byte character code header, but
//! many writers omit it or lie about the encoding. Detection runs in order:
//! declared header, byte-order mark, null-byte position heuristic, then
//! permissive fallbacks. Decoding never fails; undecodable input yields
//! `None`.

use encoding_rs::{SHIFT_JIS, UTF_16BE, UTF_16LE, mem};
use tracing::debug;

use crate::TRACING_TARGET;

const HEADER_ASCII: &[u8; 8] = b"ASCII\0\0\0";
const HEADER_JIS: &[u8; 8] = b"JIS\0\0\0\0\0";
const HEADER_UNICODE: &[u8; 8] = b"UNICODE\0";
const HEADER_UNDEFINED: &[u8; 8] = &[0; 8];

const BOM_UTF16_LE: &[u8; 2] = &[0xff, 0xfe];
const BOM_UTF16_BE: &[u8; 2] = &[0xfe, 0xff];
const BOM_UTF8: &[u8; 3] = &[0xef, 0xbb, 0xbf];

/// Decodes raw `UserComment` bytes into sanitized text.
///
/// Returns `None` when the payload is empty or decodes to nothing but
/// padding.
pub fn decode_comment(bytes: &[u8]) -> Option<String> {
    if bytes.is_empty() {
        return None;
    }

    let decoded = decode_with_header(bytes)
        .or_else(|| decode_with_bom(bytes))
        .or_else(|| decode_by_null_positions(bytes))
        .or_else(|| decode_permissive(bytes));

    let text = sanitize(&decoded?);
    if text.is_empty() { None } else { Some(text) }
}

/// Decodes according to the declared 8-byte character code, if present.
fn decode_with_header(bytes: &[u8]) -> Option<String> {
    let (header, body) = (bytes.get(..8)?, &bytes[8..]);

    if header == HEADER_ASCII {
        debug!(target: TRACING_TARGET, "comment declares ascii");
        return Some(body.iter().map(|b| (b & 0x7f) as char).collect());
    }
    if header == HEADER_JIS {
        debug!(target: TRACING_TARGET, "comment declares jis");
        let (text, _, _) = SHIFT_JIS.decode(body);
        return Some(text.into_owned());
    }
    if header == HEADER_UNICODE {
        debug!(target: TRACING_TARGET, "comment declares unicode");
        return Some(decode_utf16(body));
    }
    if header == HEADER_UNDEFINED {
        // Undefined character code: most writers mean UTF-8 here.
        debug!(target: TRACING_TARGET, "comment declares undefined charset");
        return Some(match std::str::from_utf8(body) {
            Ok(text) => text.to_string(),
            Err(_) => mem::decode_latin1(body).into_owned(),
        });
    }
    None
}

/// Decodes UTF-16 honoring a leading BOM, defaulting to little-endian.
fn decode_utf16(bytes: &[u8]) -> String {
    if bytes.starts_with(BOM_UTF16_BE) {
        let (text, _) = UTF_16BE.decode_without_bom_handling(&bytes[2..]);
        return text.into_owned();
    }
    let body = bytes.strip_prefix(BOM_UTF16_LE.as_slice()).unwrap_or(bytes);
    let (text, _) = UTF_16LE.decode_without_bom_handling(body);
    text.into_owned()
}

/// Decodes payloads that carry a bare byte-order mark with no header.
fn decode_with_bom(bytes: &[u8]) -> Option<String> {
    if bytes.starts_with(BOM_UTF16_LE) || bytes.starts_with(BOM_UTF16_BE) {
        return Some(decode_utf16(bytes));
    }
    if let Some(body) = bytes.strip_prefix(BOM_UTF8.as_slice()) {
        return Some(String::from_utf8_lossy(body).into_owned());
    }
    None
}

/// Guesses UTF-16 endianness from the position of null bytes.
///
/// ASCII-range text encoded as UTF-16LE has nulls in odd positions,
/// UTF-16BE in even positions.
fn decode_by_null_positions(bytes: &[u8]) -> Option<String> {
    if bytes.len() < 4 {
        return None;
    }
    if bytes[1] == 0 && bytes[3] == 0 {
        let (text, _) = UTF_16LE.decode_without_bom_handling(bytes);
        return Some(text.into_owned());
    }
    if bytes[0] == 0 && bytes[2] == 0 {
        let (text, _) = UTF_16BE.decode_without_bom_handling(bytes);
        return Some(text.into_owned());
    }
    None
}

/// Last-resort decoding: strict UTF-8, then Latin-1 (never fails).
fn decode_permissive(bytes: &[u8]) -> Option<String> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Some(text.to_string()),
        Err(_) => Some(mem::decode_latin1(bytes).into_owned()),
    }
}

/// Strips embedded nulls and padding, normalizes line endings.
fn sanitize(text: &str) -> String {
    text.replace('\0', "").replace("\r\n", "\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_header() {
        assert_eq!(decode_comment(b"ASCII\0\0\0Hello"), Some("Hello".to_string()));
    }

    #[test]
    fn test_unicode_header_little_endian_bom() {
        let mut bytes = b"UNICODE\0".to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe, b'H', 0, b'i', 0]);
        assert_eq!(decode_comment(&bytes), Some("Hi".to_string()));
    }

    #[test]
    fn test_unicode_header_without_bom_defaults_le() {
        let mut bytes = b"UNICODE\0".to_vec();
        bytes.extend_from_slice(&[b'o', 0, b'k', 0]);
        assert_eq!(decode_comment(&bytes), Some("ok".to_string()));
    }

    #[test]
    fn test_undefined_header_utf8() {
        let mut bytes = vec![0u8; 8];
        bytes.extend_from_slice("école".as_bytes());
        assert_eq!(decode_comment(&bytes), Some("école".to_string()));
    }

    #[test]
    fn test_bare_utf16_le_bom() {
        assert_eq!(
            decode_comment(&[0xff, 0xfe, b'H', 0, b'i', 0]),
            Some("Hi".to_string())
        );
    }

    #[test]
    fn test_bare_utf16_be_bom() {
        assert_eq!(
            decode_comment(&[0xfe, 0xff, 0, b'H', 0, b'i']),
            Some("Hi".to_string())
        );
    }

    #[test]
    fn test_null_position_heuristic_le() {
        assert_eq!(
            decode_comment(&[b'a', 0, b'b', 0, b'c', 0]),
            Some("abc".to_string())
        );
    }

    #[test]
    fn test_null_position_heuristic_be() {
        assert_eq!(
            decode_comment(&[0, b'a', 0, b'b', 0, b'c']),
            Some("abc".to_string())
        );
    }

    #[test]
    fn test_plain_utf8_fallback() {
        assert_eq!(decode_comment("naïve".as_bytes()), Some("naïve".to_string()));
    }

    #[test]
    fn test_latin1_fallback() {
        // 0xe9 alone is invalid UTF-8 but valid Latin-1 'é'.
        assert_eq!(decode_comment(&[b'c', b'a', b'f', 0xe9]), Some("café".to_string()));
    }

    #[test]
    fn test_sanitize_line_endings_and_padding() {
        let mut bytes = b"ASCII\0\0\0".to_vec();
        bytes.extend_from_slice(b"  line1\r\nline2\0\0  ");
        assert_eq!(decode_comment(&bytes), Some("line1\nline2".to_string()));
    }

    #[test]
    fn test_empty_and_null_only_payloads() {
        assert_eq!(decode_comment(b""), None);
        assert_eq!(decode_comment(&[0, 0, 0]), None);
    }
}
