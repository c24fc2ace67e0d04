//! Frame encoding normalization.
//!
//! Clients are not consistent about how they encode frames: some send clean
//! base64, some wrap it at 76 columns, some drop the padding, and some push
//! raw image bytes. The analysis service only accepts padded standard
//! base64, so every frame goes through [`normalize_frame`] first.

// ============================================================================
// Imports
// ============================================================================

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

// ============================================================================
// Normalization
// ============================================================================

/// Normalizes a client frame to padded standard base64.
///
/// ASCII whitespace is ignored when deciding. If what remains is entirely in
/// the base64 alphabet it is kept and padded to a multiple of 4; otherwise
/// the original bytes are treated as raw binary and encoded.
#[must_use]
pub fn normalize_frame(raw: &[u8]) -> String {
    let compact: Vec<u8> = raw
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();

    if is_base64_text(&compact) {
        // Alphabet check guarantees ASCII.
        let mut text: String = compact.into_iter().map(char::from).collect();
        pad_base64(&mut text);
        text
    } else {
        STANDARD.encode(raw)
    }
}

/// Returns `true` if every byte is in the standard base64 alphabet.
#[inline]
#[must_use]
pub fn is_base64_text(bytes: &[u8]) -> bool {
    !bytes.is_empty()
        && bytes
            .iter()
            .all(|&b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'='))
}

/// Appends `=` until the length is a multiple of 4.
pub fn pad_base64(text: &mut String) {
    let missing = (4 - text.len() % 4) % 4;
    text.extend(std::iter::repeat_n('=', missing));
}

// ============================================================================
// Tests
// ============================================================================
