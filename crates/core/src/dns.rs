//! DNS wire-format name decoding, as used by the name wrapper.
//!
//! A wire-format name is a sequence of length-prefixed labels terminated by a
//! zero-length label, e.g. `05 alice 03 eth 00`.

use alloy_primitives::hex;

use crate::error::{CoreError, Result};

/// A successfully decoded wire-format name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedName {
    /// Leftmost label (empty for the root).
    pub first_label: String,
    /// Dot-joined full name (`"."` for the root).
    pub name: String,
}

/// Check that a plaintext label may be used as a name segment.
///
/// Labels containing a null byte or a literal `.` are rejected.
pub fn check_valid_label(label: &str) -> bool {
    !label.contains(['\0', '.'])
}

/// Decode a wire-format name.
///
/// Returns `None` for empty input, truncated labels, non UTF-8 labels, a
/// missing terminator, or any label failing [`check_valid_label`].
pub fn decode_name(buf: &[u8]) -> Option<DecodedName> {
    match buf.first() {
        None => return None,
        Some(0) => {
            return Some(DecodedName {
                first_label: String::new(),
                name: ".".to_string(),
            })
        }
        Some(_) => {}
    }

    let mut labels: Vec<&str> = Vec::new();
    let mut offset = 0;
    loop {
        let len = usize::from(*buf.get(offset)?);
        if len == 0 {
            break;
        }
        let bytes = buf.get(offset + 1..offset + 1 + len)?;
        let label = std::str::from_utf8(bytes).ok()?;
        if !check_valid_label(label) {
            return None;
        }
        labels.push(label);
        offset += len + 1;
    }

    Some(DecodedName {
        first_label: labels.first()?.to_string(),
        name: labels.join("."),
    })
}

/// Decode a hex-encoded (optionally `0x`-prefixed) wire-format name.
///
/// Bad hex is a caller bug and is reported as an error; a malformed name is
/// `Ok(None)`.
pub fn decode_name_hex(input: &str) -> Result<Option<DecodedName>> {
    let bytes = hex::decode(input).map_err(|e| CoreError::InvalidHex(e.to_string()))?;
    Ok(decode_name(&bytes))
}

/// Encode a dotted name into wire format.
///
/// The empty name and `"."` encode to the single root terminator, and one
/// trailing dot is accepted. Returns `None` for an empty label, a label longer
/// than 255 bytes, or a label failing [`check_valid_label`].
pub fn encode_name(name: &str) -> Option<Vec<u8>> {
    let trimmed = name.strip_suffix('.').unwrap_or(name);
    let mut out = Vec::with_capacity(trimmed.len() + 2);
    if !trimmed.is_empty() {
        for label in trimmed.split('.') {
            if label.is_empty() || !check_valid_label(label) {
                return None;
            }
            let len = u8::try_from(label.len()).ok()?;
            out.push(len);
            out.extend_from_slice(label.as_bytes());
        }
    }
    out.push(0);
    Some(out)
}
