//! Script-number codec (spec component C1).
//!
//! A script number is a signed, variable-length, little-endian integer of at
//! most 9 bytes, with the sign carried in the high bit of the last byte.
//! Decoding is minimal: no encoding may be shortened (dropping a trailing
//! `0x00`/`0x80`) without changing its value, and any byte sequence that
//! fails that check is rejected with [`ScriptError::InvalidScriptNumber`]
//! rather than silently accepted.

use crate::error::ScriptError;

/// Width limit used for ordinary arithmetic operators (`OP_ADD`, comparisons,
/// ...). Bitcoin Core calls this `nMaxNumSize`.
pub const DEFAULT_MAX_NUM_SIZE: usize = 4;

/// Encodes `value` as a minimal script number.
///
/// `0` encodes as the empty vector (the canonical `false`/`OP_0` encoding).
pub fn encode(value: i64) -> Vec<u8> {
    if value == 0 {
        return Vec::new();
    }

    let negative = value < 0;
    let mut absvalue = if negative {
        (value as i128).unsigned_abs() as u64
    } else {
        value as u64
    };

    let mut result = Vec::new();
    while absvalue != 0 {
        result.push((absvalue & 0xff) as u8);
        absvalue >>= 8;
    }

    // If the high bit of the most significant byte is already set, it would
    // be read as the sign bit, so an extra byte is needed to hold the sign.
    if result.last().map_or(false, |&b| b & 0x80 != 0) {
        result.push(if negative { 0x80 } else { 0x00 });
    } else if negative {
        let last = result.len() - 1;
        result[last] |= 0x80;
    }

    result
}

/// Decodes a script number with the given maximum byte width, enforcing
/// minimality. Use [`DEFAULT_MAX_NUM_SIZE`] for ordinary arithmetic; callers
/// decoding wider counters (e.g. `OP_CHECKMULTISIG`'s key/signature counts,
/// spec §4.1 steps 1 and 4) pass a larger width explicitly.
pub fn decode(bytes: &[u8], max_size: usize) -> Result<i64, ScriptError> {
    if bytes.len() > max_size {
        return Err(ScriptError::InvalidScriptNumber);
    }
    if !is_minimally_encoded(bytes) {
        return Err(ScriptError::InvalidScriptNumber);
    }
    if bytes.is_empty() {
        return Ok(0);
    }

    // Accumulate in i128: a 9-byte input shifts its top byte by 64 bits,
    // which i64 cannot represent without overflowing.
    let last_index = bytes.len() - 1;
    let negative = bytes[last_index] & 0x80 != 0;

    let mut magnitude: i128 = 0;
    for (i, &byte) in bytes.iter().enumerate() {
        let byte = if i == last_index { byte & 0x7f } else { byte };
        magnitude |= (byte as i128) << (8 * i);
    }

    let value = if negative { -magnitude } else { magnitude };
    i64::try_from(value).map_err(|_| ScriptError::InvalidScriptNumber)
}

/// Decodes using [`DEFAULT_MAX_NUM_SIZE`], the width used by arithmetic
/// operators.
pub fn decode_default(bytes: &[u8]) -> Result<i64, ScriptError> {
    decode(bytes, DEFAULT_MAX_NUM_SIZE)
}

fn is_minimally_encoded(bytes: &[u8]) -> bool {
    let Some(&last) = bytes.last() else {
        return true;
    };
    if last & 0x7f != 0 {
        return true;
    }
    // The sign-stripped top byte is zero: only acceptable if the byte below
    // it already has its own high bit set, so that dropping this byte would
    // flip that bit into the sign position (e.g. +255 = 0xff 0x00).
    bytes.len() > 1 && bytes[bytes.len() - 2] & 0x80 != 0
}

/// Converts a boolean into its canonical script-number stack encoding:
/// `0x01` for true, the empty element for false.
pub fn boolean_to_script_number(value: bool) -> Vec<u8> {
    if value {
        vec![0x01]
    } else {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_empty() {
        assert_eq!(encode(0), Vec::<u8>::new());
        assert_eq!(decode_default(&[]).unwrap(), 0);
    }

    #[test]
    fn small_positive_and_negative() {
        assert_eq!(encode(1), vec![0x01]);
        assert_eq!(encode(-1), vec![0x81]);
        assert_eq!(encode(127), vec![0x7f]);
        assert_eq!(encode(-127), vec![0xff]);
    }

    #[test]
    fn sign_byte_extension() {
        assert_eq!(encode(128), vec![0x80, 0x00]);
        assert_eq!(encode(-128), vec![0x80, 0x80]);
        assert_eq!(encode(255), vec![0xff, 0x00]);
        assert_eq!(encode(256), vec![0x00, 0x01]);
    }

    #[test]
    fn round_trip_i32_range() {
        for v in [-70000i64, -256, -1, 0, 1, 255, 256, 70000, 2_147_483_647] {
            let bytes = encode(v);
            assert_eq!(decode(&bytes, 9).unwrap(), v, "round trip failed for {v}");
        }
    }

    #[test]
    fn rejects_non_minimal() {
        // 5 could be encoded as [0x05]; [0x05, 0x00] is non-minimal.
        assert_eq!(decode_default(&[0x05, 0x00]), Err(ScriptError::InvalidScriptNumber));
    }

    #[test]
    fn accepts_necessary_extra_byte() {
        // +255 must be [0xff, 0x00] since [0xff] alone would decode as -127.
        assert_eq!(decode(&[0xff, 0x00], 9).unwrap(), 255);
        assert_eq!(decode(&[0xff, 0x80], 9).unwrap(), -255);
    }

    #[test]
    fn nine_byte_encoding_round_trips_without_overflow() {
        // i64::MIN's magnitude (2^63) needs a 9th byte purely for sign, since
        // its 8-byte magnitude already has the high bit set.
        let bytes = encode(i64::MIN);
        assert_eq!(bytes.len(), 9);
        assert_eq!(decode(&bytes, 9).unwrap(), i64::MIN);

        assert_eq!(decode(&encode(i64::MAX), 9).unwrap(), i64::MAX);
    }

    #[test]
    fn rejects_oversized() {
        assert_eq!(decode(&[0x01, 0x02, 0x03, 0x04, 0x05], 4), Err(ScriptError::InvalidScriptNumber));
    }

    #[test]
    fn boolean_encoding() {
        assert_eq!(boolean_to_script_number(true), vec![0x01]);
        assert_eq!(boolean_to_script_number(false), Vec::<u8>::new());
    }
}
