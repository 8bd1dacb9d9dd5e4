//! Signature and public-key encoding checks (spec component C2).

use crate::error::ScriptError;

pub const SIGHASH_ALL: u8 = 0x01;
pub const SIGHASH_NONE: u8 = 0x02;
pub const SIGHASH_SINGLE: u8 = 0x03;
pub const SIGHASH_ANYONECANPAY: u8 = 0x80;
pub const SIGHASH_FORKID: u8 = 0x40;

/// The secp256k1 group order, used for the low-S check.
const CURVE_ORDER: [u8; 32] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe, 0xba, 0xae, 0xdc,
    0xe6, 0xaf, 0x48, 0xa0, 0x3b, 0xbf, 0xd2, 0x5e, 0x8c, 0xd0, 0x36, 0x41, 0x41,
];

/// Half the curve order, rounded down — the low-S boundary. `s` must be
/// `<= HALF_CURVE_ORDER` to pass.
fn half_curve_order() -> [u8; 32] {
    let mut half = [0u8; 32];
    let mut carry = 0u16;
    for i in 0..32 {
        let v = CURVE_ORDER[i] as u16 + (carry << 8);
        half[i] = (v >> 1) as u8;
        carry = v & 1;
    }
    half
}

/// Validates that `public_key` is a 33-byte compressed (`0x02`/`0x03`
/// prefix) or 65-byte uncompressed (`0x04` prefix) SEC point. Does not
/// check the point lies on the curve — that is the crypto provider's job
/// at verification time.
pub fn check_public_key_encoding(public_key: &[u8]) -> Result<(), ScriptError> {
    match public_key.first() {
        Some(0x04) if public_key.len() == 65 => Ok(()),
        Some(0x02) | Some(0x03) if public_key.len() == 33 => Ok(()),
        _ => Err(ScriptError::InvalidPublicKeyEncoding),
    }
}

/// Components of a `Bitcoin-encoded` signature: `DER(r, s) || hashType`.
pub struct ParsedSignature<'a> {
    pub der: &'a [u8],
    pub hash_type: u8,
}

/// Validates `signature` as `strict-DER(r, s) || hashType`, low-S, with a
/// recognized `hashType` (spec §4.2): one of SIGHASH_ALL/NONE/SINGLE,
/// optionally OR'd with ANYONECANPAY, and the mandatory BCH fork-id bit.
pub fn check_signature_encoding(signature: &[u8]) -> Result<ParsedSignature<'_>, ScriptError> {
    if signature.is_empty() {
        return Err(ScriptError::InvalidSignatureEncoding);
    }
    let (der, hash_type) = signature.split_at(signature.len() - 1);
    let hash_type = hash_type[0];

    check_hash_type(hash_type)?;
    check_der_low_s(der)?;

    Ok(ParsedSignature { der, hash_type })
}

fn check_hash_type(hash_type: u8) -> Result<(), ScriptError> {
    if hash_type & SIGHASH_FORKID == 0 {
        return Err(ScriptError::InvalidSignatureEncoding);
    }
    let base = hash_type & !(SIGHASH_ANYONECANPAY | SIGHASH_FORKID);
    match base {
        SIGHASH_ALL | SIGHASH_NONE | SIGHASH_SINGLE => Ok(()),
        _ => Err(ScriptError::InvalidSignatureEncoding),
    }
}

/// Strict DER parse (BIP66 shape) plus the low-S malleability check.
///
/// Expected shape:
/// `0x30 <total-len> 0x02 <r-len> <r-bytes> 0x02 <s-len> <s-bytes>`
/// with no trailing bytes, no leading zero bytes in `r`/`s` unless required
/// to keep the integer non-negative, and no negative (high-bit-set without a
/// padding zero) integers.
fn check_der_low_s(der: &[u8]) -> Result<(), ScriptError> {
    let err = ScriptError::InvalidSignatureEncoding;

    if der.len() < 9 || der.len() > 73 {
        return Err(err);
    }
    if der[0] != 0x30 {
        return Err(err);
    }
    if der[1] as usize != der.len() - 2 {
        return Err(err);
    }

    if der[2] != 0x02 {
        return Err(err);
    }
    let r_len = der[3] as usize;
    if r_len == 0 || 4 + r_len > der.len() {
        return Err(err);
    }
    let r = &der[4..4 + r_len];
    check_der_integer(r)?;

    let s_tag_index = 4 + r_len;
    if s_tag_index + 1 >= der.len() || der[s_tag_index] != 0x02 {
        return Err(err);
    }
    let s_len = der[s_tag_index + 1] as usize;
    let s_start = s_tag_index + 2;
    if s_len == 0 || s_start + s_len != der.len() {
        return Err(err);
    }
    let s = &der[s_start..s_start + s_len];
    check_der_integer(s)?;

    if !is_low_s(s) {
        return Err(err);
    }

    Ok(())
}

fn check_der_integer(bytes: &[u8]) -> Result<(), ScriptError> {
    let err = ScriptError::InvalidSignatureEncoding;
    if bytes[0] & 0x80 != 0 {
        // Negative integer: DER never encodes negative r/s values here.
        return Err(err);
    }
    if bytes.len() > 1 && bytes[0] == 0x00 && bytes[1] & 0x80 == 0 {
        // Unnecessary leading zero padding.
        return Err(err);
    }
    Ok(())
}

fn is_low_s(s: &[u8]) -> bool {
    let mut padded = [0u8; 32];
    if s.len() > 32 {
        return false;
    }
    padded[32 - s.len()..].copy_from_slice(s);
    padded <= half_curve_order()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncompressed_key_ok() {
        let mut key = vec![0x04];
        key.extend_from_slice(&[0xab; 64]);
        assert!(check_public_key_encoding(&key).is_ok());
    }

    #[test]
    fn compressed_key_ok() {
        let mut key = vec![0x02];
        key.extend_from_slice(&[0xab; 32]);
        assert!(check_public_key_encoding(&key).is_ok());

        key[0] = 0x03;
        assert!(check_public_key_encoding(&key).is_ok());
    }

    #[test]
    fn hybrid_and_empty_keys_rejected() {
        assert_eq!(check_public_key_encoding(&[]), Err(ScriptError::InvalidPublicKeyEncoding));
        let mut key = vec![0x06];
        key.extend_from_slice(&[0; 64]);
        assert_eq!(check_public_key_encoding(&key), Err(ScriptError::InvalidPublicKeyEncoding));
    }

    fn valid_der(r: &[u8], s: &[u8]) -> Vec<u8> {
        let mut out = vec![0x30, 0];
        out.push(0x02);
        out.push(r.len() as u8);
        out.extend_from_slice(r);
        out.push(0x02);
        out.push(s.len() as u8);
        out.extend_from_slice(s);
        out[1] = (out.len() - 2) as u8;
        out
    }

    #[test]
    fn well_formed_low_s_signature_passes() {
        let der = valid_der(&[0x01], &[0x01]);
        let mut sig = der;
        sig.push(SIGHASH_ALL | SIGHASH_FORKID);
        let parsed = check_signature_encoding(&sig).unwrap();
        assert_eq!(parsed.hash_type, SIGHASH_ALL | SIGHASH_FORKID);
    }

    #[test]
    fn missing_forkid_bit_rejected() {
        let mut sig = valid_der(&[0x01], &[0x01]);
        sig.push(SIGHASH_ALL);
        assert_eq!(check_signature_encoding(&sig), Err(ScriptError::InvalidSignatureEncoding));
    }

    #[test]
    fn high_s_rejected() {
        let high_s = half_curve_order_plus_one();
        let der = valid_der(&[0x01], &high_s);
        let mut sig = der;
        sig.push(SIGHASH_ALL | SIGHASH_FORKID);
        assert_eq!(check_signature_encoding(&sig), Err(ScriptError::InvalidSignatureEncoding));
    }

    fn half_curve_order_plus_one() -> Vec<u8> {
        let mut half = half_curve_order();
        for i in (0..32).rev() {
            if half[i] == 0xff {
                half[i] = 0x00;
            } else {
                half[i] += 1;
                break;
            }
        }
        // Needs a leading 0x00 if the high bit is set, to stay a valid
        // (non-negative) DER integer.
        if half[0] & 0x80 != 0 {
            let mut v = vec![0x00];
            v.extend_from_slice(&half);
            v
        } else {
            half.to_vec()
        }
    }

    #[test]
    fn unrecognized_base_hash_type_rejected() {
        let mut sig = valid_der(&[0x01], &[0x01]);
        sig.push(0x04 | SIGHASH_FORKID);
        assert_eq!(check_signature_encoding(&sig), Err(ScriptError::InvalidSignatureEncoding));
    }

    #[test]
    fn anyonecanpay_combination_accepted() {
        let mut sig = valid_der(&[0x01], &[0x01]);
        sig.push(SIGHASH_ALL | SIGHASH_ANYONECANPAY | SIGHASH_FORKID);
        assert!(check_signature_encoding(&sig).is_ok());
    }

    #[test]
    fn truncated_der_rejected() {
        let sig = vec![0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, SIGHASH_ALL | SIGHASH_FORKID];
        assert_eq!(check_signature_encoding(&sig), Err(ScriptError::InvalidSignatureEncoding));
    }
}
