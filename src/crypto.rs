//! Cryptographic collaborators injected into the virtual machine (spec §6).
//!
//! The VM never calls `sha2`/`ripemd`/`secp256k1` directly; it goes through
//! a `CryptoProvider` held by reference for the lifetime of the evaluation,
//! so tests can swap in a deterministic stub instead of real elliptic-curve
//! math (see [`StubCryptoProvider`]).

use crate::encoding::{check_signature_encoding, ParsedSignature};
use crate::hash;

/// The three primitive operations the VM's crypto operators need.
///
/// `verify_der_low_s` must return `false` rather than error on a
/// well-formed-but-non-matching signature; malformed input is rejected
/// earlier by [`crate::encoding`]'s checks, before a provider ever sees it.
pub trait CryptoProvider {
    fn sha256(&self, data: &[u8]) -> [u8; 32];
    fn sha1(&self, data: &[u8]) -> [u8; 20];
    fn ripemd160(&self, data: &[u8]) -> [u8; 20];
    fn hash160(&self, data: &[u8]) -> [u8; 20];
    fn hash256(&self, data: &[u8]) -> [u8; 32];

    /// Verifies `signature` (already known to be strict-DER low-S, per
    /// [`ParsedSignature`]) against `public_key` and `digest`.
    fn verify_der_low_s(&self, signature: &ParsedSignature<'_>, public_key: &[u8], digest: &[u8; 32]) -> bool;
}

/// The production provider: `sha2`/`ripemd` for hashing, `secp256k1` for
/// ECDSA verification.
#[derive(Debug, Default, Clone, Copy)]
pub struct Secp256k1CryptoProvider;

impl CryptoProvider for Secp256k1CryptoProvider {
    fn sha256(&self, data: &[u8]) -> [u8; 32] {
        hash::sha256(data)
    }

    fn sha1(&self, data: &[u8]) -> [u8; 20] {
        hash::sha1(data)
    }

    fn ripemd160(&self, data: &[u8]) -> [u8; 20] {
        hash::ripemd160(data)
    }

    fn hash160(&self, data: &[u8]) -> [u8; 20] {
        hash::hash160(data)
    }

    fn hash256(&self, data: &[u8]) -> [u8; 32] {
        hash::hash256(data)
    }

    fn verify_der_low_s(&self, signature: &ParsedSignature<'_>, public_key: &[u8], digest: &[u8; 32]) -> bool {
        use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1};

        let secp = Secp256k1::verification_only();

        let Ok(sig) = Signature::from_der(signature.der) else {
            return false;
        };
        let Ok(key) = PublicKey::from_slice(public_key) else {
            return false;
        };
        let Ok(message) = Message::from_digest_slice(digest) else {
            return false;
        };

        secp.verify_ecdsa(&message, &sig, &key).is_ok()
    }
}

/// Re-validates a signature's encoding and verifies it against `public_key`
/// and `digest` using `provider`. Operators call this rather than reaching
/// into `provider.verify_der_low_s` directly, since the encoding check and
/// the verification step always travel together (spec §4.1 steps 2–5).
pub fn verify_signature(
    provider: &dyn CryptoProvider,
    signature: &[u8],
    public_key: &[u8],
    digest: &[u8; 32],
) -> Result<bool, crate::error::ScriptError> {
    let parsed = check_signature_encoding(signature)?;
    crate::encoding::check_public_key_encoding(public_key)?;
    Ok(provider.verify_der_low_s(&parsed, public_key, digest))
}

/// A deterministic stand-in used in tests: `verify_der_low_s` returns
/// whatever was configured at construction, regardless of its arguments,
/// so `OP_CHECKSIG`/`OP_CHECKMULTISIG` scenarios can be driven without a
/// real keypair.
#[cfg(any(test, feature = "test-util"))]
#[derive(Debug, Clone, Copy)]
pub struct StubCryptoProvider {
    pub verifies: bool,
}

#[cfg(any(test, feature = "test-util"))]
impl CryptoProvider for StubCryptoProvider {
    fn sha256(&self, data: &[u8]) -> [u8; 32] {
        hash::sha256(data)
    }

    fn sha1(&self, data: &[u8]) -> [u8; 20] {
        hash::sha1(data)
    }

    fn ripemd160(&self, data: &[u8]) -> [u8; 20] {
        hash::ripemd160(data)
    }

    fn hash160(&self, data: &[u8]) -> [u8; 20] {
        hash::hash160(data)
    }

    fn hash256(&self, data: &[u8]) -> [u8; 32] {
        hash::hash256(data)
    }

    fn verify_der_low_s(&self, _signature: &ParsedSignature<'_>, _public_key: &[u8], _digest: &[u8; 32]) -> bool {
        self.verifies
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_provider_hashes_are_real() {
        let provider = StubCryptoProvider { verifies: true };
        assert_eq!(provider.sha256(b""), hash::sha256(b""));
        assert_eq!(provider.hash160(b"x"), hash::hash160(b"x"));
    }

    #[test]
    fn stub_provider_reports_configured_verdict() {
        let digest = [0u8; 32];
        let sig = {
            let mut s = vec![0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x01];
            s.push(0x41); // SIGHASH_ALL | SIGHASH_FORKID
            s
        };
        let mut key = vec![0x02];
        key.extend_from_slice(&[0xaa; 32]);

        let ok_provider = StubCryptoProvider { verifies: true };
        assert_eq!(verify_signature(&ok_provider, &sig, &key, &digest).unwrap(), true);

        let bad_provider = StubCryptoProvider { verifies: false };
        assert_eq!(verify_signature(&bad_provider, &sig, &key, &digest).unwrap(), false);
    }
}
