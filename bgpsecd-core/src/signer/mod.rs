//! Transitive per-hop signer: canonical message layout plus ECDSA P-256
//! over SHA-256 (§4.10).

mod canonical;

pub use canonical::{CanonicalMessage, CANONICAL_MESSAGE_LEN};

use std::fs;
use std::path::Path;

use ecdsa::signature::{Signer as _, Verifier as _};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::pkcs8::DecodePrivateKey;

use crate::error::{CoreError, Result};

/// DER-encoded ECDSA P-256 signatures never exceed this many bytes; the
/// wire format reserves a fixed field of this size (§4.10, §6).
pub const MAX_SIGNATURE_LEN: usize = 72;

pub struct Signer {
    key: SigningKey,
}

impl Signer {
    pub fn from_pkcs8_pem(pem: &str) -> Result<Self> {
        let key = SigningKey::from_pkcs8_pem(pem).map_err(|e| CoreError::Signing(e.to_string()))?;
        Ok(Signer { key })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let pem = fs::read_to_string(path)?;
        Self::from_pkcs8_pem(&pem)
    }

    /// For tests and local runs without a provisioned key.
    pub fn generate() -> Self {
        Signer {
            key: SigningKey::random(&mut rand::rngs::OsRng),
        }
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        *self.key.verifying_key()
    }

    /// Signs the canonical message, returning DER bytes (≤ [`MAX_SIGNATURE_LEN`]).
    pub fn sign(&self, message: &CanonicalMessage) -> Vec<u8> {
        let signature: Signature = self.key.sign(&message.encode());
        signature.to_der().as_bytes().to_vec()
    }

    pub fn verify(&self, message: &CanonicalMessage, der_signature: &[u8]) -> bool {
        verify_with_key(&self.verifying_key(), message, der_signature)
    }
}

/// Verifies a DER signature against an arbitrary peer's verifying key, for
/// `SIGTRA_VALIDATION_REQUEST` blocks signed by other ASes (§4.8).
pub fn verify_with_key(key: &VerifyingKey, message: &CanonicalMessage, der_signature: &[u8]) -> bool {
    match Signature::from_der(der_signature) {
        Ok(signature) => key.verify(&message.encode(), &signature).is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_message() -> CanonicalMessage {
        CanonicalMessage {
            otc_field: 65001,
            prev_asn: 65001,
            current_asn: 65002,
            next_asn: 65010,
            timestamp: 1_700_000_000,
            prefix_len: 24,
            prefix: u32::from(std::net::Ipv4Addr::new(203, 0, 113, 0)),
        }
    }

    #[test]
    fn signature_verifies_under_the_signer_own_key() {
        let signer = Signer::generate();
        let message = sample_message();
        let signature = signer.sign(&message);
        assert!(signature.len() <= MAX_SIGNATURE_LEN);
        assert!(signer.verify(&message, &signature));
    }

    #[test]
    fn signature_fails_under_a_different_key() {
        let signer = Signer::generate();
        let other = Signer::generate();
        let message = sample_message();
        let signature = signer.sign(&message);
        assert!(!verify_with_key(&other.verifying_key(), &message, &signature));
    }

    #[test]
    fn tampering_with_the_message_invalidates_the_signature() {
        let signer = Signer::generate();
        let mut message = sample_message();
        let signature = signer.sign(&message);
        message.next_asn = 65020;
        assert!(!signer.verify(&message, &signature));
    }
}
