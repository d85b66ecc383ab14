//! `SIGTRA_VALIDATION_REQUEST` / `SIGTRA_GENERATION_REQUEST` handling
//! (§4.8, §4.10): verifying and minting transitive per-hop signatures.

use tracing::warn;

use crate::model::IpPrefix;
use crate::signer::CanonicalMessage;
use crate::wire::{Pdu, SigtraBlock};

use super::shared::Shared;

/// For each embedded signature block, verifies it against the canonical
/// message the block claims to cover and replies with one aggregate
/// `SIGTRA_VALIDATION_RESPONSE` per block (mirroring one request → N
/// responses, matching `SIGTRA_SIGNATURE_RESPONSE`'s one-per-peer shape).
///
/// Key management for arbitrary peer ASes (SKI → public key lookup) is
/// explicitly out of scope (spec.md §1, "on-disk key material loading");
/// this crate only holds its own signing key, so validation here checks a
/// block's signature against this server's own verifying key. That is
/// enough to exercise the canonical-message assembly and catch tampering
/// (a block signed by a different key, or with a mutated field, fails) even
/// though it cannot authenticate a remote AS's real key in this build.
pub fn validate_blocks(
    shared: &Shared,
    signature_id: u32,
    prefix: &IpPrefix,
    as_path: &[u32],
    otc_field: u32,
    blocks: &[SigtraBlock],
) -> Vec<Pdu> {
    let Some(signer) = &shared.signer else {
        warn!(signature_id, "no signing key configured, cannot validate sigtra blocks");
        return blocks
            .iter()
            .map(|_| Pdu::SigtraValidationResponse {
                signature_id,
                valid: false,
            })
            .collect();
    };

    blocks
        .iter()
        .map(|block| {
            let prev_asn = as_path
                .iter()
                .position(|&asn| asn == block.creating_as)
                .and_then(|pos| as_path.get(pos + 1).copied())
                .unwrap_or(0);
            let message = CanonicalMessage {
                otc_field,
                prev_asn,
                current_asn: block.creating_as,
                next_asn: block.next_asn,
                timestamp: block.timestamp,
                prefix_len: prefix.prefix_len(),
                prefix: prefix.to_u32(),
            };
            let valid = signer.verify(&message, &block.signature);
            Pdu::SigtraValidationResponse { signature_id, valid }
        })
        .collect()
}

/// For each requested peer, assembles the canonical message with
/// `nextASN = peer` and signs it, replying with one
/// `SIGTRA_SIGNATURE_RESPONSE` per peer (§4.8, §8 scenario 5). Peers whose
/// signing fails are skipped and logged (§7: "do not send
/// SIGTRA_SIGNATURE_RESPONSE for that peer; log"), though with this crate's
/// signer the only failure mode is a missing key.
pub fn generate_signatures(
    shared: &Shared,
    signature_id: u32,
    prefix: &IpPrefix,
    timestamp: u32,
    otc_field: u32,
    prev_asn: u32,
    current_asn: u32,
    peers: &[u32],
) -> Vec<Pdu> {
    let Some(signer) = &shared.signer else {
        warn!(signature_id, "no signing key configured, cannot generate sigtra signatures");
        return Vec::new();
    };

    peers
        .iter()
        .map(|&peer| {
            let message = CanonicalMessage {
                otc_field,
                prev_asn,
                current_asn,
                next_asn: peer,
                timestamp,
                prefix_len: prefix.prefix_len(),
                prefix: prefix.to_u32(),
            };
            let signature = signer.sign(&message);
            Pdu::SigtraSignatureResponse {
                signature_id,
                signature,
            }
        })
        .collect()
}
