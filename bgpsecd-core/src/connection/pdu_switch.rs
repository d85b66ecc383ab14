//! The PDU switch a session reaches once the handshake is complete (§4.8).
//! Handshake (`HELLO`) and shutdown (`GOODBYE`) are session-level concerns
//! handled directly by [`super::session_task`]; everything else — the
//! application protocol — is decided here, either inline on the socket task
//! (when the receive queue is disabled) or from the receive-queue worker.

use std::time::Duration;

use tracing::{info, warn};

use crate::cache::{compute_path_id, compute_update_id};
use crate::dispatcher::WorkItem;
use crate::model::{AsPathType, AsRelationDirection, ClientSlot, SrxResult, TaggedVerdict, Verdict};
use crate::wire::{ErrorCode, Pdu, VerifyFlags, VerifyNotificationFields, VerifyRequestFields};

use super::as_path::derive_as_path;
use super::sigtra;
use super::shared::Shared;

/// Dispatches one PDU received on an active session. `slot` is the
/// session's bound client slot (never 0 here — the handshake already ran).
pub async fn handle_active_pdu(shared: &Shared, slot: ClientSlot, pdu: Pdu) {
    match pdu {
        Pdu::VerifyV4Request(fields) | Pdu::VerifyV6Request(fields) => {
            handle_verify(shared, slot, fields).await
        }
        Pdu::SignRequest {
            update_id,
            algorithm,
            prepend_counter,
            peer_as,
            ..
        } => handle_sign(shared, slot, update_id, algorithm, prepend_counter, peer_as).await,
        Pdu::DeleteUpdate {
            keep_window,
            update_id,
        } => {
            let keep_window = Duration::from_secs(keep_window as u64).max(shared.default_keep_window);
            let _ = shared
                .dispatcher
                .submit(WorkItem::Delete {
                    slot,
                    update_id: crate::model::UpdateId(update_id),
                    keep_window,
                })
                .await;
        }
        Pdu::PeerChange { change_type, peer_as } => {
            let _ = shared
                .dispatcher
                .submit(WorkItem::PeerChange {
                    slot,
                    change_type,
                    peer_as,
                })
                .await;
        }
        Pdu::SyncRequest => {
            let _ = shared.dispatcher.submit(WorkItem::Sync { slot }).await;
        }
        Pdu::SigtraValidationRequest {
            signature_id,
            prefix,
            as_path,
            otc_field,
            blocks,
        } => {
            let responses =
                sigtra::validate_blocks(shared, signature_id, &prefix, &as_path, otc_field, &blocks);
            for response in responses {
                shared.reply_to_slot(slot, response).await;
            }
        }
        Pdu::SigtraGenerationRequest {
            signature_id,
            prefix,
            timestamp,
            otc_field,
            prev_asn,
            current_asn,
            peers,
            ..
        } => {
            let responses = sigtra::generate_signatures(
                shared,
                signature_id,
                &prefix,
                timestamp,
                otc_field,
                prev_asn,
                current_asn,
                &peers,
            );
            for response in responses {
                shared.reply_to_slot(slot, response).await;
            }
        }
        Pdu::Hello { .. } | Pdu::Goodbye { .. } => {
            unreachable!("handshake/shutdown pdus are handled by the session task")
        }
        other => {
            warn!(?other, slot, "unexpected pdu type on an active session");
            shared
                .reply_to_slot(
                    slot,
                    Pdu::Error {
                        code: ErrorCode::InvalidPacket,
                    },
                )
                .await;
        }
    }
}

fn defaults_to_result(fields: &VerifyRequestFields) -> SrxResult {
    SrxResult {
        roa: TaggedVerdict::default_of(Verdict::from_wire(fields.roa_default)),
        bgpsec: TaggedVerdict::default_of(Verdict::from_wire(fields.bgpsec_default)),
        aspa: TaggedVerdict::default_of(Verdict::from_wire(fields.aspa_default)),
    }
}

async fn notify(shared: &Shared, slot: ClientSlot, update_id: u32, request_token: u32, result: SrxResult) {
    let result_type = if request_token != 0 {
        VerifyFlags::RECEIPT
    } else {
        VerifyFlags::empty()
    };
    let pdu = Pdu::VerifyNotification(VerifyNotificationFields {
        result_type,
        roa_result: result.roa.verdict.to_wire(),
        bgpsec_result: result.bgpsec.verdict.to_wire(),
        aspa_result: result.aspa.verdict.to_wire(),
        request_token,
        update_id,
    });
    shared.reply_to_slot(slot, pdu).await;
}

/// `VERIFY_V4_REQUEST` / `VERIFY_V6_REQUEST` (§4.8).
async fn handle_verify(shared: &Shared, slot: ClientSlot, fields: VerifyRequestFields) {
    let as_path_type = AsPathType::from_wire(fields.as_type);
    let direction = AsRelationDirection::from_wire(fields.as_rel_type);
    let as_path = derive_as_path(fields.bgpsec_data.as_deref(), fields.origin_as);
    let path_id = compute_path_id(&as_path, as_path_type);

    let initial_id = compute_update_id(fields.origin_as, &fields.prefix, fields.bgpsec_data.as_deref());
    let storage_id = shared.update_cache.find_storage_id(
        initial_id,
        &fields.prefix,
        fields.origin_as,
        fields.bgpsec_data.as_deref(),
    );
    if storage_id != initial_id {
        info!(?initial_id, resolved = ?storage_id, "updateid collision resolved");
    }

    let defaults = defaults_to_result(&fields);

    if shared.update_cache.contains(storage_id) {
        let Some((result, _path_id)) = shared.update_cache.get_result(storage_id, slot) else {
            return;
        };
        if result.diverges_from(&defaults) {
            notify(shared, slot, storage_id.0, fields.request_token, result).await;
        }
        return;
    }

    shared.update_cache.store_update(
        storage_id,
        slot,
        fields.prefix,
        fields.origin_as,
        defaults,
        fields.bgpsec_data.clone(),
        path_id,
    );
    shared
        .path_cache
        .store(path_id, defaults.aspa, as_path, as_path_type, direction);

    let mut remaining_flags = fields.flags;
    let mut result = defaults;
    if let Some((_entry, existing)) = shared.path_cache.lookup(path_id) {
        if existing.source == crate::model::VerdictSource::Validator {
            result = shared
                .update_cache
                .modify_result_with_aspa(storage_id, existing)
                .unwrap_or(result);
            remaining_flags.remove(VerifyFlags::ASPA);
        }
    }

    if remaining_flags.is_empty() {
        if result.diverges_from(&defaults) {
            notify(shared, slot, storage_id.0, fields.request_token, result).await;
        }
        return;
    }

    let _ = shared
        .dispatcher
        .submit(WorkItem::Validate {
            slot,
            update_id: storage_id,
            flags: remaining_flags,
            request_token: fields.request_token,
        })
        .await;
}

/// `SIGN_REQUEST` (§4.8).
async fn handle_sign(
    shared: &Shared,
    slot: ClientSlot,
    update_id: u32,
    algorithm: u16,
    prepend_counter: u32,
    peer_as: u32,
) {
    let update_id = crate::model::UpdateId(update_id);
    let Some(entry) = shared.update_cache.snapshot(update_id) else {
        shared
            .reply_to_slot(
                slot,
                Pdu::Error {
                    code: ErrorCode::UpdateNotFound,
                },
            )
            .await;
        shared.reply_to_slot(slot, Pdu::SyncRequest).await;
        return;
    };

    if let Some(bgpsec_data) = entry.bgpsec {
        shared
            .reply_to_slot(
                slot,
                Pdu::SignNotification {
                    update_id: update_id.0,
                    bgpsec_data,
                },
            )
            .await;
        return;
    }

    let _ = algorithm; // only one algorithm (ECDSA P-256) is supported; carried for wire fidelity
    let _ = shared
        .dispatcher
        .submit(WorkItem::Sign {
            slot,
            update_id,
            algorithm,
            prepend_counter,
            peer_as,
        })
        .await;
}
