//! Command dispatcher: serializes validation and signing work (§4.7).

mod item;

pub use item::WorkItem;

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cache::{PathCache, UpdateCache};
use crate::model::{TaggedVerdict, VerdictSource};
use crate::proxy_map::ProxyMap;
use crate::queue::{BoundedQueue, QueueClosed, SendItem, SendQueue};
use crate::signer::{CanonicalMessage, Signer};
use crate::validators::{AspaValidator, BgpsecValidator, OriginValidator};
use crate::wire::{Pdu, VerifyFlags, VerifyNotificationFields};

/// Everything the dispatcher worker needs, grouped so `spawn` doesn't take
/// a dozen loose parameters.
pub struct DispatcherDeps {
    pub update_cache: Arc<UpdateCache>,
    pub path_cache: Arc<PathCache>,
    pub proxy_map: Arc<ProxyMap>,
    pub origin: Arc<dyn OriginValidator>,
    pub bgpsec: Arc<dyn BgpsecValidator>,
    pub aspa: Arc<dyn AspaValidator>,
    pub signer: Arc<Signer>,
    pub send_queue: Arc<SendQueue>,
    pub local_as: u32,
}

/// Handle producers use to enqueue work; the consuming task runs in the
/// background for the lifetime of the server.
pub struct Dispatcher {
    queue: BoundedQueue<WorkItem>,
}

impl Dispatcher {
    pub fn spawn(
        capacity: usize,
        token: CancellationToken,
        deps: DispatcherDeps,
    ) -> (Self, JoinHandle<()>) {
        let deps = Arc::new(deps);
        let (queue, handle) = BoundedQueue::spawn(capacity, token, move |item: WorkItem| {
            let deps = deps.clone();
            async move { process(item, &deps).await }
        });
        (Dispatcher { queue }, handle)
    }

    /// Items submitted here for the same session are processed in FIFO
    /// order; items from different sessions may interleave (§4.7, §5).
    pub async fn submit(&self, item: WorkItem) -> Result<(), QueueClosed> {
        self.queue.push(item).await
    }
}

fn unix_now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

async fn process(item: WorkItem, deps: &DispatcherDeps) {
    match item {
        WorkItem::Validate {
            slot,
            update_id,
            flags,
            request_token,
        } => process_validate(slot, update_id, flags, request_token, deps).await,
        WorkItem::Sign {
            slot,
            update_id,
            prepend_counter: _,
            peer_as,
            ..
        } => process_sign(slot, update_id, peer_as, deps).await,
        WorkItem::Delete {
            update_id,
            slot,
            keep_window,
        } => deps.update_cache.remove_listener(update_id, slot, keep_window),
        WorkItem::PeerChange { slot, change_type, peer_as } => {
            info!(slot, ?change_type, peer_as, "peer change acknowledged");
        }
        WorkItem::Sync { slot } => {
            info!(slot, "sync requested");
        }
    }
}

async fn process_validate(
    slot: crate::model::ClientSlot,
    update_id: crate::model::UpdateId,
    flags: VerifyFlags,
    request_token: u32,
    deps: &DispatcherDeps,
) {
    let Some(entry) = deps.update_cache.snapshot(update_id) else {
        warn!(?update_id, "validate requested for unknown update");
        return;
    };
    let mut result = entry.result;

    if flags.contains(VerifyFlags::ROA) {
        let verdict = deps.origin.validate_origin(&entry.prefix, entry.origin_as);
        result.roa = TaggedVerdict::from_validator(verdict);
    }
    if flags.contains(VerifyFlags::BGPSEC) {
        let verdict = match &entry.bgpsec {
            Some(blob) => deps
                .bgpsec
                .validate_bgpsec(blob, &entry.prefix, entry.origin_as, deps.local_as),
            None => crate::model::Verdict::Undefined,
        };
        result.bgpsec = TaggedVerdict::from_validator(verdict);
    }
    if flags.contains(VerifyFlags::ASPA) {
        if let Some((path_entry, existing)) = deps.path_cache.lookup(entry.path_id) {
            let verdict = if existing.source == VerdictSource::Validator {
                existing
            } else {
                let computed = deps.aspa.validate_aspa(&path_entry.as_path, path_entry.direction);
                let tagged = TaggedVerdict::from_validator(computed);
                deps.path_cache.set_verdict(entry.path_id, tagged);
                tagged
            };
            result.aspa = verdict;
        }
    }

    let previous = deps
        .update_cache
        .update_result(update_id, result)
        .unwrap_or(entry.result);

    if previous.diverges_from(&result) {
        notify_listeners(slot, update_id, request_token, result, deps).await;
    }
}

async fn notify_listeners(
    triggering_slot: crate::model::ClientSlot,
    update_id: crate::model::UpdateId,
    request_token: u32,
    result: crate::model::SrxResult,
    deps: &DispatcherDeps,
) {
    for listener in deps.update_cache.listeners(update_id) {
        let Some(mapping) = deps.proxy_map.get(listener) else {
            continue;
        };
        let Some(destination) = mapping.session else {
            continue;
        };
        let is_trigger = listener == triggering_slot;
        let token = if is_trigger { request_token } else { 0 };
        let result_type = if token != 0 {
            VerifyFlags::RECEIPT
        } else {
            VerifyFlags::empty()
        };
        let pdu = Pdu::VerifyNotification(VerifyNotificationFields {
            result_type,
            roa_result: result.roa.verdict.to_wire(),
            bgpsec_result: result.bgpsec.verdict.to_wire(),
            aspa_result: result.aspa.verdict.to_wire(),
            request_token: token,
            update_id: update_id.0,
        });
        if deps
            .send_queue
            .push(SendItem { destination, pdu })
            .await
            .is_err()
        {
            warn!(listener, "send queue closed while notifying listener");
        }
    }
}

async fn process_sign(
    slot: crate::model::ClientSlot,
    update_id: crate::model::UpdateId,
    peer_as: u32,
    deps: &DispatcherDeps,
) {
    let Some(entry) = deps.update_cache.snapshot(update_id) else {
        warn!(?update_id, "sign requested for unknown update");
        return;
    };
    let message = CanonicalMessage {
        otc_field: entry.origin_as,
        prev_asn: deps.local_as,
        current_asn: peer_as,
        next_asn: peer_as,
        timestamp: unix_now(),
        prefix_len: entry.prefix.prefix_len(),
        prefix: entry.prefix.to_u32(),
    };
    let signature = Bytes::from(deps.signer.sign(&message));
    deps.update_cache.set_bgpsec(update_id, signature.clone());

    let Some(mapping) = deps.proxy_map.get(slot) else {
        return;
    };
    let Some(destination) = mapping.session else {
        return;
    };
    let pdu = Pdu::SignNotification {
        update_id: update_id.0,
        bgpsec_data: signature,
    };
    if deps
        .send_queue
        .push(SendItem { destination, pdu })
        .await
        .is_err()
    {
        warn!(slot, "send queue closed while delivering sign notification");
    }
}
