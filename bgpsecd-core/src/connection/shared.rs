use std::sync::Arc;
use std::time::Duration;

use crate::cache::{PathCache, UpdateCache};
use crate::dispatcher::Dispatcher;
use crate::proxy_map::ProxyMap;
use crate::queue::{SendItem, SendQueue};
use crate::session::SessionHandle;
use crate::signer::Signer;
use crate::wire::Pdu;

/// Everything a session task or the receive-queue worker needs to route a
/// PDU: the three caches-and-tables, the command dispatcher, the outbound
/// path, and the handful of config values the PDU switch (§4.8) consults.
/// Grouped behind `Arc` so every task shares one instance cheaply.
///
/// The receive queue is deliberately *not* a field here: it is what decides
/// whether a session task hands a PDU to `Shared` synchronously or via the
/// queue, so it lives one level up in [`super::ConnectionHandler`] — storing
/// it here would make building the receive queue's own worker circular
/// (its `process` closure needs a `Shared` to call into).
pub struct Shared {
    pub proxy_map: Arc<ProxyMap>,
    pub update_cache: Arc<UpdateCache>,
    pub path_cache: Arc<PathCache>,
    pub dispatcher: Arc<Dispatcher>,
    pub send_queue: Arc<SendQueue>,
    pub signer: Option<Arc<Signer>>,
    pub local_as: u32,
    pub default_keep_window: Duration,
    pub sync_after_conn_established: bool,
}

impl Shared {
    /// Delivers `pdu` to `destination` via the send queue (§4.4, §5: "sends
    /// must happen outside any cache lock; use the send queue"), unless the
    /// send queue is disabled, in which case it is written synchronously.
    pub async fn reply(&self, destination: &SessionHandle, pdu: Pdu) {
        if self
            .send_queue
            .push(SendItem {
                destination: destination.clone(),
                pdu,
            })
            .await
            .is_err()
        {
            tracing::warn!("send queue closed while routing a reply");
        }
    }

    /// Looks up the session bound to `slot` and replies to it, if any
    /// (the slot may have disconnected between request and reply).
    pub async fn reply_to_slot(&self, slot: crate::model::ClientSlot, pdu: Pdu) {
        if let Some(mapping) = self.proxy_map.get(slot) {
            if let Some(destination) = mapping.session {
                self.reply(&destination, pdu).await;
            }
        }
    }

    /// `broadcastPacket`: best-effort fan-out to every bound session,
    /// stopping at the first send failure (§4.8) — a dead send queue means
    /// shutdown is in progress, not that later sessions should be skipped
    /// silently, so the failure is logged once rather than retried.
    pub async fn broadcast_packet(&self, pdu: Pdu) {
        for (slot, destination) in self.proxy_map.bound_sessions() {
            if self
                .send_queue
                .push(SendItem {
                    destination,
                    pdu: pdu.clone(),
                })
                .await
                .is_err()
            {
                tracing::warn!(slot, "broadcast stopped: send queue closed");
                return;
            }
        }
    }
}
