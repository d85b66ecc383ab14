//! Per-connection handling: the `HELLO`/`GOODBYE` handshake-and-shutdown
//! state machine (§4.2) lives here directly; every other PDU is handed off
//! to [`super::pdu_switch`], either through the shared receive queue or
//! inline, depending on configuration (§4.4).
//!
//! The socket is driven with plain `AsyncRead`/`AsyncWrite` rather than
//! `tokio_util::codec::Framed`: [`PduCodec`] only needs its `Decoder`/
//! `Encoder` trait methods, so there is no reason to pull in a `Sink`/
//! `Stream` bridge for a protocol this small.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, info, warn};

use crate::model::ClientSlot;
use crate::proxy_map::ProxyMap;
use crate::queue::{ReceiveItem, ReceiveQueue};
use crate::session::{Session, SessionHandle, SessionState};
use crate::wire::{ErrorCode, Pdu, PduCodec, PROTOCOL_VERSION};

use super::pdu_switch::handle_active_pdu;
use super::shared::Shared;

/// Capacity of a session's outbound channel. Independent of the server-wide
/// send queue: this is just the hand-off from the send queue worker (or a
/// direct caller) to this connection's writer half.
const OUTBOUND_CHANNEL_CAPACITY: usize = 64;

const READ_CHUNK: usize = 4096;

/// Drives one accepted TCP connection end to end: handshake, the PDU read
/// loop, and teardown (clean `GOODBYE` or an unexpected close, §8 scenario
/// 6) once the socket or the outbound channel closes.
pub async fn run(
    shared: Arc<Shared>,
    receive_queue: Option<Arc<ReceiveQueue>>,
    stream: TcpStream,
    peer: SocketAddr,
) {
    let (mut reader, writer) = stream.into_split();
    let (tx, rx) = mpsc::channel::<Pdu>(OUTBOUND_CHANNEL_CAPACITY);
    let handle = SessionHandle::new(tx);
    let mut session = Session::new(handle.clone());

    let writer_task = tokio::spawn(write_loop(writer, rx));

    let mut codec = PduCodec::new();
    let mut buf = BytesMut::with_capacity(READ_CHUNK);
    let mut chunk = vec![0u8; READ_CHUNK];

    'session: loop {
        loop {
            match codec.decode(&mut buf) {
                Ok(Some(pdu)) => {
                    if !dispatch_inbound(&shared, &receive_queue, &mut session, pdu, &handle).await {
                        break 'session;
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    warn!(%peer, %err, "malformed pdu, closing session");
                    let _ = handle.send(Pdu::Error { code: ErrorCode::InvalidPacket }).await;
                    let _ = handle.send(Pdu::Goodbye { keep_window: 0 }).await;
                    break 'session;
                }
            }
        }

        match reader.read(&mut chunk).await {
            Ok(0) => {
                debug!(%peer, "connection closed without a goodbye");
                break;
            }
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            Err(err) => {
                warn!(%peer, %err, "read error, closing session");
                break;
            }
        }
    }

    drop(handle);
    let _ = writer_task.await;
    finalize(&shared, &session).await;
}

async fn write_loop(mut writer: tokio::net::tcp::OwnedWriteHalf, mut rx: mpsc::Receiver<Pdu>) {
    let mut codec = PduCodec::new();
    let mut out = BytesMut::new();
    while let Some(pdu) = rx.recv().await {
        out.clear();
        if let Err(err) = codec.encode(pdu, &mut out) {
            warn!(%err, "failed to encode outbound pdu");
            continue;
        }
        if let Err(err) = writer.write_all(&out).await {
            debug!(%err, "write failed, peer is gone");
            break;
        }
    }
}

/// Handles one inbound PDU. Returns `false` when the session loop should
/// stop reading (protocol violation already answered, or `GOODBYE` seen).
async fn dispatch_inbound(
    shared: &Shared,
    receive_queue: &Option<Arc<ReceiveQueue>>,
    session: &mut Session,
    pdu: Pdu,
    handle: &SessionHandle,
) -> bool {
    match pdu {
        Pdu::Hello { version, proxy_id, .. } => handle_hello(shared, session, version, proxy_id, handle).await,
        Pdu::Goodbye { .. } => {
            handle_goodbye(shared, session).await;
            false
        }
        other => {
            if session.require_active().is_err() {
                warn!(slot = session.slot(), "pdu received before handshake completed");
                let _ = handle.send(Pdu::Error { code: ErrorCode::InvalidPacket }).await;
                let _ = handle.send(Pdu::Goodbye { keep_window: 0 }).await;
                return false;
            }
            let slot = session.slot();
            match receive_queue {
                Some(queue) => {
                    if queue.push(ReceiveItem { slot, pdu: other }).await.is_err() {
                        warn!(slot, "receive queue closed, dropping session");
                        return false;
                    }
                }
                None => handle_active_pdu(shared, slot, other).await,
            }
            true
        }
    }
}

/// `HELLO` (§4.2, §4.3): resolve or allocate a slot, bind the proxy mapping,
/// complete the handshake, and reply. A second `HELLO` on an already-active
/// session, a version mismatch, or a mapping conflict each end the session
/// with an `ERROR` + `GOODBYE` pair instead of silently ignoring the PDU.
async fn handle_hello(
    shared: &Shared,
    session: &mut Session,
    version: u16,
    proxy_id: u32,
    handle: &SessionHandle,
) -> bool {
    if session.state() != SessionState::Accepted {
        warn!(proxy_id, "unexpected hello on a session past the handshake");
        let _ = handle.send(Pdu::Error { code: ErrorCode::InvalidPacket }).await;
        let _ = handle.send(Pdu::Goodbye { keep_window: 0 }).await;
        return false;
    }
    if version != PROTOCOL_VERSION {
        warn!(proxy_id, version, "hello with unsupported protocol version");
        let _ = handle.send(Pdu::Error { code: ErrorCode::WrongVersion }).await;
        let _ = handle.send(Pdu::Goodbye { keep_window: 0 }).await;
        return false;
    }

    let slot = resolve_slot(&shared.proxy_map, proxy_id);
    let Some(slot) = slot else {
        warn!(proxy_id, "proxy map exhausted, rejecting hello");
        let _ = handle.send(Pdu::Error { code: ErrorCode::Internal }).await;
        let _ = handle.send(Pdu::Goodbye { keep_window: 0 }).await;
        return false;
    };

    if let Err(err) = shared.proxy_map.add_mapping(proxy_id, slot, Some(handle.clone()), true) {
        warn!(proxy_id, slot, %err, "hello rejected by proxy map");
        let _ = handle.send(Pdu::Error { code: ErrorCode::DuplicateProxyId }).await;
        let _ = handle.send(Pdu::Goodbye { keep_window: 0 }).await;
        return false;
    }

    if session.complete_handshake(slot, proxy_id).is_err() {
        warn!(proxy_id, slot, "handshake state transition rejected");
        let _ = handle.send(Pdu::Error { code: ErrorCode::Internal }).await;
        return false;
    }

    info!(proxy_id, slot, "proxy connected");
    let _ = handle.send(Pdu::HelloResponse { proxy_id }).await;
    if shared.sync_after_conn_established {
        let _ = handle.send(Pdu::SyncRequest).await;
    }
    true
}

/// `findClientID` then `createClientID` (§4.3): reuse a pre-configured or
/// previously crashed slot for this `proxyID` before handing out a fresh
/// one.
fn resolve_slot(proxy_map: &ProxyMap, proxy_id: u32) -> Option<ClientSlot> {
    let existing = proxy_map.find_client_id(proxy_id);
    if existing != 0 {
        return Some(existing);
    }
    let created = proxy_map.create_client_id();
    (created != 0).then_some(created)
}

/// `GOODBYE` (§4.2): orderly shutdown. The outbound channel has already
/// drained everything queued before this PDU arrived, since PDUs for one
/// session are processed in order.
async fn handle_goodbye(shared: &Shared, session: &mut Session) {
    if session.begin_goodbye().is_err() {
        return;
    }
    if session.slot() != 0 {
        info!(slot = session.slot(), "proxy said goodbye");
        deactivate(shared, session.slot(), false).await;
    }
    session.mark_closed();
}

/// Runs once the read loop exits, for whichever reason. A session that
/// already reached `Closed` via `GOODBYE` has already been deactivated;
/// anything else reaching here (EOF, read error, a rejected handshake) is
/// the crash path (§8 scenario 6): the slot is kept for `default_keep_window`
/// in case the same proxy reconnects.
async fn finalize(shared: &Shared, session: &Session) {
    if session.slot() == 0 || session.state() == SessionState::Closed {
        return;
    }
    warn!(slot = session.slot(), "connection lost without a goodbye");
    deactivate(shared, session.slot(), true).await;
}

async fn deactivate(shared: &Shared, slot: ClientSlot, crashed: bool) {
    match shared.proxy_map.deactivate(slot, crashed, shared.default_keep_window) {
        Ok(outcome) => shared.update_cache.unregister_client_id(slot, outcome.grace_period),
        Err(err) => warn!(slot, %err, "deactivate failed"),
    }
}
