use crate::model::ClientSlot;
use crate::wire::Pdu;

use super::BoundedQueue;

/// An inbound PDU, copied off the socket and tagged with the session it
/// arrived on, queued for the dispatcher (§4.4).
#[derive(Debug, Clone)]
pub struct ReceiveItem {
    pub slot: ClientSlot,
    pub pdu: Pdu,
}

pub type ReceiveQueue = BoundedQueue<ReceiveItem>;
