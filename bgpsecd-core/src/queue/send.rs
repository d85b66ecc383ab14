use crate::session::SessionHandle;
use crate::wire::Pdu;

use super::BoundedQueue;

/// An outbound PDU and the session it's destined for (§4.4).
#[derive(Clone)]
pub struct SendItem {
    pub destination: SessionHandle,
    pub pdu: Pdu,
}

pub type SendQueue = BoundedQueue<SendItem>;
