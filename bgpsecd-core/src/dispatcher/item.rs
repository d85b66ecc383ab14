use std::time::Duration;

use crate::model::{ClientSlot, UpdateId};
use crate::wire::{PeerChangeType, VerifyFlags};

/// One tagged unit of work for the dispatcher (§4.7). Each item carries the
/// triggering session's slot so replies and notifications route back
/// correctly, and an `UpdateId` where the PDU that produced it referenced
/// one.
#[derive(Debug, Clone)]
pub enum WorkItem {
    Validate {
        slot: ClientSlot,
        update_id: UpdateId,
        flags: VerifyFlags,
        request_token: u32,
    },
    Sign {
        slot: ClientSlot,
        update_id: UpdateId,
        algorithm: u16,
        prepend_counter: u32,
        peer_as: u32,
    },
    Delete {
        slot: ClientSlot,
        update_id: UpdateId,
        keep_window: Duration,
    },
    PeerChange {
        slot: ClientSlot,
        change_type: PeerChangeType,
        peer_as: u32,
    },
    Sync {
        slot: ClientSlot,
    },
}
