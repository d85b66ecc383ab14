//! Wire codec: framed binary PDUs exchanged between a proxy and the server.
//!
//! Every PDU begins with the 8-byte common header (`type(1) | reserved(3) |
//! length(4)`, §4.1). [`PduCodec`] implements [`tokio_util::codec::Decoder`]
//! and [`Encoder`] so the connection handler drives a session by calling
//! `decode`/`encode` directly against the socket's read/write halves.

mod codec;
mod header;
mod pdu;
mod types;

pub use codec::PduCodec;
pub use header::{PduHeader, HEADER_LEN};
pub use pdu::{Pdu, SigtraBlock, VerifyNotificationFields, VerifyRequestFields, MAX_PATH_LEN, SKI_LEN};
pub use types::{ErrorCode, PeerChangeType, PduType, VerifyFlags, PROTOCOL_VERSION};

use thiserror::Error;

/// Frames larger than this are rejected with [`WireError::BadLength`] even if
/// the declared length is otherwise well-formed. Guards against a peer
/// claiming an absurd length and stalling the reader.
pub const MAX_FRAME_LEN: u32 = 64 * 1024;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum WireError {
    #[error("connection closed mid-frame")]
    ShortFrame,

    #[error("declared length {0} is smaller than the header for this type or exceeds the cap")]
    BadLength(u32),

    #[error("unknown pdu type {0}")]
    UnknownType(u8),

    #[error("malformed body: {0}")]
    MalformedBody(&'static str),
}
