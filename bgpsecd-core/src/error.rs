use thiserror::Error;

use crate::wire::WireError;

/// Errors surfaced by the core to its caller (the binary, or a test harness).
///
/// One variant per row of the error-handling table: malformed input, a
/// session that skipped the handshake, a duplicate proxy registration, a
/// reference to an update the server never saw, cache allocation failure,
/// validator/signer failure, and configuration problems.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("wire protocol error: {0}")]
    Wire(#[from] WireError),

    #[error("handshake not completed on this session")]
    HandshakeMissing,

    #[error("duplicate proxy id {0:#010x}")]
    DuplicateProxyId(u32),

    #[error("a second HELLO was received on an already active session")]
    UnexpectedHello,

    #[error("update {0:#010x} not found")]
    UpdateNotFound(u32),

    #[error("proxy map exhausted, no free client slot")]
    ProxyMapFull,

    #[error("no mapping at slot {0}")]
    UnknownSlot(crate::model::ClientSlot),

    #[error("slot 0 is reserved and cannot be allocated")]
    ReservedSlot,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("signing error: {0}")]
    Signing(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
