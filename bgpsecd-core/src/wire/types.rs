use bitflags::bitflags;

use super::WireError;

/// Wire protocol version this crate speaks (§6).
pub const PROTOCOL_VERSION: u16 = 3;

/// Closed set of PDU types (§6 catalog). Values match the wire byte exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PduType {
    Hello = 0,
    HelloResponse = 1,
    Goodbye = 2,
    VerifyV4Request = 3,
    VerifyV6Request = 4,
    SignRequest = 5,
    VerifyNotification = 6,
    SignNotification = 7,
    DeleteUpdate = 8,
    PeerChange = 9,
    SyncRequest = 10,
    Error = 11,
    RegisterSki = 13,
    SigtraGenerationRequest = 14,
    SigtraValidationRequest = 15,
    SigtraSignatureResponse = 16,
    SigtraValidationResponse = 17,
}

impl TryFrom<u8> for PduType {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, WireError> {
        use PduType::*;
        Ok(match value {
            0 => Hello,
            1 => HelloResponse,
            2 => Goodbye,
            3 => VerifyV4Request,
            4 => VerifyV6Request,
            5 => SignRequest,
            6 => VerifyNotification,
            7 => SignNotification,
            8 => DeleteUpdate,
            9 => PeerChange,
            10 => SyncRequest,
            11 => Error,
            13 => RegisterSki,
            14 => SigtraGenerationRequest,
            15 => SigtraValidationRequest,
            16 => SigtraSignatureResponse,
            17 => SigtraValidationResponse,
            other => return Err(WireError::UnknownType(other)),
        })
    }
}

bitflags! {
    /// Flag bits carried in verify requests (§6).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct VerifyFlags: u8 {
        const ROA     = 0b0000_0001;
        const BGPSEC  = 0b0000_0010;
        const ASPA    = 0b0000_1000;
        const RECEIPT = 0b1000_0000;
    }
}

/// `errorCode` values carried by `ERROR` PDUs (§6, §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    WrongVersion = 0,
    DuplicateProxyId = 1,
    InvalidPacket = 2,
    Internal = 3,
    AlgoNotSupported = 4,
    UpdateNotFound = 5,
}

/// `changeType` carried by `PEER_CHANGE` (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PeerChangeType {
    Remove = 0,
    Add = 1,
}

impl TryFrom<u8> for PeerChangeType {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, WireError> {
        match value {
            0 => Ok(PeerChangeType::Remove),
            1 => Ok(PeerChangeType::Add),
            _ => Err(WireError::MalformedBody("unknown peer change type")),
        }
    }
}
