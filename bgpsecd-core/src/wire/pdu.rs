use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::model::IpPrefix;

use super::header::{PduHeader, HEADER_LEN};
use super::types::{ErrorCode, PeerChangeType, PduType, VerifyFlags};
use super::WireError;

/// SKI (subject key identifier) length in bytes, fixed by the protocol.
pub const SKI_LEN: usize = 20;
/// Maximum DER-encoded ECDSA P-256 signature length the wire format reserves.
pub const SIGNATURE_FIELD_LEN: usize = 72;
/// AS-path / peer list arrays are capped at 16 entries on the wire.
pub const MAX_PATH_LEN: usize = 16;

/// Fields common to `VERIFY_V4_REQUEST` and `VERIFY_V6_REQUEST` (§6); the
/// two PDU types differ only in the width of the prefix address, so the
/// address itself lives in [`IpPrefix`] rather than being duplicated here.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifyRequestFields {
    pub flags: VerifyFlags,
    pub as_type: u8,
    pub as_rel_type: u8,
    pub roa_default: u8,
    pub bgpsec_default: u8,
    pub aspa_default: u8,
    pub request_token: u32,
    pub prefix: IpPrefix,
    pub origin_as: u32,
    pub bgpsec_data: Option<Bytes>,
}

/// Fields of `VERIFY_NOTIFICATION` (§6, §8 invariant 6: `requestToken != 0`
/// implies the RECEIPT flag is set in `result_type`).
#[derive(Debug, Clone, PartialEq)]
pub struct VerifyNotificationFields {
    pub result_type: VerifyFlags,
    pub roa_result: u8,
    pub bgpsec_result: u8,
    pub aspa_result: u8,
    pub request_token: u32,
    pub update_id: u32,
}

/// One embedded transitive-signature block inside a SIGTRA validation
/// request, or produced by a generation request (§4.10).
#[derive(Debug, Clone, PartialEq)]
pub struct SigtraBlock {
    pub id: u8,
    pub signature: Vec<u8>,
    pub timestamp: u32,
    pub ski: [u8; SKI_LEN],
    pub creating_as: u32,
    pub next_asn: u32,
}

/// A decoded (or to-be-encoded) PDU, tagged with its wire type.
#[derive(Debug, Clone, PartialEq)]
pub enum Pdu {
    Hello {
        version: u16,
        proxy_id: u32,
        asn: u32,
        ski: [u8; SKI_LEN],
        peer_as: Vec<u32>,
    },
    HelloResponse {
        proxy_id: u32,
    },
    Goodbye {
        keep_window: u16,
    },
    VerifyV4Request(VerifyRequestFields),
    VerifyV6Request(VerifyRequestFields),
    SignRequest {
        update_id: u32,
        algorithm: u16,
        block_type: u8,
        prepend_counter: u32,
        peer_as: u32,
    },
    VerifyNotification(VerifyNotificationFields),
    SignNotification {
        update_id: u32,
        bgpsec_data: Bytes,
    },
    DeleteUpdate {
        keep_window: u16,
        update_id: u32,
    },
    PeerChange {
        change_type: PeerChangeType,
        peer_as: u32,
    },
    SyncRequest,
    Error {
        code: ErrorCode,
    },
    RegisterSki {
        proxy_id: u32,
        ski: [u8; SKI_LEN],
    },
    SigtraGenerationRequest {
        signature_id: u32,
        prefix: IpPrefix,
        as_path: Vec<u32>,
        origin_as: u32,
        timestamp: u32,
        otc_field: u32,
        prev_asn: u32,
        current_asn: u32,
        peers: Vec<u32>,
    },
    SigtraValidationRequest {
        signature_id: u32,
        prefix: IpPrefix,
        as_path: Vec<u32>,
        otc_field: u32,
        blocks: Vec<SigtraBlock>,
    },
    SigtraSignatureResponse {
        signature_id: u32,
        signature: Vec<u8>,
    },
    SigtraValidationResponse {
        signature_id: u32,
        valid: bool,
    },
}

fn put_reserved(buf: &mut BytesMut, n: usize) {
    buf.put_bytes(0, n);
}

fn put_ski(buf: &mut BytesMut, ski: &[u8; SKI_LEN]) {
    buf.put_slice(ski);
}

fn get_ski(buf: &mut impl Buf) -> Result<[u8; SKI_LEN], WireError> {
    if buf.remaining() < SKI_LEN {
        return Err(WireError::MalformedBody("truncated ski"));
    }
    let mut ski = [0u8; SKI_LEN];
    buf.copy_to_slice(&mut ski);
    Ok(ski)
}

fn put_prefix(buf: &mut BytesMut, prefix: &IpPrefix) {
    match prefix {
        IpPrefix::V4(n) => buf.put_slice(&n.addr().octets()),
        IpPrefix::V6(n) => buf.put_slice(&n.addr().octets()),
    }
}

fn put_u32_list(buf: &mut BytesMut, items: &[u32], cap: usize) {
    for i in 0..cap {
        buf.put_u32(items.get(i).copied().unwrap_or(0));
    }
}

fn get_u32_list(
    buf: &mut impl Buf,
    count: usize,
    cap: usize,
) -> Result<Vec<u32>, WireError> {
    if count > cap {
        return Err(WireError::MalformedBody("path/peer list longer than wire cap"));
    }
    if buf.remaining() < cap * 4 {
        return Err(WireError::MalformedBody("truncated path/peer list"));
    }
    let mut out = Vec::with_capacity(count);
    for i in 0..cap {
        let v = buf.get_u32();
        if i < count {
            out.push(v);
        }
    }
    Ok(out)
}

impl Pdu {
    pub fn pdu_type(&self) -> PduType {
        match self {
            Pdu::Hello { .. } => PduType::Hello,
            Pdu::HelloResponse { .. } => PduType::HelloResponse,
            Pdu::Goodbye { .. } => PduType::Goodbye,
            Pdu::VerifyV4Request(_) => PduType::VerifyV4Request,
            Pdu::VerifyV6Request(_) => PduType::VerifyV6Request,
            Pdu::SignRequest { .. } => PduType::SignRequest,
            Pdu::VerifyNotification(_) => PduType::VerifyNotification,
            Pdu::SignNotification { .. } => PduType::SignNotification,
            Pdu::DeleteUpdate { .. } => PduType::DeleteUpdate,
            Pdu::PeerChange { .. } => PduType::PeerChange,
            Pdu::SyncRequest => PduType::SyncRequest,
            Pdu::Error { .. } => PduType::Error,
            Pdu::RegisterSki { .. } => PduType::RegisterSki,
            Pdu::SigtraGenerationRequest { .. } => PduType::SigtraGenerationRequest,
            Pdu::SigtraValidationRequest { .. } => PduType::SigtraValidationRequest,
            Pdu::SigtraSignatureResponse { .. } => PduType::SigtraSignatureResponse,
            Pdu::SigtraValidationResponse { .. } => PduType::SigtraValidationResponse,
        }
    }

    /// Encodes this PDU, header included, to a freshly allocated buffer.
    pub fn encode(&self) -> BytesMut {
        let mut body = BytesMut::new();
        self.encode_body(&mut body);
        let length = (HEADER_LEN + body.len()) as u32;
        let mut out = BytesMut::with_capacity(length as usize);
        PduHeader {
            pdu_type: self.pdu_type() as u8,
            length,
        }
        .encode(&mut out);
        out.extend_from_slice(&body);
        out
    }

    fn encode_body(&self, buf: &mut BytesMut) {
        match self {
            Pdu::Hello {
                version,
                proxy_id,
                asn,
                ski,
                peer_as,
            } => {
                buf.put_u16(*version);
                put_reserved(buf, 1);
                put_reserved(buf, 4);
                buf.put_u32(*proxy_id);
                buf.put_u32(*asn);
                // ski_one..five as 5 x u32, same 20 bytes as a flat SKI.
                put_ski(buf, ski);
                buf.put_u32(peer_as.len() as u32);
                for p in peer_as {
                    buf.put_u32(*p);
                }
            }
            Pdu::HelloResponse { proxy_id } => {
                put_reserved(buf, 1);
                put_reserved(buf, 4);
                buf.put_u32(*proxy_id);
            }
            Pdu::Goodbye { keep_window } => {
                buf.put_u16(*keep_window);
                put_reserved(buf, 1);
                put_reserved(buf, 4);
            }
            Pdu::VerifyV4Request(f) | Pdu::VerifyV6Request(f) => {
                buf.put_u8(f.flags.bits());
                put_reserved(buf, 1); // roaResSrc
                put_reserved(buf, 1); // bgpsecResSrc
                put_reserved(buf, 1); // aspaResSrc
                put_reserved(buf, 1); // reserved8
                buf.put_u8(f.as_type);
                buf.put_u8(f.as_rel_type);
                buf.put_u8(f.roa_default);
                buf.put_u8(f.bgpsec_default);
                put_reserved(buf, 1); // traDefRes
                buf.put_u8(f.aspa_default);
                buf.put_u8(f.prefix.prefix_len());
                buf.put_u32(f.request_token);
                put_prefix(buf, &f.prefix);
                buf.put_u32(f.origin_as);
                let bgpsec = f.bgpsec_data.as_deref().unwrap_or(&[]);
                buf.put_u32(bgpsec.len() as u32);
                buf.put_slice(bgpsec);
            }
            Pdu::SignRequest {
                update_id,
                algorithm,
                block_type,
                prepend_counter,
                peer_as,
            } => {
                buf.put_u16(*algorithm);
                buf.put_u8(*block_type);
                put_reserved(buf, 4);
                buf.put_u32(*update_id);
                buf.put_u32(*prepend_counter);
                buf.put_u32(*peer_as);
            }
            Pdu::VerifyNotification(f) => {
                buf.put_u8(f.result_type.bits());
                buf.put_u8(f.roa_result);
                buf.put_u8(f.bgpsec_result);
                buf.put_u8(f.aspa_result);
                put_reserved(buf, 1); // tranResult
                put_reserved(buf, 1); // reserved8
                put_reserved(buf, 2); // zero16
                buf.put_u32(f.request_token);
                buf.put_u32(f.update_id);
            }
            Pdu::SignNotification {
                update_id,
                bgpsec_data,
            } => {
                put_reserved(buf, 1);
                put_reserved(buf, 4);
                buf.put_u32(*update_id);
                buf.put_u32(bgpsec_data.len() as u32);
                buf.put_slice(bgpsec_data);
            }
            Pdu::DeleteUpdate {
                keep_window,
                update_id,
            } => {
                buf.put_u16(*keep_window);
                put_reserved(buf, 1);
                put_reserved(buf, 4);
                buf.put_u32(*update_id);
            }
            Pdu::PeerChange {
                change_type,
                peer_as,
            } => {
                put_reserved(buf, 2);
                buf.put_u8(*change_type as u8);
                put_reserved(buf, 4);
                buf.put_u32(*peer_as);
            }
            Pdu::SyncRequest => {
                put_reserved(buf, 1);
                put_reserved(buf, 4);
            }
            Pdu::Error { code } => {
                buf.put_u16(*code as u16);
                put_reserved(buf, 1);
                put_reserved(buf, 4);
            }
            Pdu::RegisterSki { proxy_id, ski } => {
                buf.put_u32(*proxy_id);
                put_ski(buf, ski);
            }
            Pdu::SigtraGenerationRequest {
                signature_id,
                prefix,
                as_path,
                origin_as,
                timestamp,
                otc_field,
                prev_asn,
                current_asn,
                peers,
            } => {
                buf.put_u32(*signature_id);
                buf.put_u8(prefix.prefix_len());
                put_prefix(buf, prefix);
                buf.put_u8(as_path.len() as u8);
                put_u32_list(buf, as_path, MAX_PATH_LEN);
                buf.put_u32(*origin_as);
                buf.put_u32(*timestamp);
                buf.put_u32(*otc_field);
                buf.put_u32(*prev_asn);
                buf.put_u32(*current_asn);
                buf.put_u8(peers.len() as u8);
                put_u32_list(buf, peers, MAX_PATH_LEN);
            }
            Pdu::SigtraValidationRequest {
                signature_id,
                prefix,
                as_path,
                otc_field,
                blocks,
            } => {
                buf.put_u32(*signature_id);
                buf.put_u8(blocks.len() as u8);
                buf.put_u8(prefix.prefix_len());
                put_prefix(buf, prefix);
                buf.put_u8(as_path.len() as u8);
                put_u32_list(buf, as_path, MAX_PATH_LEN);
                buf.put_u32(*otc_field);
                for block in blocks {
                    encode_sigtra_block(buf, block);
                }
            }
            Pdu::SigtraSignatureResponse {
                signature_id,
                signature,
            } => {
                buf.put_u32(*signature_id);
                buf.put_u32(signature.len() as u32);
                let mut field = [0u8; SIGNATURE_FIELD_LEN];
                let n = signature.len().min(SIGNATURE_FIELD_LEN);
                field[..n].copy_from_slice(&signature[..n]);
                buf.put_slice(&field);
            }
            Pdu::SigtraValidationResponse {
                signature_id,
                valid,
            } => {
                buf.put_u32(*signature_id);
                buf.put_u8(*valid as u8);
            }
        }
    }

    /// Decodes a PDU body (the bytes after the 8-byte header) given its
    /// already-parsed `pdu_type`. `is_v6` distinguishes the otherwise
    /// identical verify-request bodies.
    pub fn decode(pdu_type: PduType, mut body: Bytes) -> Result<Pdu, WireError> {
        let buf = &mut body;
        Ok(match pdu_type {
            PduType::Hello => {
                require(buf, 2 + 1 + 4 + 4 + 4 + SKI_LEN + 4)?;
                let version = buf.get_u16();
                buf.advance(1 + 4);
                let proxy_id = buf.get_u32();
                let asn = buf.get_u32();
                let ski = get_ski(buf)?;
                let no_peers = buf.get_u32() as usize;
                if buf.remaining() < no_peers * 4 {
                    return Err(WireError::MalformedBody("truncated hello peer list"));
                }
                let mut peer_as = Vec::with_capacity(no_peers);
                for _ in 0..no_peers {
                    peer_as.push(buf.get_u32());
                }
                Pdu::Hello {
                    version,
                    proxy_id,
                    asn,
                    ski,
                    peer_as,
                }
            }
            PduType::HelloResponse => {
                require(buf, 1 + 4 + 4)?;
                buf.advance(1 + 4);
                let proxy_id = buf.get_u32();
                Pdu::HelloResponse { proxy_id }
            }
            PduType::Goodbye => {
                require(buf, 2 + 1 + 4)?;
                let keep_window = buf.get_u16();
                buf.advance(1 + 4);
                Pdu::Goodbye { keep_window }
            }
            PduType::VerifyV4Request | PduType::VerifyV6Request => {
                let addr_len = if pdu_type == PduType::VerifyV4Request { 4 } else { 16 };
                require(buf, 8 + 4 + addr_len + 4 + 4)?;
                let flags = VerifyFlags::from_bits_truncate(buf.get_u8());
                buf.advance(4); // roaResSrc, bgpsecResSrc, aspaResSrc, reserved8
                let as_type = buf.get_u8();
                let as_rel_type = buf.get_u8();
                let roa_default = buf.get_u8();
                let bgpsec_default = buf.get_u8();
                buf.advance(1); // traDefRes
                let aspa_default = buf.get_u8();
                let prefix_len = buf.get_u8();
                let request_token = buf.get_u32();
                let prefix = if addr_len == 4 {
                    let mut octets = [0u8; 4];
                    buf.copy_to_slice(&mut octets);
                    IpPrefix::v4(Ipv4Addr::from(octets), prefix_len)
                } else {
                    let mut octets = [0u8; 16];
                    buf.copy_to_slice(&mut octets);
                    IpPrefix::v6(Ipv6Addr::from(octets), prefix_len)
                }
                .ok_or(WireError::MalformedBody("invalid prefix length"))?;
                let origin_as = buf.get_u32();
                if buf.remaining() < 4 {
                    return Err(WireError::MalformedBody("truncated bgpsec length"));
                }
                let bgpsec_len = buf.get_u32() as usize;
                if buf.remaining() < bgpsec_len {
                    return Err(WireError::MalformedBody("truncated bgpsec data"));
                }
                let bgpsec_data = if bgpsec_len > 0 {
                    Some(buf.copy_to_bytes(bgpsec_len))
                } else {
                    None
                };
                let fields = VerifyRequestFields {
                    flags,
                    as_type,
                    as_rel_type,
                    roa_default,
                    bgpsec_default,
                    aspa_default,
                    request_token,
                    prefix,
                    origin_as,
                    bgpsec_data,
                };
                if pdu_type == PduType::VerifyV4Request {
                    Pdu::VerifyV4Request(fields)
                } else {
                    Pdu::VerifyV6Request(fields)
                }
            }
            PduType::SignRequest => {
                require(buf, 2 + 1 + 4 + 4 + 4 + 4)?;
                let algorithm = buf.get_u16();
                let block_type = buf.get_u8();
                buf.advance(4);
                let update_id = buf.get_u32();
                let prepend_counter = buf.get_u32();
                let peer_as = buf.get_u32();
                Pdu::SignRequest {
                    update_id,
                    algorithm,
                    block_type,
                    prepend_counter,
                    peer_as,
                }
            }
            PduType::VerifyNotification => {
                require(buf, 1 + 1 + 1 + 1 + 1 + 1 + 2 + 4 + 4)?;
                let result_type = VerifyFlags::from_bits_truncate(buf.get_u8());
                let roa_result = buf.get_u8();
                let bgpsec_result = buf.get_u8();
                let aspa_result = buf.get_u8();
                buf.advance(1 + 1 + 2); // tranResult, reserved8, zero16
                let request_token = buf.get_u32();
                let update_id = buf.get_u32();
                Pdu::VerifyNotification(VerifyNotificationFields {
                    result_type,
                    roa_result,
                    bgpsec_result,
                    aspa_result,
                    request_token,
                    update_id,
                })
            }
            PduType::SignNotification => {
                require(buf, 1 + 4 + 4 + 4)?;
                buf.advance(1 + 4);
                let update_id = buf.get_u32();
                let bgpsec_len = buf.get_u32() as usize;
                if buf.remaining() < bgpsec_len {
                    return Err(WireError::MalformedBody("truncated bgpsec data"));
                }
                let bgpsec_data = buf.copy_to_bytes(bgpsec_len);
                Pdu::SignNotification {
                    update_id,
                    bgpsec_data,
                }
            }
            PduType::DeleteUpdate => {
                require(buf, 2 + 1 + 4 + 4)?;
                let keep_window = buf.get_u16();
                buf.advance(1 + 4);
                let update_id = buf.get_u32();
                Pdu::DeleteUpdate {
                    keep_window,
                    update_id,
                }
            }
            PduType::PeerChange => {
                require(buf, 2 + 1 + 4 + 4)?;
                buf.advance(2);
                let change_type = PeerChangeType::try_from(buf.get_u8())?;
                buf.advance(4);
                let peer_as = buf.get_u32();
                Pdu::PeerChange {
                    change_type,
                    peer_as,
                }
            }
            PduType::SyncRequest => Pdu::SyncRequest,
            PduType::Error => {
                require(buf, 2 + 1 + 4)?;
                let code = decode_error_code(buf.get_u16())?;
                buf.advance(1 + 4);
                Pdu::Error { code }
            }
            PduType::RegisterSki => {
                require(buf, 4 + SKI_LEN)?;
                let proxy_id = buf.get_u32();
                let ski = get_ski(buf)?;
                Pdu::RegisterSki { proxy_id, ski }
            }
            PduType::SigtraGenerationRequest => {
                require(buf, 4 + 1 + 4 + 1 + MAX_PATH_LEN * 4 + 4 * 4 + 1 + MAX_PATH_LEN * 4)?;
                let signature_id = buf.get_u32();
                let prefix_len = buf.get_u8();
                let mut octets = [0u8; 4];
                buf.copy_to_slice(&mut octets);
                let prefix = IpPrefix::v4(Ipv4Addr::from(octets), prefix_len)
                    .ok_or(WireError::MalformedBody("invalid prefix length"))?;
                let as_path_len = buf.get_u8() as usize;
                let as_path = get_u32_list(buf, as_path_len, MAX_PATH_LEN)?;
                let origin_as = buf.get_u32();
                let timestamp = buf.get_u32();
                let otc_field = buf.get_u32();
                let prev_asn = buf.get_u32();
                let current_asn = buf.get_u32();
                let peer_count = buf.get_u8() as usize;
                let peers = get_u32_list(buf, peer_count, MAX_PATH_LEN)?;
                Pdu::SigtraGenerationRequest {
                    signature_id,
                    prefix,
                    as_path,
                    origin_as,
                    timestamp,
                    otc_field,
                    prev_asn,
                    current_asn,
                    peers,
                }
            }
            PduType::SigtraValidationRequest => {
                require(buf, 4 + 1 + 1 + 4 + 1 + MAX_PATH_LEN * 4 + 4)?;
                let signature_id = buf.get_u32();
                let block_count = buf.get_u8() as usize;
                let prefix_len = buf.get_u8();
                let mut octets = [0u8; 4];
                buf.copy_to_slice(&mut octets);
                let prefix = IpPrefix::v4(Ipv4Addr::from(octets), prefix_len)
                    .ok_or(WireError::MalformedBody("invalid prefix length"))?;
                let as_path_len = buf.get_u8() as usize;
                let as_path = get_u32_list(buf, as_path_len, MAX_PATH_LEN)?;
                let otc_field = buf.get_u32();
                let mut blocks = Vec::with_capacity(block_count);
                for _ in 0..block_count {
                    blocks.push(decode_sigtra_block(buf)?);
                }
                Pdu::SigtraValidationRequest {
                    signature_id,
                    prefix,
                    as_path,
                    otc_field,
                    blocks,
                }
            }
            PduType::SigtraSignatureResponse => {
                require(buf, 4 + 4 + SIGNATURE_FIELD_LEN)?;
                let signature_id = buf.get_u32();
                let sig_len = (buf.get_u32() as usize).min(SIGNATURE_FIELD_LEN);
                let mut field = [0u8; SIGNATURE_FIELD_LEN];
                buf.copy_to_slice(&mut field);
                Pdu::SigtraSignatureResponse {
                    signature_id,
                    signature: field[..sig_len].to_vec(),
                }
            }
            PduType::SigtraValidationResponse => {
                require(buf, 4 + 1)?;
                let signature_id = buf.get_u32();
                let valid = buf.get_u8() != 0;
                Pdu::SigtraValidationResponse {
                    signature_id,
                    valid,
                }
            }
        })
    }
}

fn require(buf: &impl Buf, n: usize) -> Result<(), WireError> {
    if buf.remaining() < n {
        Err(WireError::MalformedBody("body shorter than type requires"))
    } else {
        Ok(())
    }
}

fn decode_error_code(code: u16) -> Result<ErrorCode, WireError> {
    Ok(match code {
        0 => ErrorCode::WrongVersion,
        1 => ErrorCode::DuplicateProxyId,
        2 => ErrorCode::InvalidPacket,
        3 => ErrorCode::Internal,
        4 => ErrorCode::AlgoNotSupported,
        5 => ErrorCode::UpdateNotFound,
        _ => return Err(WireError::MalformedBody("unknown error code")),
    })
}

fn encode_sigtra_block(buf: &mut BytesMut, block: &SigtraBlock) {
    buf.put_u8(block.id);
    buf.put_u32(block.signature.len() as u32);
    let mut field = [0u8; SIGNATURE_FIELD_LEN];
    let n = block.signature.len().min(SIGNATURE_FIELD_LEN);
    field[..n].copy_from_slice(&block.signature[..n]);
    buf.put_slice(&field);
    buf.put_u32(block.timestamp);
    buf.put_slice(&block.ski);
    buf.put_u32(block.creating_as);
    buf.put_u32(block.next_asn);
}

fn decode_sigtra_block(buf: &mut impl Buf) -> Result<SigtraBlock, WireError> {
    require(buf, 1 + 4 + SIGNATURE_FIELD_LEN + 4 + SKI_LEN + 4 + 4)?;
    let id = buf.get_u8();
    let sig_len = (buf.get_u32() as usize).min(SIGNATURE_FIELD_LEN);
    let mut field = [0u8; SIGNATURE_FIELD_LEN];
    buf.copy_to_slice(&mut field);
    let timestamp = buf.get_u32();
    let ski = get_ski(buf)?;
    let creating_as = buf.get_u32();
    let next_asn = buf.get_u32();
    Ok(SigtraBlock {
        id,
        signature: field[..sig_len].to_vec(),
        timestamp,
        ski,
        creating_as,
        next_asn,
    })
}
