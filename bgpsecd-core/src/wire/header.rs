use bytes::{Buf, BufMut};

use super::WireError;

/// Size in bytes of the common header shared by every PDU.
pub const HEADER_LEN: usize = 8;

/// The 8-byte header every PDU starts with: `type(1) | reserved(3) |
/// length(4, network order, total PDU length including this header)`.
///
/// The three reserved bytes are written as zero and ignored on read, per
/// §4.1 ("the reserved and zero fields are not really used... ignored on the
/// receiving side").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PduHeader {
    pub pdu_type: u8,
    pub length: u32,
}

impl PduHeader {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.pdu_type);
        buf.put_bytes(0, 3);
        buf.put_u32(self.length);
    }

    /// Decodes the header from the first [`HEADER_LEN`] bytes of `buf`,
    /// without advancing past it (callers peek the header before deciding
    /// whether the full frame has arrived).
    pub fn peek(buf: &[u8]) -> Result<PduHeader, WireError> {
        if buf.len() < HEADER_LEN {
            return Err(WireError::ShortFrame);
        }
        let pdu_type = buf[0];
        let length = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
        Ok(PduHeader { pdu_type, length })
    }

    pub fn decode(buf: &mut impl Buf) -> Result<PduHeader, WireError> {
        if buf.remaining() < HEADER_LEN {
            return Err(WireError::ShortFrame);
        }
        let pdu_type = buf.get_u8();
        buf.advance(3);
        let length = buf.get_u32();
        Ok(PduHeader { pdu_type, length })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn round_trips() {
        let h = PduHeader {
            pdu_type: 3,
            length: 68,
        };
        let mut buf = BytesMut::new();
        h.encode(&mut buf);
        assert_eq!(buf.len(), HEADER_LEN);
        let peeked = PduHeader::peek(&buf).unwrap();
        assert_eq!(peeked, h);
        let decoded = PduHeader::decode(&mut buf).unwrap();
        assert_eq!(decoded, h);
        assert!(buf.is_empty());
    }

    #[test]
    fn short_frame_on_peek() {
        let buf = [0u8; 4];
        assert_eq!(PduHeader::peek(&buf), Err(WireError::ShortFrame));
    }
}
