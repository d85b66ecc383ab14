use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::header::{PduHeader, HEADER_LEN};
use super::pdu::Pdu;
use super::types::PduType;
use super::{WireError, MAX_FRAME_LEN};

/// Turns a byte stream into a sequence of [`Pdu`]s and back, one frame at a
/// time (§4.1). Driven directly via `decode`/`encode`, not through
/// `tokio_util::codec::Framed`.
#[derive(Debug, Default)]
pub struct PduCodec {
    /// Length of the frame currently being assembled, once known from the
    /// header, so repeated calls don't re-parse it off a growing buffer.
    pending_len: Option<u32>,
}

impl PduCodec {
    pub fn new() -> Self {
        Self { pending_len: None }
    }
}

impl Decoder for PduCodec {
    type Item = Pdu;
    type Error = WireError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Pdu>, WireError> {
        let length = match self.pending_len {
            Some(len) => len,
            None => {
                if src.len() < HEADER_LEN {
                    return Ok(None);
                }
                let header = PduHeader::peek(src)?;
                if (header.length as usize) < HEADER_LEN || header.length > MAX_FRAME_LEN {
                    return Err(WireError::BadLength(header.length));
                }
                self.pending_len = Some(header.length);
                header.length
            }
        };

        if src.len() < length as usize {
            src.reserve(length as usize - src.len());
            return Ok(None);
        }

        let mut frame = src.split_to(length as usize);
        self.pending_len = None;

        let header = PduHeader::decode(&mut frame)?;
        let pdu_type = PduType::try_from(header.pdu_type)?;
        let body: Bytes = frame.freeze();
        let pdu = Pdu::decode(pdu_type, body)?;
        Ok(Some(pdu))
    }
}

impl Encoder<Pdu> for PduCodec {
    type Error = WireError;

    fn encode(&mut self, item: Pdu, dst: &mut BytesMut) -> Result<(), WireError> {
        let encoded = item.encode();
        dst.extend_from_slice(&encoded);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::types::ErrorCode;

    #[test]
    fn round_trips_a_simple_pdu() {
        let mut codec = PduCodec::new();
        let mut buf = BytesMut::new();
        let pdu = Pdu::Error {
            code: ErrorCode::UpdateNotFound,
        };
        codec.encode(pdu.clone(), &mut buf).unwrap();

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, pdu);
        assert!(buf.is_empty());
    }

    #[test]
    fn waits_for_more_bytes_on_partial_frame() {
        let mut codec = PduCodec::new();
        let mut buf = BytesMut::new();
        Pdu::SyncRequest.encode().iter().for_each(|_| {});
        let full = Pdu::SyncRequest.encode();
        buf.extend_from_slice(&full[..HEADER_LEN + 1]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        buf.extend_from_slice(&full[HEADER_LEN + 1..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Pdu::SyncRequest));
    }

    #[test]
    fn rejects_absurd_declared_length() {
        let mut codec = PduCodec::new();
        let mut buf = BytesMut::new();
        let header = PduHeader {
            pdu_type: PduType::SyncRequest as u8,
            length: MAX_FRAME_LEN + 1,
        };
        header.encode(&mut buf);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(WireError::BadLength(_))
        ));
    }
}
