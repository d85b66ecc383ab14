/// Canonical message a transitive signature is computed over (§4.10).
///
/// The source's buffer is declared as 22 bytes but its own `memcpy` writes
/// the `prefix` field at offset 21 through offset 25 — a buffer overflow.
/// This crate uses the 25-byte reading the overflow implies; see
/// `DESIGN.md` for the record of that choice.
pub const CANONICAL_MESSAGE_LEN: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanonicalMessage {
    pub otc_field: u32,
    pub prev_asn: u32,
    pub current_asn: u32,
    pub next_asn: u32,
    pub timestamp: u32,
    pub prefix_len: u8,
    pub prefix: u32,
}

impl CanonicalMessage {
    pub fn encode(&self) -> [u8; CANONICAL_MESSAGE_LEN] {
        let mut buf = [0u8; CANONICAL_MESSAGE_LEN];
        buf[0..4].copy_from_slice(&self.otc_field.to_be_bytes());
        buf[4..8].copy_from_slice(&self.prev_asn.to_be_bytes());
        buf[8..12].copy_from_slice(&self.current_asn.to_be_bytes());
        buf[12..16].copy_from_slice(&self.next_asn.to_be_bytes());
        buf[16..20].copy_from_slice(&self.timestamp.to_be_bytes());
        buf[20] = self.prefix_len;
        buf[21..25].copy_from_slice(&self.prefix.to_be_bytes());
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_pinned() {
        let message = CanonicalMessage {
            otc_field: 65001,
            prev_asn: 65001,
            current_asn: 65002,
            next_asn: 65010,
            timestamp: 1_700_000_000,
            prefix_len: 24,
            prefix: u32::from(std::net::Ipv4Addr::new(203, 0, 113, 0)),
        };
        let encoded = message.encode();
        assert_eq!(encoded.len(), CANONICAL_MESSAGE_LEN);
        assert_eq!(&encoded[0..4], &65001u32.to_be_bytes());
        assert_eq!(&encoded[12..16], &65010u32.to_be_bytes());
        assert_eq!(encoded[20], 24);
        assert_eq!(&encoded[21..25], &[203, 0, 113, 0]);
    }
}
