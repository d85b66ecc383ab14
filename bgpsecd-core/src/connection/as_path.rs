use crate::wire::MAX_PATH_LEN;

/// Size in bytes of one BGPsec Secure_Path segment: `pCount(1) | flags(1) |
/// asn(4)` (RFC 8205 §3.1). `VERIFY_V4/V6_REQUEST` carries the AS-path only
/// indirectly, folded into the opaque BGPsec attribute blob (§3 "BGPsec data
/// blob (opaque, length-prefixed)"); extracting just the ASN sequence from
/// the Secure_Path segments is the minimum amount of structure this crate
/// needs to impose on that blob to compute a `PathId` and feed the ASPA
/// validator, without taking on full BGPsec attribute parsing (out of scope
/// per spec.md §1).
const SECURE_PATH_SEGMENT_LEN: usize = 6;

/// Derives the AS-path sequence an update's `PathId` and ASPA validation are
/// computed over. Falls back to the single-hop path `[origin_as]` when no
/// BGPsec attribute was sent (a proxy may request ROA-only validation).
pub fn derive_as_path(bgpsec: Option<&[u8]>, origin_as: u32) -> Vec<u32> {
    let Some(blob) = bgpsec else {
        return vec![origin_as];
    };
    let hops = blob.len() / SECURE_PATH_SEGMENT_LEN;
    let mut path = Vec::with_capacity(hops.min(MAX_PATH_LEN));
    for i in 0..hops.min(MAX_PATH_LEN) {
        let offset = i * SECURE_PATH_SEGMENT_LEN + 2;
        let asn = u32::from_be_bytes([
            blob[offset],
            blob[offset + 1],
            blob[offset + 2],
            blob[offset + 3],
        ]);
        path.push(asn);
    }
    if path.is_empty() {
        path.push(origin_as);
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_bgpsec_attribute_falls_back_to_single_hop() {
        assert_eq!(derive_as_path(None, 65001), vec![65001]);
    }

    #[test]
    fn two_segments_decode_to_two_asns() {
        let mut blob = Vec::new();
        blob.extend_from_slice(&[0, 0]);
        blob.extend_from_slice(&65002u32.to_be_bytes());
        blob.extend_from_slice(&[0, 0]);
        blob.extend_from_slice(&65001u32.to_be_bytes());
        assert_eq!(derive_as_path(Some(&blob), 65001), vec![65002, 65001]);
    }
}
