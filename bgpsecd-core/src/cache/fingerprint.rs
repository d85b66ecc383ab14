use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::model::{AsPathType, IpPrefix, PathId, UpdateId};

/// Computes the 32-bit fingerprint of `(origin ASN, prefix, BGPsec path
/// attribute)` an update is keyed on (§3, §9 "endianness at rest": all
/// inputs are hashed in host order, after decode, never over the raw wire
/// bytes, so two implementations that decode the same fields agree).
pub fn compute_update_id(origin_as: u32, prefix: &IpPrefix, bgpsec: Option<&[u8]>) -> UpdateId {
    let mut hasher = DefaultHasher::new();
    origin_as.hash(&mut hasher);
    match prefix {
        IpPrefix::V4(n) => {
            0u8.hash(&mut hasher);
            n.addr().octets().hash(&mut hasher);
            n.prefix_len().hash(&mut hasher);
        }
        IpPrefix::V6(n) => {
            1u8.hash(&mut hasher);
            n.addr().octets().hash(&mut hasher);
            n.prefix_len().hash(&mut hasher);
        }
    }
    bgpsec.unwrap_or(&[]).hash(&mut hasher);
    UpdateId(hasher.finish() as u32)
}

/// Computes the fingerprint two updates sharing an AS-path agree on, so they
/// share the same ASPA verdict (§4.6).
pub fn compute_path_id(as_path: &[u32], as_type: AsPathType) -> PathId {
    let mut hasher = DefaultHasher::new();
    as_path.hash(&mut hasher);
    matches!(as_type, AsPathType::Set).hash(&mut hasher);
    PathId(hasher.finish() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn identical_inputs_produce_identical_ids() {
        let prefix = IpPrefix::v4(Ipv4Addr::new(192, 0, 2, 0), 24).unwrap();
        let a = compute_update_id(65001, &prefix, None);
        let b = compute_update_id(65001, &prefix, None);
        assert_eq!(a, b);
    }

    #[test]
    fn different_origin_produces_different_id_with_overwhelming_probability() {
        let prefix = IpPrefix::v4(Ipv4Addr::new(192, 0, 2, 0), 24).unwrap();
        let a = compute_update_id(65001, &prefix, None);
        let b = compute_update_id(65002, &prefix, None);
        assert_ne!(a, b);
    }

    #[test]
    fn shared_path_produces_shared_path_id() {
        let path = vec![65001, 65002, 65003];
        let a = compute_path_id(&path, AsPathType::Sequence);
        let b = compute_path_id(&path, AsPathType::Sequence);
        assert_eq!(a, b);
    }
}
