use std::collections::HashMap;
use std::sync::RwLock;

use crate::model::{AsRelationDirection, IpPrefix, Verdict};

use super::{AspaValidator, BgpsecValidator, OriginValidator};

/// Deterministic origin validator backed by an explicit `(prefix, originAS)`
/// table; anything not seeded returns a configurable default (typically
/// `NotFound`, matching scenario 2 in §8).
pub struct MockOriginValidator {
    table: RwLock<HashMap<(IpPrefix, u32), Verdict>>,
    default: Verdict,
}

impl MockOriginValidator {
    pub fn new(default: Verdict) -> Self {
        MockOriginValidator {
            table: RwLock::new(HashMap::new()),
            default,
        }
    }

    pub fn seed(&self, prefix: IpPrefix, origin_as: u32, verdict: Verdict) {
        self.table.write().unwrap().insert((prefix, origin_as), verdict);
    }
}

impl OriginValidator for MockOriginValidator {
    fn validate_origin(&self, prefix: &IpPrefix, origin_as: u32) -> Verdict {
        self.table
            .read()
            .unwrap()
            .get(&(*prefix, origin_as))
            .copied()
            .unwrap_or(self.default)
    }
}

/// Bgpsec validator that returns a single fixed verdict regardless of
/// input, for tests that don't exercise path validation directly.
pub struct MockBgpsecValidator {
    verdict: Verdict,
}

impl MockBgpsecValidator {
    pub fn new(verdict: Verdict) -> Self {
        MockBgpsecValidator { verdict }
    }
}

impl BgpsecValidator for MockBgpsecValidator {
    fn validate_bgpsec(&self, _bgpsec: &[u8], _prefix: &IpPrefix, _origin_as: u32, _local_as: u32) -> Verdict {
        self.verdict
    }
}

/// ASPA validator keyed by the exact AS-path sequence.
pub struct MockAspaValidator {
    table: RwLock<HashMap<Vec<u32>, Verdict>>,
    default: Verdict,
}

impl MockAspaValidator {
    pub fn new(default: Verdict) -> Self {
        MockAspaValidator {
            table: RwLock::new(HashMap::new()),
            default,
        }
    }

    pub fn seed(&self, as_path: Vec<u32>, verdict: Verdict) {
        self.table.write().unwrap().insert(as_path, verdict);
    }
}

impl AspaValidator for MockAspaValidator {
    fn validate_aspa(&self, as_path: &[u32], _direction: AsRelationDirection) -> Verdict {
        self.table
            .read()
            .unwrap()
            .get(as_path)
            .copied()
            .unwrap_or(self.default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unseeded_origin_lookup_returns_the_default() {
        let validator = MockOriginValidator::new(Verdict::NotFound);
        let prefix = IpPrefix::v4(std::net::Ipv4Addr::new(192, 0, 2, 0), 24).unwrap();
        assert_eq!(validator.validate_origin(&prefix, 65001), Verdict::NotFound);
    }

    #[test]
    fn seeded_origin_lookup_returns_the_seeded_verdict() {
        let validator = MockOriginValidator::new(Verdict::NotFound);
        let prefix = IpPrefix::v4(std::net::Ipv4Addr::new(192, 0, 2, 0), 24).unwrap();
        validator.seed(prefix, 65001, Verdict::Valid);
        assert_eq!(validator.validate_origin(&prefix, 65001), Verdict::Valid);
    }
}
