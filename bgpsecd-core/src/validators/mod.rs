//! Validator trait objects the dispatcher consumes (§4.9). Production RPKI-
//! Router wiring is out of scope for this crate (spec §1); the mocks here
//! back both the test suite and `bgpsecd-core`'s own usage examples.

mod mock;

pub use mock::{MockAspaValidator, MockBgpsecValidator, MockOriginValidator};

use crate::model::{AsRelationDirection, IpPrefix, Verdict};

/// `validateOrigin(prefix, originAS) → {valid, invalid, notfound, undefined}`.
pub trait OriginValidator: Send + Sync {
    fn validate_origin(&self, prefix: &IpPrefix, origin_as: u32) -> Verdict;
}

/// `validateBgpsec(bgpsecBlob, prefix, originAS, localAS) → {valid, invalid, undefined}`.
pub trait BgpsecValidator: Send + Sync {
    fn validate_bgpsec(&self, bgpsec: &[u8], prefix: &IpPrefix, origin_as: u32, local_as: u32) -> Verdict;
}

/// `validateAspa(asPath, direction) → {valid, invalid, unknown, unverifiable, undefined}`.
pub trait AspaValidator: Send + Sync {
    fn validate_aspa(&self, as_path: &[u32], direction: AsRelationDirection) -> Verdict;
}
