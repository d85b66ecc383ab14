//! Domain types shared by the update cache, the AS-path cache and the wire
//! codec: fingerprints, verdicts and the prefix/AS-path shapes they are
//! computed over.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnet::IpNet;

/// 32-bit fingerprint of `(origin ASN, prefix, BGPsec path attribute)`.
/// Collisions are resolved by linear probing (§4.5): the entry actually
/// stored at a given `UpdateId` may not be the first candidate computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UpdateId(pub u32);

impl UpdateId {
    /// The next candidate slot in the linear probe sequence.
    pub fn next(self) -> UpdateId {
        UpdateId(self.0.wrapping_add(1))
    }
}

/// 32-bit fingerprint of an AS-path. Two updates that share a path share the
/// same `PathId` and therefore the same ASPA verdict (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PathId(pub u32);

/// Internal 1..=255 identifier for a proxy connection. Slot 0 is reserved
/// and never allocated (§3 invariant, §8 boundary behavior).
pub type ClientSlot = u8;

/// One of the three independent validation outcomes a policy can return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    NotFound,
    Invalid,
    Undefined,
    Unverifiable,
    DontUse,
}

impl Verdict {
    pub fn to_wire(self) -> u8 {
        match self {
            Verdict::Valid => 0,
            Verdict::NotFound => 1,
            Verdict::Invalid => 2,
            Verdict::Undefined => 3,
            Verdict::Unverifiable => 4,
            Verdict::DontUse => 5,
        }
    }

    pub fn from_wire(value: u8) -> Verdict {
        match value {
            0 => Verdict::Valid,
            1 => Verdict::NotFound,
            2 => Verdict::Invalid,
            4 => Verdict::Unverifiable,
            5 => Verdict::DontUse,
            _ => Verdict::Undefined,
        }
    }
}

/// Who asserted a verdict: the client's requested default, or an actual
/// validator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictSource {
    Default,
    Validator,
}

/// A verdict paired with the tag recording who asserted it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaggedVerdict {
    pub verdict: Verdict,
    pub source: VerdictSource,
}

impl TaggedVerdict {
    pub fn default_of(verdict: Verdict) -> Self {
        TaggedVerdict {
            verdict,
            source: VerdictSource::Default,
        }
    }

    pub fn from_validator(verdict: Verdict) -> Self {
        TaggedVerdict {
            verdict,
            source: VerdictSource::Validator,
        }
    }
}

/// The three orthogonal verdicts carried by an update entry and echoed back
/// in `VERIFY_NOTIFICATION` PDUs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SrxResult {
    pub roa: TaggedVerdict,
    pub bgpsec: TaggedVerdict,
    pub aspa: TaggedVerdict,
}

impl SrxResult {
    /// Whether any field differs in its `verdict` (source tags don't count —
    /// a client is only notified when the actual answer changes, per the
    /// "known and any verdict diverges" rule in §4.8).
    pub fn diverges_from(&self, other: &SrxResult) -> bool {
        self.roa.verdict != other.roa.verdict
            || self.bgpsec.verdict != other.bgpsec.verdict
            || self.aspa.verdict != other.aspa.verdict
    }
}

/// IPv4 or IPv6 announcement prefix, on-wire bytes preserved via `ipnet`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpPrefix {
    V4(ipnet::Ipv4Net),
    V6(ipnet::Ipv6Net),
}

impl IpPrefix {
    pub fn v4(addr: Ipv4Addr, len: u8) -> Option<Self> {
        ipnet::Ipv4Net::new(addr, len).ok().map(IpPrefix::V4)
    }

    pub fn v6(addr: Ipv6Addr, len: u8) -> Option<Self> {
        ipnet::Ipv6Net::new(addr, len).ok().map(IpPrefix::V6)
    }

    pub fn addr(&self) -> IpAddr {
        match self {
            IpPrefix::V4(n) => IpAddr::V4(n.addr()),
            IpPrefix::V6(n) => IpAddr::V6(n.addr()),
        }
    }

    pub fn prefix_len(&self) -> u8 {
        match self {
            IpPrefix::V4(n) => n.prefix_len(),
            IpPrefix::V6(n) => n.prefix_len(),
        }
    }

    pub fn as_ipnet(&self) -> IpNet {
        match self {
            IpPrefix::V4(n) => IpNet::V4(*n),
            IpPrefix::V6(n) => IpNet::V6(*n),
        }
    }

    /// The prefix address folded into a `u32`, as the canonical signing
    /// message's fixed-width `prefix` field requires (§4.10): the address
    /// itself for v4, the low 32 bits for v6.
    pub fn to_u32(&self) -> u32 {
        match self.addr() {
            std::net::IpAddr::V4(v4) => u32::from(v4),
            std::net::IpAddr::V6(v6) => {
                let octets = v6.octets();
                u32::from_be_bytes([octets[12], octets[13], octets[14], octets[15]])
            }
        }
    }
}

/// How an AS-path sequence is encoded in the BGP update: a strict sequence,
/// or an unordered set (as produced by some forms of aggregation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AsPathType {
    Sequence,
    Set,
}

impl AsPathType {
    pub fn from_wire(value: u8) -> AsPathType {
        match value {
            1 => AsPathType::Set,
            _ => AsPathType::Sequence,
        }
    }

    pub fn to_wire(self) -> u8 {
        match self {
            AsPathType::Sequence => 0,
            AsPathType::Set => 1,
        }
    }
}

/// The relationship direction an ASPA verdict was computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AsRelationDirection {
    Upstream,
    Downstream,
    Unknown,
}

impl AsRelationDirection {
    pub fn from_wire(value: u8) -> AsRelationDirection {
        match value {
            0 => AsRelationDirection::Upstream,
            1 => AsRelationDirection::Downstream,
            _ => AsRelationDirection::Unknown,
        }
    }
}
