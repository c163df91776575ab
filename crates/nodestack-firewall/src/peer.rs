//! Traffic peers: where ingress is allowed from.

use std::fmt;
use std::net::Ipv4Addr;

use nodestack_core::LogicalId;
use nodestack_core::config::parse_ipv4_cidr;
use serde::{Deserialize, Serialize};

use crate::error::{FirewallError, FirewallResult};

/// CIDR block matching every IPv4 address.
pub const ANY_IPV4_CIDR: &str = "0.0.0.0/0";

/// Source side of an ingress rule.
///
/// # Example
///
/// ```
/// use nodestack_firewall::Peer;
/// use nodestack_firewall::rule::TrafficSource;
///
/// let peer = Peer::ipv4("10.0.0.0/16");
/// assert!(peer.matches(&TrafficSource::ipv4([10, 0, 3, 7])));
/// assert!(!peer.matches(&TrafficSource::ipv4([192, 168, 0, 1])));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Peer {
    /// Any IPv4 address.
    AnyIpv4,
    /// An IPv4 CIDR block.
    Ipv4Cidr(String),
    /// Members of another security group.
    SecurityGroup(LogicalId),
}

impl Peer {
    /// Any IPv4 address.
    pub fn any_ipv4() -> Self {
        Peer::AnyIpv4
    }

    /// An IPv4 CIDR block.
    pub fn ipv4(cidr: impl Into<String>) -> Self {
        Peer::Ipv4Cidr(cidr.into())
    }

    /// Members of a security group.
    pub fn security_group(id: impl Into<LogicalId>) -> Self {
        Peer::SecurityGroup(id.into())
    }

    /// The CIDR block this peer covers, if it is address based.
    pub fn cidr(&self) -> Option<&str> {
        match self {
            Peer::AnyIpv4 => Some(ANY_IPV4_CIDR),
            Peer::Ipv4Cidr(cidr) => Some(cidr),
            Peer::SecurityGroup(_) => None,
        }
    }

    /// The referenced security group, if any.
    pub fn group(&self) -> Option<&LogicalId> {
        match self {
            Peer::SecurityGroup(id) => Some(id),
            _ => None,
        }
    }

    /// Check that a CIDR peer is well formed.
    pub fn validate(&self) -> FirewallResult<()> {
        if let Peer::Ipv4Cidr(cidr) = self {
            parse_ipv4_cidr(cidr).ok_or_else(|| FirewallError::InvalidCidr(cidr.clone()))?;
        }
        Ok(())
    }

    /// Check whether traffic from `source` originates at this peer.
    ///
    /// Group members carry IPv4 addresses too, so `AnyIpv4` matches them.
    pub fn matches(&self, source: &crate::rule::TrafficSource) -> bool {
        use crate::rule::TrafficSource;

        match (self, source) {
            (Peer::AnyIpv4, _) => true,
            (Peer::Ipv4Cidr(cidr), TrafficSource::Ipv4(addr)) => cidr_contains(cidr, *addr),
            (Peer::Ipv4Cidr(_), TrafficSource::SecurityGroup(_)) => false,
            (Peer::SecurityGroup(id), TrafficSource::SecurityGroup(group)) => id == group,
            (Peer::SecurityGroup(_), TrafficSource::Ipv4(_)) => false,
        }
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Peer::AnyIpv4 => write!(f, "{ANY_IPV4_CIDR}"),
            Peer::Ipv4Cidr(cidr) => write!(f, "{cidr}"),
            Peer::SecurityGroup(id) => write!(f, "sg:{id}"),
        }
    }
}

fn cidr_contains(cidr: &str, addr: Ipv4Addr) -> bool {
    let Some((network, mask)) = parse_ipv4_cidr(cidr) else {
        return false;
    };
    let bits = if mask == 0 { 0 } else { u32::MAX << (32 - mask) };
    u32::from(network) & bits == u32::from(addr) & bits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::TrafficSource;

    #[test]
    fn test_any_ipv4_matches_everything() {
        let peer = Peer::any_ipv4();
        assert!(peer.matches(&TrafficSource::ipv4([203, 0, 113, 9])));
        assert!(peer.matches(&TrafficSource::group("EdgeSg")));
        assert_eq!(peer.cidr(), Some("0.0.0.0/0"));
    }

    #[test]
    fn test_cidr_matching() {
        let peer = Peer::ipv4("192.168.1.0/24");
        assert!(peer.matches(&TrafficSource::ipv4([192, 168, 1, 200])));
        assert!(!peer.matches(&TrafficSource::ipv4([192, 168, 2, 1])));
        assert!(!peer.matches(&TrafficSource::group("EdgeSg")));

        let host = Peer::ipv4("10.1.2.3/32");
        assert!(host.matches(&TrafficSource::ipv4([10, 1, 2, 3])));
        assert!(!host.matches(&TrafficSource::ipv4([10, 1, 2, 4])));
    }

    #[test]
    fn test_group_matching() {
        let peer = Peer::security_group("EdgeSg");
        assert!(peer.matches(&TrafficSource::group("EdgeSg")));
        assert!(!peer.matches(&TrafficSource::group("OtherSg")));
        assert!(!peer.matches(&TrafficSource::ipv4([10, 0, 0, 1])));
        assert_eq!(peer.group().map(LogicalId::as_str), Some("EdgeSg"));
    }

    #[test]
    fn test_validate_cidr() {
        assert!(Peer::ipv4("10.0.0.0/8").validate().is_ok());
        assert!(matches!(
            Peer::ipv4("10.0.0.0/40").validate(),
            Err(FirewallError::InvalidCidr(_))
        ));
        assert!(Peer::ipv4("anywhere").validate().is_err());
        assert!(Peer::any_ipv4().validate().is_ok());
    }

    #[test]
    fn test_display() {
        assert_eq!(Peer::any_ipv4().to_string(), "0.0.0.0/0");
        assert_eq!(Peer::security_group("EdgeSg").to_string(), "sg:EdgeSg");
    }
}
