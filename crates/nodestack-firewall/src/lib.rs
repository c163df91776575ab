//! Nodestack Firewall
//!
//! Security group rules for the node host stack. A group is a [`RuleSet`]:
//! ordered ingress rules plus an egress stance. Rules only ever allow, so
//! evaluation is default-deny:
//!
//! - All permissions must be explicitly granted
//! - Absence of a matching rule guarantees denial
//! - Group-to-group trust is expressed with [`Peer::SecurityGroup`]
//!
//! # Usage
//!
//! ```
//! use nodestack_firewall::{RuleSet, Traffic};
//! use nodestack_firewall::rule::TrafficSource;
//!
//! let edge = RuleSet::https_from_anywhere();
//! let nodes = RuleSet::icmp_from_group("EdgeSg");
//!
//! let ping = Traffic::icmp(TrafficSource::group("EdgeSg"));
//! assert!(nodes.check(&ping).is_allowed());
//! assert!(edge.check(&ping).is_denied());
//! ```

pub mod error;
pub mod peer;
pub mod port;
pub mod rule;
pub mod set;

// Re-export main types
pub use error::{FirewallError, FirewallResult};
pub use peer::{ANY_IPV4_CIDR, Peer};
pub use port::{PortRange, Protocol};
pub use rule::{DenialReason, IngressRule, Traffic, TrafficSource, Verdict};
pub use set::{RuleSet, RuleSetBuilder};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{FirewallError, FirewallResult};
    pub use crate::peer::Peer;
    pub use crate::port::{PortRange, Protocol};
    pub use crate::rule::{IngressRule, Traffic, TrafficSource, Verdict};
    pub use crate::set::{RuleSet, RuleSetBuilder};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prelude_imports() {
        use crate::prelude::*;

        let _ = Peer::any_ipv4();
        let _ = RuleSet::new();
    }

    #[test]
    fn test_edge_and_node_groups() {
        let edge = RuleSet::https_from_anywhere();
        let nodes = RuleSet::icmp_from_group("EdgeSg");

        let from_internet = TrafficSource::ipv4([8, 8, 8, 8]);
        assert!(edge.check(&Traffic::tcp(from_internet.clone(), 443)).is_allowed());
        assert!(nodes.check(&Traffic::tcp(from_internet.clone(), 443)).is_denied());
        assert!(nodes.check(&Traffic::icmp(from_internet)).is_denied());
    }
}
