//! Ingress rules, traffic and verdicts.
//!
//! A security group only ever allows. Rules never deny on their own; traffic
//! that no rule allows is denied by the group as a whole.

use std::fmt;
use std::net::Ipv4Addr;

use nodestack_core::LogicalId;
use serde::{Deserialize, Serialize};

use crate::error::FirewallError;
use crate::peer::Peer;
use crate::port::{PortRange, Protocol};

/// A single ingress permission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressRule {
    /// Where traffic may come from.
    pub peer: Peer,
    /// Which protocol and ports it may use.
    pub ports: PortRange,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl IngressRule {
    /// Create a rule.
    pub fn new(peer: Peer, ports: PortRange) -> Self {
        Self {
            peer,
            ports,
            description: None,
        }
    }

    /// Attach a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Two rules are the same permission when peer and ports match;
    /// descriptions are ignored.
    pub fn same_permission(&self, other: &IngressRule) -> bool {
        self.peer == other.peer && self.ports == other.ports
    }

    /// Evaluate traffic against this rule alone.
    pub fn evaluate(&self, traffic: &Traffic) -> Verdict {
        if self.peer.matches(&traffic.source) && self.ports.covers(traffic.protocol, traffic.port) {
            Verdict::Allowed
        } else {
            Verdict::NotApplicable
        }
    }
}

impl fmt::Display for IngressRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {}", self.ports, self.peer)
    }
}

/// Origin of an inbound packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficSource {
    /// A plain IPv4 address.
    Ipv4(Ipv4Addr),
    /// An instance that is a member of a security group.
    SecurityGroup(LogicalId),
}

impl TrafficSource {
    /// A plain IPv4 source.
    pub fn ipv4(octets: [u8; 4]) -> Self {
        TrafficSource::Ipv4(Ipv4Addr::from(octets))
    }

    /// A security group member.
    pub fn group(id: impl Into<LogicalId>) -> Self {
        TrafficSource::SecurityGroup(id.into())
    }
}

impl fmt::Display for TrafficSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrafficSource::Ipv4(addr) => write!(f, "{addr}"),
            TrafficSource::SecurityGroup(id) => write!(f, "sg:{id}"),
        }
    }
}

/// An inbound packet to check against a rule set.
///
/// # Example
///
/// ```
/// use nodestack_firewall::{RuleSet, Traffic};
/// use nodestack_firewall::rule::TrafficSource;
///
/// let edge = RuleSet::https_from_anywhere();
/// assert!(edge.check(&Traffic::tcp(TrafficSource::ipv4([198, 51, 100, 4]), 443)).is_allowed());
/// assert!(edge.check(&Traffic::tcp(TrafficSource::ipv4([198, 51, 100, 4]), 22)).is_denied());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Traffic {
    /// Where the packet comes from.
    pub source: TrafficSource,
    /// Its protocol.
    pub protocol: Protocol,
    /// Destination port, for protocols that have one.
    pub port: Option<u16>,
}

impl Traffic {
    /// A TCP packet to `port`.
    pub fn tcp(source: TrafficSource, port: u16) -> Self {
        Self {
            source,
            protocol: Protocol::Tcp,
            port: Some(port),
        }
    }

    /// A UDP packet to `port`.
    pub fn udp(source: TrafficSource, port: u16) -> Self {
        Self {
            source,
            protocol: Protocol::Udp,
            port: Some(port),
        }
    }

    /// An ICMP packet.
    pub fn icmp(source: TrafficSource) -> Self {
        Self {
            source,
            protocol: Protocol::Icmp,
            port: None,
        }
    }
}

impl fmt::Display for Traffic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}/{} from {}", self.protocol, port, self.source),
            None => write!(f, "{} from {}", self.protocol, self.source),
        }
    }
}

/// Result of checking traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// A rule permits the traffic.
    Allowed,
    /// No rule permits the traffic.
    Denied(DenialReason),
    /// The rule does not apply; only produced by a single rule.
    NotApplicable,
}

impl Verdict {
    /// Check if the verdict is allowed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allowed)
    }

    /// Check if the verdict is denied.
    pub fn is_denied(&self) -> bool {
        matches!(self, Verdict::Denied(_))
    }

    /// Convert to a `Result`.
    pub fn to_result(&self) -> Result<(), FirewallError> {
        match self {
            Verdict::Allowed => Ok(()),
            Verdict::Denied(reason) => Err(FirewallError::Denied {
                reason: reason.clone(),
            }),
            Verdict::NotApplicable => Err(FirewallError::Denied {
                reason: DenialReason::new("unknown", "no rule evaluated the traffic"),
            }),
        }
    }
}

/// Why traffic was denied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenialReason {
    /// The denied traffic, rendered.
    pub traffic: String,
    /// Human-readable explanation.
    pub message: String,
}

impl DenialReason {
    /// Create a denial reason.
    pub fn new(traffic: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            traffic: traffic.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.traffic, self.message)
    }
}
