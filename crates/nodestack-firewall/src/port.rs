//! Protocols and port ranges.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{FirewallError, FirewallResult};

/// IP protocol of a rule or of a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// TCP.
    Tcp,
    /// UDP.
    Udp,
    /// ICMP.
    Icmp,
    /// Every protocol.
    All,
}

impl Protocol {
    /// Protocol name as used in `IpProtocol` (`-1` for all).
    pub fn ip_protocol(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::Icmp => "icmp",
            Protocol::All => "-1",
        }
    }

    /// Whether the protocol carries port numbers.
    pub fn has_ports(&self) -> bool {
        matches!(self, Protocol::Tcp | Protocol::Udp)
    }

    fn covers(&self, other: Protocol) -> bool {
        *self == Protocol::All || *self == other
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::All => f.write_str("all"),
            other => f.write_str(other.ip_protocol()),
        }
    }
}

/// Protocol plus an inclusive port range.
///
/// `ports: None` means every port (or every ICMP type).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortRange {
    /// Protocol.
    pub protocol: Protocol,
    /// Inclusive port bounds.
    pub ports: Option<(u16, u16)>,
}

impl PortRange {
    /// A single TCP port.
    pub fn tcp(port: u16) -> Self {
        Self::tcp_range(port, port)
    }

    /// An inclusive TCP port range.
    pub fn tcp_range(from: u16, to: u16) -> Self {
        Self {
            protocol: Protocol::Tcp,
            ports: Some((from, to)),
        }
    }

    /// A single UDP port.
    pub fn udp(port: u16) -> Self {
        Self {
            protocol: Protocol::Udp,
            ports: Some((port, port)),
        }
    }

    /// Every ICMP type.
    pub fn all_icmp() -> Self {
        Self {
            protocol: Protocol::Icmp,
            ports: None,
        }
    }

    /// Every protocol and port.
    pub fn all_traffic() -> Self {
        Self {
            protocol: Protocol::All,
            ports: None,
        }
    }

    /// Check that bounds are ordered and apply to the protocol.
    pub fn validate(&self) -> FirewallResult<()> {
        if let Some((from, to)) = self.ports {
            if !self.protocol.has_ports() {
                return Err(FirewallError::InvalidPortRange(format!(
                    "protocol {} does not take ports",
                    self.protocol
                )));
            }
            if from > to {
                return Err(FirewallError::InvalidPortRange(format!("{from} > {to}")));
            }
            if from == 0 {
                return Err(FirewallError::InvalidPortRange(
                    "port 0 is reserved".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Check whether a packet with this protocol and port falls in range.
    pub fn covers(&self, protocol: Protocol, port: Option<u16>) -> bool {
        if !self.protocol.covers(protocol) {
            return false;
        }
        match self.ports {
            None => true,
            Some((from, to)) => port.is_some_and(|p| from <= p && p <= to),
        }
    }

    /// `FromPort` / `ToPort` values; `-1` stands for every ICMP type.
    pub fn bounds(&self) -> (i32, i32) {
        match self.ports {
            Some((from, to)) => (i32::from(from), i32::from(to)),
            None if self.protocol.has_ports() => (0, 65535),
            None => (-1, -1),
        }
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ports {
            None if self.protocol == Protocol::All => f.write_str("all traffic"),
            None => write!(f, "{}/all", self.protocol),
            Some((from, to)) if from == to => write!(f, "{}/{from}", self.protocol),
            Some((from, to)) => write!(f, "{}/{from}-{to}", self.protocol),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_port() {
        let https = PortRange::tcp(443);
        assert!(https.covers(Protocol::Tcp, Some(443)));
        assert!(!https.covers(Protocol::Tcp, Some(80)));
        assert!(!https.covers(Protocol::Udp, Some(443)));
        assert!(!https.covers(Protocol::Tcp, None));
        assert_eq!(https.bounds(), (443, 443));
        assert_eq!(https.to_string(), "tcp/443");
    }

    #[test]
    fn test_range() {
        let range = PortRange::tcp_range(8000, 8100);
        assert!(range.covers(Protocol::Tcp, Some(8000)));
        assert!(range.covers(Protocol::Tcp, Some(8100)));
        assert!(!range.covers(Protocol::Tcp, Some(8101)));
        assert_eq!(range.to_string(), "tcp/8000-8100");
    }

    #[test]
    fn test_icmp_and_all() {
        let icmp = PortRange::all_icmp();
        assert!(icmp.covers(Protocol::Icmp, None));
        assert!(!icmp.covers(Protocol::Tcp, Some(22)));
        assert_eq!(icmp.bounds(), (-1, -1));
        assert_eq!(icmp.protocol.ip_protocol(), "icmp");

        let all = PortRange::all_traffic();
        assert!(all.covers(Protocol::Udp, Some(53)));
        assert!(all.covers(Protocol::Icmp, None));
        assert_eq!(all.protocol.ip_protocol(), "-1");
    }

    #[test]
    fn test_validate() {
        assert!(PortRange::tcp(443).validate().is_ok());
        assert!(PortRange::all_icmp().validate().is_ok());
        assert!(PortRange::tcp_range(100, 10).validate().is_err());
        assert!(PortRange::tcp(0).validate().is_err());

        let icmp_with_ports = PortRange {
            protocol: Protocol::Icmp,
            ports: Some((1, 2)),
        };
        assert!(matches!(
            icmp_with_ports.validate(),
            Err(FirewallError::InvalidPortRange(_))
        ));
    }
}
