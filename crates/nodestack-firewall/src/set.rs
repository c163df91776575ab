//! Rule set management.
//!
//! This module provides the `RuleSet` type: the ingress rules of one
//! security group plus its egress stance, with default-deny evaluation.

use nodestack_core::LogicalId;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{FirewallError, FirewallResult};
use crate::peer::Peer;
use crate::port::PortRange;
use crate::rule::{DenialReason, IngressRule, Traffic, Verdict};

/// The rules of a security group.
///
/// Rules keep insertion order. Traffic is allowed if any rule allows it and
/// denied otherwise.
///
/// # Example
///
/// ```
/// use nodestack_firewall::{Peer, PortRange, RuleSet};
///
/// let mut set = RuleSet::new();
/// set.allow(Peer::ipv4("10.0.0.0/16"), PortRange::tcp(8080)).unwrap();
/// assert_eq!(set.len(), 1);
/// assert!(set.allow(Peer::ipv4("10.0.0.0/16"), PortRange::tcp(8080)).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    ingress: Vec<IngressRule>,
    allow_all_outbound: bool,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleSet {
    /// Create an empty rule set that allows all outbound traffic.
    pub fn new() -> Self {
        Self {
            ingress: Vec::new(),
            allow_all_outbound: true,
        }
    }

    /// Create a rule set from rules, validating each.
    pub fn with_rules(rules: Vec<IngressRule>) -> FirewallResult<Self> {
        let mut set = Self::new();
        for rule in rules {
            set.add_ingress(rule)?;
        }
        Ok(set)
    }

    /// Port 443/tcp from any IPv4 address.
    pub fn https_from_anywhere() -> Self {
        Self {
            ingress: vec![
                IngressRule::new(Peer::AnyIpv4, PortRange::tcp(443))
                    .with_description("Allow HTTPS from anywhere"),
            ],
            allow_all_outbound: true,
        }
    }

    /// All ICMP from members of `group`.
    pub fn icmp_from_group(group: impl Into<LogicalId>) -> Self {
        let group = group.into();
        let description = format!("Allow ICMP from {group}");
        Self {
            ingress: vec![
                IngressRule::new(Peer::SecurityGroup(group), PortRange::all_icmp())
                    .with_description(description),
            ],
            allow_all_outbound: true,
        }
    }

    /// Deny all outbound traffic instead of allowing it.
    pub fn deny_all_outbound(mut self) -> Self {
        self.allow_all_outbound = false;
        self
    }

    /// Add an ingress rule.
    ///
    /// # Errors
    ///
    /// Returns an error if the rule is malformed or the same permission is
    /// already present.
    pub fn add_ingress(&mut self, rule: IngressRule) -> FirewallResult<()> {
        rule.peer.validate()?;
        rule.ports.validate()?;

        if self.ingress.iter().any(|r| r.same_permission(&rule)) {
            return Err(FirewallError::DuplicateRule(rule.to_string()));
        }

        info!(rule = %rule, "Ingress rule added");
        self.ingress.push(rule);
        Ok(())
    }

    /// Add an ingress rule without a description.
    pub fn allow(&mut self, peer: Peer, ports: PortRange) -> FirewallResult<()> {
        self.add_ingress(IngressRule::new(peer, ports))
    }

    /// The ingress rules, in insertion order.
    pub fn rules(&self) -> &[IngressRule] {
        &self.ingress
    }

    /// Whether all outbound traffic is allowed.
    pub fn allows_all_outbound(&self) -> bool {
        self.allow_all_outbound
    }

    /// Get the number of ingress rules.
    pub fn len(&self) -> usize {
        self.ingress.len()
    }

    /// Check if there are no ingress rules.
    pub fn is_empty(&self) -> bool {
        self.ingress.is_empty()
    }

    /// Security groups referenced as peers, in rule order.
    pub fn referenced_groups(&self) -> Vec<LogicalId> {
        let mut groups: Vec<LogicalId> = Vec::new();
        for id in self.ingress.iter().filter_map(|r| r.peer.group()) {
            if !groups.contains(id) {
                groups.push(id.clone());
            }
        }
        groups
    }

    /// Check inbound traffic.
    ///
    /// Returns `Allowed` as soon as one rule matches. If none does, the
    /// traffic is denied.
    pub fn check(&self, traffic: &Traffic) -> Verdict {
        debug!(traffic = %traffic, "Checking ingress");

        for rule in &self.ingress {
            if rule.evaluate(traffic).is_allowed() {
                debug!(traffic = %traffic, rule = %rule, "Ingress allowed");
                return Verdict::Allowed;
            }
        }

        let message = if self
            .ingress
            .iter()
            .any(|r| r.peer.matches(&traffic.source))
        {
            "source is permitted but not for this protocol or port"
        } else {
            "no ingress rule permits this source"
        };

        warn!(traffic = %traffic, "Ingress denied: {}", message);
        Verdict::Denied(DenialReason::new(traffic.to_string(), message))
    }

    /// Require that inbound traffic is allowed.
    pub fn require(&self, traffic: &Traffic) -> FirewallResult<()> {
        self.check(traffic).to_result()
    }
}

/// Builder for constructing rule sets.
#[derive(Debug)]
pub struct RuleSetBuilder {
    rules: Vec<IngressRule>,
    allow_all_outbound: bool,
}

impl Default for RuleSetBuilder {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            allow_all_outbound: true,
        }
    }
}

impl RuleSetBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule.
    pub fn with(mut self, rule: IngressRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Allow traffic from a peer.
    pub fn allow(self, peer: Peer, ports: PortRange) -> Self {
        self.with(IngressRule::new(peer, ports))
    }

    /// Set the egress stance.
    pub fn allow_all_outbound(mut self, allow: bool) -> Self {
        self.allow_all_outbound = allow;
        self
    }

    /// Build the rule set.
    pub fn build(self) -> FirewallResult<RuleSet> {
        let mut set = RuleSet::with_rules(self.rules)?;
        set.allow_all_outbound = self.allow_all_outbound;
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::TrafficSource;

    #[test]
    fn test_empty_set_denies() {
        let set = RuleSet::new();
        assert!(set.is_empty());

        let verdict = set.check(&Traffic::tcp(TrafficSource::ipv4([1, 1, 1, 1]), 443));
        assert!(verdict.is_denied());
    }

    #[test]
    fn test_https_from_anywhere() {
        let set = RuleSet::https_from_anywhere();
        let source = TrafficSource::ipv4([203, 0, 113, 50]);

        assert!(set.check(&Traffic::tcp(source.clone(), 443)).is_allowed());
        assert!(set.check(&Traffic::tcp(source.clone(), 80)).is_denied());
        assert!(set.check(&Traffic::udp(source.clone(), 443)).is_denied());
        assert!(set.check(&Traffic::icmp(source)).is_denied());
        assert!(set.allows_all_outbound());
    }

    #[test]
    fn test_icmp_from_group_only() {
        let set = RuleSet::icmp_from_group("EdgeSg");

        assert!(set.check(&Traffic::icmp(TrafficSource::group("EdgeSg"))).is_allowed());
        assert!(set.check(&Traffic::icmp(TrafficSource::group("Other"))).is_denied());
        assert!(set.check(&Traffic::icmp(TrafficSource::ipv4([10, 0, 0, 5]))).is_denied());
        assert!(set.check(&Traffic::tcp(TrafficSource::group("EdgeSg"), 80)).is_denied());
        assert_eq!(set.referenced_groups(), vec![LogicalId::new("EdgeSg")]);
    }

    #[test]
    fn test_denial_message_distinguishes_port() {
        let set = RuleSet::icmp_from_group("EdgeSg");
        let verdict = set.check(&Traffic::tcp(TrafficSource::group("EdgeSg"), 22));
        match verdict {
            Verdict::Denied(reason) => {
                assert!(reason.message.contains("protocol or port"));
                assert_eq!(reason.traffic, "tcp/22 from sg:EdgeSg");
            }
            other => panic!("unexpected verdict: {other:?}"),
        }
    }

    #[test]
    fn test_require() {
        let set = RuleSet::https_from_anywhere();
        assert!(set.require(&Traffic::tcp(TrafficSource::ipv4([1, 2, 3, 4]), 443)).is_ok());
        assert!(matches!(
            set.require(&Traffic::tcp(TrafficSource::ipv4([1, 2, 3, 4]), 22)),
            Err(FirewallError::Denied { .. })
        ));
    }

    #[test]
    fn test_duplicate_rule_rejected() {
        let mut set = RuleSet::https_from_anywhere();
        let dup = IngressRule::new(Peer::any_ipv4(), PortRange::tcp(443)).with_description("again");
        assert!(matches!(set.add_ingress(dup), Err(FirewallError::DuplicateRule(_))));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_malformed_rules_rejected() {
        let mut set = RuleSet::new();
        assert!(matches!(
            set.allow(Peer::ipv4("300.0.0.0/8"), PortRange::tcp(22)),
            Err(FirewallError::InvalidCidr(_))
        ));
        assert!(matches!(
            set.allow(Peer::any_ipv4(), PortRange::tcp_range(90, 80)),
            Err(FirewallError::InvalidPortRange(_))
        ));
        assert!(set.is_empty());
    }

    #[test]
    fn test_builder() {
        let set = RuleSetBuilder::new()
            .allow(Peer::ipv4("10.0.0.0/16"), PortRange::tcp(22))
            .allow(Peer::security_group("Lb"), PortRange::tcp(80))
            .allow(Peer::security_group("Lb"), PortRange::all_icmp())
            .allow_all_outbound(false)
            .build()
            .unwrap();

        assert_eq!(set.len(), 3);
        assert!(!set.allows_all_outbound());
        assert_eq!(set.referenced_groups(), vec![LogicalId::new("Lb")]);
        assert!(set.check(&Traffic::tcp(TrafficSource::ipv4([10, 0, 9, 9]), 22)).is_allowed());
    }

    #[test]
    fn test_builder_rejects_duplicates() {
        let result = RuleSetBuilder::new()
            .allow(Peer::any_ipv4(), PortRange::tcp(443))
            .allow(Peer::any_ipv4(), PortRange::tcp(443))
            .build();
        assert!(result.is_err());
    }
}
