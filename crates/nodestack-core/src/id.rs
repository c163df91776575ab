//! Logical resource identifiers and resource kinds.
//!
//! Every resource in a stack carries a [`LogicalId`]. Cross-references between
//! resources are expressed through these ids, never through pointers, so the
//! graph can be inspected, compared and rendered without any cloud state.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identity of a resource inside a stack.
///
/// # Example
///
/// ```
/// use nodestack_core::LogicalId;
///
/// let vpc = LogicalId::new("XrplNodeHostVpc");
/// let lb = LogicalId::prefixed("XrplNodeHost", "LB");
///
/// assert_ne!(vpc, lb);
/// assert_eq!(lb.as_str(), "XrplNodeHostLB");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogicalId(Cow<'static, str>);

impl LogicalId {
    /// Create a new logical id.
    pub fn new(id: impl Into<Cow<'static, str>>) -> Self {
        Self(id.into())
    }

    /// Create an id by joining a stack prefix and a suffix.
    pub fn prefixed(prefix: &str, suffix: &str) -> Self {
        Self(Cow::Owned(format!("{prefix}{suffix}")))
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derive a child id, e.g. a subnet of a network.
    pub fn child(&self, suffix: &str) -> Self {
        Self::prefixed(&self.0, suffix)
    }
}

impl fmt::Display for LogicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for LogicalId {
    fn from(s: &'static str) -> Self {
        Self::new(s)
    }
}

impl From<String> for LogicalId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// The kind of a resource descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// VPC with its subnet tiers.
    Network,
    /// An existing hosted zone, looked up by attributes.
    HostedZone,
    /// TLS certificate request.
    Certificate,
    /// Security group with ingress rules.
    SecurityGroup,
    /// Application load balancer.
    LoadBalancer,
    /// Load balancer listener.
    Listener,
    /// Autoscaling group of backend instances.
    AutoScalingGroup,
    /// Target-tracking scaling policy.
    ScalingPolicy,
    /// Listener target registration.
    TargetGroup,
    /// DNS alias record.
    AliasRecord,
}

impl ResourceKind {
    /// Get the kind name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Network => "network",
            ResourceKind::HostedZone => "hosted_zone",
            ResourceKind::Certificate => "certificate",
            ResourceKind::SecurityGroup => "security_group",
            ResourceKind::LoadBalancer => "load_balancer",
            ResourceKind::Listener => "listener",
            ResourceKind::AutoScalingGroup => "auto_scaling_group",
            ResourceKind::ScalingPolicy => "scaling_policy",
            ResourceKind::TargetGroup => "target_group",
            ResourceKind::AliasRecord => "alias_record",
        }
    }

    /// Whether the resource already exists outside the stack.
    ///
    /// Imported resources take part in the dependency graph but are never
    /// created by the provisioning engine.
    pub fn is_imported(&self) -> bool {
        matches!(self, ResourceKind::HostedZone)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logical_id_equality() {
        let a = LogicalId::new("Vpc");
        let b = LogicalId::from(String::from("Vpc"));
        assert_eq!(a, b);
        assert_ne!(a, LogicalId::new("Lb"));
    }

    #[test]
    fn test_prefixed_and_child() {
        let vpc = LogicalId::prefixed("XrplNodeHost", "Vpc");
        assert_eq!(vpc.as_str(), "XrplNodeHostVpc");
        assert_eq!(vpc.child("PublicSubnet1").as_str(), "XrplNodeHostVpcPublicSubnet1");
    }

    #[test]
    fn test_logical_id_serializes_as_string() {
        let id = LogicalId::new("Listener");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"Listener\"");
    }

    #[test]
    fn test_imported_kinds() {
        assert!(ResourceKind::HostedZone.is_imported());
        assert!(!ResourceKind::LoadBalancer.is_imported());
        assert_eq!(ResourceKind::AutoScalingGroup.to_string(), "auto_scaling_group");
    }
}
