//! Typed resource descriptors.
//!
//! Every node of a stack graph is a [`Resource`]. Descriptors hold attributes
//! and references (logical ids) to other descriptors; they never hold cloud
//! state.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use nodestack_core::config::parse_ipv4_cidr;
use nodestack_core::{
    CapacityConfig, ConfigError, ConfigResult, GraphNode, LogicalId, MachineImage, NetworkConfig,
    ResourceKind, StackGraph, SUBNET_CIDR_MASK, VolumeType,
};
use nodestack_firewall::RuleSet;

/// The graph type produced by a stack build.
pub type NodeGraph = StackGraph<Resource>;

/// A resource descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resource {
    /// VPC with its subnet tiers.
    Network(NetworkSpec),
    /// Existing hosted zone.
    HostedZone(HostedZoneRef),
    /// TLS certificate request.
    Certificate(CertificateSpec),
    /// Security group.
    SecurityGroup(SecurityGroupSpec),
    /// Application load balancer.
    LoadBalancer(LoadBalancerSpec),
    /// Load balancer listener.
    Listener(ListenerSpec),
    /// Autoscaling group.
    AutoScalingGroup(AutoScalingGroupSpec),
    /// CPU target-tracking policy.
    ScalingPolicy(CpuScalingPolicy),
    /// Listener target registration.
    TargetGroup(TargetGroupSpec),
    /// DNS alias record.
    AliasRecord(AliasRecordSpec),
}

impl GraphNode for Resource {
    fn kind(&self) -> ResourceKind {
        match self {
            Resource::Network(_) => ResourceKind::Network,
            Resource::HostedZone(_) => ResourceKind::HostedZone,
            Resource::Certificate(_) => ResourceKind::Certificate,
            Resource::SecurityGroup(_) => ResourceKind::SecurityGroup,
            Resource::LoadBalancer(_) => ResourceKind::LoadBalancer,
            Resource::Listener(_) => ResourceKind::Listener,
            Resource::AutoScalingGroup(_) => ResourceKind::AutoScalingGroup,
            Resource::ScalingPolicy(_) => ResourceKind::ScalingPolicy,
            Resource::TargetGroup(_) => ResourceKind::TargetGroup,
            Resource::AliasRecord(_) => ResourceKind::AliasRecord,
        }
    }

    fn dependencies(&self) -> Vec<LogicalId> {
        match self {
            Resource::Network(_) | Resource::HostedZone(_) => Vec::new(),
            Resource::Certificate(c) => match &c.validation {
                CertificateValidation::Dns { zone } => vec![zone.clone()],
            },
            Resource::SecurityGroup(sg) => {
                let mut deps = vec![sg.network.clone()];
                deps.extend(sg.rules.referenced_groups());
                deps
            }
            Resource::LoadBalancer(lb) => vec![lb.network.clone(), lb.security_group.clone()],
            Resource::Listener(l) => {
                let mut deps = vec![l.load_balancer.clone()];
                deps.extend(l.certificates.iter().cloned());
                deps
            }
            Resource::AutoScalingGroup(asg) => {
                vec![asg.network.clone(), asg.security_group.clone()]
            }
            Resource::ScalingPolicy(p) => vec![p.group.clone()],
            Resource::TargetGroup(tg) => {
                let mut deps = vec![tg.listener.clone()];
                deps.extend(tg.targets.iter().cloned());
                deps.push(tg.network.clone());
                deps
            }
            Resource::AliasRecord(r) => vec![r.zone.clone(), r.load_balancer.clone()],
        }
    }
}

/// Subnet tier flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubnetKind {
    /// Routed to the internet gateway.
    Public,
    /// No route outside the VPC.
    PrivateIsolated,
}

/// A named subnet tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetTier {
    /// Tier name, used in child logical ids.
    pub name: String,
    /// Tier flavor.
    pub kind: SubnetKind,
}

/// One concrete subnet of a tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubnetAllocation {
    /// Tier name.
    pub tier: String,
    /// Tier flavor.
    pub kind: SubnetKind,
    /// Zero-based availability zone index.
    pub az_index: u8,
    /// Allocated block.
    pub cidr: String,
}

impl SubnetAllocation {
    /// Logical id of this subnet under `network`.
    pub fn logical_id(&self, network: &LogicalId) -> LogicalId {
        network.child(&format!("{}Subnet{}", self.tier, self.az_index + 1))
    }
}

/// VPC with a public and an isolated tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSpec {
    /// VPC range.
    pub cidr: String,
    /// Number of availability zones.
    pub max_azs: u8,
    /// Mask of every subnet.
    pub subnet_mask: u8,
    /// Tiers, in allocation order.
    pub tiers: Vec<SubnetTier>,
}

impl NetworkSpec {
    /// The two-tier layout used by the node host.
    pub fn two_tier(config: &NetworkConfig) -> Self {
        Self {
            cidr: config.cidr.clone(),
            max_azs: config.max_azs,
            subnet_mask: SUBNET_CIDR_MASK,
            tiers: vec![
                SubnetTier {
                    name: "Public".to_string(),
                    kind: SubnetKind::Public,
                },
                SubnetTier {
                    name: "Private".to_string(),
                    kind: SubnetKind::PrivateIsolated,
                },
            ],
        }
    }

    /// Carve the VPC range into one subnet per tier per AZ.
    ///
    /// Blocks are handed out consecutively: every AZ of the first tier, then
    /// every AZ of the next.
    pub fn allocate(&self) -> ConfigResult<Vec<SubnetAllocation>> {
        let invalid = |reason: String| ConfigError::InvalidVariable {
            name: "network.cidr",
            reason,
        };

        let (base, mask) = parse_ipv4_cidr(&self.cidr)
            .ok_or_else(|| invalid(format!("'{}' is not an IPv4 CIDR block", self.cidr)))?;
        if mask > self.subnet_mask || self.subnet_mask > 32 {
            return Err(invalid(format!(
                "/{} subnets do not fit in '{}'",
                self.subnet_mask, self.cidr
            )));
        }

        let network_bits = if mask == 0 { 0 } else { u32::MAX << (32 - mask) };
        let base = u32::from(base) & network_bits;
        let block = 1u64 << (32 - self.subnet_mask);
        let capacity = 1u64 << (self.subnet_mask - mask);

        let mut allocations = Vec::new();
        let mut index: u64 = 0;
        for tier in &self.tiers {
            for az in 0..self.max_azs {
                if index >= capacity {
                    return Err(invalid(format!(
                        "'{}' holds only {} /{} subnets",
                        self.cidr, capacity, self.subnet_mask
                    )));
                }
                let addr = Ipv4Addr::from(base + (index * block) as u32);
                allocations.push(SubnetAllocation {
                    tier: tier.name.clone(),
                    kind: tier.kind,
                    az_index: az,
                    cidr: format!("{}/{}", addr, self.subnet_mask),
                });
                index += 1;
            }
        }
        Ok(allocations)
    }

    /// Allocations of one tier flavor.
    pub fn subnets_of(&self, kind: SubnetKind) -> ConfigResult<Vec<SubnetAllocation>> {
        Ok(self
            .allocate()?
            .into_iter()
            .filter(|a| a.kind == kind)
            .collect())
    }
}

/// An existing hosted zone, looked up by attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedZoneRef {
    /// Zone id.
    pub zone_id: String,
    /// Apex name.
    pub zone_name: String,
}

/// How certificate ownership is proven.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum CertificateValidation {
    /// DNS validation records in the given zone.
    Dns {
        /// Zone holding the validation records.
        zone: LogicalId,
    },
}

/// A certificate request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateSpec {
    /// Requested domain, possibly a wildcard.
    pub domain_name: String,
    /// Display name.
    pub certificate_name: String,
    /// Validation method.
    pub validation: CertificateValidation,
}

impl CertificateSpec {
    /// Request a DNS-validated certificate.
    ///
    /// # Errors
    ///
    /// A wildcard is allowed once, as the whole first label.
    pub fn dns_validated(
        domain_name: impl Into<String>,
        certificate_name: impl Into<String>,
        zone: LogicalId,
    ) -> ConfigResult<Self> {
        let domain_name = domain_name.into();
        validate_certificate_domain(&domain_name)?;
        Ok(Self {
            domain_name,
            certificate_name: certificate_name.into(),
            validation: CertificateValidation::Dns { zone },
        })
    }

    /// Whether the certificate covers every name one label below its apex.
    pub fn is_wildcard(&self) -> bool {
        self.domain_name.starts_with("*.")
    }
}

fn validate_certificate_domain(domain: &str) -> ConfigResult<()> {
    let wildcards = domain.matches('*').count();
    let rest = match wildcards {
        0 => domain,
        1 => domain
            .strip_prefix("*.")
            .ok_or_else(|| ConfigError::InvalidDomain(domain.to_string()))?,
        _ => return Err(ConfigError::InvalidDomain(domain.to_string())),
    };
    nodestack_core::config::validate_domain(rest.trim_end_matches('.'))
}

/// A security group in a network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroupSpec {
    /// Owning network.
    pub network: LogicalId,
    /// Group description.
    pub description: String,
    /// Ingress rules and egress stance.
    pub rules: RuleSet,
}

/// Load balancer exposure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoadBalancerScheme {
    /// Reachable from the internet.
    InternetFacing,
    /// Reachable inside the VPC only.
    Internal,
}

impl LoadBalancerScheme {
    /// Scheme name.
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadBalancerScheme::InternetFacing => "internet-facing",
            LoadBalancerScheme::Internal => "internal",
        }
    }
}

/// An application load balancer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancerSpec {
    /// Physical name.
    pub name: String,
    /// Exposure.
    pub scheme: LoadBalancerScheme,
    /// Network it lives in.
    pub network: LogicalId,
    /// Subnet tier it is placed in.
    pub subnets: SubnetKind,
    /// Guarding security group.
    pub security_group: LogicalId,
}

/// Listener protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ListenerProtocol {
    /// Plain HTTP.
    Http,
    /// TLS-terminated HTTP.
    Https,
}

impl ListenerProtocol {
    /// Protocol name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ListenerProtocol::Http => "HTTP",
            ListenerProtocol::Https => "HTTPS",
        }
    }
}

/// A listener on a load balancer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerSpec {
    /// Owning load balancer.
    pub load_balancer: LogicalId,
    /// Listening port.
    pub port: u16,
    /// Protocol.
    pub protocol: ListenerProtocol,
    /// Certificates served.
    pub certificates: Vec<LogicalId>,
    /// Whether the listener's security group is opened to the world.
    pub open: bool,
}

/// Instance health check source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthCheck {
    /// EC2 status checks.
    Ec2,
    /// Load balancer target health.
    Elb,
}

impl HealthCheck {
    /// Health check type name.
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthCheck::Ec2 => "EC2",
            HealthCheck::Elb => "ELB",
        }
    }
}

/// An EBS block device mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDevice {
    /// Device name.
    pub device_name: String,
    /// Size in GiB.
    pub size_gib: u32,
    /// Volume type.
    pub volume_type: VolumeType,
}

/// The backend autoscaling group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoScalingGroupSpec {
    /// Network it lives in.
    pub network: LogicalId,
    /// Subnet tier instances are placed in.
    pub subnets: SubnetKind,
    /// Instance security group.
    pub security_group: LogicalId,
    /// Instance type.
    pub instance_type: String,
    /// Region to image mapping.
    pub image: MachineImage,
    /// Image id resolved for the target region.
    pub image_id: String,
    /// Capacity bounds.
    pub capacity: CapacityConfig,
    /// Spot price ceiling.
    pub spot_price: Option<String>,
    /// Health check source.
    pub health_check: HealthCheck,
    /// Block devices.
    pub block_devices: Vec<BlockDevice>,
    /// Key pair name.
    pub key_name: String,
    /// Whether instances may reach anything outbound.
    pub allow_all_outbound: bool,
}

/// CPU utilization target tracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuScalingPolicy {
    /// Scaled group.
    pub group: LogicalId,
    /// Target average CPU, in percent.
    pub target_utilization_percent: u8,
    /// Cooldown, in seconds.
    pub cooldown_secs: u64,
    /// Instance warm-up, in seconds.
    pub estimated_warmup_secs: u64,
}

/// Target group protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TargetProtocol {
    /// Plain HTTP.
    Http,
}

impl TargetProtocol {
    /// Protocol name.
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetProtocol::Http => "HTTP",
        }
    }
}

/// Registration of backends behind a listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetGroupSpec {
    /// Physical name.
    pub name: String,
    /// Listener forwarding to this group.
    pub listener: LogicalId,
    /// Backend port.
    pub port: u16,
    /// Backend protocol.
    pub protocol: TargetProtocol,
    /// Registered autoscaling groups.
    pub targets: Vec<LogicalId>,
    /// Network of the targets.
    pub network: LogicalId,
}

/// A DNS A record aliased to a load balancer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasRecordSpec {
    /// Zone holding the record.
    pub zone: LogicalId,
    /// Fully qualified record name.
    pub record_name: String,
    /// Alias target.
    pub load_balancer: LogicalId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_tier_allocation() {
        let network = NetworkSpec::two_tier(&NetworkConfig::default());
        let subnets = network.allocate().unwrap();

        let cidrs: Vec<&str> = subnets.iter().map(|s| s.cidr.as_str()).collect();
        assert_eq!(
            cidrs,
            vec!["10.0.0.0/24", "10.0.1.0/24", "10.0.2.0/24", "10.0.3.0/24"]
        );
        assert_eq!(subnets[0].kind, SubnetKind::Public);
        assert_eq!(subnets[2].kind, SubnetKind::PrivateIsolated);
        assert_eq!(subnets[3].az_index, 1);
    }

    #[test]
    fn test_allocation_uses_network_address() {
        let config = NetworkConfig::new().with_cidr("172.16.5.9/16").with_max_azs(1);
        let network = NetworkSpec::two_tier(&config);
        let isolated = network.subnets_of(SubnetKind::PrivateIsolated).unwrap();
        assert_eq!(isolated.len(), 1);
        assert_eq!(isolated[0].cidr, "172.16.1.0/24");
    }

    #[test]
    fn test_allocation_overflow() {
        let config = NetworkConfig::new().with_cidr("10.0.0.0/23");
        let network = NetworkSpec::two_tier(&config);
        assert!(matches!(
            network.allocate(),
            Err(ConfigError::InvalidVariable { .. })
        ));
    }

    #[test]
    fn test_subnet_logical_id() {
        let network = NetworkSpec::two_tier(&NetworkConfig::default());
        let subnets = network.allocate().unwrap();
        let vpc = LogicalId::new("NodeVpc");
        assert_eq!(subnets[1].logical_id(&vpc).as_str(), "NodeVpcPublicSubnet2");
        assert_eq!(subnets[2].logical_id(&vpc).as_str(), "NodeVpcPrivateSubnet1");
    }

    #[test]
    fn test_certificate_wildcard_rules() {
        let zone = LogicalId::new("Zone");
        let cert = CertificateSpec::dns_validated("*.example.com", "Cert", zone.clone()).unwrap();
        assert!(cert.is_wildcard());
        assert!(CertificateSpec::dns_validated("example.com", "Cert", zone.clone()).is_ok());
        assert!(CertificateSpec::dns_validated("*.*.example.com", "Cert", zone.clone()).is_err());
        assert!(CertificateSpec::dns_validated("www.*.example.com", "Cert", zone.clone()).is_err());
        assert!(CertificateSpec::dns_validated("*example.com", "Cert", zone).is_err());
    }

    #[test]
    fn test_dependencies() {
        let sg = Resource::SecurityGroup(SecurityGroupSpec {
            network: LogicalId::new("Vpc"),
            description: "nodes".to_string(),
            rules: RuleSet::icmp_from_group("EdgeSg"),
        });
        assert_eq!(sg.kind(), ResourceKind::SecurityGroup);
        assert_eq!(
            sg.dependencies(),
            vec![LogicalId::new("Vpc"), LogicalId::new("EdgeSg")]
        );

        let record = Resource::AliasRecord(AliasRecordSpec {
            zone: LogicalId::new("Zone"),
            record_name: "www.node.example.com".to_string(),
            load_balancer: LogicalId::new("Lb"),
        });
        assert_eq!(
            record.dependencies(),
            vec![LogicalId::new("Zone"), LogicalId::new("Lb")]
        );
    }

    #[test]
    fn test_resource_serializes_with_kind_tag() {
        let zone = Resource::HostedZone(HostedZoneRef {
            zone_id: "Z1".to_string(),
            zone_name: "example.com".to_string(),
        });
        let json = serde_json::to_value(&zone).unwrap();
        assert_eq!(json["kind"], "hosted_zone");
        assert_eq!(json["zone_id"], "Z1");
    }
}
