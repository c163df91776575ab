//! The node host stack definition.
//!
//! [`define`] declares every resource of the stack, in dependency order, into
//! a fresh graph. The graph is only handed back when every step succeeded.

use tracing::{debug, info};

use nodestack_core::{GraphNode, LogicalId, MachineImage, Region, StackConfig};
use nodestack_firewall::{IngressRule, Peer, PortRange, RuleSet};
use nodestack_observe::{BuildEvent, EventDispatcher};

use crate::StackError;
use crate::resource::{
    AliasRecordSpec, AutoScalingGroupSpec, BlockDevice, CertificateSpec, CpuScalingPolicy,
    HealthCheck, HostedZoneRef, ListenerProtocol, ListenerSpec, LoadBalancerScheme,
    LoadBalancerSpec, NetworkSpec, NodeGraph, Resource, SecurityGroupSpec, SubnetKind,
    TargetGroupSpec, TargetProtocol,
};

/// Logical ids of every resource in the stack, derived from the resource
/// prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackIds {
    /// Prefix shared by all ids.
    pub prefix: String,
    /// VPC.
    pub network: LogicalId,
    /// Hosted zone lookup.
    pub hosted_zone: LogicalId,
    /// Certificate.
    pub certificate: LogicalId,
    /// Load balancer security group.
    pub edge_security_group: LogicalId,
    /// Load balancer.
    pub load_balancer: LogicalId,
    /// HTTPS listener.
    pub listener: LogicalId,
    /// Instance security group.
    pub node_security_group: LogicalId,
    /// Autoscaling group.
    pub auto_scaling_group: LogicalId,
    /// CPU scaling policy.
    pub scaling_policy: LogicalId,
    /// Listener target group.
    pub target_group: LogicalId,
    /// DNS record.
    pub alias_record: LogicalId,
}

impl StackIds {
    /// Derive ids from a prefix.
    pub fn new(prefix: &str) -> Self {
        let id = |suffix: &str| LogicalId::prefixed(prefix, suffix);
        Self {
            prefix: prefix.to_string(),
            network: id("Vpc"),
            hosted_zone: id("HostedZone"),
            certificate: id("Certificate"),
            edge_security_group: id("ELBSecurityGroup"),
            load_balancer: id("LB"),
            listener: id("LBListener"),
            node_security_group: id("NodeSecurityGroup"),
            auto_scaling_group: id("AutoScalingGroup"),
            scaling_policy: id("CpuScaling"),
            target_group: id("ASGTargets"),
            alias_record: id("ARecord"),
        }
    }

    /// Physical name of a resource: the prefix plus a suffix.
    pub fn name(&self, suffix: &str) -> String {
        format!("{}{}", self.prefix, suffix)
    }
}

/// Declares resources into a graph and reports each one.
struct Declarer<'a> {
    graph: NodeGraph,
    events: &'a EventDispatcher,
}

impl Declarer<'_> {
    fn declare(&mut self, id: &LogicalId, resource: Resource) -> Result<(), StackError> {
        let kind = resource.kind();
        let dependencies = resource.dependencies();

        self.graph.insert(id.clone(), resource)?;

        info!(id = %id, kind = %kind, "Resource declared");
        self.events.emit(BuildEvent::ResourceDeclared {
            id: id.clone(),
            kind,
            dependencies,
        });
        Ok(())
    }

    fn declare_group(
        &mut self,
        id: &LogicalId,
        network: &LogicalId,
        description: &str,
        rules: RuleSet,
    ) -> Result<(), StackError> {
        let rendered: Vec<String> = rules.rules().iter().map(ToString::to_string).collect();
        self.declare(
            id,
            Resource::SecurityGroup(SecurityGroupSpec {
                network: network.clone(),
                description: description.to_string(),
                rules,
            }),
        )?;
        for rule in rendered {
            self.events.emit(BuildEvent::RuleAdded {
                group: id.clone(),
                rule,
            });
        }
        Ok(())
    }
}

/// Declare every resource of the node host stack.
///
/// `region` must be the result of validating `config`.
pub fn define(
    config: &StackConfig,
    region: Region,
    ids: &StackIds,
    events: &EventDispatcher,
) -> Result<NodeGraph, StackError> {
    let vars = &config.variables;
    let policy = &config.policy;

    // An unmapped region must leave the graph empty.
    let image = MachineImage::for_region(region, vars.os_specification.image_id.clone());
    let image_id = image.resolve(region)?.to_string();

    let mut stack = Declarer {
        graph: NodeGraph::new(),
        events,
    };

    // 1. network
    let network = NetworkSpec::two_tier(&config.network);
    network.allocate()?;
    stack.declare(&ids.network, Resource::Network(network))?;

    // 2. hosted zone lookup
    stack.declare(
        &ids.hosted_zone,
        Resource::HostedZone(HostedZoneRef {
            zone_id: vars.zone_id.clone(),
            zone_name: vars.zone_name.clone(),
        }),
    )?;

    // 3. certificate
    let certificate = CertificateSpec::dns_validated(
        vars.certificate_domain(),
        ids.name("Cert"),
        ids.hosted_zone.clone(),
    )?;
    stack.declare(&ids.certificate, Resource::Certificate(certificate))?;

    // 4. edge security group
    stack.declare_group(
        &ids.edge_security_group,
        &ids.network,
        "Load balancer security group",
        edge_rules(policy.listener_port)?,
    )?;

    // 5. load balancer
    stack.declare(
        &ids.load_balancer,
        Resource::LoadBalancer(LoadBalancerSpec {
            name: ids.name("LB"),
            scheme: LoadBalancerScheme::InternetFacing,
            network: ids.network.clone(),
            subnets: SubnetKind::Public,
            security_group: ids.edge_security_group.clone(),
        }),
    )?;

    // 6. listener
    stack.declare(
        &ids.listener,
        Resource::Listener(ListenerSpec {
            load_balancer: ids.load_balancer.clone(),
            port: policy.listener_port,
            protocol: ListenerProtocol::Https,
            certificates: vec![ids.certificate.clone()],
            open: true,
        }),
    )?;

    // 7. image
    debug!(region = %region, image = %image_id, "Machine image resolved");
    events.emit(BuildEvent::ImageResolved {
        region,
        image_id: image_id.clone(),
    });

    // 8. instance security group
    stack.declare_group(
        &ids.node_security_group,
        &ids.network,
        "Node instance security group",
        RuleSet::icmp_from_group(ids.edge_security_group.clone()),
    )?;

    // 9. autoscaling group
    let root_volume = &policy.root_volume;
    stack.declare(
        &ids.auto_scaling_group,
        Resource::AutoScalingGroup(AutoScalingGroupSpec {
            network: ids.network.clone(),
            subnets: SubnetKind::PrivateIsolated,
            security_group: ids.node_security_group.clone(),
            instance_type: policy.instance_type.clone(),
            image,
            image_id,
            capacity: policy.capacity,
            spot_price: policy.spot_price.clone(),
            health_check: HealthCheck::Ec2,
            block_devices: vec![BlockDevice {
                device_name: root_volume
                    .device_name
                    .clone()
                    .unwrap_or_else(|| ids.name("RootVolume")),
                size_gib: root_volume.size_gib,
                volume_type: root_volume.volume_type,
            }],
            key_name: vars.ssh_key_name.clone(),
            allow_all_outbound: true,
        }),
    )?;

    // 10. scaling policy
    stack.declare(
        &ids.scaling_policy,
        Resource::ScalingPolicy(CpuScalingPolicy {
            group: ids.auto_scaling_group.clone(),
            target_utilization_percent: policy.scaling.target_utilization_percent,
            cooldown_secs: policy.scaling.cooldown_secs,
            estimated_warmup_secs: policy.scaling.estimated_warmup_secs,
        }),
    )?;

    // 11. targets
    stack.declare(
        &ids.target_group,
        Resource::TargetGroup(TargetGroupSpec {
            name: ids.name("ASGTargets"),
            listener: ids.listener.clone(),
            port: policy.backend_port,
            protocol: TargetProtocol::Http,
            targets: vec![ids.auto_scaling_group.clone()],
            network: ids.network.clone(),
        }),
    )?;

    // 12. DNS record
    stack.declare(
        &ids.alias_record,
        Resource::AliasRecord(AliasRecordSpec {
            zone: ids.hosted_zone.clone(),
            record_name: vars.published_hostname(),
            load_balancer: ids.load_balancer.clone(),
        }),
    )?;

    Ok(stack.graph)
}

fn edge_rules(port: u16) -> Result<RuleSet, StackError> {
    if port == 443 {
        return Ok(RuleSet::https_from_anywhere());
    }
    let mut rules = RuleSet::new();
    rules.add_ingress(
        IngressRule::new(Peer::AnyIpv4, PortRange::tcp(port))
            .with_description(format!("Allow TCP {port} from anywhere")),
    )?;
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodestack_core::{ResourceKind, StackEnvironment, StackVariables};

    fn config(region: &str) -> StackConfig {
        StackConfig::new(
            StackVariables::new("Z0123456789", "example.com", "node", "ami-1234", "ops-key"),
            StackEnvironment::new(region),
        )
    }

    #[test]
    fn test_ids_follow_prefix() {
        let ids = StackIds::new("XrplNodeHost");
        assert_eq!(ids.network.as_str(), "XrplNodeHostVpc");
        assert_eq!(ids.load_balancer.as_str(), "XrplNodeHostLB");
        assert_eq!(ids.name("ASGTargets"), "XrplNodeHostASGTargets");
    }

    #[test]
    fn test_define_declares_twelve_steps() {
        let config = config("us-east-1");
        let region = config.validate().unwrap();
        let ids = StackIds::new(&config.resource_prefix);
        let graph = define(&config, region, &ids, &EventDispatcher::new()).unwrap();

        assert_eq!(graph.len(), 11);
        assert_eq!(graph.by_kind(ResourceKind::SecurityGroup).len(), 2);
        assert!(graph.depends_on(&ids.alias_record, &ids.network));
        assert!(graph.depends_on(&ids.target_group, &ids.certificate));
        assert!(!graph.depends_on(&ids.load_balancer, &ids.auto_scaling_group));
    }

    #[test]
    fn test_custom_listener_port_rules() {
        let rules = edge_rules(8443).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules.rules()[0].ports, PortRange::tcp(8443));
    }
}
