//! Deployment template synthesis.
//!
//! Renders a stack graph as a CloudFormation-format JSON document. Resources
//! appear in build order; imported resources are referenced, never emitted.

use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Value, json};
use tracing::debug;

use nodestack_core::{GraphNode, LogicalId};
use nodestack_firewall::{ANY_IPV4_CIDR, IngressRule, Peer, RuleSet};

use crate::StackError;
use crate::resource::{
    AliasRecordSpec, AutoScalingGroupSpec, CertificateSpec, CertificateValidation,
    CpuScalingPolicy, ListenerSpec, LoadBalancerSpec, NetworkSpec, NodeGraph, Resource,
    SecurityGroupSpec, SubnetKind, TargetGroupSpec,
};

/// Template format version.
pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

/// A rendered template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Template {
    /// Format version.
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub version: String,
    /// Free-form description.
    #[serde(rename = "Description")]
    pub description: String,
    /// Resources, in build order.
    #[serde(rename = "Resources", serialize_with = "ordered_map")]
    pub resources: Vec<(String, TemplateResource)>,
    /// Stack outputs.
    #[serde(rename = "Outputs")]
    pub outputs: BTreeMap<String, TemplateOutput>,
}

/// One template resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateResource {
    /// Resource type, e.g. `AWS::EC2::VPC`.
    #[serde(rename = "Type")]
    pub ty: String,
    /// Explicit creation dependencies.
    #[serde(rename = "DependsOn", skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    /// Resource properties.
    #[serde(rename = "Properties")]
    pub properties: Value,
}

/// One stack output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateOutput {
    /// Description.
    #[serde(rename = "Description")]
    pub description: String,
    /// Value expression.
    #[serde(rename = "Value")]
    pub value: Value,
}

fn ordered_map<S>(entries: &[(String, TemplateResource)], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(entries.len()))?;
    for (name, resource) in entries {
        map.serialize_entry(name, resource)?;
    }
    map.end()
}

impl Template {
    fn new(description: impl Into<String>) -> Self {
        Self {
            version: TEMPLATE_FORMAT_VERSION.to_string(),
            description: description.into(),
            resources: Vec::new(),
            outputs: BTreeMap::new(),
        }
    }

    fn push(&mut self, name: &LogicalId, ty: &str, depends_on: Vec<String>, properties: Value) {
        self.resources.push((
            name.to_string(),
            TemplateResource {
                ty: ty.to_string(),
                depends_on,
                properties,
            },
        ));
    }

    /// Look up a resource by logical id.
    pub fn resource(&self, name: &str) -> Option<&TemplateResource> {
        self.resources
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, r)| r)
    }

    /// Logical ids of all emitted resources, in order.
    pub fn resource_names(&self) -> Vec<&str> {
        self.resources.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Serialize to pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String, StackError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Serialize to compact JSON.
    pub fn to_json(&self) -> Result<String, StackError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A template bound to the stack it deploys.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SynthesizedStack {
    /// Stack name.
    pub stack_name: String,
    /// Target region.
    pub region: String,
    /// Rendered template.
    pub template: Template,
}

fn reference(id: &LogicalId) -> Value {
    json!({ "Ref": id.as_str() })
}

fn attribute(id: &LogicalId, attr: &str) -> Value {
    json!({ "Fn::GetAtt": [id.as_str(), attr] })
}

/// Renders graph nodes into template resources.
struct Renderer<'a> {
    graph: &'a NodeGraph,
    template: Template,
}

impl Renderer<'_> {
    /// A reference to a node; imported zones render as their literal id.
    fn resolve(&self, id: &LogicalId) -> Value {
        match self.graph.get(id) {
            Some(Resource::HostedZone(zone)) => json!(zone.zone_id),
            _ => reference(id),
        }
    }

    /// Graph dependencies that exist in the template.
    fn depends_on(&self, id: &LogicalId) -> Vec<String> {
        self.graph
            .dependencies_of(id)
            .into_iter()
            .filter(|dep| {
                self.graph
                    .get(dep)
                    .is_some_and(|r| !r.kind().is_imported())
            })
            .map(|dep| dep.to_string())
            .collect()
    }

    /// Target groups that register behind `id`.
    fn target_groups_of(&self, id: &LogicalId) -> Vec<LogicalId> {
        self.graph
            .dependents_of(id)
            .into_iter()
            .filter(|d| matches!(self.graph.get(d), Some(Resource::TargetGroup(_))))
            .collect()
    }

    fn subnet_refs(&self, network: &LogicalId, kind: SubnetKind) -> Result<Vec<Value>, StackError> {
        let Some(Resource::Network(spec)) = self.graph.get(network) else {
            return Ok(Vec::new());
        };
        Ok(spec
            .subnets_of(kind)?
            .iter()
            .map(|s| reference(&s.logical_id(network)))
            .collect())
    }

    fn render(&mut self, id: &LogicalId, resource: &Resource) -> Result<(), StackError> {
        match resource {
            Resource::Network(spec) => self.network(id, spec)?,
            Resource::HostedZone(_) => {}
            Resource::Certificate(spec) => self.certificate(id, spec),
            Resource::SecurityGroup(spec) => self.security_group(id, spec),
            Resource::LoadBalancer(spec) => self.load_balancer(id, spec)?,
            Resource::Listener(spec) => self.listener(id, spec),
            Resource::AutoScalingGroup(spec) => self.auto_scaling_group(id, spec)?,
            Resource::ScalingPolicy(spec) => self.scaling_policy(id, spec),
            Resource::TargetGroup(spec) => self.target_group(id, spec),
            Resource::AliasRecord(spec) => self.alias_record(id, spec),
        }
        Ok(())
    }

    fn network(&mut self, id: &LogicalId, spec: &NetworkSpec) -> Result<(), StackError> {
        let igw = id.child("IGW");
        let attachment = id.child("VPCGW");

        self.template.push(
            id,
            "AWS::EC2::VPC",
            Vec::new(),
            json!({
                "CidrBlock": spec.cidr,
                "EnableDnsHostnames": true,
                "EnableDnsSupport": true,
                "Tags": [{ "Key": "Name", "Value": id.as_str() }],
            }),
        );
        self.template
            .push(&igw, "AWS::EC2::InternetGateway", Vec::new(), json!({}));
        self.template.push(
            &attachment,
            "AWS::EC2::VPCGatewayAttachment",
            Vec::new(),
            json!({ "VpcId": reference(id), "InternetGatewayId": reference(&igw) }),
        );

        for subnet in spec.allocate()? {
            let subnet_id = subnet.logical_id(id);
            let route_table = subnet_id.child("RouteTable");
            let public = subnet.kind == SubnetKind::Public;

            self.template.push(
                &subnet_id,
                "AWS::EC2::Subnet",
                Vec::new(),
                json!({
                    "VpcId": reference(id),
                    "CidrBlock": subnet.cidr,
                    "AvailabilityZone": { "Fn::Select": [subnet.az_index, { "Fn::GetAZs": "" }] },
                    "MapPublicIpOnLaunch": public,
                }),
            );
            self.template.push(
                &route_table,
                "AWS::EC2::RouteTable",
                Vec::new(),
                json!({ "VpcId": reference(id) }),
            );
            self.template.push(
                &subnet_id.child("RouteTableAssociation"),
                "AWS::EC2::SubnetRouteTableAssociation",
                Vec::new(),
                json!({ "RouteTableId": reference(&route_table), "SubnetId": reference(&subnet_id) }),
            );
            if public {
                self.template.push(
                    &subnet_id.child("DefaultRoute"),
                    "AWS::EC2::Route",
                    vec![attachment.to_string()],
                    json!({
                        "RouteTableId": reference(&route_table),
                        "DestinationCidrBlock": ANY_IPV4_CIDR,
                        "GatewayId": reference(&igw),
                    }),
                );
            }
        }
        Ok(())
    }

    fn certificate(&mut self, id: &LogicalId, spec: &CertificateSpec) {
        let (method, options) = match &spec.validation {
            CertificateValidation::Dns { zone } => (
                "DNS",
                json!([{ "DomainName": spec.domain_name, "HostedZoneId": self.resolve(zone) }]),
            ),
        };
        let depends_on = self.depends_on(id);
        self.template.push(
            id,
            "AWS::CertificateManager::Certificate",
            depends_on,
            json!({
                "DomainName": spec.domain_name,
                "DomainValidationOptions": options,
                "ValidationMethod": method,
                "Tags": [{ "Key": "Name", "Value": spec.certificate_name }],
            }),
        );
    }

    fn security_group(&mut self, id: &LogicalId, spec: &SecurityGroupSpec) {
        let ingress: Vec<Value> = spec.rules.rules().iter().map(ingress_rule).collect();
        let depends_on = self.depends_on(id);
        self.template.push(
            id,
            "AWS::EC2::SecurityGroup",
            depends_on,
            json!({
                "GroupDescription": spec.description,
                "VpcId": reference(&spec.network),
                "SecurityGroupIngress": ingress,
                "SecurityGroupEgress": egress_rules(&spec.rules),
            }),
        );
    }

    fn load_balancer(&mut self, id: &LogicalId, spec: &LoadBalancerSpec) -> Result<(), StackError> {
        let subnets = self.subnet_refs(&spec.network, spec.subnets)?;
        let mut depends_on = self.depends_on(id);
        // Public subnets are only usable once their default route exists.
        if spec.subnets == SubnetKind::Public {
            if let Some(Resource::Network(network)) = self.graph.get(&spec.network) {
                for subnet in network.subnets_of(SubnetKind::Public)? {
                    depends_on.push(subnet.logical_id(&spec.network).child("DefaultRoute").to_string());
                }
            }
        }
        self.template.push(
            id,
            "AWS::ElasticLoadBalancingV2::LoadBalancer",
            depends_on,
            json!({
                "Name": spec.name,
                "Scheme": spec.scheme.as_str(),
                "Type": "application",
                "Subnets": subnets,
                "SecurityGroups": [attribute(&spec.security_group, "GroupId")],
                "LoadBalancerAttributes": [
                    { "Key": "deletion_protection.enabled", "Value": "false" }
                ],
            }),
        );
        Ok(())
    }

    fn listener(&mut self, id: &LogicalId, spec: &ListenerSpec) {
        let targets = self.target_groups_of(id);
        let actions: Vec<Value> = if targets.is_empty() {
            vec![json!({
                "Type": "fixed-response",
                "FixedResponseConfig": { "StatusCode": "404" },
            })]
        } else {
            targets
                .iter()
                .map(|tg| json!({ "Type": "forward", "TargetGroupArn": reference(tg) }))
                .collect()
        };
        let certificates: Vec<Value> = spec
            .certificates
            .iter()
            .map(|c| json!({ "CertificateArn": reference(c) }))
            .collect();

        let depends_on = self.depends_on(id);
        self.template.push(
            id,
            "AWS::ElasticLoadBalancingV2::Listener",
            depends_on,
            json!({
                "LoadBalancerArn": reference(&spec.load_balancer),
                "Port": spec.port,
                "Protocol": spec.protocol.as_str(),
                "Certificates": certificates,
                "DefaultActions": actions,
            }),
        );
    }

    fn auto_scaling_group(
        &mut self,
        id: &LogicalId,
        spec: &AutoScalingGroupSpec,
    ) -> Result<(), StackError> {
        let launch_config = id.child("LaunchConfig");
        let block_devices: Vec<Value> = spec
            .block_devices
            .iter()
            .map(|d| {
                json!({
                    "DeviceName": d.device_name,
                    "Ebs": { "VolumeSize": d.size_gib, "VolumeType": d.volume_type.as_str() },
                })
            })
            .collect();

        let mut launch = json!({
            "ImageId": spec.image_id,
            "InstanceType": spec.instance_type,
            "KeyName": spec.key_name,
            "SecurityGroups": [attribute(&spec.security_group, "GroupId")],
            "BlockDeviceMappings": block_devices,
        });
        if let (Some(price), Some(props)) = (&spec.spot_price, launch.as_object_mut()) {
            props.insert("SpotPrice".to_string(), json!(price));
        }
        self.template.push(
            &launch_config,
            "AWS::AutoScaling::LaunchConfiguration",
            Vec::new(),
            launch,
        );

        let target_groups: Vec<Value> = self
            .target_groups_of(id)
            .iter()
            .map(reference)
            .collect();
        let subnets = self.subnet_refs(&spec.network, spec.subnets)?;
        let depends_on = self.depends_on(id);
        self.template.push(
            id,
            "AWS::AutoScaling::AutoScalingGroup",
            depends_on,
            json!({
                "MinSize": spec.capacity.min.to_string(),
                "MaxSize": spec.capacity.max.to_string(),
                "DesiredCapacity": spec.capacity.desired.to_string(),
                "LaunchConfigurationName": reference(&launch_config),
                "VPCZoneIdentifier": subnets,
                "HealthCheckType": spec.health_check.as_str(),
                "TargetGroupARNs": target_groups,
            }),
        );
        Ok(())
    }

    fn scaling_policy(&mut self, id: &LogicalId, spec: &CpuScalingPolicy) {
        let depends_on = self.depends_on(id);
        self.template.push(
            id,
            "AWS::AutoScaling::ScalingPolicy",
            depends_on,
            json!({
                "AutoScalingGroupName": reference(&spec.group),
                "PolicyType": "TargetTrackingScaling",
                "EstimatedInstanceWarmup": spec.estimated_warmup_secs,
                "TargetTrackingConfiguration": {
                    "PredefinedMetricSpecification": {
                        "PredefinedMetricType": "ASGAverageCPUUtilization",
                    },
                    "TargetValue": spec.target_utilization_percent,
                },
            }),
        );
    }

    fn target_group(&mut self, id: &LogicalId, spec: &TargetGroupSpec) {
        // The listener and the group reference this resource, so it must not
        // depend on them in return.
        self.template.push(
            id,
            "AWS::ElasticLoadBalancingV2::TargetGroup",
            Vec::new(),
            json!({
                "Name": spec.name,
                "Port": spec.port,
                "Protocol": spec.protocol.as_str(),
                "TargetType": "instance",
                "VpcId": reference(&spec.network),
            }),
        );
    }

    fn alias_record(&mut self, id: &LogicalId, spec: &AliasRecordSpec) {
        let depends_on = self.depends_on(id);
        let name = format!("{}.", spec.record_name.trim_end_matches('.'));
        self.template.push(
            id,
            "AWS::Route53::RecordSet",
            depends_on,
            json!({
                "Name": name,
                "Type": "A",
                "HostedZoneId": self.resolve(&spec.zone),
                "AliasTarget": {
                    "DNSName": attribute(&spec.load_balancer, "DNSName"),
                    "HostedZoneId": attribute(&spec.load_balancer, "CanonicalHostedZoneID"),
                },
            }),
        );
    }

    fn outputs(&mut self) {
        let mut outputs = BTreeMap::new();
        for node in self.graph.iter() {
            match &node.resource {
                Resource::LoadBalancer(_) => {
                    outputs.insert(
                        "LoadBalancerDnsName".to_string(),
                        TemplateOutput {
                            description: "DNS name of the load balancer".to_string(),
                            value: attribute(&node.id, "DNSName"),
                        },
                    );
                }
                Resource::AliasRecord(record) => {
                    outputs.insert(
                        "Hostname".to_string(),
                        TemplateOutput {
                            description: "Published hostname".to_string(),
                            value: json!(record.record_name),
                        },
                    );
                }
                Resource::Certificate(_) => {
                    outputs.insert(
                        "CertificateArn".to_string(),
                        TemplateOutput {
                            description: "ARN of the TLS certificate".to_string(),
                            value: reference(&node.id),
                        },
                    );
                }
                _ => {}
            }
        }
        self.template.outputs = outputs;
    }
}

fn ingress_rule(rule: &IngressRule) -> Value {
    let (from, to) = rule.ports.bounds();
    let mut entry = json!({
        "IpProtocol": rule.ports.protocol.ip_protocol(),
        "FromPort": from,
        "ToPort": to,
        "Description": rule.description.clone().unwrap_or_else(|| rule.to_string()),
    });
    if let Some(props) = entry.as_object_mut() {
        match &rule.peer {
            Peer::SecurityGroup(group) => {
                props.insert("SourceSecurityGroupId".to_string(), attribute(group, "GroupId"));
            }
            peer => {
                props.insert("CidrIp".to_string(), json!(peer.cidr()));
            }
        }
    }
    entry
}

fn egress_rules(rules: &RuleSet) -> Value {
    if rules.allows_all_outbound() {
        json!([{
            "IpProtocol": "-1",
            "CidrIp": ANY_IPV4_CIDR,
            "Description": "Allow all outbound traffic by default",
        }])
    } else {
        // An unmatchable rule replaces the implicit allow-all egress.
        json!([{
            "IpProtocol": "icmp",
            "FromPort": 252,
            "ToPort": 86,
            "CidrIp": "255.255.255.255/32",
            "Description": "Disallow all traffic",
        }])
    }
}

/// Render a graph as a template.
pub fn synthesize(graph: &NodeGraph, description: &str) -> Result<Template, StackError> {
    let order = graph.topological_order()?;

    let mut renderer = Renderer {
        graph,
        template: Template::new(description),
    };
    for id in &order {
        if let Some(resource) = graph.get(id) {
            renderer.render(id, resource)?;
        }
    }
    renderer.outputs();

    debug!(
        resources = renderer.template.resources.len(),
        outputs = renderer.template.outputs.len(),
        "Template synthesized"
    );
    Ok(renderer.template)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodestack_core::{NetworkConfig, ResourceKind};
    use crate::resource::HostedZoneRef;

    fn small_graph() -> NodeGraph {
        let mut graph = NodeGraph::new();
        graph
            .insert(
                LogicalId::new("Vpc"),
                Resource::Network(NetworkSpec::two_tier(&NetworkConfig::default())),
            )
            .unwrap();
        graph
            .insert(
                LogicalId::new("Zone"),
                Resource::HostedZone(HostedZoneRef {
                    zone_id: "Z42".to_string(),
                    zone_name: "example.com".to_string(),
                }),
            )
            .unwrap();
        graph
            .insert(
                LogicalId::new("Cert"),
                Resource::Certificate(
                    CertificateSpec::dns_validated("*.example.com", "Cert", LogicalId::new("Zone"))
                        .unwrap(),
                ),
            )
            .unwrap();
        graph
    }

    #[test]
    fn test_network_expansion() {
        let template = synthesize(&small_graph(), "test").unwrap();
        let names = template.resource_names();

        assert_eq!(&names[..3], &["Vpc", "VpcIGW", "VpcVPCGW"]);
        assert!(names.contains(&"VpcPublicSubnet1"));
        assert!(names.contains(&"VpcPublicSubnet2DefaultRoute"));
        assert!(names.contains(&"VpcPrivateSubnet2RouteTableAssociation"));
        assert!(!names.contains(&"VpcPrivateSubnet1DefaultRoute"));

        let subnet = template.resource("VpcPrivateSubnet1").unwrap();
        assert_eq!(subnet.properties["CidrBlock"], "10.0.2.0/24");
        assert_eq!(subnet.properties["MapPublicIpOnLaunch"], false);
    }

    #[test]
    fn test_hosted_zone_is_not_emitted() {
        let template = synthesize(&small_graph(), "test").unwrap();
        assert!(template.resource("Zone").is_none());

        let cert = template.resource("Cert").unwrap();
        assert!(cert.depends_on.is_empty());
        assert_eq!(cert.properties["DomainValidationOptions"][0]["HostedZoneId"], "Z42");
        assert_eq!(cert.properties["ValidationMethod"], "DNS");
    }

    #[test]
    fn test_resources_serialize_in_order() {
        let template = synthesize(&small_graph(), "test").unwrap();
        let json = template.to_json().unwrap();
        let vpc = json.find("\"Vpc\"").unwrap();
        let cert = json.find("\"Cert\"").unwrap();
        assert!(vpc < cert);
        assert!(json.contains("\"AWSTemplateFormatVersion\":\"2010-09-09\""));
    }

    #[test]
    fn test_ingress_rendering() {
        let open = ingress_rule(&RuleSet::https_from_anywhere().rules()[0]);
        assert_eq!(open["IpProtocol"], "tcp");
        assert_eq!(open["FromPort"], 443);
        assert_eq!(open["CidrIp"], "0.0.0.0/0");

        let icmp = ingress_rule(&RuleSet::icmp_from_group("EdgeSg").rules()[0]);
        assert_eq!(icmp["IpProtocol"], "icmp");
        assert_eq!(icmp["FromPort"], -1);
        assert_eq!(icmp["SourceSecurityGroupId"]["Fn::GetAtt"][0], "EdgeSg");
        assert!(icmp.get("CidrIp").is_none());
    }

    #[test]
    fn test_egress_rendering() {
        assert_eq!(egress_rules(&RuleSet::new())[0]["IpProtocol"], "-1");
        assert_eq!(
            egress_rules(&RuleSet::new().deny_all_outbound())[0]["CidrIp"],
            "255.255.255.255/32"
        );
    }

    #[test]
    fn test_outputs_only_for_present_kinds() {
        let graph = small_graph();
        assert_eq!(graph.by_kind(ResourceKind::LoadBalancer).len(), 0);

        let template = synthesize(&graph, "test").unwrap();
        assert!(template.outputs.contains_key("CertificateArn"));
        assert!(!template.outputs.contains_key("LoadBalancerDnsName"));
    }
}
