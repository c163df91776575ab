//! Configuration types for a node host stack.
//!
//! A [`StackConfig`] bundles the externally supplied variables (hosted zone,
//! domain, image, key pair), the deployment environment, and the policy
//! constants the builder applies. It can be read from a TOML file and then
//! overridden from environment variables.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::region::Region;

/// Mask applied to every subnet carved out of the VPC range.
pub const SUBNET_CIDR_MASK: u8 = 24;

/// Default prefix for logical ids and physical resource names.
pub const DEFAULT_RESOURCE_PREFIX: &str = "XrplNodeHost";

/// Default stack name.
pub const DEFAULT_STACK_NAME: &str = "XrplNodeHostStack";

/// Load balancer and target group names are capped at 32 characters; the
/// longest suffix appended to the prefix is `ASGTargets`.
const MAX_RESOURCE_PREFIX_LEN: usize = 22;

/// Variables that identify the external resources the stack attaches to.
///
/// Field names in files follow the deployment variable names
/// (`ZONE_ID`, `OS_SPECIFICATION.image_id`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackVariables {
    /// Id of the pre-existing hosted zone.
    #[serde(rename = "ZONE_ID")]
    pub zone_id: String,

    /// Apex name of the pre-existing hosted zone.
    #[serde(rename = "ZONE_NAME")]
    pub zone_name: String,

    /// Subdomain label published under the zone.
    #[serde(rename = "DOMAIN_NAME")]
    pub domain_name: String,

    /// Machine image specification.
    #[serde(rename = "OS_SPECIFICATION")]
    pub os_specification: OsSpecification,

    /// Key pair attached to backend instances.
    pub ssh_key_name: String,
}

impl StackVariables {
    /// Create variables from their individual values.
    pub fn new(
        zone_id: impl Into<String>,
        zone_name: impl Into<String>,
        domain_name: impl Into<String>,
        image_id: impl Into<String>,
        ssh_key_name: impl Into<String>,
    ) -> Self {
        Self {
            zone_id: zone_id.into(),
            zone_name: zone_name.into(),
            domain_name: domain_name.into(),
            os_specification: OsSpecification {
                image_id: image_id.into(),
            },
            ssh_key_name: ssh_key_name.into(),
        }
    }

    /// The zone apex without a trailing root dot.
    pub fn zone_apex(&self) -> &str {
        self.zone_name.trim_end_matches('.')
    }

    /// The published hostname, `www.<DOMAIN_NAME>.<ZONE_NAME>`.
    pub fn published_hostname(&self) -> String {
        format!("www.{}.{}", self.domain_name, self.zone_apex())
    }

    /// The wildcard certificate domain, `*.<ZONE_NAME>`.
    pub fn certificate_domain(&self) -> String {
        format!("*.{}", self.zone_apex())
    }

    /// Check that every variable is present and well formed.
    pub fn validate(&self) -> ConfigResult<()> {
        require("ZONE_ID", &self.zone_id)?;
        require("ZONE_NAME", &self.zone_name)?;
        require("DOMAIN_NAME", &self.domain_name)?;
        require("OS_SPECIFICATION.image_id", &self.os_specification.image_id)?;
        require("ssh_key_name", &self.ssh_key_name)?;

        validate_domain(self.zone_apex())?;
        validate_domain(&self.domain_name)?;
        // Each part may be valid while the joined record name is too long.
        validate_domain(&self.published_hostname())?;
        Ok(())
    }
}

/// Machine image specification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OsSpecification {
    /// Image id valid in the target region.
    pub image_id: String,
}

/// Account and region the stack is deployed into.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackEnvironment {
    /// Target account, if pinned.
    pub account: Option<String>,
    /// Target region code.
    pub region: String,
}

impl StackEnvironment {
    /// Create an environment for a region.
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            account: None,
            region: region.into(),
        }
    }

    /// Pin the target account.
    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    /// Parse the region against the supported set.
    pub fn region(&self) -> ConfigResult<Region> {
        if self.region.is_empty() {
            return Err(ConfigError::MissingVariable("region"));
        }
        self.region.parse()
    }
}

/// VPC layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// IPv4 range of the VPC.
    pub cidr: String,
    /// Number of availability zones to spread subnets over.
    pub max_azs: u8,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            cidr: "10.0.0.0/16".to_string(),
            max_azs: 2,
        }
    }
}

impl NetworkConfig {
    /// Create a network configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the VPC range.
    pub fn with_cidr(mut self, cidr: impl Into<String>) -> Self {
        self.cidr = cidr.into();
        self
    }

    /// Set the number of availability zones.
    pub fn with_max_azs(mut self, max_azs: u8) -> Self {
        self.max_azs = max_azs;
        self
    }

    /// Validate the range and check it fits both subnet tiers.
    pub fn validate(&self) -> ConfigResult<()> {
        let (_, mask) = parse_ipv4_cidr(&self.cidr).ok_or_else(|| ConfigError::InvalidVariable {
            name: "network.cidr",
            reason: format!("'{}' is not an IPv4 CIDR block", self.cidr),
        })?;

        if self.max_azs == 0 {
            return Err(ConfigError::InvalidVariable {
                name: "network.max_azs",
                reason: "at least one availability zone is required".to_string(),
            });
        }

        // Two tiers, one subnet per tier per AZ.
        let needed = 2 * u32::from(self.max_azs);
        let available = if mask > SUBNET_CIDR_MASK {
            0
        } else {
            1u32 << (SUBNET_CIDR_MASK - mask)
        };
        if needed > available {
            return Err(ConfigError::InvalidVariable {
                name: "network.cidr",
                reason: format!(
                    "'{}' holds {} /{} subnets, {} are required",
                    self.cidr, available, SUBNET_CIDR_MASK, needed
                ),
            });
        }
        Ok(())
    }
}

/// Autoscaling capacity bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapacityConfig {
    /// Minimum instance count.
    pub min: u32,
    /// Maximum instance count.
    pub max: u32,
    /// Desired instance count.
    pub desired: u32,
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self {
            min: 1,
            max: 2,
            desired: 1,
        }
    }
}

impl CapacityConfig {
    /// Create capacity bounds.
    pub fn new(min: u32, desired: u32, max: u32) -> Self {
        Self { min, max, desired }
    }

    /// Check `min <= desired <= max`.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.min <= self.desired && self.desired <= self.max && self.max > 0 {
            Ok(())
        } else {
            Err(ConfigError::CapacityOutOfBounds {
                min: self.min,
                desired: self.desired,
                max: self.max,
            })
        }
    }
}

/// CPU target-tracking scaling parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalingConfig {
    /// Average CPU utilization to hold, in percent.
    pub target_utilization_percent: u8,
    /// Cooldown between scaling activities, in seconds.
    pub cooldown_secs: u64,
    /// Time before a new instance contributes metrics, in seconds.
    pub estimated_warmup_secs: u64,
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            target_utilization_percent: 90,
            cooldown_secs: 60,
            estimated_warmup_secs: 60,
        }
    }
}

impl ScalingConfig {
    /// Cooldown as a duration.
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    /// Warm-up as a duration.
    pub fn estimated_warmup(&self) -> Duration {
        Duration::from_secs(self.estimated_warmup_secs)
    }

    fn validate(&self) -> ConfigResult<()> {
        if !(1..=100).contains(&self.target_utilization_percent) {
            return Err(ConfigError::InvalidPolicy(format!(
                "target CPU utilization must be within 1..=100, got {}",
                self.target_utilization_percent
            )));
        }
        Ok(())
    }
}

/// EBS volume type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeType {
    /// General purpose SSD (gp2).
    Gp2,
    /// General purpose SSD (gp3).
    #[default]
    Gp3,
    /// Provisioned IOPS SSD.
    Io1,
    /// Magnetic.
    Standard,
}

impl VolumeType {
    /// Get the volume type name.
    pub fn as_str(&self) -> &'static str {
        match self {
            VolumeType::Gp2 => "gp2",
            VolumeType::Gp3 => "gp3",
            VolumeType::Io1 => "io1",
            VolumeType::Standard => "standard",
        }
    }
}

/// Root EBS volume attached to each instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RootVolume {
    /// Device name; derived from the resource prefix when unset.
    pub device_name: Option<String>,
    /// Size in GiB.
    pub size_gib: u32,
    /// Volume type.
    pub volume_type: VolumeType,
}

impl Default for RootVolume {
    fn default() -> Self {
        Self {
            device_name: None,
            size_gib: 20,
            volume_type: VolumeType::Gp3,
        }
    }
}

/// Policy constants applied by the builder.
///
/// Defaults reproduce the reference deployment: `t3.medium` spot instances
/// capped at `0.007`, one to two instances, scaling at 90% CPU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackPolicy {
    /// Instance type of backend instances.
    pub instance_type: String,
    /// Capacity bounds.
    pub capacity: CapacityConfig,
    /// Spot price ceiling, in USD per hour.
    pub spot_price: Option<String>,
    /// Root volume.
    pub root_volume: RootVolume,
    /// Scaling parameters.
    pub scaling: ScalingConfig,
    /// Port the listener accepts HTTPS on.
    pub listener_port: u16,
    /// Port backends receive forwarded traffic on.
    pub backend_port: u16,
}

impl Default for StackPolicy {
    fn default() -> Self {
        Self {
            instance_type: "t3.medium".to_string(),
            capacity: CapacityConfig::default(),
            spot_price: Some("0.007".to_string()),
            root_volume: RootVolume::default(),
            scaling: ScalingConfig::default(),
            listener_port: 443,
            backend_port: 80,
        }
    }
}

impl StackPolicy {
    /// Create a policy with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the instance type.
    pub fn with_instance_type(mut self, instance_type: impl Into<String>) -> Self {
        self.instance_type = instance_type.into();
        self
    }

    /// Set capacity bounds.
    pub fn with_capacity(mut self, capacity: CapacityConfig) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the spot price ceiling.
    pub fn with_spot_price(mut self, price: impl Into<String>) -> Self {
        self.spot_price = Some(price.into());
        self
    }

    /// Use on-demand instances.
    pub fn on_demand(mut self) -> Self {
        self.spot_price = None;
        self
    }

    /// Set the root volume size.
    pub fn with_root_volume_size(mut self, size_gib: u32) -> Self {
        self.root_volume.size_gib = size_gib;
        self
    }

    /// Set scaling parameters.
    pub fn with_scaling(mut self, scaling: ScalingConfig) -> Self {
        self.scaling = scaling;
        self
    }

    /// Validate every policy value.
    pub fn validate(&self) -> ConfigResult<()> {
        self.capacity.validate()?;
        self.scaling.validate()?;

        if self.instance_type.trim().is_empty() || !self.instance_type.contains('.') {
            return Err(ConfigError::InvalidPolicy(format!(
                "instance type '{}' must look like '<class>.<size>'",
                self.instance_type
            )));
        }

        if let Some(price) = &self.spot_price {
            match price.parse::<f64>() {
                Ok(p) if p > 0.0 && p.is_finite() => {}
                _ => {
                    return Err(ConfigError::InvalidPolicy(format!(
                        "spot price '{price}' must be a positive decimal"
                    )));
                }
            }
        }

        if self.root_volume.size_gib == 0 {
            return Err(ConfigError::InvalidPolicy(
                "root volume size must be at least 1 GiB".to_string(),
            ));
        }

        if self.listener_port == 0 || self.backend_port == 0 {
            return Err(ConfigError::InvalidPolicy(
                "listener and backend ports must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Complete configuration of a stack.
///
/// # Example
///
/// ```
/// use nodestack_core::{StackConfig, StackVariables, StackEnvironment};
///
/// let config = StackConfig::new(
///     StackVariables::new("Z123", "example.com", "node", "ami-1234", "ops"),
///     StackEnvironment::new("us-east-1"),
/// );
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackConfig {
    /// Name of the deployed stack.
    pub stack_name: String,
    /// Prefix of logical ids and physical names.
    pub resource_prefix: String,
    /// External variables.
    #[serde(flatten)]
    pub variables: StackVariables,
    /// Deployment environment.
    pub env: StackEnvironment,
    /// Policy constants.
    pub policy: StackPolicy,
    /// VPC layout.
    pub network: NetworkConfig,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            stack_name: DEFAULT_STACK_NAME.to_string(),
            resource_prefix: DEFAULT_RESOURCE_PREFIX.to_string(),
            variables: StackVariables::default(),
            env: StackEnvironment::default(),
            policy: StackPolicy::default(),
            network: NetworkConfig::default(),
        }
    }
}

impl StackConfig {
    /// Create a configuration with default policy and network.
    pub fn new(variables: StackVariables, env: StackEnvironment) -> Self {
        Self {
            variables,
            env,
            ..Self::default()
        }
    }

    /// Read a configuration file.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Serialize to TOML.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Override values from environment variables.
    ///
    /// `lookup` resolves a variable name; pass `|k| std::env::var(k).ok()` to
    /// read the process environment. Recognized names: `ZONE_ID`,
    /// `ZONE_NAME`, `DOMAIN_NAME`, `IMAGE_ID`, `SSH_KEY_NAME`, `AWS_REGION`
    /// (falling back to `CDK_DEFAULT_REGION`) and `AWS_ACCOUNT_ID`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(v) = get("ZONE_ID") {
            self.variables.zone_id = v;
        }
        if let Some(v) = get("ZONE_NAME") {
            self.variables.zone_name = v;
        }
        if let Some(v) = get("DOMAIN_NAME") {
            self.variables.domain_name = v;
        }
        if let Some(v) = get("IMAGE_ID") {
            self.variables.os_specification.image_id = v;
        }
        if let Some(v) = get("SSH_KEY_NAME") {
            self.variables.ssh_key_name = v;
        }
        if let Some(v) = get("AWS_REGION").or_else(|| get("CDK_DEFAULT_REGION")) {
            self.env.region = v;
        }
        if let Some(v) = get("AWS_ACCOUNT_ID") {
            self.env.account = Some(v);
        }
    }

    /// Validate the whole configuration and resolve the target region.
    ///
    /// Runs before any resource is declared, so a failure here means nothing
    /// was built.
    pub fn validate(&self) -> ConfigResult<Region> {
        let region = self.env.region()?;
        self.variables.validate()?;
        self.policy.validate()?;
        self.network.validate()?;
        validate_stack_name(&self.stack_name)?;
        validate_resource_prefix(&self.resource_prefix)?;
        Ok(region)
    }
}

fn require(name: &'static str, value: &str) -> ConfigResult<()> {
    if value.trim().is_empty() {
        Err(ConfigError::MissingVariable(name))
    } else {
        Ok(())
    }
}

/// Check a DNS name made of one or more labels.
pub fn validate_domain(domain: &str) -> ConfigResult<()> {
    if domain.is_empty() || domain.len() > 253 {
        return Err(ConfigError::InvalidDomain(domain.to_string()));
    }
    for label in domain.split('.') {
        let valid = !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
        if !valid {
            return Err(ConfigError::InvalidDomain(domain.to_string()));
        }
    }
    Ok(())
}

/// Check a stack name: alphanumerics and hyphens, starting with a letter, at
/// most 128 characters.
pub fn validate_stack_name(name: &str) -> ConfigResult<()> {
    let starts_alpha = name.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
    let charset_ok = name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    if !starts_alpha || !charset_ok || name.len() > 128 {
        return Err(ConfigError::InvalidStackName(name.to_string()));
    }
    Ok(())
}

fn validate_resource_prefix(prefix: &str) -> ConfigResult<()> {
    let starts_alpha = prefix.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
    if !starts_alpha
        || !prefix.chars().all(|c| c.is_ascii_alphanumeric())
        || prefix.len() > MAX_RESOURCE_PREFIX_LEN
    {
        return Err(ConfigError::InvalidVariable {
            name: "resource_prefix",
            reason: format!(
                "'{prefix}' must be alphanumeric, start with a letter and be at most \
                 {MAX_RESOURCE_PREFIX_LEN} characters"
            ),
        });
    }
    Ok(())
}

/// Parse `a.b.c.d/n` into its network address and prefix length.
pub fn parse_ipv4_cidr(cidr: &str) -> Option<(std::net::Ipv4Addr, u8)> {
    let (addr, mask) = cidr.split_once('/')?;
    let addr: std::net::Ipv4Addr = addr.parse().ok()?;
    let mask: u8 = mask.parse().ok()?;
    (mask <= 32).then_some((addr, mask))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> StackConfig {
        StackConfig::new(
            StackVariables::new("Z0123456789", "example.com", "node", "ami-1234", "ops-key"),
            StackEnvironment::new("us-east-1"),
        )
    }

    #[test]
    fn test_policy_defaults() {
        let policy = StackPolicy::default();
        assert_eq!(policy.capacity, CapacityConfig::new(1, 1, 2));
        assert_eq!(policy.spot_price.as_deref(), Some("0.007"));
        assert_eq!(policy.scaling.target_utilization_percent, 90);
        assert_eq!(policy.scaling.cooldown(), Duration::from_secs(60));
        assert_eq!(policy.scaling.estimated_warmup(), Duration::from_secs(60));
        assert_eq!(policy.root_volume.size_gib, 20);
        assert_eq!(policy.root_volume.volume_type, VolumeType::Gp3);
        assert_eq!(policy.instance_type, "t3.medium");
        assert_eq!(policy.listener_port, 443);
        assert_eq!(policy.backend_port, 80);
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_capacity_bounds() {
        assert!(CapacityConfig::new(1, 1, 2).validate().is_ok());
        assert!(CapacityConfig::new(2, 2, 2).validate().is_ok());
        assert!(matches!(
            CapacityConfig::new(2, 1, 3).validate(),
            Err(ConfigError::CapacityOutOfBounds { min: 2, desired: 1, max: 3 })
        ));
        assert!(CapacityConfig::new(1, 3, 2).validate().is_err());
        assert!(CapacityConfig::new(0, 0, 0).validate().is_err());
    }

    #[test]
    fn test_policy_builder() {
        let policy = StackPolicy::new()
            .with_instance_type("t3.large")
            .with_capacity(CapacityConfig::new(2, 3, 4))
            .on_demand()
            .with_root_volume_size(50);

        assert_eq!(policy.instance_type, "t3.large");
        assert_eq!(policy.capacity.desired, 3);
        assert!(policy.spot_price.is_none());
        assert_eq!(policy.root_volume.size_gib, 50);
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_invalid_policy_values() {
        assert!(StackPolicy::new().with_spot_price("free").validate().is_err());
        assert!(StackPolicy::new().with_spot_price("-1").validate().is_err());
        assert!(StackPolicy::new().with_instance_type("medium").validate().is_err());
        assert!(StackPolicy::new().with_root_volume_size(0).validate().is_err());

        let scaling = ScalingConfig {
            target_utilization_percent: 0,
            ..ScalingConfig::default()
        };
        assert!(matches!(
            StackPolicy::new().with_scaling(scaling).validate(),
            Err(ConfigError::InvalidPolicy(_))
        ));
    }

    #[test]
    fn test_derived_names() {
        let vars = StackVariables::new("Z1", "example.com", "node", "ami-1", "key");
        assert_eq!(vars.published_hostname(), "www.node.example.com");
        assert_eq!(vars.certificate_domain(), "*.example.com");
    }

    #[test]
    fn test_missing_variables() {
        let mut config = valid_config();
        config.variables.zone_id.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingVariable("ZONE_ID"))
        ));

        let mut config = valid_config();
        config.variables.os_specification.image_id = "  ".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingVariable("OS_SPECIFICATION.image_id"))
        ));

        let mut config = valid_config();
        config.env.region.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingVariable("region"))
        ));
    }

    #[test]
    fn test_validate_resolves_region() {
        assert_eq!(valid_config().validate().unwrap(), Region::UsEast1);

        let mut config = valid_config();
        config.env.region = "eu-west-1".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnsupportedRegion { .. })
        ));
    }

    #[test]
    fn test_domain_validation() {
        assert!(validate_domain("example.com").is_ok());
        assert!(validate_domain("node-1").is_ok());
        assert!(validate_domain("bad..com").is_err());
        assert!(validate_domain("-bad.com").is_err());
        assert!(validate_domain("under_score.com").is_err());

        let mut config = valid_config();
        config.variables.domain_name = "no spaces".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidDomain(_))));

        let mut config = valid_config();
        config.variables.zone_name = "example.com.".to_string();
        assert!(config.validate().is_ok());
        assert_eq!(config.variables.published_hostname(), "www.node.example.com");
        assert_eq!(config.variables.certificate_domain(), "*.example.com");
    }

    #[test]
    fn test_joined_hostname_length() {
        let label = "a".repeat(63);
        let mut config = valid_config();
        config.variables.domain_name = format!("{label}.{label}.{label}");
        config.variables.zone_name = format!("{label}.{label}.{label}");

        assert!(validate_domain(&config.variables.domain_name).is_ok());
        assert!(validate_domain(&config.variables.zone_name).is_ok());
        assert!(matches!(config.validate(), Err(ConfigError::InvalidDomain(_))));
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = valid_config();
        config.env = config.env.with_account("123456789012");
        config.policy = StackPolicy::new()
            .with_instance_type("t3.large")
            .with_root_volume_size(40);

        let text = config.to_toml_string().unwrap();
        assert!(text.contains("ZONE_ID = \"Z0123456789\""));
        assert_eq!(StackConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_stack_name_validation() {
        assert!(validate_stack_name("XrplNodeHostStack").is_ok());
        assert!(validate_stack_name("node-host-1").is_ok());
        assert!(validate_stack_name("1stack").is_err());
        assert!(validate_stack_name("my_stack").is_err());
        assert!(validate_stack_name("").is_err());
        assert!(validate_stack_name(&"a".repeat(129)).is_err());
    }

    #[test]
    fn test_resource_prefix_validation() {
        let mut config = valid_config();
        config.resource_prefix = "Has-Hyphen".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidVariable { name: "resource_prefix", .. })
        ));

        config.resource_prefix = "A".repeat(MAX_RESOURCE_PREFIX_LEN + 1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_network_validation() {
        assert!(NetworkConfig::default().validate().is_ok());
        assert!(NetworkConfig::new().with_cidr("10.0.0.0/23").validate().is_err());
        assert!(NetworkConfig::new().with_cidr("10.0.0.0/22").validate().is_ok());
        assert!(NetworkConfig::new().with_cidr("not-a-cidr").validate().is_err());
        assert!(NetworkConfig::new().with_max_azs(0).validate().is_err());
    }

    #[test]
    fn test_parse_config_file() {
        let toml_str = r#"
ZONE_ID = "Z0123456789"
ZONE_NAME = "example.com"
DOMAIN_NAME = "node"
ssh_key_name = "ops-key"

[OS_SPECIFICATION]
image_id = "ami-1234"

[env]
region = "us-west-1"
account = "123456789012"

[policy.capacity]
min = 1
desired = 2
max = 3
"#;
        let config = StackConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.variables.zone_id, "Z0123456789");
        assert_eq!(config.variables.os_specification.image_id, "ami-1234");
        assert_eq!(config.env.account.as_deref(), Some("123456789012"));
        assert_eq!(config.policy.capacity, CapacityConfig::new(1, 2, 3));
        assert_eq!(config.policy.instance_type, "t3.medium");
        assert_eq!(config.stack_name, DEFAULT_STACK_NAME);
        assert_eq!(config.validate().unwrap(), Region::UsWest1);
    }

    #[test]
    fn test_parse_invalid_toml() {
        assert!(matches!(
            StackConfig::from_toml_str("ZONE_ID = ["),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = StackConfig::default();
        config.apply_env_overrides(|key| match key {
            "ZONE_ID" => Some("Z999".to_string()),
            "ZONE_NAME" => Some("example.org".to_string()),
            "DOMAIN_NAME" => Some("edge".to_string()),
            "IMAGE_ID" => Some("ami-9".to_string()),
            "SSH_KEY_NAME" => Some("k".to_string()),
            "AWS_REGION" => Some(String::new()),
            "CDK_DEFAULT_REGION" => Some("us-west-1".to_string()),
            _ => None,
        });

        assert_eq!(config.variables.zone_id, "Z999");
        assert_eq!(config.variables.published_hostname(), "www.edge.example.org");
        assert_eq!(config.env.region, "us-west-1");
        assert!(config.env.account.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_cidr() {
        let (addr, mask) = parse_ipv4_cidr("10.0.0.0/16").unwrap();
        assert_eq!(addr, std::net::Ipv4Addr::new(10, 0, 0, 0));
        assert_eq!(mask, 16);
        assert!(parse_ipv4_cidr("10.0.0.0/33").is_none());
        assert!(parse_ipv4_cidr("10.0.0.0").is_none());
    }
}
