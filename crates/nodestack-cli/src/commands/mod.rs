//! CLI subcommands.

use std::path::PathBuf;

use anyhow::{Context, Result};

use nodestack::prelude::*;

pub mod inspect;
pub mod synth;
pub mod validate;

/// Where the stack configuration comes from.
pub struct ConfigSource {
    /// Optional TOML file.
    pub path: Option<PathBuf>,
    /// Region given on the command line.
    pub region: Option<String>,
}

impl ConfigSource {
    /// Load the configuration from the process environment.
    pub fn load(&self) -> Result<StackConfig> {
        self.load_with(|key| std::env::var(key).ok())
    }

    /// Load the configuration: file first, then environment, then flags.
    pub fn load_with<F>(&self, lookup: F) -> Result<StackConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match &self.path {
            Some(path) => StackConfig::from_file(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?,
            None => StackConfig::default(),
        };

        config.apply_env_overrides(lookup);

        if let Some(region) = &self.region {
            config.env.region = region.clone();
        }

        tracing::debug!(
            stack = %config.stack_name,
            region = %config.env.region,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Load the configuration and build the stack.
    pub fn build(&self) -> Result<StackDefinition> {
        self.build_with(|key| std::env::var(key).ok())
    }

    /// Build the stack from a configuration resolved through `lookup`.
    pub fn build_with<F>(&self, lookup: F) -> Result<StackDefinition>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = self.load_with(lookup)?;
        NodeStack::builder()
            .with_config(config)
            .with_event_subscriber(Arc::new(LoggingSubscriber::new()))
            .build()
            .context("Failed to build stack")
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn env(key: &str) -> Option<String> {
        match key {
            "ZONE_ID" => Some("Z0123456789".to_string()),
            "ZONE_NAME" => Some("example.com".to_string()),
            "DOMAIN_NAME" => Some("node".to_string()),
            "IMAGE_ID" => Some("ami-1234".to_string()),
            "SSH_KEY_NAME" => Some("ops-key".to_string()),
            "AWS_REGION" => Some("us-west-1".to_string()),
            _ => None,
        }
    }

    #[test]
    fn test_environment_supplies_variables() {
        let source = ConfigSource {
            path: None,
            region: None,
        };
        let config = source.load_with(env).unwrap();
        assert_eq!(config.variables.zone_name, "example.com");
        assert_eq!(config.env.region, "us-west-1");
        assert!(NodeStack::from_config(config).is_ok());
    }

    #[test]
    fn test_region_flag_wins() {
        let source = ConfigSource {
            path: None,
            region: Some("us-east-1".to_string()),
        };
        let config = source.load_with(env).unwrap();
        assert_eq!(config.env.region, "us-east-1");
    }

    #[test]
    fn test_missing_file_has_context() {
        let source = ConfigSource {
            path: Some(PathBuf::from("/nonexistent/nodestack.toml")),
            region: None,
        };
        let err = source.load_with(env).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to read config file"));
    }
}
