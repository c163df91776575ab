//! Core error types for nodestack.
//!
//! Errors are split by origin: configuration problems detected before any
//! resource is declared, and graph problems detected while resources are
//! wired together. Both are fatal for the build.

use thiserror::Error;

use crate::id::LogicalId;

/// Errors in the stack's input variables or policy.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The target region has no machine image mapping.
    #[error("Unsupported region '{region}': supported regions are {}", .supported.join(", "))]
    UnsupportedRegion {
        /// The requested region.
        region: String,
        /// Regions this stack can be built for.
        supported: Vec<String>,
    },

    /// A required input variable was not provided.
    #[error("Missing required variable: {0}")]
    MissingVariable(&'static str),

    /// An input variable has an unusable value.
    #[error("Invalid value for {name}: {reason}")]
    InvalidVariable {
        /// Variable name.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// Autoscaling capacity bounds are inconsistent.
    #[error("Capacity out of bounds: expected min ({min}) <= desired ({desired}) <= max ({max})")]
    CapacityOutOfBounds {
        /// Minimum capacity.
        min: u32,
        /// Desired capacity.
        desired: u32,
        /// Maximum capacity.
        max: u32,
    },

    /// A policy value is out of range.
    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),

    /// A domain or hostname is malformed.
    #[error("Invalid domain '{0}'")]
    InvalidDomain(String),

    /// The stack name does not satisfy naming rules.
    #[error(
        "Invalid stack name '{0}': must only consist of alphanumeric characters and hyphens, \
         start with an alphabetical character, and be at most 128 characters"
    )]
    InvalidStackName(String),

    /// The configuration file could not be parsed.
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// IO error reading the configuration file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors while assembling the resource graph.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Two resources share the same logical id.
    #[error("Duplicate resource: '{0}'")]
    DuplicateResource(LogicalId),

    /// A resource references an id that was never declared.
    #[error("Resource '{from}' references unknown resource '{to}'")]
    UnknownReference {
        /// The referencing resource.
        from: LogicalId,
        /// The missing target.
        to: LogicalId,
    },

    /// The dependency edges form a cycle.
    #[error("Dependency cycle between: {}", join_ids(.0))]
    Cycle(Vec<LogicalId>),
}

fn join_ids(ids: &[LogicalId]) -> String {
    ids.iter()
        .map(LogicalId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for graph operations.
pub type GraphResult<T> = std::result::Result<T, GraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_region_message() {
        let err = ConfigError::UnsupportedRegion {
            region: "eu-west-1".to_string(),
            supported: vec!["us-east-1".to_string(), "us-west-1".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Unsupported region 'eu-west-1': supported regions are us-east-1, us-west-1"
        );
    }

    #[test]
    fn test_cycle_message() {
        let err = GraphError::Cycle(vec![LogicalId::new("A"), LogicalId::new("B")]);
        assert_eq!(err.to_string(), "Dependency cycle between: A, B");
    }
}
