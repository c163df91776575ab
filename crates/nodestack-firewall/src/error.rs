//! Error types for firewall rules.

use thiserror::Error;

use crate::rule::DenialReason;

/// Errors related to security group rules.
#[derive(Debug, Error)]
pub enum FirewallError {
    /// Traffic was not permitted by any rule.
    #[error("Traffic denied: {reason}")]
    Denied {
        /// The reason for denial.
        reason: DenialReason,
    },

    /// An identical ingress rule is already present.
    #[error("Duplicate ingress rule: {0}")]
    DuplicateRule(String),

    /// A CIDR block could not be parsed.
    #[error("Invalid IPv4 CIDR block: '{0}'")]
    InvalidCidr(String),

    /// A port range is empty or does not apply to its protocol.
    #[error("Invalid port range: {0}")]
    InvalidPortRange(String),
}

/// Result type for firewall operations.
pub type FirewallResult<T> = std::result::Result<T, FirewallError>;
