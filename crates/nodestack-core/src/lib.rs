//! Nodestack Core - resource graph primitives
//!
//! This crate holds the cloud-agnostic pieces of the node host stack:
//!
//! - [`StackGraph`]: a typed dependency graph of resource descriptors
//! - [`LogicalId`] and [`ResourceKind`]: resource identity
//! - [`Region`] and [`MachineImage`]: the closed region set and the
//!   per-region image mapping
//! - [`StackConfig`]: input variables, environment and policy constants
//!
//! Nothing here talks to a cloud provider. The graph is a declaration that a
//! provisioning engine later realizes.
//!
//! # Quick Start
//!
//! ```
//! use nodestack_core::prelude::*;
//!
//! let config = StackConfig::new(
//!     StackVariables::new("Z0123456789", "example.com", "node", "ami-1234", "ops"),
//!     StackEnvironment::new("us-west-1"),
//! );
//! let region = config.validate().unwrap();
//! assert_eq!(region, Region::UsWest1);
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod id;
pub mod region;

// Re-export main types at crate root
pub use config::{
    CapacityConfig, NetworkConfig, OsSpecification, RootVolume, ScalingConfig, StackConfig,
    StackEnvironment, StackPolicy, StackVariables, VolumeType, DEFAULT_RESOURCE_PREFIX,
    DEFAULT_STACK_NAME, SUBNET_CIDR_MASK,
};
pub use error::{ConfigError, ConfigResult, GraphError, GraphResult};
pub use graph::{GraphNode, ResourceNode, StackGraph};
pub use id::{LogicalId, ResourceKind};
pub use region::{MachineImage, Region};

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```
/// use nodestack_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{StackConfig, StackEnvironment, StackPolicy, StackVariables};
    pub use crate::error::{ConfigError, ConfigResult, GraphError};
    pub use crate::graph::{GraphNode, StackGraph};
    pub use crate::id::{LogicalId, ResourceKind};
    pub use crate::region::{MachineImage, Region};
}
