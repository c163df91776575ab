//! # Nodestack - XRPL node host stack
//!
//! Nodestack declares the cloud infrastructure of a public XRPL node host as
//! a typed resource graph, and renders that graph as a deployment template.
//!
//! ## Features
//!
//! - **Typed graph**: every resource is a descriptor with explicit references
//! - **Fail early**: configuration and region problems abort before any
//!   resource is declared
//! - **Firewall model**: security group rules can be checked against traffic
//! - **Observability**: build events, metrics and a synthesis report
//!
//! ## Quick Start
//!
//! ```
//! use nodestack::prelude::*;
//!
//! let stack = NodeStack::builder()
//!     .with_variables(StackVariables::new(
//!         "Z0123456789",
//!         "example.com",
//!         "node",
//!         "ami-1234",
//!         "ops-key",
//!     ))
//!     .with_region("us-east-1")
//!     .build()?;
//!
//! assert_eq!(stack.hostname(), "www.node.example.com");
//! let template = stack.synth()?;
//! assert!(template.to_json_pretty()?.contains("AWS::ElasticLoadBalancingV2::LoadBalancer"));
//! # Ok::<(), nodestack::StackError>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                      nodestack-cli                      │
//! ├─────────────────────────────────────────────────────────┤
//! │                   nodestack (facade)                    │
//! │        ┌──────────────────┐  ┌──────────────────┐       │
//! │        │ NodeStackBuilder │  │ template synth   │       │
//! │        └────────┬─────────┘  └──────────────────┘       │
//! │  ┌──────────────┴───┬────────────────────┬───────────┐  │
//! │  │ nodestack-core   │ nodestack-firewall │ -observe  │  │
//! │  │ (graph, config,  │ (ingress rules,    │ (events,  │  │
//! │  │  region)         │  traffic checks)   │  metrics) │  │
//! │  └──────────────────┴────────────────────┴───────────┘  │
//! └─────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info};

use nodestack_core::{
    ConfigError, GraphError, GraphNode, NetworkConfig, Region, StackConfig, StackPolicy,
    StackVariables,
};
use nodestack_firewall::FirewallError;
use nodestack_observe::{
    BuildEvent, EventDispatcher, EventSubscriber, MetricsCollector, MetricsSnapshot,
    ResourceSummary, SynthesisReport,
};

pub mod resource;
pub mod stack;
pub mod template;

pub use resource::{NodeGraph, Resource};
pub use stack::StackIds;
pub use template::{SynthesizedStack, Template};

// Re-export from sub-crates
pub use nodestack_core;
pub use nodestack_firewall;
pub use nodestack_observe;

/// Main entry point for building the node host stack.
pub struct NodeStack;

impl NodeStack {
    /// Create a new stack builder.
    pub fn builder() -> NodeStackBuilder {
        NodeStackBuilder::new()
    }

    /// Build a stack from a complete configuration.
    pub fn from_config(config: StackConfig) -> Result<StackDefinition, StackError> {
        NodeStackBuilder::new().with_config(config).build()
    }
}

/// Builder for configuring a stack build.
pub struct NodeStackBuilder {
    config: StackConfig,
    event_subscribers: Vec<Arc<dyn EventSubscriber>>,
}

impl NodeStackBuilder {
    /// Create a new builder with default policy and network.
    pub fn new() -> Self {
        Self {
            config: StackConfig::default(),
            event_subscribers: Vec::new(),
        }
    }

    /// Replace the whole configuration.
    pub fn with_config(mut self, config: StackConfig) -> Self {
        self.config = config;
        self
    }

    // Inputs

    /// Set the external variables.
    pub fn with_variables(mut self, variables: StackVariables) -> Self {
        self.config.variables = variables;
        self
    }

    /// Set the target region.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.config.env.region = region.into();
        self
    }

    /// Set the target account.
    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.config.env.account = Some(account.into());
        self
    }

    // Policy

    /// Set the policy constants.
    pub fn with_policy(mut self, policy: StackPolicy) -> Self {
        self.config.policy = policy;
        self
    }

    /// Set the VPC layout.
    pub fn with_network(mut self, network: NetworkConfig) -> Self {
        self.config.network = network;
        self
    }

    // Naming

    /// Set the stack name.
    pub fn with_stack_name(mut self, name: impl Into<String>) -> Self {
        self.config.stack_name = name.into();
        self
    }

    /// Set the logical id prefix.
    pub fn with_resource_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.resource_prefix = prefix.into();
        self
    }

    // Observability

    /// Add an event subscriber.
    pub fn with_event_subscriber(mut self, subscriber: Arc<dyn EventSubscriber>) -> Self {
        self.event_subscribers.push(subscriber);
        self
    }

    /// Validate the configuration and declare every resource.
    ///
    /// # Errors
    ///
    /// Configuration errors, including an unsupported region, are reported
    /// before any resource is declared.
    pub fn build(self) -> Result<StackDefinition, StackError> {
        let events = EventDispatcher::new();
        for subscriber in self.event_subscribers {
            events.subscribe(subscriber);
        }
        let metrics = Arc::new(MetricsCollector::new());
        events.subscribe(Arc::clone(&metrics) as Arc<dyn EventSubscriber>);

        let config = self.config;
        let region = match config.validate() {
            Ok(region) => region,
            Err(e) => {
                error!(stack = %config.stack_name, error = %e, "Configuration rejected");
                events.emit(BuildEvent::BuildFailed {
                    message: e.to_string(),
                });
                return Err(e.into());
            }
        };

        let started = Instant::now();
        events.emit(BuildEvent::BuildStarted {
            stack_name: config.stack_name.clone(),
            region,
        });

        let ids = StackIds::new(&config.resource_prefix);
        let graph = match stack::define(&config, region, &ids, &events) {
            Ok(graph) => graph,
            Err(e) => {
                error!(stack = %config.stack_name, error = %e, "Build failed");
                events.emit(BuildEvent::BuildFailed {
                    message: e.to_string(),
                });
                return Err(e);
            }
        };

        let duration = started.elapsed();
        events.emit(BuildEvent::BuildCompleted {
            resource_count: graph.len(),
            duration,
        });
        info!(
            stack = %config.stack_name,
            region = %region,
            resources = graph.len(),
            ?duration,
            "Stack built"
        );

        Ok(StackDefinition {
            config,
            region,
            ids,
            graph,
            metrics: metrics.snapshot(),
        })
    }
}

impl Default for NodeStackBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A fully built stack: the validated configuration and its resource graph.
#[derive(Debug, Clone)]
pub struct StackDefinition {
    config: StackConfig,
    region: Region,
    ids: StackIds,
    graph: NodeGraph,
    metrics: MetricsSnapshot,
}

impl StackDefinition {
    /// Get the resource graph.
    pub fn graph(&self) -> &NodeGraph {
        &self.graph
    }

    /// Get the target region.
    pub fn region(&self) -> Region {
        self.region
    }

    /// Get the configuration the stack was built from.
    pub fn config(&self) -> &StackConfig {
        &self.config
    }

    /// Get the logical ids of the stack's resources.
    pub fn ids(&self) -> &StackIds {
        &self.ids
    }

    /// Get the metrics collected during the build.
    pub fn metrics(&self) -> &MetricsSnapshot {
        &self.metrics
    }

    /// The published hostname.
    pub fn hostname(&self) -> String {
        self.config.variables.published_hostname()
    }

    /// Resources in build order.
    pub fn build_order(&self) -> Result<Vec<ResourceSummary>, StackError> {
        Ok(self
            .graph
            .topological_order()?
            .into_iter()
            .filter_map(|id| {
                self.graph.node(&id).map(|node| ResourceSummary {
                    id: node.id.clone(),
                    kind: node.resource.kind(),
                    dependencies: node.dependencies(),
                })
            })
            .collect())
    }

    /// Render the deployment template.
    pub fn synth(&self) -> Result<SynthesizedStack, StackError> {
        let description = format!(
            "XRPL node host: {} behind {}",
            self.config.policy.instance_type,
            self.hostname()
        );
        Ok(SynthesizedStack {
            stack_name: self.config.stack_name.clone(),
            region: self.region.to_string(),
            template: template::synthesize(&self.graph, &description)?,
        })
    }

    /// Summarize the build.
    pub fn report(&self) -> Result<SynthesisReport, StackError> {
        Ok(SynthesisReport::success(
            self.config.stack_name.clone(),
            self.region.as_str(),
            self.build_order()?,
            self.metrics.clone(),
        ))
    }
}

impl SynthesizedStack {
    /// Serialize the template to pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String, StackError> {
        self.template.to_json_pretty()
    }
}

/// Errors from a stack build.
#[derive(Debug, thiserror::Error)]
pub enum StackError {
    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Inconsistent resource graph.
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// Invalid firewall rule.
    #[error("Firewall error: {0}")]
    Firewall(#[from] FirewallError),

    /// Template serialization failed.
    #[error("Template error: {0}")]
    Template(#[from] serde_json::Error),
}

/// Prelude module for convenient imports.
pub mod prelude {
    // Main types
    pub use crate::{NodeStack, NodeStackBuilder, StackDefinition, StackError};
    pub use crate::resource::{NodeGraph, Resource};
    pub use crate::stack::StackIds;
    pub use crate::template::{SynthesizedStack, Template};

    // Core types
    pub use nodestack_core::{
        GraphNode, LogicalId, MachineImage, NetworkConfig, Region, ResourceKind, StackConfig,
        StackEnvironment, StackPolicy, StackVariables,
    };

    // Firewall types
    pub use nodestack_firewall::{IngressRule, Peer, PortRange, RuleSet, Traffic, Verdict};

    // Observability types
    pub use nodestack_observe::{
        BuildEvent, CollectingSubscriber, EventSubscriber, LoggingSubscriber, SynthesisReport,
    };

    // Common std types
    pub use std::sync::Arc;
}
