//! Nodestack Observability
//!
//! Visibility into stack builds:
//!
//! - [`EventDispatcher`]: fan-out of [`BuildEvent`]s to subscribers
//! - [`MetricsCollector`]: resource, edge and rule counts plus build time
//! - [`SynthesisReport`]: the summary printed by the CLI
//!
//! # Event Subscription
//!
//! ```
//! use std::sync::Arc;
//! use nodestack_core::{LogicalId, ResourceKind};
//! use nodestack_observe::{BuildEvent, CollectingSubscriber, EventDispatcher, EventSubscriber};
//!
//! let dispatcher = EventDispatcher::new();
//! let collector = Arc::new(CollectingSubscriber::new(64));
//! dispatcher.subscribe(Arc::clone(&collector) as Arc<dyn EventSubscriber>);
//!
//! dispatcher.emit(BuildEvent::ResourceDeclared {
//!     id: LogicalId::new("Vpc"),
//!     kind: ResourceKind::Network,
//!     dependencies: vec![],
//! });
//! assert_eq!(collector.declared_ids(), vec![LogicalId::new("Vpc")]);
//! ```

pub mod events;
pub mod metrics;
pub mod report;

// Re-export main types
pub use events::{
    BuildEvent, CollectingSubscriber, EventDispatcher, EventSubscriber, LoggingSubscriber,
};
pub use metrics::{
    FirewallMetrics, MetricsCollector, MetricsSnapshot, ResourceMetrics, TimingMetrics,
};
pub use report::{
    Diagnostic, DiagnosticLevel, ResourceSummary, SynthesisId, SynthesisOutcome, SynthesisReport,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::events::{BuildEvent, EventDispatcher, EventSubscriber};
    pub use crate::metrics::{MetricsCollector, MetricsSnapshot};
    pub use crate::report::{SynthesisOutcome, SynthesisReport};
}
