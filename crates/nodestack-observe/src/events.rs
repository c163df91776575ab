//! Observable events during a stack build.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use nodestack_core::{LogicalId, Region, ResourceKind};

/// Events that can be observed while a stack is built.
#[derive(Debug, Clone)]
pub enum BuildEvent {
    /// Configuration validated; resources are about to be declared.
    BuildStarted {
        /// Stack name.
        stack_name: String,
        /// Target region.
        region: Region,
    },
    /// A resource was added to the graph.
    ResourceDeclared {
        /// Logical id.
        id: LogicalId,
        /// Resource kind.
        kind: ResourceKind,
        /// Resources it references.
        dependencies: Vec<LogicalId>,
    },
    /// The machine image was resolved for the target region.
    ImageResolved {
        /// Target region.
        region: Region,
        /// Selected image id.
        image_id: String,
    },
    /// An ingress rule was attached to a security group.
    RuleAdded {
        /// The security group.
        group: LogicalId,
        /// The rule, rendered.
        rule: String,
    },
    /// The graph is complete.
    BuildCompleted {
        /// Number of resources declared.
        resource_count: usize,
        /// Total duration.
        duration: Duration,
    },
    /// The build was aborted.
    BuildFailed {
        /// Error message.
        message: String,
    },
    /// Custom event.
    Custom {
        /// Event name.
        name: String,
        /// Event data.
        data: serde_json::Value,
    },
}

impl BuildEvent {
    /// Get the event type name.
    pub fn event_type(&self) -> &'static str {
        match self {
            BuildEvent::BuildStarted { .. } => "build_started",
            BuildEvent::ResourceDeclared { .. } => "resource_declared",
            BuildEvent::ImageResolved { .. } => "image_resolved",
            BuildEvent::RuleAdded { .. } => "rule_added",
            BuildEvent::BuildCompleted { .. } => "build_completed",
            BuildEvent::BuildFailed { .. } => "build_failed",
            BuildEvent::Custom { .. } => "custom",
        }
    }
}

/// Subscriber for build events.
pub trait EventSubscriber: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: &BuildEvent);

    /// Event types this subscriber wants; `None` receives everything.
    fn event_filter(&self) -> Option<Vec<&'static str>> {
        None
    }
}

/// Forwards build events to `tracing`.
pub struct LoggingSubscriber;

impl LoggingSubscriber {
    /// Create a new logging subscriber.
    pub fn new() -> Self {
        Self
    }
}

impl Default for LoggingSubscriber {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSubscriber for LoggingSubscriber {
    fn on_event(&self, event: &BuildEvent) {
        match event {
            BuildEvent::BuildStarted { stack_name, region } => {
                tracing::info!(
                    event = "build_started",
                    stack = stack_name,
                    region = %region,
                    "Build started"
                );
            }
            BuildEvent::ResourceDeclared {
                id,
                kind,
                dependencies,
            } => {
                tracing::info!(
                    event = "resource_declared",
                    id = %id,
                    kind = %kind,
                    dependencies = dependencies.len(),
                    "Resource declared"
                );
            }
            BuildEvent::ImageResolved { region, image_id } => {
                tracing::debug!(
                    event = "image_resolved",
                    region = %region,
                    image = image_id,
                    "Machine image resolved"
                );
            }
            BuildEvent::RuleAdded { group, rule } => {
                tracing::debug!(
                    event = "rule_added",
                    group = %group,
                    rule = rule,
                    "Ingress rule attached"
                );
            }
            BuildEvent::BuildCompleted {
                resource_count,
                duration,
            } => {
                tracing::info!(
                    event = "build_completed",
                    resources = resource_count,
                    duration_us = duration.as_micros(),
                    "Build completed"
                );
            }
            BuildEvent::BuildFailed { message } => {
                tracing::error!(event = "build_failed", message = message, "Build failed");
            }
            BuildEvent::Custom { name, data } => {
                tracing::debug!(event = "custom", name = name, data = %data, "Custom event");
            }
        }
    }
}

/// A subscriber that collects events for later analysis.
pub struct CollectingSubscriber {
    events: RwLock<Vec<(Instant, BuildEvent)>>,
    max_events: usize,
}

impl CollectingSubscriber {
    /// Create a new collecting subscriber.
    pub fn new(max_events: usize) -> Self {
        Self {
            events: RwLock::new(Vec::new()),
            max_events,
        }
    }

    /// Get collected events.
    pub fn events(&self) -> Vec<(Instant, BuildEvent)> {
        self.events.read().clone()
    }

    /// Ids of every `ResourceDeclared` event, in order.
    pub fn declared_ids(&self) -> Vec<LogicalId> {
        self.events
            .read()
            .iter()
            .filter_map(|(_, event)| match event {
                BuildEvent::ResourceDeclared { id, .. } => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    /// Count events of one type.
    pub fn count_of(&self, event_type: &str) -> usize {
        self.events
            .read()
            .iter()
            .filter(|(_, event)| event.event_type() == event_type)
            .count()
    }

    /// Clear collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Get event count.
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

impl EventSubscriber for CollectingSubscriber {
    fn on_event(&self, event: &BuildEvent) {
        let mut events = self.events.write();
        if events.len() < self.max_events {
            events.push((Instant::now(), event.clone()));
        }
    }
}

/// Event dispatcher that manages subscribers.
#[derive(Default)]
pub struct EventDispatcher {
    subscribers: RwLock<Vec<Arc<dyn EventSubscriber>>>,
}

impl EventDispatcher {
    /// Create a new event dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber.
    pub fn subscribe(&self, subscriber: Arc<dyn EventSubscriber>) {
        self.subscribers.write().push(subscriber);
    }

    /// Remove all subscribers.
    pub fn clear_subscribers(&self) {
        self.subscribers.write().clear();
    }

    /// Get subscriber count.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event: BuildEvent) {
        let subscribers = self.subscribers.read();
        for subscriber in subscribers.iter() {
            if let Some(filter) = subscriber.event_filter() {
                if !filter.contains(&event.event_type()) {
                    continue;
                }
            }
            subscriber.on_event(&event);
        }
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
