//! Metrics collected while a stack is built.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use nodestack_core::{LogicalId, ResourceKind};

use crate::events::{BuildEvent, EventSubscriber};

/// Collects metrics during a build.
///
/// It is also an [`EventSubscriber`], so it can be fed straight from an
/// [`EventDispatcher`](crate::EventDispatcher).
#[derive(Default)]
pub struct MetricsCollector {
    timing: RwLock<TimingMetrics>,
    resources: RwLock<ResourceMetrics>,
    firewall: RwLock<FirewallMetrics>,
}

impl MetricsCollector {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the start of the build.
    pub fn record_start(&self) {
        self.timing.write().start_time = Some(Instant::now());
    }

    /// Record the end of the build.
    pub fn record_end(&self) {
        let mut timing = self.timing.write();
        timing.end_time = Some(Instant::now());
        if let (Some(start), Some(end)) = (timing.start_time, timing.end_time) {
            timing.build_time = end.duration_since(start);
        }
    }

    /// Record a declared resource and its outgoing edges.
    pub fn record_resource(&self, kind: ResourceKind, dependency_count: usize) {
        let mut resources = self.resources.write();
        *resources.counts.entry(kind).or_insert(0) += 1;
        resources.edges += dependency_count as u64;
    }

    /// Record an ingress rule on a security group.
    pub fn record_rule(&self, group: &LogicalId) {
        let mut firewall = self.firewall.write();
        firewall.rules += 1;
        *firewall.rules_by_group.entry(group.clone()).or_insert(0) += 1;
    }

    /// Get a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timing: self.timing.read().clone(),
            resources: self.resources.read().clone(),
            firewall: self.firewall.read().clone(),
        }
    }

    /// Reset all metrics.
    pub fn reset(&self) {
        *self.timing.write() = TimingMetrics::default();
        *self.resources.write() = ResourceMetrics::default();
        *self.firewall.write() = FirewallMetrics::default();
    }
}

impl EventSubscriber for MetricsCollector {
    fn on_event(&self, event: &BuildEvent) {
        match event {
            BuildEvent::BuildStarted { .. } => self.record_start(),
            BuildEvent::ResourceDeclared {
                kind, dependencies, ..
            } => self.record_resource(*kind, dependencies.len()),
            BuildEvent::RuleAdded { group, .. } => self.record_rule(group),
            BuildEvent::BuildCompleted { .. } | BuildEvent::BuildFailed { .. } => {
                self.record_end()
            }
            BuildEvent::ImageResolved { .. } | BuildEvent::Custom { .. } => {}
        }
    }
}

impl std::fmt::Debug for MetricsCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsCollector")
            .field("timing", &*self.timing.read())
            .field("resources", &*self.resources.read())
            .field("firewall", &*self.firewall.read())
            .finish()
    }
}

/// Snapshot of collected metrics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Timing metrics.
    pub timing: TimingMetrics,
    /// Resource metrics.
    pub resources: ResourceMetrics,
    /// Firewall metrics.
    pub firewall: FirewallMetrics,
}

impl MetricsSnapshot {
    /// Total number of declared resources.
    pub fn total_resources(&self) -> u64 {
        self.resources.counts.values().sum()
    }
}

/// Timing-related metrics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimingMetrics {
    /// When the build started.
    #[serde(skip)]
    pub start_time: Option<Instant>,
    /// When the build ended.
    #[serde(skip)]
    pub end_time: Option<Instant>,
    /// Total build time.
    #[serde(with = "duration_serde")]
    pub build_time: Duration,
}

/// Resource-related metrics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceMetrics {
    /// Declared resources per kind.
    pub counts: BTreeMap<ResourceKind, u64>,
    /// Number of dependency edges.
    pub edges: u64,
}

/// Firewall-related metrics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FirewallMetrics {
    /// Total ingress rules.
    pub rules: u64,
    /// Ingress rules per security group.
    pub rules_by_group: BTreeMap<LogicalId, u64>,
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_micros() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let micros = u64::deserialize(deserializer)?;
        Ok(Duration::from_micros(micros))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timing() {
        let collector = MetricsCollector::new();

        collector.record_start();
        std::thread::sleep(Duration::from_millis(5));
        collector.record_end();

        let snapshot = collector.snapshot();
        assert!(snapshot.timing.build_time >= Duration::from_millis(5));
    }

    #[test]
    fn test_resource_counts() {
        let collector = MetricsCollector::new();
        collector.record_resource(ResourceKind::Network, 0);
        collector.record_resource(ResourceKind::SecurityGroup, 1);
        collector.record_resource(ResourceKind::SecurityGroup, 2);

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.resources.counts.get(&ResourceKind::SecurityGroup), Some(&2));
        assert_eq!(snapshot.resources.edges, 3);
        assert_eq!(snapshot.total_resources(), 3);
    }

    #[test]
    fn test_collects_from_events() {
        let collector = MetricsCollector::new();
        collector.on_event(&BuildEvent::ResourceDeclared {
            id: LogicalId::new("Lb"),
            kind: ResourceKind::LoadBalancer,
            dependencies: vec![LogicalId::new("Vpc"), LogicalId::new("EdgeSg")],
        });
        collector.on_event(&BuildEvent::RuleAdded {
            group: LogicalId::new("EdgeSg"),
            rule: "tcp/443 from 0.0.0.0/0".to_string(),
        });

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.resources.edges, 2);
        assert_eq!(snapshot.firewall.rules, 1);
        assert_eq!(
            snapshot.firewall.rules_by_group.get(&LogicalId::new("EdgeSg")),
            Some(&1)
        );
    }

    #[test]
    fn test_reset() {
        let collector = MetricsCollector::new();
        collector.record_rule(&LogicalId::new("EdgeSg"));
        collector.reset();
        assert_eq!(collector.snapshot().firewall.rules, 0);
    }

    #[test]
    fn test_snapshot_serializes() {
        let collector = MetricsCollector::new();
        collector.record_resource(ResourceKind::AliasRecord, 2);
        let json = serde_json::to_value(collector.snapshot()).unwrap();
        assert_eq!(json["resources"]["counts"]["alias_record"], 1);
        assert_eq!(json["timing"]["build_time"], 0);
    }
}
