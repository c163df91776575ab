//! Synthesis reports.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use nodestack_core::{LogicalId, ResourceKind};

use crate::metrics::MetricsSnapshot;

/// Unique identifier for one synthesis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SynthesisId(Uuid);

impl SynthesisId {
    /// Create a new random synthesis ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SynthesisId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SynthesisId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One line of the resource listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSummary {
    /// Logical id.
    pub id: LogicalId,
    /// Resource kind.
    pub kind: ResourceKind,
    /// Direct dependencies.
    pub dependencies: Vec<LogicalId>,
}

/// Result of a synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SynthesisOutcome {
    /// The graph was built.
    Success {
        /// Number of graph nodes.
        resource_count: usize,
    },
    /// The build was aborted.
    Failed {
        /// Error message.
        message: String,
    },
}

impl SynthesisOutcome {
    /// Check if the outcome is successful.
    pub fn is_success(&self) -> bool {
        matches!(self, SynthesisOutcome::Success { .. })
    }

    /// Check if the outcome is a failure.
    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }
}

/// A diagnostic message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Severity level.
    pub level: DiagnosticLevel,
    /// Message.
    pub message: String,
    /// Additional context.
    pub context: Option<String>,
}

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticLevel {
    /// Informational.
    Info,
    /// Warning.
    Warning,
    /// Error.
    Error,
}

impl DiagnosticLevel {
    fn label(&self) -> &'static str {
        match self {
            DiagnosticLevel::Info => "INFO",
            DiagnosticLevel::Warning => "WARN",
            DiagnosticLevel::Error => "ERROR",
        }
    }
}

/// Complete synthesis report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisReport {
    /// Unique synthesis ID.
    pub synthesis_id: SynthesisId,
    /// Stack name.
    pub stack_name: String,
    /// Target region, when it could be resolved.
    pub region: Option<String>,
    /// Outcome.
    pub outcome: SynthesisOutcome,
    /// Resources in build order.
    pub resources: Vec<ResourceSummary>,
    /// Collected metrics.
    pub metrics: MetricsSnapshot,
    /// Diagnostic messages.
    pub diagnostics: Vec<Diagnostic>,
}

impl SynthesisReport {
    /// Report for a successful build.
    pub fn success(
        stack_name: impl Into<String>,
        region: impl Into<String>,
        resources: Vec<ResourceSummary>,
        metrics: MetricsSnapshot,
    ) -> Self {
        Self {
            synthesis_id: SynthesisId::new(),
            stack_name: stack_name.into(),
            region: Some(region.into()),
            outcome: SynthesisOutcome::Success {
                resource_count: resources.len(),
            },
            resources,
            metrics,
            diagnostics: Vec::new(),
        }
    }

    /// Report for a failed build. No resources are listed.
    pub fn failure(stack_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            synthesis_id: SynthesisId::new(),
            stack_name: stack_name.into(),
            region: None,
            outcome: SynthesisOutcome::Failed {
                message: message.into(),
            },
            resources: Vec::new(),
            metrics: MetricsSnapshot::default(),
            diagnostics: Vec::new(),
        }
    }

    /// Add a diagnostic message.
    pub fn add_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Add an info diagnostic.
    pub fn add_info(&mut self, message: impl Into<String>) {
        self.push(DiagnosticLevel::Info, message.into());
    }

    /// Add a warning diagnostic.
    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.push(DiagnosticLevel::Warning, message.into());
    }

    /// Add an error diagnostic.
    pub fn add_error(&mut self, message: impl Into<String>) {
        self.push(DiagnosticLevel::Error, message.into());
    }

    fn push(&mut self, level: DiagnosticLevel, message: String) {
        self.diagnostics.push(Diagnostic {
            level,
            message,
            context: None,
        });
    }

    /// Check if the build was successful.
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    /// Number of warnings.
    pub fn warning_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.level == DiagnosticLevel::Warning)
            .count()
    }

    /// Format as human-readable text.
    pub fn to_text(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("Synthesis Report: {}\n", self.synthesis_id));
        output.push_str(&format!("Stack: {}\n", self.stack_name));
        if let Some(region) = &self.region {
            output.push_str(&format!("Region: {}\n", region));
        }
        output.push('\n');

        match &self.outcome {
            SynthesisOutcome::Success { resource_count } => {
                output.push_str(&format!("Outcome: Success ({} resources)\n", resource_count));
            }
            SynthesisOutcome::Failed { message } => {
                output.push_str(&format!("Outcome: Failed\n  Error: {}\n", message));
            }
        }

        if !self.resources.is_empty() {
            output.push_str("\nResources:\n");
            for (position, resource) in self.resources.iter().enumerate() {
                output.push_str(&format!(
                    "  {:>2}. {} ({})\n",
                    position + 1,
                    resource.id,
                    resource.kind
                ));
            }

            output.push_str("\nMetrics:\n");
            output.push_str(&format!(
                "  Build Time: {:?}\n",
                self.metrics.timing.build_time
            ));
            output.push_str(&format!("  Edges: {}\n", self.metrics.resources.edges));
            output.push_str(&format!(
                "  Ingress Rules: {}\n",
                self.metrics.firewall.rules
            ));
        }

        if !self.diagnostics.is_empty() {
            output.push_str("\nDiagnostics:\n");
            for diag in &self.diagnostics {
                output.push_str(&format!("  [{}] {}\n", diag.level.label(), diag.message));
            }
        }

        output
    }

    /// Format as JSON.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Format as pretty JSON string.
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricsCollector;

    fn summary(id: &'static str, kind: ResourceKind) -> ResourceSummary {
        ResourceSummary {
            id: LogicalId::new(id),
            kind,
            dependencies: Vec::new(),
        }
    }

    #[test]
    fn test_synthesis_id() {
        assert_ne!(SynthesisId::new(), SynthesisId::new());
    }

    #[test]
    fn test_success_report() {
        let report = SynthesisReport::success(
            "XrplNodeHostStack",
            "us-east-1",
            vec![
                summary("Vpc", ResourceKind::Network),
                summary("Lb", ResourceKind::LoadBalancer),
            ],
            MetricsCollector::new().snapshot(),
        );

        assert!(report.is_success());
        assert!(matches!(
            report.outcome,
            SynthesisOutcome::Success { resource_count: 2 }
        ));

        let text = report.to_text();
        assert!(text.contains("XrplNodeHostStack"));
        assert!(text.contains("Region: us-east-1"));
        assert!(text.contains("1. Vpc (network)"));
        assert!(text.contains("2. Lb (load_balancer)"));
    }

    #[test]
    fn test_failure_report() {
        let report = SynthesisReport::failure("Stack", "Unsupported region 'eu-west-1'");
        assert!(report.outcome.is_failure());
        assert!(report.resources.is_empty());

        let json = report.to_json();
        assert_eq!(json["outcome"]["status"], "failed");
        assert!(report.to_text().contains("eu-west-1"));
    }

    #[test]
    fn test_diagnostics() {
        let mut report = SynthesisReport::failure("Stack", "x");
        report.add_info("info");
        report.add_warning("careful");
        report.add_error("bad");

        assert_eq!(report.diagnostics.len(), 3);
        assert_eq!(report.warning_count(), 1);
        assert!(report.to_text().contains("[WARN] careful"));
        assert!(report.to_json_pretty().contains("careful"));
    }
}
