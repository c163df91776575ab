//! Inspect command - List the stack's resources in build order.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use nodestack::StackDefinition;
use nodestack::nodestack_observe::ResourceSummary;

use super::ConfigSource;
use crate::OutputFormat;

/// Arguments for the inspect command.
#[derive(Args)]
pub struct InspectArgs {
    /// Show dependency edges
    #[arg(long)]
    pub edges: bool,

    /// Show only resources of this kind (e.g. security_group)
    #[arg(long)]
    pub kind: Option<String>,
}

/// Inspection result.
#[derive(Debug, Serialize)]
struct InspectionResult {
    stack_name: String,
    region: String,
    hostname: String,
    resources: Vec<ResourceDisplay>,
    #[serde(skip_serializing_if = "Option::is_none")]
    edges: Option<Vec<EdgeDisplay>>,
}

#[derive(Debug, Serialize)]
struct ResourceDisplay {
    position: usize,
    id: String,
    kind: String,
    dependencies: Vec<String>,
}

#[derive(Debug, Serialize)]
struct EdgeDisplay {
    from: String,
    to: String,
}

impl ResourceDisplay {
    fn new(position: usize, summary: &ResourceSummary) -> Self {
        Self {
            position,
            id: summary.id.to_string(),
            kind: summary.kind.to_string(),
            dependencies: summary.dependencies.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Collect the resources and edges to display.
fn inspect(stack: &StackDefinition, args: &InspectArgs) -> Result<InspectionResult> {
    let order = stack.build_order().context("Failed to order resources")?;

    let resources = order
        .iter()
        .enumerate()
        .map(|(i, summary)| ResourceDisplay::new(i + 1, summary))
        .filter(|r| args.kind.as_deref().is_none_or(|kind| r.kind == kind))
        .collect();

    let edges = args.edges.then(|| {
        stack
            .graph()
            .edges()
            .into_iter()
            .map(|(from, to)| EdgeDisplay {
                from: from.to_string(),
                to: to.to_string(),
            })
            .collect()
    });

    Ok(InspectionResult {
        stack_name: stack.config().stack_name.clone(),
        region: stack.region().to_string(),
        hostname: stack.hostname(),
        resources,
        edges,
    })
}

/// Execute the inspect command.
pub fn execute(args: InspectArgs, source: &ConfigSource, format: OutputFormat) -> Result<()> {
    let stack = source.build()?;
    let result = inspect(&stack, &args)?;

    match format {
        OutputFormat::Human => {
            println!("Stack: {}", result.stack_name);
            println!("Region: {}", result.region);
            println!("Hostname: {}", result.hostname);
            println!();

            println!("Resources ({}):", result.resources.len());
            for resource in &result.resources {
                if resource.dependencies.is_empty() {
                    println!("  {:>2}. {} [{}]", resource.position, resource.id, resource.kind);
                } else {
                    println!(
                        "  {:>2}. {} [{}] <- {}",
                        resource.position,
                        resource.id,
                        resource.kind,
                        resource.dependencies.join(", ")
                    );
                }
            }

            if let Some(edges) = &result.edges {
                println!();
                println!("Edges ({}):", edges.len());
                for edge in edges {
                    println!("  {} -> {}", edge.from, edge.to);
                }
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        OutputFormat::JsonCompact => {
            println!("{}", serde_json::to_string(&result)?);
        }
    }

    Ok(())
}
