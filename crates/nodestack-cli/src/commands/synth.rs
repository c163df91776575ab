//! Synth command - Build the stack and emit its deployment template.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use nodestack::prelude::*;

use super::ConfigSource;
use crate::OutputFormat;

/// Arguments for the synth command.
#[derive(Args)]
pub struct SynthArgs {
    /// Write the template to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print the synthesis report after the template
    #[arg(long)]
    pub report: bool,
}

/// Render the stack's template in the requested format.
fn render(stack: &StackDefinition, format: OutputFormat) -> Result<(SynthesizedStack, String)> {
    let synthesized = stack.synth().context("Failed to synthesize template")?;
    let template = match format {
        OutputFormat::JsonCompact => synthesized.template.to_json()?,
        OutputFormat::Human | OutputFormat::Json => synthesized.to_json_pretty()?,
    };
    Ok((synthesized, template))
}

/// Execute the synth command.
pub fn execute(
    args: SynthArgs,
    source: &ConfigSource,
    format: OutputFormat,
    quiet: bool,
) -> Result<()> {
    let stack = source.build()?;
    let (synthesized, template) = render(&stack, format)?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, &template)
                .with_context(|| format!("Failed to write template to {}", path.display()))?;
            if !quiet {
                println!(
                    "Synthesized {} ({} resources) to {}",
                    synthesized.stack_name,
                    synthesized.template.resources.len(),
                    path.display()
                );
            }
        }
        None => println!("{}", template),
    }

    if args.report {
        let report = stack.report()?;
        match format {
            OutputFormat::Human => eprintln!("{}", report.to_text()),
            OutputFormat::Json => eprintln!("{}", report.to_json_pretty()),
            OutputFormat::JsonCompact => eprintln!("{}", report.to_json()),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::env;

    fn stack() -> StackDefinition {
        ConfigSource {
            path: None,
            region: None,
        }
        .build_with(env)
        .unwrap()
    }

    #[test]
    fn test_render_pretty_template() {
        let (synthesized, template) = render(&stack(), OutputFormat::Json).unwrap();
        assert_eq!(synthesized.region, "us-west-1");
        assert!(template.contains("\"AWSTemplateFormatVersion\""));
        assert!(template.lines().count() > 1);

        let parsed: serde_json::Value = serde_json::from_str(&template).unwrap();
        assert_eq!(
            parsed["Resources"].as_object().unwrap().len(),
            synthesized.template.resources.len()
        );
        assert_eq!(parsed["Outputs"]["Hostname"]["Value"], "www.node.example.com");
    }

    #[test]
    fn test_render_compact_template() {
        let (_, template) = render(&stack(), OutputFormat::JsonCompact).unwrap();
        assert_eq!(template.lines().count(), 1);
        assert!(template.contains("AWS::AutoScaling::AutoScalingGroup"));
    }

    #[test]
    fn test_unsupported_region_has_context() {
        let err = ConfigSource {
            path: None,
            region: Some("eu-west-1".to_string()),
        }
        .build_with(env)
        .unwrap_err();
        assert!(format!("{err:#}").contains("Failed to build stack"));
    }
}
