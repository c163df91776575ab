//! Validate command - Check the configuration and report problems.

use anyhow::Result;
use clap::Args;

use nodestack::nodestack_observe::DiagnosticLevel;
use nodestack::prelude::*;

use super::ConfigSource;
use crate::OutputFormat;

/// Arguments for the validate command.
#[derive(Args)]
pub struct ValidateArgs {
    /// Treat warnings as errors
    #[arg(long)]
    pub strict: bool,

    /// Print the effective configuration as TOML
    #[arg(long)]
    pub show_config: bool,
}

/// Collect warnings for a configuration that builds.
fn warnings(config: &StackConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.policy.spot_price.is_some() {
        warnings.push(
            "Instances run on spot capacity and may be interrupted at any time".to_string(),
        );
    }
    if config.network.max_azs < 2 {
        warnings.push(
            "Application load balancers need subnets in at least two availability zones"
                .to_string(),
        );
    }
    if config.policy.capacity.max == config.policy.capacity.min {
        warnings.push("Scaling policy has no room to scale: min equals max".to_string());
    }
    if config.env.account.is_none() {
        warnings.push("No target account set; the template is environment-agnostic".to_string());
    }

    warnings
}

/// Build the stack and collect diagnostics.
fn assess(config: StackConfig) -> Result<SynthesisReport> {
    let stack_name = config.stack_name.clone();
    let report = match NodeStack::from_config(config) {
        Ok(stack) => {
            let mut report = stack.report()?;
            for warning in warnings(stack.config()) {
                report.add_warning(warning);
            }
            report
        }
        Err(e) => {
            let mut report = SynthesisReport::failure(stack_name, e.to_string());
            report.add_error(format!("{:#}", anyhow::Error::from(e)));
            report
        }
    };
    Ok(report)
}

/// Turn a report into the command's exit status.
fn verdict(report: &SynthesisReport, strict: bool) -> Result<()> {
    if !report.is_success() {
        return Err(anyhow::anyhow!("Validation failed"));
    }
    if strict && report.warning_count() > 0 {
        return Err(anyhow::anyhow!(
            "Validation failed: {} warning(s) in strict mode",
            report.warning_count()
        ));
    }
    Ok(())
}

/// Execute the validate command.
pub fn execute(args: ValidateArgs, source: &ConfigSource, format: OutputFormat) -> Result<()> {
    let config = source.load()?;
    if args.show_config {
        println!("{}", config.to_toml_string()?);
    }
    let report = assess(config)?;

    match format {
        OutputFormat::Human => {
            if report.is_success() {
                println!("Configuration is valid: {}", report.stack_name);
                if let Some(region) = &report.region {
                    println!("  Region: {}", region);
                }
                println!("  Resources: {}", report.resources.len());

                let warnings: Vec<_> = report
                    .diagnostics
                    .iter()
                    .filter(|d| d.level == DiagnosticLevel::Warning)
                    .collect();
                if !warnings.is_empty() {
                    println!("\nWarnings:");
                    for warning in warnings {
                        println!("  - {}", warning.message);
                    }
                }
            } else {
                println!("Configuration is INVALID: {}", report.stack_name);
                for diag in &report.diagnostics {
                    println!("  Error: {}", diag.message);
                }
            }
        }
        OutputFormat::Json => {
            println!("{}", report.to_json_pretty());
        }
        OutputFormat::JsonCompact => {
            println!("{}", serde_json::to_string(&report)?);
        }
    }

    verdict(&report, args.strict)
}
