//! Nodestack CLI - synthesize and inspect the XRPL node host stack.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

mod commands;

/// XRPL node host stack synthesizer
#[derive(Parser)]
#[command(name = "nodestack")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Target region, overriding the file and environment
    #[arg(short, long, global = true)]
    pub region: Option<String>,

    /// Output format
    #[arg(short = 'f', long, global = true, default_value = "human")]
    pub format: OutputFormat,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-essential output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Output format options.
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    #[default]
    Human,
    /// JSON output
    Json,
    /// Compact JSON (single line)
    JsonCompact,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Build the stack and emit its deployment template
    Synth(commands::synth::SynthArgs),
    /// Check the configuration and report problems
    Validate(commands::validate::ValidateArgs),
    /// List resources in build order
    Inspect(commands::inspect::InspectArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "nodestack={0},nodestack_core={0},nodestack_firewall={0},nodestack_observe={0}",
            log_level
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let source = commands::ConfigSource {
        path: cli.config,
        region: cli.region,
    };

    let result = match cli.command {
        Commands::Synth(args) => commands::synth::execute(args, &source, cli.format, cli.quiet),
        Commands::Validate(args) => commands::validate::execute(args, &source, cli.format),
        Commands::Inspect(args) => commands::inspect::execute(args, &source, cli.format),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if !cli.quiet {
                eprintln!("Error: {:#}", e);
            }
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "nodestack",
            "inspect",
            "--kind",
            "security_group",
            "--region",
            "us-east-1",
            "-f",
            "json-compact",
        ])
        .unwrap();
        assert_eq!(cli.region.as_deref(), Some("us-east-1"));
        assert!(matches!(cli.format, OutputFormat::JsonCompact));
        assert!(matches!(
            cli.command,
            Commands::Inspect(commands::inspect::InspectArgs { kind: Some(ref k), edges: false }) if k == "security_group"
        ));
    }
}
