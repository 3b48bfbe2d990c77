//! CLI command definitions and argument parsing.

use clap::{Args, Parser, Subcommand, ValueEnum};
use georoute_domain::RoutingOptions;

/// Georoute - pick the best regional endpoint for a client address.
#[derive(Debug, Parser)]
#[command(name = "georoute")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path (defaults to the reference regions)
    #[arg(short, long, global = true, env = "GEOROUTE_CONFIG")]
    pub config: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, global = true, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Mark a region unhealthy before running the command (repeatable)
    #[arg(long = "down", value_name = "REGION", global = true)]
    pub down: Vec<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    Table,
    /// JSON format
    Json,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Route a client address to a region
    Route(RouteArgs),

    /// Show every region with its health, latency and last check
    Regions,

    /// Find the nearest healthy alternate for a region
    Backup {
        /// Region id
        region: String,
    },
}

/// Arguments for the route command.
#[derive(Debug, Args)]
pub struct RouteArgs {
    /// Client IP address (e.g., 8.8.8.8)
    pub address: String,

    /// Preferred region id
    #[arg(long, value_name = "REGION")]
    pub prefer: Option<String>,

    /// Latency ceiling in milliseconds
    #[arg(long, value_name = "MS")]
    pub max_latency: Option<u64>,

    /// Fall back to an unhealthy region rather than failing
    #[arg(long)]
    pub allow_unhealthy: bool,
}

impl RouteArgs {
    /// Routing options for this invocation
    pub fn options(&self) -> RoutingOptions {
        RoutingOptions {
            preferred_region: self.prefer.clone(),
            max_latency_ms: self.max_latency,
            require_healthy: self.allow_unhealthy.then_some(false),
        }
    }
}
