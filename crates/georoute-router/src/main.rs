//! Georoute CLI
//!
//! Routes a client address, prints fleet status, or finds a backup region
//! against a fleet loaded from TOML (or the reference fleet).

mod cli;
mod output;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Command};
use georoute_router::{config::RouterConfig, GeoRouter};
use output::Formatter;
use tracing_subscriber::EnvFilter;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so JSON on stdout stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => RouterConfig::from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path))?,
        None => {
            tracing::info!("No config file specified, using reference regions");
            RouterConfig::default_test_config()
        }
    };

    let router = GeoRouter::with_defaults(config)?;
    for region in &cli.down {
        router.set_region_health(region, false)?;
    }

    let formatter = Formatter::new(cli.format, !cli.no_color);

    match cli.command {
        Command::Route(args) => {
            let decision = router.route_request(&args.address, &args.options())?;
            println!("{}", formatter.decision(&decision)?);
        }
        Command::Regions => {
            println!("{}", formatter.regions(&router.regions_status())?);
        }
        Command::Backup { region } => match router.backup_decision(&region)? {
            Some(decision) => println!("{}", formatter.decision(&decision)?),
            None => println!(
                "{}",
                formatter.warning(&format!("No healthy backup region for {}", region))
            ),
        },
    }

    Ok(())
}
