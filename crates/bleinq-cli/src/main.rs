mod cli;
mod commands;
mod config;
mod format;
mod util;

use anyhow::Result;
use bleinq_core::{DEFAULT_SCAN_TIMEOUT, DeviceRegistry};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{AliasSubcommand, Cli, Commands, NameSubcommand};
use commands::{AliasAction, NameAction};
use config::{Config, resolve_timeout};
use util::{DeviceTarget, parse_uuid};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // When quiet mode is enabled, suppress info-level logging
    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let quiet = cli.quiet;
    let output = cli.output.as_ref();

    match cli.command {
        Commands::Scan {
            timeout,
            all,
            format,
        } => {
            let config = Config::load();
            let timeout = resolve_timeout(timeout, config.scan_timeout, DEFAULT_SCAN_TIMEOUT);
            let registry = DeviceRegistry::new().with_custom_names(config.names);
            commands::cmd_scan(timeout, all, format, output, quiet, registry).await
        }
        Commands::Battery { device, format } => {
            let config = Config::load();
            let target = DeviceTarget::resolve(device, &config, quiet)?;
            commands::cmd_battery(&target, format, output, quiet).await
        }
        Commands::Read {
            device,
            service,
            characteristic,
            format,
        } => {
            let config = Config::load();
            let service = parse_uuid(&service)?;
            let characteristic = parse_uuid(&characteristic)?;
            let target = DeviceTarget::resolve(device, &config, quiet)?;
            commands::cmd_read(&target, service, characteristic, format, output, quiet).await
        }
        Commands::Decode { payload, format } => commands::cmd_decode(&payload, format, output),
        Commands::Alias { action } => {
            let action = match action {
                AliasSubcommand::List => AliasAction::List,
                AliasSubcommand::Set { name, address } => AliasAction::Set { name, address },
                AliasSubcommand::Remove { name } => AliasAction::Remove { name },
            };
            commands::cmd_alias(action, quiet)
        }
        Commands::Name { action } => {
            let action = match action {
                NameSubcommand::List => NameAction::List,
                NameSubcommand::Set { address, name } => NameAction::Set { address, name },
                NameSubcommand::Remove { address } => NameAction::Remove { address },
            };
            commands::cmd_name(action, quiet)
        }
    }
}
