//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Output format for commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Reusable device connection arguments
#[derive(Debug, Clone, Args)]
pub struct DeviceArgs {
    /// Device address, peripheral ID, name or alias, or use BLEINQ_DEVICE env var
    #[arg(short, long, env = "BLEINQ_DEVICE")]
    pub device: Option<String>,

    /// Overall budget for the read in seconds
    #[arg(short = 'T', long)]
    pub timeout: Option<u64>,

    /// How long to scan for the device in seconds
    #[arg(long)]
    pub scan_timeout: Option<u64>,
}

#[derive(Parser)]
#[command(name = "bleinq")]
#[command(author, version, about = "Inquire nearby BLE peripherals and Xiaomi sensors", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Write output to file instead of stdout
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan for nearby sensors (Ctrl-C stops early)
    Scan {
        /// Scan timeout in seconds
        #[arg(short, long)]
        timeout: Option<u64>,

        /// List every advertiser, not only Xiaomi sensors
        #[arg(short, long)]
        all: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Read the battery level of a device
    Battery {
        #[command(flatten)]
        device: DeviceArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Read one characteristic of a device
    Read {
        #[command(flatten)]
        device: DeviceArgs,

        /// Service UUID (full or 16-bit, e.g. 180f)
        #[arg(short, long)]
        service: String,

        /// Characteristic UUID (full or 16-bit, e.g. 2a19)
        #[arg(short, long)]
        characteristic: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Decode a Xiaomi sensor advertisement payload offline
    Decode {
        /// Service data as hex (spaces, colons and a 0x prefix are allowed)
        payload: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Manage device aliases (friendly names for addresses)
    Alias {
        #[command(subcommand)]
        action: AliasSubcommand,
    },

    /// Manage custom display names shown by scan
    Name {
        #[command(subcommand)]
        action: NameSubcommand,
    },
}

#[derive(Subcommand)]
pub enum AliasSubcommand {
    /// List all aliases
    List,
    /// Set an alias for a device address
    Set {
        /// Alias name
        name: String,
        /// Device address
        address: String,
    },
    /// Remove an alias
    Remove {
        /// Alias name
        name: String,
    },
}

#[derive(Subcommand)]
pub enum NameSubcommand {
    /// List all custom names
    List,
    /// Give a device a custom display name
    Set {
        /// Device address
        address: String,
        /// Display name
        name: String,
    },
    /// Forget the custom name of a device
    Remove {
        /// Device address
        address: String,
    },
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_read_arguments() {
        let cli = Cli::try_parse_from([
            "bleinq", "read", "-d", "office", "-s", "180f", "-c", "2a19", "-T", "10",
        ])
        .unwrap();
        match cli.command {
            Commands::Read {
                device,
                service,
                characteristic,
                format,
            } => {
                assert_eq!(device.device.as_deref(), Some("office"));
                assert_eq!(device.timeout, Some(10));
                assert_eq!(service, "180f");
                assert_eq!(characteristic, "2a19");
                assert_eq!(format, OutputFormat::Text);
            }
            _ => panic!("expected read command"),
        }
    }

    #[test]
    fn test_parse_scan_defaults() {
        let cli = Cli::try_parse_from(["bleinq", "scan", "--all", "-f", "json"]).unwrap();
        match cli.command {
            Commands::Scan {
                timeout,
                all,
                format,
            } => {
                assert_eq!(timeout, None);
                assert!(all);
                assert_eq!(format, OutputFormat::Json);
            }
            _ => panic!("expected scan command"),
        }
    }
}
