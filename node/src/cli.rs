//! # CLI Interface
//!
//! Defines the command-line argument structure for `humanpass-node` using
//! `clap` derive. Supports three subcommands: `run`, `keygen`, and
//! `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use humanpass_protocol::config::{
    DEFAULT_METRICS_PORT, DEFAULT_RPC_PORT, DEFAULT_TEMPLATE_NAME, DEFAULT_TEMPLATE_SYMBOL,
};

use crate::logging::LogFormat;

/// Human Pass registry node.
///
/// Hosts an instance factory for soulbound credential registries, accepts
/// signed calls over HTTP, persists every instance, and exposes Prometheus
/// metrics.
#[derive(Parser, Debug)]
#[command(
    name = "humanpass-node",
    about = "Human Pass credential registry node",
    version,
    propagate_version = true
)]
pub struct HumanPassCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the node.
    Run(RunArgs),
    /// Generate a caller keypair and print its address.
    Keygen,
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Directory holding the database and the deployer key.
    ///
    /// Created on first run if it does not exist.
    #[arg(long, short = 'd', env = "HUMANPASS_DATA_DIR", default_value = ".humanpass")]
    pub data_dir: PathBuf,

    /// Port for the REST API.
    #[arg(long, env = "HUMANPASS_RPC_PORT", default_value_t = DEFAULT_RPC_PORT)]
    pub rpc_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "HUMANPASS_METRICS_PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Hex-encoded Ed25519 secret key of the factory deployer.
    ///
    /// If not provided, the node reads `deployer.key` from the data
    /// directory, generating one on first run.
    #[arg(long, env = "HUMANPASS_DEPLOYER_KEY", hide_env_values = true)]
    pub deployer_key: Option<String>,

    /// Collection name compiled into the registry template.
    #[arg(long, default_value = DEFAULT_TEMPLATE_NAME)]
    pub template_name: String,

    /// Collection symbol compiled into the registry template.
    #[arg(long, default_value = DEFAULT_TEMPLATE_SYMBOL)]
    pub template_symbol: String,

    /// Log output format: `pretty` or `json`.
    #[arg(long, env = "HUMANPASS_LOG_FORMAT", default_value = "pretty", value_parser = parse_log_format)]
    pub log_format: LogFormat,
}

fn parse_log_format(s: &str) -> Result<LogFormat, String> {
    match s.to_ascii_lowercase().as_str() {
        "pretty" => Ok(LogFormat::Pretty),
        "json" => Ok(LogFormat::Json),
        other => Err(format!("unknown log format '{other}', expected pretty or json")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        // Ensures the derive macros produce a valid CLI definition.
        HumanPassCli::command().debug_assert();
    }

    #[test]
    fn run_defaults() {
        let cli = HumanPassCli::try_parse_from(["humanpass-node", "run"]).unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run subcommand");
        };
        assert_eq!(args.rpc_port, DEFAULT_RPC_PORT);
        assert_eq!(args.template_symbol, DEFAULT_TEMPLATE_SYMBOL);
        assert_eq!(args.log_format, LogFormat::Pretty);
    }

    #[test]
    fn log_format_flag() {
        let cli =
            HumanPassCli::try_parse_from(["humanpass-node", "run", "--log-format", "JSON"]).unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run subcommand");
        };
        assert_eq!(args.log_format, LogFormat::Json);
        assert!(
            HumanPassCli::try_parse_from(["humanpass-node", "run", "--log-format", "xml"]).is_err()
        );
    }
}
