use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use uptime::MultiAddr;
use uptime::probe::classify;

use crate::config::Config;
use crate::error::AppError;

/// Separator of the `--multi-addresses` list
const MULTI_ADDRESS_DELIMITER: char = ',';

#[derive(Debug, Parser)]
#[command(name = "uptime-checker", version, about = "Checks the uptime of registered member and checker nodes")]
pub struct Cli {
    /// Config file, created with defaults if missing
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Register this checker if needed and monitor every participant
    Run(RunArgs),
    /// Creates a member node in the uptime actor
    NewMember(NodeArgs),
    /// Edits the member node owned by the wallet
    EditMember(NodeArgs),
    /// Edits the checker node owned by the wallet
    EditChecker(NodeArgs),
    /// Removes the member node owned by the wallet
    RemoveMember(LedgerArgs),
    /// Removes the checker node owned by the wallet
    RemoveChecker(LedgerArgs),
    /// Print version
    Version,
}

#[derive(Debug, Clone, Args)]
pub struct LedgerArgs {
    /// Address of the uptime actor
    #[arg(long, env = "ACTOR_ADDRESS")]
    pub actor_address: Option<String>,

    /// Index of the wallet used to sign messages
    #[arg(long, env = "WALLET_INDEX")]
    pub wallet_index: Option<usize>,

    /// Base URL of the ledger gateway
    #[arg(long, env = "LEDGER_ENDPOINT")]
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub ledger: LedgerArgs,

    /// Actor id of this checker
    #[arg(long, env = "ACTOR_ID")]
    pub actor_id: Option<u64>,

    /// Bind address of the ping responder
    #[arg(long, env = "CHECKER_HOST")]
    pub checker_host: Option<String>,

    #[arg(long, env = "CHECKER_PORT")]
    pub checker_port: Option<u16>,

    /// Port of the status endpoint
    #[arg(long, env = "NODE_INFO_PORT")]
    pub node_info_port: Option<u16>,

    /// Use an in-process ledger instead of the gateway
    #[arg(long)]
    pub dev: bool,
}

#[derive(Debug, Clone, Args)]
pub struct NodeArgs {
    #[command(flatten)]
    pub ledger: LedgerArgs,

    /// Peer id of the node
    #[arg(long)]
    pub peer_id: String,

    /// Comma separated multi-addresses to register
    #[arg(long)]
    pub multi_addresses: String,
}

impl LedgerArgs {
    /// Override config values with the ones given on the command line
    pub fn apply(&self, config: &mut Config) {
        if let Some(actor_address) = &self.actor_address {
            config.ledger.actor_address = actor_address.clone();
        }
        if let Some(wallet_index) = self.wallet_index {
            config.ledger.wallet_index = wallet_index;
        }
        if let Some(endpoint) = &self.endpoint {
            config.ledger.endpoint = endpoint.clone();
        }
    }
}

impl RunArgs {
    pub fn apply(&self, config: &mut Config) {
        self.ledger.apply(config);
        if let Some(actor_id) = self.actor_id {
            config.checker.actor_id = actor_id;
        }
        if let Some(host) = &self.checker_host {
            config.checker.host = host.clone();
        }
        if let Some(port) = self.checker_port {
            config.checker.port = port;
        }
        if let Some(port) = self.node_info_port {
            config.status.port = port;
        }
    }
}

impl NodeArgs {
    pub fn addresses(&self) -> Result<Vec<MultiAddr>, AppError> {
        parse_multi_addresses(&self.multi_addresses)
    }
}

/// Split and validate a comma separated list of multi-addresses
pub fn parse_multi_addresses(raw: &str) -> Result<Vec<MultiAddr>, AppError> {
    let mut addresses = Vec::new();

    for entry in raw.split(MULTI_ADDRESS_DELIMITER).map(str::trim).filter(|entry| !entry.is_empty()) {
        if !entry.starts_with('/') {
            return Err(AppError::InvalidMultiAddr(entry.to_string()));
        }
        let address = MultiAddr::from(entry);
        classify(&address)?;
        addresses.push(address);
    }

    if addresses.is_empty() {
        return Err(AppError::NoMultiAddrs);
    }
    Ok(addresses)
}
