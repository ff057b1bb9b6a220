#![warn(clippy::all, clippy::pedantic)]

use anyhow::Context;
use clap::Parser;
use tracing::{error, level_filters::LevelFilter};

mod cli;
mod commands;
mod config;
mod error;
mod status;

use cli::{Cli, Command};
use commands::NodeKind;
use config::Config;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    logger::init_with_level(logger::parse_level(&cli.log_level).unwrap_or(LevelFilter::INFO));

    if let Command::Version = cli.command {
        commands::version();
        return Ok(());
    }

    let config_file = config::config_path(cli.config.as_deref())?;
    let config = Config::from_config(Some(config_file.as_path()))
        .with_context(|| format!("loading {}", config_file.display()))?;
    tracing::debug!("{}", config);

    let result = match cli.command {
        Command::Run(args) => commands::run(args, config, &config_file).await,
        Command::NewMember(args) => commands::upsert_node(NodeKind::Member, true, args, config).await,
        Command::EditMember(args) => commands::upsert_node(NodeKind::Member, false, args, config).await,
        Command::EditChecker(args) => commands::upsert_node(NodeKind::Checker, false, args, config).await,
        Command::RemoveMember(args) => commands::remove_node(NodeKind::Member, args, config).await,
        Command::RemoveChecker(args) => commands::remove_node(NodeKind::Checker, args, config).await,
        Command::Version => Ok(()),
    };

    if let Err(e) = &result {
        error!("exit in error: {}", e);
    }
    Ok(result?)
}
