use std::io::Error as IoError;

use actix_web::ResponseError;
use thiserror::Error;
use uptime::{AddressError, EngineError, IdentityError, LedgerError, ProbeError};

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0:#}")]
    Io(#[from] IoError),
    #[error("Address parsing error: {0}")]
    AddrParse(#[from] std::net::AddrParseError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    MultiAddr(#[from] AddressError),
    #[error("Ping responder error: {0}")]
    Probe(#[from] ProbeError),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Missing setting {0}")]
    MissingSetting(&'static str),
    #[error("Multi-address {0} must start with '/'")]
    InvalidMultiAddr(String),
    #[error("No multi-addresses given")]
    NoMultiAddrs,
}

/// Status handlers answer 500 with the error text
impl ResponseError for AppError {}
