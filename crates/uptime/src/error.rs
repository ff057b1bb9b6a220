//! Error types for the uptime library.

use thiserror::Error;

use crate::ledger::RegistryKind;

/// Errors raised while reading from or writing to the ledger
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The ledger could not be reached; callers retry on their own schedule
    #[error("ledger unavailable: {0}")]
    Transient(String),

    /// A single registry entry could not be decoded
    #[error("cannot decode {registry} entry {key}: {reason}")]
    Decode { registry: RegistryKind, key: String, reason: String },

    #[error("wallet index {index} out of range ({available} wallets available)")]
    Wallet { index: usize, available: usize },

    #[error("cannot encode transaction params: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("invalid ledger endpoint: {0}")]
    Endpoint(#[from] url::ParseError),

    /// The message was included but the actor did not run it successfully
    #[error("actor execution failed with exit code {0}")]
    ExecutionFailed(i64),

    /// The ledger refused the message outright
    #[error("transaction rejected: {0}")]
    Rejected(String),
}

impl From<reqwest::Error> for LedgerError {
    fn from(e: reqwest::Error) -> Self {
        LedgerError::Transient(e.to_string())
    }
}

/// Errors raised by the monitor engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine has already been started")]
    AlreadyStarted,

    #[error("cannot register checker: {0}")]
    Registration(#[source] LedgerError),
}

/// Errors raised while loading or storing the checker identity
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("{0:#}")]
    Io(#[from] std::io::Error),

    #[error("invalid keypair: {0}")]
    Decoding(#[from] libp2p::identity::DecodingError),
}

/// Errors raised while interpreting a multiaddress for probing
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid multiaddr {0}: {1}")]
    Invalid(String, String),

    #[error("multiaddr {0} has no host component")]
    MissingHost(String),

    #[error("multiaddr {0} has no tcp port")]
    MissingPort(String),

    #[error("multiaddr {0} does not end with a /p2p peer id")]
    MissingPeerId(String),

    #[error("unsupported http method {1} in {0}")]
    UnsupportedMethod(String, String),
}

/// Errors raised by the ping swarm on either side of a check
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("cannot build swarm: {0}")]
    Swarm(String),

    #[error("cannot listen: {0}")]
    Listen(#[from] libp2p::TransportError<std::io::Error>),

    #[error("listener closed before reporting an address")]
    ListenerClosed,

    #[error("dial failed: {0}")]
    Dial(#[from] libp2p::swarm::DialError),

    #[error("ping failed: {0}")]
    Ping(#[from] libp2p::ping::Failure),

    #[error("connection to {0} closed before a ping completed")]
    ConnectionClosed(libp2p::PeerId),
}
