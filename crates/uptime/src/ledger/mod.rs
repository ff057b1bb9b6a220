//! Ledger access.
//!
//! The ledger holds three registries keyed by the decimal form of an actor
//! id: members and checkers (both `NodeInfo`) and offline checkers (`Votes`).
//! Reading produces an immutable [`Snapshot`]; writing commits one
//! [`Transaction`] and waits for its receipt.

pub mod gateway;
pub mod memory;
mod registry;
mod snapshot;
mod transaction;
mod wallet;

use async_trait::async_trait;

pub use gateway::GatewayLedger;
pub use memory::{MemoryLedger, MemorySubmitter, SubmittedTransaction};
pub use registry::{LedgerState, RawRegistry, RegistryKind};
pub use snapshot::Snapshot;
pub use transaction::{Method, Transaction};
pub use wallet::WalletSelector;

use crate::error::LedgerError;

/// Read side of the ledger
#[async_trait]
pub trait LedgerReader: Send + Sync {
    /// Load the registries as of now
    async fn load(&self) -> Result<Snapshot, LedgerError>;
}

/// Write side of the ledger
#[async_trait]
pub trait LedgerSubmitter: Send + Sync {
    /// Commit a transaction and wait until its execution succeeded
    async fn submit(&self, transaction: Transaction) -> Result<(), LedgerError>;
}
