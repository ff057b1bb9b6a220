//! In-process ledger.
//!
//! Keeps the registries in memory and applies transactions with the same
//! rules as the uptime actor:
//! - nodes are keyed by the sender, only the creator may edit or remove them
//! - only registered checkers may report, at most once per voting round
//! - a round older than the voting duration restarts from the new vote
//! - a checker with more than 2/3 of the checkers voting against it is removed
//!
//! It also lets tests simulate an unavailable ledger, failing writes and
//! confirmations that lag behind submission.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::registry::{LedgerState, RawRegistry, RegistryKind};
use super::snapshot::Snapshot;
use super::transaction::Transaction;
use super::{LedgerReader, LedgerSubmitter};
use crate::error::LedgerError;
use crate::types::{ActorId, NodeInfo, NodeInfoPayload, ReportPayload, Votes};

/// Default number of epochs a voting round stays open
pub const DEFAULT_VOTING_DURATION: i64 = 200;

const THRESHOLD_NUMERATOR: usize = 2;
const THRESHOLD_DENOMINATOR: usize = 3;

/// A transaction as received by the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedTransaction {
    pub caller: ActorId,
    pub transaction: Transaction,
}

#[derive(Debug, Default)]
struct MemoryState {
    members: BTreeMap<ActorId, NodeInfo>,
    checkers: BTreeMap<ActorId, NodeInfo>,
    offline_checkers: BTreeMap<ActorId, Votes>,
    raw_entries: Vec<(RegistryKind, String, serde_json::Value)>,
    epoch: i64,
    voting_duration: i64,

    submitted: Vec<SubmittedTransaction>,
    held: Vec<SubmittedTransaction>,
    hold_confirmations: bool,
    unavailable: bool,
    failing_writes: usize,
}

impl MemoryState {
    fn export(&self) -> Result<LedgerState, LedgerError> {
        let mut state = LedgerState {
            total_checkers: self.checkers.len() as u64,
            ..Default::default()
        };

        export_into(&mut state.members, &self.members)?;
        export_into(&mut state.checkers, &self.checkers)?;
        export_into(&mut state.offline_checkers, &self.offline_checkers)?;

        for (kind, key, value) in &self.raw_entries {
            let registry = match kind {
                RegistryKind::Members => &mut state.members,
                RegistryKind::Checkers => &mut state.checkers,
                RegistryKind::OfflineCheckers => &mut state.offline_checkers,
            };
            registry.insert(key.clone(), value.clone());
        }

        Ok(state)
    }

    fn apply(&mut self, caller: ActorId, transaction: &Transaction) -> Result<(), LedgerError> {
        self.epoch += 1;

        match transaction {
            Transaction::Register(payload) | Transaction::EditChecker(payload) => {
                upsert(&mut self.checkers, caller, payload)
            }
            Transaction::NewMember(payload) | Transaction::EditMember(payload) => {
                upsert(&mut self.members, caller, payload)
            }
            Transaction::RemoveChecker => remove(&mut self.checkers, caller),
            Transaction::RemoveMember => remove(&mut self.members, caller),
            Transaction::ReportChecker(payload) => self.report(caller, *payload),
        }
    }

    fn report(&mut self, caller: ActorId, payload: ReportPayload) -> Result<(), LedgerError> {
        if !self.checkers.contains_key(&caller) {
            return Err(LedgerError::Rejected(format!("{} is not a checker", caller)));
        }

        let epoch = self.epoch;
        let voting_duration = self.voting_duration;
        let votes = self
            .offline_checkers
            .entry(payload.checker)
            .or_insert_with(|| Votes::new(epoch));

        if votes.expired(epoch, voting_duration) {
            debug!(checker = %payload.checker, "voting round expired, starting a new one");
            *votes = Votes::new(epoch);
        }

        if !votes.vote(caller, epoch) {
            return Err(LedgerError::Rejected(format!("actor {} already voted", caller)));
        }

        let total_votes = votes.total_votes();
        let threshold = self.checkers.len() * THRESHOLD_NUMERATOR / THRESHOLD_DENOMINATOR;
        if total_votes > threshold {
            info!(checker = %payload.checker, votes = total_votes, "quorum reached, removing checker");
            self.checkers.remove(&payload.checker);
        }

        Ok(())
    }
}

fn export_into<T: serde::Serialize>(
    registry: &mut RawRegistry,
    entries: &BTreeMap<ActorId, T>,
) -> Result<(), LedgerError> {
    for (id, entry) in entries {
        registry.insert(id.registry_key(), serde_json::to_value(entry)?);
    }
    Ok(())
}

fn upsert(
    registry: &mut BTreeMap<ActorId, NodeInfo>,
    caller: ActorId,
    payload: &NodeInfoPayload,
) -> Result<(), LedgerError> {
    if let Some(existing) = registry.get(&caller) {
        if existing.creator != caller {
            return Err(LedgerError::Rejected(format!("{} is not the owner", caller)));
        }
    }

    registry.insert(caller, NodeInfo::new(payload.id.clone(), caller, payload.addresses.clone()));
    Ok(())
}

fn remove(registry: &mut BTreeMap<ActorId, NodeInfo>, caller: ActorId) -> Result<(), LedgerError> {
    match registry.get(&caller) {
        None => Err(LedgerError::Rejected(format!("{} is not registered", caller))),
        Some(node) if node.creator != caller => {
            Err(LedgerError::Rejected(format!("{} is not the owner", caller)))
        }
        Some(_) => {
            registry.remove(&caller);
            Ok(())
        }
    }
}

/// Shared in-memory ledger; clones see the same state
#[derive(Debug, Clone)]
pub struct MemoryLedger {
    state: Arc<Mutex<MemoryState>>,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::with_voting_duration(DEFAULT_VOTING_DURATION)
    }

    pub fn with_voting_duration(voting_duration: i64) -> Self {
        let state = MemoryState { voting_duration, ..Default::default() };
        Self { state: Arc::new(Mutex::new(state)) }
    }

    /// Handle that submits transactions on behalf of `caller`
    pub fn submitter(&self, caller: ActorId) -> MemorySubmitter {
        MemorySubmitter { ledger: self.clone(), caller }
    }

    /// Put a checker straight into the registry, keyed by its creator
    pub async fn insert_checker(&self, node: NodeInfo) {
        self.state.lock().await.checkers.insert(node.creator, node);
    }

    /// Put a member straight into the registry, keyed by its creator
    pub async fn insert_member(&self, node: NodeInfo) {
        self.state.lock().await.members.insert(node.creator, node);
    }

    /// Put an arbitrary, possibly malformed, entry into a registry
    pub async fn insert_raw(
        &self,
        registry: RegistryKind,
        key: impl Into<String>,
        value: serde_json::Value,
    ) {
        self.state.lock().await.raw_entries.push((registry, key.into(), value));
    }

    /// Every transaction received so far, including failed ones
    pub async fn submitted(&self) -> Vec<SubmittedTransaction> {
        self.state.lock().await.submitted.clone()
    }

    /// Make `load()` fail as if the ledger could not be reached
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().await.unavailable = unavailable;
    }

    /// Make the next `count` submissions fail
    pub async fn fail_next_writes(&self, count: usize) {
        self.state.lock().await.failing_writes = count;
    }

    /// Accept submissions without applying them until `confirm_held()`
    pub async fn hold_confirmations(&self, hold: bool) {
        self.state.lock().await.hold_confirmations = hold;
    }

    /// Apply every held transaction, returning how many were applied
    pub async fn confirm_held(&self) -> usize {
        let mut state = self.state.lock().await;
        let held = std::mem::take(&mut state.held);
        let mut applied = 0;
        for tx in &held {
            match state.apply(tx.caller, &tx.transaction) {
                Ok(()) => applied += 1,
                Err(e) => debug!(caller = %tx.caller, "held transaction failed: {}", e),
            }
        }
        applied
    }

    pub async fn epoch(&self) -> i64 {
        self.state.lock().await.epoch
    }

    pub async fn advance_epoch(&self, epochs: i64) {
        self.state.lock().await.epoch += epochs;
    }

    async fn submit_as(&self, caller: ActorId, transaction: Transaction) -> Result<(), LedgerError> {
        let mut state = self.state.lock().await;
        state.submitted.push(SubmittedTransaction { caller, transaction: transaction.clone() });

        if state.failing_writes > 0 {
            state.failing_writes -= 1;
            return Err(LedgerError::Transient("simulated write failure".to_string()));
        }

        if state.hold_confirmations {
            state.held.push(SubmittedTransaction { caller, transaction });
            return Ok(());
        }

        state.apply(caller, &transaction)
    }
}

#[async_trait]
impl LedgerReader for MemoryLedger {
    async fn load(&self) -> Result<Snapshot, LedgerError> {
        let state = self.state.lock().await;
        if state.unavailable {
            return Err(LedgerError::Transient("simulated outage".to_string()));
        }
        Ok(Snapshot::from_state(&state.export()?))
    }
}

/// Submits to a [`MemoryLedger`] as a fixed caller
#[derive(Debug, Clone)]
pub struct MemorySubmitter {
    ledger: MemoryLedger,
    caller: ActorId,
}

impl MemorySubmitter {
    pub fn caller(&self) -> ActorId {
        self.caller
    }
}

#[async_trait]
impl LedgerSubmitter for MemorySubmitter {
    async fn submit(&self, transaction: Transaction) -> Result<(), LedgerError> {
        self.ledger.submit_as(self.caller, transaction).await
    }
}
