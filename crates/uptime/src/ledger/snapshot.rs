//! Point-in-time view over the ledger registries.

use std::collections::{BTreeMap, BTreeSet};

use super::registry::{LedgerState, RegistryKind};
use crate::types::{ActorId, MultiAddr, NodeInfo, Votes};

/// Immutable, decoded copy of the registries as of one `load()`
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    members: BTreeMap<ActorId, NodeInfo>,
    checkers: BTreeMap<ActorId, NodeInfo>,
    offline_checkers: BTreeMap<ActorId, Votes>,
    total_checkers: u64,
    decode_failures: usize,
}

impl Snapshot {
    /// Decode a raw ledger state. Entries that fail to decode are skipped
    /// and counted in [`Snapshot::decode_failures`].
    pub fn from_state(state: &LedgerState) -> Self {
        let mut decode_failures = 0;

        let members = state.members.decode(RegistryKind::Members, &mut decode_failures);
        let checkers = state.checkers.decode(RegistryKind::Checkers, &mut decode_failures);
        let offline_checkers =
            state.offline_checkers.decode(RegistryKind::OfflineCheckers, &mut decode_failures);

        Self {
            members,
            checkers,
            offline_checkers,
            total_checkers: state.total_checkers,
            decode_failures,
        }
    }

    /// Whether `id` is a registered checker
    pub fn has_registered(&self, id: ActorId) -> bool {
        self.checkers.contains_key(&id)
    }

    pub fn list_members(&self) -> BTreeSet<ActorId> {
        self.members.keys().copied().collect()
    }

    pub fn list_checkers(&self) -> BTreeSet<ActorId> {
        self.checkers.keys().copied().collect()
    }

    /// Checkers with at least one offline vote
    pub fn list_offline_checkers(&self) -> BTreeSet<ActorId> {
        self.offline_checkers.keys().copied().collect()
    }

    /// Addresses registered for `id`. `None` if `id` is not in the registry,
    /// `Some(empty)` if it is registered without any address.
    pub fn addresses_of(&self, registry: RegistryKind, id: ActorId) -> Option<Vec<MultiAddr>> {
        self.node(registry, id).map(|node| node.addresses.clone())
    }

    pub fn node(&self, registry: RegistryKind, id: ActorId) -> Option<&NodeInfo> {
        match registry {
            RegistryKind::Members => self.members.get(&id),
            RegistryKind::Checkers => self.checkers.get(&id),
            RegistryKind::OfflineCheckers => None,
        }
    }

    pub fn votes_against(&self, reported: ActorId) -> Option<&Votes> {
        self.offline_checkers.get(&reported)
    }

    /// Whether `voter` has a recorded offline vote against `reported`
    pub fn has_voted(&self, reported: ActorId, voter: ActorId) -> bool {
        self.votes_against(reported).is_some_and(|votes| votes.has_voted(voter))
    }

    pub fn total_checkers(&self) -> u64 {
        self.total_checkers
    }

    /// Number of registry entries skipped because they could not be decoded
    pub fn decode_failures(&self) -> usize {
        self.decode_failures
    }
}
