//! Vote deduplication on top of the ledger view.
//!
//! The ledger only shows a vote once its message has been executed. Until
//! then every polling tick would see the same unreachable checker and vote
//! again, so targets are also remembered locally as soon as a submission is
//! accepted.

use std::collections::{BTreeMap, HashSet, VecDeque};

use tokio::sync::RwLock;
use tracing::debug;

use crate::error::LedgerError;
use crate::ledger::{LedgerReader, RegistryKind, Snapshot};
use crate::types::{ActorId, MultiAddr};

#[derive(Debug, Default)]
struct VotedSet {
    members: HashSet<ActorId>,
    /// Insertion order, oldest first
    order: VecDeque<ActorId>,
    capacity: Option<usize>,
}

impl VotedSet {
    fn insert(&mut self, target: ActorId) {
        if !self.members.insert(target) {
            return;
        }
        self.order.push_back(target);

        if let Some(capacity) = self.capacity {
            while self.order.len() > capacity {
                if let Some(evicted) = self.order.pop_front() {
                    self.members.remove(&evicted);
                    debug!(checker = %evicted, "evicted local vote record");
                }
            }
        }
    }
}

/// Per-process record of the checkers this instance has voted against
#[derive(Debug)]
pub struct VoteCache {
    self_id: ActorId,
    voted: RwLock<VotedSet>,
}

impl VoteCache {
    /// Unbounded cache for the checker `self_id`
    pub fn new(self_id: ActorId) -> Self {
        Self { self_id, voted: RwLock::new(VotedSet::default()) }
    }

    /// Cache keeping at most `capacity` local records, evicting the oldest
    pub fn with_capacity(self_id: ActorId, capacity: usize) -> Self {
        let voted = VotedSet { capacity: Some(capacity), ..Default::default() };
        Self { self_id, voted: RwLock::new(voted) }
    }

    pub fn self_id(&self) -> ActorId {
        self.self_id
    }

    /// Load a fresh snapshot bound to this cache
    pub async fn load(&self, reader: &dyn LedgerReader) -> Result<CachedState<'_>, LedgerError> {
        let snapshot = reader.load().await?;
        Ok(CachedState { cache: self, snapshot })
    }

    pub async fn has_voted_locally(&self, target: ActorId) -> bool {
        self.voted.read().await.members.contains(&target)
    }

    /// Remember that a vote against `target` has been accepted
    pub async fn record_local_vote(&self, target: ActorId) {
        self.voted.write().await.insert(target);
    }

    pub async fn len(&self) -> usize {
        self.voted.read().await.members.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// A ledger snapshot seen through a [`VoteCache`]
#[derive(Debug)]
pub struct CachedState<'a> {
    cache: &'a VoteCache,
    snapshot: Snapshot,
}

impl<'a> CachedState<'a> {
    pub fn new(cache: &'a VoteCache, snapshot: Snapshot) -> Self {
        Self { cache, snapshot }
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn has_registered(&self, id: ActorId) -> bool {
        self.snapshot.has_registered(id)
    }

    /// Whether this checker already voted against `target`, either locally
    /// or as recorded by the ledger
    pub async fn has_voted_reported_peer(&self, target: ActorId) -> bool {
        if self.cache.has_voted_locally(target).await {
            return true;
        }
        self.snapshot.has_voted(target, self.cache.self_id)
    }

    /// Reported checkers this instance has not voted against yet, with the
    /// addresses they are registered with
    pub async fn list_reported_not_voted(&self) -> BTreeMap<ActorId, Vec<MultiAddr>> {
        let mut targets = BTreeMap::new();

        for id in self.snapshot.list_offline_checkers() {
            if self.has_voted_reported_peer(id).await {
                continue;
            }
            // Reported checkers that are no longer registered cannot be probed
            if let Some(addresses) = self.snapshot.addresses_of(RegistryKind::Checkers, id) {
                targets.insert(id, addresses);
            }
        }

        debug!(targets = ?targets.keys().collect::<Vec<_>>(), "reported checkers not voted");
        targets
    }
}
