//! Identity and registry value types.
//!
//! Actor ids, peer ids and multiaddresses are all plain numbers or strings on
//! the wire. They get distinct wrapper types here so one cannot be passed
//! where another is expected.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Numeric identity of a registered member or checker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(u64);

impl ActorId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// Key of this actor inside a ledger registry (its decimal form)
    pub fn registry_key(&self) -> String {
        self.0.to_string()
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ActorId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(Self)
    }
}

impl From<u64> for ActorId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Text form of a libp2p peer id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<libp2p::PeerId> for PeerId {
    fn from(id: libp2p::PeerId) -> Self {
        Self(id.to_string())
    }
}

/// Address of a participant together with the protocol used to reach it.
///
/// e.g. `/ip4/10.1.1.1/tcp/8080/p2p/<peer_id>` for a libp2p ping, or
/// `/ip4/10.1.1.1/tcp/8081/http/get/healthcheck` for an HTTP health endpoint.
/// Two addresses are the same only if their strings are identical.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MultiAddr(String);

impl MultiAddr {
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MultiAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MultiAddr {
    fn from(addr: &str) -> Self {
        Self(addr.to_string())
    }
}

impl From<libp2p::Multiaddr> for MultiAddr {
    fn from(addr: libp2p::Multiaddr) -> Self {
        Self(addr.to_string())
    }
}

/// A registered member or checker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    /// Peer id of the node
    pub id: PeerId,

    /// Actor that created the entry; only it may edit or remove it
    pub creator: ActorId,

    /// Addresses exposed by the node along with the supported health checks
    pub addresses: Vec<MultiAddr>,
}

impl NodeInfo {
    pub fn new(id: PeerId, creator: ActorId, addresses: Vec<MultiAddr>) -> Self {
        Self { id, creator, addresses }
    }
}

/// Params of the register, new and edit methods. The creator is whoever
/// sends the message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfoPayload {
    pub id: PeerId,
    pub addresses: Vec<MultiAddr>,
}

/// Params of the report method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPayload {
    pub checker: ActorId,
}

/// Offline votes collected against one checker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Votes {
    /// Epoch of the last offline vote
    pub last_vote: i64,

    /// Checkers that have voted, each at most once
    pub votes: Vec<ActorId>,
}

impl Votes {
    pub fn new(epoch: i64) -> Self {
        Self { last_vote: epoch, votes: Vec::new() }
    }

    pub fn has_voted(&self, voter: ActorId) -> bool {
        self.votes.contains(&voter)
    }

    /// Add a voter. Returns false if it had already voted.
    pub fn vote(&mut self, voter: ActorId, epoch: i64) -> bool {
        if self.has_voted(voter) {
            return false;
        }
        self.votes.push(voter);
        self.last_vote = epoch;
        true
    }

    pub fn total_votes(&self) -> usize {
        self.votes.len()
    }

    /// Whether the voting round has gone stale at `epoch`
    pub fn expired(&self, epoch: i64, voting_duration: i64) -> bool {
        self.last_vote + voting_duration < epoch
    }
}

/// Rolling health record for one address of one participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthcheckInfo {
    /// Address the samples were taken against
    pub address: MultiAddr,

    /// Average latency in milliseconds across every sample
    pub avg_latency: u64,

    /// Number of samples folded into the average
    pub latency_counts: u64,

    /// Latest observed state
    pub is_online: bool,

    /// Latest latency in milliseconds
    pub latency: u64,

    /// Unix seconds of the latest sample
    pub last_checked: i64,
}
