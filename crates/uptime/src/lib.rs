//! Uptime - ledger-backed liveness checking for members and checkers
//!
//! This library keeps a cached view over the member, checker and
//! offline-checker registries held by an external ledger, probes every
//! registered participant and reports unreachable checkers back to the
//! ledger as offline votes.

pub mod cache;
pub mod engine;
pub mod error;
pub mod health;
pub mod identity;
pub mod ledger;
pub mod probe;
pub mod types;

// Re-export main types
pub use cache::{CachedState, VoteCache};
pub use engine::{CheckerProfile, EngineConfig, EngineHandle, EngineState, MonitorEngine, PollTask};
pub use error::{AddressError, EngineError, IdentityError, LedgerError, ProbeError};
pub use health::{all_up, HealthSnapshot, HealthTable};
pub use identity::CheckerIdentity;
pub use ledger::{LedgerReader, LedgerSubmitter, RegistryKind, Snapshot, Transaction};
pub use probe::{AddressProbe, Probe, ProbeSample};
pub use types::{ActorId, HealthcheckInfo, MultiAddr, NodeInfo, NodeInfoPayload, PeerId, ReportPayload, Votes};

use std::time::Duration;

/// Version of this library, reported by the `version` command
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Delay between two iterations of a polling loop
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Upper bound for a single probe
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(120);

/// Upper bound for the delay between retries against an unavailable ledger
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(60);
