//! Monitor engine.
//!
//! Registers the local checker on the ledger, then runs three polling loops
//! until stopped:
//! - reported checkers not yet voted against are re-probed
//! - every member is probed and its health recorded
//! - every checker is probed and reported if any address is down

mod backoff;
mod config;
mod tasks;

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info};

pub use backoff::{backoff_delay, Backoff};
pub use config::EngineConfig;
pub use tasks::PollTask;

use crate::cache::VoteCache;
use crate::error::{EngineError, LedgerError};
use crate::health::HealthTable;
use crate::ledger::{LedgerReader, LedgerSubmitter, Transaction};
use crate::probe::Probe;
use crate::types::{ActorId, MultiAddr, NodeInfoPayload, PeerId};

/// The local checker as it registers itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckerProfile {
    pub actor_id: ActorId,
    pub peer_id: PeerId,
    /// Addresses advertised to other checkers; never probed locally
    pub addresses: Vec<MultiAddr>,
}

impl CheckerProfile {
    pub fn new(actor_id: ActorId, peer_id: PeerId, addresses: Vec<MultiAddr>) -> Self {
        Self { actor_id, peer_id, addresses }
    }

    pub fn is_own_address(&self, address: &MultiAddr) -> bool {
        self.addresses.contains(address)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    NotStarted,
    Registering,
    Running,
    Stopped,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineState::NotStarted => "not started",
            EngineState::Registering => "registering",
            EngineState::Running => "running",
            EngineState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

struct Shared {
    profile: CheckerProfile,
    reader: Arc<dyn LedgerReader>,
    submitter: Arc<dyn LedgerSubmitter>,
    probe: Arc<dyn Probe>,
    config: EngineConfig,
    cache: VoteCache,
    health: HealthTable,
    /// Serializes the check-then-submit of offline votes across loops
    report_lock: Mutex<()>,
    state: watch::Sender<EngineState>,
    stop: watch::Sender<bool>,
    running: AtomicUsize,
}

/// Handle to the engine; clones drive the same instance
#[derive(Clone)]
pub struct MonitorEngine {
    shared: Arc<Shared>,
}

impl fmt::Debug for MonitorEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorEngine")
            .field("profile", &self.shared.profile)
            .field("state", &self.state())
            .finish()
    }
}

impl MonitorEngine {
    pub fn new(
        profile: CheckerProfile,
        reader: Arc<dyn LedgerReader>,
        submitter: Arc<dyn LedgerSubmitter>,
        probe: Arc<dyn Probe>,
        config: EngineConfig,
    ) -> Self {
        let cache = match config.vote_cache_capacity {
            Some(capacity) => VoteCache::with_capacity(profile.actor_id, capacity),
            None => VoteCache::new(profile.actor_id),
        };
        let (state, _) = watch::channel(EngineState::NotStarted);
        let (stop, _) = watch::channel(false);

        let shared = Shared {
            profile,
            reader,
            submitter,
            probe,
            config,
            cache,
            health: HealthTable::new(),
            report_lock: Mutex::new(()),
            state,
            stop,
            running: AtomicUsize::new(0),
        };
        Self { shared: Arc::new(shared) }
    }

    pub fn profile(&self) -> &CheckerProfile {
        &self.shared.profile
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    pub fn state(&self) -> EngineState {
        *self.shared.state.borrow()
    }

    /// Watch state transitions
    pub fn subscribe_state(&self) -> watch::Receiver<EngineState> {
        self.shared.state.subscribe()
    }

    /// Shared health table, filled by the member and checker loops
    pub fn health(&self) -> HealthTable {
        self.shared.health.clone()
    }

    pub fn vote_cache(&self) -> &VoteCache {
        &self.shared.cache
    }

    /// Register if needed and spawn the polling loops.
    ///
    /// Fails if the engine was started before or if registration fails, in
    /// which case the engine ends up stopped.
    pub async fn start(&self) -> Result<EngineHandle, EngineError> {
        let claimed = self.shared.state.send_if_modified(|state| {
            if *state == EngineState::NotStarted {
                *state = EngineState::Registering;
                true
            } else {
                false
            }
        });
        if !claimed {
            return Err(EngineError::AlreadyStarted);
        }

        if let Err(e) = self.shared.register().await {
            error!(actor = %self.shared.profile.actor_id, "Checker registration failed: {}", e);
            self.shared.state.send_replace(EngineState::Stopped);
            return Err(EngineError::Registration(e));
        }

        self.shared.running.store(PollTask::ALL.len(), Ordering::SeqCst);
        self.shared.state.send_replace(EngineState::Running);
        info!(actor = %self.shared.profile.actor_id, "Monitor engine running");

        let tasks = PollTask::ALL
            .into_iter()
            .map(|task| tokio::spawn(tasks::run_loop(self.shared.clone(), task)))
            .collect();

        Ok(EngineHandle { engine: self.clone(), tasks })
    }

    /// Ask every loop to exit at its next stop point
    pub fn stop(&self) {
        if !self.shared.stop.send_replace(true) {
            info!("Stopping monitor engine");
        }
    }

    pub fn is_stopping(&self) -> bool {
        *self.shared.stop.borrow()
    }

    /// Receiver that turns true once a stop was requested
    pub fn subscribe_stop(&self) -> watch::Receiver<bool> {
        self.shared.stop.subscribe()
    }

    /// Run a single iteration of one loop, without sleeping
    pub async fn poll_once(&self, task: PollTask) -> Result<(), LedgerError> {
        self.shared.poll_once(task).await
    }
}

impl Shared {
    async fn register(&self) -> Result<(), LedgerError> {
        let snapshot = self.reader.load().await?;
        if snapshot.has_registered(self.profile.actor_id) {
            info!(actor = %self.profile.actor_id, "Checker already registered");
            return Ok(());
        }

        info!(
            actor = %self.profile.actor_id,
            peer = %self.profile.peer_id,
            addresses = ?self.profile.addresses,
            "Registering checker"
        );
        let payload = NodeInfoPayload {
            id: self.profile.peer_id.clone(),
            addresses: self.profile.addresses.clone(),
        };
        self.submitter.submit(Transaction::Register(payload)).await
    }

    fn stop_requested(&self) -> bool {
        *self.stop.borrow()
    }

    /// Called by each loop on exit; the last one marks the engine stopped
    fn loop_exited(&self) {
        if self.running.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.state.send_replace(EngineState::Stopped);
            info!("Monitor engine stopped");
        }
    }
}

/// Running engine, returned by [`MonitorEngine::start`]
#[derive(Debug)]
pub struct EngineHandle {
    engine: MonitorEngine,
    tasks: Vec<JoinHandle<()>>,
}

impl EngineHandle {
    pub fn engine(&self) -> &MonitorEngine {
        &self.engine
    }

    pub fn stop(&self) {
        self.engine.stop();
    }

    /// Wait for every loop to exit
    pub async fn join(self) {
        for result in join_all(self.tasks).await {
            if let Err(e) = result {
                error!("Polling task failed: {}", e);
            }
        }
    }

    /// Stop then wait for every loop to exit
    pub async fn shutdown(self) {
        self.stop();
        self.join().await;
    }
}
