//! Shared fixtures for the integration tests

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use uptime::ledger::MemoryLedger;
use uptime::{
    ActorId, CheckerProfile, EngineConfig, MonitorEngine, MultiAddr, NodeInfo, PeerId, Probe, ProbeSample,
};

/// Probe answering from a script instead of the network
#[derive(Debug, Default)]
pub struct ScriptedProbe {
    down: Mutex<HashSet<MultiAddr>>,
    hanging: Mutex<HashSet<MultiAddr>>,
    calls: Mutex<Vec<MultiAddr>>,
    latencies: Mutex<HashMap<MultiAddr, u64>>,
    delays: Mutex<HashMap<MultiAddr, Duration>>,
}

impl ScriptedProbe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_down(&self, address: &MultiAddr) {
        self.down.lock().unwrap().insert(address.clone());
    }

    pub fn set_up(&self, address: &MultiAddr) {
        self.down.lock().unwrap().remove(address);
    }

    /// Probes of `address` never return
    pub fn set_hanging(&self, address: &MultiAddr) {
        self.hanging.lock().unwrap().insert(address.clone());
    }

    pub fn set_latency(&self, address: &MultiAddr, latency_ms: u64) {
        self.latencies.lock().unwrap().insert(address.clone(), latency_ms);
    }

    /// Probes of `address` take `delay` before answering
    pub fn set_delay(&self, address: &MultiAddr, delay: Duration) {
        self.delays.lock().unwrap().insert(address.clone(), delay);
    }

    pub fn calls(&self) -> Vec<MultiAddr> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Probe for ScriptedProbe {
    async fn probe(&self, address: &MultiAddr, _timeout: Duration) -> ProbeSample {
        self.calls.lock().unwrap().push(address.clone());

        let hangs = self.hanging.lock().unwrap().contains(address);
        if hangs {
            std::future::pending::<()>().await;
        }
        let delay = self.delays.lock().unwrap().get(address).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.down.lock().unwrap().contains(address) {
            return ProbeSample::offline();
        }
        let latency = self.latencies.lock().unwrap().get(address).copied().unwrap_or(10);
        ProbeSample::online(Duration::from_millis(latency))
    }
}

pub fn addr(s: &str) -> MultiAddr {
    MultiAddr::from(s)
}

pub fn node(actor: u64, addresses: &[&str]) -> NodeInfo {
    NodeInfo::new(
        PeerId::new(format!("peer-{}", actor)),
        ActorId::new(actor),
        addresses.iter().map(|a| addr(a)).collect(),
    )
}

pub fn profile(actor: u64, addresses: &[&str]) -> CheckerProfile {
    let node = node(actor, addresses);
    CheckerProfile::new(node.creator, node.id, node.addresses)
}

pub fn fast_config() -> EngineConfig {
    EngineConfig::default()
        .with_poll_interval(Duration::from_millis(20))
        .with_probe_timeout(Duration::from_secs(1))
        .with_max_backoff(Duration::from_millis(100))
}

pub fn engine(ledger: &MemoryLedger, profile: CheckerProfile, probe: Arc<ScriptedProbe>) -> MonitorEngine {
    let submitter = ledger.submitter(profile.actor_id);
    MonitorEngine::new(profile, Arc::new(ledger.clone()), Arc::new(submitter), probe, fast_config())
}

/// Poll `condition` until it holds or `limit` elapses
pub async fn eventually<F, Fut>(limit: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition().await
}
