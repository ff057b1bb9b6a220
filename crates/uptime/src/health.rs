//! Rolling health records per participant address.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::probe::ProbeSample;
use crate::types::{ActorId, HealthcheckInfo, MultiAddr};

/// Health records grouped by participant then by address
pub type HealthSnapshot = BTreeMap<ActorId, BTreeMap<MultiAddr, HealthcheckInfo>>;

impl HealthcheckInfo {
    /// Record built from the first sample seen for an address
    pub fn first(address: MultiAddr, sample: &ProbeSample) -> Self {
        Self {
            address,
            avg_latency: sample.latency_ms,
            latency_counts: 1,
            is_online: sample.online,
            latency: sample.latency_ms,
            last_checked: sample.observed_at,
        }
    }

    /// Fold a new sample into the record.
    ///
    /// The average covers every sample, offline ones included (they report a
    /// latency of 0). The latest fields always reflect the new sample.
    pub fn update(&mut self, sample: &ProbeSample) {
        self.latency_counts += 1;

        let avg = i128::from(self.avg_latency);
        let delta = i128::from(sample.latency_ms) - avg;
        self.avg_latency = (avg + delta / i128::from(self.latency_counts)) as u64;

        self.is_online = sample.online;
        self.latency = sample.latency_ms;
        self.last_checked = sample.observed_at;
    }
}

/// True if every sample is online. An empty set is vacuously up.
pub fn all_up(samples: &[ProbeSample]) -> bool {
    samples.iter().all(|sample| sample.online)
}

/// Shared health table, cheap to clone
#[derive(Debug, Clone, Default)]
pub struct HealthTable {
    records: Arc<RwLock<HashMap<ActorId, HashMap<MultiAddr, HealthcheckInfo>>>>,
}

impl HealthTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold `sample` into the record of (`actor`, `address`), creating it on
    /// first sight
    pub async fn record(&self, actor: ActorId, address: &MultiAddr, sample: &ProbeSample) {
        let mut records = self.records.write().await;
        let addresses = records.entry(actor).or_default();

        match addresses.get_mut(address) {
            Some(info) => info.update(sample),
            None => {
                addresses.insert(address.clone(), HealthcheckInfo::first(address.clone(), sample));
            }
        }
    }

    pub async fn get(&self, actor: ActorId, address: &MultiAddr) -> Option<HealthcheckInfo> {
        self.records.read().await.get(&actor).and_then(|addresses| addresses.get(address)).cloned()
    }

    /// Copy of the whole table in a stable order
    pub async fn snapshot(&self) -> HealthSnapshot {
        self.records
            .read()
            .await
            .iter()
            .map(|(actor, addresses)| {
                let addresses = addresses.iter().map(|(a, info)| (a.clone(), info.clone())).collect();
                (*actor, addresses)
            })
            .collect()
    }

    /// The table as served by the status endpoint
    pub async fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.snapshot().await)
    }

    /// Number of participants with at least one record
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
