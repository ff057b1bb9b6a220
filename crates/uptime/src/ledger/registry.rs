//! Raw registry contents as handed out by the ledger, and their decoding.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::LedgerError;
use crate::types::ActorId;

/// The three registries held by the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryKind {
    Members,
    Checkers,
    OfflineCheckers,
}

impl fmt::Display for RegistryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryKind::Members => write!(f, "members"),
            RegistryKind::Checkers => write!(f, "checkers"),
            RegistryKind::OfflineCheckers => write!(f, "offline_checkers"),
        }
    }
}

/// Undecoded registry: decimal actor id key to JSON entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRegistry(BTreeMap<String, serde_json::Value>);

impl RawRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.0.insert(key.into(), value);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Decode every entry, skipping the ones that fail.
    ///
    /// Skipped entries are logged and added to `failures`, so one bad entry
    /// never hides the rest of the registry.
    pub(crate) fn decode<T: DeserializeOwned>(
        &self,
        kind: RegistryKind,
        failures: &mut usize,
    ) -> BTreeMap<ActorId, T> {
        let mut entries = BTreeMap::new();

        for (key, value) in &self.0 {
            match decode_entry(kind, key, value) {
                Ok((id, entry)) => {
                    entries.insert(id, entry);
                }
                Err(e) => {
                    warn!(registry = %kind, key = %key, "skipping registry entry: {}", e);
                    *failures += 1;
                }
            }
        }

        entries
    }
}

fn decode_entry<T: DeserializeOwned>(
    kind: RegistryKind,
    key: &str,
    value: &serde_json::Value,
) -> Result<(ActorId, T), LedgerError> {
    let decode_error = |reason: String| LedgerError::Decode {
        registry: kind,
        key: key.to_string(),
        reason,
    };

    let id = key.parse::<ActorId>().map_err(|e| decode_error(format!("bad key: {}", e)))?;
    let entry = T::deserialize(value).map_err(|e| decode_error(e.to_string()))?;

    Ok((id, entry))
}

/// Root state of the uptime actor as served by the ledger
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerState {
    #[serde(default)]
    pub members: RawRegistry,

    #[serde(default)]
    pub checkers: RawRegistry,

    #[serde(default)]
    pub offline_checkers: RawRegistry,

    #[serde(default)]
    pub total_checkers: u64,
}
