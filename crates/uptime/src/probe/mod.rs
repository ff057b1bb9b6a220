//! Liveness probes.
//!
//! A probe tests one address and always answers with a sample: failures are
//! reported as offline samples with a latency of 0, never as errors.

pub mod address;
mod http;
mod ping;
mod responder;
mod swarm;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use libp2p::identity::Keypair;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::debug;

pub use address::{classify, ProbeTarget};
pub use http::HttpProbe;
pub use ping::PingProbe;
pub use responder::PingResponder;

use crate::types::MultiAddr;

/// Outcome of a single probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeSample {
    pub online: bool,

    /// Round trip time in milliseconds, 0 when offline
    pub latency_ms: u64,

    /// Unix seconds when the sample was taken
    pub observed_at: i64,
}

impl ProbeSample {
    pub fn online(latency: Duration) -> Self {
        Self { online: true, latency_ms: latency.as_millis() as u64, observed_at: now() }
    }

    pub fn offline() -> Self {
        Self { online: false, latency_ms: 0, observed_at: now() }
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Reachability test against a single address
#[async_trait]
pub trait Probe: Send + Sync {
    /// Probe `address`, giving up after `timeout`
    async fn probe(&self, address: &MultiAddr, timeout: Duration) -> ProbeSample;
}

/// Probe picking the ping or HTTP check from the shape of the address
#[derive(Debug, Clone)]
pub struct AddressProbe {
    ping: PingProbe,
    http: HttpProbe,
}

impl AddressProbe {
    /// Probe dialing other peers as `keypair`
    pub fn new(keypair: Keypair) -> Self {
        Self { ping: PingProbe::new(keypair), http: HttpProbe::default() }
    }
}

impl Default for AddressProbe {
    fn default() -> Self {
        Self::new(Keypair::generate_ed25519())
    }
}

#[async_trait]
impl Probe for AddressProbe {
    async fn probe(&self, address: &MultiAddr, limit: Duration) -> ProbeSample {
        let target = match classify(address) {
            Ok(target) => target,
            Err(e) => {
                debug!(address = %address, "cannot probe address: {}", e);
                return ProbeSample::offline();
            }
        };

        let result = match &target {
            ProbeTarget::Peer { address, peer_id } => timeout(limit, self.ping.ping(address, *peer_id))
                .await
                .map(|r| r.map_err(|e| e.to_string())),
            ProbeTarget::Http { url, method } => {
                let start = Instant::now();
                timeout(limit, self.http.request(method.clone(), url.clone(), limit))
                    .await
                    .map(|r| r.map(|()| start.elapsed()).map_err(|e| e.to_string()))
            }
        };

        match result {
            Ok(Ok(latency)) => ProbeSample::online(latency),
            Ok(Err(e)) => {
                debug!(address = %address, "probe failed: {}", e);
                ProbeSample::offline()
            }
            Err(_) => {
                debug!(address = %address, timeout = ?limit, "probe timed out");
                ProbeSample::offline()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::CheckerIdentity;

    fn local_address(port: u16) -> MultiAddr {
        CheckerIdentity::generate().advertised_address("127.0.0.1".parse().unwrap(), port)
    }

    #[tokio::test]
    async fn test_unparseable_address_is_offline() {
        let probe = AddressProbe::default();
        let sample = probe.probe(&MultiAddr::from("not-a-multiaddr"), Duration::from_secs(1)).await;

        assert!(!sample.online);
        assert_eq!(sample.latency_ms, 0);
    }

    #[tokio::test]
    async fn test_address_without_peer_id_is_offline() {
        let probe = AddressProbe::default();
        let sample = probe.probe(&MultiAddr::from("/ip4/127.0.0.1/tcp/4001"), Duration::from_secs(1)).await;

        assert!(!sample.online);
    }

    #[tokio::test]
    async fn test_closed_port_is_offline() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let sample = AddressProbe::default().probe(&local_address(port), Duration::from_secs(5)).await;

        assert!(!sample.online);
    }

    #[tokio::test]
    async fn test_silent_peer_times_out() {
        // Accepts connections but never answers the handshake
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let start = Instant::now();
        let sample = AddressProbe::default().probe(&local_address(port), Duration::from_millis(200)).await;

        assert!(!sample.online);
        assert!(start.elapsed() < Duration::from_secs(2));
    }
}
