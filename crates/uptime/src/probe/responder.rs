//! Listening side of the ping check, so other checkers can probe this one.

use std::net::IpAddr;
use std::time::Duration;

use futures::StreamExt;
use libp2p::identity::Keypair;
use libp2p::multiaddr::Protocol;
use libp2p::swarm::SwarmEvent;
use libp2p::{ping, Multiaddr, Swarm};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::swarm::build_swarm;
use crate::error::ProbeError;

const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

pub struct PingResponder {
    swarm: Swarm<ping::Behaviour>,
    port: u16,
}

impl PingResponder {
    /// Listen on `ip:port` under the identity of `keypair`, port 0 picks a free one
    pub async fn bind(keypair: Keypair, ip: IpAddr, port: u16) -> Result<Self, ProbeError> {
        let mut swarm = build_swarm(keypair, IDLE_TIMEOUT)?;
        swarm.listen_on(Multiaddr::empty().with(Protocol::from(ip)).with(Protocol::Tcp(port)))?;

        loop {
            match swarm.select_next_some().await {
                SwarmEvent::NewListenAddr { address, .. } => {
                    let bound = address.iter().find_map(|protocol| match protocol {
                        Protocol::Tcp(bound) => Some(bound),
                        _ => None,
                    });
                    if let Some(port) = bound {
                        info!("Ping responder listening on {}", address);
                        return Ok(Self { swarm, port });
                    }
                }
                SwarmEvent::ListenerClosed { .. } | SwarmEvent::ListenerError { .. } => {
                    return Err(ProbeError::ListenerClosed);
                }
                _ => {}
            }
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn peer_id(&self) -> libp2p::PeerId {
        *self.swarm.local_peer_id()
    }

    /// Answer pings until `stop` turns true
    pub async fn run(mut self, mut stop: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                event = self.swarm.select_next_some() => match event {
                    SwarmEvent::Behaviour(ping::Event { peer, result: Err(e), .. }) => {
                        debug!(%peer, "ping from checker failed: {}", e);
                    }
                    SwarmEvent::IncomingConnectionError { send_back_addr, error, .. } => {
                        debug!(%send_back_addr, "incoming connection failed: {}", error);
                    }
                    SwarmEvent::ListenerClosed { reason, .. } => {
                        warn!("Ping listener closed: {:?}", reason);
                        break;
                    }
                    _ => {}
                },
                _ = stop.wait_for(|stopped| *stopped) => break,
            }
        }

        info!("Ping responder stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::CheckerIdentity;
    use crate::probe::{AddressProbe, Probe};

    async fn spawn_responder(identity: &CheckerIdentity) -> (u16, watch::Sender<bool>, tokio::task::JoinHandle<()>) {
        let responder = PingResponder::bind(identity.keypair().clone(), "127.0.0.1".parse().unwrap(), 0)
            .await
            .unwrap();
        assert_eq!(responder.peer_id().to_string(), identity.peer_id().as_str());

        let port = responder.port();
        let (stop_tx, stop_rx) = watch::channel(false);
        let server = tokio::spawn(responder.run(stop_rx));
        (port, stop_tx, server)
    }

    #[tokio::test]
    async fn test_responder_answers_until_stopped() {
        let _ = tracing_subscriber::fmt::try_init();

        let identity = CheckerIdentity::generate();
        let (port, stop_tx, server) = spawn_responder(&identity).await;
        let address = identity.advertised_address("127.0.0.1".parse().unwrap(), port);

        let sample = AddressProbe::default().probe(&address, Duration::from_secs(10)).await;
        assert!(sample.online);

        stop_tx.send_replace(true);
        tokio::time::timeout(Duration::from_secs(5), server).await.unwrap().unwrap();

        let sample = AddressProbe::default().probe(&address, Duration::from_secs(5)).await;
        assert!(!sample.online);
        assert_eq!(sample.latency_ms, 0);
    }

    #[tokio::test]
    async fn test_other_identity_at_address_is_offline() {
        let _ = tracing_subscriber::fmt::try_init();

        let listening = CheckerIdentity::generate();
        let (port, stop_tx, _server) = spawn_responder(&listening).await;

        // Same host and port, but the peer id of a checker that is not there
        let registered = CheckerIdentity::generate();
        let address = registered.advertised_address("127.0.0.1".parse().unwrap(), port);

        let sample = AddressProbe::default().probe(&address, Duration::from_secs(10)).await;
        assert!(!sample.online);
        assert_eq!(sample.latency_ms, 0);

        stop_tx.send_replace(true);
    }
}
