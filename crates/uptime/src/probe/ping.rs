use std::time::Duration;

use futures::StreamExt;
use libp2p::identity::Keypair;
use libp2p::swarm::dial_opts::DialOpts;
use libp2p::swarm::SwarmEvent;
use libp2p::{ping, Multiaddr, PeerId};
use tracing::trace;

use super::swarm::build_swarm;
use crate::error::ProbeError;

/// Keeps the connection open while the first ping is in flight
const IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// libp2p ping of a peer at a known address
///
/// The noise handshake authenticates the remote, so a listener with any
/// other identity fails the dial instead of answering for `peer`.
#[derive(Debug, Clone)]
pub struct PingProbe {
    keypair: Keypair,
}

impl PingProbe {
    pub fn new(keypair: Keypair) -> Self {
        Self { keypair }
    }

    /// Dial `peer` at `address` and return the round trip of the first ping
    pub async fn ping(&self, address: &Multiaddr, peer: PeerId) -> Result<Duration, ProbeError> {
        let mut swarm = build_swarm(self.keypair.clone(), IDLE_TIMEOUT)?;
        swarm.dial(DialOpts::peer_id(peer).addresses(vec![address.clone()]).build())?;

        loop {
            match swarm.select_next_some().await {
                SwarmEvent::Behaviour(ping::Event { peer: from, result, .. }) if from == peer => {
                    return result.map_err(ProbeError::from);
                }
                SwarmEvent::OutgoingConnectionError { error, .. } => return Err(error.into()),
                SwarmEvent::ConnectionClosed { peer_id, .. } if peer_id == peer => {
                    return Err(ProbeError::ConnectionClosed(peer_id));
                }
                event => trace!(?event, "ping swarm event"),
            }
        }
    }
}
