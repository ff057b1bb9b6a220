//! Swarm setup shared by the ping check and the responder.

use std::time::Duration;

use libp2p::identity::Keypair;
use libp2p::{noise, ping, tcp, yamux, Swarm, SwarmBuilder};

use crate::error::ProbeError;

/// Ping-only swarm over tcp with noise and yamux, resolving dns addresses
pub(crate) fn build_swarm(keypair: Keypair, idle_timeout: Duration) -> Result<Swarm<ping::Behaviour>, ProbeError> {
    let swarm = SwarmBuilder::with_existing_identity(keypair)
        .with_tokio()
        .with_tcp(tcp::Config::default().nodelay(true), noise::Config::new, yamux::Config::default)
        .map_err(|e| ProbeError::Swarm(e.to_string()))?
        .with_dns()
        .map_err(|e| ProbeError::Swarm(e.to_string()))?
        .with_behaviour(|_| ping::Behaviour::new(ping::Config::new()))
        .map_err(|e| ProbeError::Swarm(e.to_string()))?
        .with_swarm_config(|c| c.with_idle_connection_timeout(idle_timeout))
        .build();

    Ok(swarm)
}
