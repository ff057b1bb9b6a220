//! Keypair and peer id of the local checker.

use std::fs;
use std::io::{self, Write};
use std::net::IpAddr;
use std::path::Path;

use libp2p::identity::Keypair;
use libp2p::multiaddr::Protocol;
use libp2p::Multiaddr;
use tracing::info;

use crate::error::IdentityError;
use crate::types::{MultiAddr, PeerId};

#[derive(Debug, Clone)]
pub struct CheckerIdentity {
    keypair: Keypair,
    peer_id: libp2p::PeerId,
}

impl CheckerIdentity {
    /// Fresh ed25519 identity, not persisted
    pub fn generate() -> Self {
        Self::from_keypair(Keypair::generate_ed25519())
    }

    /// Load the keypair stored at `path`, creating and storing one if the
    /// file does not exist yet
    pub fn load_or_generate(path: &Path) -> Result<Self, IdentityError> {
        if path.exists() {
            let bytes = fs::read(path)?;
            let identity = Self::from_keypair(Keypair::from_protobuf_encoding(&bytes)?);
            info!("Loaded checker identity {} from {}", identity.peer_id, path.display());
            return Ok(identity);
        }

        let identity = Self::generate();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        write_secret(path, &identity.keypair.to_protobuf_encoding()?)?;
        info!("Generated checker identity {} at {}", identity.peer_id, path.display());

        Ok(identity)
    }

    fn from_keypair(keypair: Keypair) -> Self {
        let peer_id = keypair.public().to_peer_id();
        Self { keypair, peer_id }
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    pub fn peer_id(&self) -> PeerId {
        PeerId::from(self.peer_id)
    }

    /// Address other checkers should probe, `/ip{4,6}/<ip>/tcp/<port>/p2p/<id>`
    pub fn advertised_address(&self, ip: IpAddr, port: u16) -> MultiAddr {
        let addr = Multiaddr::empty()
            .with(Protocol::from(ip))
            .with(Protocol::Tcp(port))
            .with(Protocol::P2p(self.peer_id));
        MultiAddr::from(addr)
    }
}

/// Write key material readable by the owner only
fn write_secret(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}
