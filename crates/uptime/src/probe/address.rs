//! Interpretation of a multiaddress as something probe-able.
//!
//! Peer addresses (`/ip4/1.2.3.4/tcp/3000/p2p/<id>`) are checked with a
//! libp2p ping that must reach exactly that peer id. Addresses continuing
//! with `http` or `https`, a method and a path
//! (`/dns/example.com/tcp/443/https/get/healthcheck`) are checked with an
//! HTTP request.

use std::str::FromStr;

use libp2p::multiaddr::Protocol;
use libp2p::Multiaddr;
use url::Url;

use crate::error::AddressError;
use crate::types::MultiAddr;

/// What to do to probe an address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeTarget {
    /// Ping `peer_id`, dialing the transport part of the address
    Peer { address: Multiaddr, peer_id: libp2p::PeerId },
    Http { url: Url, method: reqwest::Method },
}

pub fn classify(address: &MultiAddr) -> Result<ProbeTarget, AddressError> {
    let raw = address.as_str();
    let segments: Vec<&str> = raw.split('/').collect();

    // An http segment only counts right after `tcp/<port>`
    let http_at = segments
        .iter()
        .enumerate()
        .skip(3)
        .find(|(i, s)| (**s == "http" || **s == "https") && segments[i - 2] == "tcp")
        .map(|(i, _)| i);

    let transport = match http_at {
        Some(i) => segments[..i].join("/"),
        None => raw.to_string(),
    };
    let parsed = Multiaddr::from_str(&transport).map_err(|e| AddressError::Invalid(raw.to_string(), e.to_string()))?;
    let (host, port) = host_and_port(raw, &parsed)?;

    let Some(i) = http_at else {
        return peer_target(raw, parsed);
    };

    let scheme = segments[i];
    let method = match segments.get(i + 1).copied().unwrap_or("get") {
        "get" | "GET" => reqwest::Method::GET,
        "head" | "HEAD" => reqwest::Method::HEAD,
        other => return Err(AddressError::UnsupportedMethod(raw.to_string(), other.to_string())),
    };
    let path = segments.get(i + 2..).map(|rest| rest.join("/")).unwrap_or_default();

    let host = if host.contains(':') { format!("[{}]", host) } else { host };
    let url = Url::parse(&format!("{}://{}:{}/{}", scheme, host, port, path))
        .map_err(|e| AddressError::Invalid(raw.to_string(), e.to_string()))?;

    Ok(ProbeTarget::Http { url, method })
}

fn peer_target(raw: &str, mut address: Multiaddr) -> Result<ProbeTarget, AddressError> {
    match address.pop() {
        Some(Protocol::P2p(peer_id)) => Ok(ProbeTarget::Peer { address, peer_id }),
        _ => Err(AddressError::MissingPeerId(raw.to_string())),
    }
}

fn host_and_port(raw: &str, addr: &Multiaddr) -> Result<(String, u16), AddressError> {
    let mut host = None;
    let mut port = None;
    for protocol in addr.iter() {
        match protocol {
            Protocol::Ip4(ip) => host = Some(ip.to_string()),
            Protocol::Ip6(ip) => host = Some(ip.to_string()),
            Protocol::Dns(name) | Protocol::Dns4(name) | Protocol::Dns6(name) => {
                host = Some(name.to_string())
            }
            Protocol::Tcp(p) => port = Some(p),
            _ => {}
        }
    }

    let host = host.ok_or_else(|| AddressError::MissingHost(raw.to_string()))?;
    let port = port.ok_or_else(|| AddressError::MissingPort(raw.to_string()))?;
    Ok((host, port))
}
