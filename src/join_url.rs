//! LAN IP detection and join-URL construction (SPEC_FULL.md §6 join URL
//! policy). Grounded on `original_source/api.py::_detect_lan_ip`; the
//! platform subprocess heuristics mirror `src/mdns.rs`'s use of
//! `hostname`/`local-ip-address` for "how do I find my own address" in Rust.

use std::net::{IpAddr, Ipv4Addr};
use std::process::Command;

use rocket::request::{FromRequest, Outcome, Request};

use crate::config::Config;

fn is_usable(ip: Ipv4Addr) -> bool {
    !ip.is_loopback() && !ip.is_link_local() && !ip.is_multicast() && !ip.is_unspecified()
}

fn parse_usable(candidate: &str) -> Option<String> {
    candidate.parse::<Ipv4Addr>().filter(|ip| is_usable(*ip)).map(|ip| ip.to_string())
}

#[cfg(target_os = "macos")]
fn platform_ip() -> Option<String> {
    for iface in ["en0", "en1"] {
        let Ok(output) = Command::new("ipconfig").args(["getifaddr", iface]).output() else { break };
        if !output.status.success() {
            continue;
        }
        if let Some(ip) = parse_usable(String::from_utf8_lossy(&output.stdout).trim()) {
            return Some(ip);
        }
    }
    None
}

#[cfg(target_os = "linux")]
fn platform_ip() -> Option<String> {
    let output = Command::new("hostname").arg("-I").output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8_lossy(&output.stdout).split_whitespace().find_map(parse_usable)
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
fn platform_ip() -> Option<String> {
    None
}

/// Best-effort LAN IPv4 address for the join URl a QR code/link points
/// other players at. `WIKIRACE_PUBLIC_HOST` always wins when set.
pub fn detect_lan_ip(config: &Config) -> Option<String> {
    if let Some(host) = &config.public_host {
        return Some(host.clone());
    }

    if let Some(ip) = platform_ip() {
        return Some(ip);
    }

    if let Ok(IpAddr::V4(ip)) = local_ip_address::local_ip() {
        if is_usable(ip) {
            return Some(ip.to_string());
        }
    }

    None
}

/// The scheme/host/port Rocket saw the request arrive on, read from the
/// `Host` header (and `X-Forwarded-Proto` for the scheme behind a proxy).
pub struct RequestOrigin {
    pub scheme: String,
    pub host: String,
    pub port: Option<u16>,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for RequestOrigin {
    type Error = std::convert::Infallible;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let scheme = req.headers().get_one("X-Forwarded-Proto").unwrap_or("http").to_string();
        let host_header = req.headers().get_one("Host").unwrap_or("localhost");
        let (host, port) = match host_header.rsplit_once(':') {
            Some((h, p)) if !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()) => (h.to_string(), p.parse().ok()),
            _ => (host_header.to_string(), None),
        };
        Outcome::Success(RequestOrigin { scheme, host, port })
    }
}

fn netloc(host: &str, port: Option<u16>) -> String {
    match port {
        Some(p) => format!("{host}:{p}"),
        None => host.to_string(),
    }
}

/// Build the URL other players use to join a room: the request's own origin
/// unless it's a loopback/any-address host, in which case swap in the
/// detected LAN IP so phones on the same network can actually reach it.
pub fn build_join_url(config: &Config, origin: &RequestOrigin, room_id: &str) -> String {
    let default = format!("{}://{}/?room={room_id}", origin.scheme, netloc(&origin.host, origin.port));

    if matches!(origin.host.as_str(), "localhost" | "127.0.0.1" | "0.0.0.0") {
        if let Some(lan_ip) = detect_lan_ip(config) {
            return format!("{}://{}/?room={room_id}", origin.scheme, netloc(&lan_ip, origin.port));
        }
    }

    default
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_host_override_wins() {
        let mut config = Config::default();
        config.public_host = Some("race.example.com".to_string());
        assert_eq!(detect_lan_ip(&config), Some("race.example.com".to_string()));
    }

    #[test]
    fn join_url_keeps_non_loopback_host() {
        let config = Config::default();
        let origin = RequestOrigin { scheme: "https".to_string(), host: "race.example.com".to_string(), port: None };
        assert_eq!(build_join_url(&config, &origin, "room_ABC12345"), "https://race.example.com/?room=room_ABC12345");
    }

    #[test]
    fn join_url_swaps_loopback_for_public_host_override() {
        let mut config = Config::default();
        config.public_host = Some("192.168.1.50".to_string());
        let origin = RequestOrigin { scheme: "http".to_string(), host: "127.0.0.1".to_string(), port: Some(8000) };
        assert_eq!(build_join_url(&config, &origin, "room_ABC12345"), "http://192.168.1.50:8000/?room=room_ABC12345");
    }
}
