//! SSRF defense for outbound metadata fetches.
//!
//! Every fetch URL, and every redirect target along the way, passes
//! through [`resolve_safe`] before a connection is opened. Resolution is
//! fail-closed: any DNS error, disallowed scheme, or private/loopback
//! address blocks the request.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use reqwest::Url;
use thiserror::Error;

/// Maximum redirect hops followed for a single fetch.
pub const MAX_REDIRECTS: u8 = 3;

/// Gateways used to rewrite `ipfs://` and `ar://` URIs into fetchable HTTPS URLs.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL an `ipfs://<cid>/<path>` URI is rewritten against.
    pub ipfs_gateway: String,
    /// Base URL an `ar://<id>` URI is rewritten against.
    pub arweave_gateway: String,
    /// Whether plaintext `http://` URLs are permitted at all.
    pub allow_http: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            ipfs_gateway: "https://ipfs.io/ipfs/".to_string(),
            arweave_gateway: "https://arweave.net/".to_string(),
            allow_http: false,
        }
    }
}

/// Why a URL was rejected before a connection was attempted.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SsrfError {
    /// The scheme isn't `https`, an http opt-in, or a rewritable gateway scheme.
    #[error("scheme {0:?} is not allowed")]
    SchemeNotAllowed(String),
    /// The URL has no host component.
    #[error("url has no host")]
    MissingHost,
    /// The host is on the explicit blacklist.
    #[error("host {0:?} is blacklisted")]
    BlacklistedHost(String),
    /// DNS resolution failed; treated as a block, not a retryable error.
    #[error("dns resolution failed for {0:?}")]
    ResolutionFailed(String),
    /// A resolved address (or literal IP in the URL) is private/loopback/link-local.
    #[error("resolved address {0} is not publicly routable")]
    PrivateAddress(IpAddr),
    /// Too many redirect hops.
    #[error("exceeded {MAX_REDIRECTS} redirect hops")]
    TooManyRedirects,
}

const HOST_BLACKLIST: &[&str] = &["localhost", "metadata.google.internal"];
/// Cloud metadata service IPs blocked regardless of the general private-range check.
const BLOCKED_IPS: &[&str] = &["169.254.169.254", "fd00:ec2::254"];

/// Rewrite `ipfs://` and `ar://` URIs to their configured HTTPS gateway, leaving
/// other schemes untouched.
#[must_use]
pub fn rewrite_gateway_uri(uri: &str, gateways: &GatewayConfig) -> String {
    if let Some(rest) = uri.strip_prefix("ipfs://") {
        format!("{}{}", gateways.ipfs_gateway, rest)
    } else if let Some(rest) = uri.strip_prefix("ar://") {
        format!("{}{}", gateways.arweave_gateway, rest)
    } else {
        uri.to_string()
    }
}

/// Validate `url`'s scheme and host, resolving DNS and rejecting any
/// non-public address. Returns the first publicly-routable resolved
/// address, which callers pin the connection to.
///
/// # Errors
/// Returns [`SsrfError`] if the scheme is disallowed, the host is
/// blacklisted, DNS resolution fails, or every resolved address is
/// private/loopback/link-local.
pub async fn resolve_safe(url: &Url, gateways: &GatewayConfig) -> Result<IpAddr, SsrfError> {
    match url.scheme() {
        "https" => {}
        "http" if gateways.allow_http => {}
        other => return Err(SsrfError::SchemeNotAllowed(other.to_string())),
    }

    let host = url.host_str().ok_or(SsrfError::MissingHost)?;
    if HOST_BLACKLIST.contains(&host) {
        return Err(SsrfError::BlacklistedHost(host.to_string()));
    }

    if let Ok(literal) = host.parse::<IpAddr>() {
        return check_public(literal);
    }

    let port = url.port_or_known_default().unwrap_or(443);
    let addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|_| SsrfError::ResolutionFailed(host.to_string()))?;

    let mut last_err = SsrfError::ResolutionFailed(host.to_string());
    for addr in addrs {
        match check_public(addr.ip()) {
            Ok(ip) => return Ok(ip),
            Err(e) => last_err = e,
        }
    }
    Err(last_err)
}

/// Rejects loopback, link-local, unspecified, and RFC 1918-equivalent
/// private ranges for both IPv4 and IPv6, including IPv4-mapped/-compatible
/// IPv6 textual forms.
fn check_public(ip: IpAddr) -> Result<IpAddr, SsrfError> {
    for blocked in BLOCKED_IPS {
        if blocked.parse::<IpAddr>() == Ok(ip) {
            return Err(SsrfError::PrivateAddress(ip));
        }
    }

    match ip {
        IpAddr::V4(v4) => {
            if is_private_v4(v4) {
                Err(SsrfError::PrivateAddress(ip))
            } else {
                Ok(ip)
            }
        }
        IpAddr::V6(v6) => {
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return check_public(IpAddr::V4(mapped));
            }
            if is_private_v6(v6) {
                Err(SsrfError::PrivateAddress(ip))
            } else {
                Ok(ip)
            }
        }
    }
}

fn is_private_v4(v4: Ipv4Addr) -> bool {
    v4.is_private()
        || v4.is_loopback()
        || v4.is_link_local()
        || v4.is_unspecified()
        || v4.is_broadcast()
        || v4.is_documentation()
        // Carrier-grade NAT, RFC 6598.
        || ipnet::Ipv4Net::new(Ipv4Addr::new(100, 64, 0, 0), 10)
            .is_ok_and(|net| net.contains(&v4))
}

fn is_private_v6(v6: Ipv6Addr) -> bool {
    v6.is_loopback()
        || v6.is_unspecified()
        || v6.is_unique_local() // fc00::/7
        || v6.is_unicast_link_local() // fe80::/10
        || to_ipv4_compatible(v6).is_some_and(is_private_v4)
}

/// Equivalent of the former (now removed from std) `Ipv6Addr::to_ipv4_compatible`:
/// extracts the embedded IPv4 address from a deprecated `::a.b.c.d`
/// IPv4-compatible IPv6 address, excluding the unspecified/loopback forms.
fn to_ipv4_compatible(v6: Ipv6Addr) -> Option<Ipv4Addr> {
    match v6.octets() {
        [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, a, b, c, d] => {
            if a == 0 && b == 0 && c == 0 && (d == 0 || d == 1) {
                None
            } else {
                Some(Ipv4Addr::new(a, b, c, d))
            }
        }
        _ => None,
    }
}
