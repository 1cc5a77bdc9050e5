//! Address/Security Guard.
//!
//! Every probe passes here before any socket is opened. The guard enforces
//! two things:
//!
//! 1. **Host syntax**: only `[A-Za-z0-9.-:]` is accepted, so nothing shaped
//!    like shell or header injection reaches lower layers.
//! 2. **Destination**: the host's resolved addresses must not fall inside the
//!    known reverse-proxy edge ranges. Probing a hostname that fronts through
//!    shared edge infrastructure would measure the proxy, not the origin, and
//!    is indistinguishable from abuse, so such destinations are blocked with an
//!    `isCloudflare` marker and HTTP 403.
//!
//! The built-in range table is constructed once and shared immutably by all
//! sessions; decisions for identical input are deterministic.

use crate::error::{constants, ProbeError, Result};
use once_cell::sync::Lazy;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use tokio::net::lookup_host;
use tracing::{debug, instrument, warn};

/// One CIDR range over either address family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CidrRange {
    network: IpAddr,
    prefix: u8,
}

impl CidrRange {
    /// Parse `"a.b.c.d/n"` or `"x::/n"`.
    pub fn parse(s: &str) -> Result<Self> {
        let (addr, prefix) = s
            .split_once('/')
            .ok_or_else(|| ProbeError::Config(format!("CIDR missing prefix length: {s}")))?;
        let network: IpAddr = addr
            .parse()
            .map_err(|_| ProbeError::Config(format!("Invalid CIDR network address: {s}")))?;
        let prefix: u8 = prefix
            .parse()
            .map_err(|_| ProbeError::Config(format!("Invalid CIDR prefix length: {s}")))?;

        let max = match network {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        if prefix > max {
            return Err(ProbeError::Config(format!(
                "CIDR prefix length {prefix} exceeds {max}: {s}"
            )));
        }
        Ok(Self { network, prefix })
    }

    const fn v4(a: u8, b: u8, c: u8, d: u8, prefix: u8) -> Self {
        Self {
            network: IpAddr::V4(Ipv4Addr::new(a, b, c, d)),
            prefix,
        }
    }

    const fn v6(segments: [u16; 8], prefix: u8) -> Self {
        Self {
            network: IpAddr::V6(Ipv6Addr::new(
                segments[0],
                segments[1],
                segments[2],
                segments[3],
                segments[4],
                segments[5],
                segments[6],
                segments[7],
            )),
            prefix,
        }
    }

    /// Prefix match. Mixed families never match.
    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.network, ip) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                if self.prefix == 0 {
                    return true;
                }
                let mask = u32::MAX << (32 - self.prefix);
                (u32::from(ip) & mask) == (u32::from(net) & mask)
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                if self.prefix == 0 {
                    return true;
                }
                let mask = u128::MAX << (128 - self.prefix);
                (u128::from(ip) & mask) == (u128::from(net) & mask)
            }
            _ => false,
        }
    }
}

/// Published Cloudflare anycast edge ranges, built once per process.
static EDGE_RANGES: Lazy<Vec<CidrRange>> = Lazy::new(|| {
    vec![
        CidrRange::v4(173, 245, 48, 0, 20),
        CidrRange::v4(103, 21, 244, 0, 22),
        CidrRange::v4(103, 22, 200, 0, 22),
        CidrRange::v4(103, 31, 4, 0, 22),
        CidrRange::v4(141, 101, 64, 0, 18),
        CidrRange::v4(108, 162, 192, 0, 18),
        CidrRange::v4(190, 93, 240, 0, 20),
        CidrRange::v4(188, 114, 96, 0, 20),
        CidrRange::v4(197, 234, 240, 0, 22),
        CidrRange::v4(198, 41, 128, 0, 17),
        CidrRange::v4(162, 158, 0, 0, 15),
        CidrRange::v4(104, 16, 0, 0, 13),
        CidrRange::v4(104, 24, 0, 0, 14),
        CidrRange::v4(172, 64, 0, 0, 13),
        CidrRange::v4(131, 0, 72, 0, 22),
        CidrRange::v6([0x2400, 0xcb00, 0, 0, 0, 0, 0, 0], 32),
        CidrRange::v6([0x2606, 0x4700, 0, 0, 0, 0, 0, 0], 32),
        CidrRange::v6([0x2803, 0xf800, 0, 0, 0, 0, 0, 0], 32),
        CidrRange::v6([0x2405, 0xb500, 0, 0, 0, 0, 0, 0], 32),
        CidrRange::v6([0x2405, 0x8100, 0, 0, 0, 0, 0, 0], 32),
        CidrRange::v6([0x2a06, 0x98c0, 0, 0, 0, 0, 0, 0], 29),
        CidrRange::v6([0x2c0f, 0xf248, 0, 0, 0, 0, 0, 0], 32),
    ]
});

/// Guard verdict for a destination host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Host is probeable; resolved addresses attached.
    Allow(Vec<IpAddr>),
    /// Host is blocked.
    Block { reason: String, is_cloudflare: bool },
}

/// Syntax allow-list: alphanumerics, dot, hyphen, colon (IPv6 literals).
pub fn valid_host_syntax(host: &str) -> bool {
    !host.is_empty()
        && host
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b':'))
}

/// Validate, resolve, and screen `host` against the built-in edge ranges.
pub async fn guard_host(host: &str) -> Result<Vec<IpAddr>> {
    guard_host_with(host, &[]).await
}

/// [`guard_host`] with deployment-specific extra blocked ranges.
///
/// Blocked destinations return [`ProbeError::SecurityBlock`]; built-in edge
/// hits carry `is_cloudflare: true`, configured extras carry `false`.
#[instrument(skip(extra_ranges))]
pub async fn guard_host_with(host: &str, extra_ranges: &[CidrRange]) -> Result<Vec<IpAddr>> {
    if host.is_empty() {
        return Err(ProbeError::Validation(constants::ERR_EMPTY_HOST.into()));
    }
    if !valid_host_syntax(host) {
        return Err(ProbeError::Validation(constants::ERR_HOST_CHARSET.into()));
    }

    // Port 0 here only satisfies the resolver; the probe connects later with
    // the real port.
    let addrs: Vec<IpAddr> = lookup_host((host, 0u16))
        .await
        .map_err(|e| ProbeError::Dns(format!("Cannot resolve {host}: {e}")))?
        .map(|sa| sa.ip())
        .collect();

    if addrs.is_empty() {
        return Err(ProbeError::Dns(constants::ERR_NO_ADDRESSES.into()));
    }

    for &ip in &addrs {
        if EDGE_RANGES.iter().any(|r| r.contains(ip)) {
            warn!(host, %ip, "Blocked probe into reverse-proxy edge range");
            return Err(ProbeError::SecurityBlock {
                reason: constants::ERR_EDGE_RANGE.into(),
                is_cloudflare: true,
            });
        }
        if extra_ranges.iter().any(|r| r.contains(ip)) {
            warn!(host, %ip, "Blocked probe into configured CIDR range");
            return Err(ProbeError::SecurityBlock {
                reason: format!("Destination {ip} is in a blocked address range"),
                is_cloudflare: false,
            });
        }
    }

    debug!(host, count = addrs.len(), "Destination allowed");
    Ok(addrs)
}

/// Non-erroring form of the verdict, for callers that branch on it.
pub async fn decide(host: &str, extra_ranges: &[CidrRange]) -> Result<GuardDecision> {
    match guard_host_with(host, extra_ranges).await {
        Ok(addrs) => Ok(GuardDecision::Allow(addrs)),
        Err(ProbeError::SecurityBlock {
            reason,
            is_cloudflare,
        }) => Ok(GuardDecision::Block {
            reason,
            is_cloudflare,
        }),
        Err(other) => Err(other),
    }
}
