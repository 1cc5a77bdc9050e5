#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Validation and security-guard tests: host syntax, port/timeout bounds,
//! and CIDR screening of resolved destinations.
//!
//! The network-touching cases stick to IP literals so resolution is
//! deterministic and needs no DNS.

use netprobe::error::{FailureKind, ProbeError};
use netprobe::security::{decide, guard_host, guard_host_with, CidrRange, GuardDecision};
use netprobe::transport::{ConnectionRequest, TlsMode};

// ============================================================================
// INPUT VALIDATION
// ============================================================================

#[test]
fn test_empty_host_rejected() {
    let err = ConnectionRequest::from_values("", None, None, TlsMode::None, 25).unwrap_err();
    assert_eq!(err.kind(), FailureKind::Validation);
}

#[test]
fn test_port_bounds() {
    for bad in [0i64, -1, 65536, 700_000] {
        let err = ConnectionRequest::from_values("example.org", Some(bad), None, TlsMode::None, 25)
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Validation, "port {bad}");
    }
    for good in [1i64, 25, 65535] {
        let req =
            ConnectionRequest::from_values("example.org", Some(good), None, TlsMode::None, 25)
                .unwrap();
        assert_eq!(req.port, good as u16);
    }
}

#[test]
fn test_omitted_port_takes_protocol_default() {
    let req = ConnectionRequest::from_values("example.org", None, None, TlsMode::None, 3478).unwrap();
    assert_eq!(req.port, 3478);
}

#[test]
fn test_timeout_bounds() {
    // Zero is accepted and means "already expired"
    assert!(
        ConnectionRequest::from_values("example.org", None, Some(0), TlsMode::None, 25).is_ok()
    );
    assert!(
        ConnectionRequest::from_values("example.org", None, Some(600_000), TlsMode::None, 25)
            .is_ok()
    );
    for bad in [-1i64, 600_001] {
        let err =
            ConnectionRequest::from_values("example.org", None, Some(bad), TlsMode::None, 25)
                .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Validation, "timeout {bad}");
    }
}

#[tokio::test]
async fn test_host_charset_rejected_before_resolution() {
    for bad in ["host name", "host;rm -rf", "host/path", "👾.example"] {
        let err = guard_host(bad).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Validation, "host {bad:?}");
    }
}

// ============================================================================
// CIDR SCREENING
// ============================================================================

#[tokio::test]
async fn test_edge_network_literal_is_blocked() {
    // 104.16.0.0/13 is a built-in blocked edge range
    let err = guard_host("104.16.132.229").await.unwrap_err();
    match err {
        ProbeError::SecurityBlock { is_cloudflare, .. } => assert!(is_cloudflare),
        other => panic!("expected SecurityBlock, got {other:?}"),
    }
}

#[tokio::test]
async fn test_loopback_literal_is_allowed() {
    let addrs = guard_host("127.0.0.1").await.unwrap();
    assert_eq!(addrs.len(), 1);
    assert!(addrs[0].is_loopback());
}

#[tokio::test]
async fn test_extra_ranges_block_without_cloudflare_flag() {
    let extra = [CidrRange::parse("10.0.0.0/8").unwrap()];
    let err = guard_host_with("10.1.2.3", &extra).await.unwrap_err();
    match err {
        ProbeError::SecurityBlock { is_cloudflare, .. } => assert!(!is_cloudflare),
        other => panic!("expected SecurityBlock, got {other:?}"),
    }
    // The extra range must not widen the built-in screening elsewhere
    assert!(guard_host_with("127.0.0.1", &extra).await.is_ok());
}

#[tokio::test]
async fn test_ipv6_edge_range_blocked() {
    // 2606:4700::/32 is a built-in blocked edge range
    let err = guard_host("2606:4700::6810:84e5").await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::SecurityBlock);
}

#[tokio::test]
async fn test_decide_mirrors_guard() {
    match decide("104.16.132.229", &[]).await.unwrap() {
        GuardDecision::Block { is_cloudflare, .. } => assert!(is_cloudflare),
        GuardDecision::Allow(_) => panic!("edge literal must be blocked"),
    }
    assert!(matches!(
        decide("127.0.0.1", &[]).await.unwrap(),
        GuardDecision::Allow(_)
    ));
}

#[test]
fn test_mixed_family_ranges_never_match() {
    let v4 = CidrRange::parse("104.16.0.0/13").unwrap();
    assert!(!v4.contains("2606:4700::1".parse().unwrap()));
    let v6 = CidrRange::parse("2606:4700::/32").unwrap();
    assert!(!v6.contains("104.16.0.1".parse().unwrap()));
}
