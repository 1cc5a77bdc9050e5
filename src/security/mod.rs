//! # Security Components
//!
//! Pre-connection defenses: host syntax validation and the reverse-proxy
//! CIDR block list that keeps probes pointed at origins instead of shared
//! edge infrastructure.

pub mod guard;

pub use guard::{decide, guard_host, guard_host_with, CidrRange, GuardDecision};
