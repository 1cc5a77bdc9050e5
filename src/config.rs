//! # Configuration Management
//!
//! Centralized configuration for the probe core.
//!
//! This module provides structured limits for codec ceilings and timeouts,
//! plus gateway-level settings such as additional blocked CIDR ranges.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()` / `from_toml()`
//! - Environment variables via `from_env()`
//! - Direct instantiation with defaults
//!
//! ## Security Considerations
//! - Frame-size ceilings bound allocations driven by peer-declared lengths
//! - The timeout upper bound prevents a caller from parking a socket forever
//! - Blocked CIDR ranges can be extended but never shrunk below the built-ins

use crate::error::{ProbeError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

/// Max allowed frame payload size (16 MB)
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Max allowed single text line (64 KB)
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Max bytes buffered by read-until-close framing (1 MB)
pub const MAX_STREAM_LEN: usize = 1024 * 1024;

/// Max nesting depth for constructed BER elements
pub const MAX_BER_DEPTH: usize = 16;

/// Default probe timeout when the caller supplies none
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Upper bound for a caller-supplied timeout (10 minutes)
pub const MAX_TIMEOUT_MS: u64 = 600_000;

/// Codec and session limits applied to every probe.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProbeLimits {
    /// Ceiling for any peer-declared frame length
    pub max_frame_size: usize,
    /// Ceiling for a single text line
    pub max_line_len: usize,
    /// Ceiling for read-until-close buffering
    pub max_stream_len: usize,
    /// Default timeout in milliseconds
    pub default_timeout_ms: u64,
}

impl Default for ProbeLimits {
    fn default() -> Self {
        Self {
            max_frame_size: MAX_FRAME_SIZE,
            max_line_len: MAX_LINE_LEN,
            max_stream_len: MAX_STREAM_LEN,
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl ProbeLimits {
    /// Default timeout as a [`Duration`].
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}

/// Gateway-level configuration: limits plus guard extensions.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GatewayConfig {
    /// Codec and session limits
    #[serde(default)]
    pub limits: ProbeLimits,

    /// Additional CIDR ranges (e.g. `"10.0.0.0/8"`) blocked by the security
    /// guard on top of the built-in reverse-proxy set
    #[serde(default)]
    pub blocked_cidrs: Vec<String>,
}

impl GatewayConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProbeError::Config(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProbeError::Config(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProbeError::Config(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(timeout) = std::env::var("NETPROBE_DEFAULT_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                config.limits.default_timeout_ms = val.min(MAX_TIMEOUT_MS);
            }
        }

        if let Ok(max_frame) = std::env::var("NETPROBE_MAX_FRAME_SIZE") {
            if let Ok(val) = max_frame.parse::<usize>() {
                config.limits.max_frame_size = val;
            }
        }

        if let Ok(cidrs) = std::env::var("NETPROBE_BLOCKED_CIDRS") {
            config.blocked_cidrs = cidrs
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Parse `blocked_cidrs` into guard ranges, rejecting bad notation at
    /// load time rather than per probe.
    pub fn blocked_ranges(&self) -> Result<Vec<crate::security::CidrRange>> {
        self.blocked_cidrs
            .iter()
            .map(|s| crate::security::CidrRange::parse(s))
            .collect()
    }
}
