//! TLS client configuration for probes.
//!
//! A diagnostic probe connects to arbitrary caller-specified hosts to measure
//! them, not to trust them: certificate chains are frequently self-signed,
//! expired, or name-mismatched on exactly the machines worth diagnosing. The
//! client config therefore accepts any presented certificate. Nothing
//! sensitive is sent over these sessions beyond caller-supplied probe
//! credentials, and the envelope reports only what the peer asserted.

use crate::error::{ProbeError, Result};
use once_cell::sync::Lazy;
use rustls::client::{ServerCertVerified, ServerCertVerifier};
use rustls::{Certificate, ClientConfig, ServerName};
use std::sync::Arc;
use std::time::SystemTime;

struct AcceptAnyCertificate;

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &Certificate,
        _intermediates: &[Certificate],
        _server_name: &ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: SystemTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }
}

/// Shared client config for every probe session.
static CLIENT_CONFIG: Lazy<Arc<ClientConfig>> = Lazy::new(|| {
    let config = ClientConfig::builder()
        .with_safe_defaults()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate))
        .with_no_client_auth();
    Arc::new(config)
});

/// The process-wide probe client config.
pub fn client_config() -> Arc<ClientConfig> {
    CLIENT_CONFIG.clone()
}

/// SNI name for `host`; IP literals become `ServerName::IpAddress`.
pub fn server_name(host: &str) -> Result<ServerName> {
    ServerName::try_from(host)
        .map_err(|_| ProbeError::Tls(format!("Host is not a valid TLS server name: {host}")))
}
