//! Authentication strategies and digest helpers.
//!
//! Three schemes cover the supported protocols: no auth, a plaintext
//! credential frame (POP3 USER/PASS, LDAP simple bind), and
//! challenge-response digests: APOP's MD5 over the server's timestamp
//! banner, and STUN's long-term-credential HMAC-SHA1 keyed by
//! `MD5(username:realm:password)`.

use hmac::{Hmac, Mac};
use md5::{Digest as Md5Digest, Md5};
use serde_json::Value;
use sha1::Sha1;

/// Declared auth scheme of a protocol adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStrategy {
    /// No credentials exchanged.
    None,
    /// Credentials sent as a plaintext frame.
    Plaintext,
    /// Server issues a challenge; client answers with a digest.
    ChallengeResponse(DigestAlgo),
}

/// Digest function of a challenge-response scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgo {
    HmacSha1,
    Md5,
}

/// Caller-supplied probe credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub realm: Option<String>,
}

impl Credentials {
    /// Extract from adapter params (`username`/`password`, optional `realm`).
    /// Absent credentials are not an error; many probes run unauthenticated.
    pub fn from_params(params: &serde_json::Map<String, Value>) -> Option<Self> {
        let username = params.get("username")?.as_str()?.to_string();
        let password = params.get("password")?.as_str()?.to_string();
        let realm = params
            .get("realm")
            .and_then(Value::as_str)
            .map(String::from);
        Some(Self {
            username,
            password,
            realm,
        })
    }
}

/// HMAC-SHA1 over `message` with an arbitrary-length key.
pub fn hmac_sha1(key: &[u8], message: &[u8]) -> [u8; 20] {
    // HMAC accepts keys of any length; new_from_slice cannot fail here.
    let mut mac = <Hmac<Sha1> as Mac>::new_from_slice(key)
        .expect("HMAC-SHA1 accepts keys of any length");
    mac.update(message);
    mac.finalize().into_bytes().into()
}

/// Plain MD5 digest.
pub fn md5_digest(data: &[u8]) -> [u8; 16] {
    let mut hasher = Md5::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// STUN long-term-credential key: `MD5(username:realm:password)`.
pub fn long_term_key(username: &str, realm: &str, password: &str) -> [u8; 16] {
    md5_digest(format!("{username}:{realm}:{password}").as_bytes())
}

/// APOP digest: lowercase hex of `MD5(challenge || password)`, where the
/// challenge is the `<...>` timestamp from the POP3 greeting.
pub fn apop_digest(challenge: &str, password: &str) -> String {
    hex(&md5_digest(format!("{challenge}{password}").as_bytes()))
}

/// Lowercase hex encoding.
pub fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        use std::fmt::Write;
        let _ = write!(out, "{b:02x}");
    }
    out
}
