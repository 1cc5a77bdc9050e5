//! # Built-in Protocol Adapters
//!
//! One representative adapter per codec family: SMTP (CRLF lines, multiline
//! replies, STARTTLS), POP3 (CRLF lines, plaintext and APOP auth), STUN
//! (TLV, XOR address decoding, long-term credentials), LDAP (BER simple
//! bind), RDP (TPKT length prefix, X.224 negotiation), and the classic
//! single-exchange services echo, daytime, time, and finger.
//!
//! Adapters are pure data: each module exposes a `spec()` returning its
//! [`ProbeSpec`](crate::protocol::ProbeSpec). No adapter performs I/O.

pub mod ldap;
pub mod pop3;
pub mod rdp;
pub mod simple;
pub mod smtp;
pub mod stun;

use crate::protocol::Registry;

/// Registry preloaded with every built-in adapter.
pub fn builtin() -> Registry {
    let mut registry = Registry::new();
    registry.register(smtp::spec());
    registry.register(pop3::spec());
    registry.register(stun::spec());
    registry.register(ldap::spec());
    registry.register(rdp::spec());
    registry.register(simple::echo());
    registry.register(simple::daytime());
    registry.register(simple::time());
    registry.register(simple::finger());
    registry
}
