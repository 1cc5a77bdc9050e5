//! # Binary Codec Library
//!
//! Pure encode/decode primitives for the wire-format families shared by the
//! protocol adapters. Nothing in this module performs I/O: every decoder
//! consumes an already-read byte slice and returns the decoded value plus the
//! number of bytes consumed, or a typed [`DecodeError`]. That contract is
//! what makes decoders testable without live sockets and what lets the
//! stream-facing [`codec::FrameCodec`] reuse them for reassembly.
//!
//! ## Families
//! - **fixed**: fixed-width integers, either endianness
//! - **length**: length-prefixed binary frames with declared-length ceilings
//! - **tlv**: STUN/TURN-style type-length-value with alignment padding
//! - **ber**: ASN.1 BER tag-length-value, short/long lengths, nesting
//! - **text**: line-oriented frames with terminator and dot-unstuffing rules
//!
//! ## Invariant
//! A decode either fully consumes its declared length or fails. No partial
//! silent success.
//!
//! [`DecodeError`]: crate::error::DecodeError

pub mod ber;
pub mod codec;
pub mod fixed;
pub mod frame;
pub mod length;
pub mod text;
pub mod tlv;

pub use codec::{FrameCodec, WireFormat};
pub use frame::Frame;
