//! Stream-facing bridge over the pure decoders.
//!
//! [`FrameCodec`] implements `tokio_util::codec::{Decoder, Encoder}` so the
//! connection manager can run adapters over `Framed`. The pure decoders do
//! the actual work; this layer only handles reassembly: a `Truncated` result
//! against the in-progress buffer means "await more bytes", while `Truncated`
//! at EOF is a real protocol violation and surfaces as an error.

use crate::config::{MAX_LINE_LEN, MAX_STREAM_LEN};
use crate::core::ber::BerElement;
use crate::core::frame::Frame;
use crate::core::length::LengthPrefix;
use crate::core::text::{self, LineTerminator};
use crate::core::tlv::TlvMessage;
use crate::error::{DecodeError, ProbeError};
use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// How an adapter's protocol frames its byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    /// One frame per text line.
    Line {
        terminator: LineTerminator,
        max_len: usize,
    },
    /// Dot-terminated multiline blocks.
    DotBlock {
        terminator: LineTerminator,
        max_len: usize,
    },
    /// Length-prefixed binary frames.
    LengthPrefixed(LengthPrefix),
    /// STUN-style TLV messages.
    Tlv { max_body: usize },
    /// BER elements.
    Ber { max_len: usize },
    /// Exactly `len` bytes per frame.
    FixedWidth { len: usize },
    /// Everything until the peer closes, decoded as text lines.
    UntilClose { max_len: usize },
}

impl WireFormat {
    /// CRLF line framing with the default line ceiling.
    pub fn crlf_line() -> Self {
        WireFormat::Line {
            terminator: LineTerminator::CrlfOrLf,
            max_len: MAX_LINE_LEN,
        }
    }

    /// Pure decode against a complete buffer: `(frame, bytes_consumed)`.
    pub fn decode_frame(&self, buf: &[u8]) -> Result<(Frame, usize), DecodeError> {
        match *self {
            WireFormat::Line {
                terminator,
                max_len,
            } => {
                let (line, used) = text::decode_line(buf, terminator, max_len)?;
                Ok((Frame::TextLine(line), used))
            }
            WireFormat::DotBlock {
                terminator,
                max_len,
            } => {
                let (lines, used) = text::decode_dot_block(buf, terminator, max_len)?;
                Ok((Frame::TextBlock(lines), used))
            }
            WireFormat::LengthPrefixed(prefix) => {
                let (payload, used) = prefix.decode(buf)?;
                Ok((Frame::LengthPrefixed(payload), used))
            }
            WireFormat::Tlv { max_body } => {
                let (msg, used) = TlvMessage::decode(buf, max_body)?;
                Ok((Frame::Tlv(msg), used))
            }
            WireFormat::Ber { max_len } => {
                let (el, used) = BerElement::decode(buf, max_len)?;
                Ok((Frame::Ber(el), used))
            }
            WireFormat::FixedWidth { len } => {
                if buf.len() < len {
                    return Err(DecodeError::Truncated {
                        needed: len,
                        available: buf.len(),
                    });
                }
                Ok((Frame::FixedWidth(Bytes::copy_from_slice(&buf[..len])), len))
            }
            WireFormat::UntilClose { max_len } => {
                // A close-delimited stream is never complete mid-buffer.
                if buf.len() > max_len {
                    return Err(DecodeError::FrameTooLarge {
                        declared: buf.len(),
                        limit: max_len,
                    });
                }
                Err(DecodeError::Truncated {
                    needed: buf.len() + 1,
                    available: buf.len(),
                })
            }
        }
    }

    fn terminator(&self) -> LineTerminator {
        match *self {
            WireFormat::Line { terminator, .. } | WireFormat::DotBlock { terminator, .. } => {
                terminator
            }
            _ => LineTerminator::Crlf,
        }
    }
}

/// `Framed` codec driving one adapter's wire format.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    format: WireFormat,
}

impl FrameCodec {
    pub fn new(format: WireFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> WireFormat {
        self.format
    }

    /// Switch framing mid-session (used after STARTTLS or mode changes).
    pub fn set_format(&mut self, format: WireFormat) {
        self.format = format;
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = ProbeError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, ProbeError> {
        if src.is_empty() {
            return Ok(None);
        }
        match self.format.decode_frame(src) {
            Ok((frame, consumed)) => {
                src.advance(consumed);
                Ok(Some(frame))
            }
            // Not enough bytes yet; wait for the next read.
            Err(DecodeError::Truncated { .. }) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, ProbeError> {
        if let WireFormat::UntilClose { max_len } = self.format {
            if src.is_empty() {
                return Ok(None);
            }
            if src.len() > max_len {
                return Err(DecodeError::FrameTooLarge {
                    declared: src.len(),
                    limit: max_len,
                }
                .into());
            }
            let text = String::from_utf8_lossy(src).into_owned();
            src.clear();
            let mut lines: Vec<String> = text
                .split('\n')
                .map(|l| l.strip_suffix('\r').unwrap_or(l).to_string())
                .collect();
            if lines.last().is_some_and(String::is_empty) {
                lines.pop();
            }
            return Ok(Some(Frame::TextBlock(lines)));
        }

        if src.is_empty() {
            return Ok(None);
        }
        // EOF with a partial frame buffered: the peer violated its declared
        // length. Surface the typed error instead of a silent partial frame.
        match self.format.decode_frame(src) {
            Ok((frame, consumed)) => {
                src.advance(consumed);
                Ok(Some(frame))
            }
            Err(err) => Err(err.into()),
        }
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = ProbeError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), ProbeError> {
        match frame {
            Frame::TextLine(line) => {
                let mut out = Vec::with_capacity(line.len() + 2);
                text::encode_line(&line, self.format.terminator(), &mut out);
                dst.extend_from_slice(&out);
            }
            Frame::TextBlock(lines) => {
                let mut out = Vec::new();
                text::encode_dot_block(&lines, self.format.terminator(), &mut out);
                dst.extend_from_slice(&out);
            }
            Frame::LengthPrefixed(payload) => match self.format {
                WireFormat::LengthPrefixed(prefix) => prefix.encode(&payload, dst),
                _ => LengthPrefix::u32_be(MAX_STREAM_LEN).encode(&payload, dst),
            },
            Frame::Tlv(msg) => dst.extend_from_slice(&msg.encode()),
            Frame::Ber(el) => el.encode(dst),
            Frame::FixedWidth(bytes) => dst.extend_from_slice(&bytes),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_decoder_waits_for_terminator() {
        let mut codec = FrameCodec::new(WireFormat::crlf_line());
        let mut buf = BytesMut::from(&b"220 "[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"ready\r\nnext");
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(Frame::TextLine("220 ready".into()))
        );
        assert_eq!(&buf[..], b"next");
    }

    #[test]
    fn binary_scenario_exact_and_short() {
        let format = WireFormat::LengthPrefixed(LengthPrefix::u32_be(1024));

        // Exactly 5 payload bytes: one frame, zero leftover.
        let (frame, used) = format
            .decode_frame(&[0, 0, 0, 5, 1, 2, 3, 4, 5])
            .expect("complete frame");
        assert_eq!(used, 9);
        assert_eq!(
            frame,
            Frame::LengthPrefixed(Bytes::from_static(&[1, 2, 3, 4, 5]))
        );

        // Only 4 payload bytes: typed truncation, never a partial frame.
        let err = format.decode_frame(&[0, 0, 0, 5, 1, 2, 3, 4]).unwrap_err();
        assert!(matches!(err, DecodeError::Truncated { .. }));
    }

    #[test]
    fn eof_with_partial_frame_is_an_error() {
        let mut codec = FrameCodec::new(WireFormat::LengthPrefixed(LengthPrefix::u32_be(1024)));
        let mut buf = BytesMut::from(&[0u8, 0, 0, 5, 1, 2][..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert!(codec.decode_eof(&mut buf).is_err());
    }

    #[test]
    fn until_close_yields_one_block_at_eof() {
        let mut codec = FrameCodec::new(WireFormat::UntilClose { max_len: 1024 });
        let mut buf = BytesMut::from(&b"Login: probe\r\nNever logged in.\r\n"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(
            codec.decode_eof(&mut buf).unwrap(),
            Some(Frame::TextBlock(vec![
                "Login: probe".into(),
                "Never logged in.".into()
            ]))
        );
        // Second poll after drain signals stream end.
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
    }

    #[test]
    fn encoder_appends_crlf_to_lines() {
        let mut codec = FrameCodec::new(WireFormat::crlf_line());
        let mut dst = BytesMut::new();
        codec
            .encode(Frame::TextLine("EHLO probe.local".into()), &mut dst)
            .unwrap();
        assert_eq!(&dst[..], b"EHLO probe.local\r\n");
    }
}
