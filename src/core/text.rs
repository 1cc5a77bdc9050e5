//! Line-oriented text framing.
//!
//! Covers the three shapes text protocols use on the wire: single lines to a
//! CRLF or LF terminator, and dot-terminated multiline blocks with
//! leading-dot stuffing (POP3/SMTP payload style). Decoded text is converted
//! lossily; diagnostic probes report what a server sent rather than rejecting
//! a banner over a stray Latin-1 octet.

use crate::error::DecodeError;

/// Line terminator convention of a text protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineTerminator {
    /// Strict `\r\n`.
    Crlf,
    /// Bare `\n`.
    Lf,
    /// `\n`, tolerating an optional preceding `\r`.
    CrlfOrLf,
}

/// Decode one line. Returns the line (terminator stripped) and bytes consumed.
///
/// `Truncated` means no terminator arrived yet; `FrameTooLarge` means the
/// line already exceeds `max_len` without terminating.
pub fn decode_line(
    buf: &[u8],
    terminator: LineTerminator,
    max_len: usize,
) -> Result<(String, usize), DecodeError> {
    let newline = buf.iter().position(|&b| b == b'\n');

    let Some(nl) = newline else {
        if buf.len() > max_len {
            return Err(DecodeError::FrameTooLarge {
                declared: buf.len(),
                limit: max_len,
            });
        }
        return Err(DecodeError::Truncated {
            needed: buf.len() + 1,
            available: buf.len(),
        });
    };

    if nl > max_len {
        return Err(DecodeError::FrameTooLarge {
            declared: nl,
            limit: max_len,
        });
    }

    let has_cr = nl > 0 && buf[nl - 1] == b'\r';
    match terminator {
        LineTerminator::Crlf if !has_cr => {
            return Err(DecodeError::Malformed {
                offset: nl,
                detail: "bare LF where CRLF terminator required",
            });
        }
        LineTerminator::Lf if has_cr => {
            return Err(DecodeError::Malformed {
                offset: nl - 1,
                detail: "CR before LF where bare LF terminator required",
            });
        }
        _ => {}
    }

    let body_end = if has_cr { nl - 1 } else { nl };
    let line = String::from_utf8_lossy(&buf[..body_end]).into_owned();
    Ok((line, nl + 1))
}

/// Decode a dot-terminated multiline block, unstuffing `..`-prefixed lines.
///
/// Returns the content lines (terminator line excluded) and bytes consumed.
pub fn decode_dot_block(
    buf: &[u8],
    terminator: LineTerminator,
    max_len: usize,
) -> Result<(Vec<String>, usize), DecodeError> {
    let mut lines = Vec::new();
    let mut pos = 0usize;

    loop {
        let (line, used) = decode_line(&buf[pos..], terminator, max_len).map_err(bump(pos))?;
        pos += used;

        if line == "." {
            return Ok((lines, pos));
        }
        if pos > max_len {
            return Err(DecodeError::FrameTooLarge {
                declared: pos,
                limit: max_len,
            });
        }

        lines.push(match line.strip_prefix("..") {
            Some(rest) => format!(".{rest}"),
            None => line,
        });
    }
}

/// Shift decode-error offsets by the bytes already consumed.
fn bump(by: usize) -> impl Fn(DecodeError) -> DecodeError {
    move |err| match err {
        DecodeError::Truncated { needed, available } => DecodeError::Truncated {
            needed: needed + by,
            available: available + by,
        },
        DecodeError::Malformed { offset, detail } => DecodeError::Malformed {
            offset: offset + by,
            detail,
        },
        other => other,
    }
}

/// Encode one line with the given terminator.
pub fn encode_line(line: &str, terminator: LineTerminator, out: &mut Vec<u8>) {
    out.extend_from_slice(line.as_bytes());
    match terminator {
        LineTerminator::Lf => out.push(b'\n'),
        LineTerminator::Crlf | LineTerminator::CrlfOrLf => out.extend_from_slice(b"\r\n"),
    }
}

/// Encode a multiline block with dot stuffing and the terminating dot line.
pub fn encode_dot_block(lines: &[String], terminator: LineTerminator, out: &mut Vec<u8>) {
    for line in lines {
        if line.starts_with('.') {
            out.push(b'.');
        }
        encode_line(line, terminator, out);
    }
    encode_line(".", terminator, out);
}
