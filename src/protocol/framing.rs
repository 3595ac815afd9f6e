//! Message framing for the line-based wire protocol.
//!
//! A request frame is ASCII text terminated by CRLF, at most 128 bytes and at
//! most 7 whitespace-separated tokens (verb plus up to 6 arguments). Frame
//! checks run in a fixed order before any tokenizing so that a malformed
//! frame is rejected with the most specific framing code.

use crate::protocol::codes::Code;

/// Frames at or above this length are rejected as unparseable.
pub const MAX_FRAME_LEN: usize = 128;

/// Maximum number of tokens in one frame (command verb + 6 arguments).
pub const MAX_TOKENS: usize = 7;

/// Validate a raw frame (terminator included) and split it into tokens.
///
/// Check order: too short, too long, terminator, empty, too many tokens.
pub fn frame(raw: &[u8]) -> Result<Vec<String>, Code> {
    if raw.len() <= 2 {
        return Err(Code::TooShort);
    }
    if raw.len() >= MAX_FRAME_LEN {
        return Err(Code::TooLong);
    }
    if !raw.ends_with(b"\r\n") {
        return Err(Code::BadTerminator);
    }

    // Lossy conversion: a token with mangled bytes simply fails to resolve
    // or validate downstream.
    let body = String::from_utf8_lossy(&raw[..raw.len() - 2]);
    let tokens: Vec<String> = body.split_whitespace().map(str::to_string).collect();

    if tokens.is_empty() {
        return Err(Code::NoCommand);
    }
    if tokens.len() > MAX_TOKENS {
        return Err(Code::TooManyTokens);
    }
    Ok(tokens)
}
