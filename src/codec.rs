//! Payload codec
//!
//! Free-form text (names, chat content, error messages) travels inside
//! frames as standard padded base64, so it can never collide with the
//! `:` and `,` separators or the newline terminator.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

/// Failure to turn a wire token back into text
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Token is not well-formed base64
    #[error("invalid base64 token: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Token decodes to bytes that are not UTF-8
    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Encode arbitrary bytes into a transport-safe token.
///
/// Total and deterministic; the empty input encodes to the empty token.
pub fn encode(payload: impl AsRef<[u8]>) -> String {
    STANDARD.encode(payload)
}

/// Decode a token into raw bytes.
pub fn decode_bytes(token: &str) -> Result<Vec<u8>, DecodeError> {
    Ok(STANDARD.decode(token)?)
}

/// Decode a token into text.
pub fn decode(token: &str) -> Result<String, DecodeError> {
    Ok(String::from_utf8(decode_bytes(token)?)?)
}
