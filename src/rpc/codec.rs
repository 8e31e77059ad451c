//! NDJSON framing and message (de)serialisation for the droid stream.
//!
//! [`LineCodec`] wraps [`tokio_util::codec::LinesCodec`] with a fixed maximum
//! line length so an unterminated or maliciously large line from a
//! misbehaving agent cannot exhaust memory.  [`decode`] turns one framed line
//! into a typed [`Message`]; malformed or unrecognised lines yield `None`
//! rather than an error, since partial and garbage lines are expected while
//! the agent process starts up or shuts down.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, LinesCodec, LinesCodecError};
use tracing::debug;

use crate::rpc::wire::{Message, Notification, Request, Response};
use crate::{AppError, Result};

/// Maximum inbound line length accepted by the codec: 1 MiB.
pub const MAX_LINE_BYTES: usize = 1_048_576;

/// Line-framing codec for the agent's stdout stream.
///
/// Delegates to [`LinesCodec`] with the fixed [`MAX_LINE_BYTES`] limit.
/// Over-long lines surface as [`AppError::Codec`]; the transport skips them
/// without tearing the stream down.
#[derive(Debug)]
pub struct LineCodec(LinesCodec);

impl LineCodec {
    /// Create a codec with the default [`MAX_LINE_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self(LinesCodec::new_with_max_length(MAX_LINE_BYTES))
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        self.0.decode(src).map_err(map_codec_error)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        self.0.decode_eof(src).map_err(map_codec_error)
    }
}

/// Serialise an outbound request to a single text line (no trailing newline).
///
/// Compact JSON never contains embedded newlines, so the result is always a
/// valid NDJSON payload.
///
/// # Errors
///
/// Returns [`AppError::Codec`] if serialisation fails.  This cannot happen
/// for well-formed requests and indicates an internal invariant violation,
/// not a recoverable condition.
pub fn encode(request: &Request) -> Result<String> {
    serde_json::to_string(request)
        .map_err(|e| AppError::Codec(format!("failed to serialise outbound request: {e}")))
}

/// Parse one inbound line into a typed [`Message`].
///
/// Returns `None` for blank lines, non-JSON lines, lines missing the `type`
/// discriminator, unknown discriminator values, and envelopes whose fields do
/// not match the expected shape.  None of these conditions is an error; they
/// are logged at `DEBUG` and skipped.
#[must_use]
pub fn decode(line: &str) -> Option<Message> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    let value: serde_json::Value = match serde_json::from_str(trimmed) {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, "codec: non-JSON line, skipping");
            return None;
        }
    };

    match value.get("type").and_then(serde_json::Value::as_str) {
        Some("response") => match serde_json::from_value::<Response>(value) {
            Ok(response) => Some(Message::Response(response)),
            Err(e) => {
                debug!(error = %e, "codec: malformed response envelope, skipping");
                None
            }
        },
        Some("notification") => match serde_json::from_value::<Notification>(value) {
            Ok(notification) => Some(Message::Notification(notification)),
            Err(e) => {
                debug!(error = %e, "codec: malformed notification envelope, skipping");
                None
            }
        },
        Some(other) => {
            debug!(discriminator = other, "codec: unknown message type, skipping");
            None
        }
        None => {
            debug!("codec: line missing `type` discriminator, skipping");
            None
        }
    }
}

// ── Private helper ────────────────────────────────────────────────────────────

/// Map a [`LinesCodecError`] to an [`AppError`].
fn map_codec_error(e: LinesCodecError) -> AppError {
    match e {
        LinesCodecError::MaxLineLengthExceeded => {
            AppError::Codec(format!("line too long: exceeded {MAX_LINE_BYTES} bytes"))
        }
        LinesCodecError::Io(io_err) => AppError::Io(io_err.to_string()),
    }
}
