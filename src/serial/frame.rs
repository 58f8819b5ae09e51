//! # Line Frames
//!
//! Wire format of the radio link: one compact JSON value per line, UTF-8,
//! terminated by `\n`. Link parameters are fixed at 9600 baud, 8N1.

use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::error;

use crate::error::{FieldlinkError, Result};

/// Frame delimiter
pub const FRAME_DELIMITER: u8 = b'\n';

/// Placeholder handed to legacy callers for empty or unparseable frames
pub const ERROR_SENTINEL: &str = "Error: Check logs";

/// Serial link parameters
///
/// Constant for the lifetime of a transceiver. A compatible peer must use
/// the same settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkConfig {
    pub baud_rate: u32,
    pub data_bits: tokio_serial::DataBits,
    pub parity: tokio_serial::Parity,
    pub stop_bits: tokio_serial::StopBits,
    pub read_timeout: Duration,
}

impl LinkConfig {
    /// 9600 baud, 8 data bits, no parity, 1 stop bit, 1 s read timeout
    pub const RADIO: LinkConfig = LinkConfig {
        baud_rate: 9600,
        data_bits: tokio_serial::DataBits::Eight,
        parity: tokio_serial::Parity::None,
        stop_bits: tokio_serial::StopBits::One,
        read_timeout: Duration::from_secs(1),
    };
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self::RADIO
    }
}

/// One received frame, tagged by how decoding went
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Nothing arrived before the read timeout
    Empty,
    /// Text arrived but was not valid JSON (raw text kept, delimiter stripped)
    Malformed(String),
    /// A decoded JSON value
    Parsed(Value),
}

impl Inbound {
    /// Collapse to the single-value form older consumers expect
    ///
    /// Parsed frames yield their value; empty and malformed frames both
    /// yield the [`ERROR_SENTINEL`] string.
    ///
    /// # Examples
    ///
    /// ```
    /// use fieldlink::serial::frame::{Inbound, ERROR_SENTINEL};
    /// use serde_json::json;
    ///
    /// assert_eq!(Inbound::Parsed(json!({"x": 1})).into_legacy(), json!({"x": 1}));
    /// assert_eq!(Inbound::Empty.into_legacy(), json!(ERROR_SENTINEL));
    /// ```
    pub fn into_legacy(self) -> Value {
        match self {
            Inbound::Parsed(value) => value,
            Inbound::Empty | Inbound::Malformed(_) => Value::String(ERROR_SENTINEL.to_string()),
        }
    }
}

/// Encode a payload as a complete frame (compact JSON + delimiter)
///
/// # Errors
///
/// Returns `Serialize` if the payload cannot be rendered as JSON
/// (e.g. a map with non-string keys).
pub fn encode_frame<T: Serialize + ?Sized>(payload: &T) -> Result<Vec<u8>> {
    let text = serde_json::to_string(payload)?;
    frame_line(&text)
}

/// Wrap already-serialized text as a frame
///
/// # Errors
///
/// Returns `InvalidFrame` if `text` contains a line break, which would
/// split it into two frames on the wire.
pub fn frame_line(text: &str) -> Result<Vec<u8>> {
    if text.bytes().any(|b| b == FRAME_DELIMITER || b == b'\r') {
        return Err(FieldlinkError::InvalidFrame(
            "payload contains a line break".to_string(),
        ));
    }

    let mut frame = Vec::with_capacity(text.len() + 1);
    frame.extend_from_slice(text.as_bytes());
    frame.push(FRAME_DELIMITER);
    Ok(frame)
}

/// Decode raw line bytes into an [`Inbound`]
///
/// Parse failures are logged and reported as `Malformed`; they never
/// surface as errors.
///
/// # Errors
///
/// Returns `Decode` if the bytes are not valid UTF-8.
pub fn decode_line(bytes: Vec<u8>) -> Result<Inbound> {
    let text = String::from_utf8(bytes)?;
    let trimmed = text.trim_end_matches(['\r', '\n']);

    if trimmed.is_empty() {
        return Ok(Inbound::Empty);
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => Ok(Inbound::Parsed(value)),
        Err(e) => {
            error!(target: "transceiver", "Failed to parse frame {:?}: {}", trimmed, e);
            Ok(Inbound::Malformed(trimmed.to_string()))
        }
    }
}
