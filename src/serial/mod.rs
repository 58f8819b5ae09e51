//! # Serial Communication Module
//!
//! Handles the line-framed JSON link to the USB radio.
//!
//! This module handles:
//! - Discovering the radio's device node from USB descriptors
//! - Opening the port at 9600 baud, 8N1
//! - Sending one JSON frame per line
//! - Receiving frames with a 1 second read timeout

pub mod discovery;
pub mod frame;

use serde::Serialize;
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info};

use crate::error::{FieldlinkError, Result};
use discovery::{PortEnumerator, SerialDescriptorFilter};
use frame::{decode_line, encode_frame, frame_line, Inbound, LinkConfig, FRAME_DELIMITER};

/// A transceiver shared between a poller and a listener
///
/// Both directions go through the same port handle, so concurrent use must
/// hold the lock for the whole send or listen.
pub type SharedTransceiver<S = tokio_serial::SerialStream> = Arc<Mutex<Transceiver<S>>>;

/// Radio Transceiver
///
/// Owns the open serial stream for its whole lifetime. The port is closed
/// when the transceiver is dropped.
pub struct Transceiver<S = tokio_serial::SerialStream> {
    /// Buffered stream (writes pass straight through)
    port: BufReader<S>,
    /// Device path (e.g., /dev/ttyUSB0)
    device_path: String,
    link: LinkConfig,
}

impl<S> std::fmt::Debug for Transceiver<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transceiver")
            .field("device_path", &self.device_path)
            .field("link", &self.link)
            .finish_non_exhaustive()
    }
}

impl Transceiver<tokio_serial::SerialStream> {
    /// Open the radio link
    ///
    /// Uses `explicit` when it is a non-empty path, otherwise resolves a
    /// device through `filter`.
    ///
    /// # Arguments
    ///
    /// * `explicit` - Configured device path (may be empty)
    /// * `filter` - Descriptor filter used when no path is configured
    /// * `enumerator` - Source of candidate devices
    ///
    /// # Errors
    ///
    /// - `EmptyPort`: no path could be determined; no open is attempted
    /// - `Enumeration`: device listing failed
    /// - `LinkOpen`: the device exists but could not be opened
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use fieldlink::serial::Transceiver;
    /// use fieldlink::serial::discovery::{SerialDescriptorFilter, SystemPorts};
    ///
    /// # async fn run() -> fieldlink::error::Result<()> {
    /// let filter = SerialDescriptorFilter::default().with_manufacturer_prefix("FTDI");
    /// let mut radio = Transceiver::open(None, &filter, &SystemPorts)?;
    /// radio.send(&serde_json::json!({"hello": "base"})).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn open(
        explicit: Option<&str>,
        filter: &SerialDescriptorFilter,
        enumerator: &dyn PortEnumerator,
    ) -> Result<Self> {
        let path = discovery::determine_path(explicit, filter, enumerator)?;
        Self::open_path(&path)
    }

    /// Open a specific device path with the radio link settings
    ///
    /// # Errors
    ///
    /// Returns `EmptyPort` for an empty path and `LinkOpen` if the device
    /// cannot be opened.
    pub fn open_path(path: &str) -> Result<Self> {
        if path.is_empty() {
            return Err(FieldlinkError::EmptyPort);
        }

        let link = LinkConfig::RADIO;
        info!(target: "transceiver", "Opening serial on: {}", path);

        let port = tokio_serial::new(path, link.baud_rate)
            .data_bits(link.data_bits)
            .parity(link.parity)
            .stop_bits(link.stop_bits)
            .flow_control(tokio_serial::FlowControl::None)
            .timeout(link.read_timeout)
            .open_native_async()
            .map_err(|e| FieldlinkError::LinkOpen {
                path: path.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self::from_stream(port, path))
    }
}

impl<S> Transceiver<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap an already-open stream
    ///
    /// # Arguments
    ///
    /// * `stream` - Any async byte stream (serial port, pipe, test mock)
    /// * `device_path` - Path reported in logs and by [`Self::device_path`]
    pub fn from_stream(stream: S, device_path: impl Into<String>) -> Self {
        Self {
            port: BufReader::new(stream),
            device_path: device_path.into(),
            link: LinkConfig::RADIO,
        }
    }

    /// Serialize `payload` and send it as one frame
    ///
    /// # Errors
    ///
    /// - `Serialize`: payload is not representable as JSON
    /// - `ShortWrite` / `Write`: the port did not accept the whole frame
    pub async fn send<T: Serialize + ?Sized>(&mut self, payload: &T) -> Result<()> {
        let frame = encode_frame(payload)?;
        self.write_frame(&frame).await
    }

    /// Send already-serialized JSON text as one frame
    ///
    /// # Errors
    ///
    /// Returns `InvalidFrame` if `text` spans more than one line, plus the
    /// write errors of [`Self::send`].
    pub async fn send_line(&mut self, text: &str) -> Result<()> {
        let frame = frame_line(text)?;
        self.write_frame(&frame).await
    }

    /// Write a complete frame in a single write call
    async fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        info!(target: "transceiver", "sending");

        let written = self
            .port
            .write(frame)
            .await
            .map_err(|e| FieldlinkError::Write(format!("Failed to write frame: {}", e)))?;

        if written != frame.len() {
            return Err(FieldlinkError::ShortWrite {
                written,
                expected: frame.len(),
            });
        }

        self.port
            .flush()
            .await
            .map_err(|e| FieldlinkError::Write(format!("Failed to flush serial port: {}", e)))?;

        let text = String::from_utf8_lossy(&frame[..frame.len() - 1]);
        info!(target: "transceiver", "{}", text);
        Ok(())
    }

    /// Read one frame
    ///
    /// Waits up to the link's read timeout. Whatever arrived by then (a
    /// whole line, a partial line, or nothing) is decoded.
    ///
    /// # Returns
    ///
    /// * `Inbound::Parsed` - a JSON value
    /// * `Inbound::Malformed` - text that was not JSON (logged at error level)
    /// * `Inbound::Empty` - no bytes before the timeout
    ///
    /// # Errors
    ///
    /// - `Decode`: the bytes are not UTF-8
    /// - `Io`: the port read failed, or the port closed (`UnexpectedEof`)
    pub async fn listen(&mut self) -> Result<Inbound> {
        let mut line = Vec::new();
        let read = tokio::time::timeout(
            self.link.read_timeout,
            self.port.read_until(FRAME_DELIMITER, &mut line),
        )
        .await;

        match read {
            Ok(result) => {
                if result? == 0 {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("{} closed", self.device_path),
                    )
                    .into());
                }
            }
            Err(_) => {
                // Bytes read before the deadline stay in `line`
                debug!(target: "transceiver", "Read timeout with {} bytes pending", line.len());
            }
        }

        let inbound = decode_line(line)?;
        if let Inbound::Parsed(value) = &inbound {
            info!(target: "transceiver", "{}", value);
        }
        Ok(inbound)
    }

    /// Read one frame, collapsing empty and malformed frames to the sentinel
    ///
    /// Never fails on bad JSON. Invalid UTF-8 and I/O errors still
    /// propagate.
    pub async fn listen_legacy(&mut self) -> Result<serde_json::Value> {
        Ok(self.listen().await?.into_legacy())
    }

    /// Get the device path of the opened serial port
    ///
    /// # Returns
    ///
    /// * `&str` - Reference to the device path string
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Link parameters in use
    pub fn link(&self) -> LinkConfig {
        self.link
    }

    /// Move into a lock for use by several tasks
    pub fn into_shared(self) -> SharedTransceiver<S> {
        Arc::new(Mutex::new(self))
    }
}
