//! # Radio Relay
//!
//! Comm-station loop: listen on the radio and pass every decoded frame to a
//! sink. Empty reads are skipped; malformed frames are logged by the
//! transceiver and dropped.

use std::convert::Infallible;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};

use super::sources::NetworkSink;
use crate::error::Result;
use crate::serial::frame::Inbound;
use crate::serial::SharedTransceiver;

/// Relay radio frames to `sink` until a read or forward fails
///
/// The transceiver lock is held only for one `listen` at a time, so a
/// [`RadioSink`](super::sources::RadioSink) on the same link can interleave
/// sends.
///
/// # Errors
///
/// Invalid UTF-8, port I/O errors (including the port closing) and sink
/// failures end the loop.
pub async fn relay<S, K>(radio: &SharedTransceiver<S>, sink: &K) -> Result<Infallible>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
    K: NetworkSink + ?Sized,
{
    loop {
        let inbound = radio.lock().await.listen().await?;

        match inbound {
            Inbound::Parsed(value) => {
                sink.forward(&value.to_string()).await?;
            }
            Inbound::Malformed(raw) => {
                warn!(target: "station", "Dropping malformed frame ({} bytes)", raw.len());
            }
            Inbound::Empty => {
                debug!(target: "station", "No frame within read timeout");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FieldlinkError;
    use crate::serial::Transceiver;
    use crate::telemetry::sources::{LogSink, MockNetworkSink};
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_relay_forwards_parsed_frames_and_skips_garbage() {
        let mock = Builder::new()
            .read(b"{\"a\":1}\n")
            .read(b"garbage\n")
            .read(b"\n")
            .read(b"{\"b\":2}\n")
            .build();
        let radio = Transceiver::from_stream(mock, "mock").into_shared();

        let mut sink = MockNetworkSink::new();
        let mut seq = mockall::Sequence::new();
        sink.expect_forward()
            .withf(|p: &str| p == "{\"a\":1}")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        sink.expect_forward()
            .withf(|p: &str| p == "{\"b\":2}")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(FieldlinkError::Sink("stop".to_string())));

        let result = relay(&radio, &sink).await;
        assert!(matches!(result, Err(FieldlinkError::Sink(_))));
    }

    #[tokio::test]
    async fn test_relay_stops_on_invalid_utf8() {
        let mock = Builder::new().read(&[0xff, b'\n']).build();
        let radio = Transceiver::from_stream(mock, "mock").into_shared();

        let mut sink = MockNetworkSink::new();
        sink.expect_forward().never();

        let result = relay(&radio, &sink).await;
        assert!(matches!(result, Err(FieldlinkError::Decode(_))));
    }

    #[tokio::test]
    async fn test_relay_stops_when_link_closes() {
        let mock = Builder::new().read(b"{\"a\":1}\n").build();
        let radio = Transceiver::from_stream(mock, "mock").into_shared();

        let mut sink = MockNetworkSink::new();
        sink.expect_forward()
            .withf(|p: &str| p == "{\"a\":1}")
            .times(1)
            .returning(|_| Ok(()));

        match relay(&radio, &sink).await {
            Err(FieldlinkError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof),
            other => panic!("Expected UnexpectedEof, got: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_relay_on_dropped_peer_fails_without_spinning() {
        let (near, far) = tokio::io::duplex(64);
        drop(far);
        let radio = Transceiver::from_stream(near, "mock").into_shared();

        let result = tokio::time::timeout(std::time::Duration::from_millis(200), relay(&radio, &LogSink)).await;
        assert!(matches!(result, Ok(Err(FieldlinkError::Io(_)))));
    }
}
