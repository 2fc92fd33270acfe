//! FramedChannel - one TCP socket to the Blender addon.
//!
//! The protocol has no length prefix and no delimiter. A response ends when
//! the bytes received so far parse as one complete JSON document, so the
//! receive loop re-parses the whole buffer after every chunk.
//!
//! Each recv call gets its own deadline. When a deadline passes, whatever is
//! buffered is parsed one last time; leftover bytes that still do not parse
//! are reported as [`BridgeError::Framing`], distinct from a timeout with
//! nothing received at all.
//!
//! Any failed send or receive drops the socket, so the next call connects again.

use std::time::Duration;

use kilnconf::BlenderConfig;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::command::CommandFrame;
use crate::error::{BridgeError, Result};

pub const DEFAULT_RECV_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

#[derive(Debug)]
pub struct FramedChannel {
    host: String,
    port: u16,
    /// Either absent or a connected socket; never half-initialized.
    stream: Option<TcpStream>,
    recv_timeout: Duration,
    chunk_size: usize,
}

impl FramedChannel {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            stream: None,
            recv_timeout: DEFAULT_RECV_TIMEOUT,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn from_config(config: &BlenderConfig) -> Self {
        Self::new(config.host.clone(), config.port)
            .with_recv_timeout(config.recv_timeout())
            .with_chunk_size(config.recv_chunk_size)
    }

    pub fn with_recv_timeout(mut self, recv_timeout: Duration) -> Self {
        self.recv_timeout = recv_timeout;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Connect if not already connected. Returns whether a socket is held.
    pub async fn connect(&mut self) -> bool {
        if self.stream.is_some() {
            return true;
        }

        let attempt = timeout(
            self.recv_timeout,
            TcpStream::connect((self.host.as_str(), self.port)),
        )
        .await;

        match attempt {
            Ok(Ok(stream)) => {
                info!(address = %self.address(), "Connected to Blender");
                self.stream = Some(stream);
                true
            }
            Ok(Err(e)) => {
                error!(address = %self.address(), error = %e, "Failed to connect to Blender");
                false
            }
            Err(_) => {
                error!(address = %self.address(), "Timed out connecting to Blender");
                false
            }
        }
    }

    /// Close the socket if one is held. Close errors are logged and dropped.
    pub async fn disconnect(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                warn!(error = %e, "Error disconnecting from Blender");
            }
        }
    }

    /// Send one frame and return the raw bytes of the complete response.
    #[tracing::instrument(
        name = "blender.send",
        skip(self, frame),
        fields(command.type = %frame.command_type, bytes = tracing::field::Empty)
    )]
    pub async fn send(&mut self, frame: &CommandFrame) -> Result<Vec<u8>> {
        let payload = frame.to_bytes()?;

        if !self.connect().await {
            return Err(BridgeError::Connection("Not connected to Blender".to_string()));
        }

        // The socket is out of `self` while a request is in flight. If this
        // future is dropped mid-response, the half-read socket goes with it.
        let Some(mut stream) = self.stream.take() else {
            return Err(BridgeError::Connection("Not connected to Blender".to_string()));
        };

        let result = round_trip(&mut stream, &payload, self.recv_timeout, self.chunk_size).await;
        match &result {
            Ok(bytes) => {
                tracing::Span::current().record("bytes", bytes.len());
                self.stream = Some(stream);
            }
            Err(e) => {
                error!(error = %e, "Blender round trip failed, dropping socket");
            }
        }
        result
    }
}

async fn round_trip(
    stream: &mut TcpStream,
    payload: &[u8],
    recv_timeout: Duration,
    chunk_size: usize,
) -> Result<Vec<u8>> {
    match timeout(recv_timeout, stream.write_all(payload)).await {
        Err(_) => return Err(BridgeError::Timeout),
        Ok(Err(e)) => return Err(BridgeError::connection_lost(e)),
        Ok(Ok(())) => {}
    }
    debug!(bytes = payload.len(), "Command sent, waiting for response");

    receive_frame(stream, recv_timeout, chunk_size).await
}

/// Read until the buffer holds one complete JSON document.
pub(crate) async fn receive_frame<R>(
    reader: &mut R,
    recv_timeout: Duration,
    chunk_size: usize,
) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = Vec::new();
    let mut chunk = vec![0u8; chunk_size.max(1)];

    loop {
        match timeout(recv_timeout, reader.read(&mut chunk)).await {
            Err(_) => {
                warn!(buffered = buffer.len(), "Socket timeout during chunked receive");
                break;
            }
            Ok(Err(e)) => {
                error!(error = %e, "Socket connection error during receive");
                return Err(BridgeError::connection_lost(e));
            }
            Ok(Ok(0)) => {
                if buffer.is_empty() {
                    return Err(BridgeError::Connection(
                        "Connection closed before receiving any data".to_string(),
                    ));
                }
                debug!(buffered = buffer.len(), "Peer closed mid-response");
                break;
            }
            Ok(Ok(n)) => {
                buffer.extend_from_slice(&chunk[..n]);
                if is_complete_json(&buffer) {
                    info!(bytes = buffer.len(), "Received complete response");
                    return Ok(buffer);
                }
            }
        }
    }

    if buffer.is_empty() {
        return Err(BridgeError::Timeout);
    }
    if is_complete_json(&buffer) {
        return Ok(buffer);
    }
    Err(BridgeError::Framing {
        received: buffer.len(),
    })
}

fn is_complete_json(bytes: &[u8]) -> bool {
    serde_json::from_slice::<serde::de::IgnoredAny>(bytes).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncWriteExt, DuplexStream};
    use tokio::net::TcpListener;

    const RESPONSE: &[u8] =
        br#"{"status": "success", "result": {"name": "Cube", "location": [0.5, -2.25, 3.0], "materials": ["Red", "Blue"]}}"#;

    async fn feed(mut peer: DuplexStream, chunks: Vec<Vec<u8>>, gap: Duration, close: bool) {
        for chunk in chunks {
            peer.write_all(&chunk).await.unwrap();
            tokio::time::sleep(gap).await;
        }
        if !close {
            // Hold the write half open so the reader hits its deadline instead of EOF
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
    }

    fn split(bytes: &[u8], pieces: usize) -> Vec<Vec<u8>> {
        let size = bytes.len().div_ceil(pieces);
        bytes.chunks(size).map(|c| c.to_vec()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn fragmented_response_equals_whole() {
        for pieces in [1, 2, 5, 17, RESPONSE.len()] {
            let (mut reader, peer) = duplex(4096);
            tokio::spawn(feed(peer, split(RESPONSE, pieces), Duration::from_millis(5), false));

            let bytes = receive_frame(&mut reader, Duration::from_secs(15), 16).await.unwrap();
            assert_eq!(bytes, RESPONSE, "pieces = {}", pieces);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn close_before_any_data_is_connection_error() {
        let (mut reader, peer) = duplex(64);
        drop(peer);

        let err = receive_frame(&mut reader, Duration::from_secs(15), 64).await.unwrap_err();
        assert!(matches!(err, BridgeError::Connection(_)), "{:?}", err);
    }

    #[tokio::test(start_paused = true)]
    async fn close_after_partial_data_is_framing_error() {
        let (mut reader, peer) = duplex(4096);
        tokio::spawn(feed(peer, vec![RESPONSE[..20].to_vec()], Duration::ZERO, true));

        let err = receive_frame(&mut reader, Duration::from_secs(15), 64).await.unwrap_err();
        assert!(matches!(err, BridgeError::Framing { received: 20 }), "{:?}", err);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_with_nothing_buffered_is_timeout() {
        let (mut reader, _peer) = duplex(64);

        let err = receive_frame(&mut reader, Duration::from_secs(15), 64).await.unwrap_err();
        assert!(matches!(err, BridgeError::Timeout));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_with_partial_data_is_framing_error() {
        let (mut reader, peer) = duplex(4096);
        tokio::spawn(feed(peer, vec![RESPONSE[..40].to_vec()], Duration::ZERO, false));

        let err = receive_frame(&mut reader, Duration::from_secs(15), 64).await.unwrap_err();
        assert!(matches!(err, BridgeError::Framing { received: 40 }), "{:?}", err);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_is_per_recv_not_per_response() {
        // Five chunks 10s apart: 40s in total, each gap under the 15s deadline
        let (mut reader, peer) = duplex(4096);
        tokio::spawn(feed(peer, split(RESPONSE, 5), Duration::from_secs(10), false));

        let bytes = receive_frame(&mut reader, Duration::from_secs(15), 4096).await.unwrap();
        assert_eq!(bytes, RESPONSE);
    }

    #[tokio::test]
    async fn connect_is_idempotent_and_send_round_trips() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = receive_frame(&mut socket, Duration::from_secs(5), 256).await.unwrap();
            let frame: CommandFrame = serde_json::from_slice(&request).unwrap();
            assert_eq!(frame.command_type, "get_scene_info");
            socket.write_all(RESPONSE).await.unwrap();
            // Keep the socket open until the client is done
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let mut channel = FramedChannel::new("127.0.0.1", port);
        assert!(channel.connect().await);
        assert!(channel.connect().await);

        let frame = CommandFrame::new("get_scene_info", Default::default());
        let bytes = channel.send(&frame).await.unwrap();
        assert_eq!(bytes, RESPONSE);
        assert!(channel.is_connected());

        channel.disconnect().await;
        channel.disconnect().await;
        assert!(!channel.is_connected());
    }

    #[tokio::test]
    async fn failed_receive_drops_the_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
        });

        let mut channel = FramedChannel::new("127.0.0.1", port);
        let frame = CommandFrame::new("get_scene_info", Default::default());
        let err = channel.send(&frame).await.unwrap_err();

        assert!(err.is_transport(), "{:?}", err);
        assert!(!channel.is_connected());
    }

    #[tokio::test]
    async fn connect_to_closed_port_fails_cleanly() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let mut channel = FramedChannel::new("127.0.0.1", port);
        assert!(!channel.connect().await);
        assert!(!channel.is_connected());
    }
}
