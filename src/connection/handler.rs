//! Connection Handler Module
//!
//! This module handles individual server connections to the agent.
//! A passive check connection carries exactly one request and one response.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Server connects (TCP handshake)
//!        │
//!        ▼
//! 2. Peer checked against the allow list ── rejected ──> close
//!        │
//!        ▼
//! 3. Read one request (framed or unframed, bounded by request_timeout)
//!        │
//!        ▼
//! 4. PassiveCheckHandler serves it and writes one framed response
//!        │
//!        ▼
//! 5. Connection shut down, handler task ends
//! ```
//!
//! ## Buffer Management
//!
//! We use a BytesMut buffer to accumulate incoming data. TCP is a stream
//! protocol, so a request may arrive split over several reads.

use crate::passive::PassiveCheckHandler;
use crate::protocol::{encode_frame, Dialect, FrameDecoder, FrameError};
use async_trait::async_trait;
use bytes::{Buf, Bytes, BytesMut};
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{debug, trace, warn};

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 1024;

/// Default time allowed for a server to send its request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

/// Byte-level access to the connection a request arrived on.
#[async_trait]
pub trait ConnectionHandle: Send {
    /// Writes one complete response.
    async fn write(&mut self, data: &[u8]) -> io::Result<()>;

    /// Address of the connected server.
    fn peer_addr(&self) -> SocketAddr;
}

/// Per-connection settings.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Time allowed for the whole request to arrive
    pub request_timeout: Duration,

    /// Largest request payload accepted
    pub max_request_size: usize,

    /// Peers allowed to connect; empty allows everyone
    pub allowed_peers: Vec<IpAddr>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_request_size: crate::protocol::frame::MAX_REQUEST_SIZE,
            allowed_peers: Vec::new(),
        }
    }
}

impl ConnectionConfig {
    /// Returns true if `ip` may send passive check requests.
    pub fn allows(&self, ip: IpAddr) -> bool {
        if self.allowed_peers.is_empty() {
            return true;
        }
        let ip = canonical(ip);
        self.allowed_peers.iter().any(|&allowed| canonical(allowed) == ip)
    }
}

/// Maps IPv4-mapped IPv6 addresses to plain IPv4.
fn canonical(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(ip),
        IpAddr::V4(_) => ip,
    }
}

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Connections dropped by the allow list
    pub connections_rejected: AtomicU64,
    /// Requests served in the structured dialect
    pub structured_requests: AtomicU64,
    /// Requests served in the legacy dialect
    pub legacy_requests: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn connection_rejected(&self) {
        self.connections_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_served(&self, dialect: Dialect) {
        let counter = match dialect {
            Dialect::Structured => &self.structured_requests,
            Dialect::Legacy => &self.legacy_requests,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Total requests served in either dialect.
    pub fn requests_served(&self) -> u64 {
        self.structured_requests.load(Ordering::Relaxed)
            + self.legacy_requests.load(Ordering::Relaxed)
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// A single passive check connection.
///
/// Reads one request from the stream and frames every response written
/// through [`ConnectionHandle::write`].
pub struct PassiveConnection<S> {
    /// The underlying stream
    stream: BufWriter<S>,

    /// Server's address (for logging)
    addr: SocketAddr,

    /// Buffer for incoming data
    buffer: BytesMut,

    /// Request decoder
    decoder: FrameDecoder,

    /// Time allowed for the request to arrive
    request_timeout: Duration,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,
}

impl<S> PassiveConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Creates a new connection wrapper.
    ///
    /// # Arguments
    ///
    /// * `stream` - The stream for this connection
    /// * `addr` - The server's socket address
    /// * `config` - Per-connection settings
    /// * `stats` - Shared connection statistics
    pub fn new(
        stream: S,
        addr: SocketAddr,
        config: &ConnectionConfig,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.connection_opened();

        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            decoder: FrameDecoder::new(config.max_request_size),
            request_timeout: config.request_timeout,
            stats,
        }
    }

    /// Serves the connection's single request.
    pub async fn run(
        mut self,
        handler: &PassiveCheckHandler,
    ) -> Result<Dialect, ConnectionError> {
        debug!(peer = %self.addr, "Server connected");

        let result = self.serve(handler).await;

        match &result {
            Ok(dialect) => debug!(peer = %self.addr, dialect = %dialect, "Request served"),
            Err(e) => match e {
                ConnectionError::ClientDisconnected => {
                    debug!(peer = %self.addr, "Server disconnected before sending a request")
                }
                ConnectionError::IoError(io_err)
                    if io_err.kind() == io::ErrorKind::ConnectionReset =>
                {
                    debug!(peer = %self.addr, "Connection reset by server")
                }
                _ => warn!(peer = %self.addr, error = %e, "Connection error"),
            },
        }

        self.stats.connection_closed();
        result
    }

    async fn serve(&mut self, handler: &PassiveCheckHandler) -> Result<Dialect, ConnectionError> {
        let request = match tokio::time::timeout(self.request_timeout, self.read_request()).await {
            Ok(request) => request?,
            Err(_) => return Err(ConnectionError::ReadTimeout(self.request_timeout)),
        };
        trace!(peer = %self.addr, bytes = request.len(), "Received request");

        let dialect = handler.handle(&mut *self, &request).await;
        self.stats.request_served(dialect);

        self.stream.shutdown().await?;
        Ok(dialect)
    }

    /// Reads until one complete request is buffered.
    pub async fn read_request(&mut self) -> Result<Bytes, ConnectionError> {
        loop {
            if let Some((payload, consumed)) = self.decoder.decode(&self.buffer, false)? {
                self.buffer.advance(consumed);
                return Ok(payload);
            }

            if self.buffer.capacity() - self.buffer.len() < 512 {
                self.buffer.reserve(INITIAL_BUFFER_SIZE);
            }

            let n = self.stream.get_mut().read_buf(&mut self.buffer).await?;

            if n == 0 {
                // Connection closed by server
                if self.buffer.is_empty() {
                    return Err(ConnectionError::ClientDisconnected);
                }
                return match self.decoder.decode(&self.buffer, true)? {
                    Some((payload, consumed)) => {
                        self.buffer.advance(consumed);
                        Ok(payload)
                    }
                    None => Err(ConnectionError::UnexpectedEof),
                };
            }

            self.stats.bytes_read(n);
            trace!(peer = %self.addr, bytes = n, "Read data");
        }
    }
}

#[async_trait]
impl<S> ConnectionHandle for PassiveConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn write(&mut self, data: &[u8]) -> io::Result<()> {
        let frame = encode_frame(data);
        self.stream.write_all(&frame).await?;
        self.stream.flush().await?;
        self.stats.bytes_written(frame.len());
        trace!(peer = %self.addr, bytes = frame.len(), "Sent response");
        Ok(())
    }

    fn peer_addr(&self) -> SocketAddr {
        self.addr
    }
}

/// Errors that can occur while handling a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// Malformed request frame
    #[error("Frame error: {0}")]
    FrameError(#[from] FrameError),

    /// Server closed the connection without sending anything
    #[error("Client disconnected")]
    ClientDisconnected,

    /// Unexpected end of stream (partial request)
    #[error("Unexpected end of stream")]
    UnexpectedEof,

    /// The request did not arrive in time
    #[error("No request received within {0:?}")]
    ReadTimeout(Duration),
}

/// Handles a server connection.
///
/// This is a convenience function that checks the allow list, creates a
/// PassiveConnection and runs it to completion.
///
/// # Arguments
///
/// * `stream` - The stream for this connection
/// * `addr` - The server's socket address
/// * `handler` - The passive check handler
/// * `config` - Per-connection settings
/// * `stats` - Shared connection statistics
pub async fn handle_connection<S>(
    stream: S,
    addr: SocketAddr,
    handler: PassiveCheckHandler,
    config: Arc<ConnectionConfig>,
    stats: Arc<ConnectionStats>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    if !config.allows(addr.ip()) {
        warn!(peer = %addr, "Connection rejected, peer is not in the allowed list");
        stats.connection_rejected();
        return;
    }

    let conn = PassiveConnection::new(stream, addr, &config, stats);
    // run() has already logged the outcome
    let _ = conn.run(&handler).await;
}
