//! Per-Connection Session
//!
//! This is the bridge between the reactor and the decoder. Each readiness
//! event triggers one bounded read; the bytes land in the session's query
//! buffer and the decode loop then drains as many complete commands as the
//! buffer holds. A command that is only partially buffered simply ends the
//! drain — the decoder keeps its place and resumes after the next read.
//!
//! Commands are decoded and dispatched strictly in arrival order, and a
//! partial command is never dispatched. After each completed command the
//! session resets the decoder's per-command state so the next iteration
//! starts clean; without that reset the previous request's type and
//! arguments would leak into the next one.
//!
//! Error policy, mirroring §7 of the protocol contract:
//!
//! - incomplete input: not an error, wait for the next read
//! - protocol error: emit one error line, then abort the connection
//! - unknown command / bad arity: error reply, connection stays open

use crate::commands::CommandHandler;
use crate::protocol::{Decode, ProtocolError, QueryBuffer, Reply, RequestDecoder};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tracing::{debug, info, trace, warn};

/// Bytes read from the socket per readiness event (16 KB).
pub const READ_CHUNK_SIZE: usize = 16 * 1024;

/// Initial query buffer capacity.
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total commands dispatched
    pub commands_dispatched: AtomicU64,
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

    pub fn command_dispatched(&self) {
        self.commands_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Errors that end a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Grammar violation; the connection is aborted after an error reply
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Client closed the connection with an empty buffer
    #[error("client disconnected")]
    ClientDisconnected,

    /// Client closed the connection mid-command
    #[error("unexpected end of stream")]
    UnexpectedEof,
}

/// Owns one client's session state for the lifetime of the connection.
pub struct ConnectionHandler {
    /// The TCP stream for this connection
    stream: BufWriter<TcpStream>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Unconsumed input bytes
    buffer: QueryBuffer,

    /// Resumable decode state
    decoder: RequestDecoder,

    /// Largest buffer size observed (stat only)
    buffer_peak: usize,

    /// The command handler (store is shared across connections)
    commands: CommandHandler,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,
}

impl ConnectionHandler {
    pub fn new(
        stream: TcpStream,
        addr: SocketAddr,
        commands: CommandHandler,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.connection_opened();

        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: QueryBuffer::with_capacity(INITIAL_BUFFER_SIZE),
            decoder: RequestDecoder::new(),
            buffer_peak: 0,
            commands,
            stats,
        }
    }

    /// Runs the session until the client disconnects or errors out.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!(client = %self.addr, "Client disconnected gracefully"),
            Err(e) => match e {
                ConnectionError::ClientDisconnected => {
                    debug!(client = %self.addr, "Client disconnected")
                }
                ConnectionError::Io(io_err)
                    if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
                {
                    debug!(client = %self.addr, "Connection reset by client")
                }
                _ => warn!(client = %self.addr, error = %e, "Connection error"),
            },
        }

        debug!(client = %self.addr, buffer_peak = self.buffer_peak, "Session ended");
        self.stats.connection_closed();
        result
    }

    /// The read → decode → dispatch loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            self.drain_buffer().await?;
            self.read_more().await?;
        }
    }

    /// Decodes and dispatches every complete command currently buffered.
    async fn drain_buffer(&mut self) -> Result<(), ConnectionError> {
        loop {
            let args = match self.decoder.decode(&mut self.buffer) {
                Ok(Decode::Command(args)) => args,
                Ok(Decode::Incomplete) => return Ok(()),
                Err(e) => {
                    // Abort after a single error indication; nothing from
                    // this request gets dispatched.
                    warn!(client = %self.addr, error = %e, "Protocol error");
                    let reply = Reply::error(format!("ERR Protocol error: {}", e));
                    self.send_reply(&reply).await?;
                    return Err(e.into());
                }
            };

            // A blank inline line or a "*0" header: nothing to dispatch.
            if !args.is_empty() {
                trace!(client = %self.addr, argc = args.len(), "Dispatching command");
                let reply = match self.commands.execute(&args) {
                    Ok(reply) => reply,
                    Err(e) => {
                        debug!(client = %self.addr, error = %e, "Dispatch error");
                        Reply::error(format!("ERR {}", e))
                    }
                };
                self.send_reply(&reply).await?;
                self.stats.command_dispatched();
            }

            // Clear per-command decode state before the next iteration.
            self.decoder.reset();
        }
    }

    /// Performs one bounded read and appends the bytes to the buffer.
    async fn read_more(&mut self) -> Result<(), ConnectionError> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let n = self.stream.get_mut().read(&mut chunk).await?;

        if n == 0 {
            if self.buffer.is_empty() {
                return Err(ConnectionError::ClientDisconnected);
            }
            // Partial command left in the buffer.
            return Err(ConnectionError::UnexpectedEof);
        }

        self.buffer.append(&chunk[..n]);
        if self.buffer.len() > self.buffer_peak {
            self.buffer_peak = self.buffer.len();
        }
        self.stats.bytes_read(n);
        trace!(client = %self.addr, bytes = n, buffered = self.buffer.len(), "Read data");

        Ok(())
    }

    /// Serializes and writes one reply.
    async fn send_reply(&mut self, reply: &Reply) -> Result<(), ConnectionError> {
        let bytes = reply.serialize();
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        self.stats.bytes_written(bytes.len());
        Ok(())
    }
}

/// Creates a [`ConnectionHandler`] and runs it to completion.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    commands: CommandHandler,
    stats: Arc<ConnectionStats>,
) {
    let handler = ConnectionHandler::new(stream, addr, commands, stats);
    if let Err(e) = handler.run().await {
        match e {
            ConnectionError::ClientDisconnected => {}
            ConnectionError::Io(ref io_err)
                if io_err.kind() == std::io::ErrorKind::ConnectionReset => {}
            _ => {
                debug!(client = %addr, error = %e, "Connection ended with error");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Store;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn create_test_server() -> (SocketAddr, Arc<Store>, Arc<ConnectionStats>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let store = Arc::new(Store::new());
        let stats = Arc::new(ConnectionStats::new());

        let store_clone = Arc::clone(&store);
        let stats_clone = Arc::clone(&stats);

        tokio::spawn(async move {
            while let Ok((stream, client_addr)) = listener.accept().await {
                let commands = CommandHandler::new(Arc::clone(&store_clone));
                let stats = Arc::clone(&stats_clone);
                tokio::spawn(handle_connection(stream, client_addr, commands, stats));
            }
        });

        (addr, store, stats)
    }

    async fn read_exact_len(client: &mut TcpStream, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        client.read_exact(&mut buf).await.unwrap();
        buf
    }

    #[tokio::test]
    async fn test_ping_pong() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"*1\r\n$4\r\nPING\r\n").await.unwrap();
        assert_eq!(read_exact_len(&mut client, 7).await, b"+PONG\r\n");
    }

    #[tokio::test]
    async fn test_inline_ping() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"PING\r\n").await.unwrap();
        assert_eq!(read_exact_len(&mut client, 7).await, b"+PONG\r\n");
    }

    #[tokio::test]
    async fn test_set_get() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client
            .write_all(b"*3\r\n$3\r\nSET\r\n$4\r\nname\r\n$5\r\nember\r\n")
            .await
            .unwrap();
        assert_eq!(read_exact_len(&mut client, 5).await, b"+OK\r\n");

        client
            .write_all(b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n")
            .await
            .unwrap();
        assert_eq!(read_exact_len(&mut client, 11).await, b"$5\r\nember\r\n");
    }

    #[tokio::test]
    async fn test_command_split_across_writes() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"*2\r\n$3\r\nGE").await.unwrap();
        client.flush().await.unwrap();
        tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
        client.write_all(b"T\r\n$4\r\nname\r\n").await.unwrap();

        assert_eq!(read_exact_len(&mut client, 5).await, b"$-1\r\n");
    }

    #[tokio::test]
    async fn test_pipelined_commands() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client
            .write_all(b"*3\r\n$3\r\nSET\r\n$2\r\nk1\r\n$2\r\nv1\r\nPING\r\n*2\r\n$3\r\nGET\r\n$2\r\nk1\r\n")
            .await
            .unwrap();

        // +OK\r\n +PONG\r\n $2\r\nv1\r\n
        assert_eq!(
            read_exact_len(&mut client, 5 + 7 + 8).await,
            b"+OK\r\n+PONG\r\n$2\r\nv1\r\n"
        );
    }

    #[tokio::test]
    async fn test_unknown_command_keeps_connection_open() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"*1\r\n$4\r\nFROB\r\n").await.unwrap();
        let mut buf = [0u8; 128];
        let n = client.read(&mut buf).await.unwrap();
        let reply = String::from_utf8_lossy(&buf[..n]);
        assert!(reply.starts_with("-ERR unknown command 'FROB'"));

        // Still usable afterwards.
        client.write_all(b"PING\r\n").await.unwrap();
        assert_eq!(read_exact_len(&mut client, 7).await, b"+PONG\r\n");
    }

    #[tokio::test]
    async fn test_protocol_error_closes_connection() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"*1\r\n$-1\r\n").await.unwrap();

        let mut buf = Vec::new();
        client.read_to_end(&mut buf).await.unwrap();
        let reply = String::from_utf8_lossy(&buf);
        assert!(reply.starts_with("-ERR Protocol error:"), "got {:?}", reply);
        // read_to_end returning means the server closed the socket.
    }

    #[tokio::test]
    async fn test_big_argument_roundtrip() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        let payload = vec![b'v'; 40_000];
        let mut request = Vec::new();
        request.extend_from_slice(b"*3\r\n$3\r\nSET\r\n$3\r\nbig\r\n$40000\r\n");
        request.extend_from_slice(&payload);
        request.extend_from_slice(b"\r\n");
        client.write_all(&request).await.unwrap();
        assert_eq!(read_exact_len(&mut client, 5).await, b"+OK\r\n");

        client
            .write_all(b"*2\r\n$3\r\nGET\r\n$3\r\nbig\r\n")
            .await
            .unwrap();
        let reply = read_exact_len(&mut client, 8 + 40_000 + 2).await;
        assert_eq!(&reply[..8], b"$40000\r\n");
        assert_eq!(&reply[8..8 + 40_000], &payload[..]);
    }

    #[tokio::test]
    async fn test_connection_stats() {
        let (addr, _, stats) = create_test_server().await;

        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);

        let mut client = TcpStream::connect(addr).await.unwrap();
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        assert_eq!(stats.connections_accepted.load(Ordering::Relaxed), 1);
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 1);

        client.write_all(b"*1\r\n$4\r\nPING\r\n").await.unwrap();
        let mut buf = [0u8; 64];
        let _ = client.read(&mut buf).await.unwrap();
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        assert!(stats.commands_dispatched.load(Ordering::Relaxed) >= 1);
        assert!(stats.bytes_read.load(Ordering::Relaxed) > 0);
        assert!(stats.bytes_written.load(Ordering::Relaxed) > 0);

        drop(client);
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);
    }
}
