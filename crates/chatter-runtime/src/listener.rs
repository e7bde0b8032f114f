//! Newline-delimited TCP transport
//!
//! Each accepted socket gets one reader loop feeding `ChatServer::on_line`
//! in arrival order and one writer task draining a bounded outbound queue.
//! Server writes never block: a full queue surfaces as
//! `TransportError::BufferFull` to the caller.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chatter_core::{CloseReason, Connection, ConnectionId, TransportError};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, trace, warn};

use crate::server::ChatServer;

/// Time allowed for queued lines to reach the socket after a session ends
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

// ----------------------------------------------------------------------------
// TCP Connection
// ----------------------------------------------------------------------------

/// `Connection` backed by a bounded queue in front of a socket writer
#[derive(Debug)]
pub struct TcpConnection {
    id: ConnectionId,
    sender: Mutex<Option<mpsc::Sender<String>>>,
    open: Arc<AtomicBool>,
    capacity: usize,
}

impl TcpConnection {
    fn new(sender: mpsc::Sender<String>, open: Arc<AtomicBool>, capacity: usize) -> Self {
        Self {
            id: ConnectionId::next(),
            sender: Mutex::new(Some(sender)),
            open,
            capacity,
        }
    }

    /// Stop accepting writes; lines already queued are still flushed
    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
        self.queue().take();
    }

    fn queue(&self) -> MutexGuard<'_, Option<mpsc::Sender<String>>> {
        self.sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Connection for TcpConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn write(&self, line: &str) -> Result<(), TransportError> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(TransportError::Closed { connection: self.id });
        }
        let queue = self.queue();
        let Some(sender) = queue.as_ref() else {
            return Err(TransportError::Closed { connection: self.id });
        };
        sender.try_send(line.to_string()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => TransportError::BufferFull {
                connection: self.id,
                capacity: self.capacity,
            },
            mpsc::error::TrySendError::Closed(_) => {
                self.open.store(false, Ordering::SeqCst);
                TransportError::Closed { connection: self.id }
            }
        })
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

// ----------------------------------------------------------------------------
// Listener
// ----------------------------------------------------------------------------

/// Accept loop binding a `ChatServer` to a TCP address
#[derive(Debug)]
pub struct TcpChatListener {
    listener: TcpListener,
    server: Arc<ChatServer>,
}

impl TcpChatListener {
    /// Bind to the server's configured `bind_address`
    pub async fn bind(server: Arc<ChatServer>) -> chatter_core::Result<Self> {
        let address = server.config().bind_address.clone();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(TransportError::Io)?;
        info!(address = %address, "Listening for Chatter2 clients");
        Ok(Self { listener, server })
    }

    pub fn local_addr(&self) -> chatter_core::Result<SocketAddr> {
        Ok(self.listener.local_addr().map_err(TransportError::Io)?)
    }

    /// Accept connections until `shutdown` resolves
    ///
    /// On shutdown every connected session is sent `UPDATE SERVER_SHUTDOWN`,
    /// then all connection workers are told to stop and awaited.
    pub async fn run<F>(self, shutdown: F) -> chatter_core::Result<()>
    where
        F: Future<Output = ()>,
    {
        let (stop_tx, stop_rx) = watch::channel(false);
        let mut workers = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    debug!("Shutdown requested");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        workers.spawn(serve_connection(
                            Arc::clone(&self.server),
                            stream,
                            peer,
                            stop_rx.clone(),
                        ));
                    }
                    Err(e) => warn!(error = %e, "Failed to accept connection"),
                },
                Some(finished) = workers.join_next(), if !workers.is_empty() => {
                    if let Err(e) = finished {
                        warn!(error = %e, "Connection worker panicked");
                    }
                }
            }
        }

        self.server.shutdown().await;
        let _ = stop_tx.send(true);
        while let Some(finished) = workers.join_next().await {
            if let Err(e) = finished {
                warn!(error = %e, "Connection worker panicked");
            }
        }
        info!("Listener stopped");
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Connection Worker
// ----------------------------------------------------------------------------

enum LineRead {
    Line,
    Oversize,
    Eof,
}

async fn serve_connection(
    server: Arc<ChatServer>,
    stream: TcpStream,
    peer: SocketAddr,
    mut stop: watch::Receiver<bool>,
) {
    let capacity = server.config().outbound_buffer_size;
    let max_line = server.config().max_line_length;

    let (read_half, write_half) = stream.into_split();
    let (sender, receiver) = mpsc::channel(capacity);
    let open = Arc::new(AtomicBool::new(true));
    let connection = Arc::new(TcpConnection::new(sender, Arc::clone(&open), capacity));
    let writer = spawn_writer(connection.id(), write_half, receiver, open);

    let session = server.on_connect(connection.clone()).await;
    info!(connection = %connection.id(), %peer, "Client connected");

    let mut reader = BufReader::new(read_half);
    let mut buffer = Vec::new();
    let reason = loop {
        buffer.clear();
        let read = tokio::select! {
            read = read_line_limited(&mut reader, &mut buffer, max_line) => read,
            _ = stop.changed() => {
                break CloseReason {
                    code: 0,
                    reason: Some("server shutdown".to_string()),
                    was_clean: true,
                };
            }
        };

        match read {
            Ok(LineRead::Line) => {
                let Some(line) = line_text(&buffer) else {
                    debug!(connection = %connection.id(), bytes = buffer.len(), "Dropping line that is not valid UTF-8");
                    continue;
                };
                trace!(connection = %connection.id(), line, "Received line");
                if server.on_line(&session, line).await.ends_session() {
                    break CloseReason::requested();
                }
            }
            Ok(LineRead::Oversize) => {
                warn!(connection = %connection.id(), limit = max_line, "Dropping oversize line");
            }
            Ok(LineRead::Eof) => break CloseReason::clean(),
            Err(e) => break CloseReason::error(e.to_string()),
        }
    };

    server.on_close(&session, reason).await;
    connection.close();
    drop(session);

    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, writer).await.is_err() {
        debug!(connection = %connection.id(), "Writer did not drain in time");
    }
    info!(connection = %connection.id(), %peer, "Client disconnected");
}

fn spawn_writer(
    id: ConnectionId,
    mut socket: OwnedWriteHalf,
    mut receiver: mpsc::Receiver<String>,
    open: Arc<AtomicBool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(mut line) = receiver.recv().await {
            line.push('\n');
            if let Err(e) = socket.write_all(line.as_bytes()).await {
                debug!(connection = %id, error = %e, "Socket write failed");
                open.store(false, Ordering::SeqCst);
                return;
            }
        }
        let _ = socket.shutdown().await;
    })
}

/// Line content without its newline, `None` for invalid UTF-8
fn line_text(buffer: &[u8]) -> Option<&str> {
    let text = std::str::from_utf8(buffer).ok()?;
    Some(text.strip_suffix('\n').unwrap_or(text))
}

/// Read one `\n`-terminated line of at most `max` bytes into `buffer`
///
/// A longer line is consumed up to and including its newline and reported as
/// `Oversize`. A final line without a newline is returned as a normal line.
async fn read_line_limited<R>(reader: &mut R, buffer: &mut Vec<u8>, max: usize) -> io::Result<LineRead>
where
    R: AsyncBufRead + Unpin,
{
    let limit = u64::try_from(max).unwrap_or(u64::MAX).saturating_add(1);
    let read = (&mut *reader).take(limit).read_until(b'\n', buffer).await?;
    if read == 0 {
        return Ok(LineRead::Eof);
    }
    if buffer.last() == Some(&b'\n') || buffer.len() <= max {
        return Ok(LineRead::Line);
    }

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            break;
        }
        if let Some(position) = available.iter().position(|byte| *byte == b'\n') {
            reader.consume(position + 1);
            break;
        }
        let consumed = available.len();
        reader.consume(consumed);
    }
    Ok(LineRead::Oversize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_line_limited_drops_long_lines() {
        let input: &[u8] = b"c2/PING\nc2/CONNECT aaaaaaaaaaaaaaaa\nc2/QUERY active_users";
        let mut reader = BufReader::new(input);
        let mut buffer = Vec::new();

        assert!(matches!(read_line_limited(&mut reader, &mut buffer, 16).await.unwrap(), LineRead::Line));
        assert_eq!(buffer, b"c2/PING\n");

        buffer.clear();
        assert!(matches!(read_line_limited(&mut reader, &mut buffer, 16).await.unwrap(), LineRead::Oversize));

        buffer.clear();
        assert!(matches!(read_line_limited(&mut reader, &mut buffer, 32).await.unwrap(), LineRead::Line));
        assert_eq!(buffer, b"c2/QUERY active_users");

        buffer.clear();
        assert!(matches!(read_line_limited(&mut reader, &mut buffer, 16).await.unwrap(), LineRead::Eof));
    }

    #[test]
    fn test_line_text_rejects_invalid_utf8() {
        assert_eq!(line_text(b"c2/PING\n"), Some("c2/PING"));
        assert_eq!(line_text(b"c2/MSG 1; caf\xc3\xa9"), Some("c2/MSG 1; caf\u{e9}"));
        assert_eq!(line_text(b"c2/MSG 1; \xff\xfe\n"), None);
        assert_eq!(line_text(b"c2/CONNECT \xc3\n"), None);
    }

    #[tokio::test]
    async fn test_tcp_connection_reports_full_queue_and_close() {
        let (sender, mut receiver) = mpsc::channel(1);
        let connection = TcpConnection::new(sender, Arc::new(AtomicBool::new(true)), 1);

        connection.write("c2/PING 0").unwrap();
        assert!(matches!(
            connection.write("c2/PING 0"),
            Err(TransportError::BufferFull { capacity: 1, .. })
        ));
        assert_eq!(receiver.recv().await.as_deref(), Some("c2/PING 0"));

        connection.close();
        assert!(!connection.is_open());
        assert!(matches!(connection.write("x"), Err(TransportError::Closed { .. })));
        assert!(receiver.recv().await.is_none());
    }
}
