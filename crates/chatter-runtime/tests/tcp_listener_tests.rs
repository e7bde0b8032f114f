//! TCP Transport Integration Tests
//!
//! Runs a real listener on an ephemeral port and talks to it with plain
//! sockets, one line per protocol message.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chatter_core::ServerConfig;
use chatter_runtime::{ChatServer, TcpChatListener};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;

const READ_TIMEOUT: Duration = Duration::from_secs(2);

// ----------------------------------------------------------------------------
// Test Utilities
// ----------------------------------------------------------------------------

struct TestClient {
    reader: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, writer) = stream.into_split();
        Self {
            reader: BufReader::new(read_half).lines(),
            writer,
        }
    }

    async fn send(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
    }

    async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.unwrap();
    }

    async fn recv(&mut self) -> Option<String> {
        timeout(READ_TIMEOUT, self.reader.next_line())
            .await
            .expect("Line should arrive within timeout")
            .unwrap()
    }
}

async fn start_listener(config: ServerConfig) -> (SocketAddr, oneshot::Sender<()>, JoinHandle<()>) {
    let server = Arc::new(ChatServer::new(config).unwrap());
    let listener = TcpChatListener::bind(server).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let handle = tokio::spawn(async move {
        listener
            .run(async {
                let _ = stop_rx.await;
            })
            .await
            .unwrap();
    });
    (addr, stop_tx, handle)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_chat_over_tcp() {
    let (addr, stop, listener) = start_listener(ServerConfig::testing()).await;

    let mut alice = TestClient::connect(addr).await;
    alice.send("c2/CONNECT Alice").await;
    assert_eq!(alice.recv().await.as_deref(), Some("c2/ACKNOWLEDGE TestServer"));

    let mut bob = TestClient::connect(addr).await;
    bob.send("c2/CONNECT Bob\r").await;
    assert_eq!(bob.recv().await.as_deref(), Some("c2/ACKNOWLEDGE TestServer"));

    alice.send("c2/MSG 1700000000000; hi bob").await;
    assert_eq!(alice.recv().await.as_deref(), Some("c2/ACKNOWLEDGE"));
    assert_eq!(bob.recv().await.as_deref(), Some("c2/UPDATE MESSAGE Alice;hi bob"));

    bob.send("c2/QUERY active_users").await;
    assert_eq!(bob.recv().await.as_deref(), Some("c2/ACKNOWLEDGE [Alice, Bob]"));

    stop.send(()).unwrap();
    assert_eq!(alice.recv().await.as_deref(), Some("c2/UPDATE SERVER_SHUTDOWN"));
    assert_eq!(bob.recv().await.as_deref(), Some("c2/UPDATE SERVER_SHUTDOWN"));

    timeout(READ_TIMEOUT, listener).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_client_disconnect_notifies_others() {
    let (addr, stop, listener) = start_listener(ServerConfig::testing()).await;

    let mut alice = TestClient::connect(addr).await;
    alice.send("c2/CONNECT Alice").await;
    alice.recv().await;

    let mut bob = TestClient::connect(addr).await;
    bob.send("c2/CONNECT Bob").await;
    bob.recv().await;

    bob.send("c2/DISCONNECT").await;
    assert_eq!(alice.recv().await.as_deref(), Some("c2/UPDATE DISCONNECT Bob"));
    assert_eq!(bob.recv().await, None);

    drop(alice);
    stop.send(()).unwrap();
    timeout(READ_TIMEOUT, listener).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_oversize_line_is_dropped() {
    let (addr, stop, listener) = start_listener(ServerConfig::testing()).await;
    let mut client = TestClient::connect(addr).await;

    let long_name = "x".repeat(4096);
    client.send(&format!("c2/CONNECT {long_name}")).await;
    client.send("c2/PING").await;

    assert_eq!(client.recv().await.as_deref(), Some("c2/PING 0"));

    stop.send(()).unwrap();
    timeout(READ_TIMEOUT, listener).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_invalid_utf8_line_is_dropped() {
    let (addr, stop, listener) = start_listener(ServerConfig::testing()).await;
    let mut client = TestClient::connect(addr).await;

    client.send_raw(b"c2/CONNECT \xff\xfeBob\n").await;
    client.send("c2/CONNECT Bob").await;

    // The first CONNECT never reached the dispatcher, so the second one succeeds
    assert_eq!(client.recv().await.as_deref(), Some("c2/ACKNOWLEDGE TestServer"));
    client.send("c2/QUERY active_users").await;
    assert_eq!(client.recv().await.as_deref(), Some("c2/ACKNOWLEDGE [Bob]"));

    stop.send(()).unwrap();
    timeout(READ_TIMEOUT, listener).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_heartbeat_over_tcp() {
    let config = ServerConfig::testing().with_heartbeat(Duration::from_millis(20));
    let (addr, stop, listener) = start_listener(config).await;
    let mut client = TestClient::connect(addr).await;

    assert_eq!(client.recv().await.as_deref(), Some("c2/PING 0"));

    stop.send(()).unwrap();
    timeout(READ_TIMEOUT, listener).await.unwrap().unwrap();
}
