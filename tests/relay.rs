use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use stamp_relay::{encode, ErrorCode, RelayConfig, RelayServer, Registry, ServerMessage};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;

const READ_TIMEOUT: Duration = Duration::from_secs(2);
const QUIET_PERIOD: Duration = Duration::from_millis(300);

struct TestRelay {
    addr: SocketAddr,
    registry: Arc<Registry>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl TestRelay {
    async fn start(config: RelayConfig) -> Result<Self> {
        let config = config.with_listen_addr("127.0.0.1:0".parse()?);
        let server = RelayServer::bind(config).await?;
        let addr = server.local_addr()?;
        let registry = server.registry();

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(server.run_until(async move {
            let _ = shutdown_rx.await;
        }));

        Ok(Self {
            addr,
            registry,
            shutdown: Some(shutdown_tx),
            task,
        })
    }

    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = self.task.await;
    }
}

struct TestClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            lines: BufReader::new(reader).lines(),
            writer,
        })
    }

    /// Connect and complete the join handshake, consuming our own notices
    async fn joined(addr: SocketAddr, name: &str) -> Result<Self> {
        let mut client = Self::connect(addr).await?;
        client.send(&format!("join:{}", encode(name))).await?;
        assert_eq!(client.recv().await?, ServerMessage::Join { name: name.into() });
        match client.recv().await? {
            ServerMessage::Users { names } => assert!(names.iter().any(|n| n == name)),
            other => panic!("expected roster, got {other:?}"),
        }
        Ok(client)
    }

    async fn send(&mut self, frame: &str) -> Result<()> {
        self.writer.write_all(frame.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        Ok(())
    }

    async fn recv_line(&mut self) -> Result<String> {
        timeout(READ_TIMEOUT, self.lines.next_line())
            .await
            .map_err(|_| anyhow!("timed out waiting for a frame"))??
            .ok_or_else(|| anyhow!("connection closed"))
    }

    async fn recv(&mut self) -> Result<ServerMessage> {
        let line = self.recv_line().await?;
        Ok(ServerMessage::parse(&line)?)
    }

    /// Everything received until the relay has been silent for a while
    async fn drain(&mut self) -> Result<Vec<ServerMessage>> {
        let mut received = Vec::new();
        while let Ok(line) = timeout(QUIET_PERIOD, self.lines.next_line()).await {
            match line? {
                Some(line) => received.push(ServerMessage::parse(&line)?),
                None => break,
            }
        }
        Ok(received)
    }
}

fn error_code(message: &ServerMessage) -> Option<ErrorCode> {
    match message {
        ServerMessage::Error { code, .. } => Some(*code),
        _ => None,
    }
}

#[tokio::test]
async fn join_broadcasts_notice_then_roster() -> Result<()> {
    let relay = TestRelay::start(RelayConfig::default()).await?;

    let mut alice = TestClient::connect(relay.addr).await?;
    alice.send(&format!("join:{}", encode("alice"))).await?;

    assert_eq!(alice.recv_line().await?, format!("join:{}", encode("alice")));
    assert_eq!(alice.recv_line().await?, format!("users:{}", encode("alice")));

    let mut bob = TestClient::joined(relay.addr, "bob").await?;
    assert_eq!(alice.recv().await?, ServerMessage::Join { name: "bob".into() });
    assert_eq!(
        alice.recv().await?,
        ServerMessage::Users { names: vec!["alice".into(), "bob".into()] }
    );
    assert!(bob.drain().await?.is_empty());

    relay.stop().await;
    Ok(())
}

#[tokio::test]
async fn duplicate_name_is_rejected() -> Result<()> {
    let relay = TestRelay::start(RelayConfig::default()).await?;

    let mut alice = TestClient::joined(relay.addr, "alice").await?;
    let mut impostor = TestClient::connect(relay.addr).await?;
    impostor.send(&format!("join:{}", encode("alice"))).await?;

    let reply = impostor.recv().await?;
    assert_eq!(error_code(&reply), Some(ErrorCode::DuplicateName));

    assert_eq!(relay.registry.roster(), vec!["alice"]);
    assert_eq!(relay.registry.len(), 2);
    assert!(alice.drain().await?.is_empty());

    // The rejected session can still pick another name
    impostor.send(&format!("join:{}", encode("alice2"))).await?;
    assert_eq!(impostor.recv().await?, ServerMessage::Join { name: "alice2".into() });

    relay.stop().await;
    Ok(())
}

#[tokio::test]
async fn concurrent_joins_with_same_name() -> Result<()> {
    let relay = TestRelay::start(RelayConfig::default()).await?;

    let mut clients = Vec::new();
    for _ in 0..8 {
        clients.push(TestClient::connect(relay.addr).await?);
    }

    let tasks: Vec<_> = clients
        .into_iter()
        .map(|mut client| {
            tokio::spawn(async move {
                client.send(&format!("join:{}", encode("same"))).await?;
                client.drain().await
            })
        })
        .collect();

    let mut rejected = 0;
    for task in tasks {
        let received = task.await??;
        if received
            .iter()
            .any(|m| error_code(m) == Some(ErrorCode::DuplicateName))
        {
            rejected += 1;
        }
    }

    assert_eq!(rejected, 7);
    assert_eq!(relay.registry.roster(), vec!["same"]);

    relay.stop().await;
    Ok(())
}

#[tokio::test]
async fn chat_reaches_everyone_including_sender() -> Result<()> {
    let relay = TestRelay::start(RelayConfig::default()).await?;

    let mut alice = TestClient::joined(relay.addr, "alice").await?;
    let mut bob = TestClient::joined(relay.addr, "bob").await?;
    alice.recv().await?;
    alice.recv().await?;

    alice.send(&format!("chat:{}", encode("hi"))).await?;

    let expected = format!("chat:{},{}", encode("alice"), encode("hi"));
    assert_eq!(alice.recv_line().await?, expected);
    assert_eq!(bob.recv_line().await?, expected);

    relay.stop().await;
    Ok(())
}

#[tokio::test]
async fn stamp_broadcast_and_rejection() -> Result<()> {
    let relay = TestRelay::start(RelayConfig::default()).await?;

    let mut alice = TestClient::joined(relay.addr, "alice").await?;
    let mut bob = TestClient::joined(relay.addr, "bob").await?;
    alice.recv().await?;
    alice.recv().await?;

    alice.send("stamp:7").await?;
    let expected = format!("stamp:{},7", encode("alice"));
    assert_eq!(alice.recv_line().await?, expected);
    assert_eq!(bob.recv_line().await?, expected);

    alice.send("stamp:abc").await?;
    assert_eq!(error_code(&alice.recv().await?), Some(ErrorCode::BadRequest));

    // Bob's next frame is the follow-up chat, so nothing was broadcast in between
    alice.send(&format!("chat:{}", encode("after"))).await?;
    assert_eq!(
        bob.recv().await?,
        ServerMessage::Chat { name: "alice".into(), content: "after".into() }
    );

    relay.stop().await;
    Ok(())
}

#[tokio::test]
async fn malformed_frames_do_not_disconnect() -> Result<()> {
    let relay = TestRelay::start(RelayConfig::default()).await?;

    let mut alice = TestClient::joined(relay.addr, "alice").await?;
    for frame in ["hello", "join", "chat:!!!", "chat:a,b", "stamp:"] {
        alice.send(frame).await?;
        assert_eq!(
            error_code(&alice.recv().await?),
            Some(ErrorCode::BadRequest),
            "frame {frame}"
        );
    }

    alice.send(&format!("join:{}", encode("again"))).await?;
    assert_eq!(error_code(&alice.recv().await?), Some(ErrorCode::Forbidden));

    alice.send("stamp:1").await?;
    assert_eq!(
        alice.recv().await?,
        ServerMessage::Stamp { name: "alice".into(), stamp: 1 }
    );

    relay.stop().await;
    Ok(())
}

#[tokio::test]
async fn disconnect_broadcasts_leave_then_roster() -> Result<()> {
    let relay = TestRelay::start(RelayConfig::default()).await?;

    let mut alice = TestClient::joined(relay.addr, "alice").await?;
    let bob = TestClient::joined(relay.addr, "bob").await?;
    alice.recv().await?;
    alice.recv().await?;
    assert_eq!(relay.registry.len(), 2);

    drop(bob);

    assert_eq!(alice.recv_line().await?, format!("leave:{}", encode("bob")));
    assert_eq!(alice.recv_line().await?, format!("users:{}", encode("alice")));
    assert_eq!(relay.registry.len(), 1);
    assert!(relay.registry.find_by_name("bob").is_none());

    relay.stop().await;
    Ok(())
}

#[tokio::test]
async fn unnamed_disconnect_leaves_with_empty_name() -> Result<()> {
    let relay = TestRelay::start(RelayConfig::default()).await?;

    let mut alice = TestClient::joined(relay.addr, "alice").await?;
    let lurker = TestClient::connect(relay.addr).await?;
    drop(lurker);

    assert_eq!(alice.recv_line().await?, "leave:");
    assert_eq!(
        alice.recv().await?,
        ServerMessage::Users { names: vec!["alice".into()] }
    );

    relay.stop().await;
    Ok(())
}

#[tokio::test]
async fn idle_connection_outlives_read_deadline() -> Result<()> {
    let config = RelayConfig::default().with_read_deadline(Duration::from_millis(50));
    let relay = TestRelay::start(config).await?;

    let mut alice = TestClient::joined(relay.addr, "alice").await?;
    tokio::time::sleep(Duration::from_millis(300)).await;

    alice.send(&format!("chat:{}", encode("still here"))).await?;
    assert_eq!(
        alice.recv().await?,
        ServerMessage::Chat { name: "alice".into(), content: "still here".into() }
    );
    assert_eq!(relay.registry.len(), 1);

    relay.stop().await;
    Ok(())
}
