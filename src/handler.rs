//! TCP connection handler
//!
//! Runs one accepted connection: registers the session, drives the read
//! loop into the protocol handler, drains the session's outbox onto the
//! socket, and tears everything down when either side stops.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::broadcast::Broadcaster;
use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::message::ServerMessage;
use crate::protocol::ProtocolHandler;
use crate::registry::Registry;
use crate::types::SessionId;

/// Handle a new TCP connection
///
/// Returns once the peer is gone and the departure has been broadcast.
/// An `Err` means the connection ended on a transport error rather than
/// a clean close; either way the session has been removed.
pub async fn handle_connection(
    stream: TcpStream,
    registry: Arc<Registry>,
    config: RelayConfig,
) -> Result<(), RelayError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    let (reader, writer) = stream.into_split();
    run_session(reader, writer, &peer_addr, registry, config).await
}

/// Session lifecycle over any split byte stream
pub async fn run_session<R, W>(
    reader: R,
    writer: W,
    peer: &str,
    registry: Arc<Registry>,
    config: RelayConfig,
) -> Result<(), RelayError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    // Create outbox for registry -> socket frames
    let (outbox_tx, outbox_rx) = mpsc::channel::<String>(config.outbox_capacity.max(1));
    let id = registry.register(outbox_tx).id;
    info!("Session {} connected from {}", id, peer);

    let broadcaster = Broadcaster::new(Arc::clone(&registry), config.write_deadline);
    let mut protocol = ProtocolHandler::new(
        id,
        Arc::clone(&registry),
        broadcaster.clone(),
        config.max_frame_len,
    );

    // Spawn write task (outbox -> socket)
    let mut write_task = tokio::spawn(write_loop(writer, outbox_rx, config.write_deadline, id));

    // Wait for either side to stop
    let mut write_finished = false;
    let result = tokio::select! {
        result = read_loop(BufReader::new(reader), &mut protocol, config.read_deadline) => {
            debug!("Read loop completed for {}", id);
            result
        }
        result = &mut write_task => {
            debug!("Write task completed for {}", id);
            write_finished = true;
            result.unwrap_or(Ok(()))
        }
    };

    // Remove first so the departing session is not among the recipients
    let name = protocol.terminate();
    registry.unregister(id);
    info!("Session {} ('{}') disconnected", id, name);

    broadcaster.send_all(&ServerMessage::Leave { name }).await;
    broadcaster.send_roster().await;

    // The registry held the last outbox sender; the writer drains what is
    // still queued and closes the socket
    if !write_finished && timeout(config.write_deadline, &mut write_task).await.is_err() {
        write_task.abort();
    }

    result
}

/// Feed complete lines into the protocol handler until EOF or a read error.
///
/// A read that sees no data within `read_deadline` is simply re-issued;
/// idle connections are never dropped. Bytes of a partially received line
/// survive the timeout in `buf`.
///
/// At most `max_frame_len` plus a `\r\n` terminator is buffered. A longer
/// line is reported to the protocol handler as soon as the limit is hit and
/// the rest of it is discarded up to the next newline.
pub async fn read_loop<R>(
    mut reader: R,
    protocol: &mut ProtocolHandler,
    read_deadline: Duration,
) -> Result<(), RelayError>
where
    R: AsyncBufRead + Unpin,
{
    let limit = protocol.max_frame_len() + 2;
    let mut buf = Vec::new();
    let mut discarding = false;

    loop {
        let budget = limit.saturating_sub(buf.len()) as u64;
        let mut limited = (&mut reader).take(budget);
        let read = timeout(read_deadline, limited.read_until(b'\n', &mut buf)).await;
        match read {
            Err(_elapsed) => {
                trace!("Read deadline elapsed for {}, waiting again", protocol.id());
                continue;
            }
            Ok(Err(e)) => return Err(e.into()),
            Ok(Ok(0)) => {
                if !buf.is_empty() && !discarding {
                    protocol.handle_raw(&buf).await;
                }
                return Ok(());
            }
            Ok(Ok(_)) => {}
        }

        if buf.ends_with(b"\n") {
            if !discarding {
                let frame = trim_line_ending(&buf);
                if !frame.is_empty() {
                    protocol.handle_raw(frame).await;
                }
            }
            discarding = false;
            buf.clear();
        } else if buf.len() >= limit {
            if !discarding {
                protocol.handle_raw(&buf).await;
                discarding = true;
            }
            buf.clear();
        }
    }
}

/// Write queued frames to the socket, each under its own deadline.
///
/// A write that misses the deadline drops that frame and moves on; only
/// a transport error ends the loop.
pub async fn write_loop<W>(
    mut writer: W,
    mut outbox: mpsc::Receiver<String>,
    write_deadline: Duration,
    id: SessionId,
) -> Result<(), RelayError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = outbox.recv().await {
        match timeout(write_deadline, writer.write_all(frame.as_bytes())).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!("Write failed for {}: {}", id, e);
                return Err(e.into());
            }
            Err(_elapsed) => {
                warn!("Write deadline elapsed for {}, frame dropped", id);
            }
        }
    }
    debug!("Write task ended for {}", id);

    let _ = timeout(write_deadline, writer.shutdown()).await;
    Ok(())
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
