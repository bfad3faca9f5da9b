//! Mock client
//!
//! Binds an explicit local port, joins the relay under the given name and
//! then sends `hello<k>` chat messages on a fixed interval, logging every
//! frame the relay sends back.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpSocket;
use tokio::time::{interval, timeout};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use stamp_relay::cli::MockClientArgs;
use stamp_relay::config::DEFAULT_DEADLINE;
use stamp_relay::{encode, ServerMessage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mock_client=info")),
        )
        .init();

    let args = MockClientArgs::parse();

    let local = SocketAddr::from(([127, 0, 0, 1], args.local_port));
    let socket = TcpSocket::new_v4()?;
    socket
        .bind(local)
        .with_context(|| format!("failed to bind local address {local}"))?;
    let stream = socket
        .connect(args.server)
        .await
        .with_context(|| format!("failed to connect to {}", args.server))?;
    info!("Connected to {} from {}", args.server, local);

    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    send(&mut writer, &format!("join:{}", encode(&args.name))).await?;

    let mut ticker = interval(Duration::from_millis(args.interval_ms.max(1)));
    ticker.tick().await;
    let mut count = 1u64;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("Relay closed the connection");
                    return Ok(());
                };
                match ServerMessage::parse(&line) {
                    Ok(message) => info!("[recv] {:?}", message),
                    Err(e) => warn!("[recv] unparseable frame '{}': {}", line, e),
                }
            }
            _ = ticker.tick() => {
                let content = format!("hello{count}");
                send(&mut writer, &format!("chat:{}", encode(content))).await?;
                count += 1;
            }
        }
    }
}

async fn send<W>(writer: &mut W, frame: &str) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let line = format!("{frame}\n");
    timeout(DEFAULT_DEADLINE, writer.write_all(line.as_bytes()))
        .await
        .context("write deadline elapsed")??;
    Ok(())
}
