mod cli;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;

use crate::cli::CliArgs;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();
    let addr = args.addr();
    let stream = TcpStream::connect(&addr)
        .await
        .with_context(|| format!("failed to connect to {addr}"))?;
    tracing::info!(%addr, "connected");
    let (read, mut write) = stream.into_split();

    // Everything the server sends is printed as it arrives.
    let printer = tokio::spawn(async move {
        let mut lines = BufReader::new(read).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => println!("{line}"),
                Ok(None) => {
                    eprintln!("server closed the connection");
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "read failed");
                    break;
                }
            }
        }
    });

    if let Some(command) = &args.command {
        send(&mut write, command).await?;
        let wait = Duration::from_secs_f64(args.wait.max(0.0).min(3600.0));
        let _ = tokio::time::timeout(wait, printer).await;
        return Ok(());
    }

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    tokio::select! {
        result = async {
            while let Some(line) = stdin.next_line().await? {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                send(&mut write, line).await?;
            }
            anyhow::Ok(())
        } => result?,
        _ = printer => {}
    }
    Ok(())
}

/// The server expects `\r\n` line endings.
async fn send(write: &mut OwnedWriteHalf, line: &str) -> Result<()> {
    write
        .write_all(format!("{line}\r\n").as_bytes())
        .await
        .context("failed to send command")
}
