use std::io;
use std::net::SocketAddr;

use matchd_scheduler::Scheduler;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::dispatch::dispatch;

/// Greeting sent on every new connection.
pub const WELCOME: &str = "Welcome to MATCH executer";

const INVALID_UTF8_REPLY: &str = "error: command is not valid UTF-8";

/// Accept connections until `shutdown` flips to `true`.
pub async fn serve(
    listener: TcpListener,
    scheduler: Scheduler,
    mut shutdown: watch::Receiver<bool>,
) -> io::Result<()> {
    info!(addr = %listener.local_addr()?, "listening for clients");
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = accepted?;
                let scheduler = scheduler.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, peer, scheduler, shutdown).await {
                        debug!(%peer, error = %e, "connection ended with error");
                    }
                });
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    info!("listener stopped");
    Ok(())
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    scheduler: Scheduler,
    mut shutdown: watch::Receiver<bool>,
) -> io::Result<()> {
    info!(%peer, "client connected");
    let (read, mut write) = stream.into_split();
    let mut reader = BufReader::new(read);
    // Persists across select! iterations so a partial line is never lost.
    let mut buf = Vec::new();
    let mut notices = scheduler.subscribe();
    send_line(&mut write, WELCOME).await?;

    loop {
        tokio::select! {
            read = reader.read_until(b'\n', &mut buf) => {
                if read? == 0 {
                    break;
                }
                let replies = match std::str::from_utf8(&buf) {
                    Ok(line) if line.trim().is_empty() => Vec::new(),
                    Ok(line) => {
                        let line = line.trim_end_matches(['\r', '\n']);
                        debug!(%peer, line = %line, "received");
                        dispatch(&scheduler, line)
                    }
                    Err(e) => {
                        warn!(%peer, error = %e, "discarding line that is not UTF-8");
                        vec![INVALID_UTF8_REPLY.to_string()]
                    }
                };
                buf.clear();
                for reply in replies {
                    send_line(&mut write, &reply).await?;
                }
            }
            notice = notices.recv() => match notice {
                Ok(notice) => send_line(&mut write, &notice.to_string()).await?,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(%peer, missed, "client fell behind; notices dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    info!(%peer, "client disconnected");
    Ok(())
}

async fn send_line(write: &mut OwnedWriteHalf, line: &str) -> io::Result<()> {
    write.write_all(line.as_bytes()).await?;
    write.write_all(b"\r\n").await
}
