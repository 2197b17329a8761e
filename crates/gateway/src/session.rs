// Path: crates/gateway/src/session.rs

//! Per-connection session handlers.
//!
//! Each accepted socket gets its own task: attach to the core, relay input
//! lines through `PlayerCommand`, write responses back, detach on the way
//! out. RPC failures are reported to the player and never terminate the
//! gateway.

use holomush_ipc::game::game_session_client::GameSessionClient;
use holomush_ipc::game::{AttachRequest, CommandRequest, DetachRequest};
use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tonic::transport::Channel;

const UNAVAILABLE_NOTICE: &str = "The game is momentarily unavailable. Try again.";

/// Runs one player connection to completion.
pub async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    mut client: GameSessionClient<Channel>,
    cancel: CancellationToken,
) {
    let session_id = uuid::Uuid::new_v4().to_string();
    holomush_telemetry::gateway_metrics().inc_connected();
    tracing::info!(session = %session_id, peer = %peer, "connection opened");

    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    let attach = client
        .attach(AttachRequest {
            session_id: session_id.clone(),
            remote_addr: peer.to_string(),
        })
        .await;
    match attach {
        Ok(response) => {
            let banner = response.into_inner().banner;
            let _ = write_half.write_all(banner.as_bytes()).await;
            let _ = write_half.write_all(b"\r\n").await;
        }
        Err(status) => {
            tracing::warn!(session = %session_id, error = %status, "attach failed");
            let _ = write_half
                .write_all(format!("{UNAVAILABLE_NOTICE}\r\n").as_bytes())
                .await;
        }
    }

    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line,
        };
        let line = match line {
            Ok(Some(line)) => line,
            // EOF or a dead socket; either way the session is over.
            Ok(None) | Err(_) => break,
        };
        let line = line.trim_end_matches('\r').to_string();

        if line.eq_ignore_ascii_case("quit") {
            let _ = write_half.write_all(b"Goodbye.\r\n").await;
            break;
        }

        match client
            .player_command(CommandRequest {
                session_id: session_id.clone(),
                line,
            })
            .await
        {
            Ok(response) => {
                for output in response.into_inner().output {
                    if write_half
                        .write_all(format!("{output}\r\n").as_bytes())
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
            }
            Err(status) => {
                tracing::warn!(session = %session_id, error = %status, "command relay failed");
                let _ = write_half
                    .write_all(format!("{UNAVAILABLE_NOTICE}\r\n").as_bytes())
                    .await;
            }
        }
    }

    // Best effort: the core reaps the session either way.
    let _ = client
        .detach(DetachRequest {
            session_id: session_id.clone(),
        })
        .await;
    let _ = write_half.shutdown().await;
    holomush_telemetry::gateway_metrics().dec_connected();
    tracing::info!(session = %session_id, peer = %peer, "connection closed");
}
