// Path: crates/core/src/game.rs

//! The core's player-session RPC and the dispatcher seam behind it.
//!
//! The world model and real command dispatcher are domain territory and
//! hang off [`dispatch`] later; the handful of built-ins here keep the
//! gateway relay path real end to end.

use holomush_identity::verify_peer;
use holomush_ipc::game::game_session_server::{GameSession, GameSessionServer};
use holomush_ipc::game::{
    AttachRequest, AttachResponse, CommandRequest, CommandResponse, DetachRequest, DetachResponse,
};
use holomush_store::EventStore;
use holomush_types::error::RuntimeError;
use sqlx::Row;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::transport::{Server, ServerTlsConfig};
use tonic::{Request, Response, Status};

struct AttachedSession {
    remote_addr: String,
    attached_at: Instant,
}

struct GameState {
    game_id: String,
    store: Arc<EventStore>,
    sessions: Mutex<HashMap<String, AttachedSession>>,
}

/// Implementation of the `GameSession` gRPC service.
#[derive(Clone)]
struct GameService {
    state: Arc<GameState>,
}

impl GameService {
    async fn dispatch(&self, line: &str) -> Result<Vec<String>, Status> {
        let trimmed = line.trim();
        let (verb, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (trimmed, ""),
        };

        match verb {
            "" => Ok(vec![]),
            "look" => self.look().await,
            "say" => Ok(vec![format!("You say, \"{rest}\"")]),
            "who" => {
                let sessions = self.state.sessions.lock().await;
                Ok(vec![format!("{} player(s) connected.", sessions.len())])
            }
            _ => Ok(vec![format!("Huh? (\"{verb}\" is not a command.)")]),
        }
    }

    async fn look(&self) -> Result<Vec<String>, Status> {
        let row = sqlx::query("SELECT name, description FROM objects WHERE key = $1")
            .bind("room:limbo")
            .fetch_optional(self.state.store.pool())
            .await
            .map_err(|e| Status::internal(format!("world lookup failed: {e}")))?;
        match row {
            Some(row) => {
                let name: String = row.try_get("name").map_err(|e| Status::internal(e.to_string()))?;
                let description: String = row
                    .try_get("description")
                    .map_err(|e| Status::internal(e.to_string()))?;
                Ok(vec![name, description])
            }
            None => Ok(vec!["You see nothing here.".to_string()]),
        }
    }

    fn observe(route: &'static str, started: Instant, result: &Result<(), &Status>) {
        let status = match result {
            Ok(()) => "ok",
            Err(s) => s.code().description(),
        };
        holomush_telemetry::rpc_metrics().inc_requests_total(route, status);
        holomush_telemetry::rpc_metrics()
            .observe_request_duration(route, started.elapsed().as_secs_f64());
        if result.is_err() {
            holomush_telemetry::error_metrics().inc_error("rpc", route);
        }
    }
}

#[tonic::async_trait]
impl GameSession for GameService {
    async fn attach(
        &self,
        request: Request<AttachRequest>,
    ) -> Result<Response<AttachResponse>, Status> {
        let started = Instant::now();
        verify_peer(&request, &self.state.game_id)?;
        let req = request.into_inner();

        let mut sessions = self.state.sessions.lock().await;
        sessions.insert(
            req.session_id.clone(),
            AttachedSession {
                remote_addr: req.remote_addr.clone(),
                attached_at: started,
            },
        );
        drop(sessions);

        tracing::info!(
            session = %req.session_id,
            remote = %req.remote_addr,
            "session attached"
        );
        Self::observe("attach", started, &Ok(()));
        Ok(Response::new(AttachResponse {
            banner: format!("HoloMUSH ({})\r\nType `look` to get your bearings.", self.state.game_id),
        }))
    }

    async fn player_command(
        &self,
        request: Request<CommandRequest>,
    ) -> Result<Response<CommandResponse>, Status> {
        let started = Instant::now();
        verify_peer(&request, &self.state.game_id)?;
        let req = request.into_inner();

        let attached = self.state.sessions.lock().await.contains_key(&req.session_id);
        if !attached {
            let status = Status::failed_precondition("session is not attached");
            Self::observe("player_command", started, &Err(&status));
            return Err(status);
        }

        match self.dispatch(&req.line).await {
            Ok(output) => {
                Self::observe("player_command", started, &Ok(()));
                Ok(Response::new(CommandResponse { output }))
            }
            Err(status) => {
                Self::observe("player_command", started, &Err(&status));
                Err(status)
            }
        }
    }

    async fn detach(
        &self,
        request: Request<DetachRequest>,
    ) -> Result<Response<DetachResponse>, Status> {
        let started = Instant::now();
        verify_peer(&request, &self.state.game_id)?;
        let req = request.into_inner();

        if let Some(session) = self.state.sessions.lock().await.remove(&req.session_id) {
            tracing::info!(
                session = %req.session_id,
                remote = %session.remote_addr,
                connected_for = ?session.attached_at.elapsed(),
                "session detached"
            );
        }
        Self::observe("detach", started, &Ok(()));
        Ok(Response::new(DetachResponse {}))
    }
}

/// A started game service listener.
pub struct GameHandle {
    /// The bound address (useful when the configured port was 0).
    pub local_addr: std::net::SocketAddr,
    stop: CancellationToken,
    task: JoinHandle<()>,
}

impl GameHandle {
    /// Gracefully stops accepting new RPCs and drains in-flight ones,
    /// waiting no longer than `deadline`.
    pub async fn stop(self, deadline: Duration) {
        self.stop.cancel();
        if tokio::time::timeout(deadline, self.task).await.is_err() {
            tracing::warn!("game service did not drain within the shutdown deadline");
        }
    }
}

/// Binds the primary game service listener and starts serving.
pub async fn start_game_service(
    addr: &str,
    tls: ServerTlsConfig,
    game_id: String,
    store: Arc<EventStore>,
) -> Result<(GameHandle, mpsc::Receiver<anyhow::Error>), RuntimeError> {
    let listen_err = |reason: String| RuntimeError::Listen {
        addr: addr.to_string(),
        reason,
    };

    // `grpc-addr` accepts host names (default "localhost:9000"); resolve
    // rather than parse.
    let socket_addr = tokio::net::lookup_host(addr)
        .await
        .map_err(|e| listen_err(e.to_string()))?
        .next()
        .ok_or_else(|| listen_err("address resolved to nothing".to_string()))?;
    let listener = tokio::net::TcpListener::bind(socket_addr)
        .await
        .map_err(|e| listen_err(e.to_string()))?;
    let local_addr = listener.local_addr().map_err(|e| listen_err(e.to_string()))?;

    let service = GameService {
        state: Arc::new(GameState {
            game_id,
            store,
            sessions: Mutex::new(HashMap::new()),
        }),
    };
    let router = Server::builder()
        .tls_config(tls)
        .map_err(|e| listen_err(e.to_string()))?
        .add_service(GameSessionServer::new(service));

    tracing::info!(addr = %local_addr, "game service listening");

    let stop = CancellationToken::new();
    let drain = stop.clone();
    let (error_tx, error_rx) = mpsc::channel(1);
    let task = tokio::spawn(async move {
        let incoming = TcpListenerStream::new(listener);
        let served = router
            .serve_with_incoming_shutdown(incoming, drain.cancelled_owned())
            .await;
        if let Err(e) = served {
            let _ = error_tx.send(anyhow::Error::from(e)).await;
        }
    });

    Ok((
        GameHandle {
            local_addr,
            stop,
            task,
        },
        error_rx,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    fn lazy_store() -> Arc<EventStore> {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/holomush_test")
            .unwrap();
        Arc::new(EventStore::from_pool(pool))
    }

    fn service(store: Arc<EventStore>) -> GameService {
        GameService {
            state: Arc::new(GameState {
                game_id: "limbo".into(),
                store,
                sessions: Mutex::new(HashMap::new()),
            }),
        }
    }

    #[tokio::test]
    async fn say_and_unknown_commands_do_not_touch_the_store() {
        let svc = service(lazy_store());

        let said = svc.dispatch("say hello there").await.unwrap();
        assert_eq!(said, vec!["You say, \"hello there\"".to_string()]);

        let huh = svc.dispatch("frobnicate").await.unwrap();
        assert_eq!(huh.len(), 1);
        assert!(huh[0].starts_with("Huh?"));

        let empty = svc.dispatch("   ").await.unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn who_counts_attached_sessions() {
        let svc = service(lazy_store());
        svc.state.sessions.lock().await.insert(
            "s1".into(),
            AttachedSession {
                remote_addr: "127.0.0.1:5".into(),
                attached_at: Instant::now(),
            },
        );

        let who = svc.dispatch("who").await.unwrap();
        assert_eq!(who, vec!["1 player(s) connected.".to_string()]);
    }
}
