//! `JigsyncServer` builder, accept loop, and background sweeper.
//!
//! This ties together all the layers:
//! transport → protocol → router → room registry, with sessions alongside.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use jigsync_protocol::{Codec, JsonCodec};
use jigsync_room::{RoomConfig, RoomRegistry};
use jigsync_session::{SessionConfig, SessionManager};
use jigsync_transport::{Transport, WebSocketTransport};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::config::ServerConfig;
use crate::handler::handle_connection;
use crate::router::EventRouter;
use crate::JigsyncError;

/// Pause after a failed `accept` before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Shared server state passed to each connection handler task.
///
/// The router and the session manager have separate locks; no code path
/// holds both at once.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) router: EventRouter,
    pub(crate) sessions: Mutex<SessionManager>,
    pub(crate) codec: C,
    pub(crate) handshake_timeout: Duration,
}

/// Builder for configuring and starting a Jigsync server.
///
/// # Example
///
/// ```rust,no_run
/// use jigsync::prelude::*;
///
/// # async fn start() -> Result<(), JigsyncError> {
/// let server = JigsyncServer::builder()
///     .bind("0.0.0.0:8080")
///     .echo_progress(true)
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct JigsyncServerBuilder {
    config: ServerConfig,
}

impl JigsyncServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::from_config(ServerConfig::default())
    }

    /// Starts from an existing config, e.g. one read from the environment.
    pub fn from_config(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets the room configuration.
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.config.room = config;
        self
    }

    /// Sets the session configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.config.session = config;
        self
    }

    /// Whether progress updates are also sent back to their sender.
    pub fn echo_progress(mut self, echo: bool) -> Self {
        self.config.echo_progress = echo;
        self
    }

    /// Sets how long a new socket may take to finish its WebSocket upgrade.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    /// Sets how often stale sessions and idle rooms are swept.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    /// Binds the listener and assembles the server state.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build(self) -> Result<JigsyncServer<JsonCodec>, JigsyncError> {
        let ServerConfig {
            bind_addr,
            room,
            session,
            echo_progress,
            sweep_interval,
            handshake_timeout,
        } = self.config;

        if sweep_interval.is_zero() {
            return Err(JigsyncError::Config("sweep interval must be non-zero".into()));
        }
        if handshake_timeout.is_zero() {
            return Err(JigsyncError::Config("handshake timeout must be non-zero".into()));
        }

        let transport = WebSocketTransport::bind(&bind_addr).await?;

        let state = Arc::new(ServerState {
            router: EventRouter::new(RoomRegistry::new(room), echo_progress),
            sessions: Mutex::new(SessionManager::new(session)),
            codec: JsonCodec,
            handshake_timeout,
        });

        Ok(JigsyncServer {
            transport,
            state,
            sweep_interval,
        })
    }
}

impl Default for JigsyncServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Jigsync server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct JigsyncServer<C: Codec = JsonCodec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
    sweep_interval: Duration,
}

impl JigsyncServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> JigsyncServerBuilder {
        JigsyncServerBuilder::new()
    }
}

impl<C: Codec> JigsyncServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, JigsyncError> {
        Ok(self.transport.local_addr()?)
    }

    /// Runs the accept loop and the sweeper.
    ///
    /// Only takes sockets off the listener; the WebSocket upgrade runs in
    /// each connection's own task. Runs until the returned future is
    /// dropped; the sweeper stops with it.
    pub async fn run(mut self) -> Result<(), JigsyncError> {
        tracing::info!(addr = ?self.transport.local_addr().ok(), "Jigsync server running");

        let _sweeper = SweeperGuard(tokio::spawn(sweep_loop(
            Arc::clone(&self.state),
            self.sweep_interval,
        )));

        loop {
            match self.transport.accept().await {
                Ok(incoming) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(incoming, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    // Usually fd exhaustion; retrying at once would spin.
                    tracing::error!(error = %e, "accept failed, backing off");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }
    }
}

/// Aborts the sweeper when `run` ends or is cancelled.
struct SweeperGuard(JoinHandle<()>);

impl Drop for SweeperGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn sweep_loop<C: Codec>(state: Arc<ServerState<C>>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    // The first tick completes immediately.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        sweep(&state).await;
    }
}

/// One sweeper pass: expire sessions past their grace, then reap idle
/// rooms.
async fn sweep<C: Codec>(state: &ServerState<C>) {
    let expired = {
        let mut sessions = state.sessions.lock().await;
        let expired = sessions.expire_stale();
        sessions.cleanup_expired();
        expired.len()
    };
    let reaped = state.router.reap_idle(Instant::now()).await;

    if expired > 0 || reaped > 0 {
        tracing::debug!(expired_sessions = expired, reaped_rooms = reaped, "sweep finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_binds_ephemeral_port() {
        let server = JigsyncServer::builder()
            .bind("127.0.0.1:0")
            .build()
            .await
            .unwrap();
        assert_ne!(server.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn test_build_rejects_zero_sweep_interval() {
        let result = JigsyncServer::builder()
            .bind("127.0.0.1:0")
            .sweep_interval(Duration::ZERO)
            .build()
            .await;
        assert!(matches!(result, Err(JigsyncError::Config(_))));
    }

    #[tokio::test]
    async fn test_build_rejects_zero_handshake_timeout() {
        let result = JigsyncServer::builder()
            .bind("127.0.0.1:0")
            .handshake_timeout(Duration::ZERO)
            .build()
            .await;
        assert!(matches!(result, Err(JigsyncError::Config(_))));
    }

    #[tokio::test]
    async fn test_sweep_expires_disconnected_sessions() {
        let state = ServerState {
            router: EventRouter::new(RoomRegistry::default(), false),
            sessions: Mutex::new(SessionManager::new(SessionConfig { resume_grace_secs: 0 })),
            codec: JsonCodec,
            handshake_timeout: Duration::from_secs(1),
        };
        let id = state.sessions.lock().await.open().client_id;
        state.sessions.lock().await.disconnect(id).unwrap();

        sweep(&state).await;
        assert!(state.sessions.lock().await.get(&id).is_none());
    }
}
