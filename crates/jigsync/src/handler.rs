//! Per-connection handler: upgrade, identity, inbound frames, outbound drain.
//!
//! Each accepted socket gets its own Tokio task running this handler.
//! The flow is:
//!   1. Complete the WebSocket upgrade, bounded by the handshake timeout
//!   2. Open a session → send `session_started`
//!   3. Register the outbox with the router
//!   4. Loop: decode inbound frames and route them, while draining the
//!      outbox into the socket
//!   5. Remove the client from its room, start the session's grace
//!      period, then close the socket

use std::sync::Arc;

use jigsync_protocol::{ClientEvent, ClientId, Codec, ErrorCode, ProtocolError, ServerEvent};
use jigsync_session::SessionError;
use jigsync_transport::{
    Connection, Incoming, PendingWebSocket, TransportError, WebSocketConnection,
};
use tokio::sync::mpsc;

use crate::router::Outbox;
use crate::server::ServerState;
use crate::JigsyncError;

/// Tears a client down when the handler exits.
///
/// The normal exit path awaits [`release`](Self::release). If the task
/// panics or is cancelled first, `Drop` spawns the same teardown.
struct ConnectionGuard<C: Codec> {
    client_id: ClientId,
    state: Arc<ServerState<C>>,
    released: bool,
}

impl<C: Codec> ConnectionGuard<C> {
    async fn release(&mut self) {
        teardown(&self.state, self.client_id).await;
        self.released = true;
    }
}

impl<C: Codec> Drop for ConnectionGuard<C> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let client_id = self.client_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            teardown(&state, client_id).await;
        });
    }
}

async fn teardown<C: Codec>(state: &ServerState<C>, client_id: ClientId) {
    state.router.disconnect(client_id).await;
    let _ = state.sessions.lock().await.disconnect(client_id);
}

/// Handles a single socket from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    incoming: PendingWebSocket,
    state: Arc<ServerState<C>>,
) -> Result<(), JigsyncError> {
    let peer = incoming.peer_addr();
    let conn = tokio::time::timeout(state.handshake_timeout, incoming.upgrade())
        .await
        .map_err(|_| TransportError::HandshakeTimedOut(peer))??;
    let conn_id = conn.id();

    let (client_id, token) = {
        let mut sessions = state.sessions.lock().await;
        let session = sessions.open();
        (session.client_id, session.resume_token.clone())
    };

    let (outbox, mut inbox) = mpsc::unbounded_channel();
    state.router.connect(client_id, outbox.clone()).await;
    let mut guard = ConnectionGuard {
        client_id,
        state: Arc::clone(&state),
        released: false,
    };
    tracing::info!(%conn_id, %client_id, %peer, "client connected");

    let _ = outbox.send(ServerEvent::SessionStarted { client_id, token });

    let result = pump(&conn, &state, &mut guard, &outbox, &mut inbox).await;

    // Teardown finishes before the socket closes, so a peer that has
    // seen the close can resume this identity straight away.
    guard.release().await;
    if let Err(e) = conn.close().await {
        tracing::trace!(%conn_id, error = %e, "close after disconnect");
    }
    result
}

/// Moves frames both ways until the peer goes away or a send fails.
async fn pump<C: Codec>(
    conn: &WebSocketConnection,
    state: &ServerState<C>,
    guard: &mut ConnectionGuard<C>,
    outbox: &Outbox,
    inbox: &mut mpsc::UnboundedReceiver<ServerEvent>,
) -> Result<(), JigsyncError> {
    loop {
        tokio::select! {
            incoming = conn.recv() => {
                let data = match incoming {
                    Ok(Some(data)) => data,
                    Ok(None) => {
                        tracing::info!(client_id = %guard.client_id, "connection closed cleanly");
                        return Ok(());
                    }
                    Err(e) => {
                        tracing::debug!(client_id = %guard.client_id, error = %e, "recv error");
                        return Ok(());
                    }
                };
                handle_frame(state, guard, outbox, &data).await;
            }
            Some(event) = inbox.recv() => {
                let bytes = state.codec.encode(&event)?;
                conn.send(&bytes).await?;
            }
        }
    }
}

/// Parses one frame and applies the boundary checks.
fn decode_event<C: Codec>(codec: &C, data: &[u8]) -> Result<ClientEvent, ProtocolError> {
    let event: ClientEvent = codec.decode(data)?;
    event.validate()?;
    Ok(event)
}

/// Decodes one inbound frame and acts on it.
async fn handle_frame<C: Codec>(
    state: &ServerState<C>,
    guard: &mut ConnectionGuard<C>,
    outbox: &Outbox,
    data: &[u8],
) {
    let client_id = guard.client_id;

    let event = match decode_event(&state.codec, data) {
        Ok(event) => event,
        Err(e) => {
            tracing::debug!(%client_id, error = %e, "rejected client frame");
            reply_error(outbox, ErrorCode::MalformedMessage, e.to_string());
            return;
        }
    };

    match event {
        ClientEvent::ResumeSession { token } => {
            resume_session(state, guard, outbox, &token).await;
        }
        event => state.router.handle(client_id, event).await,
    }
}

/// Re-binds this connection to the identity that owns `token`.
///
/// Only allowed while the current identity is in no room. The throwaway
/// identity the connection started with is discarded on success.
///
/// The old identity counts as connected until its own handler has seen
/// the socket close. A client that reconnects before that happens gets
/// `session_in_use` and may simply send `resume_session` again.
async fn resume_session<C: Codec>(
    state: &ServerState<C>,
    guard: &mut ConnectionGuard<C>,
    outbox: &Outbox,
    token: &str,
) {
    let current = guard.client_id;

    if let Some(room_id) = state.router.client_room(current).await {
        tracing::debug!(%current, %room_id, "resume refused while in a room");
        reply_error(
            outbox,
            ErrorCode::SessionInUse,
            format!("client {current} is in room {room_id}"),
        );
        return;
    }

    let resumed = {
        let mut sessions = state.sessions.lock().await;
        let resumed = sessions.resume(token).map(|session| session.client_id);
        if resumed.is_ok() {
            sessions.discard(current);
        }
        resumed
    };

    match resumed {
        Ok(client_id) => {
            state.router.rebind(current, client_id).await;
            guard.client_id = client_id;
            tracing::info!(from = %current, %client_id, "connection resumed session");
            let _ = outbox.send(ServerEvent::SessionResumed { client_id });
        }
        Err(e) => {
            tracing::debug!(%current, error = %e, "resume failed");
            reply_error(outbox, session_error_code(&e), e.to_string());
        }
    }
}

fn reply_error(outbox: &Outbox, code: ErrorCode, message: String) {
    let _ = outbox.send(ServerEvent::Error { code, message });
}

/// Maps a session error to its wire code.
fn session_error_code(err: &SessionError) -> ErrorCode {
    match err {
        SessionError::NotFound(_) | SessionError::InvalidToken => ErrorCode::InvalidSession,
        SessionError::SessionExpired(_) => ErrorCode::SessionExpired,
        SessionError::AlreadyConnected(_) => ErrorCode::SessionInUse,
    }
}
