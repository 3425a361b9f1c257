//! Event router: client events in, addressed server events out.
//!
//! [`route`] is the pure translation from one [`ClientEvent`] to registry
//! calls and `(Recipient, ServerEvent)` pairs. [`EventRouter`] wraps it
//! with the lock and the per-client outboxes.
//!
//! Recipients are resolved and events enqueued while the lock is still
//! held, so every client sees broadcasts in the order the registry
//! applied the changes.

use std::collections::HashMap;
use std::time::Instant;

use jigsync_protocol::{ClientEvent, ClientId, ErrorCode, Recipient, RoomId, ServerEvent};
use jigsync_room::{Departure, RoomError, RoomRegistry, StartDecision};
use tokio::sync::{mpsc, Mutex};

/// Channel feeding one connection's socket writer.
pub type Outbox = mpsc::UnboundedSender<ServerEvent>;

/// Translates one client event into registry calls and outbound events.
///
/// `echo_progress` decides whether a progress update is also sent back
/// to its sender.
pub fn route(
    registry: &mut RoomRegistry,
    sender: ClientId,
    event: ClientEvent,
    echo_progress: bool,
) -> Vec<(Recipient, ServerEvent)> {
    let mut out = Vec::new();

    match event {
        ClientEvent::CreateGame => {
            let room_id = registry.create_room();
            match registry.join_room(&room_id, sender) {
                Ok(outcome) => {
                    out.extend(outcome.previous.as_ref().and_then(departure_notice));
                    out.push((Recipient::Client(sender), ServerEvent::GameCreated { room_id }));
                }
                Err(e) => out.push(join_error(sender, &e)),
            }
        }

        ClientEvent::JoinGame { room_id } => match registry.join_room(&room_id, sender) {
            Ok(outcome) => {
                out.extend(outcome.previous.as_ref().and_then(departure_notice));
                out.push((
                    Recipient::Room(room_id),
                    ServerEvent::PlayerJoined { player_count: outcome.member_count },
                ));
            }
            Err(e) => out.push(join_error(sender, &e)),
        },

        ClientEvent::PlayerReady { room_id } => match registry.mark_ready(&room_id, sender) {
            Ok(StartDecision::StartGame) => {
                out.push((Recipient::Room(room_id), ServerEvent::GameStart));
            }
            Ok(StartDecision::NoAction) => {}
            Err(e) => out.push(error_reply(sender, &e)),
        },

        ClientEvent::UpdateProgress { room_id, progress } => {
            match registry.update_progress(&room_id, sender, progress) {
                Ok(update) => {
                    let recipient = if echo_progress {
                        Recipient::Room(room_id)
                    } else {
                        Recipient::RoomExcept(room_id, sender)
                    };
                    out.push((
                        recipient,
                        ServerEvent::ProgressUpdate {
                            player_id: update.client_id,
                            progress: update.progress,
                        },
                    ));
                }
                Err(e) => out.push(error_reply(sender, &e)),
            }
        }

        // Identity is the connection layer's business.
        ClientEvent::ResumeSession { .. } => {
            tracing::debug!(%sender, "resume_session reached the router, ignoring");
        }
    }

    out
}

/// The broadcast owed to a room someone just left, if it still exists.
pub fn departure_notice(departure: &Departure) -> Option<(Recipient, ServerEvent)> {
    match departure {
        Departure::Left { room_id, member_count } => Some((
            Recipient::Room(room_id.clone()),
            ServerEvent::PlayerLeft { player_count: *member_count },
        )),
        Departure::Destroyed { .. } => None,
    }
}

/// Maps a room error to its wire code.
pub fn error_code(err: &RoomError) -> ErrorCode {
    match err {
        RoomError::RoomNotFound(_) => ErrorCode::RoomNotFound,
        RoomError::RoomAlreadyStarted(_) => ErrorCode::RoomAlreadyStarted,
        RoomError::NotAMember(..) => ErrorCode::NotAMember,
        RoomError::InvalidProgress { .. } => ErrorCode::InvalidProgress,
    }
}

fn join_error(sender: ClientId, err: &RoomError) -> (Recipient, ServerEvent) {
    (Recipient::Client(sender), ServerEvent::JoinError { message: err.to_string() })
}

fn error_reply(sender: ClientId, err: &RoomError) -> (Recipient, ServerEvent) {
    (
        Recipient::Client(sender),
        ServerEvent::Error { code: error_code(err), message: err.to_string() },
    )
}

// ---------------------------------------------------------------------------
// EventRouter
// ---------------------------------------------------------------------------

struct RouterState {
    registry: RoomRegistry,
    outboxes: HashMap<ClientId, Outbox>,
}

impl RouterState {
    /// Resolves recipients against current membership and enqueues.
    fn dispatch(&self, msgs: Vec<(Recipient, ServerEvent)>) {
        for (recipient, event) in msgs {
            match recipient {
                Recipient::Client(client_id) => self.send_to(client_id, event),
                Recipient::Room(room_id) => {
                    for client_id in self.registry.members(&room_id) {
                        self.send_to(client_id, event.clone());
                    }
                }
                Recipient::RoomExcept(room_id, excluded) => {
                    for client_id in self.registry.members(&room_id) {
                        if client_id != excluded {
                            self.send_to(client_id, event.clone());
                        }
                    }
                }
                Recipient::Clients(ids) => {
                    for client_id in ids {
                        self.send_to(client_id, event.clone());
                    }
                }
            }
        }
    }

    /// Fire-and-forget; a closed outbox means the client is already gone.
    fn send_to(&self, client_id: ClientId, event: ServerEvent) {
        if let Some(outbox) = self.outboxes.get(&client_id) {
            let _ = outbox.send(event);
        }
    }
}

/// Owns the room registry and every connected client's outbox.
///
/// One mutex guards both, so each operation (including its broadcasts)
/// completes before the next begins.
pub struct EventRouter {
    state: Mutex<RouterState>,
    echo_progress: bool,
}

impl EventRouter {
    /// Creates a router around an existing registry.
    pub fn new(registry: RoomRegistry, echo_progress: bool) -> Self {
        Self {
            state: Mutex::new(RouterState {
                registry,
                outboxes: HashMap::new(),
            }),
            echo_progress,
        }
    }

    /// Registers the outbox for a newly connected client.
    pub async fn connect(&self, client_id: ClientId, outbox: Outbox) {
        self.state.lock().await.outboxes.insert(client_id, outbox);
    }

    /// Handles one client event and delivers the resulting broadcasts.
    pub async fn handle(&self, sender: ClientId, event: ClientEvent) {
        let mut state = self.state.lock().await;
        let msgs = route(&mut state.registry, sender, event, self.echo_progress);
        state.dispatch(msgs);
    }

    /// Forgets a client: drops its outbox, removes it from its room, and
    /// tells the remaining members.
    pub async fn disconnect(&self, client_id: ClientId) -> Option<Departure> {
        let mut state = self.state.lock().await;
        state.outboxes.remove(&client_id);
        let departure = state.registry.remove_client(client_id);
        if let Some(notice) = departure.as_ref().and_then(departure_notice) {
            state.dispatch(vec![notice]);
        }
        departure
    }

    /// Moves an outbox from one identity to another. Used when a
    /// connection resumes an earlier session.
    pub async fn rebind(&self, from: ClientId, to: ClientId) {
        let mut state = self.state.lock().await;
        if let Some(outbox) = state.outboxes.remove(&from) {
            state.outboxes.insert(to, outbox);
        }
    }

    /// Evicts idle rooms and tells their former members. Returns how many
    /// rooms were closed.
    pub async fn reap_idle(&self, now: Instant) -> usize {
        let mut state = self.state.lock().await;
        let reaped = state.registry.reap_idle(now);
        let count = reaped.len();
        let msgs = reaped
            .into_iter()
            .map(|room| {
                (
                    Recipient::Clients(room.members),
                    ServerEvent::RoomClosed { room_id: room.room_id },
                )
            })
            .collect();
        state.dispatch(msgs);
        count
    }

    /// The room a client is in, if any.
    pub async fn client_room(&self, client_id: ClientId) -> Option<RoomId> {
        self.state.lock().await.registry.client_room(&client_id).cloned()
    }

    /// Returns the number of live rooms.
    pub async fn room_count(&self) -> usize {
        self.state.lock().await.registry.room_count()
    }
}

// =========================================================================
// Tests
// =========================================================================
