//! Per-connection handler: login, then message routing.
//!
//! Each accepted TCP peer gets its own task on the instance's runtime:
//!   1. WebSocket handshake, bounded by the login timeout
//!   2. Receive `Login` → create the session → send `Welcome`
//!   3. Loop: client messages in, queued server messages out
//!   4. On exit the drop guard removes the session

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{Instant, timeout};
use worldhost_protocol::{ClientMessage, Codec, GameKind, ProtocolError, ServerMessage, UserId};
use worldhost_session::{SessionError, User};
use worldhost_transport::{Connection, ConnectionId, Incoming, PendingWebSocket, WebSocketConnection};

use crate::error::ConnectionError;
use crate::instance::{Ready, WorldState};
use crate::registry::Registry;

/// Removes the user's session and lobby slots when the handler exits,
/// including on error or panic.
struct SessionGuard {
    state: Arc<WorldState>,
    user_id: UserId,
    connection: ConnectionId,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.state.games.withdraw_everywhere(self.user_id);
        let _ = self
            .state
            .sessions
            .write()
            .remove(self.user_id, self.connection);
    }
}

/// Handles a single connection from TCP accept to close.
pub(crate) async fn handle_connection(
    pending: PendingWebSocket,
    state: Arc<WorldState>,
) -> Result<(), ConnectionError> {
    let limits = state.limits;
    let peer = pending.peer_addr();
    let conn = match timeout(limits.login_timeout(), pending.upgrade()).await {
        Ok(upgraded) => upgraded?,
        Err(_) => {
            return Err(ProtocolError::InvalidMessage(format!("handshake from {peer} timed out")).into());
        }
    };
    let conn_id = conn.id();
    tracing::debug!(%conn_id, server_id = %state.id, %peer, "handling new connection");

    let (tx, mut outbound) = mpsc::channel(limits.outbox_capacity.max(1));
    let user = perform_login(&conn, &state, tx).await?;
    let _guard = SessionGuard {
        state: Arc::clone(&state),
        user_id: user.id(),
        connection: conn_id,
    };

    send(
        &conn,
        &state,
        &ServerMessage::Welcome {
            server_id: state.id,
            server_name: state.name.clone(),
            chat_enabled: state.chat_enabled,
        },
    )
    .await?;

    // Only messages from the client push the idle deadline back.
    let mut idle_deadline = Instant::now() + limits.idle_timeout();
    loop {
        tokio::select! {
            Some(msg) = outbound.recv() => {
                send(&conn, &state, &msg).await?;
            }
            () = user.kicked() => {
                tracing::warn!(user_id = %user.id(), "closing connection of slow reader");
                break;
            }
            () = tokio::time::sleep_until(idle_deadline) => {
                tracing::info!(user_id = %user.id(), "connection timed out");
                break;
            }
            received = conn.recv() => {
                let data = match received {
                    Ok(Some(data)) => data,
                    Ok(None) => {
                        tracing::info!(user_id = %user.id(), "connection closed cleanly");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(user_id = %user.id(), error = %e, "recv error");
                        break;
                    }
                };
                idle_deadline = Instant::now() + limits.idle_timeout();

                let msg: ClientMessage = match state.codec.decode(&data) {
                    Ok(msg) => msg,
                    Err(e) => {
                        send_error(&conn, &state, 400, &format!("invalid message: {e}")).await?;
                        continue;
                    }
                };

                if !handle_message(&conn, &state, &user, msg).await? {
                    break;
                }
            }
        }
    }

    let _ = conn.close().await;
    // _guard drops here → session removed.
    Ok(())
}

/// Waits for `Login` and registers the user with the instance.
async fn perform_login(
    conn: &WebSocketConnection,
    state: &Arc<WorldState>,
    outbound: mpsc::Sender<ServerMessage>,
) -> Result<Arc<User>, ConnectionError> {
    let data = match timeout(state.limits.login_timeout(), conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage("connection closed before login".into()).into());
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            let _ = conn.close().await;
            return Err(ProtocolError::InvalidMessage("login timed out".into()).into());
        }
    };

    let (user_id, name) = match state.codec.decode::<ClientMessage>(&data) {
        Ok(ClientMessage::Login { user_id, name }) => (user_id, name),
        Ok(_) => {
            send_error(conn, state, 400, "expected login").await?;
            return Err(ProtocolError::InvalidMessage("first message must be login".into()).into());
        }
        Err(e) => {
            send_error(conn, state, 400, &format!("invalid message: {e}")).await?;
            return Err(e.into());
        }
    };

    let user = User::new(user_id, name, state.id, conn.id(), outbound);
    let created = state.sessions.write().create(user);
    match created {
        Ok(user) => {
            tracing::info!(%user_id, server_id = %state.id, "user logged in");
            Ok(user)
        }
        Err(e) => {
            send_error(conn, state, 409, &e.to_string()).await?;
            Err(e.into())
        }
    }
}

/// Handles one client message. Returns `false` if the connection should close.
async fn handle_message(
    conn: &WebSocketConnection,
    state: &Arc<WorldState>,
    user: &Arc<User>,
    msg: ClientMessage,
) -> Result<bool, ConnectionError> {
    match msg {
        ClientMessage::Login { .. } => {
            send_error(conn, state, 409, "already logged in").await?;
        }

        ClientMessage::Ping => send(conn, state, &ServerMessage::Pong).await?,

        ClientMessage::Chat { text } => match text.strip_prefix('!') {
            Some(line) => run_command(conn, state, user, line).await?,
            None if !state.chat_enabled => {
                send_error(conn, state, 403, "chat is disabled on this server").await?;
            }
            None => broadcast_chat(state, user, text),
        },

        ClientMessage::Whisper { to, text } => {
            if !state.chat_enabled {
                send_error(conn, state, 403, "chat is disabled on this server").await?;
                return Ok(true);
            }
            let Some(registry) = registry(state) else {
                send_error(conn, state, 503, "server is starting").await?;
                return Ok(true);
            };
            let delivered = registry.find_user_by_id(to).map(|target| {
                target.send(ServerMessage::Whisper {
                    from: user.id(),
                    name: user.name().to_owned(),
                    server_id: state.id,
                    text,
                })
            });
            match delivered {
                Some(Ok(())) => {}
                Some(Err(SessionError::Backlogged(_))) => {
                    send_error(conn, state, 503, &format!("user {to} is not keeping up")).await?;
                }
                Some(Err(SessionError::Disconnected(_))) | None => {
                    send_error(conn, state, 404, &format!("user {to} is not online")).await?;
                }
                Some(Err(e)) => send_error(conn, state, 500, &e.to_string()).await?,
            }
        }

        ClientMessage::JoinGame { game } => join_game(state, user, game),

        ClientMessage::LeaveGame { game } => {
            state.games.lobby(game).withdraw(user.id());
        }

        ClientMessage::Logout => {
            tracing::info!(user_id = %user.id(), "user logged out");
            return Ok(false);
        }
    }

    Ok(true)
}

fn registry(state: &WorldState) -> Option<Arc<Registry>> {
    state.ready.get().and_then(|ready| ready.registry.upgrade())
}

async fn run_command(
    conn: &WebSocketConnection,
    state: &Arc<WorldState>,
    user: &Arc<User>,
    line: &str,
) -> Result<(), ConnectionError> {
    let Some(Ready { registry, commands }) = state.ready.get() else {
        return send_error(conn, state, 503, "server is starting").await;
    };
    let Some(registry) = registry.upgrade() else {
        return send_error(conn, state, 503, "server is shutting down").await;
    };

    match commands.dispatch(&registry, user, state.id, line) {
        Ok((command, output)) => {
            send(conn, state, &ServerMessage::CommandOutput { command, output }).await
        }
        Err(e) => send_error(conn, state, 400, &e.to_string()).await,
    }
}

/// Sends a chat line to every user of this instance, sender included.
fn broadcast_chat(state: &WorldState, sender: &User, text: String) {
    let msg = ServerMessage::Chat {
        from: sender.id(),
        name: sender.name().to_owned(),
        text,
    };
    // Snapshot first: never hold the session lock while delivering.
    let users = state.sessions.read().users();
    for user in users {
        if let Err(e) = user.send(msg.clone()) {
            tracing::debug!(user_id = %user.id(), error = %e, "chat not delivered");
        }
    }
}

fn join_game(state: &WorldState, user: &User, game: GameKind) {
    let Some((first, second)) = state.games.lobby(game).enqueue(user.id()) else {
        return;
    };
    tracing::info!(%game, %first, %second, server_id = %state.id, "match found");
    for (player, opponent) in [(first, second), (second, first)] {
        let target = state.sessions.read().find_user_by_id(player);
        if let Some(target) = target {
            let _ = target.send(ServerMessage::MatchFound { game, opponent });
        }
    }
}

async fn send(
    conn: &WebSocketConnection,
    state: &WorldState,
    msg: &ServerMessage,
) -> Result<(), ConnectionError> {
    let bytes = state.codec.encode(msg)?;
    conn.send(&bytes).await?;
    Ok(())
}

async fn send_error(
    conn: &WebSocketConnection,
    state: &WorldState,
    code: u16,
    message: &str,
) -> Result<(), ConnectionError> {
    send(
        conn,
        state,
        &ServerMessage::Error {
            code,
            message: message.to_owned(),
        },
    )
    .await
}
