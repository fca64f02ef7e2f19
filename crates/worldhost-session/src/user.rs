//! The connected user: identity plus a handle to its connection's outbox.

use tokio::sync::{Notify, mpsc};
use tokio::sync::mpsc::error::TrySendError;
use worldhost_protocol::{ServerId, ServerMessage, UserId};
use worldhost_transport::ConnectionId;

use crate::SessionError;

/// A user connected to one game instance.
///
/// Shared as `Arc<User>`: the owning [`SessionManager`](crate::SessionManager)
/// holds one reference, lookups hand out clones of the same `Arc`. Two
/// lookups for the same connected user are therefore pointer-equal no matter
/// which instance's thread performed them.
#[derive(Debug)]
pub struct User {
    id: UserId,
    name: String,
    server_id: ServerId,
    connection: ConnectionId,
    outbound: mpsc::Sender<ServerMessage>,
    kick: Notify,
}

impl User {
    /// Creates a user bound to a connection's outbound queue.
    ///
    /// The queue's capacity is the backlog a slow reader may build up
    /// before it is kicked.
    pub fn new(
        id: UserId,
        name: impl Into<String>,
        server_id: ServerId,
        connection: ConnectionId,
        outbound: mpsc::Sender<ServerMessage>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            server_id,
            connection,
            outbound,
            kick: Notify::new(),
        }
    }

    pub fn id(&self) -> UserId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The instance this user is connected to.
    pub fn server_id(&self) -> ServerId {
        self.server_id
    }

    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    /// Queues a message for delivery on the user's connection.
    ///
    /// Never blocks; the connection task drains the queue. Safe to call
    /// from any thread, including another instance's workers.
    ///
    /// # Errors
    /// [`SessionError::Disconnected`] if the connection task has ended.
    /// [`SessionError::Backlogged`] if the queue is full; the user is then
    /// kicked (see [`kicked`](Self::kicked)).
    pub fn send(&self, msg: ServerMessage) -> Result<(), SessionError> {
        match self.outbound.try_send(msg) {
            Ok(()) => Ok(()),
            Err(TrySendError::Closed(_)) => Err(SessionError::Disconnected(self.id)),
            Err(TrySendError::Full(_)) => {
                tracing::warn!(user_id = %self.id, "outbound queue full, kicking user");
                self.kick.notify_one();
                Err(SessionError::Backlogged(self.id))
            }
        }
    }

    /// Resolves once the user has been kicked for not keeping up.
    /// The connection task is expected to close the connection then.
    pub async fn kicked(&self) {
        self.kick.notified().await;
    }
}
