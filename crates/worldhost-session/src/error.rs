//! Error types for the session layer.

use worldhost_protocol::UserId;

/// Errors that can occur during session management.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The user already has a session on this instance. A user can be
    /// logged in once per instance.
    #[error("user {0} is already connected")]
    AlreadyConnected(UserId),

    /// No session exists for the given user.
    #[error("no session for user {0}")]
    NotFound(UserId),

    /// The user's connection has gone away; queued messages can no
    /// longer be delivered.
    #[error("user {0} is disconnected")]
    Disconnected(UserId),

    /// The user's outbound queue is full. The user is being kicked.
    #[error("user {0} is not keeping up with outbound messages")]
    Backlogged(UserId),
}
