//! The session manager: tracks the users connected to one instance.
//!
//! # Concurrency note
//!
//! `SessionManager` is not thread-safe by itself; it is a plain `HashMap`.
//! The owning instance wraps it in a lock, and every connection task of
//! that instance (plus cross-instance lookups) goes through that lock.

use std::collections::HashMap;
use std::sync::Arc;

use worldhost_protocol::UserId;
use worldhost_transport::ConnectionId;

use crate::{SessionError, User};

/// Manages the users connected to a single game instance.
///
/// ```text
/// Login ──→ create() ──→ [connected] ──→ remove() (connection closed)
/// ```
#[derive(Debug, Default)]
pub struct SessionManager {
    /// Connected users, keyed by user id. At most one session per user.
    users: HashMap<UserId, Arc<User>>,
}

impl SessionManager {
    /// Creates a new, empty session manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly logged-in user.
    ///
    /// # Errors
    /// Returns [`SessionError::AlreadyConnected`] if the user already has a
    /// session on this instance.
    pub fn create(&mut self, user: User) -> Result<Arc<User>, SessionError> {
        let user_id = user.id();
        if self.users.contains_key(&user_id) {
            return Err(SessionError::AlreadyConnected(user_id));
        }

        let user = Arc::new(user);
        self.users.insert(user_id, Arc::clone(&user));

        tracing::info!(%user_id, server_id = %user.server_id(), "session created");
        Ok(user)
    }

    /// Removes a user's session.
    ///
    /// Only removes the session if it still belongs to `connection`: a
    /// connection that lost a login race must not tear down the winner.
    ///
    /// # Errors
    /// Returns [`SessionError::NotFound`] if no matching session exists.
    pub fn remove(
        &mut self,
        user_id: UserId,
        connection: ConnectionId,
    ) -> Result<Arc<User>, SessionError> {
        match self.users.get(&user_id) {
            Some(user) if user.connection() == connection => {}
            _ => return Err(SessionError::NotFound(user_id)),
        }
        let user = self
            .users
            .remove(&user_id)
            .ok_or(SessionError::NotFound(user_id))?;
        tracing::info!(%user_id, "session removed");
        Ok(user)
    }

    /// Looks up a connected user by id.
    pub fn find_user_by_id(&self, user_id: UserId) -> Option<Arc<User>> {
        self.users.get(&user_id).cloned()
    }

    /// Number of connected users.
    pub fn count(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Snapshot of all connected users.
    pub fn users(&self) -> Vec<Arc<User>> {
        self.users.values().cloned().collect()
    }
}
