//! User session management for worldhost.
//!
//! Every game instance owns one [`SessionManager`]: the only path to the
//! users connected to that instance. Cross-instance lookups go through the
//! registry in the `worldhost` crate, which asks each instance's manager in
//! turn.
//!
//! ```text
//! Registry (above)  ← scans every instance's SessionManager
//!     ↕
//! Session Layer (this crate)  ← who is connected to this instance
//!     ↕
//! Protocol / Transport (below)  ← UserId, ServerMessage, ConnectionId
//! ```

mod error;
mod manager;
mod user;

pub use error::SessionError;
pub use manager::SessionManager;
pub use user::User;
