//! Core protocol types: identities and the messages exchanged with clients.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Identifier of a game server instance, as assigned by the store.
///
/// Never generated by the process itself; it is the `id` column of the
/// server definitions table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerId(pub u32);

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.0)
    }
}

/// A unique identifier for a user (player account).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U-{}", self.0)
    }
}

/// The multiplayer games every instance hosts a lobby for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameKind {
    FourBoom,
    RockPaperScissors,
}

impl GameKind {
    /// Every hosted game, in a stable order.
    pub const ALL: [GameKind; 2] = [GameKind::FourBoom, GameKind::RockPaperScissors];
}

impl fmt::Display for GameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FourBoom => write!(f, "four_boom"),
            Self::RockPaperScissors => write!(f, "rock_paper_scissors"),
        }
    }
}

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// Messages a client sends to the instance it is connected to.
///
/// Serialized with an internal `type` tag:
/// `{"type":"whisper","to":42,"text":"hi"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Must be the first message on a connection.
    Login { user_id: UserId, name: String },

    /// Liveness check; answered with [`ServerMessage::Pong`].
    Ping,

    /// Room chat on this instance. Text starting with `!` is a command.
    Chat { text: String },

    /// Private message to a user on any instance.
    Whisper { to: UserId, text: String },

    /// Queue for a match in one of the instance's game lobbies.
    JoinGame { game: GameKind },

    /// Leave a lobby queue.
    LeaveGame { game: GameKind },

    /// Ends the session.
    Logout,
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Messages an instance sends to a connected client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Login accepted.
    Welcome {
        server_id: ServerId,
        server_name: String,
        chat_enabled: bool,
    },

    Pong,

    /// A chat line from another user of the same instance.
    Chat { from: UserId, name: String, text: String },

    /// A private message, possibly from a user on another instance.
    Whisper {
        from: UserId,
        name: String,
        server_id: ServerId,
        text: String,
    },

    /// Output of a `!command`.
    CommandOutput { command: String, output: String },

    /// Two users were paired in a game lobby.
    MatchFound { game: GameKind, opponent: UserId },

    /// A request failed. Codes follow HTTP conventions (400, 403, 404, 409, 503).
    Error { code: u16, message: String },
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;

    #[test]
    fn test_ids_display() {
        assert_eq!(ServerId(3).to_string(), "S-3");
        assert_eq!(UserId(42).to_string(), "U-42");
    }

    #[test]
    fn test_server_id_orders_numerically() {
        let mut ids = vec![ServerId(10), ServerId(2), ServerId(7)];
        ids.sort();
        assert_eq!(ids, vec![ServerId(2), ServerId(7), ServerId(10)]);
    }

    #[test]
    fn test_game_kind_display_matches_wire_name() {
        for kind in GameKind::ALL {
            let wire = serde_json::to_string(&kind).unwrap();
            assert_eq!(wire, format!("\"{kind}\""));
        }
    }
}
