//! Multiplayer game lobbies owned by one instance.
//!
//! A lobby only pairs players; the rules of each game live elsewhere.

use std::collections::VecDeque;

use parking_lot::Mutex;
use worldhost_protocol::{GameKind, UserId};

/// First-come first-served pairing queue for one game.
#[derive(Debug)]
pub struct MatchLobby {
    kind: GameKind,
    waiting: Mutex<VecDeque<UserId>>,
}

impl MatchLobby {
    pub fn new(kind: GameKind) -> Self {
        Self {
            kind,
            waiting: Mutex::new(VecDeque::new()),
        }
    }

    pub fn kind(&self) -> GameKind {
        self.kind
    }

    /// Queues `user`. If someone was already waiting, both are taken off
    /// the queue and returned as `(waiting, user)`.
    ///
    /// A user already in the queue stays queued once.
    pub fn enqueue(&self, user: UserId) -> Option<(UserId, UserId)> {
        let mut waiting = self.waiting.lock();
        if waiting.contains(&user) {
            return None;
        }
        match waiting.pop_front() {
            Some(opponent) => Some((opponent, user)),
            None => {
                waiting.push_back(user);
                None
            }
        }
    }

    /// Removes `user` from the queue. Returns whether it was queued.
    pub fn withdraw(&self, user: UserId) -> bool {
        let mut waiting = self.waiting.lock();
        let before = waiting.len();
        waiting.retain(|u| *u != user);
        waiting.len() != before
    }

    pub fn waiting_count(&self) -> usize {
        self.waiting.lock().len()
    }
}

/// The game modules of one instance, shared by all of its connections.
#[derive(Debug)]
pub struct GameModules {
    four_boom: MatchLobby,
    rock_paper_scissors: MatchLobby,
}

impl GameModules {
    pub fn new() -> Self {
        Self {
            four_boom: MatchLobby::new(GameKind::FourBoom),
            rock_paper_scissors: MatchLobby::new(GameKind::RockPaperScissors),
        }
    }

    pub fn lobby(&self, kind: GameKind) -> &MatchLobby {
        match kind {
            GameKind::FourBoom => &self.four_boom,
            GameKind::RockPaperScissors => &self.rock_paper_scissors,
        }
    }

    /// Removes `user` from every lobby (on disconnect).
    pub fn withdraw_everywhere(&self, user: UserId) {
        for kind in GameKind::ALL {
            self.lobby(kind).withdraw(user);
        }
    }
}

impl Default for GameModules {
    fn default() -> Self {
        Self::new()
    }
}
