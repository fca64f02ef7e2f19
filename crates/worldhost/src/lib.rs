//! # worldhost
//!
//! Boots and supervises several independent game server instances in one
//! process. Each instance serves its own world on its own port; they share
//! a [`Registry`] for cross-instance user lookup and a store of record for
//! their definitions, secret keys, and player counts.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use worldhost::prelude::*;
//!
//! let booted = BootSequencer::new(ConfigSource::File("worldhost.toml".into()))
//!     .boot()?;
//! for instance in booted.registry.instances() {
//!     println!("{} on {:?}", instance.name(), instance.local_addr());
//! }
//! # Ok::<(), BootError>(())
//! ```

mod boot;
mod commands;
mod config;
mod error;
mod games;
mod handler;
mod instance;
mod keygen;
mod plugins;
mod registry;

pub use boot::{
    BootReport, BootSequencer, BootState, Booted, ConfigSource, InstanceReport,
    JsonFileConnector, StoreConnector,
};
pub use commands::{Command, CommandContext, CommandError, CommandRegistry};
pub use config::{
    Config, ConfigError, ConnectionLimits, FORCE_SAFE_CHAT, Properties, PropertyError, StoreConfig,
};
pub use error::{BootError, InstanceError};
pub use games::{GameModules, MatchLobby};
pub use instance::GameServer;
pub use keygen::{ALPHANUMERIC, KeyError, KeyGenerator, SECRET_KEY_LENGTH};
pub use plugins::{Plugin, PluginContext, PluginError, PluginManager};
pub use registry::{Registry, RegistryBuilder};

/// Everything needed to boot and extend a server, plus the shared ids
/// and messages.
pub mod prelude {
    pub use crate::{
        BootError, BootSequencer, Booted, Command, CommandContext, CommandError, Config,
        ConfigSource, GameServer, Plugin, PluginContext, PluginError, Properties, Registry,
    };
    pub use worldhost_protocol::{ClientMessage, GameKind, ServerId, ServerMessage, UserId};
    pub use worldhost_session::User;
    pub use worldhost_store::{MemoryStore, ServerRecord, ServerStore};
}
