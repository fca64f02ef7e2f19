//! Store of record for game server instances.
//!
//! The store holds one row per instance (`id`, `name`, `port`) and receives
//! the per-boot secret key and the reported player count. Boot reads the
//! rows once, in ascending id order, then writes back per row.
//!
//! Two implementations ship with the crate:
//!
//! - [`JsonFileStore`]: a JSON document on disk, opened per operation.
//! - [`MemoryStore`]: in-process, for tests and embedding.

mod error;
mod file;
mod memory;
mod row;

pub use error::StoreError;
pub use file::JsonFileStore;
pub use memory::MemoryStore;
pub use row::{ServerRecord, ServerRow};

use worldhost_protocol::ServerId;

/// Read and write access to the server definitions table.
///
/// Implementations must be `Send + Sync`; the boot sequencer holds one as a
/// trait object. Every call is a single synchronous attempt, no retries.
pub trait ServerStore: Send + Sync {
    /// Returns every server definition, ordered by ascending id.
    fn fetch_servers(&self) -> Result<Vec<ServerRow>, StoreError>;

    /// Overwrites the stored secret key of server `id`.
    fn update_secret_key(&self, id: ServerId, secret_key: &str) -> Result<(), StoreError>;

    /// Overwrites the stored player count of server `id`.
    fn update_player_count(&self, id: ServerId, player_count: usize) -> Result<(), StoreError>;
}
