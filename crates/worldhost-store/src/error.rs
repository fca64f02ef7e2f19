use std::path::PathBuf;

use worldhost_protocol::ServerId;

/// Errors raised by a [`ServerStore`](crate::ServerStore).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached at all.
    #[error("cannot open store at {}: {source}", .path.display())]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading or writing the backing storage failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The stored document could not be decoded (or encoded).
    #[error("malformed store document: {0}")]
    Malformed(#[from] serde_json::Error),

    /// An update targeted an id with no row.
    #[error("no server with id {0}")]
    UnknownServer(ServerId),

    /// The store refuses writes.
    #[error("store is read-only")]
    ReadOnly,
}
