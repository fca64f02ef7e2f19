//! Error types of the orchestration layer.
//!
//! Classification follows the boot policy: [`BootError`] aborts the whole
//! boot, [`InstanceError`] concerns one instance, and the non-fatal store
//! failures surface as plain [`StoreError`] values in the
//! [`BootReport`](crate::BootReport).

use worldhost_protocol::{ProtocolError, ServerId};
use worldhost_session::SessionError;
use worldhost_store::StoreError;
use worldhost_transport::TransportError;

use crate::config::{ConfigError, PropertyError};

/// Fatal for the boot: no instance is left running.
#[derive(Debug, thiserror::Error)]
pub enum BootError {
    /// The configuration file could not be read or parsed.
    #[error("config load failed: {0}")]
    ConfigLoad(#[from] ConfigError),

    /// The store could not be opened.
    #[error("store connect failed: {0}")]
    StoreConnect(#[source] StoreError),

    /// The server definitions could not be read.
    #[error("store query failed: {0}")]
    StoreQuery(#[source] StoreError),

    /// An instance could not be constructed.
    #[error("instance {id} could not be constructed: {source}")]
    Instance {
        id: ServerId,
        #[source]
        source: InstanceError,
    },
}

/// Errors scoped to a single game server instance.
#[derive(Debug, thiserror::Error)]
pub enum InstanceError {
    /// A global setting the instance reads at construction is malformed.
    #[error("config parse failed: {0}")]
    ConfigParse(#[from] PropertyError),

    /// The instance's private runtime could not be started.
    #[error("cannot start instance runtime: {0}")]
    Runtime(#[source] std::io::Error),

    /// The listener could not be bound.
    #[error(transparent)]
    Bind(#[from] TransportError),
}

/// Why a client connection ended abnormally.
#[derive(Debug, thiserror::Error)]
pub(crate) enum ConnectionError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_error() {
        let err = ConfigError::Read {
            path: "worldhost.toml".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        let boot: BootError = err.into();
        assert!(matches!(boot, BootError::ConfigLoad(_)));
        assert!(boot.to_string().contains("worldhost.toml"));
    }

    #[test]
    fn test_from_property_error() {
        let err = PropertyError::Missing("chat.forcesafechat".into());
        let instance: InstanceError = err.into();
        assert!(matches!(instance, InstanceError::ConfigParse(_)));
    }

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::BindFailed {
            addr: "127.0.0.1:7777".parse().unwrap(),
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
        };
        let instance: InstanceError = err.into();
        assert!(matches!(instance, InstanceError::Bind(_)));
        assert!(instance.to_string().contains("7777"));
    }

    #[test]
    fn test_instance_error_names_server() {
        let err = BootError::Instance {
            id: ServerId(3),
            source: PropertyError::Missing("x".into()).into(),
        };
        assert!(err.to_string().contains("S-3"));
    }
}
