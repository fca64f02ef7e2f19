//! Boot sequencing: from a config file to a running set of instances.
//!
//! ```text
//! ConfigLoading → StoreConnecting → RowFetching
//!     → InstanceProvisioning(1..=N) → CountReporting → ExtensionLoading → Ready
//! ```
//!
//! The first three states and instance construction are fatal on failure.
//! Within `InstanceProvisioning`, a bind failure or a failed key write only
//! affects that row: the instance is still registered and the loop moves
//! on. Everything runs on the calling thread, one row at a time.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use worldhost_protocol::ServerId;
use worldhost_store::{JsonFileStore, ServerRow, ServerStore, StoreError};

use crate::commands::CommandRegistry;
use crate::config::{Config, StoreConfig};
use crate::instance::GameServer;
use crate::keygen::KeyGenerator;
use crate::plugins::{Plugin, PluginContext, PluginManager};
use crate::registry::{Registry, RegistryBuilder};
use crate::{BootError, InstanceError};

/// Where the configuration comes from.
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// A TOML file, read during `ConfigLoading`.
    File(PathBuf),
    /// An already-built config; `ConfigLoading` cannot fail.
    Inline(Config),
}

/// Opens the store named by the config.
pub trait StoreConnector {
    fn connect(&self, config: &StoreConfig) -> Result<Arc<dyn ServerStore>, StoreError>;
}

/// Connects to a [`JsonFileStore`] at `store.path`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFileConnector;

impl StoreConnector for JsonFileConnector {
    fn connect(&self, config: &StoreConfig) -> Result<Arc<dyn ServerStore>, StoreError> {
        let store = JsonFileStore::open(&config.path)?;
        Ok(Arc::new(store))
    }
}

/// An already-open store, used as is. The config's store section is ignored.
impl<S: ServerStore + 'static> StoreConnector for Arc<S> {
    fn connect(&self, _config: &StoreConfig) -> Result<Arc<dyn ServerStore>, StoreError> {
        let store: Arc<dyn ServerStore> = Arc::clone(self) as Arc<dyn ServerStore>;
        Ok(store)
    }
}

/// The states of the boot sequence, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootState {
    ConfigLoading,
    StoreConnecting,
    RowFetching,
    InstanceProvisioning { index: usize, total: usize },
    CountReporting,
    ExtensionLoading,
    Ready,
}

impl fmt::Display for BootState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigLoading => write!(f, "ConfigLoading"),
            Self::StoreConnecting => write!(f, "StoreConnecting"),
            Self::RowFetching => write!(f, "RowFetching"),
            Self::InstanceProvisioning { index, total } => {
                write!(f, "InstanceProvisioning({index}/{total})")
            }
            Self::CountReporting => write!(f, "CountReporting"),
            Self::ExtensionLoading => write!(f, "ExtensionLoading"),
            Self::Ready => write!(f, "Ready"),
        }
    }
}

/// What happened to one row during boot.
#[derive(Debug)]
pub struct InstanceReport {
    pub id: ServerId,
    pub name: String,
    pub port: u16,
    pub local_addr: Option<SocketAddr>,
    pub bind_error: Option<InstanceError>,
    pub key_error: Option<StoreError>,
    pub count_error: Option<StoreError>,
}

impl InstanceReport {
    fn new(row: &ServerRow) -> Self {
        Self {
            id: row.id,
            name: row.name.clone(),
            port: row.port,
            local_addr: None,
            bind_error: None,
            key_error: None,
            count_error: None,
        }
    }

    pub fn listening(&self) -> bool {
        self.local_addr.is_some()
    }

    pub fn key_persisted(&self) -> bool {
        self.key_error.is_none()
    }

    pub fn count_reported(&self) -> bool {
        self.count_error.is_none()
    }
}

/// Per-instance outcomes, in registry order.
#[derive(Debug, Default)]
pub struct BootReport {
    pub instances: Vec<InstanceReport>,
}

impl BootReport {
    pub fn listening_count(&self) -> usize {
        self.instances.iter().filter(|r| r.listening()).count()
    }

    pub fn get(&self, id: ServerId) -> Option<&InstanceReport> {
        self.instances.iter().find(|r| r.id == id)
    }
}

/// A completed boot. Dropping it stops every instance's runtime.
pub struct Booted {
    pub registry: Arc<Registry>,
    pub commands: Arc<CommandRegistry>,
    /// Names of the plugins that loaded.
    pub plugins: Vec<String>,
    pub report: BootReport,
}

/// Runs the boot sequence.
///
/// # Example
///
/// ```rust,no_run
/// use worldhost::prelude::*;
///
/// let booted = BootSequencer::new(ConfigSource::File("worldhost.toml".into()))
///     .boot()
///     .expect("boot failed");
/// println!("{} instances", booted.registry.len());
/// ```
pub struct BootSequencer {
    config: ConfigSource,
    connector: Box<dyn StoreConnector>,
    plugins: PluginManager,
}

impl BootSequencer {
    /// A sequencer using the JSON file store and no plugins.
    pub fn new(config: ConfigSource) -> Self {
        Self {
            config,
            connector: Box::new(JsonFileConnector),
            plugins: PluginManager::new(),
        }
    }

    /// Replaces the store connector.
    pub fn store_connector(mut self, connector: impl StoreConnector + 'static) -> Self {
        self.connector = Box::new(connector);
        self
    }

    /// Makes a plugin available. It loads only if the config enables it.
    pub fn plugin(mut self, plugin: impl Plugin + 'static) -> Self {
        self.plugins.register(Box::new(plugin));
        self
    }

    /// Boots every instance defined in the store.
    ///
    /// Must be called outside of any async runtime: each instance starts
    /// its own.
    ///
    /// # Errors
    /// [`BootError`] when config loading, store access, or instance
    /// construction fails. Instances created before the failure are
    /// shut down again.
    pub fn boot(self) -> Result<Booted, BootError> {
        enter(BootState::ConfigLoading);
        let config = match self.config {
            ConfigSource::File(path) => Config::load(&path)?,
            ConfigSource::Inline(config) => config,
        };

        enter(BootState::StoreConnecting);
        let store = self
            .connector
            .connect(&config.store)
            .map_err(BootError::StoreConnect)?;

        enter(BootState::RowFetching);
        let rows = store.fetch_servers().map_err(BootError::StoreQuery)?;
        tracing::info!(count = rows.len(), "server definitions fetched");

        let keygen = KeyGenerator::secret_key();
        let mut rng = rand::rng();
        let mut builder = RegistryBuilder::new(config.properties.clone());
        let mut reports = Vec::with_capacity(rows.len());

        for (index, row) in rows.iter().enumerate() {
            enter(BootState::InstanceProvisioning {
                index: index + 1,
                total: rows.len(),
            });
            let mut report = InstanceReport::new(row);

            let mut instance = GameServer::with_limits(row, &config.properties, config.limits)
                .map_err(|source| BootError::Instance { id: row.id, source })?;
            tracing::info!(server_id = %row.id, port = row.port, "starting game server");

            match instance.bind(config.bind_host, config.workers_per_instance) {
                Ok(addr) => report.local_addr = Some(addr),
                Err(e) => {
                    tracing::error!(
                        server_id = %row.id,
                        port = row.port,
                        error = %e,
                        "failed to start listener (is the port already in use?)"
                    );
                    report.bind_error = Some(e);
                }
            }

            if let Err(e) = instance.provision_secret_key(&keygen, &mut rng, store.as_ref()) {
                tracing::warn!(
                    server_id = %row.id,
                    error = %e,
                    "secret key not persisted; store and instance disagree"
                );
                report.key_error = Some(e);
            }

            builder.register(instance);
            reports.push(report);
        }

        enter(BootState::CountReporting);
        let registry = builder.build();
        for (instance, report) in registry.instances().iter().zip(reports.iter_mut()) {
            if let Err(e) = instance.report_user_count(store.as_ref()) {
                tracing::warn!(server_id = %instance.id(), error = %e, "player count not reported");
                report.count_error = Some(e);
            }
            if instance.is_listening() {
                tracing::info!(server = %instance.name(), "game server is ready for connections");
            }
        }

        enter(BootState::ExtensionLoading);
        let mut commands = CommandRegistry::with_builtins();
        let plugins = {
            let mut ctx = PluginContext::new(&registry, &mut commands);
            self.plugins.load_plugins(&config.plugins, &mut ctx)
        };
        let commands = Arc::new(commands);
        for instance in registry.instances() {
            instance.publish(&registry, &commands);
        }

        enter(BootState::Ready);
        let report = BootReport { instances: reports };
        tracing::info!(
            instances = registry.len(),
            listening = report.listening_count(),
            plugins = plugins.len(),
            "boot complete"
        );

        Ok(Booted {
            registry,
            commands,
            plugins,
            report,
        })
    }
}

fn enter(state: BootState) {
    tracing::debug!(%state, "boot state");
}
