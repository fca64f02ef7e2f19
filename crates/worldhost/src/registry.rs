//! The process-wide collection of game server instances.
//!
//! Built once during boot through [`RegistryBuilder`], then frozen into an
//! immutable [`Registry`]. No reader sees the registry before it is
//! complete: the builder is owned by the boot sequence and only the
//! finished `Arc<Registry>` is handed out.

use std::sync::Arc;

use worldhost_protocol::{ServerId, UserId};
use worldhost_session::User;

use crate::config::Properties;
use crate::instance::GameServer;

/// Append-only collector used during boot.
pub struct RegistryBuilder {
    instances: Vec<Arc<GameServer>>,
    properties: Properties,
}

impl RegistryBuilder {
    pub fn new(properties: Properties) -> Self {
        Self {
            instances: Vec::new(),
            properties,
        }
    }

    /// Appends an instance. Ids are not checked for uniqueness; the store is
    /// trusted to hand out distinct ids.
    pub fn register(&mut self, instance: GameServer) -> &Arc<GameServer> {
        self.instances.push(Arc::new(instance));
        let index = self.instances.len() - 1;
        &self.instances[index]
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Freezes the collection.
    pub fn build(self) -> Arc<Registry> {
        Arc::new(Registry {
            instances: self.instances,
            properties: self.properties,
        })
    }
}

/// Every instance of this process, in registration order (ascending store
/// id). Read-only: safe to query from any instance's threads without
/// locking.
pub struct Registry {
    instances: Vec<Arc<GameServer>>,
    properties: Properties,
}

impl Registry {
    /// Finds a user connected to any instance.
    ///
    /// Asks each instance's session manager in registration order and
    /// returns the first hit. Each call rescans; nothing is cached.
    pub fn find_user_by_id(&self, user_id: UserId) -> Option<Arc<User>> {
        self.instances
            .iter()
            .find_map(|instance| instance.find_user_by_id(user_id))
    }

    /// The global configuration properties.
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn instances(&self) -> &[Arc<GameServer>] {
        &self.instances
    }

    /// The first instance registered with `id`.
    pub fn get(&self, id: ServerId) -> Option<&Arc<GameServer>> {
        self.instances.iter().find(|instance| instance.id() == id)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Users connected across all instances.
    pub fn total_user_count(&self) -> usize {
        self.instances.iter().map(|i| i.user_count()).sum()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("instances", &self.instances)
            .finish_non_exhaustive()
    }
}
