//! One game server instance: a world with its own port, sessions, and games.
//!
//! Lifecycle during boot:
//!
//! ```text
//! new() ──→ bind() ──→ provision_secret_key() ──→ (registered) ──→ report_user_count()
//!            │
//!            └─ failure: logged by the caller, instance stays without listener
//! ```

use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::RwLock;
use rand::Rng;
use worldhost_protocol::{JsonCodec, ServerId, UserId};
use worldhost_session::{SessionError, SessionManager, User};
use worldhost_store::{ServerRow, ServerStore, StoreError};
use worldhost_transport::{ConnectionId, Transport, WebSocketTransport};

use crate::commands::CommandRegistry;
use crate::config::{ConnectionLimits, FORCE_SAFE_CHAT, Properties};
use crate::games::GameModules;
use crate::handler::handle_connection;
use crate::keygen::KeyGenerator;
use crate::registry::Registry;
use crate::InstanceError;

/// What connection handlers get once boot reaches `Ready`.
pub(crate) struct Ready {
    pub(crate) registry: Weak<Registry>,
    pub(crate) commands: Arc<CommandRegistry>,
}

/// State shared between an instance and its connection tasks.
///
/// Wrapped in `Arc` so each connection task holds a cheap clone.
pub(crate) struct WorldState {
    pub(crate) id: ServerId,
    pub(crate) name: String,
    pub(crate) chat_enabled: bool,
    pub(crate) sessions: RwLock<SessionManager>,
    pub(crate) games: GameModules,
    pub(crate) codec: JsonCodec,
    pub(crate) limits: ConnectionLimits,
    /// Set exactly once, after the registry is complete.
    pub(crate) ready: OnceLock<Ready>,
}

/// The instance's private runtime: acceptor plus worker pool.
struct Listener {
    runtime: Option<tokio::runtime::Runtime>,
    local_addr: SocketAddr,
}

impl Drop for Listener {
    fn drop(&mut self) {
        // A blocking shutdown would panic if the last reference goes away
        // inside some async context.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// A game server instance.
pub struct GameServer {
    state: Arc<WorldState>,
    port: u16,
    secret_key: String,
    listener: Option<Listener>,
}

impl GameServer {
    /// Constructs an instance from its store row, with default
    /// connection limits.
    ///
    /// Reads [`FORCE_SAFE_CHAT`] from `properties`: chat is enabled iff the
    /// value is the integer `0`.
    ///
    /// # Errors
    /// [`InstanceError::ConfigParse`] if the property is missing or not an
    /// integer. There is no default.
    pub fn new(row: &ServerRow, properties: &Properties) -> Result<Self, InstanceError> {
        Self::with_limits(row, properties, ConnectionLimits::default())
    }

    /// Like [`new`](Self::new), with explicit connection limits.
    pub fn with_limits(
        row: &ServerRow,
        properties: &Properties,
        limits: ConnectionLimits,
    ) -> Result<Self, InstanceError> {
        let chat_enabled = properties.get_i32(FORCE_SAFE_CHAT)? == 0;

        let state = Arc::new(WorldState {
            id: row.id,
            name: row.name.clone(),
            chat_enabled,
            sessions: RwLock::new(SessionManager::new()),
            games: GameModules::new(),
            codec: JsonCodec,
            limits,
            ready: OnceLock::new(),
        });

        Ok(Self {
            state,
            port: row.port,
            secret_key: String::new(),
            listener: None,
        })
    }

    /// Starts this instance's listener on `host:port`.
    ///
    /// Builds a dedicated multi-thread runtime named `world-<id>` with
    /// `workers` threads, binds the WebSocket listener on it, and spawns
    /// the accept loop there. Nothing is shared with other instances.
    ///
    /// Must not be called from inside an async context.
    ///
    /// # Errors
    /// [`InstanceError::Bind`] if the port can't be bound (e.g. in use),
    /// [`InstanceError::Runtime`] if the threads can't be started. Either
    /// way the instance is left without a listener.
    pub fn bind(&mut self, host: IpAddr, workers: usize) -> Result<SocketAddr, InstanceError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(workers.max(1))
            .thread_name(format!("world-{}", self.state.id.0))
            .enable_all()
            .build()
            .map_err(InstanceError::Runtime)?;

        let addr = SocketAddr::new(host, self.port);
        let transport = runtime.block_on(WebSocketTransport::bind(addr))?;
        let local_addr = transport.local_addr()?;

        runtime.spawn(accept_loop(transport, Arc::clone(&self.state)));

        tracing::info!(server_id = %self.state.id, %local_addr, "instance listening");
        self.listener = Some(Listener {
            runtime: Some(runtime),
            local_addr,
        });
        Ok(local_addr)
    }

    /// Generates a fresh secret key, keeps it, and writes it to the store.
    ///
    /// The key is assigned before the write is attempted, so a failed write
    /// leaves the instance with a usable in-memory key that the store does
    /// not know about.
    pub fn provision_secret_key<R: Rng + ?Sized>(
        &mut self,
        keygen: &KeyGenerator,
        rng: &mut R,
        store: &dyn ServerStore,
    ) -> Result<(), StoreError> {
        self.secret_key = keygen.produce(rng);
        store.update_secret_key(self.state.id, &self.secret_key)
    }

    /// Pushes the current user count to the store. Returns the count sent.
    pub fn report_user_count(&self, store: &dyn ServerStore) -> Result<usize, StoreError> {
        let count = self.user_count();
        store.update_player_count(self.state.id, count)?;
        Ok(count)
    }

    pub fn id(&self) -> ServerId {
        self.state.id
    }

    pub fn name(&self) -> &str {
        &self.state.name
    }

    /// The port from the store row.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn chat_enabled(&self) -> bool {
        self.state.chat_enabled
    }

    /// Empty until boot has provisioned the key.
    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }

    /// The bound address, or `None` if the instance has no listener.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().map(|l| l.local_addr)
    }

    pub fn is_listening(&self) -> bool {
        self.listener.is_some()
    }

    pub fn games(&self) -> &GameModules {
        &self.state.games
    }

    pub fn user_count(&self) -> usize {
        self.state.sessions.read().count()
    }

    pub fn find_user_by_id(&self, user_id: UserId) -> Option<Arc<User>> {
        self.state.sessions.read().find_user_by_id(user_id)
    }

    pub fn users(&self) -> Vec<Arc<User>> {
        self.state.sessions.read().users()
    }

    /// Adds a user to this instance's session manager.
    pub fn connect_user(&self, user: User) -> Result<Arc<User>, SessionError> {
        self.state.sessions.write().create(user)
    }

    /// Removes a user's session, provided it still belongs to `connection`.
    pub fn disconnect_user(
        &self,
        user_id: UserId,
        connection: ConnectionId,
    ) -> Result<Arc<User>, SessionError> {
        self.state.games.withdraw_everywhere(user_id);
        self.state.sessions.write().remove(user_id, connection)
    }

    /// Hands the finished registry and commands to this instance's
    /// connection handlers. Only the first call has an effect.
    pub(crate) fn publish(&self, registry: &Arc<Registry>, commands: &Arc<CommandRegistry>) {
        let ready = Ready {
            registry: Arc::downgrade(registry),
            commands: Arc::clone(commands),
        };
        if self.state.ready.set(ready).is_err() {
            tracing::warn!(server_id = %self.state.id, "instance already published");
        }
    }
}

impl std::fmt::Debug for GameServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameServer")
            .field("id", &self.state.id)
            .field("name", &self.state.name)
            .field("port", &self.port)
            .field("chat_enabled", &self.state.chat_enabled)
            .field("local_addr", &self.local_addr())
            .finish_non_exhaustive()
    }
}

/// Accepts connections until the instance's runtime shuts down.
///
/// Only the TCP accept happens here; every handshake runs in the
/// connection's own task.
async fn accept_loop(mut transport: WebSocketTransport, state: Arc<WorldState>) {
    loop {
        match transport.accept().await {
            Ok(pending) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(pending, Arc::clone(&state)).await {
                        tracing::debug!(
                            server_id = %state.id,
                            error = %e,
                            "connection ended with error"
                        );
                    }
                });
            }
            Err(e) => {
                tracing::warn!(server_id = %state.id, error = %e, "accept failed");
            }
        }
    }
}
