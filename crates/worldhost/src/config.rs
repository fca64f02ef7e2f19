//! Process configuration: where the store lives, how instances bind, and the
//! free-form [`Properties`] map shared with commands and plugins.
//!
//! ```toml
//! bind_host = "0.0.0.0"
//! workers_per_instance = 2
//! plugins = ["greeter"]
//!
//! [store]
//! path = "gameservers.json"
//!
//! [limits]
//! login_timeout_ms = 5000
//! idle_timeout_ms = 60000
//! outbox_capacity = 256
//!
//! [properties]
//! chat.forcesafechat = 0
//! ```

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};
use std::num::ParseIntError;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Property key of the forced safe-chat toggle. `0` enables chat on every
/// instance, any other integer disables it.
pub const FORCE_SAFE_CHAT: &str = "chat.forcesafechat";

/// Failure to load the configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Failure to interpret a single property.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PropertyError {
    #[error("property {0} is not set")]
    Missing(String),

    #[error("property {key} = {value:?} is not an integer: {source}")]
    NotAnInteger {
        key: String,
        value: String,
        #[source]
        source: ParseIntError,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Path of the JSON store document.
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub store: StoreConfig,

    /// Address every instance binds its port on.
    #[serde(default = "default_bind_host")]
    pub bind_host: IpAddr,

    /// Worker threads in each instance's private runtime.
    #[serde(default = "default_workers")]
    pub workers_per_instance: usize,

    /// Plugins to enable, by name.
    #[serde(default)]
    pub plugins: Vec<String>,

    #[serde(default)]
    pub limits: ConnectionLimits,

    #[serde(default)]
    pub properties: Properties,
}

/// Per-connection limits applied by every instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectionLimits {
    /// Time a new connection gets to finish the WebSocket handshake and,
    /// separately, to send `login`.
    pub login_timeout_ms: u64,
    /// A logged-in connection that sends nothing for this long is closed.
    /// Messages sent to the client do not count as activity.
    pub idle_timeout_ms: u64,
    /// Messages queued for one user before it is kicked as too slow.
    pub outbox_capacity: usize,
}

impl ConnectionLimits {
    pub fn login_timeout(&self) -> Duration {
        Duration::from_millis(self.login_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

impl Default for ConnectionLimits {
    fn default() -> Self {
        Self {
            login_timeout_ms: 5_000,
            idle_timeout_ms: 60_000,
            outbox_capacity: 256,
        }
    }
}

fn default_bind_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_workers() -> usize {
    2
}

impl Config {
    /// Reads and parses a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// A config pointing at `store_path`, with defaults everywhere else.
    pub fn new(store_path: impl Into<PathBuf>) -> Self {
        Self {
            store: StoreConfig {
                path: store_path.into(),
            },
            bind_host: default_bind_host(),
            workers_per_instance: default_workers(),
            plugins: Vec::new(),
            limits: ConnectionLimits::default(),
            properties: Properties::default(),
        }
    }
}

/// Process-wide string settings.
///
/// Values are kept as text; callers decide how to interpret them, so a
/// malformed value surfaces where it is used. Nested TOML tables are
/// flattened into dotted keys, which makes `chat.forcesafechat = 0` and
/// `"chat.forcesafechat" = "0"` equivalent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "BTreeMap<String, toml::Value>")]
pub struct Properties {
    entries: BTreeMap<String, String>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Parses a property as a 32-bit integer, exactly as written. No
    /// fallback: a missing value, surrounding whitespace, or a number out
    /// of `i32` range is an error.
    pub fn get_i32(&self, key: &str) -> Result<i32, PropertyError> {
        let value = self
            .get(key)
            .ok_or_else(|| PropertyError::Missing(key.to_owned()))?;
        value
            .parse()
            .map_err(|source| PropertyError::NotAnInteger {
                key: key.to_owned(),
                value: value.to_owned(),
                source,
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<BTreeMap<String, toml::Value>> for Properties {
    fn from(table: BTreeMap<String, toml::Value>) -> Self {
        let mut entries = BTreeMap::new();
        for (key, value) in table {
            flatten_into(&mut entries, key, value);
        }
        Self { entries }
    }
}

fn flatten_into(entries: &mut BTreeMap<String, String>, key: String, value: toml::Value) {
    match value {
        toml::Value::Table(table) => {
            for (child, value) in table {
                flatten_into(entries, format!("{key}.{child}"), value);
            }
        }
        toml::Value::String(s) => {
            entries.insert(key, s);
        }
        other => {
            entries.insert(key, other.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config: Config = toml::from_str(
            r#"
            bind_host = "127.0.0.1"
            workers_per_instance = 4
            plugins = ["greeter", "audit"]

            [store]
            path = "servers.json"

            [properties]
            chat.forcesafechat = 0
            "motd" = "welcome"
            "#,
        )
        .expect("should parse");

        assert_eq!(config.bind_host, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(config.workers_per_instance, 4);
        assert_eq!(config.plugins, vec!["greeter", "audit"]);
        assert_eq!(config.store.path, PathBuf::from("servers.json"));
        assert_eq!(config.properties.get(FORCE_SAFE_CHAT), Some("0"));
        assert_eq!(config.properties.get("motd"), Some("welcome"));
    }

    #[test]
    fn test_defaults_apply_when_omitted() {
        let config: Config = toml::from_str("[store]\npath = \"s.json\"").unwrap();
        assert_eq!(config.bind_host, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(config.workers_per_instance, 2);
        assert!(config.plugins.is_empty());
        assert!(config.properties.is_empty());
    }

    #[test]
    fn test_properties_keep_scalars_as_text() {
        let config: Config = toml::from_str(
            r#"
            [store]
            path = "s.json"
            [properties]
            "chat.forcesafechat" = "1"
            limit = 2.5
            open = true
            "#,
        )
        .unwrap();
        let props = &config.properties;
        assert_eq!(props.get(FORCE_SAFE_CHAT), Some("1"));
        assert_eq!(props.get("limit"), Some("2.5"));
        assert_eq!(props.get("open"), Some("true"));
    }

    #[test]
    fn test_get_i32_parses_integers() {
        let props = Properties::new().with("a", "0").with("b", "+12").with("c", "-3");
        assert_eq!(props.get_i32("a"), Ok(0));
        assert_eq!(props.get_i32("b"), Ok(12));
        assert_eq!(props.get_i32("c"), Ok(-3));
    }

    #[test]
    fn test_get_i32_rejects_whitespace_and_out_of_range() {
        let props = Properties::new()
            .with("padded", "0 ")
            .with("leading", " 0")
            .with("big", "3000000000")
            .with("max", "2147483647");
        for key in ["padded", "leading", "big"] {
            assert!(
                matches!(props.get_i32(key), Err(PropertyError::NotAnInteger { .. })),
                "{key} should be rejected"
            );
        }
        assert_eq!(props.get_i32("max"), Ok(i32::MAX));
    }

    #[test]
    fn test_limits_default_and_override() {
        let config: Config = toml::from_str(
            r#"
            [store]
            path = "s.json"
            [limits]
            idle_timeout_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(config.limits.idle_timeout(), Duration::from_millis(250));
        assert_eq!(config.limits.login_timeout(), Duration::from_secs(5));
        assert_eq!(config.limits.outbox_capacity, 256);
    }

    #[test]
    fn test_get_i32_missing_key_is_error() {
        let props = Properties::new();
        assert_eq!(
            props.get_i32(FORCE_SAFE_CHAT),
            Err(PropertyError::Missing(FORCE_SAFE_CHAT.into()))
        );
    }

    #[test]
    fn test_get_i32_non_numeric_is_error() {
        let props = Properties::new().with(FORCE_SAFE_CHAT, "yes");
        assert!(matches!(
            props.get_i32(FORCE_SAFE_CHAT),
            Err(PropertyError::NotAnInteger { .. })
        ));
    }

    #[test]
    fn test_load_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(dir.path().join("nope.toml"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_load_bad_toml_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "store = [ unterminated").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse { .. })));
    }
}
