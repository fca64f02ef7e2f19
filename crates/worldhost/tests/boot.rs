//! Boot sequence tests: ordering, fatal failures, and per-instance isolation.

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use worldhost::prelude::*;
use worldhost::{
    BootError, InstanceError, JsonFileConnector, PropertyError, SECRET_KEY_LENGTH,
};
use worldhost_store::{JsonFileStore, StoreError};

use common::{boot_memory, config, store_config};

fn forest_and_ice() -> Vec<ServerRecord> {
    vec![
        ServerRecord::new(1, "Forest", 0),
        ServerRecord::new(2, "Ice", 0),
    ]
}

#[test]
fn test_boot_from_files_provisions_every_row() {
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("gameservers.json");
    JsonFileStore::create(&store_path, forest_and_ice()).unwrap();
    let config_path = dir.path().join("worldhost.toml");
    std::fs::write(
        &config_path,
        format!(
            "bind_host = \"127.0.0.1\"\nworkers_per_instance = 1\n\n[store]\npath = {:?}\n\n[properties]\nchat.forcesafechat = 0\n",
            store_path.display().to_string()
        ),
    )
    .unwrap();

    let booted = BootSequencer::new(ConfigSource::File(config_path))
        .boot()
        .expect("boot should succeed");

    let registry = &booted.registry;
    assert_eq!(registry.len(), 2);
    let names: Vec<_> = registry.instances().iter().map(|i| i.name().to_owned()).collect();
    assert_eq!(names, vec!["Forest", "Ice"]);
    assert!(registry.instances().iter().all(|i| i.is_listening()));
    assert!(registry.instances().iter().all(|i| i.chat_enabled()));
    assert_eq!(booted.report.listening_count(), 2);

    let records = JsonFileStore::open(&store_path).unwrap().records().unwrap();
    for record in &records {
        let instance = registry.get(record.row.id).unwrap();
        assert_eq!(record.secret_key.len(), SECRET_KEY_LENGTH);
        assert_eq!(record.secret_key, instance.secret_key());
        assert_eq!(record.player_count, 0);
    }
    assert_ne!(records[0].secret_key, records[1].secret_key);
}

#[test]
fn test_boot_registers_rows_in_ascending_id_order() {
    let records = vec![
        ServerRecord::new(3, "Desert", 0),
        ServerRecord::new(1, "Forest", 0),
        ServerRecord::new(2, "Ice", 0),
    ];

    let (booted, _store) = boot_memory(records, config("0"));

    let rows: Vec<_> = booted
        .registry
        .instances()
        .iter()
        .map(|i| (i.id().0, i.name().to_owned()))
        .collect();
    assert_eq!(
        rows,
        vec![
            (1, "Forest".to_owned()),
            (2, "Ice".to_owned()),
            (3, "Desert".to_owned())
        ]
    );
    let reported: Vec<_> = booted.report.instances.iter().map(|r| r.id).collect();
    assert_eq!(reported, vec![ServerId(1), ServerId(2), ServerId(3)]);
}

#[test]
fn test_boot_with_empty_store_is_ready_with_no_instances() {
    let (booted, _store) = boot_memory(Vec::new(), config("0"));
    assert!(booted.registry.is_empty());
    assert!(booted.commands.contains("help"));
}

#[test]
fn test_boot_missing_config_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let result = BootSequencer::new(ConfigSource::File(dir.path().join("absent.toml"))).boot();
    assert!(matches!(result, Err(BootError::ConfigLoad(_))));
}

#[test]
fn test_boot_missing_store_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config("0");
    cfg.store = store_config(&dir.path().join("absent.json"));

    let result = BootSequencer::new(ConfigSource::Inline(cfg))
        .store_connector(JsonFileConnector)
        .boot();

    assert!(matches!(
        result,
        Err(BootError::StoreConnect(StoreError::Connect { .. }))
    ));
}

#[test]
fn test_boot_unreadable_rows_are_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gameservers.json");
    std::fs::write(&path, r#"{"gameservers":[{"id":1,"name":"Forest","port":"seven"}]}"#).unwrap();
    let mut cfg = config("0");
    cfg.store = store_config(&path);

    let result = BootSequencer::new(ConfigSource::Inline(cfg)).boot();

    assert!(matches!(
        result,
        Err(BootError::StoreQuery(StoreError::Malformed(_)))
    ));
}

#[test]
fn test_boot_malformed_chat_setting_aborts() {
    let store = Arc::new(MemoryStore::new(forest_and_ice()));

    let result = BootSequencer::new(ConfigSource::Inline(config("maybe")))
        .store_connector(Arc::clone(&store))
        .boot();

    match result {
        Err(BootError::Instance { id, source }) => {
            assert_eq!(id, ServerId(1));
            assert!(matches!(
                source,
                InstanceError::ConfigParse(PropertyError::NotAnInteger { .. })
            ));
        }
        Err(other) => panic!("expected instance error, got {other}"),
        Ok(_) => panic!("boot should fail"),
    }
    assert_eq!(store.secret_key(ServerId(1)).as_deref(), Some(""));
}

#[test]
fn test_boot_nonzero_chat_setting_disables_chat_everywhere() {
    let (booted, _store) = boot_memory(forest_and_ice(), config("2"));
    assert!(booted.registry.instances().iter().all(|i| !i.chat_enabled()));
}

#[test]
fn test_bind_failure_does_not_stop_other_instances() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = taken.local_addr().unwrap().port();
    let records = vec![
        ServerRecord::new(1, "Forest", 0),
        ServerRecord::new(2, "Ice", port),
        ServerRecord::new(3, "Desert", 0),
    ];

    let (booted, store) = boot_memory(records, config("0"));

    let registry = &booted.registry;
    assert_eq!(registry.len(), 3);
    assert!(registry.get(ServerId(1)).unwrap().is_listening());
    assert!(registry.get(ServerId(3)).unwrap().is_listening());

    let ice = registry.get(ServerId(2)).unwrap();
    assert!(!ice.is_listening());
    assert_eq!(ice.secret_key().len(), SECRET_KEY_LENGTH);
    assert_eq!(store.secret_key(ServerId(2)).as_deref(), Some(ice.secret_key()));

    let report = booted.report.get(ServerId(2)).unwrap();
    assert!(matches!(report.bind_error, Some(InstanceError::Bind(_))));
    assert_eq!(booted.report.listening_count(), 2);

    // The reachable instances really accept connections.
    let rt = common::runtime();
    rt.block_on(async {
        for id in [1, 3] {
            let (_ws, welcome) = common::login(common::addr_of(&booted, id), 10, "pan").await;
            assert!(matches!(welcome, ServerMessage::Welcome { .. }));
        }
    });
}

#[test]
fn test_key_persist_failure_keeps_in_memory_key() {
    let store = Arc::new(MemoryStore::new(forest_and_ice()));
    store.set_read_only(true);

    let booted = BootSequencer::new(ConfigSource::Inline(common::config("0")))
        .store_connector(Arc::clone(&store))
        .boot()
        .expect("write failures are not fatal");

    for instance in booted.registry.instances() {
        assert_eq!(instance.secret_key().len(), SECRET_KEY_LENGTH);
        assert!(instance.is_listening());
        assert_eq!(store.secret_key(instance.id()).as_deref(), Some(""));
    }
    for report in &booted.report.instances {
        assert!(!report.key_persisted());
        assert!(!report.count_reported());
        assert!(report.listening());
    }
}

#[test]
fn test_secret_keys_are_regenerated_every_boot() {
    let store = Arc::new(MemoryStore::new(forest_and_ice()));
    let mut seen = HashSet::new();

    for _ in 0..2 {
        let booted = BootSequencer::new(ConfigSource::Inline(config("0")))
            .store_connector(Arc::clone(&store))
            .boot()
            .unwrap();
        for instance in booted.registry.instances() {
            assert!(seen.insert(instance.secret_key().to_owned()));
            assert_eq!(store.secret_key(instance.id()).as_deref(), Some(instance.secret_key()));
        }
    }
    assert_eq!(seen.len(), 4);
}

#[test]
fn test_player_counts_reported_after_boot() {
    let store = Arc::new(MemoryStore::new(forest_and_ice()));
    for id in [1, 2] {
        store.update_player_count(ServerId(id), 17).unwrap();
    }

    let booted = BootSequencer::new(ConfigSource::Inline(config("0")))
        .store_connector(Arc::clone(&store))
        .boot()
        .unwrap();

    assert_eq!(store.player_count(ServerId(1)), Some(0));
    assert_eq!(store.player_count(ServerId(2)), Some(0));
    assert!(booted.report.instances.iter().all(|r| r.count_reported()));
}

// -- Extensions ------------------------------------------------------------

struct Census {
    seen: Arc<Mutex<Option<(usize, Vec<String>)>>>,
}

impl Plugin for Census {
    fn name(&self) -> &str {
        "census"
    }

    fn on_load(&self, ctx: &mut PluginContext<'_>) -> Result<(), PluginError> {
        let registry = ctx.registry();
        let names = registry.instances().iter().map(|i| i.name().to_owned()).collect();
        *self.seen.lock() = Some((registry.len(), names));
        ctx.register_command("census", Box::new(CensusCommand));
        Ok(())
    }
}

struct CensusCommand;

impl Command for CensusCommand {
    fn description(&self) -> &str {
        "count users everywhere"
    }

    fn execute(&self, ctx: &CommandContext<'_>, _args: &[&str]) -> Result<String, CommandError> {
        Ok(format!("{} online", ctx.registry.total_user_count()))
    }
}

struct Broken;

impl Plugin for Broken {
    fn name(&self) -> &str {
        "broken"
    }

    fn on_load(&self, _ctx: &mut PluginContext<'_>) -> Result<(), PluginError> {
        Err(PluginError::Init("no data".into()))
    }
}

#[test]
fn test_plugins_load_after_registry_is_complete() {
    let seen = Arc::new(Mutex::new(None));
    let mut cfg = config("0");
    cfg.plugins = vec!["broken".into(), "census".into(), "missing".into()];
    let store = Arc::new(MemoryStore::new(forest_and_ice()));

    let booted = BootSequencer::new(ConfigSource::Inline(cfg))
        .store_connector(store)
        .plugin(Broken)
        .plugin(Census {
            seen: Arc::clone(&seen),
        })
        .boot()
        .expect("plugin failures are not fatal");

    assert_eq!(booted.plugins, vec!["census".to_owned()]);
    let (count, names) = seen.lock().clone().expect("census ran");
    assert_eq!(count, 2);
    assert_eq!(names, vec!["Forest", "Ice"]);
    assert!(booted.commands.contains("census"));
    assert!(booted.commands.contains("help"));
}

#[test]
fn test_plugins_not_enabled_are_not_loaded() {
    let seen = Arc::new(Mutex::new(None));
    let store = Arc::new(MemoryStore::new(forest_and_ice()));

    let booted = BootSequencer::new(ConfigSource::Inline(config("0")))
        .store_connector(store)
        .plugin(Census {
            seen: Arc::clone(&seen),
        })
        .boot()
        .unwrap();

    assert!(booted.plugins.is_empty());
    assert!(seen.lock().is_none());
    assert!(!booted.commands.contains("census"));
}
