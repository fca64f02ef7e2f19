//! In-process store.

use parking_lot::Mutex;
use worldhost_protocol::ServerId;

use crate::row::rows_by_id;
use crate::{ServerRecord, ServerRow, ServerStore, StoreError};

/// A [`ServerStore`] kept in memory.
///
/// Writes can be switched off with [`set_read_only`](Self::set_read_only)
/// to model a store that accepts reads but rejects updates.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<ServerRecord>>,
    read_only: Mutex<bool>,
}

impl MemoryStore {
    pub fn new(records: Vec<ServerRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            read_only: Mutex::new(false),
        }
    }

    /// Rejects every subsequent update with [`StoreError::ReadOnly`].
    pub fn set_read_only(&self, read_only: bool) {
        *self.read_only.lock() = read_only;
    }

    /// The stored secret key for `id`, if the row exists.
    pub fn secret_key(&self, id: ServerId) -> Option<String> {
        self.with_record(id, |r| r.secret_key.clone())
    }

    /// The stored player count for `id`, if the row exists.
    pub fn player_count(&self, id: ServerId) -> Option<usize> {
        self.with_record(id, |r| r.player_count)
    }

    fn with_record<T>(&self, id: ServerId, f: impl FnOnce(&ServerRecord) -> T) -> Option<T> {
        self.records.lock().iter().find(|r| r.row.id == id).map(f)
    }

    fn update(&self, id: ServerId, f: impl FnOnce(&mut ServerRecord)) -> Result<(), StoreError> {
        if *self.read_only.lock() {
            return Err(StoreError::ReadOnly);
        }
        let mut records = self.records.lock();
        let record = records
            .iter_mut()
            .find(|r| r.row.id == id)
            .ok_or(StoreError::UnknownServer(id))?;
        f(record);
        Ok(())
    }
}

impl ServerStore for MemoryStore {
    fn fetch_servers(&self) -> Result<Vec<ServerRow>, StoreError> {
        Ok(rows_by_id(&self.records.lock()))
    }

    fn update_secret_key(&self, id: ServerId, secret_key: &str) -> Result<(), StoreError> {
        self.update(id, |r| r.secret_key = secret_key.to_owned())
    }

    fn update_player_count(&self, id: ServerId, player_count: usize) -> Result<(), StoreError> {
        self.update(id, |r| r.player_count = player_count)
    }
}
