//! JSON document store on disk.
//!
//! Layout:
//!
//! ```json
//! { "gameservers": [ { "id": 1, "name": "Forest", "port": 7777,
//!                      "secret_key": "", "player_count": 0 } ] }
//! ```
//!
//! Every operation opens the file, does its work, and lets go of it again;
//! nothing is held between calls. Updates rewrite the whole document through
//! a temporary file and a rename, so a crash mid-write leaves the previous
//! version in place.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use worldhost_protocol::ServerId;

use crate::row::rows_by_id;
use crate::{ServerRecord, ServerRow, ServerStore, StoreError};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    gameservers: Vec<ServerRecord>,
}

/// A [`ServerStore`] backed by a JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Connects to the store at `path`.
    ///
    /// The file must already exist and be readable; its contents are not
    /// validated until the first read.
    ///
    /// # Errors
    /// [`StoreError::Connect`] if the file can't be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        fs::File::open(&path).map_err(|source| StoreError::Connect {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "store opened");
        Ok(Self { path })
    }

    /// Writes a fresh document containing `records` to `path`.
    pub fn create(
        path: impl AsRef<Path>,
        records: Vec<ServerRecord>,
    ) -> Result<Self, StoreError> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
        };
        store.write(&Document {
            gameservers: records,
        })?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every stored record, including the written-back columns.
    pub fn records(&self) -> Result<Vec<ServerRecord>, StoreError> {
        Ok(self.read()?.gameservers)
    }

    fn read(&self) -> Result<Document, StoreError> {
        let data = fs::read(&self.path)?;
        Ok(serde_json::from_slice(&data)?)
    }

    fn write(&self, doc: &Document) -> Result<(), StoreError> {
        let data = serde_json::to_vec_pretty(doc)?;
        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&data)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn update(&self, id: ServerId, f: impl FnOnce(&mut ServerRecord)) -> Result<(), StoreError> {
        let mut doc = self.read()?;
        let record = doc
            .gameservers
            .iter_mut()
            .find(|r| r.row.id == id)
            .ok_or(StoreError::UnknownServer(id))?;
        f(record);
        self.write(&doc)
    }
}

impl ServerStore for JsonFileStore {
    fn fetch_servers(&self) -> Result<Vec<ServerRow>, StoreError> {
        Ok(rows_by_id(&self.read()?.gameservers))
    }

    fn update_secret_key(&self, id: ServerId, secret_key: &str) -> Result<(), StoreError> {
        self.update(id, |r| r.secret_key = secret_key.to_owned())
    }

    fn update_player_count(&self, id: ServerId, player_count: usize) -> Result<(), StoreError> {
        self.update(id, |r| r.player_count = player_count)
    }
}
