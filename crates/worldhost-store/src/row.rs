use serde::{Deserialize, Serialize};
use worldhost_protocol::ServerId;

/// The definition of one game server instance: the read path of the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRow {
    pub id: ServerId,
    pub name: String,
    pub port: u16,
}

/// A full stored row: definition plus the columns boot writes back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRecord {
    #[serde(flatten)]
    pub row: ServerRow,
    #[serde(default)]
    pub secret_key: String,
    #[serde(default)]
    pub player_count: usize,
}

impl ServerRecord {
    pub fn new(id: u32, name: impl Into<String>, port: u16) -> Self {
        Self {
            row: ServerRow {
                id: ServerId(id),
                name: name.into(),
                port,
            },
            secret_key: String::new(),
            player_count: 0,
        }
    }
}

/// Sorts records the way the read path must return them.
pub(crate) fn rows_by_id(records: &[ServerRecord]) -> Vec<ServerRow> {
    let mut rows: Vec<ServerRow> = records.iter().map(|r| r.row.clone()).collect();
    rows.sort_by_key(|r| r.id);
    rows
}
