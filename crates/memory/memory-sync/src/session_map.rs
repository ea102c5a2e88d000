//! Persisted `SessionMappingKey -> SessionHandle` table.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use memory_core::{MemoryError, Result, SessionHandle, SessionMappingKey};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

const MAP_FILE_NAME: &str = "session-map.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MapRecord {
    #[serde(flatten)]
    key: SessionMappingKey,
    session_id: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct MapFile {
    sessions: Vec<MapRecord>,
}

/// Session table loaded lazily from `<state_dir>/session-map.json`.
///
/// Every mutation rewrites the file through a temp file and a rename.
pub struct SessionMap {
    path: PathBuf,
    records: Mutex<Option<HashMap<SessionMappingKey, MapRecord>>>,
}

impl SessionMap {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join(MAP_FILE_NAME),
            records: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> HashMap<SessionMappingKey, MapRecord> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return HashMap::new(),
            Err(e) => {
                warn!(
                    error = %e,
                    path = %self.path.display(),
                    "Failed to read session map, starting empty"
                );
                return HashMap::new();
            }
        };
        match serde_json::from_str::<MapFile>(&raw) {
            Ok(file) => {
                debug!(count = file.sessions.len(), "Loaded session map");
                file.sessions
                    .into_iter()
                    .map(|record| (record.key.clone(), record))
                    .collect()
            }
            Err(e) => {
                warn!(
                    error = %e,
                    path = %self.path.display(),
                    "Session map is corrupt, starting empty"
                );
                HashMap::new()
            }
        }
    }

    async fn persist(&self, records: &HashMap<SessionMappingKey, MapRecord>) -> Result<()> {
        let mut sessions: Vec<MapRecord> = records.values().cloned().collect();
        sessions.sort_by(|a, b| a.key.cmp(&b.key));
        let body = serde_json::to_string_pretty(&MapFile { sessions })
            .map_err(|e| MemoryError::Parse(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    pub async fn get(&self, key: &SessionMappingKey) -> Option<SessionHandle> {
        let mut guard = self.records.lock().await;
        if guard.is_none() {
            *guard = Some(self.load().await);
        }
        guard
            .as_ref()
            .and_then(|records| records.get(key))
            .map(|record| SessionHandle::new(record.session_id.clone()))
    }

    pub async fn insert(&self, key: SessionMappingKey, handle: &SessionHandle) -> Result<()> {
        let mut guard = self.records.lock().await;
        if guard.is_none() {
            *guard = Some(self.load().await);
        }
        let records = guard.get_or_insert_with(HashMap::new);
        records.insert(
            key.clone(),
            MapRecord {
                key,
                session_id: handle.session_id.clone(),
                created_at: Utc::now(),
            },
        );
        self.persist(records).await
    }

    /// Removes the entry for `key`, returning the handle it held.
    pub async fn remove(&self, key: &SessionMappingKey) -> Result<Option<SessionHandle>> {
        let mut guard = self.records.lock().await;
        if guard.is_none() {
            *guard = Some(self.load().await);
        }
        let records = guard.get_or_insert_with(HashMap::new);
        let removed = records.remove(key);
        if removed.is_some() {
            self.persist(records).await?;
        }
        Ok(removed.map(|record| SessionHandle::new(record.session_id)))
    }
}
