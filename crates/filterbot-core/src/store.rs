//! Durable, chat-scoped trigger → filter table.
//!
//! The whole table lives in memory and is authoritative for the process
//! lifetime. Every mutation rewrites the full JSON snapshot on disk, so write
//! cost grows with the total number of filters across all chats.
//!
//! On-disk layout (chat ids are JSON object keys, hence text):
//!
//! ```json
//! { "-1001": { "hello": { "image": null, "buttons": [], "created_by": 7,
//!                         "created_at": "2025-01-01T10:00:00+00:00" } } }
//! ```

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};

use crate::error::StoreError;
use crate::types::{normalize_trigger, Button, ChatId, Filter, ImageRef, UserId};

type ChatFilters = IndexMap<String, Filter>;
type Table = IndexMap<ChatId, ChatFilters>;
type DiskTable = IndexMap<String, IndexMap<String, StoredFilter>>;

#[derive(Debug, Serialize, Deserialize)]
struct StoredFilter {
    image: Option<ImageRef>,
    #[serde(default)]
    buttons: Vec<Button>,
    created_by: UserId,
    #[serde(with = "timestamp")]
    created_at: DateTime<Utc>,
}

impl StoredFilter {
    fn from_filter(filter: &Filter) -> Self {
        Self {
            image: filter.image.clone(),
            buttons: filter.buttons.clone(),
            created_by: filter.created_by,
            created_at: filter.created_at,
        }
    }

    fn into_filter(self, trigger: String) -> Filter {
        Filter {
            trigger,
            image: self.image,
            buttons: self.buttons,
            created_by: self.created_by,
            created_at: self.created_at,
        }
    }
}

pub struct FilterStore {
    path: PathBuf,
    table: Mutex<Table>,
    /// Serializes snapshot writes so an older snapshot never lands last.
    write_lock: tokio::sync::Mutex<()>,
}

impl FilterStore {
    /// Load the store from `path`. Missing, unreadable or malformed storage
    /// yields an empty store; the next write replaces it.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let table = match tokio::fs::read_to_string(&path).await {
            Ok(content) => match decode(&content) {
                Ok(table) => {
                    let total: usize = table.values().map(|f| f.len()).sum();
                    info!("Loaded {} filters across {} chats", total, table.len());
                    table
                }
                Err(e) => {
                    error!(path = %path.display(), "Error loading filters: {}", e);
                    Table::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Table::new(),
            Err(e) => {
                error!(path = %path.display(), "Error reading filters: {}", e);
                Table::new()
            }
        };

        Self {
            path,
            table: Mutex::new(table),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// All filters of a chat in insertion order (empty if the chat is unknown).
    pub fn get(&self, chat: ChatId) -> ChatFilters {
        self.lock().get(&chat).cloned().unwrap_or_default()
    }

    pub fn list(&self, chat: ChatId) -> Vec<Filter> {
        self.lock()
            .get(&chat)
            .map(|filters| filters.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Exact lookup of an already-normalized trigger.
    pub fn lookup(&self, chat: ChatId, trigger: &str) -> Option<Filter> {
        self.lock()
            .get(&chat)
            .and_then(|filters| filters.get(trigger))
            .cloned()
    }

    pub fn chat_count(&self) -> usize {
        self.lock().len()
    }

    /// Insert or overwrite `trigger` in `chat`, then persist.
    pub async fn put(&self, chat: ChatId, trigger: &str, mut filter: Filter) -> Result<(), StoreError> {
        filter.trigger = normalize_trigger(trigger);
        {
            let mut table = self.lock();
            table
                .entry(chat)
                .or_default()
                .insert(filter.trigger.clone(), filter);
        }
        self.persist().await
    }

    /// Insert `filter` only if its trigger is free in `chat`. The check and
    /// the insert happen under one lock, so two authors racing for the same
    /// trigger cannot both succeed.
    ///
    /// `Duplicate` means nothing changed. An I/O or serialization error means
    /// the filter is live in memory but not yet durable.
    pub async fn insert_unique(&self, chat: ChatId, mut filter: Filter) -> Result<(), StoreError> {
        filter.trigger = normalize_trigger(&filter.trigger);
        {
            let mut table = self.lock();
            let filters = table.entry(chat).or_default();
            if filters.contains_key(&filter.trigger) {
                return Err(StoreError::Duplicate {
                    trigger: filter.trigger,
                });
            }
            filters.insert(filter.trigger.clone(), filter);
        }
        self.persist().await
    }

    /// Remove `trigger` from `chat`. `Ok(false)` if it was not there, in
    /// which case nothing is written.
    pub async fn delete(&self, chat: ChatId, trigger: &str) -> Result<bool, StoreError> {
        let trigger = normalize_trigger(trigger);
        let removed = {
            let mut table = self.lock();
            let removed = match table.get_mut(&chat) {
                Some(filters) => filters.shift_remove(&trigger).is_some(),
                None => false,
            };
            if table.get(&chat).is_some_and(|filters| filters.is_empty()) {
                table.shift_remove(&chat);
            }
            removed
        };

        if removed {
            self.persist().await?;
        }
        Ok(removed)
    }

    async fn persist(&self) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let data = {
            let table = self.lock();
            serde_json::to_vec_pretty(&encode(&table)).map_err(StoreError::from)
        };
        let result = match data {
            Ok(data) => atomic_write_file(&self.path, &data).await,
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            error!(path = %self.path.display(), "Error saving filters: {}", e);
        }
        result
    }
}

fn encode(table: &Table) -> DiskTable {
    table
        .iter()
        .filter(|(_, filters)| !filters.is_empty())
        .map(|(chat, filters)| {
            let stored = filters
                .iter()
                .map(|(trigger, filter)| (trigger.clone(), StoredFilter::from_filter(filter)))
                .collect();
            (chat.to_string(), stored)
        })
        .collect()
}

fn decode(content: &str) -> Result<Table, String> {
    let disk: DiskTable = serde_json::from_str(content).map_err(|e| e.to_string())?;
    let mut table = Table::new();
    for (chat_key, filters) in disk {
        let chat: ChatId = chat_key
            .parse()
            .map_err(|e| format!("invalid chat id {chat_key:?}: {e}"))?;
        if filters.is_empty() {
            continue;
        }
        let entry = table.entry(chat).or_default();
        for (trigger, stored) in filters {
            let trigger = normalize_trigger(&trigger);
            if entry.contains_key(&trigger) {
                warn!(chat = %chat, trigger = %trigger, "duplicate trigger in storage, keeping last");
            }
            entry.insert(trigger.clone(), stored.into_filter(trigger));
        }
    }
    Ok(table)
}

/// Write to a uniquely named temp file, fsync it, then rename over the target.
async fn atomic_write_file(final_path: &Path, data: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = final_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::io(parent, e))?;
    }

    let file_name = final_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("filters.json");
    let temp_path = final_path.with_file_name(format!(
        "{}.{}.tmp",
        file_name,
        uuid::Uuid::new_v4().simple()
    ));

    let mut file = tokio::fs::File::create(&temp_path)
        .await
        .map_err(|e| StoreError::io(&temp_path, e))?;
    file.write_all(data)
        .await
        .map_err(|e| StoreError::io(&temp_path, e))?;
    file.sync_all()
        .await
        .map_err(|e| StoreError::io(&temp_path, e))?;
    drop(file);

    if let Err(e) = tokio::fs::rename(&temp_path, final_path).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(StoreError::io(final_path, e));
    }
    Ok(())
}

/// RFC 3339 on write; also accepts offset-less ISO-8601 (read as local time).
mod timestamp {
    use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp: {raw}")))
    }

    pub(super) fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Some(parsed.with_timezone(&Utc));
        }
        let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|local| local.with_timezone(&Utc))
    }
}
