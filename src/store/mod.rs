//! Record Store
//!
//! Flat, independently addressable records grouped into tables. A record is
//! addressed by a partition key plus an optional sort key; children are found by
//! querying their parent's key as partition. The store guarantees single-key
//! atomicity and nothing else: query results carry no ordering promise.

pub mod persistence;
pub mod records;

pub use persistence::SledRecordStore;
pub use records::{InfoBitRecord, PhaseRecord, QuizRecord, RoadmapRecord, TopicRecord};

use crate::error::StorageError;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Separator between partition and sort key in encoded keys.
const KEY_SEP: u8 = 0x1f;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Roadmaps,
    Phases,
    Topics,
    InfoBits,
    Quizzes,
    UserRoadmaps,
}

impl Table {
    pub const ALL: [Table; 6] = [
        Table::Roadmaps,
        Table::Phases,
        Table::Topics,
        Table::InfoBits,
        Table::Quizzes,
        Table::UserRoadmaps,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Table::Roadmaps => "roadmaps",
            Table::Phases => "phases",
            Table::Topics => "topics",
            Table::InfoBits => "infobits",
            Table::Quizzes => "quizzes",
            Table::UserRoadmaps => "user_roadmaps",
        }
    }
}

/// Partition key plus optional sort key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub partition: String,
    pub sort: Option<String>,
}

impl RecordKey {
    /// Key for a record addressed by partition only (roadmaps, quizzes).
    pub fn root(partition: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            sort: None,
        }
    }

    /// Key for a record living under a parent partition.
    pub fn child(partition: impl Into<String>, sort: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            sort: Some(sort.into()),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, StorageError> {
        let mut out = Self::partition_prefix(&self.partition)?;
        if let Some(sort) = &self.sort {
            if sort.as_bytes().contains(&KEY_SEP) {
                return Err(StorageError::InvalidKey(sort.clone()));
            }
            out.extend_from_slice(sort.as_bytes());
        }
        Ok(out)
    }

    pub fn partition_prefix(partition: &str) -> Result<Vec<u8>, StorageError> {
        if partition.is_empty() || partition.as_bytes().contains(&KEY_SEP) {
            return Err(StorageError::InvalidKey(partition.to_string()));
        }
        let mut out = Vec::with_capacity(partition.len() + 1);
        out.extend_from_slice(partition.as_bytes());
        out.push(KEY_SEP);
        Ok(out)
    }
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.sort {
            Some(sort) => write!(f, "{}/{}", self.partition, sort),
            None => write!(f, "{}", self.partition),
        }
    }
}

/// One page of a full-table scan.
#[derive(Debug, Clone, Default)]
pub struct ScanPage {
    pub items: Vec<Vec<u8>>,
    /// More records existed beyond the requested limit.
    pub truncated: bool,
}

/// Record store interface
pub trait RecordStore: Send + Sync {
    fn get(&self, table: Table, key: &RecordKey) -> Result<Option<Vec<u8>>, StorageError>;

    fn put(&self, table: Table, key: &RecordKey, value: Vec<u8>) -> Result<(), StorageError>;

    /// All records whose partition key equals `partition`. Unordered.
    fn query(&self, table: Table, partition: &str) -> Result<Vec<Vec<u8>>, StorageError>;

    /// Remove a record. Removing an absent record is not an error.
    fn delete(&self, table: Table, key: &RecordKey) -> Result<(), StorageError>;

    /// Full-table scan, stopping after `limit` records when given.
    fn scan(&self, table: Table, limit: Option<usize>) -> Result<ScanPage, StorageError>;

    /// Atomically replace a single record with the output of `f`.
    ///
    /// `f` receives the current value (if any) and may be invoked more than once
    /// under contention. Returning `None` removes the record. Returns the new value.
    fn update(
        &self,
        table: Table,
        key: &RecordKey,
        f: &mut dyn FnMut(Option<&[u8]>) -> Option<Vec<u8>>,
    ) -> Result<Option<Vec<u8>>, StorageError>;
}

pub fn get_json<T: DeserializeOwned>(
    store: &dyn RecordStore,
    table: Table,
    key: &RecordKey,
) -> Result<Option<T>, StorageError> {
    match store.get(table, key)? {
        Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
        None => Ok(None),
    }
}

pub fn put_json<T: Serialize>(
    store: &dyn RecordStore,
    table: Table,
    key: &RecordKey,
    value: &T,
) -> Result<(), StorageError> {
    let raw = serde_json::to_vec(value)?;
    store.put(table, key, raw)
}

pub fn query_json<T: DeserializeOwned>(
    store: &dyn RecordStore,
    table: Table,
    partition: &str,
) -> Result<Vec<T>, StorageError> {
    store
        .query(table, partition)?
        .iter()
        .map(|raw| serde_json::from_slice(raw).map_err(StorageError::from))
        .collect()
}

/// Full scan keeping only the named top-level fields of each record.
pub fn scan_projected(
    store: &dyn RecordStore,
    table: Table,
    fields: &[&str],
    limit: Option<usize>,
) -> Result<(Vec<serde_json::Value>, bool), StorageError> {
    let page = store.scan(table, limit)?;
    let mut out = Vec::with_capacity(page.items.len());
    for raw in &page.items {
        let value: serde_json::Value = serde_json::from_slice(raw)?;
        let projected = match value {
            serde_json::Value::Object(map) => serde_json::Value::Object(
                map.into_iter()
                    .filter(|(k, _)| fields.contains(&k.as_str()))
                    .collect(),
            ),
            other => other,
        };
        out.push(projected);
    }
    Ok((out, page.truncated))
}
