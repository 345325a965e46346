//! Persistence layer for the Record Store

use crate::error::StorageError;
use crate::store::{RecordKey, RecordStore, ScanPage, Table};
use std::path::Path;
use tracing::debug;

/// Sled-based implementation of RecordStore
///
/// Each table is its own sled tree. Keys are `partition 0x1f sort`, so a partition
/// query is a prefix scan over the table's tree.
#[derive(Clone)]
pub struct SledRecordStore {
    db: sled::Db,
    trees: [sled::Tree; 6],
}

impl SledRecordStore {
    /// Open (or create) a store at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path.as_ref()).map_err(|e| {
            StorageError::IoError(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Failed to open sled database: {}", e),
            ))
        })?;
        Self::from_db(db)
    }

    /// Wrap an already opened database
    pub fn from_db(db: sled::Db) -> Result<Self, StorageError> {
        let open = |t: Table| db.open_tree(t.name()).map_err(StorageError::from);
        let trees = [
            open(Table::Roadmaps)?,
            open(Table::Phases)?,
            open(Table::Topics)?,
            open(Table::InfoBits)?,
            open(Table::Quizzes)?,
            open(Table::UserRoadmaps)?,
        ];
        Ok(Self { db, trees })
    }

    /// Get the underlying sled database (for advanced operations)
    pub fn db(&self) -> &sled::Db {
        &self.db
    }

    fn tree(&self, table: Table) -> &sled::Tree {
        let index = Table::ALL
            .iter()
            .position(|t| *t == table)
            .unwrap_or_default();
        &self.trees[index]
    }

    /// Number of records in a table
    pub fn len(&self, table: Table) -> usize {
        self.tree(table).len()
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }
}

impl RecordStore for SledRecordStore {
    fn get(&self, table: Table, key: &RecordKey) -> Result<Option<Vec<u8>>, StorageError> {
        let raw = self.tree(table).get(key.encode()?)?;
        Ok(raw.map(|v| v.to_vec()))
    }

    fn put(&self, table: Table, key: &RecordKey, value: Vec<u8>) -> Result<(), StorageError> {
        debug!(table = table.name(), key = %key, bytes = value.len(), "put record");
        self.tree(table).insert(key.encode()?, value)?;
        Ok(())
    }

    fn query(&self, table: Table, partition: &str) -> Result<Vec<Vec<u8>>, StorageError> {
        let prefix = RecordKey::partition_prefix(partition)?;
        let mut out = Vec::new();
        for item in self.tree(table).scan_prefix(prefix) {
            let (_, value) = item?;
            out.push(value.to_vec());
        }
        Ok(out)
    }

    fn delete(&self, table: Table, key: &RecordKey) -> Result<(), StorageError> {
        debug!(table = table.name(), key = %key, "delete record");
        self.tree(table).remove(key.encode()?)?;
        Ok(())
    }

    fn scan(&self, table: Table, limit: Option<usize>) -> Result<ScanPage, StorageError> {
        let mut page = ScanPage::default();
        for item in self.tree(table).iter() {
            let (_, value) = item?;
            if limit.is_some_and(|max| page.items.len() >= max) {
                page.truncated = true;
                break;
            }
            page.items.push(value.to_vec());
        }
        Ok(page)
    }

    fn update(
        &self,
        table: Table,
        key: &RecordKey,
        f: &mut dyn FnMut(Option<&[u8]>) -> Option<Vec<u8>>,
    ) -> Result<Option<Vec<u8>>, StorageError> {
        let updated = self.tree(table).update_and_fetch(key.encode()?, |old| f(old))?;
        Ok(updated.map(|v| v.to_vec()))
    }
}
