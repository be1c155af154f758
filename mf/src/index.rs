//! Metadata index keyed by (source_table, source_field)

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::{MetadataRecord, SourceKey};

/// What to do when two metadata rows share the same key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// Keep the first row seen for a key
    #[default]
    FirstWins,
    /// Keep the last row seen for a key
    LastWins,
    /// Refuse to build the index
    Reject,
}

/// Errors raised while building the index
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IndexError {
    #[error("Duplicate metadata for {source_table}.{source_field}")]
    DuplicateKey { source_table: String, source_field: String },
}

/// Point-lookup index over metadata descriptors
#[derive(Debug, Default)]
pub struct MetadataIndex {
    records: HashMap<SourceKey, MetadataRecord>,
}

impl MetadataIndex {
    /// Build the index, resolving duplicate keys with `policy`
    pub fn build(
        records: impl IntoIterator<Item = MetadataRecord>,
        policy: DuplicatePolicy,
    ) -> Result<Self, IndexError> {
        debug!(?policy, "MetadataIndex::build: called");
        let mut map: HashMap<SourceKey, MetadataRecord> = HashMap::new();
        let mut duplicates = 0usize;

        for record in records {
            let key = (record.source_table.clone(), record.source_field.clone());
            match map.entry(key) {
                Entry::Vacant(slot) => {
                    slot.insert(record);
                }
                Entry::Occupied(mut slot) => {
                    duplicates += 1;
                    match policy {
                        DuplicatePolicy::FirstWins => {
                            warn!(
                                source_table = %record.source_table,
                                source_field = %record.source_field,
                                "duplicate metadata row ignored (first wins)"
                            );
                        }
                        DuplicatePolicy::LastWins => {
                            warn!(
                                source_table = %record.source_table,
                                source_field = %record.source_field,
                                "duplicate metadata row replaces earlier row (last wins)"
                            );
                            slot.insert(record);
                        }
                        DuplicatePolicy::Reject => {
                            return Err(IndexError::DuplicateKey {
                                source_table: record.source_table,
                                source_field: record.source_field,
                            });
                        }
                    }
                }
            }
        }

        info!(entries = map.len(), duplicates, "metadata index built");
        Ok(Self { records: map })
    }

    /// Find the descriptor for a source field
    pub fn lookup(&self, source_table: &str, source_field: &str) -> Option<&MetadataRecord> {
        debug!(%source_table, %source_field, "MetadataIndex::lookup: called");
        self.records
            .get(&(source_table.to_string(), source_field.to_string()))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
