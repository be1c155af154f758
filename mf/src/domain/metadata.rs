//! Source-field metadata descriptor

use serde::{Deserialize, Serialize};

use super::rule::trimmed_cell;

/// Describes one field of an upstream source table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    #[serde(deserialize_with = "trimmed_cell")]
    pub source_table: String,
    #[serde(deserialize_with = "trimmed_cell")]
    pub source_field: String,
    pub data_type: String,
    pub description: String,
}

impl MetadataRecord {
    pub fn new(
        source_table: impl Into<String>,
        source_field: impl Into<String>,
        data_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            source_table: source_table.into(),
            source_field: source_field.into(),
            data_type: data_type.into(),
            description: description.into(),
        }
    }
}
