//! Mapping assembler
//!
//! Expands business-rule rows into one mapping candidate per populated
//! source field.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::{MappingCandidate, MappingRule, SourceSystem};

/// Physical table names of the two source systems
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceTables {
    pub acbs: String,
    pub cap: String,
}

impl SourceTables {
    pub fn table_for(&self, system: SourceSystem) -> &str {
        match system {
            SourceSystem::Acbs => &self.acbs,
            SourceSystem::Cap => &self.cap,
        }
    }
}

impl Default for SourceTables {
    fn default() -> Self {
        Self {
            acbs: "acbs_loan".to_string(),
            cap: "cap_product_info".to_string(),
        }
    }
}

/// Expand rules into candidates, preserving rule order
///
/// Within a rule the system-1 candidate precedes the system-2 candidate.
/// Rules with no populated source field contribute nothing.
pub fn assemble(rules: &[MappingRule], tables: &SourceTables) -> Vec<MappingCandidate> {
    debug!(rule_count = rules.len(), "assemble: called");
    let candidates: Vec<MappingCandidate> = rules
        .iter()
        .flat_map(|rule| {
            rule.source_fields().map(move |(system, field)| MappingCandidate {
                source_table: tables.table_for(system).to_string(),
                source_field: field.to_string(),
                target_field: rule.target_field.clone(),
                business_rule: rule.transformation_logic.clone(),
            })
        })
        .collect();

    info!(rules = rules.len(), candidates = candidates.len(), "mapping candidates assembled");
    candidates
}
