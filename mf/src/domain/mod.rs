//! Domain types for mapping assembly
//!
//! Input records (metadata descriptors and business-rule rows) and the rows
//! derived from them during a run (mapping candidates and enriched mappings).

mod mapping;
mod metadata;
mod rule;

pub use mapping::{EnrichedMapping, MappingCandidate, SourceKey, SynthesisOutcome};
pub use metadata::MetadataRecord;
pub use rule::{MappingRule, SourceSystem, is_null_marker};
