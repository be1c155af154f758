//! Mapping candidates and their enriched form

use serde::Serialize;

use crate::synth::SynthesisFailure;

/// Natural key of a source field: (source_table, source_field)
pub type SourceKey = (String, String);

/// One source field paired with a target field and the rule that links them
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingCandidate {
    pub source_table: String,
    pub source_field: String,
    pub target_field: String,
    pub business_rule: String,
}

impl MappingCandidate {
    /// Metadata lookup key for this candidate
    pub fn key(&self) -> (&str, &str) {
        (&self.source_table, &self.source_field)
    }
}

/// Per-row result of SQL logic synthesis
#[derive(Debug)]
pub enum SynthesisOutcome {
    /// Trimmed text returned by the model
    Synthesized(String),
    /// Row-scoped failure; the row keeps an empty sql_logic
    Failed(SynthesisFailure),
}

impl SynthesisOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Synthesized(_))
    }
}

/// A mapping candidate with its synthesis outcome attached
#[derive(Debug)]
pub struct EnrichedMapping {
    pub candidate: MappingCandidate,
    pub outcome: SynthesisOutcome,
}

impl EnrichedMapping {
    pub fn new(candidate: MappingCandidate, outcome: SynthesisOutcome) -> Self {
        Self { candidate, outcome }
    }

    /// A row that has not been sent for synthesis
    pub fn unsynthesized(candidate: MappingCandidate) -> Self {
        Self {
            candidate,
            outcome: SynthesisOutcome::Failed(SynthesisFailure::Skipped),
        }
    }

    /// Synthesized SQL, absent when synthesis failed
    pub fn sql_logic(&self) -> Option<&str> {
        match &self.outcome {
            SynthesisOutcome::Synthesized(sql) => Some(sql),
            SynthesisOutcome::Failed(_) => None,
        }
    }

    /// Failure reason, absent when synthesis succeeded
    pub fn failure(&self) -> Option<&SynthesisFailure> {
        match &self.outcome {
            SynthesisOutcome::Synthesized(_) => None,
            SynthesisOutcome::Failed(failure) => Some(failure),
        }
    }
}
