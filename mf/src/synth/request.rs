//! Synthesis request building
//!
//! Resolves a candidate's metadata and renders the request text. Needs no
//! client, so requests can be previewed without network access.

use tracing::debug;

use super::{SynthesisFailure, SynthesisSettings};
use crate::domain::MappingCandidate;
use crate::index::MetadataIndex;
use crate::llm::CompletionRequest;
use crate::prompts::{CompiledPrompt, SqlPromptContext};

/// Turns candidates into completion requests with the run's fixed settings
#[derive(Debug)]
pub struct RequestBuilder {
    prompt: CompiledPrompt,
    settings: SynthesisSettings,
}

impl RequestBuilder {
    pub fn new(prompt: CompiledPrompt, settings: SynthesisSettings) -> Self {
        debug!(?settings, template = %prompt.name(), "RequestBuilder::new: called");
        Self { prompt, settings }
    }

    pub fn settings(&self) -> &SynthesisSettings {
        &self.settings
    }

    /// Resolve metadata and render the request for one candidate
    pub fn build(&self, candidate: &MappingCandidate, index: &MetadataIndex) -> Result<CompletionRequest, SynthesisFailure> {
        debug!(source_table = %candidate.source_table, source_field = %candidate.source_field, "build: called");
        let (table, field) = candidate.key();
        let metadata = index.lookup(table, field).ok_or_else(|| SynthesisFailure::Resolution {
            source_table: table.to_string(),
            source_field: field.to_string(),
        })?;

        let context = SqlPromptContext::new(candidate, metadata, &self.settings.join_predicate);
        let prompt = self
            .prompt
            .render(&context)
            .map_err(|e| SynthesisFailure::Prompt(e.to_string()))?;

        Ok(CompletionRequest::single_turn(
            prompt,
            self.settings.max_tokens,
            self.settings.temperature,
        ))
    }
}
