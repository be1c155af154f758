//! Mapforge - ACBS/CAP field mapping generator
//!
//! Mapforge builds a field-level mapping table from two source systems into
//! a target schema. Each mapping rule fans out into one candidate per
//! populated source field, and each candidate gets a short SQL expression
//! synthesized by a text-generation service.
//!
//! # Modules
//!
//! - [`domain`] - Metadata, rule and mapping row types
//! - [`index`] - Metadata lookup keyed by (source_table, source_field)
//! - [`assembler`] - Rule to candidate expansion
//! - [`prompts`] - Synthesis prompt templates
//! - [`llm`] - Text-generation client trait and providers
//! - [`synth`] - Per-candidate SQL synthesis
//! - [`tables`] - Delimited table input and output
//! - [`pipeline`] - End-to-end orchestration
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod assembler;
pub mod cli;
pub mod config;
pub mod domain;
pub mod index;
pub mod llm;
pub mod pipeline;
pub mod prompts;
pub mod synth;
pub mod tables;

// Re-export commonly used types
pub use assembler::{SourceTables, assemble};
pub use config::{Config, LlmConfig, ResolvedLlmConfig};
pub use domain::{EnrichedMapping, MappingCandidate, MappingRule, MetadataRecord, SourceSystem, SynthesisOutcome};
pub use index::{DuplicatePolicy, IndexError, MetadataIndex};
pub use llm::{
    AnthropicClient, CompletionRequest, CompletionResponse, LlmClient, LlmError, OpenAIClient, TokenUsage,
    create_client,
};
pub use pipeline::{Pipeline, PipelineConfig, RunSummary};
pub use synth::{RequestBuilder, SqlSynthesizer, SynthesisFailure, SynthesisReport, SynthesisSettings};
pub use tables::TableError;
