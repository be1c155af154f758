//! Mapping pipeline
//!
//! Loads the input tables, assembles candidates, synthesizes SQL logic and
//! writes the enriched mapping table.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use eyre::{Context, Result};
use tracing::{debug, info};

use crate::assembler::{SourceTables, assemble};
use crate::config::{Config, delimiter_byte};
use crate::domain::{EnrichedMapping, MappingCandidate};
use crate::index::{DuplicatePolicy, MetadataIndex};
use crate::llm::{CompletionRequest, LlmClient, TokenUsage};
use crate::prompts::{PromptLoader, SQL_LOGIC_TEMPLATE};
use crate::synth::{RequestBuilder, SqlSynthesizer, SynthesisFailure, SynthesisSettings};
use crate::tables;

/// Everything a run needs, resolved from [`Config`] and CLI overrides
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub metadata_path: PathBuf,
    pub rules_path: PathBuf,
    pub output_path: PathBuf,
    pub input_delimiter: u8,
    pub output_delimiter: u8,
    pub include_failure_reason: bool,
    pub tables: SourceTables,
    pub duplicates: DuplicatePolicy,
    pub prompt_dir: Option<PathBuf>,
    pub synthesis: SynthesisSettings,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            metadata_path: config.inputs.metadata.clone(),
            rules_path: config.inputs.rules.clone(),
            output_path: config.output.path.clone(),
            input_delimiter: delimiter_byte(&config.inputs.delimiter).context("Invalid inputs.delimiter")?,
            output_delimiter: delimiter_byte(&config.output.delimiter).context("Invalid output.delimiter")?,
            include_failure_reason: config.output.include_failure_reason,
            tables: config.source_tables(),
            duplicates: config.metadata.duplicates,
            prompt_dir: config.prompts.dir.clone(),
            synthesis: SynthesisSettings {
                temperature: config.llm.temperature,
                max_tokens: config.llm.max_tokens,
                join_predicate: config.sources.join_predicate.clone(),
                max_in_flight: config.concurrency.max_in_flight,
            },
        })
    }
}

/// A candidate paired with its rendered request, or the reason it has none
pub type RenderedRequest = (MappingCandidate, std::result::Result<CompletionRequest, SynthesisFailure>);

/// Outcome of a completed run
#[derive(Debug)]
pub struct RunSummary {
    pub candidates: usize,
    pub synthesized: usize,
    pub failed: usize,
    pub failures_by_kind: BTreeMap<&'static str, usize>,
    pub usage: TokenUsage,
    pub output: PathBuf,
    pub rows: Vec<EnrichedMapping>,
}

/// Drives assembly and synthesis over the input tables
pub struct Pipeline {
    config: PipelineConfig,
    client: Arc<dyn LlmClient>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, client: Arc<dyn LlmClient>) -> Self {
        debug!(?config, "Pipeline::new: called");
        Self { config, client }
    }

    /// Run the full pipeline and write the output table
    ///
    /// Only input, index and output errors abort the run; row failures are
    /// recorded in the table.
    pub async fn run(&self) -> Result<RunSummary> {
        info!("Starting mapping generation");
        let index = self.load_index()?;
        let candidates = self.load_candidates()?;
        let total = candidates.len();

        let prompt = PromptLoader::new(self.config.prompt_dir.as_deref())
            .compile(SQL_LOGIC_TEMPLATE)
            .context("Failed to prepare synthesis prompt")?;
        let synthesizer = SqlSynthesizer::new(self.client.clone(), prompt, self.config.synthesis.clone());
        let report = synthesizer.synthesize_all(candidates, &index).await;

        tables::write_mappings(
            &self.config.output_path,
            self.config.output_delimiter,
            &report.rows,
            self.config.include_failure_reason,
        )?;

        info!(output = %self.config.output_path.display(), "Mapping generation complete");
        Ok(RunSummary {
            candidates: total,
            synthesized: report.synthesized(),
            failed: report.failed(),
            failures_by_kind: report.failures_by_kind(),
            usage: report.usage,
            output: self.config.output_path.clone(),
            rows: report.rows,
        })
    }

    /// Load rules and assemble candidates without synthesis
    pub fn assemble_only(config: &PipelineConfig) -> Result<Vec<MappingCandidate>> {
        debug!("assemble_only: called");
        let rules = tables::load_rules(&config.rules_path, config.input_delimiter)?;
        Ok(assemble(&rules, &config.tables))
    }

    /// Write the assembled table with every sql_logic cell empty
    pub fn write_unsynthesized(config: &PipelineConfig, candidates: Vec<MappingCandidate>) -> Result<()> {
        let rows: Vec<EnrichedMapping> = candidates.into_iter().map(EnrichedMapping::unsynthesized).collect();
        tables::write_mappings(&config.output_path, config.output_delimiter, &rows, false)?;
        Ok(())
    }

    /// Build every synthesis request without sending any
    ///
    /// Candidates whose metadata does not resolve yield the failure instead.
    pub fn render_requests(config: &PipelineConfig) -> Result<Vec<RenderedRequest>> {
        let index = load_index(config)?;
        let candidates = Self::assemble_only(config)?;
        let prompt = PromptLoader::new(config.prompt_dir.as_deref())
            .compile(SQL_LOGIC_TEMPLATE)
            .context("Failed to prepare synthesis prompt")?;
        let requests = RequestBuilder::new(prompt, config.synthesis.clone());

        Ok(candidates
            .into_iter()
            .map(|c| {
                let request = requests.build(&c, &index);
                (c, request)
            })
            .collect())
    }

    fn load_index(&self) -> Result<MetadataIndex> {
        load_index(&self.config)
    }

    fn load_candidates(&self) -> Result<Vec<MappingCandidate>> {
        Self::assemble_only(&self.config)
    }
}

fn load_index(config: &PipelineConfig) -> Result<MetadataIndex> {
    let records = tables::load_metadata(&config.metadata_path, config.input_delimiter)?;
    MetadataIndex::build(records, config.duplicates).context("Failed to build metadata index")
}
