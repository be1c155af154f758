//! SQL logic synthesizer

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::StreamExt;
use futures::stream;
use tracing::{debug, info, warn};

use super::{RequestBuilder, SynthesisFailure};
use crate::domain::{EnrichedMapping, MappingCandidate, SynthesisOutcome};
use crate::index::MetadataIndex;
use crate::llm::{LlmClient, StopReason, TokenUsage};
use crate::prompts::CompiledPrompt;

/// Fixed parameters of every synthesis call in a run
#[derive(Debug, Clone)]
pub struct SynthesisSettings {
    /// Sampling temperature (low, for short consistent expressions)
    pub temperature: f32,

    /// Output length cap in tokens
    pub max_tokens: u32,

    /// Join predicate stated in every request
    pub join_predicate: String,

    /// Calls allowed in flight at once; 1 means strictly sequential
    pub max_in_flight: usize,
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 50,
            join_predicate: "a.loan_id = c.cap_product_id".to_string(),
            max_in_flight: 1,
        }
    }
}

/// Rows produced by a batch, in assembly order, plus aggregate usage
#[derive(Debug, Default)]
pub struct SynthesisReport {
    pub rows: Vec<EnrichedMapping>,
    pub usage: TokenUsage,
}

impl SynthesisReport {
    pub fn synthesized(&self) -> usize {
        self.rows.iter().filter(|r| r.outcome.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.rows.len() - self.synthesized()
    }

    /// Failure counts keyed by failure kind
    pub fn failures_by_kind(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for failure in self.rows.iter().filter_map(EnrichedMapping::failure) {
            *counts.entry(failure.kind()).or_insert(0) += 1;
        }
        counts
    }
}

/// Turns mapping candidates into enriched mappings
pub struct SqlSynthesizer {
    client: Arc<dyn LlmClient>,
    requests: RequestBuilder,
}

impl SqlSynthesizer {
    pub fn new(client: Arc<dyn LlmClient>, prompt: CompiledPrompt, settings: SynthesisSettings) -> Self {
        debug!("SqlSynthesizer::new: called");
        Self {
            client,
            requests: RequestBuilder::new(prompt, settings),
        }
    }

    /// Synthesize SQL logic for one candidate
    ///
    /// Never fails: any error is recorded on the returned row.
    pub async fn synthesize(&self, candidate: MappingCandidate, index: &MetadataIndex) -> EnrichedMapping {
        self.synthesize_with_usage(candidate, index).await.0
    }

    /// Synthesize every candidate, one call each, preserving input order
    ///
    /// Up to `max_in_flight` calls run concurrently. Results are buffered in
    /// submission order, so row N of the report is always candidate N.
    pub async fn synthesize_all(&self, candidates: Vec<MappingCandidate>, index: &MetadataIndex) -> SynthesisReport {
        let total = candidates.len();
        let width = self.requests.settings().max_in_flight.max(1);
        info!(candidates = total, max_in_flight = width, "starting SQL synthesis");

        let results: Vec<(EnrichedMapping, TokenUsage)> = stream::iter(candidates.into_iter().enumerate())
            .map(|(position, candidate)| async move {
                let result = self.synthesize_with_usage(candidate, index).await;
                debug!(row = position + 1, total, success = result.0.outcome.is_success(), "synthesize_all: row done");
                result
            })
            .buffered(width)
            .collect()
            .await;

        let mut report = SynthesisReport::default();
        for (row, usage) in results {
            report.usage += usage;
            report.rows.push(row);
        }

        info!(
            synthesized = report.synthesized(),
            failed = report.failed(),
            input_tokens = report.usage.input_tokens,
            output_tokens = report.usage.output_tokens,
            "SQL synthesis finished"
        );
        report
    }

    async fn synthesize_with_usage(
        &self,
        candidate: MappingCandidate,
        index: &MetadataIndex,
    ) -> (EnrichedMapping, TokenUsage) {
        let (outcome, usage) = match self.call(&candidate, index).await {
            Ok((sql, usage)) => (SynthesisOutcome::Synthesized(sql), usage),
            Err(failure) => {
                warn!(
                    source_table = %candidate.source_table,
                    source_field = %candidate.source_field,
                    target_field = %candidate.target_field,
                    kind = failure.kind(),
                    error = %failure,
                    "SQL synthesis failed for row"
                );
                (SynthesisOutcome::Failed(failure), TokenUsage::default())
            }
        };
        (EnrichedMapping::new(candidate, outcome), usage)
    }

    async fn call(
        &self,
        candidate: &MappingCandidate,
        index: &MetadataIndex,
    ) -> Result<(String, TokenUsage), SynthesisFailure> {
        let request = self.requests.build(candidate, index)?;
        let response = self.client.complete(request).await?;

        // A capped reply is kept as-is; it may hold a truncated expression
        if response.stop_reason == StopReason::MaxTokens {
            warn!(
                source_table = %candidate.source_table,
                source_field = %candidate.source_field,
                max_tokens = self.requests.settings().max_tokens,
                "SQL completion hit the token limit and may be truncated"
            );
        }

        let sql = response
            .content
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .ok_or_else(|| SynthesisFailure::MalformedResponse("empty completion".to_string()))?;

        debug!(source_field = %candidate.source_field, sql_len = sql.len(), "call: synthesized");
        Ok((sql.to_string(), response.usage))
    }
}
