//! Prompt Loader
//!
//! Loads prompt templates from an override directory or falls back to
//! embedded defaults.

use std::path::{Path, PathBuf};

use eyre::{Result, eyre};
use handlebars::Handlebars;
use serde::Serialize;
use tracing::{debug, info};

use super::embedded;
use crate::domain::{MappingCandidate, MetadataRecord};

/// Template name of the SQL synthesis request
pub const SQL_LOGIC_TEMPLATE: &str = "sql-logic";

/// Fields embedded into the SQL synthesis request
#[derive(Debug, Clone, Serialize)]
pub struct SqlPromptContext<'a> {
    pub source_table: &'a str,
    pub source_field: &'a str,
    pub data_type: &'a str,
    pub description: &'a str,
    pub target_field: &'a str,
    pub business_rule: &'a str,
    /// Run-wide join assumption, identical for every candidate
    pub join_predicate: &'a str,
}

impl<'a> SqlPromptContext<'a> {
    pub fn new(candidate: &'a MappingCandidate, metadata: &'a MetadataRecord, join_predicate: &'a str) -> Self {
        Self {
            source_table: &candidate.source_table,
            source_field: &candidate.source_field,
            data_type: &metadata.data_type,
            description: &metadata.description,
            target_field: &candidate.target_field,
            business_rule: &candidate.business_rule,
            join_predicate,
        }
    }
}

/// Resolves template text through the loading chain
#[derive(Debug, Clone, Default)]
pub struct PromptLoader {
    /// Override directory (e.g., `prompts/`)
    override_dir: Option<PathBuf>,
}

impl PromptLoader {
    /// Create a loader searching `override_dir` before the embedded templates
    pub fn new(override_dir: Option<&Path>) -> Self {
        debug!(?override_dir, "PromptLoader::new: called");
        Self {
            override_dir: override_dir.map(Path::to_path_buf),
        }
    }

    /// Create a loader that only uses embedded prompts
    pub fn embedded_only() -> Self {
        debug!("PromptLoader::embedded_only: called");
        Self { override_dir: None }
    }

    /// Load raw template text by name
    pub fn load_template(&self, name: &str) -> Result<String> {
        debug!(%name, "PromptLoader::load_template: called");

        if let Some(ref dir) = self.override_dir {
            let path = dir.join(format!("{}.pmt", name));
            if path.exists() {
                debug!(?path, "PromptLoader::load_template: found in override directory");
                return std::fs::read_to_string(&path)
                    .map_err(|e| eyre!("Failed to read prompt {}: {}", path.display(), e));
            }
            debug!(?path, "PromptLoader::load_template: not found in override directory");
        }

        if let Some(content) = embedded::get_embedded(name) {
            debug!(%name, "PromptLoader::load_template: found in embedded");
            return Ok(content.to_string());
        }

        Err(eyre!("Prompt template not found: {}", name))
    }

    /// Load and compile a template once for repeated rendering
    pub fn compile(&self, name: &str) -> Result<CompiledPrompt> {
        let template = self.load_template(name)?;

        let mut hbs = Handlebars::new();
        hbs.register_escape_fn(handlebars::no_escape);
        hbs.set_strict_mode(true);
        hbs.register_template_string(name, template)
            .map_err(|e| eyre!("Failed to compile template {}: {}", name, e))?;

        info!("Compiled prompt template '{}'", name);
        Ok(CompiledPrompt {
            name: name.to_string(),
            hbs,
        })
    }
}

/// A parsed template ready to render
pub struct CompiledPrompt {
    name: String,
    hbs: Handlebars<'static>,
}

impl std::fmt::Debug for CompiledPrompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledPrompt").field("name", &self.name).finish()
    }
}

impl CompiledPrompt {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn render<T: Serialize>(&self, context: &T) -> Result<String> {
        debug!(name = %self.name, "CompiledPrompt::render: called");
        self.hbs
            .render(&self.name, context)
            .map_err(|e| eyre!("Failed to render template {}: {}", self.name, e))
    }
}
