//! Mapforge configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::assembler::SourceTables;
use crate::index::DuplicatePolicy;

/// Main Mapforge configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Text-generation provider configuration
    pub llm: LlmConfig,

    /// Input table locations
    pub inputs: InputsConfig,

    /// Output table location and format
    pub output: OutputConfig,

    /// Source system table names and join assumption
    pub sources: SourcesConfig,

    /// Metadata index behaviour
    pub metadata: MetadataConfig,

    /// Prompt template overrides
    pub prompts: PromptsConfig,

    /// Synthesis fan-out
    pub concurrency: ConcurrencyConfig,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .mapforge.yml
        let local_config = PathBuf::from(".mapforge.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/mapforge/mapforge.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("mapforge").join("mapforge.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is initialised
    ///
    /// Errors are swallowed here; the full load reports them once logging is up.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let candidates: Vec<PathBuf> = match config_path {
            Some(path) => vec![path.clone()],
            None => {
                let mut paths = vec![PathBuf::from(".mapforge.yml")];
                if let Some(dir) = dirs::config_dir() {
                    paths.push(dir.join("mapforge").join("mapforge.yml"));
                }
                paths
            }
        };

        candidates
            .into_iter()
            .find(|p| p.exists())
            .and_then(|p| fs::read_to_string(p).ok())
            .and_then(|content| serde_yaml::from_str::<Self>(&content).ok())
            .and_then(|config| config.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Resolve the LLM section into a transport-ready value
    ///
    /// Reads the credential from the configured environment variable. Call
    /// this once at startup to fail fast with a clear message.
    pub fn resolve_llm(&self) -> Result<ResolvedLlmConfig> {
        let key_env = self.llm.api_key_env();
        let api_key = std::env::var(key_env)
            .map_err(|_| eyre::eyre!("LLM API key not found. Set the {} environment variable.", key_env))?;
        if api_key.trim().is_empty() {
            return Err(eyre::eyre!("LLM API key in {} is empty", key_env));
        }

        Ok(ResolvedLlmConfig {
            provider: self.llm.provider.clone(),
            model: self.llm.model().to_string(),
            api_key,
            base_url: self.llm.base_url().to_string(),
            max_tokens: self.llm.max_tokens,
            timeout_ms: self.llm.timeout_ms,
            max_retries: self.llm.max_retries,
        })
    }

    /// Source table names for the assembler
    pub fn source_tables(&self) -> SourceTables {
        SourceTables {
            acbs: self.sources.acbs_table.clone(),
            cap: self.sources.cap_table.clone(),
        }
    }
}

/// Parse a one-character delimiter setting
pub fn delimiter_byte(value: &str) -> Result<u8> {
    match value {
        "\\t" | "tab" => Ok(b'\t'),
        v if v.len() == 1 && v.is_ascii() => Ok(v.as_bytes()[0]),
        v => Err(eyre::eyre!("Delimiter must be a single ASCII character, got '{}'", v)),
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name ("openai" or "anthropic")
    pub provider: String,

    /// Model identifier (provider default when unset)
    pub model: Option<String>,

    /// Environment variable containing the API key (provider default when unset)
    #[serde(rename = "api-key-env")]
    pub api_key_env: Option<String>,

    /// API base URL (provider default when unset)
    #[serde(rename = "base-url")]
    pub base_url: Option<String>,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Retries on transient errors (0 = a failed call is final)
    #[serde(rename = "max-retries")]
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: None,
            api_key_env: None,
            base_url: None,
            max_tokens: 50,
            temperature: 0.3,
            timeout_ms: 300_000,
            max_retries: 0,
        }
    }
}

/// Per-provider fallbacks for the optional LLM settings
struct ProviderDefaults {
    model: &'static str,
    api_key_env: &'static str,
    base_url: &'static str,
}

const OPENAI_DEFAULTS: ProviderDefaults = ProviderDefaults {
    model: "gpt-4",
    api_key_env: "OPENAI_API_KEY",
    base_url: "https://api.openai.com",
};

const ANTHROPIC_DEFAULTS: ProviderDefaults = ProviderDefaults {
    model: "claude-sonnet-4-20250514",
    api_key_env: "ANTHROPIC_API_KEY",
    base_url: "https://api.anthropic.com",
};

impl LlmConfig {
    // Unknown providers get the OpenAI values; create_client rejects them later
    fn defaults(&self) -> &'static ProviderDefaults {
        match self.provider.as_str() {
            "anthropic" => &ANTHROPIC_DEFAULTS,
            _ => &OPENAI_DEFAULTS,
        }
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(self.defaults().model)
    }

    pub fn api_key_env(&self) -> &str {
        self.api_key_env.as_deref().unwrap_or(self.defaults().api_key_env)
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(self.defaults().base_url)
    }
}

/// LLM settings with the credential already read
#[derive(Clone)]
pub struct ResolvedLlmConfig {
    pub provider: String,
    pub model: String,
    pub api_key: String,
    pub base_url: String,
    pub max_tokens: u32,
    pub timeout_ms: u64,
    pub max_retries: u32,
}

impl std::fmt::Debug for ResolvedLlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedLlmConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_ms", &self.timeout_ms)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

/// Input table locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputsConfig {
    /// Metadata table (source_table, source_field, data_type, description)
    pub metadata: PathBuf,

    /// Mapping rule table (acbs_field, cap_field, target_field, transformation_logic)
    pub rules: PathBuf,

    /// Field delimiter for both input tables
    pub delimiter: String,
}

impl Default for InputsConfig {
    fn default() -> Self {
        Self {
            metadata: PathBuf::from("data/metadata.csv"),
            rules: PathBuf::from("data/mapping_rules.csv"),
            delimiter: "|".to_string(),
        }
    }
}

/// Output table location and format
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub path: PathBuf,

    pub delimiter: String,

    /// Append a synthesis_error column describing failed rows
    #[serde(rename = "include-failure-reason")]
    pub include_failure_reason: bool,

    /// Rows shown in the post-run preview (0 disables it)
    #[serde(rename = "preview-rows")]
    pub preview_rows: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/ai_generated_mapping.csv"),
            delimiter: ",".to_string(),
            include_failure_reason: false,
            preview_rows: 5,
        }
    }
}

/// Source system table names and join assumption
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    #[serde(rename = "acbs-table")]
    pub acbs_table: String,

    #[serde(rename = "cap-table")]
    pub cap_table: String,

    /// Join predicate between the two source tables, stated in every prompt
    #[serde(rename = "join-predicate")]
    pub join_predicate: String,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        let tables = SourceTables::default();
        Self {
            acbs_table: tables.acbs,
            cap_table: tables.cap,
            join_predicate: "a.loan_id = c.cap_product_id".to_string(),
        }
    }
}

/// Metadata index behaviour
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// Policy for repeated (source_table, source_field) rows
    pub duplicates: DuplicatePolicy,
}

/// Prompt template overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    /// Directory searched for `sql-logic.pmt` before the embedded template
    pub dir: Option<PathBuf>,
}

/// Synthesis fan-out
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// Maximum synthesis calls in flight (1 = strictly sequential)
    #[serde(rename = "max-in-flight")]
    pub max_in_flight: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self { max_in_flight: 1 }
    }
}
