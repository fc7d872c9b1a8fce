//! Configuration loader, typed settings and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (`__` separates nested keys, e.g. `APP_RETRIEVAL__TOP_K=3`). Every section has
//! defaults, so an empty configuration is valid.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::GenerationConfig;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from_dir(Path::new("."))
    }

    /// Load layered configuration files from `dir`.
    pub fn load_from_dir(dir: &Path) -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file(dir.join("config.toml")));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?;
        Ok(config)
    }

    pub fn from_toml_str(toml: &str) -> Self {
        Self { figment: Figment::from(Serialized::defaults(Settings::default())).merge(Toml::string(toml)) }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Extract and validate the full typed settings tree.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let settings: Settings = self.figment.extract().map_err(|e| anyhow::anyhow!("Failed to parse settings: {}", e))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub orchestrator: OrchestratorConfig,
    pub backends: BackendsConfig,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.chunking.max_chars == 0 {
            return Err(Error::InvalidConfig("chunking.max_chars must be > 0".into()));
        }
        if self.retrieval.top_k == 0 || self.retrieval.seven_mark_top_k == 0 || self.retrieval.fourteen_mark_top_k == 0 {
            return Err(Error::InvalidConfig("retrieval top_k values must be > 0".into()));
        }
        if !(-1.0..=1.0).contains(&self.retrieval.min_score) {
            return Err(Error::InvalidConfig(format!("retrieval.min_score {} outside [-1, 1]", self.retrieval.min_score)));
        }
        if self.retrieval.max_context_chars == 0 {
            return Err(Error::InvalidConfig("retrieval.max_context_chars must be > 0".into()));
        }
        if self.orchestrator.timeout_ms == 0 {
            return Err(Error::InvalidConfig("orchestrator.timeout_ms must be > 0".into()));
        }
        if self.embedding.batch_size == 0 {
            return Err(Error::InvalidConfig("embedding.batch_size must be > 0".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Character budget of one passage.
    pub max_chars: usize,
    /// Sentence units carried over from the previous passage.
    pub overlap_units: usize,
    /// Passages with fewer non-whitespace characters are dropped; 0 keeps everything.
    pub min_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_chars: 500, overlap_units: 1, min_chars: 0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProvider {
    Model,
    Hash,
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    pub model_dir: String,
    pub hash_dim: usize,
    pub max_len: usize,
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Model,
            model_dir: "~/.cache/studymate/all-MiniLM-L6-v2".to_string(),
            hash_dim: 384,
            max_len: 256,
            batch_size: 16,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub seven_mark_top_k: usize,
    pub fourteen_mark_top_k: usize,
    pub min_score: f32,
    pub dedup_similarity: f32,
    pub max_context_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 5, seven_mark_top_k: 3, fourteen_mark_top_k: 4, min_score: 0.1, dedup_similarity: 0.9, max_context_chars: 4000 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombineStrategy {
    Concatenate,
    MostStructured,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Per-backend call budget.
    pub timeout_ms: u64,
    pub combine: CombineStrategy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self { timeout_ms: 30_000, combine: CombineStrategy::Concatenate }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendsConfig {
    pub openai: HostedBackendConfig,
    pub gemini: HostedBackendConfig,
    pub local: LocalBackendConfig,
}

/// Settings for a hosted generation API. Unset optional fields take the
/// adapter's own defaults (endpoint, model and key variable).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostedBackendConfig {
    pub enabled: bool,
    pub api_key: Option<String>,
    pub api_key_env: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub max_prompt_context_chars: usize,
    pub request_timeout_ms: u64,
}

impl HostedBackendConfig {
    pub fn generation(&self) -> GenerationConfig {
        GenerationConfig { temperature: self.temperature, max_output_tokens: self.max_output_tokens }
    }

    /// Explicit key first, then the named environment variable. Blank values count as missing.
    pub fn resolve_api_key(&self, default_env: &str) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| env::var(self.api_key_env.as_deref().unwrap_or(default_env)).ok())
            .filter(|k| !k.trim().is_empty())
    }
}

impl Default for HostedBackendConfig {
    fn default() -> Self {
        let generation = GenerationConfig::default();
        Self {
            enabled: true,
            api_key: None,
            api_key_env: None,
            base_url: None,
            model: None,
            temperature: generation.temperature,
            max_output_tokens: generation.max_output_tokens,
            max_prompt_context_chars: 6000,
            request_timeout_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalBackendConfig {
    pub enabled: bool,
    /// Context sentences quoted in an extractive answer.
    pub max_sentences: usize,
}

impl Default for LocalBackendConfig {
    fn default() -> Self {
        Self { enabled: true, max_sentences: 2 }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
