//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (`__` separates nested keys, e.g. `APP_PROVIDER__MODEL`).
//! Provides helpers to expand `~` and `${VAR}` and to resolve relative paths
//! against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::chunker::BoundaryPolicy;
use crate::types::SearchMode;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(Path::new("."))
    }

    /// Load with config files looked up in `dir` instead of the working directory.
    pub fn load_from(dir: &Path) -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(dir.join("config.toml")));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?.validate()?;
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    pub fn settings(&self) -> anyhow::Result<Settings> {
        self.figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to read settings: {}", e))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data: DataSettings,
    pub chunking: ChunkingSettings,
    pub provider: ProviderSettings,
    pub search: SearchSettings,
    pub cache: CacheSettings,
    pub answer: AnswerSettings,
}

impl Settings {
    pub fn validate(&self) -> crate::error::Result<()> {
        self.chunking.validate()?;
        if self.search.top_k == 0 {
            return Err(crate::error::Error::InvalidConfig("search.top_k must be at least 1".into()));
        }
        if self.provider.model.trim().is_empty() {
            return Err(crate::error::Error::InvalidConfig("provider.model must not be empty".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub text_dir: String,
    pub chunks_dir: String,
    pub cache_dir: String,
    pub export_dir: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            text_dir: "processed/docs".to_string(),
            chunks_dir: "processed/chunks".to_string(),
            cache_dir: "processed/embeddings_cache".to_string(),
            export_dir: "processed/export".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    pub chunk_size: usize,
    pub overlap: usize,
    pub boundary: BoundaryPolicy,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self { chunk_size: 1000, overlap: 100, boundary: BoundaryPolicy::Sentence }
    }
}

impl ChunkingSettings {
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.chunk_size == 0 {
            return Err(crate::error::Error::InvalidConfig("chunk_size must be at least 1".into()));
        }
        if self.overlap >= self.chunk_size {
            return Err(crate::error::Error::InvalidConfig(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub base_url: String,
    pub model: String,
    pub chat_model: Option<String>,
    pub timeout_secs: u64,
    pub request_delay_ms: u64,
    pub max_retries: u32,
    pub backoff_ms: u64,
    pub show_progress: bool,
    pub use_fake: bool,
    pub fake_dim: usize,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "granite3.2:8b-instruct-fp16".to_string(),
            chat_model: None,
            timeout_secs: 60,
            request_delay_ms: 100,
            max_retries: 3,
            backoff_ms: 250,
            show_progress: true,
            use_fake: false,
            fake_dim: 384,
        }
    }
}

impl ProviderSettings {
    pub fn chat_model(&self) -> &str {
        self.chat_model.as_deref().unwrap_or(&self.model)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub top_k: usize,
    pub context_window: usize,
    pub snippet_len: usize,
    pub default_mode: SearchMode,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self { top_k: 5, context_window: 100, snippet_len: 200, default_mode: SearchMode::Keyword }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub verify_fingerprint: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { verify_fingerprint: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerSettings {
    pub system_prompt: String,
}

impl Default for AnswerSettings {
    fn default() -> Self {
        Self {
            system_prompt: "You are a technical documentation assistant. \
Answer strictly from the provided context, citing the source document for each fact. \
Be precise about versions, commands and configuration parameters. \
If the answer is not in the context, say that you don't know instead of guessing."
                .to_string(),
        }
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

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
