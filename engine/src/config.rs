//! TOML configuration loaded from `~/.sage/config.toml`.
//!
//! Every field has a default, so a missing file yields a fully working
//! config pointed at a local Ollama daemon. The Ollama host can also be
//! overridden with the `OLLAMA_HOST` environment variable, which wins over
//! the file.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use sage_index::SearchConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ollama: OllamaSettings,
    pub search: SearchSettings,
    pub app: AppSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OllamaSettings {
    /// Host the daemon listens on; the port is always 11434.
    pub host: String,
    pub chat_model: String,
    pub reranker_model: String,
    pub safety_model: String,
    pub embedding_model: String,
    /// Per-stage deadlines. Local models can take a long time on first
    /// load, hence the generous defaults.
    pub safety_timeout_secs: u64,
    pub reranker_timeout_secs: u64,
    pub query_timeout_secs: u64,
    pub embedding_timeout_secs: u64,
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            chat_model: "llama3:8b".to_string(),
            reranker_model: "llama3:8b".to_string(),
            safety_model: "llama-guard3:8b".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            safety_timeout_secs: 3600,
            reranker_timeout_secs: 3600,
            query_timeout_secs: 3600,
            embedding_timeout_secs: 600,
        }
    }
}

impl OllamaSettings {
    #[must_use]
    pub const fn safety_timeout(&self) -> Duration {
        Duration::from_secs(self.safety_timeout_secs)
    }

    #[must_use]
    pub const fn reranker_timeout(&self) -> Duration {
        Duration::from_secs(self.reranker_timeout_secs)
    }

    #[must_use]
    pub const fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    #[must_use]
    pub const fn embedding_timeout(&self) -> Duration {
        Duration::from_secs(self.embedding_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub vector_k: usize,
    pub bm25_k: usize,
    pub similarity_threshold: f64,
    pub vector_weight: f64,
    /// Prompt budget; context and history are trimmed to fit.
    pub max_input_tokens: u32,
}

impl Default for SearchSettings {
    fn default() -> Self {
        let search = SearchConfig::default();
        Self {
            vector_k: search.vector_k,
            bm25_k: search.bm25_k,
            similarity_threshold: search.similarity_threshold,
            vector_weight: search.vector_weight,
            max_input_tokens: 4000,
        }
    }
}

impl SearchSettings {
    #[must_use]
    pub const fn search_config(&self) -> SearchConfig {
        SearchConfig {
            vector_k: self.vector_k,
            bm25_k: self.bm25_k,
            similarity_threshold: self.similarity_threshold,
            vector_weight: self.vector_weight,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Label recorded in the audit log for this installation's user.
    pub user_label: String,
    /// Override for the data directory (database and log file).
    pub data_dir: Option<PathBuf>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            user_label: "local".to_string(),
            data_dir: None,
        }
    }
}

impl Config {
    /// Load from the default path, falling back to defaults when the file
    /// does not exist. A file that exists but fails to read or parse is an
    /// error; silently ignoring a broken config hides typos.
    pub fn load() -> Result<Self, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(Self::from_env(Self::default()));
        };
        if !path.exists() {
            return Ok(Self::from_env(Self::default()));
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;

        let config: Self =
            toml::from_str(&content).map_err(|source| ConfigError::Parse { path, source })?;

        Ok(Self::from_env(config))
    }

    /// Parse a config from TOML text (used by tests).
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    fn from_env(mut config: Self) -> Self {
        if let Ok(host) = std::env::var("OLLAMA_HOST")
            && !host.is_empty()
        {
            config.ollama.host = host;
        }
        config
    }

    /// Directory holding the database and log file.
    #[must_use]
    pub fn data_dir(&self) -> Option<PathBuf> {
        self.app
            .data_dir
            .clone()
            .or_else(|| dirs::home_dir().map(|home| home.join(".sage")))
    }

    #[must_use]
    pub fn db_path(&self) -> Option<PathBuf> {
        self.data_dir().map(|dir| dir.join("sage.db"))
    }

    #[must_use]
    pub fn log_path(&self) -> Option<PathBuf> {
        self.data_dir().map(|dir| dir.join("sage.log"))
    }
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".sage").join("config.toml"))
}
