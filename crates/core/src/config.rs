use crate::error::{Error, Result};
use config::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for the catalogchat system
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// LLM configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Embeddings configuration
    #[serde(default)]
    pub embeddings: EmbeddingsConfig,

    /// Vector index configuration
    #[serde(default)]
    pub vector_index: VectorIndexConfig,

    /// Graph store configuration
    #[serde(default)]
    pub graph: GraphConfig,

    /// Relational catalog configuration
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Session cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// SQL agent configuration
    #[serde(default)]
    pub agent: AgentConfig,
}

/// Configuration for the Anthropic LLM client
#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// API key; falls back to ANTHROPIC_API_KEY when unset
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model for classification and synthesis calls
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Max tokens per completion
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl LlmConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
    }
}

/// Configuration for embeddings generation (OpenAI-compatible API)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsConfig {
    /// Base URL of the embedding service
    #[serde(default = "default_embeddings_base_url")]
    pub api_base_url: String,

    /// Optional API key
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model name to use
    #[serde(default = "default_embeddings_model")]
    pub model: String,

    /// Embedding dimension (must match the vector index)
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,
}

/// Configuration for the hybrid lexical/vector index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndexConfig {
    /// Host for the index backend
    #[serde(default = "default_vector_host")]
    pub host: String,

    /// gRPC port for the index backend
    #[serde(default = "default_vector_port")]
    pub port: u16,

    /// Collection holding catalog artifacts
    #[serde(default = "default_collection_name")]
    pub collection_name: String,

    /// k for nearest-neighbor queries
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,

    /// Route results through the LLM relevance filter when a query
    /// returns more than this many
    #[serde(default = "default_relevance_filter_threshold")]
    pub relevance_filter_threshold: usize,
}

/// Configuration for the graph store
#[derive(Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    #[serde(default = "default_graph_host")]
    pub host: String,

    #[serde(default = "default_graph_bolt_port")]
    pub bolt_port: u16,

    #[serde(default = "default_graph_user")]
    pub user: String,

    #[serde(default)]
    pub password: String,
}

impl std::fmt::Debug for GraphConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphConfig")
            .field("host", &self.host)
            .field("bolt_port", &self.bolt_port)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Configuration for the relational catalog database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Postgres connection URL
    #[serde(default = "default_catalog_url")]
    pub database_url: String,

    /// Schema holding the catalog tables
    #[serde(default = "default_catalog_schema")]
    pub schema: String,

    /// LIKE patterns selecting the searchable tables/views; the agent
    /// whitelist is discovered from these at runtime
    #[serde(default = "default_searchable_patterns")]
    pub searchable_patterns: Vec<String>,
}

/// Configuration for the session cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL for per-source coordinator cache writes
    #[serde(default = "default_cache_ttl_seconds")]
    pub ttl_seconds: u64,

    /// TTL for the SQL agent's independent cache write
    #[serde(default = "default_agent_cache_ttl_seconds")]
    pub agent_ttl_seconds: u64,
}

/// Configuration for the SQL agent's retry protocol and bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Full-run attempts before the last error is surfaced
    #[serde(default = "default_agent_max_retries")]
    pub max_retries: usize,

    /// Delay between attempts, in seconds
    #[serde(default = "default_agent_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// SQL generation/correction iterations within one attempt
    #[serde(default = "default_agent_max_iterations")]
    pub max_iterations: usize,

    /// Wall-clock bound for one attempt, in seconds
    #[serde(default = "default_agent_max_execution_secs")]
    pub max_execution_secs: u64,
}

fn default_llm_model() -> String {
    "claude-sonnet-4-5".to_string()
}

fn default_llm_max_tokens() -> u32 {
    4096
}

fn default_embeddings_base_url() -> String {
    "http://localhost:8000/v1".to_string()
}

fn default_embeddings_model() -> String {
    "bge-m3".to_string()
}

fn default_embedding_dimension() -> usize {
    1024
}

fn default_vector_host() -> String {
    "localhost".to_string()
}

fn default_vector_port() -> u16 {
    6334
}

fn default_collection_name() -> String {
    "catalog_artifacts".to_string()
}

fn default_search_limit() -> usize {
    5
}

fn default_relevance_filter_threshold() -> usize {
    3
}

fn default_graph_host() -> String {
    "localhost".to_string()
}

fn default_graph_bolt_port() -> u16 {
    7687
}

fn default_graph_user() -> String {
    "neo4j".to_string()
}

fn default_catalog_url() -> String {
    "postgres://localhost:5432/catalog".to_string()
}

fn default_catalog_schema() -> String {
    "public".to_string()
}

fn default_searchable_patterns() -> Vec<String> {
    vec!["catalog\\_%".to_string()]
}

fn default_cache_ttl_seconds() -> u64 {
    3600
}

fn default_agent_cache_ttl_seconds() -> u64 {
    1800
}

fn default_agent_max_retries() -> usize {
    3
}

fn default_agent_retry_delay_secs() -> u64 {
    2
}

fn default_agent_max_iterations() -> usize {
    5
}

fn default_agent_max_execution_secs() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_llm_model(),
            max_tokens: default_llm_max_tokens(),
        }
    }
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_embeddings_base_url(),
            api_key: None,
            model: default_embeddings_model(),
            dimension: default_embedding_dimension(),
        }
    }
}

impl Default for VectorIndexConfig {
    fn default() -> Self {
        Self {
            host: default_vector_host(),
            port: default_vector_port(),
            collection_name: default_collection_name(),
            search_limit: default_search_limit(),
            relevance_filter_threshold: default_relevance_filter_threshold(),
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            host: default_graph_host(),
            bolt_port: default_graph_bolt_port(),
            user: default_graph_user(),
            password: String::new(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            database_url: default_catalog_url(),
            schema: default_catalog_schema(),
            searchable_patterns: default_searchable_patterns(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_cache_ttl_seconds(),
            agent_ttl_seconds: default_agent_cache_ttl_seconds(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_retries: default_agent_max_retries(),
            retry_delay_secs: default_agent_retry_delay_secs(),
            max_iterations: default_agent_max_iterations(),
            max_execution_secs: default_agent_max_execution_secs(),
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file with environment variable overrides
    ///
    /// Environment variables are prefixed with `CATALOGCHAT_` and use double
    /// underscores for nested values. For example:
    /// - `CATALOGCHAT_LLM__MODEL=claude-haiku-4-5`
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if path.exists() {
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix("CATALOGCHAT")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| Error::config(format!("Failed to deserialize config: {e}")))
    }

    /// Creates a config from a TOML string (useful for testing)
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::config(format!("Failed to parse TOML: {e}")))
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.embeddings.dimension == 0 || self.embeddings.dimension > 4096 {
            return Err(Error::config(format!(
                "Invalid embedding dimension {}. Must be between 1 and 4096",
                self.embeddings.dimension
            )));
        }

        if self.vector_index.port == 0 {
            return Err(Error::config(
                "Invalid vector index port: must be greater than 0".to_string(),
            ));
        }

        if self.vector_index.search_limit == 0 {
            return Err(Error::config(
                "Invalid search limit: must be greater than 0".to_string(),
            ));
        }

        if self.agent.max_retries == 0 {
            return Err(Error::config(
                "Invalid agent max_retries: at least one attempt is required".to_string(),
            ));
        }

        if self.agent.max_iterations == 0 {
            return Err(Error::config(
                "Invalid agent max_iterations: at least one iteration is required".to_string(),
            ));
        }

        if self.catalog.searchable_patterns.is_empty() {
            return Err(Error::config(
                "No searchable table patterns configured".to_string(),
            ));
        }

        Ok(())
    }

    /// Saves the configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| Error::config(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, toml_string)
            .map_err(|e| Error::config(format!("Failed to write config file: {e}")))?;

        Ok(())
    }
}
