//! Configuration parsing and validation.
//!
//! org-assist is configured via a TOML file (default: `config/assist.toml`).
//! Every section except `[db]` is optional and falls back to the defaults
//! below. API keys are read from environment variables, never from the file.
//!
//! # Example
//!
//! ```toml
//! [db]
//! path = "./data/assist.sqlite"
//!
//! [chunking]
//! chunk_size = 1000
//! overlap = 200
//!
//! [embedding]
//! provider = "openai"
//! model = "text-embedding-3-small"
//! dims = 1536
//!
//! [chat]
//! provider = "openai"
//! model = "gpt-4o-mini"
//!
//! [vector_store]
//! provider = "sqlite"
//!
//! [gateway.services]
//! project = "http://localhost:4001"
//! client = "http://localhost:4002"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            base_url: default_openai_base_url(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_disabled() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    org_assist_core::embedding::DEFAULT_BATCH_SIZE
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct VectorStoreConfig {
    #[serde(default = "default_vector_provider")]
    pub provider: String,
    /// Index host for remote providers.
    #[serde(default)]
    pub url: Option<String>,
    /// Environment variable holding the remote provider's API key.
    #[serde(default = "default_vector_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            provider: default_vector_provider(),
            url: None,
            api_key_env: default_vector_key_env(),
            namespace: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_vector_provider() -> String {
    "sqlite".to_string()
}
fn default_vector_key_env() -> String {
    "PINECONE_API_KEY".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_chat_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            model: None,
            temperature: default_temperature(),
            timeout_secs: default_chat_timeout_secs(),
            base_url: default_openai_base_url(),
        }
    }
}

impl ChatConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_temperature() -> f32 {
    0.2
}
fn default_chat_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Overview hits prepended for aggregate or personal questions.
    #[serde(default = "default_overview_k")]
    pub overview_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            overview_k: default_overview_k(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_overview_k() -> usize {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_timeout_secs")]
    pub tool_timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            tool_timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_max_iterations() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionsConfig {
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            ttl_secs: default_ttl_secs(),
            max_sessions: default_max_sessions(),
        }
    }
}

fn default_history_limit() -> usize {
    10
}
fn default_ttl_secs() -> u64 {
    1800
}
fn default_max_sessions() -> usize {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_timeout_secs")]
    pub timeout_secs: u64,
    /// Retries for reads only; writes are attempted once.
    #[serde(default = "default_gateway_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub services: ServiceUrls,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_gateway_timeout_secs(),
            max_retries: default_gateway_retries(),
            services: ServiceUrls::default(),
        }
    }
}

fn default_gateway_timeout_secs() -> u64 {
    15
}
fn default_gateway_retries() -> u32 {
    2
}

/// Base URL per backend service. A missing entry disables that service's
/// actions: calls return an error envelope.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ServiceUrls {
    pub project: Option<String>,
    pub client: Option<String>,
    pub workforce: Option<String>,
    pub communication: Option<String>,
    pub knowledge: Option<String>,
    pub notification: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7400".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate a TOML config string.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    // Validate chunking
    if config.chunking.chunk_size == 0 {
        bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.overlap >= config.chunking.chunk_size {
        bail!("chunking.overlap must be smaller than chunking.chunk_size");
    }

    // Validate retrieval
    if config.retrieval.top_k == 0 {
        bail!("retrieval.top_k must be >= 1");
    }

    // Validate agent
    if config.agent.max_iterations == 0 {
        bail!("agent.max_iterations must be >= 1");
    }

    // Validate embedding
    match config.embedding.provider.as_str() {
        "disabled" | "openai" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled or openai.",
            other
        ),
    }
    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    // Validate chat
    match config.chat.provider.as_str() {
        "disabled" | "openai" => {}
        other => bail!(
            "Unknown chat provider: '{}'. Must be disabled or openai.",
            other
        ),
    }
    if config.chat.is_enabled() && config.chat.model.is_none() {
        bail!(
            "chat.model must be specified when provider is '{}'",
            config.chat.provider
        );
    }

    // Validate vector store
    match config.vector_store.provider.as_str() {
        "sqlite" => {}
        "pinecone" => {
            if config.vector_store.url.is_none() {
                bail!("vector_store.url must be specified when provider is 'pinecone'");
            }
        }
        other => bail!(
            "Unknown vector store provider: '{}'. Must be sqlite or pinecone.",
            other
        ),
    }

    Ok(config)
}
