use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::GiroError;

/// Top-level Giro configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub giro: GiroConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub conversation: ConversationConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GiroConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GiroConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

/// Webhook HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// WhatsApp Cloud API credentials and routing.
///
/// Two phone numbers share one webhook: `user_number_id` carries the public
/// recommendation chat, `business_number_id` the business registration chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    #[serde(default)]
    pub api_token: String,
    #[serde(default)]
    pub user_number_id: String,
    #[serde(default)]
    pub business_number_id: String,
    /// Token echoed back during the webhook verification handshake.
    #[serde(default)]
    pub verify_token: String,
    #[serde(default = "default_graph_base_url")]
    pub api_base_url: String,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            user_number_id: String::new(),
            business_number_id: String::new(),
            verify_token: String::new(),
            api_base_url: default_graph_base_url(),
        }
    }
}

/// Abuse and capacity limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Answered (retrieval-backed) turns allowed per rolling week.
    #[serde(default = "default_weekly_answer_limit")]
    pub weekly_answer_limit: i64,
    /// Invalid-query refusals allowed per rolling week.
    #[serde(default = "default_weekly_block_limit")]
    pub weekly_block_limit: i64,
    /// Identities accepted before new ones are created pre-blocked.
    #[serde(default = "default_max_identity_capacity")]
    pub max_identity_capacity: i64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            weekly_answer_limit: default_weekly_answer_limit(),
            weekly_block_limit: default_weekly_block_limit(),
            max_identity_capacity: default_max_identity_capacity(),
        }
    }
}

/// Conversation context and delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Trailing window of history handed to the reasoner, in hours.
    #[serde(default = "default_context_window_hours")]
    pub context_window_hours: i64,
    /// Most recent turns kept inside the window.
    #[serde(default = "default_max_context_turns")]
    pub max_context_turns: i64,
    /// Messages older than this on arrival get an apology, not an answer.
    #[serde(default = "default_staleness_secs")]
    pub delivery_staleness_secs: i64,
    /// Recommendation horizon when the query names no end date.
    #[serde(default = "default_lookahead_days")]
    pub default_lookahead_days: i64,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            context_window_hours: default_context_window_hours(),
            max_context_turns: default_max_context_turns(),
            delivery_staleness_secs: default_staleness_secs(),
            default_lookahead_days: default_lookahead_days(),
        }
    }
}

/// Memory config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// Reasoning collaborator (OpenAI-compatible endpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_agent_model")]
    pub model: String,
    #[serde(default = "default_agent_base_url")]
    pub base_url: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_agent_model(),
            base_url: default_agent_base_url(),
        }
    }
}

/// Semantic retrieval collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_retrieval_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    /// Hits requested per search.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            base_url: default_retrieval_base_url(),
            api_key: String::new(),
            top_k: default_top_k(),
        }
    }
}

fn default_name() -> String {
    "giro".to_string()
}
fn default_data_dir() -> String {
    "~/.giro".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_graph_base_url() -> String {
    "https://graph.facebook.com/v18.0".to_string()
}
fn default_weekly_answer_limit() -> i64 {
    10
}
fn default_weekly_block_limit() -> i64 {
    5
}
fn default_max_identity_capacity() -> i64 {
    500
}
fn default_context_window_hours() -> i64 {
    12
}
fn default_max_context_turns() -> i64 {
    10
}
fn default_staleness_secs() -> i64 {
    3600
}
fn default_lookahead_days() -> i64 {
    7
}
fn default_db_path() -> String {
    "~/.giro/giro.db".to_string()
}
fn default_agent_model() -> String {
    "gpt-4o".to_string()
}
fn default_agent_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_retrieval_base_url() -> String {
    "http://localhost:6333".to_string()
}
fn default_top_k() -> usize {
    3
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file does not exist.
pub fn load(path: &str) -> Result<Config, GiroError> {
    let path = Path::new(path);
    if !path.exists() {
        tracing::info!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| GiroError::Config(format!("failed to read {}: {}", path.display(), e)))?;

    let config: Config = toml::from_str(&content)
        .map_err(|e| GiroError::Config(format!("failed to parse config: {}", e)))?;

    Ok(config)
}
