pub mod validation;

use serde::{Deserialize, Serialize};

use crate::protocol::request::BuiltinTool;

use self::validation::validate_config;

/// Environment variable overriding `auth.token`.
pub const TOKEN_ENV: &str = "APPBUILDER_TOKEN";
/// Environment variable overriding `client.base_url` when non-empty.
pub const GATEWAY_URL_ENV: &str = "GATEWAY_URL";

/// Error type for configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_integrated_path")]
    pub integrated_path: String,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
    #[serde(default = "default_pool_max_idle_per_host")]
    pub pool_max_idle_per_host: usize,
    #[serde(default = "default_pool_idle_timeout_secs")]
    pub pool_idle_timeout_secs: u64,
    #[serde(default)]
    pub use_env_proxy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,
}

fn default_base_url() -> String {
    "https://qianfan.baidubce.com".to_string()
}
fn default_integrated_path() -> String {
    "/dte/api/v2/function_call/integrated".to_string()
}
fn default_timeout() -> u64 {
    180
}
fn default_connect_timeout() -> u64 {
    5
}
fn default_pool_max_idle_per_host() -> usize {
    16
}
fn default_pool_idle_timeout_secs() -> u64 {
    15
}
fn default_retry_max_attempts() -> u32 {
    2
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            integrated_path: default_integrated_path(),
            timeout: default_timeout(),
            connect_timeout: default_connect_timeout(),
            pool_max_idle_per_host: default_pool_max_idle_per_host(),
            pool_idle_timeout_secs: default_pool_idle_timeout_secs(),
            use_env_proxy: false,
            proxy: None,
            retry_max_attempts: default_retry_max_attempts(),
        }
    }
}

/// Credentials sent with every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_auth_header")]
    pub header: String,
}

fn default_auth_header() -> String {
    "X-Appbuilder-Authorization".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            header: default_auth_header(),
        }
    }
}

/// Defaults applied to every chat turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_user_id")]
    pub user_id: String,
    #[serde(default)]
    pub instruction: String,
    #[serde(default)]
    pub builtin_tools: Vec<BuiltinTool>,
    #[serde(default)]
    pub model_configs: serde_json::Map<String, serde_json::Value>,
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,
}

fn default_user_id() -> String {
    "agentcall".to_string()
}
fn default_max_rounds() -> usize {
    5
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            user_id: default_user_id(),
            instruction: String::new(),
            builtin_tools: Vec::new(),
            model_configs: serde_json::Map::new(),
            max_rounds: default_max_rounds(),
        }
    }
}

/// Feature flags and settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturesConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "INFO".to_string()
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
}

impl AppConfig {
    /// Apply `APPBUILDER_TOKEN` / `GATEWAY_URL` on top of the file values.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(
            std::env::var(TOKEN_ENV).ok(),
            std::env::var(GATEWAY_URL_ENV).ok(),
        );
    }

    fn apply_overrides(&mut self, token: Option<String>, gateway_url: Option<String>) {
        if let Some(token) = token {
            if !token.trim().is_empty() {
                self.auth.token = token;
            }
        }
        if let Some(url) = gateway_url {
            if !url.trim().is_empty() {
                self.client.base_url = url;
            }
        }
    }
}

/// Parse and validate configuration from YAML text, applying environment
/// overrides in between.
///
/// # Errors
///
/// Returns [`ConfigError::Yaml`] when parsing fails or
/// [`ConfigError::Validation`] when semantic validation fails.
pub fn parse_config(contents: &str) -> Result<AppConfig, ConfigError> {
    let mut config: AppConfig = serde_yaml::from_str(contents)?;
    config.apply_env_overrides();
    validate_config(&config)?;
    Ok(config)
}

/// Load configuration from a YAML file and validate it.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when reading the file fails, [`ConfigError::Yaml`]
/// when parsing fails, or [`ConfigError::Validation`] when semantic validation fails.
pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}
