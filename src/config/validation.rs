use rustc_hash::FxHashSet;

use super::{AppConfig, ConfigError};

const VALID_LOG_LEVELS: &[&str] = &[
    "DEBUG", "INFO", "WARNING", "WARN", "ERROR", "CRITICAL", "DISABLED",
];

/// Validate the full application config, returning an error if any rule is violated.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] when any configuration invariant is violated.
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    validate_client_config(config)?;
    validate_auth(config)?;
    validate_agent(config)?;
    validate_log_level(config)?;
    Ok(())
}

fn validation_err(msg: impl Into<String>) -> ConfigError {
    ConfigError::Validation(msg.into())
}

fn validate_client_config(config: &AppConfig) -> Result<(), ConfigError> {
    let client = &config.client;
    let url = url::Url::parse(&client.base_url)
        .map_err(|err| validation_err(format!("client.base_url is not a valid URL: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(validation_err(format!(
            "client.base_url must use http or https, got '{}'",
            url.scheme()
        )));
    }
    if !client.integrated_path.starts_with('/') {
        return Err(validation_err("client.integrated_path must start with '/'"));
    }
    if client.pool_max_idle_per_host == 0 {
        return Err(validation_err(
            "client.pool_max_idle_per_host must be greater than 0",
        ));
    }
    if client.timeout == 0 {
        return Err(validation_err("client.timeout must be greater than 0"));
    }
    if let Some(proxy) = client.proxy.as_deref() {
        if proxy.trim().is_empty() {
            return Err(validation_err("client.proxy cannot be empty when set"));
        }
    }
    Ok(())
}

fn validate_auth(config: &AppConfig) -> Result<(), ConfigError> {
    if config.auth.token.trim().is_empty() {
        return Err(validation_err(format!(
            "auth.token is empty; set it in the config file or via {}",
            super::TOKEN_ENV
        )));
    }
    if config.auth.header.trim().is_empty() {
        return Err(validation_err("auth.header cannot be empty"));
    }
    Ok(())
}

fn validate_agent(config: &AppConfig) -> Result<(), ConfigError> {
    let agent = &config.agent;
    if agent.max_rounds == 0 {
        return Err(validation_err("agent.max_rounds must be greater than 0"));
    }
    if agent.user_id.trim().is_empty() {
        return Err(validation_err("agent.user_id cannot be empty"));
    }
    let mut seen = FxHashSet::default();
    for tool in &agent.builtin_tools {
        if tool.agent_name.trim().is_empty() {
            return Err(validation_err("agent.builtin_tools contains an empty agent_name"));
        }
        if !seen.insert(tool.agent_name.as_str()) {
            return Err(validation_err(format!(
                "agent.builtin_tools lists '{}' more than once",
                tool.agent_name
            )));
        }
    }
    Ok(())
}

fn validate_log_level(config: &AppConfig) -> Result<(), ConfigError> {
    let level = config.features.log_level.to_uppercase();
    if !VALID_LOG_LEVELS.contains(&level.as_str()) {
        return Err(validation_err(format!(
            "Invalid log_level '{}'. Must be one of: {}",
            config.features.log_level,
            VALID_LOG_LEVELS.join(", ")
        )));
    }
    Ok(())
}
