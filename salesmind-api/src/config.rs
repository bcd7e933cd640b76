//! Service settings resolved from CLI, environment and TOML

use salesmind_common::config::{TomlConfig, DEFAULT_BIND_ADDRESS};
use tracing::{info, warn};

/// Environment variable holding the AI provider credential
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// AI credential: environment first, then TOML
///
/// Absence is not fatal; AI calls fail individually until one is set.
pub fn resolve_gemini_api_key(toml_config: &TomlConfig) -> Option<String> {
    let from_env = non_blank(std::env::var(GEMINI_API_KEY_ENV).ok());
    let from_toml = non_blank(toml_config.gemini_api_key.clone());

    match (from_env, from_toml) {
        (Some(key), Some(_)) => {
            warn!(
                "AI credential set in both {} and TOML config, using the environment value",
                GEMINI_API_KEY_ENV
            );
            Some(key)
        }
        (Some(key), None) => {
            info!("AI credential loaded from {}", GEMINI_API_KEY_ENV);
            Some(key)
        }
        (None, Some(key)) => {
            info!("AI credential loaded from TOML config");
            Some(key)
        }
        (None, None) => {
            warn!(
                "No AI credential configured (set {} or gemini_api_key); recordings will fail processing",
                GEMINI_API_KEY_ENV
            );
            None
        }
    }
}

/// Bind address: CLI/env argument, then TOML, then the default
pub fn resolve_bind_address(cli_arg: Option<&str>, toml_config: &TomlConfig) -> String {
    non_blank(cli_arg.map(str::to_string))
        .or_else(|| non_blank(toml_config.bind_address.clone()))
        .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string())
}
