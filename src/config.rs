use std::env;
use std::path::PathBuf;

use crate::recipe::OwnerId;
use crate::recipe_parser::DEFAULT_MODEL;

/// Environment variable holding the OpenRouter key.
pub const API_KEY_ENV_VAR: &str = "OPENROUTER_API_KEY";
pub const MODEL_ENV_VAR: &str = "RECIPE_MODEL";
pub const STORE_PATH_ENV_VAR: &str = "RECIPE_STORE_PATH";
pub const OWNER_ENV_VAR: &str = "RECIPE_OWNER";
/// Comma separated OpenRouter upstream providers, e.g. "Cerebras".
pub const UPSTREAMS_ENV_VAR: &str = "RECIPE_UPSTREAMS";

pub const DEFAULT_STORE_PATH: &str = "recipes.json";
pub const DEFAULT_OWNER: &str = "local";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub api_key_env_var: String,
    pub model: String,
    pub store_path: PathBuf,
    pub owner: OwnerId,
    pub upstreams: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key_env_var: API_KEY_ENV_VAR.to_string(),
            model: DEFAULT_MODEL.to_string(),
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            owner: OwnerId::new(DEFAULT_OWNER),
            upstreams: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Defaults overridden by whatever is set in the environment (after loading `.env`).
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        Self {
            api_key_env_var: defaults.api_key_env_var,
            model: non_empty(MODEL_ENV_VAR).unwrap_or(defaults.model),
            store_path: non_empty(STORE_PATH_ENV_VAR)
                .map(PathBuf::from)
                .unwrap_or(defaults.store_path),
            owner: non_empty(OWNER_ENV_VAR).map(OwnerId::new).unwrap_or(defaults.owner),
            upstreams: non_empty(UPSTREAMS_ENV_VAR)
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or(defaults.upstreams),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_when_environment_is_empty() {
        let config = AppConfig::from_lookup(|_| None);
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.model, "qwen/qwen3-32b");
    }

    #[test]
    fn test_environment_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (MODEL_ENV_VAR, "google/gemini-2.0-flash-001"),
            (STORE_PATH_ENV_VAR, "/tmp/mine.json"),
            (OWNER_ENV_VAR, "  alice "),
            (UPSTREAMS_ENV_VAR, "Cerebras, ,Groq"),
        ]);
        let config = AppConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.model, "google/gemini-2.0-flash-001");
        assert_eq!(config.store_path, PathBuf::from("/tmp/mine.json"));
        assert_eq!(config.owner, OwnerId::new("alice"));
        assert_eq!(config.upstreams, vec!["Cerebras".to_string(), "Groq".to_string()]);
    }

    #[test]
    fn test_blank_values_are_ignored() {
        let config = AppConfig::from_lookup(|key| (key == OWNER_ENV_VAR).then(|| "   ".to_string()));
        assert_eq!(config.owner, OwnerId::new(DEFAULT_OWNER));
    }
}
