//! Process configuration, read once from the environment at startup.

use std::time::Duration;

use super::gemini::{DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL};
use super::oracle::prompt_templates::{key_to_env_var, keys};

/// Bounds for the oracle timeout, in seconds.
pub const ORACLE_TIMEOUT_RANGE: (u64, u64) = (5, 10);

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub server_host: String,
    pub server_port: u16,
    /// `sqlite:` URL; `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub gemini: Option<GeminiSettings>,
    pub oracle_timeout: Duration,
    pub llm_max_retries: u32,
    pub commit_max_attempts: u32,
    pub cors_allowed_origins: Option<String>,
    pub prompt_hero_decision: Option<String>,
    pub prompt_describe: Option<String>,
    /// Seed for reproducible event rolls and fallback choices.
    pub rng_seed: Option<u64>,
}

#[derive(Clone)]
pub struct GeminiSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

// Keep the key out of logs.
impl std::fmt::Debug for GeminiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiSettings")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let parse_or = |key: &str, default: u64| {
            get(key)
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(default)
        };

        let server_port = get("SERVER_PORT")
            .or_else(|| get("PORT"))
            .and_then(|v| v.parse().ok())
            .unwrap_or(3001);

        let gemini = get("GEMINI_API_KEY").map(|api_key| GeminiSettings {
            api_key,
            base_url: get("GEMINI_BASE_URL").unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.into()),
            model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.into()),
        });

        let (min_timeout, max_timeout) = ORACLE_TIMEOUT_RANGE;
        let oracle_timeout =
            Duration::from_secs(parse_or("ORACLE_TIMEOUT_SECS", 8).clamp(min_timeout, max_timeout));

        Self {
            server_host: get("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            server_port,
            database_url: get("DATABASE_URL"),
            gemini,
            oracle_timeout,
            llm_max_retries: parse_or("LLM_MAX_RETRIES", 1) as u32,
            commit_max_attempts: parse_or("COMMIT_MAX_ATTEMPTS", 3).max(1) as u32,
            cors_allowed_origins: get("CORS_ALLOWED_ORIGINS"),
            prompt_hero_decision: get(key_to_env_var(keys::HERO_DECISION).as_str()),
            prompt_describe: get(key_to_env_var(keys::DESCRIBE).as_str()),
            rng_seed: get("RNG_SEED").and_then(|v| v.parse().ok()),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> EngineConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EngineConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_select_in_memory_and_fallback_only() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.bind_address(), "0.0.0.0:3001");
        assert!(cfg.database_url.is_none());
        assert!(cfg.gemini.is_none());
        assert_eq!(cfg.oracle_timeout, Duration::from_secs(8));
        assert_eq!(cfg.commit_max_attempts, 3);
        assert_eq!(cfg.llm_max_retries, 1);
    }

    #[test]
    fn port_falls_back_to_port_variable() {
        assert_eq!(config(&[("PORT", "8080")]).server_port, 8080);
        assert_eq!(
            config(&[("PORT", "8080"), ("SERVER_PORT", "9000")]).server_port,
            9000
        );
        assert_eq!(config(&[("SERVER_PORT", "not-a-port")]).server_port, 3001);
    }

    #[test]
    fn oracle_timeout_is_clamped() {
        assert_eq!(
            config(&[("ORACLE_TIMEOUT_SECS", "60")]).oracle_timeout,
            Duration::from_secs(10)
        );
        assert_eq!(
            config(&[("ORACLE_TIMEOUT_SECS", "1")]).oracle_timeout,
            Duration::from_secs(5)
        );
    }

    #[test]
    fn gemini_settings_require_a_key() {
        let cfg = config(&[("GEMINI_API_KEY", "  "), ("GEMINI_MODEL", "x")]);
        assert!(cfg.gemini.is_none());

        let cfg = config(&[("GEMINI_API_KEY", "secret")]);
        let gemini = cfg.gemini.unwrap();
        assert_eq!(gemini.model, DEFAULT_GEMINI_MODEL);
        assert!(!format!("{:?}", gemini).contains("secret"));
    }

    #[test]
    fn prompt_overrides_are_read() {
        let cfg = config(&[("PROMPT_HERO_DECISION", "Pick: {available_actions}")]);
        assert_eq!(cfg.prompt_hero_decision.as_deref(), Some("Pick: {available_actions}"));
        assert!(cfg.prompt_describe.is_none());
    }

    #[test]
    fn commit_attempts_never_zero() {
        assert_eq!(config(&[("COMMIT_MAX_ATTEMPTS", "0")]).commit_max_attempts, 1);
    }
}
