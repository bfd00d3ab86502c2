use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AssistantError, Result};

/// Main configuration structure for the weather assistant
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub weather: WeatherConfig,
    pub prompts: PromptsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_url: String,
    pub model: String,
    /// Never read from the YAML file; only from `OPENAI_API_KEY`.
    #[serde(skip)]
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
    pub retry: RetryConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub initial_delay_ms: u64,
    pub backoff_factor: u64,
    pub max_delay_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Disk,
    Memory,
    Redis,
    None,
}

impl std::str::FromStr for CacheBackend {
    type Err = AssistantError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "disk" => Ok(Self::Disk),
            "memory" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            "none" | "off" | "disabled" => Ok(Self::None),
            other => Err(AssistantError::Config(format!(
                "Unknown cache backend '{other}'. Supported: disk, memory, redis, none."
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    pub dir: PathBuf,
    pub ttl_seconds: u64,
    pub redis_url: String,
    pub redis_pool_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PromptsConfig {
    /// Directory whose prompt files override the bundled ones.
    pub dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_string(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: "https://aipipe.org/openai/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            timeout_seconds: 30,
            temperature: None,
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.open-meteo.com/v1/forecast".to_string(),
            timeout_seconds: 10,
            retry: RetryConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay_ms: 200,
            backoff_factor: 2,
            max_delay_ms: 10_000,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Disk,
            dir: PathBuf::from(".cache"),
            ttl_seconds: 3600,
            redis_url: "redis://127.0.0.1:6379/0".to_string(),
            redis_pool_size: 8,
        }
    }
}

impl Config {
    /// Load configuration from file with environment variable overrides.
    /// Always returns a usable config; problems are logged.
    pub fn load() -> Self {
        for path in [".env", "../.env"] {
            if dotenvy::from_path(path).is_ok() {
                tracing::info!("Loaded .env from: {}", path);
                break;
            }
        }

        let config_path =
            env::var("WEATHER_INTEL_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());

        let mut config = Self::from_file(Path::new(&config_path));
        config.apply_overrides(|key| env::var(key).ok());

        if let Err(e) = config.validate() {
            tracing::warn!("Config validation warnings: {} - continuing anyway", e);
        }

        config
    }

    /// Read a YAML config file, falling back to defaults when it is missing
    /// or unreadable.
    pub fn from_file(path: &Path) -> Self {
        if !path.exists() {
            tracing::info!("Config file not found at {} - using defaults", path.display());
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str::<Config>(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded configuration from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::error!(
                        "Failed to parse config file {}: {} - using defaults",
                        path.display(),
                        e
                    );
                    Self::default()
                }
            },
            Err(e) => {
                tracing::error!(
                    "Failed to read config file {}: {} - using defaults",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Apply overrides from a key lookup (the process environment in
    /// production).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup("WEATHER_INTEL_BIND") {
            self.server.bind = bind;
        }

        if let Some(key) = lookup("OPENAI_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.llm.api_key = Some(key);
        }
        if let Some(url) = lookup("LLM_API_URL") {
            self.llm.api_url = url;
        }
        if let Some(model) = lookup("LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(timeout) = lookup("LLM_TIMEOUT_SECONDS") {
            if let Ok(secs) = timeout.parse() {
                self.llm.timeout_seconds = secs;
            }
        }

        if let Some(url) = lookup("WEATHER_BASE_URL") {
            self.weather.base_url = url;
        }
        if let Some(backend) = lookup("WEATHER_CACHE_BACKEND") {
            match backend.parse() {
                Ok(b) => self.weather.cache.backend = b,
                Err(e) => tracing::warn!("{} - keeping {:?}", e, self.weather.cache.backend),
            }
        }
        if let Some(dir) = lookup("WEATHER_CACHE_DIR") {
            self.weather.cache.dir = PathBuf::from(dir);
        }
        if let Some(ttl) = lookup("WEATHER_CACHE_TTL_SECONDS") {
            if let Ok(secs) = ttl.parse() {
                self.weather.cache.ttl_seconds = secs;
            }
        }
        if let Some(url) = lookup("REDIS_URL") {
            self.weather.cache.redis_url = url;
        }
        if let Some(retries) = lookup("WEATHER_MAX_RETRIES") {
            if let Ok(n) = retries.parse() {
                self.weather.retry.max_retries = n;
            }
        }

        if let Some(dir) = lookup("WEATHER_INTEL_PROMPTS_DIR") {
            self.prompts.dir = Some(PathBuf::from(dir));
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.llm.api_key.is_none() {
            return Err(AssistantError::Config(
                "OPENAI_API_KEY environment variable must be set".into(),
            ));
        }
        if self.llm.timeout_seconds == 0 || self.weather.timeout_seconds == 0 {
            return Err(AssistantError::Config("timeouts cannot be 0".into()));
        }
        if self.weather.retry.backoff_factor == 0 {
            return Err(AssistantError::Config(
                "weather.retry.backoff_factor cannot be 0".into(),
            ));
        }
        if let Some(t) = self.llm.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(AssistantError::Config(
                    "llm.temperature must be between 0.0 and 2.0".into(),
                ));
            }
        }
        Ok(())
    }

    /// The language-model key, or a configuration error when it is unset.
    pub fn require_api_key(&self) -> Result<&str> {
        self.llm.api_key.as_deref().ok_or_else(|| {
            AssistantError::Config(
                "OPENAI_API_KEY is not set.\nHint: export it or add it to a .env file.".into(),
            )
        })
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm.timeout_seconds)
    }
}

impl WeatherConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_the_public_providers() {
        let cfg = Config::default();
        assert_eq!(cfg.llm.model, "gpt-4o-mini");
        assert_eq!(cfg.weather.base_url, "https://api.open-meteo.com/v1/forecast");
        assert_eq!(cfg.weather.cache.ttl_seconds, 3600);
        assert_eq!(cfg.weather.cache.backend, CacheBackend::Disk);
        assert_eq!(cfg.weather.timeout(), Duration::from_secs(10));
        assert_eq!(cfg.weather.cache.ttl(), Duration::from_secs(3600));
    }

    #[test]
    fn missing_api_key_fails_validation() {
        let cfg = Config::default();
        assert!(cfg.validate().is_err());
        let err = cfg.require_api_key().unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn env_overrides_apply() {
        let mut cfg = Config::default();
        cfg.apply_overrides(lookup_from(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("LLM_MODEL", "gpt-test"),
            ("WEATHER_CACHE_BACKEND", "none"),
            ("WEATHER_CACHE_TTL_SECONDS", "60"),
            ("WEATHER_INTEL_BIND", "127.0.0.1:9000"),
        ]));

        assert_eq!(cfg.require_api_key().unwrap(), "sk-test");
        assert_eq!(cfg.llm.model, "gpt-test");
        assert_eq!(cfg.weather.cache.backend, CacheBackend::None);
        assert_eq!(cfg.weather.cache.ttl(), Duration::from_secs(60));
        assert_eq!(cfg.server.bind, "127.0.0.1:9000");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn blank_api_key_is_ignored() {
        let mut cfg = Config::default();
        cfg.apply_overrides(lookup_from(&[("OPENAI_API_KEY", "  ")]));
        assert!(cfg.llm.api_key.is_none());
    }

    #[test]
    fn bad_cache_backend_keeps_previous_value() {
        let mut cfg = Config::default();
        cfg.apply_overrides(lookup_from(&[("WEATHER_CACHE_BACKEND", "sqlite")]));
        assert_eq!(cfg.weather.cache.backend, CacheBackend::Disk);
    }

    #[test]
    fn partial_yaml_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "llm:\n  model: gpt-4o\nweather:\n  cache:\n    backend: memory\n",
        )
        .unwrap();

        let cfg = Config::from_file(&path);
        assert_eq!(cfg.llm.model, "gpt-4o");
        assert_eq!(cfg.llm.timeout_seconds, 30);
        assert_eq!(cfg.weather.cache.backend, CacheBackend::Memory);
        assert_eq!(cfg.weather.retry.max_retries, 5);
    }

    #[test]
    fn unparsable_yaml_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "llm: [not, a, map").unwrap();

        let cfg = Config::from_file(&path);
        assert_eq!(cfg.llm.model, "gpt-4o-mini");
    }
}
