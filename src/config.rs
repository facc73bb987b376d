use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Result, anyhow};

use crate::profile::Profile;
use crate::source::{Provider, RetryPolicy};

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub provider: Option<String>,
    pub gemini_model: Option<String>,
    pub ollama_model: Option<String>,
    pub gemini_api_key: Option<String>,
    pub gemini_url: Option<String>,
    pub ollama_url: Option<String>,
    pub profile_path: Option<PathBuf>,
    pub log_level: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub idle_timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub typewriter: Option<bool>,
}

impl Config {
    pub fn new() -> Self {
        Self {
            provider: Some(Provider::Local.as_str().to_string()),
            ..Self::default()
        }
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    pub fn save_provider(provider: Provider) -> Result<()> {
        Self::save_provider_to(&Self::get_config_path()?, provider)
    }

    /// Update only the provider in the file at `path`. An unreadable file is
    /// reported and left alone rather than replaced with defaults.
    pub fn save_provider_to(path: &Path, provider: Provider) -> Result<()> {
        let mut config = Self::load_from(path)
            .map_err(|e| anyhow!("Refusing to overwrite {}: {}", path.display(), e))?;
        config.provider = Some(provider.as_str().to_string());
        config.save_to(path)
    }

    pub fn provider(&self) -> Provider {
        self.provider
            .as_deref()
            .and_then(Provider::from_str)
            .unwrap_or(Provider::Local)
    }

    /// Environment first (`GEMINI_API_KEY`, then `API_KEY`), then the file.
    pub fn gemini_key(&self) -> Option<String> {
        let env = std::env::var("GEMINI_API_KEY")
            .or_else(|_| std::env::var("API_KEY"))
            .ok();
        self.gemini_key_with(env)
    }

    fn gemini_key_with(&self, env: Option<String>) -> Option<String> {
        env.filter(|k| !k.trim().is_empty())
            .or_else(|| self.gemini_api_key.clone())
    }

    pub fn gemini_base_url(&self) -> String {
        self.gemini_url
            .clone()
            .unwrap_or_else(|| crate::source::gemini::DEFAULT_URL.to_string())
    }

    pub fn ollama_base_url(&self) -> String {
        self.ollama_url
            .clone()
            .unwrap_or_else(|| crate::source::ollama::DEFAULT_URL.to_string())
    }

    pub fn model_for(&self, provider: Provider) -> Option<String> {
        match provider {
            Provider::Local => None,
            Provider::Gemini => self.gemini_model.clone(),
            Provider::Ollama => self.ollama_model.clone(),
        }
    }

    pub fn set_model(&mut self, provider: Provider, model: String) {
        match provider {
            Provider::Local => {}
            Provider::Gemini => self.gemini_model = Some(model),
            Provider::Ollama => self.ollama_model = Some(model),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let defaults = RetryPolicy::default();
        RetryPolicy {
            request_timeout: self
                .request_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            idle_timeout: self
                .idle_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.idle_timeout),
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            backoff: defaults.backoff,
        }
    }

    pub fn log_level(&self) -> String {
        self.log_level.clone().unwrap_or_else(|| "info".to_string())
    }

    pub fn typewriter(&self) -> bool {
        self.typewriter.unwrap_or(true)
    }

    /// Profile from `profile_path`, or the built-in one.
    pub fn profile(&self) -> Result<Profile> {
        match &self.profile_path {
            Some(path) => Profile::load(path)
                .map_err(|e| anyhow!("Could not load profile {}: {}", path.display(), e)),
            None => Ok(Profile::default()),
        }
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("portfolio-terminal").join("config.json"))
    }

    /// Directory for rolling log files.
    pub fn log_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .or_else(dirs::config_dir)
            .ok_or_else(|| anyhow!("Could not determine data directory"))?;

        Ok(data_dir.join("portfolio-terminal").join("logs"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config.provider(), Provider::Local);
        assert!(config.typewriter());
        assert_eq!(config.log_level(), "info");
        assert_eq!(config.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::new();
        config.provider = Some("ollama".to_string());
        config.set_model(Provider::Ollama, "qwen3".to_string());
        config.request_timeout_secs = Some(5);
        config.max_retries = Some(0);
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.provider(), Provider::Ollama);
        assert_eq!(loaded.model_for(Provider::Ollama), Some("qwen3".to_string()));
        assert_eq!(loaded.model_for(Provider::Local), None);
        let policy = loaded.retry_policy();
        assert_eq!(policy.request_timeout, Duration::from_secs(5));
        assert_eq!(policy.max_retries, 0);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"provider":"gemini","typewriter":false}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.provider(), Provider::Gemini);
        assert!(!config.typewriter());
        assert_eq!(config.ollama_base_url(), "http://localhost:11434");
        assert_eq!(config.gemini_base_url(), "https://generativelanguage.googleapis.com");
    }

    #[test]
    fn test_save_provider_keeps_other_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"gemini_api_key":"SECRET-KEY","provider":"gemini"}"#).unwrap();

        Config::save_provider_to(&path, Provider::Ollama).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.provider(), Provider::Ollama);
        assert_eq!(loaded.gemini_api_key, Some("SECRET-KEY".to_string()));
    }

    #[test]
    fn test_save_provider_leaves_malformed_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let original = r#"{"gemini_api_key":"SECRET-KEY","provider":"gemini",}"#;
        fs::write(&path, original).unwrap();

        assert!(Config::save_provider_to(&path, Provider::Ollama).is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), original);
    }

    #[test]
    fn test_save_provider_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh").join("config.json");

        Config::save_provider_to(&path, Provider::Gemini).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().provider(), Provider::Gemini);
    }

    #[test]
    fn test_unknown_provider_falls_back_to_local() {
        let config = Config {
            provider: Some("claude".to_string()),
            ..Config::default()
        };
        assert_eq!(config.provider(), Provider::Local);
    }

    #[test]
    fn test_env_key_wins_over_file_key() {
        let config = Config {
            gemini_api_key: Some("from-file".to_string()),
            ..Config::default()
        };
        assert_eq!(config.gemini_key_with(Some("from-env".into())), Some("from-env".to_string()));
        assert_eq!(config.gemini_key_with(Some("   ".into())), Some("from-file".to_string()));
        assert_eq!(config.gemini_key_with(None), Some("from-file".to_string()));
        assert_eq!(Config::default().gemini_key_with(None), None);
    }

    #[test]
    fn test_bad_profile_path_is_an_error() {
        let config = Config {
            profile_path: Some(PathBuf::from("/definitely/not/here.json")),
            ..Config::default()
        };
        assert!(config.profile().is_err());
    }
}
