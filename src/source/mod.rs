//! Response sources: anything that turns a prompt into an ordered series of
//! text fragments.
//!
//! A source never knows who is listening. It pushes fragments into a
//! [`FragmentSink`] supplied by the caller and returns once nothing more will
//! be delivered.

pub mod gemini;
pub mod local;
pub mod ollama;
pub mod remote;

use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use thiserror::Error;

use crate::config::Config;
use crate::profile::Profile;

pub use gemini::GeminiBackend;
pub use local::{LocalSource, LocalTiming};
pub use ollama::OllamaBackend;
pub use remote::{RemoteSource, RetryPolicy};

/// Shown as the whole response when a remote generator has no credential.
pub const SERVICE_UNAVAILABLE: &str =
    "Neural Core unavailable: no API key configured for the remote generator. Set GEMINI_API_KEY or switch to local mode.";

/// Receives fragments in delivery order.
pub trait FragmentSink: Send {
    fn append(&mut self, text: &str);
}

impl FragmentSink for String {
    fn append(&mut self, text: &str) {
        self.push_str(text);
    }
}

impl FragmentSink for Vec<String> {
    fn append(&mut self, text: &str) {
        self.push(text.to_string());
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("service returned {status}: {body}")]
    Service { status: u16, body: String },

    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error("malformed stream payload: {0}")]
    Malformed(String),
}

impl SourceError {
    /// Whether a fresh attempt has a reasonable chance of succeeding.
    pub fn is_retryable(&self) -> bool {
        match self {
            SourceError::Transport(_) | SourceError::Timeout(_) => true,
            SourceError::Service { status, .. } => *status == 429 || *status >= 500,
            SourceError::Malformed(_) => false,
        }
    }
}

#[async_trait]
pub trait ResponseSource: Send + Sync {
    /// Short human label, e.g. "Gemini: gemini-2.5-flash".
    fn label(&self) -> String;

    async fn produce(&self, prompt: &str, sink: &mut dyn FragmentSink) -> Result<(), SourceError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Local,
    Gemini,
    Ollama,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Local => "local",
            Provider::Gemini => "gemini",
            Provider::Ollama => "ollama",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "local" => Some(Provider::Local),
            "gemini" => Some(Provider::Gemini),
            "ollama" => Some(Provider::Ollama),
            _ => None,
        }
    }

    pub fn all() -> Vec<Provider> {
        vec![Provider::Local, Provider::Gemini, Provider::Ollama]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::Local => "Local Simulation",
            Provider::Gemini => "Gemini (Google)",
            Provider::Ollama => "Ollama (Local)",
        }
    }

    /// The provider after this one, wrapping around.
    pub fn next(&self) -> Provider {
        let all = Provider::all();
        let i = all.iter().position(|p| p == self).unwrap_or(0);
        all[(i + 1) % all.len()]
    }
}

/// Build the source for a provider from configuration.
pub fn build_source(provider: Provider, config: &Config, profile: Arc<Profile>) -> Arc<dyn ResponseSource> {
    match provider {
        Provider::Local => Arc::new(LocalSource::new(profile, LocalTiming::default())),
        Provider::Gemini => {
            let backend = GeminiBackend::new(
                config.gemini_key(),
                config.model_for(provider),
                &profile,
            )
            .with_base_url(&config.gemini_base_url());
            Arc::new(RemoteSource::new(backend, config.retry_policy()))
        }
        Provider::Ollama => {
            let backend = OllamaBackend::new(
                &config.ollama_base_url(),
                config.model_for(provider),
                &profile,
            );
            Arc::new(RemoteSource::new(backend, config.retry_policy()))
        }
    }
}

/// Framing handed to remote generators so answers stay on topic.
pub(crate) fn system_instruction(profile: &Profile) -> String {
    let projects: Vec<&str> = profile.projects.iter().map(|p| p.title.as_str()).collect();
    let role = profile
        .current_job()
        .map(|job| format!("{} at {}", job.role, job.company))
        .unwrap_or_else(|| profile.headline.clone());

    format!(
        "You are the Neural Interface of {name}'s portfolio terminal. {name} is a {headline}, currently {role}. \
         Notable projects: {projects}. Answer concisely in plain text suitable for a terminal, \
         and only about {name}'s work, skills, experience and contact details ({email}).",
        name = profile.name,
        headline = profile.headline,
        role = role,
        projects = projects.join(", "),
        email = profile.social.email,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_round_trip_names() {
        for provider in Provider::all() {
            assert_eq!(Provider::from_str(provider.as_str()), Some(provider));
        }
        assert_eq!(Provider::from_str(" Gemini "), Some(Provider::Gemini));
        assert_eq!(Provider::from_str("claude"), None);
    }

    #[test]
    fn test_provider_next_wraps() {
        assert_eq!(Provider::Local.next(), Provider::Gemini);
        assert_eq!(Provider::Ollama.next(), Provider::Local);
    }

    #[test]
    fn test_retryable_errors() {
        assert!(SourceError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(SourceError::Service { status: 503, body: String::new() }.is_retryable());
        assert!(SourceError::Service { status: 429, body: String::new() }.is_retryable());
        assert!(!SourceError::Service { status: 401, body: String::new() }.is_retryable());
        assert!(!SourceError::Malformed("x".into()).is_retryable());
    }

    #[test]
    fn test_system_instruction_mentions_projects() {
        let profile = Profile::default();
        let text = system_instruction(&profile);
        assert!(text.contains("CtrlFake"));
        assert!(text.contains("Lead AI Engineer"));
    }
}
