use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::remote::{http_client, relay_lines, send_request, Backend, LineEvent, RetryPolicy};
use super::{system_instruction, FragmentSink, SourceError};
use crate::profile::Profile;

pub const DEFAULT_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llama3.2:latest";

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    system: String,
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Ollama `/api/generate` streaming newline-delimited JSON.
pub struct OllamaBackend {
    base_url: String,
    model: String,
    system: String,
}

impl OllamaBackend {
    pub fn new(base_url: &str, model: Option<String>, profile: &Profile) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            system: system_instruction(profile),
        }
    }
}

/// A final chunk that still carries text is forwarded as text; the body
/// closing right after it ends the stream.
pub(crate) fn decode_ndjson_line(line: &str) -> Result<LineEvent, SourceError> {
    let chunk: OllamaChunk =
        serde_json::from_str(line).map_err(|e| SourceError::Malformed(e.to_string()))?;

    if let Some(error) = chunk.error {
        return Err(SourceError::Service { status: 500, body: error });
    }
    if chunk.done && chunk.response.is_empty() {
        return Ok(LineEvent::Done);
    }
    Ok(LineEvent::Text(chunk.response))
}

#[async_trait]
impl Backend for OllamaBackend {
    fn label(&self) -> String {
        format!("Ollama: {}", self.model)
    }

    async fn stream(
        &self,
        prompt: &str,
        policy: &RetryPolicy,
        sink: &mut dyn FragmentSink,
    ) -> Result<(), SourceError> {
        let url = format!("{}/api/generate", self.base_url);

        let request = OllamaRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            system: self.system.clone(),
            stream: true,
        };

        let response = send_request(http_client().post(&url).json(&request), policy).await?;
        relay_lines(response, policy, sink, decode_ndjson_line).await
    }
}
