use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::remote::{http_client, relay_lines, send_request, Backend, LineEvent, RetryPolicy};
use super::{system_instruction, FragmentSink, SourceError};
use crate::profile::Profile;

pub const DEFAULT_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    system_instruction: Content,
}

#[derive(Deserialize)]
struct ChunkPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct ChunkContent {
    #[serde(default)]
    parts: Vec<ChunkPart>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<ChunkContent>,
}

#[derive(Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

/// Gemini `streamGenerateContent` over Server-Sent Events.
pub struct GeminiBackend {
    api_key: Option<String>,
    model: String,
    base_url: String,
    system: String,
}

impl GeminiBackend {
    pub fn new(api_key: Option<String>, model: Option<String>, profile: &Profile) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: DEFAULT_URL.to_string(),
            system: system_instruction(profile),
        }
    }

    /// Point at another host, e.g. a proxy in front of the API.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.base_url, self.model
        )
    }
}

/// Text carried by one SSE line, if any.
pub(crate) fn decode_sse_line(line: &str) -> Result<LineEvent, SourceError> {
    let Some(data) = line.strip_prefix("data:") else {
        // event:, id:, retry: and comment lines carry no text
        return Ok(LineEvent::Skip);
    };
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(LineEvent::Done);
    }

    let chunk: GenerateChunk =
        serde_json::from_str(data).map_err(|e| SourceError::Malformed(e.to_string()))?;

    let text: String = chunk
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .map(|content| {
            content
                .parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect()
        })
        .unwrap_or_default();

    Ok(LineEvent::Text(text))
}

#[async_trait]
impl Backend for GeminiBackend {
    fn label(&self) -> String {
        format!("Gemini: {}", self.model)
    }

    fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }

    async fn stream(
        &self,
        prompt: &str,
        policy: &RetryPolicy,
        sink: &mut dyn FragmentSink,
    ) -> Result<(), SourceError> {
        let api_key = self.api_key.as_deref().unwrap_or_default();

        let request = GenerateRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part { text: prompt.to_string() }],
            }],
            system_instruction: Content {
                role: None,
                parts: vec![Part { text: self.system.clone() }],
            },
        };

        let builder = http_client()
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .header("content-type", "application/json")
            .json(&request);

        let response = send_request(builder, policy).await?;
        relay_lines(response, policy, sink, decode_sse_line).await
    }
}
