use log::debug;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Models assumed available when the listing endpoint cannot be reached.
pub const FALLBACK_MODELS: &[&str] = &[
    "glm-5",
    "glm-4.7",
    "glm-4.7-flash",
    "glm-4.6",
    "glm-4.6-air",
    "glm-4.5",
    "glm-4.5-air",
];

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "data: [DONE]";

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("API request failed: {0}")]
    Status(StatusCode),

    #[error("Request error: {0}")]
    Transport(#[from] reqwest::Error),
}

// Request types for the chat completions endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub stream: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

// Models list response
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsResponse {
    #[serde(default)]
    pub data: Vec<Model>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Model {
    #[serde(default)]
    pub id: String,
}

// Raw streaming payload. Every field read from the wire has an explicit
// default; a chunk may carry choices, usage, both, or neither.
#[derive(Debug, Default, Deserialize)]
struct RawChunk {
    #[serde(default)]
    choices: Vec<RawChoice>,
    #[serde(default)]
    usage: Option<RawUsage>,
}

#[derive(Debug, Default, Deserialize)]
struct RawChoice {
    #[serde(default)]
    delta: RawDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawDelta {
    #[serde(default)]
    content: Option<String>,
    // Thinking models stream their reasoning through a separate field
    #[serde(default)]
    reasoning_content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

/// One decoded increment of a streaming response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamChunk {
    pub content: String,
    pub finish_reason: Option<String>,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// Parses a single SSE line into a [`StreamChunk`].
///
/// Returns `None` for lines that carry no payload: blank keep-alives, the
/// `[DONE]` sentinel, lines without the `data: ` prefix, and payloads that
/// fail to parse. A syntactically valid payload always yields a chunk, even
/// when its delta is empty.
pub fn parse_stream_line(line: &str) -> Option<StreamChunk> {
    let line = line.trim();

    if line.is_empty() || line == DONE_SENTINEL {
        return None;
    }

    let json = line.strip_prefix(DATA_PREFIX)?;
    let raw: RawChunk = serde_json::from_str(json).ok()?;

    let mut chunk = StreamChunk::default();

    if let Some(choice) = raw.choices.into_iter().next() {
        let content = choice.delta.content.unwrap_or_default();
        let reasoning = choice.delta.reasoning_content.unwrap_or_default();
        chunk.content = content + &reasoning;
        chunk.finish_reason = choice.finish_reason;
    }

    if let Some(usage) = raw.usage {
        chunk.prompt_tokens = usage.prompt_tokens;
        chunk.completion_tokens = usage.completion_tokens;
        chunk.total_tokens = usage.total_tokens;
    }

    Some(chunk)
}

/// HTTP client for the Z.AI chat completions API.
///
/// One client is built per invocation and reused across every warmup and
/// timed trial; trials are sequential, so the underlying connection pool is
/// never contended.
#[derive(Debug, Clone)]
pub struct ZaiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl ZaiClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, ClientError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Opens a streaming chat completion request.
    ///
    /// The clock for a trial starts before this call; any HTTP status or
    /// transport failure is returned for the caller to fold into a failed
    /// trial result.
    pub async fn chat_completion_stream(
        &self,
        model: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<ChatStream, ClientError> {
        let request = ChatCompletionRequest {
            model: model.to_string(),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens,
            stream: true,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status(status));
        }

        Ok(ChatStream {
            response,
            buffer: Vec::new(),
        })
    }

    /// Fetches the available model list, falling back to [`FALLBACK_MODELS`]
    /// on any transport, status, or parse failure. Never errors.
    pub async fn fetch_available_models(&self) -> Vec<String> {
        match self.try_fetch_models().await {
            Ok(models) if !models.is_empty() => models,
            Ok(_) => fallback_models(),
            Err(e) => {
                debug!("model listing failed, using fallback list: {}", e);
                fallback_models()
            }
        }
    }

    async fn try_fetch_models(&self) -> Result<Vec<String>, ClientError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status(status));
        }

        let listing: ModelsResponse = response.json().await?;
        let mut models: Vec<String> = listing
            .data
            .into_iter()
            .map(|m| m.id)
            .filter(|id| !id.is_empty())
            .collect();
        models.sort();

        Ok(models)
    }
}

fn fallback_models() -> Vec<String> {
    FALLBACK_MODELS.iter().map(|m| m.to_string()).collect()
}

/// A lazy, finite sequence of [`StreamChunk`]s over one response body.
///
/// Body bytes arrive in arbitrary slices; complete lines are reassembled in
/// the buffer before parsing so an SSE event split across reads is never
/// dropped.
pub struct ChatStream {
    response: reqwest::Response,
    buffer: Vec<u8>,
}

impl ChatStream {
    /// Returns the next increment, or `None` once the transport has closed
    /// the stream. Skip lines (keep-alives, `[DONE]`, malformed payloads)
    /// are consumed silently.
    pub async fn next_chunk(&mut self) -> Result<Option<StreamChunk>, ClientError> {
        loop {
            if let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = self.buffer.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&line);
                if let Some(chunk) = parse_stream_line(&line) {
                    return Ok(Some(chunk));
                }
                continue;
            }

            match self.response.chunk().await? {
                Some(bytes) => self.buffer.extend_from_slice(&bytes),
                None => {
                    // The server closed the stream; a trailing unterminated
                    // line may still hold a payload.
                    if self.buffer.is_empty() {
                        return Ok(None);
                    }
                    let line = std::mem::take(&mut self.buffer);
                    let line = String::from_utf8_lossy(&line);
                    return Ok(parse_stream_line(&line));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_chunk() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hello"},"finish_reason":null}]}"#;

        let chunk = parse_stream_line(line).unwrap();

        assert_eq!(chunk.content, "Hello");
        assert_eq!(chunk.finish_reason, None);
    }

    #[test]
    fn test_parse_chunk_with_usage() {
        let line = r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}],"usage":{"prompt_tokens":10,"completion_tokens":20,"total_tokens":30}}"#;

        let chunk = parse_stream_line(line).unwrap();

        assert_eq!(chunk.finish_reason.as_deref(), Some("stop"));
        assert_eq!(chunk.prompt_tokens, 10);
        assert_eq!(chunk.completion_tokens, 20);
        assert_eq!(chunk.total_tokens, 30);
    }

    #[test]
    fn test_parse_concatenates_reasoning_content() {
        let line = r#"data: {"choices":[{"delta":{"content":"a","reasoning_content":"b"}}]}"#;
        let chunk = parse_stream_line(line).unwrap();
        assert_eq!(chunk.content, "ab");

        // Reasoning-only chunks still count as content
        let line = r#"data: {"choices":[{"delta":{"reasoning_content":"thinking"}}]}"#;
        let chunk = parse_stream_line(line).unwrap();
        assert_eq!(chunk.content, "thinking");
    }

    #[test]
    fn test_parse_done_signal() {
        assert_eq!(parse_stream_line("data: [DONE]"), None);
        // Surrounding whitespace is trimmed before the sentinel check
        assert_eq!(parse_stream_line("data: [DONE]\r"), None);
    }

    #[test]
    fn test_parse_empty_line() {
        assert_eq!(parse_stream_line(""), None);
        assert_eq!(parse_stream_line("   "), None);
    }

    #[test]
    fn test_parse_invalid_json() {
        assert_eq!(parse_stream_line("data: {invalid json}"), None);
    }

    #[test]
    fn test_parse_non_data_line() {
        assert_eq!(parse_stream_line("some other text"), None);
        // Prefix must include the space
        assert_eq!(parse_stream_line(r#"data:{"choices":[]}"#), None);
    }

    #[test]
    fn test_parse_valid_payload_without_choices_or_usage() {
        // A valid empty payload is an increment, not a skip
        let chunk = parse_stream_line("data: {}").unwrap();
        assert_eq!(chunk, StreamChunk::default());
    }

    #[test]
    fn test_parse_null_delta_fields() {
        let line = r#"data: {"choices":[{"delta":{"content":null},"finish_reason":null}]}"#;
        let chunk = parse_stream_line(line).unwrap();
        assert_eq!(chunk.content, "");
    }

    #[tokio::test]
    async fn test_fetch_models_falls_back_when_unreachable() {
        // Nothing listens on the discard port; the fetch must downgrade to
        // the static list, in its defined order.
        let client = ZaiClient::new("http://127.0.0.1:9", "test-key", Duration::from_secs(1))
            .expect("client should build");

        let models = client.fetch_available_models().await;

        assert_eq!(models, fallback_models());
    }
}
