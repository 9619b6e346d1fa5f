//! LLM backend dispatch.
//!
//! The cognition layer talks to whichever chat API is configured through
//! a single enum, [`LlmBackend`] -- async trait objects are not
//! dyn-compatible, so enum dispatch it is. Two wire shapes are
//! supported: OpenAI-style chat completions and the Anthropic Messages
//! API. Both ride the same [`send_and_decode`] helper; the only
//! per-backend code is request assembly and the response path the text
//! lives under. A third, scripted variant replays canned responses so
//! the whole runtime can be exercised without network access.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde::Deserialize;

use crate::error::LlmError;
use crate::prompt::RenderedPrompt;

/// Token ceiling requested per completion.
const MAX_COMPLETION_TOKENS: u32 = 512;

/// Sampling temperature for agent cognition.
const TEMPERATURE: f64 = 0.7;

/// Which concrete backend a configuration selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// OpenAI-compatible chat completions API.
    OpenAi,
    /// Anthropic Messages API.
    Anthropic,
}

/// Connection settings for a remote backend.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Which API shape to speak.
    pub kind: BackendKind,
    /// Base URL, e.g. `https://api.openai.com/v1`.
    pub api_url: String,
    /// API key; read from the environment by the engine.
    #[serde(default)]
    pub api_key: String,
    /// Model identifier.
    pub model: String,
}

/// An LLM backend that can turn a prompt into response text.
pub enum LlmBackend {
    /// OpenAI-compatible chat completions API.
    OpenAi(HttpBackend),
    /// Anthropic Messages API.
    Anthropic(HttpBackend),
    /// In-process scripted responses (tests, offline demos).
    Scripted(ScriptedBackend),
}

impl LlmBackend {
    /// Build a backend from configuration.
    pub fn from_config(config: &BackendConfig) -> Self {
        match config.kind {
            BackendKind::OpenAi => Self::OpenAi(HttpBackend::new(config)),
            BackendKind::Anthropic => Self::Anthropic(HttpBackend::new(config)),
        }
    }

    /// Build a scripted backend that replays the given responses in
    /// order, then keeps repeating the last one.
    pub fn scripted(responses: Vec<String>) -> Self {
        Self::Scripted(ScriptedBackend::new(responses))
    }

    /// Send a prompt and return the model's response text.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Backend`] when the call fails, the endpoint
    /// answers with a non-success status, or the response carries no
    /// text where this API shape keeps it.
    pub async fn complete(&self, prompt: &RenderedPrompt) -> Result<String, LlmError> {
        match self {
            Self::OpenAi(backend) => backend.complete_chat(prompt).await,
            Self::Anthropic(backend) => backend.complete_messages(prompt).await,
            Self::Scripted(backend) => backend.complete(),
        }
    }

    /// Human-readable name for logging.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::OpenAi(_) => "openai-compatible",
            Self::Anthropic(_) => "anthropic",
            Self::Scripted(_) => "scripted",
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP transport
// ---------------------------------------------------------------------------

/// Shared state for the two remote API shapes.
///
/// The wire differences are small enough that one struct serves both:
/// each `complete_*` method assembles its own request and names the
/// JSON path the answer text sits at.
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl HttpBackend {
    /// Create a backend from connection settings.
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.api_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    /// Call `{base}/chat/completions` (OpenAI, DeepSeek, Ollama, ...).
    ///
    /// The system and user messages go in the messages array and
    /// `response_format` asks for a JSON object, which the well-behaved
    /// endpoints honor.
    async fn complete_chat(&self, prompt: &RenderedPrompt) -> Result<String, LlmError> {
        let request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "model": self.model,
                "messages": [
                    {"role": "system", "content": prompt.system},
                    {"role": "user", "content": prompt.user},
                ],
                "temperature": TEMPERATURE,
                "max_tokens": MAX_COMPLETION_TOKENS,
                "response_format": {"type": "json_object"},
            }));

        let body = send_and_decode(request, "chat completions").await?;
        text_at(&body, "/choices/0/message/content", "chat completions")
    }

    /// Call `{base}/messages` (Anthropic).
    ///
    /// Here the system prompt is a top-level field, auth rides the
    /// `x-api-key` header, and the answer text lives in the first
    /// content block.
    async fn complete_messages(&self, prompt: &RenderedPrompt) -> Result<String, LlmError> {
        let request = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&serde_json::json!({
                "model": self.model,
                "max_tokens": MAX_COMPLETION_TOKENS,
                "system": prompt.system,
                "messages": [
                    {"role": "user", "content": prompt.user},
                ],
            }));

        let body = send_and_decode(request, "messages").await?;
        text_at(&body, "/content/0/text", "messages")
    }
}

/// Fire a prepared request and decode the JSON body, folding transport
/// failures and non-success statuses into [`LlmError::Backend`].
async fn send_and_decode(
    request: reqwest::RequestBuilder,
    api: &str,
) -> Result<serde_json::Value, LlmError> {
    let response = request
        .send()
        .await
        .map_err(|e| LlmError::Backend(format!("{api} call did not go through: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let detail = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_owned());
        return Err(LlmError::Backend(format!(
            "{api} endpoint answered {status}: {detail}"
        )));
    }

    response
        .json()
        .await
        .map_err(|e| LlmError::Backend(format!("{api} body is not JSON: {e}")))
}

/// Pull the answer text from a decoded body at a JSON-pointer path.
fn text_at(body: &serde_json::Value, pointer: &str, api: &str) -> Result<String, LlmError> {
    body.pointer(pointer)
        .and_then(serde_json::Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| LlmError::Backend(format!("{api} response has no text at {pointer}")))
}

// ---------------------------------------------------------------------------
// Scripted backend
// ---------------------------------------------------------------------------

/// Replays canned responses in order; repeats the last one when the
/// script runs out. Lets the full reactive cycle run hermetically.
pub struct ScriptedBackend {
    responses: Mutex<VecDeque<String>>,
    last: Mutex<Option<String>>,
}

impl ScriptedBackend {
    /// Create a scripted backend from an ordered response list.
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            last: Mutex::new(None),
        }
    }

    /// Pop the next scripted response.
    fn complete(&self) -> Result<String, LlmError> {
        let popped = self
            .responses
            .lock()
            .map_err(|_| LlmError::Backend("scripted backend poisoned".to_owned()))?
            .pop_front();

        let mut last = self
            .last
            .lock()
            .map_err(|_| LlmError::Backend("scripted backend poisoned".to_owned()))?;

        match popped {
            Some(response) => {
                *last = Some(response.clone());
                Ok(response)
            }
            None => last
                .clone()
                .ok_or_else(|| LlmError::Backend("scripted backend has no responses".to_owned())),
        }
    }
}
