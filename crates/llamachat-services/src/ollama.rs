use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, instrument};

use llamachat_core::{ConnectionConfig, GenerationConfig, ModelSummary, Transcript};

use crate::inventory::normalize_inventory;

#[derive(Error, Debug)]
pub enum OllamaError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Connection refused - is Ollama running at {0}?")]
    ConnectionRefused(String),
    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Server error: {0}")]
    Server(String),
    #[error("Malformed response: {0}")]
    Protocol(String),
    #[error("Stream ended before the response was complete")]
    Truncated,
    #[error("Another model operation is already running")]
    Busy,
}

/// Stream of decoded newline-delimited JSON objects
pub type ChunkStream<T> = Pin<Box<dyn Stream<Item = Result<T, OllamaError>> + Send>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    pub options: ChatOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatOptions {
    pub temperature: f32,
    pub top_p: f32,
    pub num_predict: u32,
    pub num_ctx: u32,
}

impl ChatRequest {
    /// System prompt (when set) followed by the committed transcript, role and content only.
    pub fn build(model: &str, transcript: &Transcript, generation: &GenerationConfig) -> Self {
        let system = generation
            .effective_system_prompt()
            .map(|prompt| ChatMessage {
                role: "system".to_string(),
                content: prompt.to_string(),
            });

        let history = transcript.messages().iter().map(|msg| ChatMessage {
            role: msg.role.as_str().to_string(),
            content: msg.content.clone(),
        });

        Self {
            model: model.to_string(),
            messages: system.into_iter().chain(history).collect(),
            stream: true,
            options: ChatOptions {
                temperature: generation.temperature,
                top_p: generation.top_p,
                num_predict: generation.max_output_tokens,
                num_ctx: generation.context_window,
            },
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatChunk {
    #[serde(default)]
    pub message: Option<ResponseMessage>,
    #[serde(default)]
    pub done: bool,
}

impl ChatChunk {
    pub fn content(&self) -> &str {
        self.message.as_ref().map(|m| m.content.as_str()).unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: String,
}

/// One progress line of `/api/pull`. Sizes are cumulative and sparse.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PullUpdate {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub completed: Option<u64>,
    #[serde(default)]
    pub digest: Option<String>,
}

#[derive(Serialize)]
struct PullRequest<'a> {
    model: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct ServerError {
    error: String,
}

/// The three model-server operations the client consumes.
#[async_trait]
pub trait OllamaApi: Send + Sync {
    fn base_url(&self) -> &str;

    async fn list(&self) -> Result<Vec<ModelSummary>, OllamaError>;

    async fn chat(&self, request: &ChatRequest) -> Result<ChunkStream<ChatChunk>, OllamaError>;

    async fn pull(&self, model: &str) -> Result<ChunkStream<PullUpdate>, OllamaError>;
}

#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl OllamaClient {
    pub fn new(config: &ConnectionConfig) -> Result<Self, OllamaError> {
        Self::with_base_url(config.base_url(), config.timeout())
    }

    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Result<Self, OllamaError> {
        // Streams may legitimately run for minutes, so only connecting is bounded
        let client = reqwest::Client::builder().connect_timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            base_url,
            timeout,
            client,
        })
    }

    async fn check_status(&self, resp: reqwest::Response) -> Result<reqwest::Response, OllamaError> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ServerError>(&body)
            .map(|e| e.error)
            .unwrap_or(body);

        error!(status, %message, "Ollama request failed");
        Err(OllamaError::Status { status, message })
    }
}

#[async_trait]
impl OllamaApi for OllamaClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    #[instrument(skip(self), fields(host = %self.base_url))]
    async fn list(&self) -> Result<Vec<ModelSummary>, OllamaError> {
        let url = format!("{}/api/tags", self.base_url);
        debug!("Fetching models from Ollama API");

        let resp = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, &self.base_url))?;
        let resp = self.check_status(resp).await?;

        let body: serde_json::Value = resp.json().await?;
        let models = normalize_inventory(body)?;
        info!(count = models.len(), "Fetched models from Ollama");
        Ok(models)
    }

    #[instrument(skip(self, request), fields(host = %self.base_url, model = %request.model, messages = request.messages.len()))]
    async fn chat(&self, request: &ChatRequest) -> Result<ChunkStream<ChatChunk>, OllamaError> {
        let url = format!("{}/api/chat", self.base_url);
        debug!("Starting streaming chat");

        let resp = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, &self.base_url))?;
        let resp = self.check_status(resp).await?;

        Ok(ndjson_stream(resp))
    }

    #[instrument(skip(self), fields(host = %self.base_url))]
    async fn pull(&self, model: &str) -> Result<ChunkStream<PullUpdate>, OllamaError> {
        let url = format!("{}/api/pull", self.base_url);
        info!("Starting model pull");

        let resp = self
            .client
            .post(&url)
            .json(&PullRequest {
                model,
                stream: true,
            })
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, &self.base_url))?;
        let resp = self.check_status(resp).await?;

        Ok(ndjson_stream(resp))
    }
}

/// Map reqwest errors to OllamaError, detecting connection failures
fn map_reqwest_error(e: reqwest::Error, base_url: &str) -> OllamaError {
    if e.is_connect() {
        error!("Connection refused - Ollama not running at {}?", base_url);
        return OllamaError::ConnectionRefused(base_url.to_string());
    }

    error!("HTTP error: {}", e);
    OllamaError::Http(e)
}

/// Decode a streaming body line by line; lines may span several network chunks.
fn ndjson_stream<T>(resp: reqwest::Response) -> ChunkStream<T>
where
    T: DeserializeOwned + Send + 'static,
{
    let mut body = Box::pin(resp.bytes_stream());

    Box::pin(async_stream::stream! {
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(bytes) = body.next().await {
            match bytes {
                Ok(bytes) => buffer.extend_from_slice(&bytes),
                Err(e) => {
                    yield Err(OllamaError::Http(e));
                    return;
                }
            }

            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                if let Some(item) = decode_line::<T>(&line) {
                    yield item;
                }
            }
        }

        if let Some(item) = decode_line::<T>(&buffer) {
            yield item;
        }
    })
}

pub(crate) fn decode_line<T: DeserializeOwned>(line: &[u8]) -> Option<Result<T, OllamaError>> {
    let text = String::from_utf8_lossy(line);
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(ServerError { error }) = serde_json::from_str::<ServerError>(text) {
        return Some(Err(OllamaError::Server(error)));
    }

    Some(serde_json::from_str(text).map_err(|e| {
        let preview: String = text.chars().take(200).collect();
        OllamaError::Protocol(format!("{} - line: {}", e, preview))
    }))
}
