#[cfg(test)]
#[path = "openai_test.rs"]
mod tests;

use crate::backend::utils::clean_response;
use crate::backend::{ArcBackend, Backend, BackendError};
use crate::config::user_agent;
use crate::models::{BackendPrompt, BackendResponse, BackendUsage, ChunkTx, Message, Model};
use async_trait::async_trait;
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::{fmt::Display, time};
use thiserror::Error;
use tokio::io::AsyncBufReadExt;
use tokio_util::io::StreamReader;

const PROVIDER: &str = "OpenAI";

/// Client for OpenAI-compatible chat completion APIs (Groq, OpenAI,
/// llama.cpp server, ...).
pub struct OpenAI {
    endpoint: String,
    api_key: Option<String>,
    timeout: Option<time::Duration>,

    want_models: Vec<String>,
}

#[async_trait]
impl Backend for OpenAI {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn list_models(&self) -> Result<Vec<Model>, BackendError> {
        let mut req = reqwest::Client::new()
            .get(format!("{}/v1/models", self.endpoint))
            .header("User-Agent", user_agent());

        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }

        if let Some(token) = &self.api_key {
            req = req.bearer_auth(token);
        }

        let res = req.send().await?;

        if !res.status().is_success() {
            let http_code = res.status().as_u16();
            let body = res.text().await?;
            return Err(error_from_body(http_code, &body));
        }

        let res = res.json::<ModelListResponse>().await?;

        let all = self.want_models.is_empty();

        let mut models = res
            .data
            .into_iter()
            .filter(|m| all || self.want_models.contains(&m.id))
            .map(|m| Model::new(m.id).with_provider(PROVIDER))
            .collect::<Vec<_>>();

        models.sort_by(|a, b| a.id().cmp(b.id()));

        Ok(models)
    }

    async fn complete(
        &self,
        prompt: BackendPrompt,
        chunk_tx: Option<ChunkTx>,
    ) -> Result<BackendResponse, BackendError> {
        if prompt.model().trim().is_empty() {
            return Err(BackendError::NoModel);
        }

        let completion_req = CompletionRequest {
            model: prompt.model().to_string(),
            messages: prompt.messages().iter().map(MessageRequest::from).collect(),
            stream: true,
            max_completion_tokens: prompt.max_tokens(),
            temperature: prompt.temperature(),
        };

        let mut req = reqwest::Client::new()
            .post(format!("{}/v1/chat/completions", self.endpoint))
            .header("Content-Type", "application/json")
            .header("User-Agent", user_agent());

        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }

        if let Some(token) = &self.api_key {
            req = req.bearer_auth(token);
        }

        log::trace!("Sending completion request: {:?}", completion_req);

        let res = req.json(&completion_req).send().await?;

        if !res.status().is_success() {
            let http_code = res.status().as_u16();
            let body = res.text().await?;
            log::error!("Error response: {}", body);
            return Err(error_from_body(http_code, &body));
        }

        let stream = res.bytes_stream().map_err(|e| {
            let kind = if e.is_timeout() {
                std::io::ErrorKind::TimedOut
            } else {
                std::io::ErrorKind::Interrupted
            };
            std::io::Error::new(kind, e.to_string())
        });

        let mut line_readers = StreamReader::new(stream).lines();

        let mut message_id = String::new();
        let mut text = String::new();
        let mut usage: Option<BackendUsage> = None;

        loop {
            let line = match line_readers.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(err) if err.kind() == std::io::ErrorKind::TimedOut => {
                    return Err(BackendError::Timeout);
                }
                Err(err) => return Err(BackendError::Transport(err.to_string())),
            };

            let line = line.trim();
            log::trace!("streaming response: {}", line);
            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            let data = data.trim_start();
            if data == "[DONE]" {
                break;
            }

            let data = serde_json::from_str::<CompletionResponse>(data).map_err(|err| {
                BackendError::MalformedResponse(format!("parsing line {data:?}: {err}"))
            })?;

            if message_id.is_empty() {
                message_id = data.id;
            }

            if let Some(usage_data) = data.usage {
                usage = Some(BackendUsage {
                    prompt_tokens: usage_data.prompt_tokens,
                    completion_tokens: usage_data.completion_tokens,
                    total_tokens: usage_data.total_tokens,
                });
            }

            let Some(delta) = data
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.delta.content)
            else {
                continue;
            };

            text.push_str(&delta);
            if let Some(tx) = chunk_tx.as_ref() {
                // The receiver going away only stops the live preview.
                let _ = tx.send(delta);
            }
        }

        let text = clean_response(&text);
        if text.is_empty() {
            return Err(BackendError::EmptyResponse);
        }

        Ok(BackendResponse {
            id: message_id,
            model: prompt.model().to_string(),
            text,
            usage,
        })
    }
}

impl From<OpenAI> for ArcBackend {
    fn from(value: OpenAI) -> Self {
        Arc::new(value)
    }
}

impl OpenAI {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_want_models(mut self, models: Vec<String>) -> Self {
        self.want_models = models;
        self
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.trim_end_matches('/').to_string();
        self
    }

    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key = Some(api_key.to_string());
        self
    }

    pub fn with_timeout(mut self, timeout: time::Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

}

impl Default for OpenAI {
    fn default() -> Self {
        Self {
            endpoint: crate::config::constants::DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            timeout: None,
            want_models: vec![],
        }
    }
}

/// Maps an error status to a [`BackendError`], using the API's own message
/// when the body is the usual `{"error": {...}}` envelope.
fn error_from_body(http_code: u16, body: &str) -> BackendError {
    let message = match serde_json::from_str::<ErrorResponse>(body) {
        Ok(resp) => {
            let mut err = resp.error;
            err.http_code = http_code;
            err.to_string()
        }
        Err(_) if body.trim().is_empty() => format!("HTTP {http_code}"),
        Err(_) => body.trim().to_string(),
    };
    BackendError::from_status(http_code, message)
}

#[derive(Default, Debug, Serialize, Deserialize)]
struct ModelResponse {
    id: String,
}

#[derive(Default, Debug, Serialize, Deserialize)]
struct ModelListResponse {
    data: Vec<ModelResponse>,
}

#[derive(Default, Debug, Clone, Serialize, Deserialize)]
struct MessageRequest {
    role: String,
    content: String,
}

#[derive(Default, Debug, Serialize, Deserialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<MessageRequest>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Default, Debug, Serialize, Deserialize)]
struct CompletionDeltaResponse {
    content: Option<String>,
}

#[derive(Default, Debug, Serialize, Deserialize)]
struct CompletionChoiceResponse {
    delta: CompletionDeltaResponse,
}

#[derive(Default, Debug, Serialize, Deserialize)]
struct CompletionResponse {
    id: String,
    choices: Vec<CompletionChoiceResponse>,
    usage: Option<CompletionUsageResponse>,
}

#[derive(Default, Debug, Serialize, Deserialize)]
struct CompletionUsageResponse {
    prompt_tokens: usize,
    completion_tokens: usize,
    total_tokens: usize,
}

#[derive(Default, Debug, Serialize, Deserialize)]
struct ErrorResponse {
    error: OpenAIError,
}

#[derive(Default, Error, Debug, Serialize, Deserialize)]
pub struct OpenAIError {
    #[serde(skip)]
    pub http_code: u16,
    pub message: String,
    #[serde(rename = "type", default)]
    pub err_type: String,
    pub param: Option<String>,
    pub code: Option<String>,
}

impl Display for OpenAIError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OpenAI error ({}): {}", self.http_code, self.message)
    }
}

impl From<&Message> for MessageRequest {
    fn from(msg: &Message) -> Self {
        Self {
            role: msg.role().as_str().to_string(),
            content: msg.content().to_string(),
        }
    }
}
