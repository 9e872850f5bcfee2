pub mod openai;
pub(crate) mod utils;

pub use openai::OpenAI;

#[cfg(test)]
use mockall::automock;

use std::sync::Arc;

use async_trait::async_trait;
use eyre::{Context, Result};
use thiserror::Error;

use crate::{
    config::BackendConfig,
    models::{BackendPrompt, BackendResponse, ChunkTx, Model},
};

/// Failure kinds of the inference collaborator.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request timed out")]
    Timeout,

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("model returned an empty response")]
    EmptyResponse,

    #[error("no model is set")]
    NoModel,

    #[error("http error ({status}): {message}")]
    Http { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),
}

impl BackendError {
    pub(crate) fn from_status(status: u16, message: String) -> Self {
        match status {
            401 | 403 => BackendError::Auth(message),
            429 => BackendError::RateLimited(message),
            400 | 404 | 422 => BackendError::MalformedRequest(message),
            408 | 504 => BackendError::Timeout,
            _ => BackendError::Http { status, message },
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BackendError::Timeout
        } else if err.is_decode() {
            BackendError::MalformedResponse(err.to_string())
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}

#[async_trait]
#[cfg_attr(test, automock)]
pub trait Backend {
    fn name(&self) -> &str;
    async fn list_models(&self) -> Result<Vec<Model>, BackendError>;
    /// Runs one completion over the prompt history. Streamed deltas are
    /// forwarded to `chunk_tx` when given; the returned text is the cleaned
    /// full reply.
    async fn complete(
        &self,
        prompt: BackendPrompt,
        chunk_tx: Option<ChunkTx>,
    ) -> Result<BackendResponse, BackendError>;
}

pub type ArcBackend = Arc<dyn Backend + Send + Sync>;

pub fn new_backend(config: &BackendConfig) -> Result<ArcBackend> {
    let api_key = config.api_key().wrap_err("resolving api key")?;
    let backend = OpenAI::new()
        .with_endpoint(&config.endpoint)
        .with_api_key(&api_key)
        .with_timeout(config.timeout())
        .with_want_models(config.models.clone());
    log::debug!("using backend {} at {}", backend.name(), backend.endpoint());
    Ok(Arc::new(backend))
}
