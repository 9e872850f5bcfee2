//! The chat turn protocol: the only place that talks to both the model and
//! the conversation store.

pub mod controller;

pub use controller::SessionController;

use std::{io, time::Duration};

use thiserror::Error;

use crate::{
    backend::BackendError,
    config::Configuration,
    export::{ExportError, ExportFormat},
    models::Message,
    storage::StorageError,
    voice::VoiceError,
};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("message is empty")]
    EmptyInput,

    #[error("a reply is still pending")]
    TurnInProgress,

    #[error("inference timed out")]
    InferenceTimeout,

    #[error("inference failed: {0}")]
    Inference(BackendError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Voice(#[from] VoiceError),
}

impl From<BackendError> for SessionError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Timeout => SessionError::InferenceTimeout,
            err => SessionError::Inference(err),
        }
    }
}

impl SessionError {
    /// Text shown to the user. Every kind reads differently, and transient
    /// failures suggest trying again.
    pub fn user_message(&self) -> String {
        match self {
            SessionError::EmptyInput => "Please type a message first.".to_string(),
            SessionError::TurnInProgress => {
                "Still waiting for the previous reply, please hold on.".to_string()
            }
            SessionError::InferenceTimeout => {
                "The model took too long to answer. Please try again.".to_string()
            }
            SessionError::Inference(err) => match err {
                BackendError::RateLimited(_) => {
                    "Rate limit reached. Wait a moment and try again.".to_string()
                }
                BackendError::Auth(_) => {
                    "The API key was rejected. Check backend.api_key in your configuration."
                        .to_string()
                }
                BackendError::MalformedRequest(msg) => {
                    format!("The model rejected the request: {msg}")
                }
                BackendError::EmptyResponse => {
                    "The model returned an empty reply. Please try again.".to_string()
                }
                BackendError::NoModel => "No model selected. Use /model NAME.".to_string(),
                BackendError::MalformedResponse(msg) => {
                    format!("The model sent a reply that could not be read: {msg}")
                }
                BackendError::Timeout | BackendError::Transport(_) => {
                    format!("Could not reach the model ({err}). Please try again.")
                }
                BackendError::Http { status, message } => {
                    format!("The model service failed with HTTP {status}: {message}")
                }
            },
            SessionError::Storage(err) => match err {
                StorageError::NotFound(id) => format!("Conversation '{id}' was not found."),
                StorageError::InvalidId(id) => format!(
                    "'{id}' is not a valid conversation id (use letters, digits, '-', '_' or '.')."
                ),
                StorageError::Corrupt { id, .. } => {
                    format!("Conversation '{id}' is damaged and could not be read.")
                }
                StorageError::Io(source) if source.kind() == io::ErrorKind::TimedOut => {
                    "The conversation store took too long to respond. Please try again."
                        .to_string()
                }
                StorageError::Io(source) => {
                    format!("Could not access conversation storage: {source}")
                }
            },
            SessionError::Export(err) => match err {
                ExportError::UnsupportedFormat(format) => format!(
                    "Unsupported export format '{format}'. Use one of: {}.",
                    ExportFormat::ALL.map(|f| f.extension()).join(", ")
                ),
                err => format!("Export failed: {err}"),
            },
            SessionError::Voice(err) => match err {
                VoiceError::NoSpeech => "No speech was recognized in the recording.".to_string(),
                VoiceError::Unavailable(what) => {
                    format!("Voice {what} is not available. Enable it in the [voice] section.")
                }
                err => format!("Voice command failed: {err}"),
            },
        }
    }

    /// Whether repeating the same action may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SessionError::InferenceTimeout => true,
            SessionError::Inference(err) => matches!(
                err,
                BackendError::RateLimited(_) | BackendError::Transport(_) | BackendError::Timeout
            ),
            SessionError::Storage(StorageError::Io(source)) => {
                source.kind() == io::ErrorKind::TimedOut
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    AwaitingResponse,
}

/// The result of one completed turn.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub user: Message,
    pub reply: Message,
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Used for conversations that carry no model of their own.
    pub model: String,
    pub max_tokens: usize,
    pub temperature: f32,
    /// Latest messages sent with each request, 0 for the whole history.
    pub context_window: usize,
    pub inference_timeout: Duration,
    pub storage_timeout: Duration,
    pub auto_speak: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from(&Configuration::default())
    }
}

impl From<&Configuration> for SessionOptions {
    fn from(config: &Configuration) -> Self {
        Self {
            model: config.backend.default_model.clone(),
            max_tokens: config.backend.max_tokens,
            temperature: config.backend.temperature,
            context_window: config.backend.context_window,
            inference_timeout: config.backend.timeout(),
            storage_timeout: config.storage.timeout(),
            auto_speak: config.voice.enabled && config.voice.auto_speak,
        }
    }
}
