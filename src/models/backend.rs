use std::fmt::Display;

use tokio::sync::mpsc;

use crate::models::Message;

/// Receives streamed completion deltas as they arrive.
pub type ChunkTx = mpsc::UnboundedSender<String>;

#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    id: String,
    provider: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackendResponse {
    pub id: String,
    pub model: String,
    pub text: String,
    pub usage: Option<BackendUsage>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct BackendUsage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

/// A request to the inference collaborator: model, ordered history and
/// sampling options.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendPrompt {
    model: String,
    messages: Vec<Message>,
    max_tokens: Option<usize>,
    temperature: Option<f32>,
}

impl BackendPrompt {
    pub fn new(model: impl Into<String>) -> BackendPrompt {
        BackendPrompt {
            model: model.into(),
            messages: vec![],
            max_tokens: None,
            temperature: None,
        }
    }

    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn max_tokens(&self) -> Option<usize> {
        self.max_tokens
    }

    pub fn temperature(&self) -> Option<f32> {
        self.temperature
    }
}

impl Model {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            provider: String::new(),
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }
}

impl Display for BackendUsage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Prompt Tokens: {}, Completion Token: {}, Total: {}",
            self.prompt_tokens, self.completion_tokens, self.total_tokens
        )
    }
}

impl Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({})",
            self.id,
            if self.provider.is_empty() {
                "unknown"
            } else {
                &self.provider
            }
        )
    }
}
