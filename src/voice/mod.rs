//! Optional speech input and output, delegated to external programs.

pub mod command;

pub use command::{CommandRecognizer, CommandSpeaker};

#[cfg(test)]
use mockall::automock;

use std::{io, path::Path, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;

use crate::config::VoiceConfig;

#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("voice {0} is not configured")]
    Unavailable(&'static str),

    #[error("no speech recognized")]
    NoSpeech,

    #[error("{program} exited with {status}: {stderr}")]
    Command {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("running voice command: {0}")]
    Io(#[from] io::Error),
}

#[async_trait]
#[cfg_attr(test, automock)]
pub trait Speaker {
    /// Reads `text` aloud, returning once playback finished.
    async fn speak(&self, text: &str) -> Result<(), VoiceError>;
}

#[async_trait]
#[cfg_attr(test, automock)]
pub trait Recognizer {
    async fn recognize(&self, audio: &Path) -> Result<String, VoiceError>;
}

pub type ArcSpeaker = Arc<dyn Speaker + Send + Sync>;
pub type ArcRecognizer = Arc<dyn Recognizer + Send + Sync>;

/// `None` when voice is disabled or no speech command is set.
pub fn new_speaker(config: &VoiceConfig) -> Option<ArcSpeaker> {
    if !config.enabled || config.speak_command.is_empty() {
        return None;
    }
    let speaker = CommandSpeaker::new(config.speak_command.clone())
        .with_rate(config.speech_rate)
        .with_volume(config.speech_volume);
    Some(Arc::new(speaker))
}

pub fn new_recognizer(config: &VoiceConfig) -> Option<ArcRecognizer> {
    if !config.enabled || config.recognize_command.is_empty() {
        return None;
    }
    Some(Arc::new(CommandRecognizer::new(
        config.recognize_command.clone(),
    )))
}
