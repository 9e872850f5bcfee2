#[cfg(test)]
#[path = "command_test.rs"]
mod tests;

use std::{path::Path, process::Stdio};

use async_trait::async_trait;
use tokio::{io::AsyncWriteExt, process::Command};

use crate::config::constants::{SPEECH_RATE, SPEECH_VOLUME};

use super::{Recognizer, Speaker, VoiceError};

/// Text-to-speech through a program that reads the text on stdin, `espeak`
/// by default. `{rate}` and `{amplitude}` in the arguments are substituted
/// before the program is started.
#[derive(Debug, Clone)]
pub struct CommandSpeaker {
    command: Vec<String>,
    rate: u32,
    volume: f32,
}

impl CommandSpeaker {
    pub fn new(command: Vec<String>) -> Self {
        Self {
            command,
            rate: SPEECH_RATE,
            volume: SPEECH_VOLUME,
        }
    }

    pub fn with_rate(mut self, rate: u32) -> Self {
        self.rate = rate;
        self
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume.clamp(0.0, 1.0);
        self
    }

    /// espeak amplitude, 0 to 200.
    pub fn amplitude(&self) -> u32 {
        (self.volume * 200.0).round() as u32
    }

    pub(crate) fn args(&self) -> Vec<String> {
        let rate = self.rate.to_string();
        let amplitude = self.amplitude().to_string();
        self.command
            .iter()
            .skip(1)
            .map(|arg| arg.replace("{rate}", &rate).replace("{amplitude}", &amplitude))
            .collect()
    }
}

#[async_trait]
impl Speaker for CommandSpeaker {
    async fn speak(&self, text: &str) -> Result<(), VoiceError> {
        let program = self
            .command
            .first()
            .ok_or(VoiceError::Unavailable("speech output"))?;

        let mut child = Command::new(program)
            .args(self.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(VoiceError::Command {
                program: program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        log::debug!("spoke {} chars with {}", text.chars().count(), program);
        Ok(())
    }
}

/// Speech-to-text through a program that prints the transcript of the
/// audio file passed as `{audio}`.
#[derive(Debug, Clone)]
pub struct CommandRecognizer {
    command: Vec<String>,
}

impl CommandRecognizer {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

#[async_trait]
impl Recognizer for CommandRecognizer {
    async fn recognize(&self, audio: &Path) -> Result<String, VoiceError> {
        let program = self
            .command
            .first()
            .ok_or(VoiceError::Unavailable("speech input"))?;

        let audio = audio.to_string_lossy();
        let output = Command::new(program)
            .args(
                self.command
                    .iter()
                    .skip(1)
                    .map(|arg| arg.replace("{audio}", &audio)),
            )
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(VoiceError::Command {
                program: program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if text.is_empty() {
            return Err(VoiceError::NoSpeech);
        }
        Ok(text)
    }
}
