use std::time::Duration;

use eyre::{Result, bail};
use serde::{Deserialize, Serialize};

use super::constants::*;
use super::defaults::*;

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct Configuration {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub log: LogConfig,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub voice: VoiceConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct GeneralConfig {
    #[serde(default = "hello_message")]
    pub hello_message: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct LogConfig {
    #[serde(default = "log_level")]
    pub level: Option<String>,

    #[serde(default)]
    pub filters: Option<Vec<LogFilter>>,

    #[serde(default)]
    pub file: LogFile,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct LogFilter {
    #[serde(default)]
    pub module: Option<String>,

    #[serde(default)]
    pub level: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct LogFile {
    #[serde(default = "log_file_path")]
    pub path: String,

    #[serde(default)]
    pub append: bool,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct BackendConfig {
    #[serde(default = "endpoint")]
    pub endpoint: String,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Environment variable consulted when `api_key` is not set
    #[serde(default = "api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_model")]
    pub default_model: String,

    #[serde(default)]
    pub models: Vec<String>,

    #[serde(default = "max_tokens")]
    pub max_tokens: usize,

    #[serde(default = "temperature")]
    pub temperature: f32,

    #[serde(default = "timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "context_window")]
    pub context_window: usize,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct StorageConfig {
    #[serde(default = "storage_path")]
    pub path: String,

    #[serde(default = "storage_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct VoiceConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub auto_speak: bool,

    #[serde(default = "speech_rate")]
    pub speech_rate: u32,

    #[serde(default = "speech_volume")]
    pub speech_volume: f32,

    #[serde(default = "speak_command")]
    pub speak_command: Vec<String>,

    #[serde(default)]
    pub recognize_command: Vec<String>,
}

impl Configuration {
    /// Checks every option that can be checked without touching the
    /// network. Called right after loading so that a bad value stops the
    /// process before the first turn.
    pub fn validate(&self) -> Result<()> {
        let backend = &self.backend;
        if !(0.0..=2.0).contains(&backend.temperature) {
            bail!(
                "backend.temperature must be between 0.0 and 2.0, got {}",
                backend.temperature
            );
        }
        if backend.max_tokens == 0 {
            bail!("backend.max_tokens must be greater than 0");
        }
        if backend.default_model.trim().is_empty() {
            bail!("backend.default_model must not be empty");
        }
        if backend.endpoint.trim().is_empty() {
            bail!("backend.endpoint must not be empty");
        }
        if backend.timeout_secs == 0 {
            bail!("backend.timeout_secs must be greater than 0");
        }
        if self.storage.timeout_secs == 0 {
            bail!("storage.timeout_secs must be greater than 0");
        }

        let voice = &self.voice;
        if !(0.0..=1.0).contains(&voice.speech_volume) {
            bail!(
                "voice.speech_volume must be between 0.0 and 1.0, got {}",
                voice.speech_volume
            );
        }
        if voice.enabled && voice.speech_rate == 0 {
            bail!("voice.speech_rate must be greater than 0");
        }
        Ok(())
    }
}

impl BackendConfig {
    /// Returns the configured credential, falling back to the environment
    /// variable named by `api_key_env`.
    pub fn api_key(&self) -> Result<String> {
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            return Ok(key.to_string());
        }
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => bail!(
                "no API key configured: set backend.api_key or ${}",
                self.api_key_env
            ),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl StorageConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            hello_message: Some(HELLO_MESSAGE.to_string()),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Some("info".to_string()),
            file: LogFile::default(),
            filters: None,
        }
    }
}

impl Default for LogFile {
    fn default() -> Self {
        Self {
            path: LOG_FILE_PATH.to_string(),
            append: false,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            api_key_env: API_KEY_ENV.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            models: vec![],
            max_tokens: MAX_OUTPUT_TOKENS,
            temperature: TEMPERATURE,
            timeout_secs: INFERENCE_TIMEOUT_SECS,
            context_window: CONTEXT_WINDOW,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: STORAGE_PATH.to_string(),
            timeout_secs: STORAGE_TIMEOUT_SECS,
        }
    }
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            auto_speak: false,
            speech_rate: SPEECH_RATE,
            speech_volume: SPEECH_VOLUME,
            speak_command: speak_command(),
            recognize_command: vec![],
        }
    }
}
