pub const HELLO_MESSAGE: &str = "Hello! I'm your AI assistant. How can I help you today?";

pub const LOG_FILE_PATH: &str = "/tmp/chatpress.log";

/// Groq exposes an OpenAI-compatible API under this prefix
pub const DEFAULT_ENDPOINT: &str = "https://api.groq.com/openai";

pub const DEFAULT_MODEL: &str = "deepseek-r1-distill-llama-70b";

pub const API_KEY_ENV: &str = "GROQ_API_KEY";

pub const MAX_OUTPUT_TOKENS: usize = 4096;

pub const TEMPERATURE: f32 = 0.7;

pub const INFERENCE_TIMEOUT_SECS: u64 = 60;

/// Number of latest messages sent to the model, 0 sends the full history
pub const CONTEXT_WINDOW: usize = 10;

pub const STORAGE_PATH: &str = "$HOME/.local/share/chatpress/conversations";

pub const STORAGE_TIMEOUT_SECS: u64 = 5;

pub const SPEECH_RATE: u32 = 180;

pub const SPEECH_VOLUME: f32 = 0.8;

pub const SPEAK_COMMAND: &[&str] = &["espeak", "-s", "{rate}", "-a", "{amplitude}"];
