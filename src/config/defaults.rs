use super::constants::*;

pub(crate) fn hello_message() -> Option<String> {
    Some(HELLO_MESSAGE.to_string())
}

pub(crate) fn log_level() -> Option<String> {
    Some("info".to_string())
}

pub(crate) fn log_file_path() -> String {
    LOG_FILE_PATH.to_string()
}

pub(crate) fn endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

pub(crate) fn api_key_env() -> String {
    API_KEY_ENV.to_string()
}

pub(crate) fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

pub(crate) fn max_tokens() -> usize {
    MAX_OUTPUT_TOKENS
}

pub(crate) fn temperature() -> f32 {
    TEMPERATURE
}

pub(crate) fn timeout_secs() -> u64 {
    INFERENCE_TIMEOUT_SECS
}

pub(crate) fn context_window() -> usize {
    CONTEXT_WINDOW
}

pub(crate) fn storage_path() -> String {
    STORAGE_PATH.to_string()
}

pub(crate) fn storage_timeout_secs() -> u64 {
    STORAGE_TIMEOUT_SECS
}

pub(crate) fn speech_rate() -> u32 {
    SPEECH_RATE
}

pub(crate) fn speech_volume() -> f32 {
    SPEECH_VOLUME
}

pub(crate) fn speak_command() -> Vec<String> {
    SPEAK_COMMAND.iter().map(|s| s.to_string()).collect()
}
