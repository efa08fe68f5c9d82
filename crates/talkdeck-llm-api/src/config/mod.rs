use std::env;
use std::time::Duration;

/// Default OpenAI API base URL
pub const OPENAI_API_URL: &str = "https://api.openai.com/v1";

/// Default chat model
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o";

/// Default completion budget per reply
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Default sampling temperature
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Timeout applied to single-shot requests (streaming is not timed out)
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub const DEFAULT_TTS_MODEL: &str = "tts-1";
pub const DEFAULT_TTS_VOICE: &str = "alloy";
pub const DEFAULT_TTS_FORMAT: &str = "mp3";
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";
pub const DEFAULT_IMAGE_MODEL: &str = "dall-e-3";
pub const DEFAULT_IMAGE_SIZE: &str = "1024x1024";

/// Settings of an [`crate::OpenAiClient`]
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL the endpoint paths are appended to, e.g. `https://api.openai.com/v1`
    pub base_url: String,
    pub api_key: String,
    pub chat_model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub request_timeout: Duration,
    pub tts_model: String,
    pub tts_voice: String,
    pub tts_format: String,
    pub transcription_model: String,
    pub image_model: String,
    pub image_size: String,
    /// Print request/response/stream debugging to the console
    pub verbose: bool,
    /// Also dump each request to the logs directory
    pub log_requests_to_file: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: OPENAI_API_URL.to_string(),
            api_key: String::new(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            tts_model: DEFAULT_TTS_MODEL.to_string(),
            tts_voice: DEFAULT_TTS_VOICE.to_string(),
            tts_format: DEFAULT_TTS_FORMAT.to_string(),
            transcription_model: DEFAULT_TRANSCRIPTION_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            image_size: DEFAULT_IMAGE_SIZE.to_string(),
            verbose: false,
            log_requests_to_file: false,
        }
    }
}

impl ApiConfig {
    pub fn new(base_url: impl AsRef<str>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: normalize_api_url(base_url.as_ref()),
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Build from `OPENAI_API_URL` / `OPENAI_API_KEY`, falling back to the defaults
    pub fn from_env() -> Self {
        let base_url = env::var("OPENAI_API_URL").unwrap_or_else(|_| OPENAI_API_URL.to_string());
        let api_key = env::var("OPENAI_API_KEY").unwrap_or_default();
        Self::new(base_url, api_key)
    }

    /// Full URL of an endpoint path such as `chat/completions`
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }
}

/// Normalize an API base URL.
///
/// Trailing slashes go, and a full `/chat/completions` URL is cut back to
/// its base so the other endpoints can be derived from it.
pub fn normalize_api_url(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    let url = url.strip_suffix("/chat/completions").unwrap_or(url);
    url.to_string()
}
