pub mod audio;
pub mod images;
pub mod streaming;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use talkdeck_logging::{log_request, log_request_to_file, log_response};
use talkdeck_types::Message;

use crate::config::ApiConfig;
use crate::error::ApiError;

pub use streaming::{decode_chat_stream, drive_chat_stream, ChatStream, SseDecoder, SseFrame, StreamEvent};

/// Chat message in the wire format of `chat/completions`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl From<&Message> for ChatMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.sender.role().to_string(),
            content: message.text.clone(),
        }
    }
}

/// Client of an OpenAI-compatible REST API
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    config: ApiConfig,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(config: ApiConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn chat_request(&self, messages: &[Message], stream: bool) -> Value {
        let messages: Vec<ChatMessage> = messages.iter().map(ChatMessage::from).collect();
        let mut body = json!({
            "model": self.config.chat_model,
            "messages": messages,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "n": 1,
        });
        if stream {
            body["stream"] = Value::Bool(true);
        }
        body
    }

    /// POST a JSON body with bearer auth.
    ///
    /// Streaming requests are not timed out, the caller ends them by
    /// dropping the stream.
    pub(crate) async fn post_json(&self, path: &str, body: &Value, stream: bool) -> Result<reqwest::Response, ApiError> {
        let url = self.config.endpoint(path);
        log_request(&url, body, &self.config.api_key, self.config.verbose);
        self.dump_request(&url, body);

        let mut request = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(body);

        if stream {
            request = request.header(reqwest::header::ACCEPT, "text/event-stream");
        } else {
            request = request.timeout(self.config.request_timeout);
        }

        log::debug!("POST {}", url);
        let response = request.send().await.map_err(|e| {
            let err = ApiError::from(e);
            log::error!("Request to {} failed: {}", url, err);
            err
        })?;

        self.check_status(response).await
    }

    /// Posts a multipart form, timed out like every single-shot call
    pub(crate) async fn post_multipart(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> Result<reqwest::Response, ApiError> {
        let url = self.config.endpoint(path);
        log::debug!("POST {} (multipart)", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .timeout(self.config.request_timeout)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                let err = ApiError::from(e);
                log::error!("Request to {} failed: {}", url, err);
                err
            })?;

        self.check_status(response).await
    }

    fn dump_request(&self, url: &str, body: &Value) {
        if !self.config.log_requests_to_file {
            return;
        }
        let model = body["model"].as_str().unwrap_or("unknown");
        if let Err(e) = log_request_to_file(url, body, model, &self.config.api_key) {
            log::warn!("Failed to log request to file: {:#}", e);
        }
    }

    async fn check_status(&self, response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let headers = response.headers().clone();
        let body = response.text().await.unwrap_or_default();
        log_response(&status, &headers, &body, self.config.verbose);

        let err = ApiError::from_status(status.as_u16(), &body);
        log::error!("API returned {}: {}", status, err);
        Err(err)
    }

    /// Read a JSON response body
    pub(crate) async fn read_json(response: reqwest::Response) -> Result<Value, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| ApiError::InvalidResponse(format!("invalid JSON: {}", e)))
    }

    /// Send a conversation and wait for the whole reply
    pub async fn send_chat_message(&self, messages: &[Message]) -> Result<String, ApiError> {
        let body = self.chat_request(messages, false);
        let response = self.post_json("chat/completions", &body, false).await?;
        let json = Self::read_json(response).await?;

        json["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ApiError::InvalidResponse("no content in response".to_string()))
    }

    /// Send a conversation and stream the reply as it is generated
    pub async fn send_chat_message_stream(&self, messages: &[Message]) -> Result<ChatStream, ApiError> {
        let body = self.chat_request(messages, true);
        let response = self.post_json("chat/completions", &body, true).await?;
        Ok(decode_chat_stream(response.bytes_stream(), self.config.verbose))
    }

    /// Callback form of [`Self::send_chat_message_stream`].
    ///
    /// `on_chunk(delta, content)` runs per fragment, then exactly one of
    /// `on_complete(content)` or `on_error(error)`.
    pub async fn send_chat_message_stream_with<C, F, R>(
        &self,
        messages: &[Message],
        on_chunk: C,
        on_complete: F,
        on_error: R,
    ) where
        C: FnMut(&str, &str),
        F: FnOnce(&str),
        R: FnOnce(&ApiError),
    {
        match self.send_chat_message_stream(messages).await {
            Ok(stream) => drive_chat_stream(stream, on_chunk, on_complete, on_error).await,
            Err(e) => on_error(&e),
        }
    }
}
