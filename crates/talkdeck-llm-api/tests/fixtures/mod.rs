#![allow(dead_code)]

use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::*;
use wiremock::{Mock, MockServer, ResponseTemplate};

use talkdeck_llm_api::{ApiConfig, OpenAiClient};

pub const TEST_API_KEY: &str = "test-api-key";

/// Mock OpenAI-compatible server for testing the client
pub struct OpenAiMockServer {
    server: MockServer,
}

impl OpenAiMockServer {
    pub async fn new() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    pub fn config(&self) -> ApiConfig {
        ApiConfig::new(format!("{}/v1", self.uri()), TEST_API_KEY)
    }

    pub fn client(&self) -> OpenAiClient {
        OpenAiClient::new(self.config())
    }

    pub async fn received_bodies(&self) -> Vec<Value> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter_map(|r| serde_json::from_slice(&r.body).ok())
            .collect()
    }

    /// Mock a successful non-streaming chat completion
    pub async fn mock_chat_success(&self, request_content: &str, response_content: &str) {
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test-api-key"))
            .and(body_partial_json(json!({
                "model": "gpt-4o",
                "messages": [{"role": "user", "content": request_content}],
                "max_tokens": 1000,
                "n": 1
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "chatcmpl-test123",
                "object": "chat.completion",
                "created": 1700000000,
                "model": "gpt-4o",
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": response_content},
                    "finish_reason": "stop"
                }],
                "usage": {"prompt_tokens": 10, "completion_tokens": 20, "total_tokens": 30}
            })))
            .mount(&self.server)
            .await;
    }

    /// Mock a streamed chat completion built from `deltas`
    pub async fn mock_chat_streaming(&self, deltas: &[&str]) {
        self.mock_chat_stream_body(sse_body(deltas, true)).await;
    }

    /// Mock a streamed chat completion with a raw body
    pub async fn mock_chat_stream_body(&self, body: String) {
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({"stream": true})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&self.server)
            .await;
    }

    /// Mock an error status with an OpenAI-style error body
    pub async fn mock_error(&self, endpoint: &str, status: u16, message: &str) {
        Mock::given(method("POST"))
            .and(path(format!("/v1/{}", endpoint)))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({
                "error": {
                    "message": message,
                    "type": "invalid_request_error",
                    "code": null
                }
            })))
            .mount(&self.server)
            .await;
    }

    /// Mock a chat completion that answers after `delay`
    pub async fn mock_slow_chat(&self, delay: Duration) {
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"choices": [{"message": {"content": "late"}}]}))
                    .set_delay(delay),
            )
            .mount(&self.server)
            .await;
    }

    pub async fn mock_speech(&self, audio: &[u8]) {
        Mock::given(method("POST"))
            .and(path("/v1/audio/speech"))
            .and(header("authorization", "Bearer test-api-key"))
            .and(body_partial_json(json!({"model": "tts-1", "voice": "alloy", "response_format": "mp3"})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(audio.to_vec(), "audio/mpeg"))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_audio_to_text(&self, endpoint: &str, text: &str) {
        Mock::given(method("POST"))
            .and(path(format!("/v1/{}", endpoint)))
            .and(header("authorization", "Bearer test-api-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": text})))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_image(&self, prompt: &str, url: &str) {
        Mock::given(method("POST"))
            .and(path("/v1/images/generations"))
            .and(body_partial_json(json!({"prompt": prompt, "n": 1, "size": "1024x1024"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "created": 1700000000,
                "data": [{"url": url, "revised_prompt": prompt}]
            })))
            .mount(&self.server)
            .await;
    }

    /// Raw bodies of every multipart upload received so far
    pub async fn received_raw_bodies(&self) -> Vec<Vec<u8>> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .map(|r| r.body)
            .collect()
    }
}

/// One `data:` frame carrying `delta`
pub fn sse_frame(delta: &str) -> String {
    format!(
        "data: {}\n\n",
        json!({
            "id": "chatcmpl-test",
            "object": "chat.completion.chunk",
            "choices": [{"index": 0, "delta": {"content": delta}, "finish_reason": null}]
        })
    )
}

pub fn sse_body(deltas: &[&str], with_sentinel: bool) -> String {
    let mut body: String = deltas.iter().map(|d| sse_frame(d)).collect();
    if with_sentinel {
        body.push_str("data: [DONE]\n\n");
    }
    body
}
