use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde_json::json;

use super::OpenAiClient;
use crate::error::ApiError;

impl OpenAiClient {
    /// Synthesize speech for `text`, returning the encoded audio
    pub async fn text_to_speech(&self, text: &str) -> Result<Bytes, ApiError> {
        let body = json!({
            "model": self.config.tts_model,
            "input": text,
            "voice": self.config.tts_voice,
            "response_format": self.config.tts_format,
        });

        let response = self.post_json("audio/speech", &body, false).await?;
        let audio = response.bytes().await?;
        log::debug!("Received {} bytes of {} audio", audio.len(), self.config.tts_format);
        Ok(audio)
    }

    /// Transcribe an audio file in its spoken language
    pub async fn transcribe_audio(&self, audio: Vec<u8>, filename: &str) -> Result<String, ApiError> {
        self.audio_to_text("audio/transcriptions", audio, filename).await
    }

    /// Transcribe an audio file into English
    pub async fn translate_audio(&self, audio: Vec<u8>, filename: &str) -> Result<String, ApiError> {
        self.audio_to_text("audio/translations", audio, filename).await
    }

    async fn audio_to_text(&self, path: &str, audio: Vec<u8>, filename: &str) -> Result<String, ApiError> {
        log::debug!("Uploading {} ({} bytes) to {}", filename, audio.len(), path);

        let part = Part::bytes(audio).file_name(filename.to_string());
        let form = Form::new()
            .text("model", self.config.transcription_model.clone())
            .part("file", part);

        let response = self.post_multipart(path, form).await?;
        let json = Self::read_json(response).await?;

        json["text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ApiError::InvalidResponse("no text in response".to_string()))
    }
}
