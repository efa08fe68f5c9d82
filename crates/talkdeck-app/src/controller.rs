use anyhow::{anyhow, Result};
use bytes::Bytes;
use futures::future;
use futures::StreamExt;
use std::future::Future;

use talkdeck_history::{KeyValueStore, SessionStore};
use talkdeck_llm_api::{ApiError, OpenAiClient, StreamEvent};
use talkdeck_types::{Message, PageType};

use crate::signal::SidebarSignal;

/// Conversation flows of the talkdeck pages.
///
/// Every flow records the user's input, calls the API, records the reply
/// (or the user-facing error text) and notifies the sidebar signal.
pub struct ChatController<S: KeyValueStore> {
    store: SessionStore<S>,
    client: OpenAiClient,
    signal: SidebarSignal,
    streaming: bool,
}

impl<S: KeyValueStore> ChatController<S> {
    pub fn new(store: SessionStore<S>, client: OpenAiClient, signal: SidebarSignal) -> Self {
        Self {
            store,
            client,
            signal,
            streaming: true,
        }
    }

    /// Stream chat replies (default) or wait for the whole reply
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn store(&self) -> &SessionStore<S> {
        &self.store
    }

    pub fn client(&self) -> &OpenAiClient {
        &self.client
    }

    pub fn signal(&self) -> &SidebarSignal {
        &self.signal
    }

    /// Reuse `session_id` when it exists on `page_type`, else create a session
    pub fn start_session(&self, page_type: PageType, session_id: Option<&str>) -> Result<String> {
        if let Some(id) = session_id {
            if self.store.has_existing_session(page_type, id) {
                log::debug!("Resuming {} session {}", page_type, id);
                return Ok(id.to_string());
            }
            log::info!("Session {} not found on {}, starting a new one", id, page_type);
        }

        self.store
            .create_new_session(page_type, None)
            .ok_or_else(|| anyhow!("Failed to create a new {} session", page_type.label()))
    }

    fn record(&self, page_type: PageType, session_id: &str, message: &Message) {
        self.store.save_session_message(page_type, session_id, message);
        self.signal.notify_message_update(page_type, session_id);
    }

    fn record_failure(&self, page_type: PageType, session_id: &str, err: &ApiError) {
        log::error!("{} request for session {} failed: {}", page_type, session_id, err);
        let message = Message::ai(err.user_message()).with_metadata("isError", true);
        self.record(page_type, session_id, &message);
    }

    /// Send `text` in a text chat session, returning the reply.
    ///
    /// `on_delta` receives reply fragments as they arrive (the whole reply at
    /// once when streaming is off).
    pub async fn send_text<D>(&self, session_id: &str, text: &str, on_delta: D) -> Result<String, ApiError>
    where
        D: FnMut(&str),
    {
        self.send_text_until(session_id, text, future::pending::<()>(), on_delta)
            .await
    }

    /// Like [`send_text`](Self::send_text), but abandons the request once
    /// `cancel` completes. A cancelled request is recorded as an error reply.
    pub async fn send_text_until<C, D>(
        &self,
        session_id: &str,
        text: &str,
        cancel: C,
        mut on_delta: D,
    ) -> Result<String, ApiError>
    where
        C: Future<Output = ()>,
        D: FnMut(&str),
    {
        let page_type = PageType::TextChat;
        self.record(page_type, session_id, &Message::user(text));

        let history = self.store.load_session_messages(page_type, session_id);
        let outcome = tokio::select! {
            reply = self.request_reply(&history, &mut on_delta) => reply,
            _ = cancel => Err(ApiError::Cancelled),
        };

        match outcome {
            Ok(reply) => {
                self.record(page_type, session_id, &Message::ai(reply.as_str()));
                Ok(reply)
            }
            Err(e) => {
                self.record_failure(page_type, session_id, &e);
                Err(e)
            }
        }
    }

    async fn request_reply<D>(&self, history: &[Message], on_delta: &mut D) -> Result<String, ApiError>
    where
        D: FnMut(&str),
    {
        if !self.streaming {
            let reply = self.client.send_chat_message(history).await?;
            on_delta(&reply);
            return Ok(reply);
        }

        let mut stream = self.client.send_chat_message_stream(history).await?;
        while let Some(event) = stream.next().await {
            match event? {
                StreamEvent::Chunk { delta, .. } => on_delta(&delta),
                StreamEvent::Complete { content } => return Ok(content),
            }
        }
        Err(ApiError::InvalidResponse("chat stream ended without completing".to_string()))
    }

    /// Generate an image in an image session, returning its URL
    pub async fn generate_image(&self, session_id: &str, prompt: &str) -> Result<String, ApiError> {
        let page_type = PageType::ImageGen;
        self.record(page_type, session_id, &Message::user(prompt));

        match self.client.generate_image(prompt).await {
            Ok(url) => {
                let message = Message::ai(url.as_str()).with_metadata("imageUrl", url.as_str());
                self.record(page_type, session_id, &message);
                Ok(url)
            }
            Err(e) => {
                self.record_failure(page_type, session_id, &e);
                Err(e)
            }
        }
    }

    /// Synthesize `text` in a text-to-audio session, returning the audio
    pub async fn speak(&self, session_id: &str, text: &str) -> Result<Bytes, ApiError> {
        let page_type = PageType::TextToAudio;
        self.record(page_type, session_id, &Message::user(text));

        match self.client.text_to_speech(text).await {
            Ok(audio) => {
                let format = self.client.config().tts_format.clone();
                let message = Message::ai(format!("{} bytes of {} audio", audio.len(), format))
                    .with_metadata("audioFormat", format)
                    .with_metadata("audioBytes", audio.len());
                self.record(page_type, session_id, &message);
                Ok(audio)
            }
            Err(e) => {
                self.record_failure(page_type, session_id, &e);
                Err(e)
            }
        }
    }

    /// Transcribe an audio file in an audio-to-text session
    pub async fn transcribe(&self, session_id: &str, audio: Vec<u8>, filename: &str) -> Result<String, ApiError> {
        self.audio_to_text(session_id, audio, filename, false).await
    }

    /// Transcribe an audio file into English in an audio-to-text session
    pub async fn translate(&self, session_id: &str, audio: Vec<u8>, filename: &str) -> Result<String, ApiError> {
        self.audio_to_text(session_id, audio, filename, true).await
    }

    async fn audio_to_text(
        &self,
        session_id: &str,
        audio: Vec<u8>,
        filename: &str,
        translate: bool,
    ) -> Result<String, ApiError> {
        let page_type = PageType::AudioToText;
        let mode = if translate { "translate" } else { "transcribe" };
        let upload = Message::user(filename)
            .with_metadata("fileName", filename)
            .with_metadata("mode", mode);
        self.record(page_type, session_id, &upload);

        let result = if translate {
            self.client.translate_audio(audio, filename).await
        } else {
            self.client.transcribe_audio(audio, filename).await
        };

        match result {
            Ok(text) => {
                self.record(page_type, session_id, &Message::ai(text.as_str()));
                Ok(text)
            }
            Err(e) => {
                self.record_failure(page_type, session_id, &e);
                Err(e)
            }
        }
    }
}
