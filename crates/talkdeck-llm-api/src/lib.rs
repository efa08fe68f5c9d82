//! # talkdeck-llm-api
//!
//! Client for OpenAI-compatible REST APIs, covering what talkdeck's pages use:
//! - Chat completions, whole or streamed
//! - Text to speech
//! - Transcription and translation of audio
//! - Image generation
//!
//! ## Example
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use talkdeck_llm_api::{ApiConfig, OpenAiClient, StreamEvent};
//! use talkdeck_types::Message;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = OpenAiClient::new(ApiConfig::from_env());
//!
//!     let mut stream = client
//!         .send_chat_message_stream(&[Message::user("Hello!")])
//!         .await?;
//!
//!     while let Some(event) = stream.next().await {
//!         match event? {
//!             StreamEvent::Chunk { delta, .. } => print!("{}", delta),
//!             StreamEvent::Complete { .. } => println!(),
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;

pub use client::{
    decode_chat_stream,
    drive_chat_stream,
    ChatMessage,
    ChatStream,
    OpenAiClient,
    SseDecoder,
    SseFrame,
    StreamEvent,
};

pub use config::{normalize_api_url, ApiConfig, OPENAI_API_URL};
pub use error::ApiError;
