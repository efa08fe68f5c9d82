//! Core types and structures for talkdeck
//!
//! This crate provides the constants and data model shared across all talkdeck crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Constants
// ============================================================================

/// Storage key of the text-chat partition
pub const TEXT_CHAT_STORAGE_KEY: &str = "chat_sessions_text";

/// Storage key of the image-generation partition
pub const IMAGE_GEN_STORAGE_KEY: &str = "chat_sessions_image";

/// Placeholder name given to sessions until the first user message names them
pub const DEFAULT_SESSION_NAME: &str = "New Chat";

/// Maximum number of characters kept when deriving a session name
pub const SESSION_NAME_MAX_CHARS: usize = 15;

/// User-facing error strings
pub mod error_messages {
    pub const NETWORK_ERROR: &str = "Network error, please check your connection";
    pub const TIMEOUT_ERROR: &str = "Request timed out, please try again later";
    pub const API_KEY_ERROR: &str = "Invalid API key, please check your configuration";
    pub const RATE_LIMIT_ERROR: &str = "Too many API requests, please try again later";
    pub const SERVER_ERROR: &str = "The AI service reported a server error, please try again later";
    pub const UNKNOWN_ERROR: &str = "Unknown error, please try again later";
    pub const CONNECTION_FAILED: &str = "Network connection failed, please check your network";
    pub const REQUEST_CANCELLED: &str = "The request was cancelled";
}

// ============================================================================
// Page Types
// ============================================================================

/// The page a conversation belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PageType {
    #[serde(rename = "chat")]
    TextChat,
    #[serde(rename = "text2audio")]
    TextToAudio,
    #[serde(rename = "audio2text")]
    AudioToText,
    #[serde(rename = "imagegen")]
    ImageGen,
}

impl PageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageType::TextChat => "chat",
            PageType::TextToAudio => "text2audio",
            PageType::AudioToText => "audio2text",
            PageType::ImageGen => "imagegen",
        }
    }

    /// Storage partition holding this page's sessions.
    ///
    /// Only text chat has its own partition; every other page shares the
    /// image partition.
    pub fn partition(&self) -> Partition {
        match self {
            PageType::TextChat => Partition::Text,
            _ => Partition::Image,
        }
    }

    /// Human readable partition label used in log lines
    pub fn label(&self) -> &'static str {
        match self.partition() {
            Partition::Text => "text chat",
            Partition::Image => "image generation",
        }
    }
}

/// Parses a page type from its wire name or a loose alias
impl FromStr for PageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "chat" | "text" | "textchat" | "text-chat" => Ok(PageType::TextChat),
            "text2audio" | "tts" | "speech" => Ok(PageType::TextToAudio),
            "audio2text" | "stt" | "transcribe" => Ok(PageType::AudioToText),
            "imagegen" | "image" | "images" => Ok(PageType::ImageGen),
            _ => Err(format!(
                "unknown page type '{}' (expected chat, text2audio, audio2text or imagegen)",
                s
            )),
        }
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A storage bucket holding all sessions of one kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    Text,
    Image,
}

impl Partition {
    pub fn storage_key(&self) -> &'static str {
        match self {
            Partition::Text => TEXT_CHAT_STORAGE_KEY,
            Partition::Image => IMAGE_GEN_STORAGE_KEY,
        }
    }
}

// ============================================================================
// Message Types
// ============================================================================

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
}

impl Sender {
    /// Chat-completions role for this sender
    pub fn role(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Ai => "assistant",
        }
    }
}

/// Helper function to deserialize string or null values
pub fn deserialize_string_or_null<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Null => Ok(String::new()),
        _ => Ok(String::new()),
    }
}

/// Message ids were historically written as millisecond timestamps, so accept numbers too
fn deserialize_message_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!("invalid message id: {}", other))),
    }
}

/// One chat bubble.
///
/// Fields other than `id`, `sender` and `text` are rendering metadata
/// (image URLs, loading flags, ...) and are carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(deserialize_with = "deserialize_message_id")]
    pub id: String,
    pub sender: Sender,
    #[serde(deserialize_with = "deserialize_string_or_null", default)]
    pub text: String,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl Message {
    pub fn new(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            sender,
            text: text.into(),
            metadata: Map::new(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Sender::User, text)
    }

    pub fn ai(text: impl Into<String>) -> Self {
        Self::new(Sender::Ai, text)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }
}

// ============================================================================
// Session Types
// ============================================================================

/// A persisted conversation thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    #[serde(deserialize_with = "deserialize_string_or_null", default)]
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Session {
    pub fn new(id: impl Into<String>, name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            created_at: now,
            last_updated: Some(now),
            messages: Vec::new(),
        }
    }

    /// Timestamp the session list is ordered by
    pub fn sort_time(&self) -> DateTime<Utc> {
        self.last_updated.unwrap_or(self.created_at)
    }

    pub fn has_default_name(&self) -> bool {
        self.name == DEFAULT_SESSION_NAME
    }

    /// Insert or replace a message by id.
    ///
    /// A replaced message keeps its position and leaves `last_updated` alone;
    /// an appended one bumps it. Returns `true` when the message was appended.
    pub fn upsert_message(&mut self, message: Message, now: DateTime<Utc>) -> bool {
        match self.messages.iter().position(|m| m.id == message.id) {
            Some(index) => {
                self.messages[index] = message;
                false
            }
            None => {
                self.messages.push(message);
                self.last_updated = Some(now);
                true
            }
        }
    }
}

/// Sidebar entry produced by the session list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: String,
    pub name: String,
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
    pub last_updated: Option<DateTime<Utc>>,
    pub sort_time: DateTime<Utc>,
    pub display_time: String,
}

// ============================================================================
// UI Signal Types
// ============================================================================

/// Most recent "a message changed" event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SidebarRefresh {
    /// Epoch milliseconds
    pub time: Option<i64>,
    pub page_type: Option<PageType>,
    pub session_id: Option<String>,
}
