use clap::{Parser, Subcommand};
use std::path::PathBuf;

use talkdeck_llm_api::config::{DEFAULT_CHAT_MODEL, OPENAI_API_URL};
use talkdeck_types::PageType;

/// CLI arguments for talkdeck
#[derive(Parser, Debug)]
#[command(name = "talkdeck-cli")]
#[command(about = "Talkdeck - chat, speech and image sessions against an OpenAI-compatible API")]
#[command(version = "0.1.0")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, global = true, value_name = "URL", env = "OPENAI_API_URL", default_value = OPENAI_API_URL)]
    pub api_url: String,

    /// API key sent as a bearer token
    #[arg(long, global = true, value_name = "KEY", env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Chat model name
    #[arg(long, global = true, value_name = "MODEL", env = "TALKDECK_MODEL", default_value = DEFAULT_CHAT_MODEL)]
    pub model: String,

    /// Directory holding the session partitions (default: ~/.talkdeck/storage)
    #[arg(long, global = true, value_name = "PATH", env = "TALKDECK_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Wait for whole replies instead of streaming them
    #[arg(long, global = true)]
    pub no_stream: bool,

    /// Enable verbose debug output (shows HTTP requests, responses, stream chunks)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Also write every request to ~/.talkdeck/logs
    #[arg(long, global = true)]
    pub log_requests: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Interactive text chat (default)
    Chat {
        /// Resume this session instead of starting a new one
        #[arg(short = 's', long)]
        session: Option<String>,
    },
    /// Manage stored sessions
    Sessions {
        #[command(subcommand)]
        command: SessionCommands,
    },
    /// Turn text into speech
    Speak {
        /// Text to speak
        text: String,
        /// Where to write the audio
        #[arg(short = 'o', long)]
        out: PathBuf,
    },
    /// Transcribe an audio file
    Transcribe {
        /// Path to the audio file
        file: PathBuf,
    },
    /// Transcribe an audio file into English
    Translate {
        /// Path to the audio file
        file: PathBuf,
    },
    /// Generate an image from a prompt
    Image {
        /// What to draw
        prompt: String,
        /// Add to this image session instead of starting a new one
        #[arg(short = 's', long)]
        session: Option<String>,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum SessionCommands {
    /// List sessions, most recently active first
    List {
        /// Page type (chat, text2audio, audio2text, imagegen)
        #[arg(short = 'p', long, default_value = "chat", value_parser = parse_page_type)]
        page: PageType,
    },
    /// Show the messages of a session
    Show {
        /// Session ID
        session_id: String,
        #[arg(short = 'p', long, default_value = "chat", value_parser = parse_page_type)]
        page: PageType,
    },
    /// Delete one session
    Delete {
        /// Session ID
        session_id: String,
        #[arg(short = 'p', long, default_value = "chat", value_parser = parse_page_type)]
        page: PageType,
    },
    /// Delete every session sharing the page type's storage
    Clear {
        #[arg(short = 'p', long, default_value = "chat", value_parser = parse_page_type)]
        page: PageType,
    },
}

fn parse_page_type(s: &str) -> Result<PageType, String> {
    s.parse()
}
