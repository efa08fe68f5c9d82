// Logging module - logger setup and HTTP request debugging
pub mod request_logger;

use anyhow::{Context, Result};
use std::path::PathBuf;

// Re-export request logging functions
pub use request_logger::{
    log_request,
    log_request_to_file,
    log_request_to_file_in,
    log_response,
    log_stream_chunk,
};

/// Initialize the global `log` backend.
///
/// `RUST_LOG` wins when set; otherwise `verbose` selects `debug` and the
/// default is `warn`. Calling this twice is harmless.
pub fn init_logger(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .try_init();
}

/// Safely truncate a string to a maximum number of characters
pub fn safe_truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        // Reserve space for "..." suffix
        let trunc_chars = max_chars.saturating_sub(3);
        format!("{}...", s.chars().take(trunc_chars).collect::<String>())
    }
}

/// Mask an API key for display, keeping the first 10 characters
pub fn mask_api_key(api_key: &str) -> String {
    format!("{}***", api_key.chars().take(10).collect::<String>())
}

/// Get or create the base talkdeck directory (`$TALKDECK_HOME` or `~/.talkdeck`)
pub fn get_talkdeck_dir() -> Result<PathBuf> {
    let base_dir = match std::env::var("TALKDECK_HOME") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => {
            let home_dir = std::env::var("HOME")
                .or_else(|_| std::env::var("USERPROFILE"))
                .context("Failed to get home directory")?;
            PathBuf::from(home_dir).join(".talkdeck")
        }
    };

    if !base_dir.exists() {
        std::fs::create_dir_all(&base_dir)
            .context("Failed to create talkdeck directory")?;
    }

    Ok(base_dir)
}

/// Get or create the logs directory (`<talkdeck dir>/logs`)
pub fn get_logs_dir() -> Result<PathBuf> {
    let logs_dir = get_talkdeck_dir()?.join("logs");

    if !logs_dir.exists() {
        std::fs::create_dir_all(&logs_dir)
            .context("Failed to create logs directory")?;
    }

    Ok(logs_dir)
}
