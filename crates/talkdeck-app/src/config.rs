use anyhow::{Context, Result};
use std::path::PathBuf;

use talkdeck_llm_api::ApiConfig;
use talkdeck_logging::get_talkdeck_dir;

use crate::cli::Cli;

/// Everything the front end needs to build a controller
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api: ApiConfig,
    /// Directory of the session partitions
    pub data_dir: PathBuf,
    /// Stream chat replies as they are generated
    pub stream: bool,
}

impl ClientConfig {
    /// Resolve CLI flags (which already fall back to the environment)
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let api_key = cli.api_key.clone().unwrap_or_default();
        if api_key.is_empty() {
            log::warn!("No API key configured; set OPENAI_API_KEY or pass --api-key");
        }

        let mut api = ApiConfig::new(&cli.api_url, api_key);
        api.chat_model = cli.model.clone();
        api.verbose = cli.verbose;
        api.log_requests_to_file = cli.log_requests;

        let data_dir = match &cli.data_dir {
            Some(dir) => dir.clone(),
            None => default_data_dir()?,
        };

        Ok(Self {
            api,
            data_dir,
            stream: !cli.no_stream,
        })
    }
}

/// `~/.talkdeck/storage`
pub fn default_data_dir() -> Result<PathBuf> {
    let base = get_talkdeck_dir().context("Failed to resolve the talkdeck directory")?;
    Ok(base.join("storage"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_from_cli_maps_flags() {
        let cli = Cli::try_parse_from([
            "talkdeck-cli",
            "--api-url",
            "http://localhost:9000/v1/chat/completions",
            "--api-key",
            "sk-local",
            "--model",
            "llama3",
            "--data-dir",
            "/tmp/talkdeck-test",
            "--no-stream",
            "--verbose",
        ])
        .unwrap();

        let config = ClientConfig::from_cli(&cli).unwrap();
        assert_eq!(config.api.base_url, "http://localhost:9000/v1");
        assert_eq!(config.api.api_key, "sk-local");
        assert_eq!(config.api.chat_model, "llama3");
        assert!(config.api.verbose);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/talkdeck-test"));
        assert!(!config.stream);
    }
}
