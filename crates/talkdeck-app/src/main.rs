use anyhow::Result;
use clap::Parser;

use talkdeck::app::run_command;
use talkdeck::{Cli, ClientConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    talkdeck_logging::init_logger(cli.verbose);

    let config = ClientConfig::from_cli(&cli)?;
    run_command(&cli, config).await
}
