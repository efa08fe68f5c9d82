pub mod commands;
pub mod repl;

use anyhow::Result;

use talkdeck_history::{FileStorage, SessionStore};
use talkdeck_llm_api::OpenAiClient;

use crate::cli::{Cli, Commands};
use crate::config::ClientConfig;
use crate::controller::ChatController;
use crate::signal::SidebarSignal;

pub use commands::{run_image, run_sessions_command, run_speak, run_transcribe};
pub use repl::run_repl_mode;

/// Build a controller over the file-backed store in `config.data_dir`
pub fn build_controller(config: &ClientConfig) -> Result<ChatController<FileStorage>> {
    let storage = FileStorage::new(&config.data_dir)?;
    log::debug!("Session storage at {}", storage.dir().display());

    let client = OpenAiClient::new(config.api.clone());
    Ok(ChatController::new(SessionStore::new(storage), client, SidebarSignal::new()).with_streaming(config.stream))
}

/// Run the selected subcommand, or the chat REPL when there is none
pub async fn run_command(cli: &Cli, config: ClientConfig) -> Result<()> {
    let controller = build_controller(&config)?;

    let output = match cli.command.clone() {
        None => return run_repl_mode(&controller, None).await,
        Some(Commands::Chat { session }) => return run_repl_mode(&controller, session.as_deref()).await,
        Some(Commands::Sessions { command }) => run_sessions_command(controller.store(), &command)?,
        Some(Commands::Speak { text, out }) => run_speak(&controller, &text, &out).await?,
        Some(Commands::Transcribe { file }) => run_transcribe(&controller, &file, false).await?,
        Some(Commands::Translate { file }) => run_transcribe(&controller, &file, true).await?,
        Some(Commands::Image { prompt, session }) => run_image(&controller, &prompt, session.as_deref()).await?,
    };

    println!("{}", output);
    Ok(())
}
