use anyhow::{Context, Result};
use colored::Colorize;
use std::fs;
use std::path::Path;

use talkdeck_history::{KeyValueStore, SessionStore};
use talkdeck_types::{Message, PageType, Sender, SessionSummary};

use crate::cli::SessionCommands;
use crate::controller::ChatController;

/// One line per session: id, name, message count, relative time
pub fn format_session_list(sessions: &[SessionSummary]) -> String {
    if sessions.is_empty() {
        return "No sessions".bright_black().to_string();
    }

    sessions
        .iter()
        .map(|s| {
            format!(
                "{}  {}  {}  {}",
                s.id.bright_cyan(),
                s.name.bold(),
                format!("({} messages)", s.message_count).bright_black(),
                s.display_time.bright_black()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render a stored message the way the chat shows it
pub fn format_message(message: &Message) -> String {
    let label = match message.sender {
        Sender::User => "You:".bright_green().bold(),
        Sender::Ai => "AI:".bright_blue().bold(),
    };

    let mut text = message.text.clone();
    if let Some(url) = message.metadata_str("imageUrl") {
        if url != text {
            text = format!("{}\n{}", text, url);
        }
    }

    if message.metadata.get("isError").and_then(|v| v.as_bool()).unwrap_or(false) {
        format!("{} {}", label, text.red())
    } else {
        format!("{} {}", label, text)
    }
}

pub fn run_sessions_command<S: KeyValueStore>(store: &SessionStore<S>, command: &SessionCommands) -> Result<String> {
    match command {
        SessionCommands::List { page } => Ok(format_session_list(&store.get_session_list(*page))),
        SessionCommands::Show { session_id, page } => {
            let session = store
                .get_session(*page, session_id)
                .with_context(|| format!("No {} session with id {}", page, session_id))?;

            let mut lines = vec![format!("{} {}", session.name.bold(), format!("[{}]", session.id).bright_black())];
            lines.extend(session.messages.iter().map(format_message));
            Ok(lines.join("\n"))
        }
        SessionCommands::Delete { session_id, page } => {
            if store.delete_session(*page, session_id) {
                Ok(format!("{} Deleted session {}", "✓".bright_green(), session_id))
            } else {
                anyhow::bail!("No {} session with id {}", page, session_id)
            }
        }
        SessionCommands::Clear { page } => {
            store.clear_all_sessions(*page);
            Ok(format!("{} Cleared all {} sessions", "✓".bright_green(), page.label()))
        }
    }
}

pub async fn run_speak<S: KeyValueStore>(controller: &ChatController<S>, text: &str, out: &Path) -> Result<String> {
    let session_id = controller.start_session(PageType::TextToAudio, None)?;
    let audio = controller.speak(&session_id, text).await?;

    fs::write(out, &audio).with_context(|| format!("Failed to write audio to {}", out.display()))?;
    Ok(format!("{} Wrote {} bytes to {}", "✓".bright_green(), audio.len(), out.display()))
}

pub async fn run_transcribe<S: KeyValueStore>(
    controller: &ChatController<S>,
    file: &Path,
    translate: bool,
) -> Result<String> {
    let audio = fs::read(file).with_context(|| format!("Failed to read audio file {}", file.display()))?;
    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "audio".to_string());

    let session_id = controller.start_session(PageType::AudioToText, None)?;
    let text = if translate {
        controller.translate(&session_id, audio, &filename).await?
    } else {
        controller.transcribe(&session_id, audio, &filename).await?
    };
    Ok(text)
}

pub async fn run_image<S: KeyValueStore>(
    controller: &ChatController<S>,
    prompt: &str,
    session: Option<&str>,
) -> Result<String> {
    let session_id = controller.start_session(PageType::ImageGen, session)?;
    let url = controller.generate_image(&session_id, prompt).await?;
    Ok(format!("{}\n{}", url, format!("session {}", session_id).bright_black()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use talkdeck_history::MemoryStorage;

    #[test]
    fn test_delete_missing_session_is_an_error() {
        let store = SessionStore::new(Arc::new(MemoryStorage::new()));
        let command = SessionCommands::Delete { session_id: "nope".into(), page: PageType::TextChat };
        assert!(run_sessions_command(&store, &command).is_err());
    }

    #[test]
    fn test_list_and_show() {
        colored::control::set_override(false);
        let store = SessionStore::new(Arc::new(MemoryStorage::new()));
        let id = store.create_new_session(PageType::ImageGen, Some("Cats")).unwrap();
        store.save_session_message(PageType::ImageGen, &id, &Message::user("a cat"));

        let list = run_sessions_command(&store, &SessionCommands::List { page: PageType::ImageGen }).unwrap();
        assert!(list.contains(&id));
        assert!(list.contains("Cats"));
        assert!(list.contains("(1 messages)"));

        let show = run_sessions_command(&store, &SessionCommands::Show { session_id: id, page: PageType::ImageGen })
            .unwrap();
        assert!(show.contains("You: a cat"));
    }

    #[test]
    fn test_format_message_appends_image_url() {
        colored::control::set_override(false);
        let message = Message::ai("here you go").with_metadata("imageUrl", "https://img/1.png");
        assert_eq!(format_message(&message), "AI: here you go\nhttps://img/1.png");
    }
}
