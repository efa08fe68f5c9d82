use anyhow::Result;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io::Write;

use talkdeck_history::KeyValueStore;
use talkdeck_types::PageType;

use crate::app::commands::{format_message, format_session_list};
use crate::controller::ChatController;

/// A line typed at the chat prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Exit,
    New,
    Sessions,
    Switch(String),
    Delete(String),
    Rename(String),
    Help,
    Unknown(String),
    Say(String),
}

impl ReplCommand {
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        if line == "exit" || line == "quit" {
            return Some(ReplCommand::Exit);
        }

        if !line.starts_with('/') {
            return Some(ReplCommand::Say(line.to_string()));
        }

        let (name, arg) = match line.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (line, ""),
        };

        let command = match (name, arg.is_empty()) {
            ("/exit" | "/quit", _) => ReplCommand::Exit,
            ("/new", _) => ReplCommand::New,
            ("/sessions", _) => ReplCommand::Sessions,
            ("/help", _) => ReplCommand::Help,
            ("/switch", false) => ReplCommand::Switch(arg.to_string()),
            ("/delete", false) => ReplCommand::Delete(arg.to_string()),
            ("/rename", false) => ReplCommand::Rename(arg.to_string()),
            _ => ReplCommand::Unknown(line.to_string()),
        };
        Some(command)
    }
}

fn print_help() {
    println!("{}", "Commands:".bright_cyan());
    println!("  /new               - Start a new session");
    println!("  /sessions          - List chat sessions");
    println!("  /switch <id>       - Continue another session");
    println!("  /delete <id>       - Delete a session");
    println!("  /rename <name>     - Rename the current session");
    println!("  /exit              - Leave");
}

fn print_history<S: KeyValueStore>(controller: &ChatController<S>, session_id: &str) {
    for message in controller.store().load_session_messages(PageType::TextChat, session_id) {
        println!("{}", format_message(&message));
    }
}

/// Run the interactive text chat
pub async fn run_repl_mode<S: KeyValueStore>(controller: &ChatController<S>, session: Option<&str>) -> Result<()> {
    let page_type = PageType::TextChat;

    println!("{}", "💬 Talkdeck".bright_cyan().bold());
    println!("{}", format!("Model: {}", controller.client().config().chat_model).bright_black());
    println!("{}", "Type /help for commands, 'exit' to leave\n".bright_black());

    let mut session_id = controller.start_session(page_type, session)?;
    if session.is_some_and(|requested| requested == session_id) {
        print_history(controller, &session_id);
    }

    let mut rl = DefaultEditor::new()?;

    loop {
        let indicator = format!("[{}]", short_id(&session_id)).bright_magenta();
        let readline = rl.readline(&format!("{} {} ", indicator, "You:".bright_green().bold()));

        let line = match readline {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                println!("{}", "^C".bright_black());
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("{} Input error: {}", "❌".bright_red(), e);
                break;
            }
        };

        let Some(command) = ReplCommand::parse(&line) else {
            continue;
        };
        let _ = rl.add_history_entry(line.trim());

        match command {
            ReplCommand::Exit => break,
            ReplCommand::Help => print_help(),
            ReplCommand::New => match controller.start_session(page_type, None) {
                Ok(id) => {
                    println!("{} Started session {}", "✓".bright_green(), id);
                    session_id = id;
                }
                Err(e) => eprintln!("{} {}", "❌".bright_red(), e),
            },
            ReplCommand::Sessions => {
                println!("{}", format_session_list(&controller.store().get_session_list(page_type)));
            }
            ReplCommand::Switch(id) => {
                if controller.store().has_existing_session(page_type, &id) {
                    session_id = id;
                    print_history(controller, &session_id);
                } else {
                    eprintln!("{} No session with id {}", "❌".bright_red(), id);
                }
            }
            ReplCommand::Delete(id) => {
                if controller.store().delete_session(page_type, &id) {
                    println!("{} Deleted session {}", "✓".bright_green(), id);
                    if id == session_id {
                        session_id = controller.start_session(page_type, None)?;
                        println!("{} Started session {}", "✓".bright_green(), session_id);
                    }
                } else {
                    eprintln!("{} No session with id {}", "❌".bright_red(), id);
                }
            }
            ReplCommand::Rename(name) => {
                if controller.store().rename_session(page_type, &session_id, &name) {
                    println!("{} Renamed to {}", "✓".bright_green(), name.bold());
                } else {
                    eprintln!("{} Could not rename session {}", "❌".bright_red(), session_id);
                }
            }
            ReplCommand::Unknown(line) => {
                eprintln!("{} Unknown command: {} (try /help)", "⚠️".yellow(), line);
            }
            ReplCommand::Say(text) => {
                print!("{} ", "AI:".bright_blue().bold());
                let _ = std::io::stdout().flush();

                // Ctrl-C while the reply is streaming abandons the request
                let interrupted = async {
                    if tokio::signal::ctrl_c().await.is_err() {
                        std::future::pending::<()>().await;
                    }
                };
                let result = controller
                    .send_text_until(&session_id, &text, interrupted, |delta| {
                        print!("{}", delta);
                        let _ = std::io::stdout().flush();
                    })
                    .await;
                println!();

                if let Err(e) = result {
                    eprintln!("{} {}", "❌".bright_red(), e.user_message().red());
                }
            }
        }
    }

    println!("{}", "Goodbye!".bright_black());
    Ok(())
}

fn short_id(id: &str) -> &str {
    match id.char_indices().nth(8) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}
