//! Talkdeck application: conversation flows, sidebar signal and the
//! command-line front end over the session store and the API client.

pub mod app;
pub mod cli;
pub mod config;
pub mod controller;
pub mod signal;

pub use cli::{Cli, Commands, SessionCommands};
pub use config::ClientConfig;
pub use controller::ChatController;
pub use signal::SidebarSignal;
