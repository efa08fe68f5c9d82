//! # talkdeck-history
//!
//! Conversation history persisted as one JSON object per storage partition.
//!
//! - [`KeyValueStore`]: the flat string store sessions live in, with
//!   [`MemoryStorage`] and [`FileStorage`] implementations
//! - [`SessionStore`]: create/read/update/delete of sessions keyed by page type
//! - [`format_time_display`]: the humanized "last updated" label of the sidebar
//!
//! ## Example
//!
//! ```rust
//! use talkdeck_history::{MemoryStorage, SessionStore};
//! use talkdeck_types::{Message, PageType};
//!
//! let store = SessionStore::new(MemoryStorage::new());
//! let session_id = store.create_new_session(PageType::TextChat, None).unwrap();
//!
//! store.save_session_message(PageType::TextChat, &session_id, &Message::user("Hello there"));
//!
//! let sessions = store.get_session_list(PageType::TextChat);
//! assert_eq!(sessions[0].name, "Hello there");
//! ```

pub mod storage;
pub mod store;
pub mod time_display;

pub use storage::{FileStorage, KeyValueStore, MemoryStorage};
pub use store::{generate_session_name, Clock, SessionStore};
pub use time_display::format_time_display;
