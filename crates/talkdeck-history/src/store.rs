use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex};

use talkdeck_types::{
    Message, PageType, Partition, Sender, Session, SessionSummary, DEFAULT_SESSION_NAME,
    SESSION_NAME_MAX_CHARS,
};

use crate::storage::KeyValueStore;
use crate::time_display::format_time_display;

/// Source of "now" for timestamps
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Derive a session name from the first user message.
///
/// The trimmed text is kept up to 15 characters, with `...` appended when cut.
/// Falls back to the placeholder name when there is no usable user text.
pub fn generate_session_name(messages: &[Message]) -> String {
    let Some(first_user_message) = messages.iter().find(|m| m.sender == Sender::User) else {
        return DEFAULT_SESSION_NAME.to_string();
    };

    let name = first_user_message.text.trim();
    if name.is_empty() {
        return DEFAULT_SESSION_NAME.to_string();
    }

    if name.chars().count() > SESSION_NAME_MAX_CHARS {
        format!("{}...", name.chars().take(SESSION_NAME_MAX_CHARS).collect::<String>())
    } else {
        name.to_string()
    }
}

/// Raw contents of one partition: session id -> session JSON.
///
/// Entries are only deserialized when touched, so an entry this version
/// cannot read is carried through writes untouched.
struct PartitionData {
    entries: Map<String, Value>,
}

impl PartitionData {
    fn get(&self, session_id: &str) -> Result<Option<Session>> {
        match self.entries.get(session_id) {
            Some(value) => {
                let session = Session::deserialize(value)
                    .with_context(|| format!("Malformed session {}", session_id))?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    fn put(&mut self, session: &Session) -> Result<()> {
        let value = serde_json::to_value(session).context("Failed to serialize session")?;
        self.entries.insert(session.id.clone(), value);
        Ok(())
    }

    fn sessions(&self) -> Vec<Session> {
        self.entries
            .iter()
            .filter_map(|(id, value)| match Session::deserialize(value) {
                Ok(session) => Some(session),
                Err(e) => {
                    log::warn!("Skipping malformed session {}: {}", id, e);
                    None
                }
            })
            .collect()
    }
}

/// Session history over a [`KeyValueStore`].
///
/// Every public operation swallows its own failures: the error is logged and
/// a neutral value (`None`, empty list, `false`, no-op) is returned.
///
/// Each mutation reads the whole partition, modifies it and writes it back.
/// Mutations through one `SessionStore` are serialized; two stores (or two
/// processes) sharing a storage backend follow last-write-wins.
pub struct SessionStore<S> {
    storage: S,
    write_lock: Mutex<()>,
    clock: Clock,
}

impl<S: KeyValueStore> SessionStore<S> {
    pub fn new(storage: S) -> Self {
        Self::with_clock(storage, Arc::new(Utc::now))
    }

    pub fn with_clock(storage: S, clock: Clock) -> Self {
        Self {
            storage,
            write_lock: Mutex::new(()),
            clock,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Fresh UUID v4 session identifier
    pub fn generate_new_session_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// Create an empty session, named `name` or the placeholder.
    ///
    /// Returns the new session id, or `None` if it could not be stored.
    pub fn create_new_session(&self, page_type: PageType, name: Option<&str>) -> Option<String> {
        let result = self.mutate(page_type, |data, now| {
            let session_id = Self::generate_new_session_id();
            let session = Session::new(&session_id, name.unwrap_or(DEFAULT_SESSION_NAME), now);
            data.put(&session)?;
            Ok(session)
        });

        match result {
            Ok(session) => {
                log::info!("Created new {} session: {}", page_type.label(), session.name);
                Some(session.id)
            }
            Err(e) => {
                log::error!("Failed to create session: {:#}", e);
                None
            }
        }
    }

    /// Messages of a session; empty when the session does not exist
    pub fn load_session_messages(&self, page_type: PageType, session_id: &str) -> Vec<Message> {
        self.get_session(page_type, session_id)
            .map(|session| session.messages)
            .unwrap_or_default()
    }

    /// A full session record
    pub fn get_session(&self, page_type: PageType, session_id: &str) -> Option<Session> {
        let result = self
            .read_partition(page_type.partition())
            .and_then(|data| data.get(session_id));

        match result {
            Ok(session) => session,
            Err(e) => {
                log::error!("Failed to load session {}: {:#}", session_id, e);
                None
            }
        }
    }

    /// Insert or update one message, creating the session if needed.
    ///
    /// A session still carrying the placeholder name is renamed after the
    /// first non-empty user message saved into it.
    pub fn save_session_message(&self, page_type: PageType, session_id: &str, message: &Message) {
        let result = self.mutate(page_type, |data, now| {
            let mut session = data
                .get(session_id)?
                .unwrap_or_else(|| Session::new(session_id, DEFAULT_SESSION_NAME, now));

            session.upsert_message(message.clone(), now);

            if session.has_default_name() && message.sender == Sender::User && !message.text.is_empty() {
                session.name = generate_session_name(std::slice::from_ref(message));
            }

            data.put(&session)
        });

        match result {
            Ok(()) => log::debug!("Saved message {} to session {}", message.id, session_id),
            Err(e) => log::error!("Failed to save message to session {}: {:#}", session_id, e),
        }
    }

    /// Replace all messages of an existing session (autosave).
    ///
    /// Does nothing when the session does not exist.
    pub fn update_session_messages(&self, page_type: PageType, session_id: &str, messages: &[Message]) {
        let result = self.mutate_if(page_type, |data, now| {
            match data.get(session_id)? {
                Some(mut session) => {
                    session.messages = messages.to_vec();
                    session.last_updated = Some(now);
                    data.put(&session)?;
                    Ok(true)
                }
                None => Ok(false),
            }
        });

        if let Err(e) = result {
            log::error!("Failed to update session {}: {:#}", session_id, e);
        }
    }

    /// Give a session a user-chosen name. Returns `false` if it does not exist.
    pub fn rename_session(&self, page_type: PageType, session_id: &str, name: &str) -> bool {
        let result = self.mutate_if(page_type, |data, _now| {
            match data.get(session_id)? {
                Some(mut session) => {
                    session.name = name.to_string();
                    data.put(&session)?;
                    Ok(true)
                }
                None => Ok(false),
            }
        });

        result.unwrap_or_else(|e| {
            log::error!("Failed to rename session {}: {:#}", session_id, e);
            false
        })
    }

    /// Sidebar entries, most recently updated first
    pub fn get_session_list(&self, page_type: PageType) -> Vec<SessionSummary> {
        let data = match self.read_partition(page_type.partition()) {
            Ok(data) => data,
            Err(e) => {
                log::error!("Failed to list sessions: {:#}", e);
                return Vec::new();
            }
        };

        let now = (self.clock)().with_timezone(&Local);
        let mut list: Vec<SessionSummary> = data
            .sessions()
            .into_iter()
            .map(|session| {
                let sort_time = session.sort_time();
                SessionSummary {
                    display_time: format_time_display(sort_time, now),
                    message_count: session.messages.len(),
                    id: session.id,
                    name: session.name,
                    created_at: session.created_at,
                    last_updated: session.last_updated,
                    sort_time,
                }
            })
            .collect();

        list.sort_by(|a, b| b.sort_time.cmp(&a.sort_time));
        list
    }

    /// Remove every session of the page type's partition
    pub fn clear_all_sessions(&self, page_type: PageType) {
        let result = self
            .lock()
            .and_then(|_guard| self.storage.remove_item(page_type.partition().storage_key()));

        match result {
            Ok(()) => log::info!("Cleared all {} sessions", page_type.label()),
            Err(e) => log::error!("Failed to clear sessions: {:#}", e),
        }
    }

    /// Delete one session. Returns `true` iff it existed.
    pub fn delete_session(&self, page_type: PageType, session_id: &str) -> bool {
        let result = self.mutate_if(page_type, |data, _now| {
            match data.entries.remove(session_id) {
                Some(removed) => {
                    let name = removed.get("name").and_then(Value::as_str).unwrap_or_default();
                    log::info!("Deleted session: {}", name);
                    Ok(true)
                }
                None => Ok(false),
            }
        });

        result.unwrap_or_else(|e| {
            log::error!("Failed to delete session {}: {:#}", session_id, e);
            false
        })
    }

    /// Whether a session with this (non-empty) id exists
    pub fn has_existing_session(&self, page_type: PageType, session_id: &str) -> bool {
        if session_id.is_empty() {
            return false;
        }

        match self.read_partition(page_type.partition()) {
            Ok(data) => data.entries.contains_key(session_id),
            Err(e) => {
                log::error!("Failed to check for session {}: {:#}", session_id, e);
                false
            }
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| anyhow::anyhow!("session store lock poisoned"))
    }

    /// Read-modify-write that always writes the partition back
    fn mutate<T>(
        &self,
        page_type: PageType,
        f: impl FnOnce(&mut PartitionData, DateTime<Utc>) -> Result<T>,
    ) -> Result<T> {
        let partition = page_type.partition();
        let _guard = self.lock()?;
        let mut data = self.read_partition(partition)?;
        let value = f(&mut data, (self.clock)())?;
        self.write_partition(partition, &data)?;
        Ok(value)
    }

    /// Read-modify-write that only writes back when `f` returns `true`
    fn mutate_if(
        &self,
        page_type: PageType,
        f: impl FnOnce(&mut PartitionData, DateTime<Utc>) -> Result<bool>,
    ) -> Result<bool> {
        let partition = page_type.partition();
        let _guard = self.lock()?;
        let mut data = self.read_partition(partition)?;
        let changed = f(&mut data, (self.clock)())?;
        if changed {
            self.write_partition(partition, &data)?;
        }
        Ok(changed)
    }

    /// Load a partition; absent reads as empty.
    ///
    /// Unparseable contents also read as empty. The raw text is copied to
    /// `<key>.corrupt` first, since the next write replaces it.
    fn read_partition(&self, partition: Partition) -> Result<PartitionData> {
        let key = partition.storage_key();
        let Some(raw) = self.storage.get_item(key)? else {
            return Ok(PartitionData { entries: Map::new() });
        };

        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(entries)) => Ok(PartitionData { entries }),
            parsed => {
                let reason = match parsed {
                    Ok(other) => format!("expected a JSON object, found {}", json_kind(&other)),
                    Err(e) => e.to_string(),
                };
                log::warn!("Discarding corrupt session partition {}: {}", key, reason);

                let backup_key = format!("{}.corrupt", key);
                if let Err(e) = self.storage.set_item(&backup_key, &raw) {
                    log::error!("Failed to back up corrupt partition {}: {:#}", key, e);
                }

                Ok(PartitionData { entries: Map::new() })
            }
        }
    }

    fn write_partition(&self, partition: Partition, data: &PartitionData) -> Result<()> {
        let json = serde_json::to_string(&data.entries).context("Failed to serialize sessions")?;
        self.storage.set_item(partition.storage_key(), &json)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicI64, Ordering};

    /// Clock that advances one minute per reading
    fn ticking_clock() -> Clock {
        let start = Utc.with_ymd_and_hms(2024, 6, 15, 9, 0, 0).unwrap();
        let ticks = Arc::new(AtomicI64::new(0));
        Arc::new(move || start + Duration::minutes(ticks.fetch_add(1, Ordering::SeqCst)))
    }

    fn store() -> SessionStore<Arc<MemoryStorage>> {
        SessionStore::with_clock(Arc::new(MemoryStorage::new()), ticking_clock())
    }

    fn raw_partition(store: &SessionStore<Arc<MemoryStorage>>, key: &str) -> Option<String> {
        store.storage().get_item(key).unwrap()
    }

    #[test]
    fn test_generate_session_name() {
        assert_eq!(generate_session_name(&[]), DEFAULT_SESSION_NAME);
        assert_eq!(generate_session_name(&[Message::ai("hello")]), DEFAULT_SESSION_NAME);
        assert_eq!(generate_session_name(&[Message::user("   ")]), DEFAULT_SESSION_NAME);
        assert_eq!(generate_session_name(&[Message::user("  short  ")]), "short");
        assert_eq!(
            generate_session_name(&[Message::ai("x"), Message::user("exactly fifteen")]),
            "exactly fifteen"
        );
        assert_eq!(
            generate_session_name(&[Message::user("sixteen chars!!!")]),
            "sixteen chars!!..."
        );
    }

    #[test]
    fn test_create_new_session_defaults() {
        let store = store();
        let id = store.create_new_session(PageType::TextChat, None).unwrap();

        let session = store.get_session(PageType::TextChat, &id).unwrap();
        assert_eq!(session.name, DEFAULT_SESSION_NAME);
        assert_eq!(session.last_updated, Some(session.created_at));
        assert!(session.messages.is_empty());
        assert!(uuid::Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn test_create_new_session_with_name_lands_in_image_partition() {
        let store = store();
        let id = store.create_new_session(PageType::ImageGen, Some("Cats")).unwrap();

        assert!(store.has_existing_session(PageType::ImageGen, &id));
        assert!(!store.has_existing_session(PageType::TextChat, &id));
        assert!(raw_partition(&store, "chat_sessions_image").unwrap().contains("\"Cats\""));
        assert_eq!(raw_partition(&store, "chat_sessions_text"), None);
    }

    #[test]
    fn test_save_new_message_appends_and_bumps_last_updated() {
        let store = store();
        let id = store.create_new_session(PageType::TextChat, None).unwrap();
        let before = store.get_session(PageType::TextChat, &id).unwrap();

        store.save_session_message(PageType::TextChat, &id, &Message::user("hi").with_id("m1"));

        let after = store.get_session(PageType::TextChat, &id).unwrap();
        assert_eq!(after.messages.len(), before.messages.len() + 1);
        assert!(after.last_updated > before.last_updated);
    }

    #[test]
    fn test_save_existing_message_replaces_in_place() {
        let store = store();
        let id = store.create_new_session(PageType::TextChat, None).unwrap();
        store.save_session_message(PageType::TextChat, &id, &Message::user("q").with_id("m1"));
        store.save_session_message(PageType::TextChat, &id, &Message::ai("").with_id("m2"));
        let before = store.get_session(PageType::TextChat, &id).unwrap();

        store.save_session_message(PageType::TextChat, &id, &Message::ai("answer").with_id("m2"));

        let after = store.get_session(PageType::TextChat, &id).unwrap();
        assert_eq!(after.messages.len(), 2);
        assert_eq!(after.messages[1].text, "answer");
        assert_eq!(after.last_updated, before.last_updated);
    }

    #[test]
    fn test_save_message_derives_name_only_from_placeholder() {
        let store = store();
        let id = store.create_new_session(PageType::TextChat, None).unwrap();

        store.save_session_message(PageType::TextChat, &id, &Message::ai("Welcome!"));
        assert_eq!(store.get_session(PageType::TextChat, &id).unwrap().name, DEFAULT_SESSION_NAME);

        store.save_session_message(PageType::TextChat, &id, &Message::user("How do lifetimes work in Rust?"));
        assert_eq!(store.get_session(PageType::TextChat, &id).unwrap().name, "How do lifetime...");

        store.save_session_message(PageType::TextChat, &id, &Message::user("Second question"));
        assert_eq!(store.get_session(PageType::TextChat, &id).unwrap().name, "How do lifetime...");
    }

    #[test]
    fn test_save_message_creates_missing_session() {
        let store = store();
        store.save_session_message(PageType::TextChat, "fresh", &Message::user("Hello"));

        let session = store.get_session(PageType::TextChat, "fresh").unwrap();
        assert_eq!(session.name, "Hello");
        assert_eq!(session.messages.len(), 1);
    }

    #[test]
    fn test_user_named_session_keeps_its_name() {
        let store = store();
        let id = store.create_new_session(PageType::TextChat, Some("Mine")).unwrap();
        store.save_session_message(PageType::TextChat, &id, &Message::user("Hello"));
        assert_eq!(store.get_session(PageType::TextChat, &id).unwrap().name, "Mine");
    }

    #[test]
    fn test_update_session_messages_overwrites_existing_only() {
        let store = store();
        let id = store.create_new_session(PageType::TextChat, None).unwrap();
        store.save_session_message(PageType::TextChat, &id, &Message::user("old"));

        let replacement = vec![Message::user("a"), Message::ai("b"), Message::user("c")];
        store.update_session_messages(PageType::TextChat, &id, &replacement);
        assert_eq!(store.load_session_messages(PageType::TextChat, &id), replacement);

        store.update_session_messages(PageType::TextChat, "missing", &replacement);
        assert!(!store.has_existing_session(PageType::TextChat, "missing"));
    }

    #[test]
    fn test_load_messages_of_missing_session_is_empty() {
        let store = store();
        assert!(store.load_session_messages(PageType::TextChat, "nope").is_empty());
    }

    #[test]
    fn test_session_list_most_recent_first() {
        let store = store();
        let older = store.create_new_session(PageType::TextChat, Some("older")).unwrap();
        let newer = store.create_new_session(PageType::TextChat, Some("newer")).unwrap();

        let list = store.get_session_list(PageType::TextChat);
        assert_eq!(list.iter().map(|s| s.id.clone()).collect::<Vec<_>>(), vec![newer, older.clone()]);

        store.save_session_message(PageType::TextChat, &older, &Message::user("bump"));
        let list = store.get_session_list(PageType::TextChat);
        assert_eq!(list[0].id, older);
        assert_eq!(list[0].message_count, 1);
        assert!(!list[0].display_time.is_empty());
    }

    #[test]
    fn test_delete_missing_session_leaves_partition_unchanged() {
        let store = store();
        store.create_new_session(PageType::TextChat, Some("keep")).unwrap();
        let before = raw_partition(&store, "chat_sessions_text");

        assert!(!store.delete_session(PageType::TextChat, "missing"));
        assert_eq!(raw_partition(&store, "chat_sessions_text"), before);
    }

    #[test]
    fn test_delete_present_session_removes_exactly_it() {
        let store = store();
        let keep = store.create_new_session(PageType::TextChat, Some("keep")).unwrap();
        let gone = store.create_new_session(PageType::TextChat, Some("gone")).unwrap();

        assert!(store.delete_session(PageType::TextChat, &gone));

        let ids: Vec<String> = store.get_session_list(PageType::TextChat).into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![keep]);
    }

    #[test]
    fn test_clear_all_sessions_only_touches_one_partition() {
        let store = store();
        store.create_new_session(PageType::TextChat, None).unwrap();
        store.create_new_session(PageType::ImageGen, None).unwrap();

        store.clear_all_sessions(PageType::TextChat);

        assert!(store.get_session_list(PageType::TextChat).is_empty());
        assert_eq!(store.get_session_list(PageType::ImageGen).len(), 1);
        assert_eq!(raw_partition(&store, "chat_sessions_text"), None);
    }

    #[test]
    fn test_has_existing_session_rejects_empty_id() {
        let store = store();
        assert!(!store.has_existing_session(PageType::TextChat, ""));
    }

    #[test]
    fn test_rename_session() {
        let store = store();
        let id = store.create_new_session(PageType::TextChat, None).unwrap();

        assert!(store.rename_session(PageType::TextChat, &id, "Renamed"));
        assert_eq!(store.get_session(PageType::TextChat, &id).unwrap().name, "Renamed");
        assert!(!store.rename_session(PageType::TextChat, "missing", "x"));
    }

    #[test]
    fn test_corrupt_partition_reads_empty_and_is_backed_up() {
        let store = store();
        store.storage().set_item("chat_sessions_text", "{not json").unwrap();

        assert!(store.get_session_list(PageType::TextChat).is_empty());
        assert!(!store.has_existing_session(PageType::TextChat, "x"));
        assert_eq!(raw_partition(&store, "chat_sessions_text.corrupt").as_deref(), Some("{not json"));

        let id = store.create_new_session(PageType::TextChat, None).unwrap();
        assert_eq!(store.get_session_list(PageType::TextChat).len(), 1);
        assert!(store.has_existing_session(PageType::TextChat, &id));
    }

    #[test]
    fn test_non_object_partition_is_treated_as_corrupt() {
        let store = store();
        store.storage().set_item("chat_sessions_image", "[1,2,3]").unwrap();

        assert!(store.get_session_list(PageType::ImageGen).is_empty());
        assert_eq!(raw_partition(&store, "chat_sessions_image.corrupt").as_deref(), Some("[1,2,3]"));
    }

    #[test]
    fn test_unreadable_entry_survives_writes_to_other_sessions() {
        let store = store();
        store
            .storage()
            .set_item("chat_sessions_text", r#"{"weird":{"id":"weird","createdAt":"not a date"}}"#)
            .unwrap();

        let id = store.create_new_session(PageType::TextChat, None).unwrap();

        let list = store.get_session_list(PageType::TextChat);
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, id);
        assert!(raw_partition(&store, "chat_sessions_text").unwrap().contains("not a date"));
        assert!(store.has_existing_session(PageType::TextChat, "weird"));
        assert!(store.load_session_messages(PageType::TextChat, "weird").is_empty());
    }
}
