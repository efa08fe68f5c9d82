use chrono::Utc;
use std::sync::Arc;
use tokio::sync::watch;

use talkdeck_types::{PageType, SidebarRefresh};

/// Observable "a session's messages changed" value.
///
/// Clones share one value. Views that list sessions subscribe and reload
/// when it changes.
#[derive(Debug, Clone)]
pub struct SidebarSignal {
    tx: Arc<watch::Sender<SidebarRefresh>>,
}

impl Default for SidebarSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl SidebarSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SidebarRefresh::default());
        Self { tx: Arc::new(tx) }
    }

    /// Record that `session_id` of `page_type` changed, stamped with the current time
    pub fn notify_message_update(&self, page_type: PageType, session_id: &str) {
        log::debug!("notify_message_update: {} {}", page_type, session_id);
        self.tx.send_replace(SidebarRefresh {
            time: Some(Utc::now().timestamp_millis()),
            page_type: Some(page_type),
            session_id: Some(session_id.to_string()),
        });
    }

    /// The latest value
    pub fn current(&self) -> SidebarRefresh {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SidebarRefresh> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_empty() {
        assert_eq!(SidebarSignal::new().current(), SidebarRefresh::default());
    }

    #[test]
    fn test_notify_replaces_value() {
        let signal = SidebarSignal::new();
        let before = Utc::now().timestamp_millis();

        signal.notify_message_update(PageType::TextChat, "s1");
        signal.notify_message_update(PageType::ImageGen, "s2");

        let current = signal.current();
        assert_eq!(current.page_type, Some(PageType::ImageGen));
        assert_eq!(current.session_id.as_deref(), Some("s2"));
        assert!(current.time.unwrap() >= before);
    }

    #[test]
    fn test_clones_share_state() {
        let signal = SidebarSignal::new();
        let other = signal.clone();
        other.notify_message_update(PageType::TextToAudio, "abc");
        assert_eq!(signal.current().session_id.as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_subscriber_sees_change() {
        let signal = SidebarSignal::new();
        let mut rx = signal.subscribe();

        let notifier = signal.clone();
        tokio::spawn(async move {
            notifier.notify_message_update(PageType::AudioToText, "late");
        });

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().session_id.as_deref(), Some("late"));
    }
}
