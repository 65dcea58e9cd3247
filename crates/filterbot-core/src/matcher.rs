//! Trigger lookup for ordinary chat messages.

use std::sync::Arc;

use crate::store::FilterStore;
use crate::types::{normalize_trigger, ChatId, Filter};

pub struct TriggerMatcher {
    store: Arc<FilterStore>,
}

impl TriggerMatcher {
    pub fn new(store: Arc<FilterStore>) -> Self {
        Self { store }
    }

    /// The filter whose trigger equals the whole normalized message, if any.
    /// Substrings never match.
    pub fn find(&self, chat: ChatId, text: &str) -> Option<Filter> {
        let trigger = normalize_trigger(text);
        if trigger.is_empty() {
            return None;
        }
        self.store.lookup(chat, &trigger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UserId;

    fn filter(trigger: &str) -> Filter {
        Filter {
            trigger: trigger.into(),
            image: None,
            buttons: Vec::new(),
            created_by: UserId(1),
            created_at: chrono::Utc::now(),
        }
    }

    async fn matcher_with(triggers: &[&str]) -> (TriggerMatcher, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FilterStore::open(dir.path().join("filters.json")).await);
        for trigger in triggers {
            store.insert_unique(ChatId(1), filter(trigger)).await.unwrap();
        }
        (TriggerMatcher::new(store), dir)
    }

    #[tokio::test]
    async fn test_exact_match_ignores_case_and_padding() {
        let (matcher, _dir) = matcher_with(&["good morning"]).await;
        assert!(matcher.find(ChatId(1), "  Good MORNING ").is_some());
    }

    #[tokio::test]
    async fn test_no_substring_match() {
        let (matcher, _dir) = matcher_with(&["hello"]).await;
        assert!(matcher.find(ChatId(1), "hello there").is_none());
        assert!(matcher.find(ChatId(1), "hell").is_none());
    }

    #[tokio::test]
    async fn test_filters_are_scoped_to_their_chat() {
        let (matcher, _dir) = matcher_with(&["hello"]).await;
        assert!(matcher.find(ChatId(2), "hello").is_none());
    }

    #[tokio::test]
    async fn test_blank_text_never_matches() {
        let (matcher, _dir) = matcher_with(&["hello"]).await;
        assert!(matcher.find(ChatId(1), "   ").is_none());
    }
}
