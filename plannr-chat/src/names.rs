use std::collections::{HashMap, HashSet};

use tracing::debug;
use plannr_core::repository::UserDirectory;
use plannr_shared::{Conversation, ConversationKind};

use crate::identity::CurrentUser;

pub const SELF_LABEL: &str = "You";

/// `User #1234` from the last four characters of an id.
pub fn placeholder_name(id: &str) -> String {
    let chars: Vec<char> = id.chars().collect();
    let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!("User #{}", tail)
}

/// Per-session participant id -> display name cache. Cleared on logout.
#[derive(Debug, Default)]
pub struct NameCache {
    names: HashMap<String, String>,
    /// Ids the directory could not resolve this session.
    misses: HashSet<String>,
}

impl NameCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    pub fn insert(&mut self, id: impl Into<String>, name: impl Into<String>) {
        self.names.insert(id.into(), name.into());
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn clear(&mut self) {
        self.names.clear();
        self.misses.clear();
    }

    /// Cached name, else a remote lookup (name, then email). Failed lookups
    /// are remembered and not retried.
    async fn lookup(&mut self, directory: &dyn UserDirectory, id: &str) -> Option<String> {
        if let Some(name) = self.names.get(id) {
            return Some(name.clone());
        }
        if self.misses.contains(id) {
            return None;
        }
        match directory.get_user(id).await {
            Ok(user) => {
                let name = user.display_name().to_string();
                self.names.insert(id.to_string(), name.clone());
                Some(name)
            }
            Err(e) => {
                debug!(user_id = %id, error = %e, "Participant lookup failed");
                self.misses.insert(id.to_string());
                None
            }
        }
    }

    /// Label for a message sender: "You", cache, remote lookup, the message's
    /// email, then the id placeholder.
    pub async fn sender_display_name(
        &mut self,
        directory: &dyn UserDirectory,
        me: &CurrentUser,
        sender_id: Option<&str>,
        sender_email: Option<&str>,
    ) -> String {
        if me.authored(sender_id, sender_email) {
            return SELF_LABEL.to_string();
        }

        let sender_id = sender_id.filter(|id| !id.is_empty());
        if let Some(id) = sender_id {
            if let Some(name) = self.lookup(directory, id).await {
                return name;
            }
        }

        if let Some(email) = sender_email.filter(|e| !e.is_empty()) {
            return email.to_string();
        }

        match sender_id {
            Some(id) => placeholder_name(id),
            None => "Unknown".to_string(),
        }
    }

    /// Group chats use their server name. Individual chats show the other
    /// participants, resolved through the cache.
    pub async fn conversation_display_name(
        &mut self,
        directory: &dyn UserDirectory,
        me: &CurrentUser,
        conversation: &Conversation,
    ) -> String {
        if conversation.kind == ConversationKind::Group {
            if let Some(name) = conversation.name.as_deref().filter(|n| !n.trim().is_empty()) {
                return name.to_string();
            }
        }

        let others: Vec<String> = conversation
            .participant_ids
            .iter()
            .filter(|p| !me.authored(Some(p.as_str()), None))
            .cloned()
            .collect();

        let mut labels = Vec::with_capacity(others.len());
        for id in &others {
            let label = match self.lookup(directory, id).await {
                Some(name) => name,
                None => placeholder_name(id),
            };
            labels.push(label);
        }

        if labels.is_empty() {
            SELF_LABEL.to_string()
        } else {
            labels.join(", ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use plannr_core::{ServiceError, ServiceResult};
    use plannr_shared::User;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Directory {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl UserDirectory for Directory {
        async fn search_users(&self, _query: &str) -> ServiceResult<Vec<User>> {
            Ok(vec![])
        }

        async fn get_user(&self, id: &str) -> ServiceResult<User> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match id {
                "u2" => Ok(User { id: "u2".into(), email: "bob@x.com".into(), name: Some("Bob".into()), role: None }),
                "u3" => Ok(User { id: "u3".into(), email: "carol@x.com".into(), name: None, role: None }),
                _ => Err(ServiceError::NotFound(id.to_string())),
            }
        }
    }

    fn me() -> CurrentUser {
        CurrentUser::from_user(&User { id: "u1".into(), email: "a@x.com".into(), name: None, role: None })
    }

    #[test]
    fn test_placeholder_uses_last_four_chars() {
        assert_eq!(placeholder_name("abcdef123456"), "User #3456");
        assert_eq!(placeholder_name("ab"), "User #ab");
    }

    #[tokio::test]
    async fn test_sender_name_chain() {
        let dir = Directory { calls: AtomicUsize::new(0) };
        let mut cache = NameCache::new();
        let me = me();

        assert_eq!(cache.sender_display_name(&dir, &me, Some("u1"), None).await, "You");
        assert_eq!(cache.sender_display_name(&dir, &me, Some("u2"), None).await, "Bob");
        assert_eq!(cache.sender_display_name(&dir, &me, Some("u3"), None).await, "carol@x.com");
        assert_eq!(
            cache.sender_display_name(&dir, &me, Some("ghost-9876"), Some("g@x.com")).await,
            "g@x.com"
        );
        assert_eq!(cache.sender_display_name(&dir, &me, Some("ghost-9876"), None).await, "User #9876");
    }

    #[tokio::test]
    async fn test_cache_avoids_repeat_lookups() {
        let dir = Directory { calls: AtomicUsize::new(0) };
        let mut cache = NameCache::new();
        let me = me();

        cache.sender_display_name(&dir, &me, Some("u2"), None).await;
        cache.sender_display_name(&dir, &me, Some("u2"), None).await;
        assert_eq!(dir.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get("u2"), Some("Bob"));
    }

    #[tokio::test]
    async fn test_conversation_names() {
        let dir = Directory { calls: AtomicUsize::new(0) };
        let mut cache = NameCache::new();
        let me = me();

        let chat = Conversation::individual("c1", "u1", "u2");
        assert_eq!(cache.conversation_display_name(&dir, &me, &chat).await, "Bob");

        let group = Conversation::group("g1", "Wedding crew", vec!["u1".into(), "u2".into(), "u3".into()]);
        assert_eq!(cache.conversation_display_name(&dir, &me, &group).await, "Wedding crew");

        let unnamed = Conversation { name: None, ..group };
        assert_eq!(cache.conversation_display_name(&dir, &me, &unnamed).await, "Bob, carol@x.com");
    }

    #[tokio::test]
    async fn test_failed_lookups_are_not_retried() {
        let dir = Directory { calls: AtomicUsize::new(0) };
        let mut cache = NameCache::new();
        let me = me();

        for _ in 0..3 {
            assert_eq!(cache.sender_display_name(&dir, &me, Some("ghost-9876"), None).await, "User #9876");
        }
        assert_eq!(dir.calls.load(Ordering::SeqCst), 1);
        assert!(cache.is_empty());

        cache.clear();
        cache.sender_display_name(&dir, &me, Some("ghost-9876"), None).await;
        assert_eq!(dir.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_id_differing_in_case_is_not_you() {
        let dir = Directory { calls: AtomicUsize::new(0) };
        let mut cache = NameCache::new();
        let me = CurrentUser::from_user(&User { id: "AbC123".into(), email: "a@x.com".into(), name: None, role: None });

        assert_eq!(cache.sender_display_name(&dir, &me, Some("AbC123"), None).await, "You");
        assert_eq!(cache.sender_display_name(&dir, &me, Some("abc123"), None).await, "User #c123");
    }
}
