use std::collections::HashSet;

use plannr_shared::ChatMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Appended,
    /// History is still loading; appended once it lands.
    Buffered,
    /// A message with the same id is already shown or queued.
    Duplicate,
}

/// Ordered message list of the active conversation.
///
/// History replaces the list sorted by timestamp. Live pushes are appended
/// after it in arrival order; pushes that arrive while history is loading
/// are held back and drained right after the history lands.
#[derive(Debug)]
pub struct Timeline {
    chat_id: String,
    messages: Vec<ChatMessage>,
    buffered: Vec<ChatMessage>,
    seen: HashSet<String>,
    loading: bool,
    last_sent_id: Option<String>,
}

impl Timeline {
    pub fn new(chat_id: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            messages: Vec::new(),
            buffered: Vec::new(),
            seen: HashSet::new(),
            loading: false,
            last_sent_id: None,
        }
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last_sent_id(&self) -> Option<&str> {
        self.last_sent_id.as_deref()
    }

    pub fn begin_loading(&mut self) {
        self.loading = true;
    }

    /// Replace the list with fetched history and drain buffered pushes.
    /// Returns how many buffered pushes were appended.
    pub fn replace_history(&mut self, mut history: Vec<ChatMessage>) -> usize {
        // stable: equal timestamps keep server order
        history.sort_by_key(|m| m.timestamp);

        self.seen.clear();
        self.messages.clear();
        for msg in history {
            if let Some(id) = &msg.id {
                if !self.seen.insert(id.clone()) {
                    continue;
                }
            }
            self.messages.push(msg);
        }

        self.drain_buffer()
    }

    /// History fetch failed: keep what is shown and release buffered pushes.
    pub fn finish_without_history(&mut self) -> usize {
        self.drain_buffer()
    }

    pub fn push(&mut self, message: ChatMessage) -> PushOutcome {
        if self.loading {
            let queued = message
                .id
                .as_ref()
                .is_some_and(|id| self.buffered.iter().any(|m| m.id.as_ref() == Some(id)));
            if queued {
                return PushOutcome::Duplicate;
            }
            self.buffered.push(message);
            return PushOutcome::Buffered;
        }

        if self.append(message) {
            PushOutcome::Appended
        } else {
            PushOutcome::Duplicate
        }
    }

    /// Append a message returned by the HTTP send path and remember its id,
    /// so the broker echo of the same message is skipped.
    pub fn push_local_sent(&mut self, message: ChatMessage) -> bool {
        let id = message.id.clone();
        let appended = self.append(message);
        if id.is_some() {
            self.last_sent_id = id;
        }
        appended
    }

    fn append(&mut self, message: ChatMessage) -> bool {
        if let Some(id) = &message.id {
            if !self.seen.insert(id.clone()) {
                return false;
            }
        }
        self.messages.push(message);
        true
    }

    fn drain_buffer(&mut self) -> usize {
        self.loading = false;
        let mut appended = 0;
        for message in std::mem::take(&mut self.buffered) {
            if self.append(message) {
                appended += 1;
            }
        }
        appended
    }
}
