use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use plannr_core::repository::{ChatService, Delivery, Transport, UserDirectory};
use plannr_core::ServiceError;
use plannr_shared::{
    ChatMessage, Conversation, ConversationKind, MessageType, Notification, OutgoingMessage, TokenClaims,
};
use plannr_store::app_config::{SendMode, TransportConfig};
use plannr_store::EventBus;

use crate::classify::{classify_message, Authorship};
use crate::dedupe::{self, pair_key, DuplicateFinding};
use crate::identity::CurrentUser;
use crate::names::NameCache;
use crate::session::{ConnectionState, TransportState};
use crate::timeline::{PushOutcome, Timeline};
use crate::ChatError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Published over the transport; the broker echo renders it.
    Published,
    /// Stored over HTTP and appended locally.
    Appended(ChatMessage),
    /// Realtime mode while disconnected.
    Skipped,
}

/// A timeline entry ready for display.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RenderedMessage {
    pub id: Option<String>,
    pub sender: String,
    pub authorship: Authorship,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub message_type: MessageType,
}

/// Owns conversation state for one signed-in session: the conversation
/// list, the active conversation and its timeline, and the single live
/// subscription.
pub struct ConversationSynchronizer {
    chats: Arc<dyn ChatService>,
    directory: Arc<dyn UserDirectory>,
    transport: Arc<dyn Transport>,
    transport_config: TransportConfig,
    send_mode: SendMode,
    events: EventBus,
    state: ConnectionState,
    me: Option<CurrentUser>,
    claims: Option<TokenClaims>,
    names: NameCache,
    conversations: Vec<Conversation>,
    active_conversation_id: Option<String>,
    timeline: Option<Timeline>,
}

impl ConversationSynchronizer {
    pub fn new(
        chats: Arc<dyn ChatService>,
        directory: Arc<dyn UserDirectory>,
        transport: Arc<dyn Transport>,
        transport_config: TransportConfig,
        send_mode: SendMode,
        events: EventBus,
    ) -> Self {
        Self {
            chats,
            directory,
            transport,
            transport_config,
            send_mode,
            events,
            state: ConnectionState::new(),
            me: None,
            claims: None,
            names: NameCache::new(),
            conversations: Vec::new(),
            active_conversation_id: None,
            timeline: None,
        }
    }

    pub fn state(&self) -> &TransportState {
        self.state.state()
    }

    pub fn current_user(&self) -> Option<&CurrentUser> {
        self.me.as_ref()
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn active_conversation_id(&self) -> Option<&str> {
        self.active_conversation_id.as_deref()
    }

    pub fn timeline(&self) -> Option<&Timeline> {
        self.timeline.as_ref()
    }

    pub fn names(&self) -> &NameCache {
        &self.names
    }

    /// Sign-in: attach the user and the decoded token claims.
    pub fn set_user(&mut self, me: CurrentUser, claims: Option<TokenClaims>) {
        self.me = Some(me);
        self.claims = claims;
    }

    /// Logout: drop everything tied to the previous user. The transport is
    /// left as is; call `disconnect` first.
    pub fn reset(&mut self) {
        self.me = None;
        self.claims = None;
        self.names.clear();
        self.conversations.clear();
        self.active_conversation_id = None;
        self.timeline = None;
    }

    fn report(&self, scope: &str, err: &ServiceError) {
        if err.is_auth_failure() {
            self.events.publish(Notification::AuthenticationRequired { reason: err.to_string() });
        }
        self.events.publish(Notification::InlineError { scope: scope.to_string(), message: err.to_string() });
    }

    fn find(&self, chat_id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == chat_id)
    }

    /// Open the transport session. On reconnect the active conversation is
    /// subscribed again.
    #[instrument(skip(self))]
    pub async fn connect(&mut self) -> Result<mpsc::UnboundedReceiver<Delivery>, ChatError> {
        self.state.begin_connect()?;

        let rx = match self.transport.connect().await {
            Ok(rx) => rx,
            Err(e) => {
                self.state.disconnected();
                self.report("transport", &e);
                return Err(e.into());
            }
        };
        self.state.connected()?;
        info!("Chat transport connected");

        if let Some(chat_id) = self.active_conversation_id.clone() {
            self.subscribe(&chat_id).await;
        }
        Ok(rx)
    }

    pub async fn disconnect(&mut self) -> Result<(), ChatError> {
        if let Ok(subscription_id) = self.state.unsubscribed() {
            if let Err(e) = self.transport.unsubscribe(&subscription_id).await {
                debug!(error = %e, "Unsubscribe during disconnect failed");
            }
        }
        let result = self.transport.disconnect().await;
        self.state.disconnected();
        result.map_err(ChatError::from)
    }

    /// The transport dropped on its own.
    pub fn mark_disconnected(&mut self) {
        if !matches!(self.state.state(), TransportState::Disconnected) {
            warn!("Chat transport lost");
        }
        self.state.disconnected();
    }

    /// Resolve the current user id if it is still unknown. `None` means
    /// every strategy came up empty and attribution falls back to email.
    pub async fn ensure_identity(&mut self) -> Result<Option<String>, ChatError> {
        let me = self.me.as_mut().ok_or(ChatError::NotAuthenticated)?;
        let id = me
            .ensure_resolved(self.directory.as_ref(), self.claims.as_ref(), &self.conversations)
            .await;
        Ok(id.map(str::to_string))
    }

    /// Fetch individual and group conversations, name them and surface
    /// duplicate individual conversations.
    #[instrument(skip(self))]
    pub async fn list_conversations(&mut self) -> Result<Vec<Conversation>, ChatError> {
        let me = self.me.as_ref().ok_or(ChatError::NotAuthenticated)?;
        let key = me.key().ok_or(ChatError::NotAuthenticated)?.to_string();

        let individual = match self.chats.individual_chats(&key).await {
            Ok(list) => list,
            Err(e) => {
                self.report("conversations", &e);
                return Err(e.into());
            }
        };
        let group = match self.chats.group_chats(&key).await {
            Ok(list) => list,
            Err(e) => {
                self.report("conversations", &e);
                return Err(e.into());
            }
        };

        let mut conversations = individual;
        for mut conv in group {
            conv.kind = ConversationKind::Group;
            conversations.push(conv);
        }

        if let Some(me) = self.me.as_mut() {
            me.ensure_resolved(self.directory.as_ref(), self.claims.as_ref(), &conversations)
                .await;
        }

        if let Some(me) = self.me.as_ref() {
            for conv in conversations.iter_mut() {
                let name = self
                    .names
                    .conversation_display_name(self.directory.as_ref(), me, conv)
                    .await;
                conv.display_name = Some(name);
            }
        }

        self.conversations = conversations;
        debug!(count = self.conversations.len(), "Conversations loaded");

        for finding in self.detect_duplicates() {
            warn!(pair = %finding.pair_key, ids = ?finding.conversation_ids, "Duplicate conversations");
            self.events.publish(Notification::DuplicateConversations {
                pair_key: finding.pair_key,
                conversation_ids: finding.conversation_ids,
            });
        }

        Ok(self.conversations.clone())
    }

    pub fn detect_duplicates(&self) -> Vec<DuplicateFinding> {
        dedupe::detect_duplicates(&self.conversations)
    }

    async fn subscribe(&mut self, chat_id: &str) {
        let topic = self.transport_config.topic_for(chat_id);
        let subscription_id = match self.transport.subscribe(&topic).await {
            Ok(id) => id,
            Err(e) => {
                self.report("subscription", &e);
                return;
            }
        };
        if let Err(e) = self.state.subscribed(chat_id.to_string(), subscription_id.clone()) {
            warn!(error = %e, chat_id = %chat_id, "Subscription rejected");
            let _ = self.transport.unsubscribe(&subscription_id).await;
            return;
        }
        debug!(chat_id = %chat_id, topic = %topic, "Subscribed");

        let Some(sender_id) = self.me.as_ref().and_then(|me| me.key()).map(str::to_string) else {
            return;
        };
        let join = OutgoingMessage {
            chat_id: chat_id.to_string(),
            sender_id,
            content: String::new(),
            message_type: MessageType::Join,
        };
        match serde_json::to_value(&join) {
            Ok(body) => {
                if let Err(e) = self.transport.publish(&self.transport_config.join_destination, &body).await {
                    debug!(error = %e, "Join announcement failed");
                }
            }
            Err(e) => debug!(error = %e, "Join payload not serializable"),
        }
    }

    /// Switch the active conversation. The previous subscription is always
    /// released before the new one is taken; history renders before any
    /// push received after subscribing.
    #[instrument(skip(self))]
    pub async fn open_conversation(&mut self, chat_id: &str) -> Result<(), ChatError> {
        let conversation = self
            .find(chat_id)
            .cloned()
            .ok_or_else(|| ChatError::UnknownConversation(chat_id.to_string()))?;

        if let Ok(previous) = self.state.unsubscribed() {
            if let Err(e) = self.transport.unsubscribe(&previous).await {
                debug!(error = %e, "Unsubscribe failed");
            }
        }

        let mut timeline = Timeline::new(chat_id);
        timeline.begin_loading();
        self.timeline = Some(timeline);

        if self.state.is_connected() {
            self.subscribe(chat_id).await;
        } else {
            debug!(chat_id = %chat_id, "Transport down, loading history only");
        }

        let history = self.chats.history(&conversation).await;
        self.active_conversation_id = Some(chat_id.to_string());

        match history {
            Ok(messages) => {
                let count = messages.len();
                if let Some(timeline) = self.timeline.as_mut() {
                    let drained = timeline.replace_history(messages);
                    debug!(chat_id = %chat_id, history = count, drained, "History rendered");
                }
                self.events.publish(Notification::ConversationOpened { chat_id: chat_id.to_string() });
                Ok(())
            }
            Err(e) => {
                if let Some(timeline) = self.timeline.as_mut() {
                    timeline.finish_without_history();
                }
                self.report("history", &e);
                Err(e.into())
            }
        }
    }

    #[instrument(skip(self, content))]
    pub async fn send_message(&mut self, chat_id: &str, content: &str) -> Result<SendOutcome, ChatError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if self.active_conversation_id.as_deref() != Some(chat_id) {
            return Err(ChatError::NotActive(chat_id.to_string()));
        }
        let sender_id = self
            .me
            .as_ref()
            .and_then(CurrentUser::key)
            .ok_or(ChatError::NotAuthenticated)?
            .to_string();

        match self.send_mode {
            SendMode::Realtime => {
                if !self.state.is_connected() {
                    warn!(chat_id = %chat_id, "Transport down, message not sent");
                    return Ok(SendOutcome::Skipped);
                }
                let outgoing = OutgoingMessage {
                    chat_id: chat_id.to_string(),
                    sender_id,
                    content: content.to_string(),
                    message_type: MessageType::Chat,
                };
                let body = serde_json::to_value(&outgoing)
                    .map_err(|e| ServiceError::Malformed(e.to_string()))?;
                if let Err(e) = self.transport.publish(&self.transport_config.send_destination, &body).await {
                    self.report("send", &e);
                    return Err(e.into());
                }
                self.events.publish(Notification::MessageSent { chat_id: chat_id.to_string() });
                Ok(SendOutcome::Published)
            }
            SendMode::Http => {
                let conversation = self
                    .find(chat_id)
                    .cloned()
                    .ok_or_else(|| ChatError::UnknownConversation(chat_id.to_string()))?;
                let stored = match self.chats.post_message(&conversation, &sender_id, content).await {
                    Ok(m) => m,
                    Err(e) => {
                        self.report("send", &e);
                        return Err(e.into());
                    }
                };
                if let Some(timeline) = self.timeline.as_mut() {
                    timeline.push_local_sent(stored.clone());
                }
                self.events.publish(Notification::MessageSent { chat_id: chat_id.to_string() });
                Ok(SendOutcome::Appended(stored))
            }
        }
    }

    /// Route a pushed frame into the active timeline. Frames for any other
    /// conversation are stale and dropped.
    pub fn handle_delivery(&mut self, delivery: &Delivery) -> Option<PushOutcome> {
        let message: ChatMessage = match serde_json::from_str(&delivery.body) {
            Ok(m) => m,
            Err(e) => {
                warn!(destination = %delivery.destination, error = %e, "Unreadable chat push");
                return None;
            }
        };

        let timeline = match self.timeline.as_mut() {
            Some(t) if t.chat_id() == message.chat_id => t,
            _ => {
                debug!(chat_id = %message.chat_id, "Dropping push for inactive conversation");
                return None;
            }
        };

        let message_id = message.id.clone();
        let chat_id = message.chat_id.clone();
        let from_self = self
            .me
            .as_ref()
            .is_some_and(|me| me.authored(message.sender_id.as_deref(), message.sender_email.as_deref()));

        let outcome = timeline.push(message);
        if outcome != PushOutcome::Duplicate {
            self.events.publish(Notification::MessageReceived { chat_id, message_id, from_self });
        }
        Some(outcome)
    }

    pub fn classify(&self, message: &ChatMessage) -> Authorship {
        let me = self.me.as_ref();
        classify_message(message, me.and_then(CurrentUser::id), me.and_then(CurrentUser::email))
    }

    pub async fn resolve_sender_display_name(&mut self, sender_id: Option<&str>, sender_email: Option<&str>) -> String {
        let me = self.me.clone().unwrap_or_default();
        self.names
            .sender_display_name(self.directory.as_ref(), &me, sender_id, sender_email)
            .await
    }

    /// Open the individual conversation with `other_user_id`, creating it
    /// only when none exists for the pair.
    #[instrument(skip(self))]
    pub async fn start_conversation(&mut self, other_user_id: &str) -> Result<Conversation, ChatError> {
        let my_id = self.ensure_identity().await?.ok_or(ChatError::NotAuthenticated)?;
        let wanted = pair_key(&my_id, other_user_id);

        let existing = self
            .conversations
            .iter()
            .find(|c| {
                c.kind == ConversationKind::Individual
                    && c.participant_ids.len() == 2
                    && pair_key(&c.participant_ids[0], &c.participant_ids[1]) == wanted
            })
            .cloned();

        let conversation = match existing {
            Some(conv) => conv,
            None => {
                let participants = vec![my_id, other_user_id.to_string()];
                let mut conv = match self.chats.create_chat(&participants).await {
                    Ok(c) => c,
                    Err(e) => {
                        self.report("conversations", &e);
                        return Err(e.into());
                    }
                };
                if let Some(me) = self.me.as_ref() {
                    let name = self
                        .names
                        .conversation_display_name(self.directory.as_ref(), me, &conv)
                        .await;
                    conv.display_name = Some(name);
                }
                info!(chat_id = %conv.id, "Conversation created");
                self.conversations.push(conv.clone());
                conv
            }
        };

        self.open_conversation(&conversation.id).await?;
        Ok(conversation)
    }

    /// Active timeline with sender labels and self/other attribution.
    pub async fn render_active(&mut self) -> Vec<RenderedMessage> {
        let messages = match &self.timeline {
            Some(t) => t.messages().to_vec(),
            None => return Vec::new(),
        };
        let me = self.me.clone().unwrap_or_default();

        let mut rendered = Vec::with_capacity(messages.len());
        for message in messages {
            let sender = self
                .names
                .sender_display_name(
                    self.directory.as_ref(),
                    &me,
                    message.sender_id.as_deref(),
                    message.sender_email.as_deref(),
                )
                .await;
            rendered.push(RenderedMessage {
                authorship: self.classify(&message),
                id: message.id,
                sender,
                content: message.content,
                timestamp: message.timestamp,
                message_type: message.message_type,
            });
        }
        rendered
    }
}

/// Feed transport pushes into the synchronizer until the connection drops
/// or `cancel` fires.
pub fn spawn_delivery_pump(
    sync: Arc<Mutex<ConversationSynchronizer>>,
    mut rx: mpsc::UnboundedReceiver<Delivery>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                delivery = rx.recv() => match delivery {
                    Some(delivery) => {
                        sync.lock().await.handle_delivery(&delivery);
                    }
                    None => {
                        sync.lock().await.mark_disconnected();
                        break;
                    }
                },
            }
        }
    })
}
