use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::mpsc;
use plannr_chat::{
    Authorship, ChatError, ConversationSynchronizer, CurrentUser, PushOutcome, SendOutcome, TransportState,
};
use plannr_core::repository::{ChatService, Delivery, Transport, UserDirectory};
use plannr_core::{ServiceError, ServiceResult};
use plannr_shared::{ChatMessage, Conversation, Notification, User};
use plannr_store::app_config::{Config, SendMode};
use plannr_store::EventBus;

fn message(id: &str, chat: &str, sender: &str, secs: i64) -> ChatMessage {
    ChatMessage {
        id: Some(id.into()),
        chat_id: chat.into(),
        sender_id: Some(sender.into()),
        sender_email: None,
        content: format!("text {}", id),
        timestamp: Utc.timestamp_opt(1_751_000_000 + secs, 0).unwrap(),
        message_type: Default::default(),
    }
}

#[derive(Default)]
struct FakeChats {
    individual: Vec<Conversation>,
    group: Vec<Conversation>,
    history: Vec<ChatMessage>,
    created: StdMutex<Vec<Vec<String>>>,
    fail_history: bool,
}

#[async_trait]
impl ChatService for FakeChats {
    async fn individual_chats(&self, _user_key: &str) -> ServiceResult<Vec<Conversation>> {
        Ok(self.individual.clone())
    }

    async fn group_chats(&self, _user_key: &str) -> ServiceResult<Vec<Conversation>> {
        Ok(self.group.clone())
    }

    async fn history(&self, conversation: &Conversation) -> ServiceResult<Vec<ChatMessage>> {
        if self.fail_history {
            return Err(ServiceError::Network("503".into()));
        }
        Ok(self.history.iter().filter(|m| m.chat_id == conversation.id).cloned().collect())
    }

    async fn post_message(&self, conversation: &Conversation, sender_id: &str, content: &str) -> ServiceResult<ChatMessage> {
        let mut m = message("posted", &conversation.id, sender_id, 100);
        m.content = content.to_string();
        Ok(m)
    }

    async fn create_chat(&self, participant_ids: &[String]) -> ServiceResult<Conversation> {
        self.created.lock().unwrap().push(participant_ids.to_vec());
        Ok(Conversation::individual("new-chat", participant_ids[0].clone(), participant_ids[1].clone()))
    }
}

struct FakeDirectory;

#[async_trait]
impl UserDirectory for FakeDirectory {
    async fn search_users(&self, query: &str) -> ServiceResult<Vec<User>> {
        if query == "me@x.com" {
            Ok(vec![User { id: "u1".into(), email: "me@x.com".into(), name: None, role: None }])
        } else {
            Ok(vec![])
        }
    }

    async fn get_user(&self, id: &str) -> ServiceResult<User> {
        Ok(User { id: id.into(), email: format!("{}@x.com", id), name: Some(id.to_uppercase()), role: None })
    }
}

#[derive(Default)]
struct FakeTransport {
    log: StdMutex<Vec<String>>,
    pushes: StdMutex<Option<mpsc::UnboundedSender<Delivery>>>,
}

impl FakeTransport {
    fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn push(&self, body: &ChatMessage) {
        let delivery = Delivery {
            destination: format!("/topic/chat/{}", body.chat_id),
            subscription_id: None,
            body: serde_json::to_string(body).unwrap(),
        };
        if let Some(tx) = self.pushes.lock().unwrap().as_ref() {
            tx.send(delivery).unwrap();
        }
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn connect(&self) -> ServiceResult<mpsc::UnboundedReceiver<Delivery>> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.pushes.lock().unwrap() = Some(tx);
        self.log.lock().unwrap().push("connect".into());
        Ok(rx)
    }

    async fn subscribe(&self, destination: &str) -> ServiceResult<String> {
        let mut log = self.log.lock().unwrap();
        let id = format!("sub-{}", log.len());
        log.push(format!("subscribe {}", destination));
        Ok(id)
    }

    async fn unsubscribe(&self, subscription_id: &str) -> ServiceResult<()> {
        self.log.lock().unwrap().push(format!("unsubscribe {}", subscription_id));
        Ok(())
    }

    async fn publish(&self, destination: &str, body: &serde_json::Value) -> ServiceResult<()> {
        self.log.lock().unwrap().push(format!("publish {} {}", destination, body["messageType"]));
        Ok(())
    }

    async fn disconnect(&self) -> ServiceResult<()> {
        self.log.lock().unwrap().push("disconnect".into());
        Ok(())
    }
}

fn synchronizer(chats: FakeChats, transport: Arc<FakeTransport>, mode: SendMode) -> (ConversationSynchronizer, EventBus) {
    let config = Config::builtin().unwrap();
    let events = EventBus::new();
    let mut sync = ConversationSynchronizer::new(
        Arc::new(chats),
        Arc::new(FakeDirectory),
        transport,
        config.transport,
        mode,
        events.clone(),
    );
    sync.set_user(CurrentUser::from_email("me@x.com"), None);
    (sync, events)
}

#[tokio::test]
async fn test_duplicate_pair_is_reported_once() {
    let chats = FakeChats {
        individual: vec![Conversation::individual("c1", "A", "B"), Conversation::individual("c2", "B", "A")],
        ..Default::default()
    };
    let (mut sync, events) = synchronizer(chats, Arc::new(FakeTransport::default()), SendMode::Realtime);
    let mut rx = events.subscribe();

    sync.list_conversations().await.unwrap();

    let findings = sync.detect_duplicates();
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].pair_key, "A,B");
    assert_eq!(findings[0].conversation_ids, vec!["c1", "c2"]);

    let mut duplicates = 0;
    while let Ok(event) = rx.try_recv() {
        if matches!(event, Notification::DuplicateConversations { .. }) {
            duplicates += 1;
        }
    }
    assert_eq!(duplicates, 1);
}

#[tokio::test]
async fn test_listing_resolves_identity_and_names() {
    let chats = FakeChats {
        individual: vec![Conversation::individual("c1", "u1", "u2")],
        group: vec![Conversation::group("g1", "Planning", vec!["u1".into(), "u3".into()])],
        ..Default::default()
    };
    let (mut sync, _events) = synchronizer(chats, Arc::new(FakeTransport::default()), SendMode::Realtime);

    let list = sync.list_conversations().await.unwrap();
    assert_eq!(sync.current_user().and_then(CurrentUser::id), Some("u1"));
    assert_eq!(list[0].display_name.as_deref(), Some("U2"));
    assert_eq!(list[1].display_name.as_deref(), Some("Planning"));
}

#[tokio::test]
async fn test_switching_keeps_a_single_subscription() {
    let chats = FakeChats {
        individual: vec![Conversation::individual("c1", "u1", "u2"), Conversation::individual("c2", "u1", "u3")],
        ..Default::default()
    };
    let transport = Arc::new(FakeTransport::default());
    let (mut sync, _events) = synchronizer(chats, transport.clone(), SendMode::Realtime);

    sync.list_conversations().await.unwrap();
    let _rx = sync.connect().await.unwrap();
    sync.open_conversation("c1").await.unwrap();
    sync.open_conversation("c2").await.unwrap();

    assert_eq!(
        transport.log(),
        vec![
            "connect",
            "subscribe /topic/chat/c1",
            "publish /app/joinChat \"JOIN\"",
            "unsubscribe sub-1",
            "subscribe /topic/chat/c2",
            "publish /app/joinChat \"JOIN\"",
        ]
    );
    assert!(matches!(sync.state(), TransportState::Subscribed { chat_id, .. } if chat_id == "c2"));
    assert_eq!(sync.active_conversation_id(), Some("c2"));
}

#[tokio::test]
async fn test_history_then_pushes_in_order() {
    let chats = FakeChats {
        individual: vec![Conversation::individual("c1", "u1", "u2"), Conversation::individual("c2", "u1", "u3")],
        history: vec![message("m2", "c1", "u2", 20), message("m1", "c1", "u1", 10)],
        ..Default::default()
    };
    let transport = Arc::new(FakeTransport::default());
    let (mut sync, _events) = synchronizer(chats, transport.clone(), SendMode::Realtime);

    sync.list_conversations().await.unwrap();
    let mut rx = sync.connect().await.unwrap();
    sync.open_conversation("c1").await.unwrap();

    transport.push(&message("m3", "c1", "u2", 5));
    transport.push(&message("m2", "c1", "u2", 20));
    transport.push(&message("x1", "c2", "u3", 30));

    let mut outcomes = Vec::new();
    for _ in 0..3 {
        let delivery = rx.recv().await.unwrap();
        outcomes.push(sync.handle_delivery(&delivery));
    }
    assert_eq!(outcomes, vec![Some(PushOutcome::Appended), Some(PushOutcome::Duplicate), None]);

    let rendered = sync.render_active().await;
    let ids: Vec<_> = rendered.iter().filter_map(|m| m.id.as_deref()).collect();
    assert_eq!(ids, vec!["m1", "m2", "m3"]);
    assert_eq!(rendered[0].sender, "You");
    assert_eq!(rendered[0].authorship, Authorship::SelfAuthored);
    assert_eq!(rendered[1].sender, "U2");
    assert_eq!(rendered[1].authorship, Authorship::Other);
}

#[tokio::test]
async fn test_disconnected_still_loads_history() {
    let chats = FakeChats {
        individual: vec![Conversation::individual("c1", "u1", "u2")],
        history: vec![message("m1", "c1", "u2", 1)],
        ..Default::default()
    };
    let transport = Arc::new(FakeTransport::default());
    let (mut sync, _events) = synchronizer(chats, transport.clone(), SendMode::Realtime);

    sync.list_conversations().await.unwrap();
    sync.open_conversation("c1").await.unwrap();

    assert!(transport.log().is_empty());
    assert_eq!(sync.timeline().unwrap().messages().len(), 1);
    assert_eq!(sync.send_message("c1", "hello").await.unwrap(), SendOutcome::Skipped);
}

#[tokio::test]
async fn test_send_guards() {
    let chats = FakeChats {
        individual: vec![Conversation::individual("c1", "u1", "u2"), Conversation::individual("c2", "u1", "u3")],
        ..Default::default()
    };
    let transport = Arc::new(FakeTransport::default());
    let (mut sync, _events) = synchronizer(chats, transport.clone(), SendMode::Realtime);

    sync.list_conversations().await.unwrap();
    let _rx = sync.connect().await.unwrap();
    sync.open_conversation("c1").await.unwrap();

    assert!(matches!(sync.send_message("c1", "   ").await, Err(ChatError::EmptyMessage)));
    assert!(matches!(sync.send_message("c2", "hi").await, Err(ChatError::NotActive(id)) if id == "c2"));
    assert_eq!(sync.send_message("c1", " hi ").await.unwrap(), SendOutcome::Published);
    assert_eq!(transport.log().last().map(String::as_str), Some("publish /app/sendMessage \"CHAT\""));

    sync.reset();
    assert!(matches!(sync.send_message("c1", "hi").await, Err(ChatError::NotActive(_))));
}

#[tokio::test]
async fn test_http_send_skips_broker_echo() {
    let chats = FakeChats {
        individual: vec![Conversation::individual("c1", "u1", "u2")],
        ..Default::default()
    };
    let transport = Arc::new(FakeTransport::default());
    let (mut sync, _events) = synchronizer(chats, transport.clone(), SendMode::Http);

    sync.list_conversations().await.unwrap();
    let mut rx = sync.connect().await.unwrap();
    sync.open_conversation("c1").await.unwrap();

    let outcome = sync.send_message("c1", "booked!").await.unwrap();
    let SendOutcome::Appended(stored) = outcome else {
        panic!("expected appended message");
    };
    assert_eq!(stored.content, "booked!");

    transport.push(&stored);
    let delivery = rx.recv().await.unwrap();
    assert_eq!(sync.handle_delivery(&delivery), Some(PushOutcome::Duplicate));
    assert_eq!(sync.timeline().unwrap().messages().len(), 1);
    assert_eq!(sync.timeline().unwrap().last_sent_id(), Some("posted"));
}

#[tokio::test]
async fn test_history_failure_surfaces_inline_error() {
    let chats = FakeChats {
        individual: vec![Conversation::individual("c1", "u1", "u2")],
        fail_history: true,
        ..Default::default()
    };
    let (mut sync, events) = synchronizer(chats, Arc::new(FakeTransport::default()), SendMode::Realtime);
    let mut rx = events.subscribe();

    sync.list_conversations().await.unwrap();
    let err = sync.open_conversation("c1").await.unwrap_err();
    assert!(matches!(err, ChatError::Service(ServiceError::Network(_))));

    let mut saw_inline = false;
    while let Ok(event) = rx.try_recv() {
        if let Notification::InlineError { scope, .. } = event {
            saw_inline = scope == "history";
        }
    }
    assert!(saw_inline);
    assert_eq!(sync.active_conversation_id(), Some("c1"));
}

#[tokio::test]
async fn test_start_conversation_reuses_existing_pair() {
    let chats = Arc::new(FakeChats {
        individual: vec![Conversation::individual("c1", "u2", "u1")],
        ..Default::default()
    });
    let config = Config::builtin().unwrap();
    let mut sync = ConversationSynchronizer::new(
        chats.clone(),
        Arc::new(FakeDirectory),
        Arc::new(FakeTransport::default()),
        config.transport,
        SendMode::Realtime,
        EventBus::new(),
    );
    sync.set_user(CurrentUser::from_email("me@x.com"), None);
    sync.list_conversations().await.unwrap();

    let existing = sync.start_conversation("u2").await.unwrap();
    assert_eq!(existing.id, "c1");

    let created = sync.start_conversation("u9").await.unwrap();
    assert_eq!(created.id, "new-chat");
    assert_eq!(chats.created.lock().unwrap().as_slice(), &[vec!["u1".to_string(), "u9".to_string()]]);
    assert_eq!(sync.active_conversation_id(), Some("new-chat"));
    assert_eq!(sync.conversations().len(), 2);
}
