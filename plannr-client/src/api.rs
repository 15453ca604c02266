//! HTTP client for the venue platform API.
//!
//! Every call carries `Authorization: Bearer <token>` once a token is set.
//! Non-2xx answers become [`ClientError::Api`]; the chat and directory
//! traits see them as [`ServiceError`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;
use plannr_core::repository::{ChatService, UserDirectory};
use plannr_core::{ServiceError, ServiceResult};
use plannr_shared::{
    AuthResponse, BookingDetail, ChatMessage, Conversation, ConversationKind, MessageType, ServiceKind, User, Venue,
};
use plannr_store::app_config::ApiConfig;

use crate::error::{ClientError, ClientResult};

#[derive(Debug, Serialize)]
struct SignInRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ServiceRequest<'a> {
    service_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PostMessageRequest<'a> {
    chat_id: &'a str,
    sender_id: &'a str,
    content: &'a str,
    message_type: MessageType,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateChatRequest<'a> {
    participant_ids: &'a [String],
}

#[derive(Debug, Serialize)]
struct AskRequest<'a> {
    question: &'a str,
}

#[derive(Debug, Deserialize)]
struct AskResponse {
    answer: String,
}

pub struct PlannrApi {
    client: reqwest::Client,
    base_url: String,
    token: RwLock<Option<String>>,
}

impl PlannrApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> ClientResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Reuse an existing [`reqwest::Client`] for connection pooling.
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: RwLock::new(None),
        }
    }

    pub fn from_config(config: &ApiConfig) -> ClientResult<Self> {
        Self::new(config.base_url.clone(), Duration::from_secs(config.timeout_secs))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn set_token(&self, token: Option<String>) {
        *self.token.write().await = token;
    }

    pub async fn has_token(&self) -> bool {
        self.token.read().await.is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match self.token.read().await.as_deref() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    // ---- venues ----

    pub async fn search_venues(&self, location: &str, activity: &str) -> ClientResult<Vec<Venue>> {
        let response = self
            .request(Method::GET, "/api/venues/search")
            .await
            .query(&[("location", location), ("activity", activity)])
            .send()
            .await?;
        Self::parse_response(response).await
    }

    pub async fn all_venues(&self) -> ClientResult<Vec<Venue>> {
        let response = self.request(Method::GET, "/api/venues/all").await.send().await?;
        Self::parse_response(response).await
    }

    pub async fn booking(&self, booking_id: &str) -> ClientResult<BookingDetail> {
        let path = format!("/api/venues/bookings/{}", booking_id);
        let response = self.request(Method::GET, &path).await.send().await?;
        Self::parse_response(response).await
    }

    /// `POST /api/venues/bookings/{id}/add-{kind}`, returns the updated booking.
    pub async fn add_service(&self, booking_id: &str, kind: ServiceKind, service_id: &str) -> ClientResult<BookingDetail> {
        let path = format!("/api/venues/bookings/{}/add-{}", booking_id, kind.as_str());
        let response = self
            .request(Method::POST, &path)
            .await
            .json(&ServiceRequest { service_id })
            .send()
            .await?;
        Self::parse_response(response).await
    }

    pub async fn remove_service(&self, booking_id: &str, kind: ServiceKind, service_id: &str) -> ClientResult<BookingDetail> {
        let path = format!("/api/venues/bookings/{}/remove-{}", booking_id, kind.as_str());
        let response = self
            .request(Method::POST, &path)
            .await
            .json(&ServiceRequest { service_id })
            .send()
            .await?;
        Self::parse_response(response).await
    }

    // ---- auth ----

    pub async fn sign_in(&self, email: &str, password: &str) -> ClientResult<AuthResponse> {
        let response = self
            .request(Method::POST, "/api/auth/signin")
            .await
            .json(&SignInRequest { email, password })
            .send()
            .await?;
        Self::parse_response(response).await
    }

    pub async fn sign_up(&self, request: &SignUpRequest) -> ClientResult<AuthResponse> {
        let response = self
            .request(Method::POST, "/api/auth/signup")
            .await
            .json(request)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    pub async fn search_users_raw(&self, query: &str) -> ClientResult<Vec<User>> {
        let response = self
            .request(Method::GET, "/api/auth/users/search")
            .await
            .query(&[("query", query)])
            .send()
            .await?;
        Self::parse_response(response).await
    }

    pub async fn user(&self, user_id: &str) -> ClientResult<User> {
        let path = format!("/api/auth/users/{}", user_id);
        let response = self.request(Method::GET, &path).await.send().await?;
        Self::parse_response(response).await
    }

    // ---- chat ----

    pub async fn list_chats(&self, kind: ConversationKind, user_key: &str) -> ClientResult<Vec<Conversation>> {
        let path = format!("{}/user/{}", chat_root(kind), user_key);
        let response = self.request(Method::GET, &path).await.send().await?;
        let mut list: Vec<Conversation> = Self::parse_response(response).await?;
        for conv in list.iter_mut() {
            conv.kind = kind;
        }
        Ok(list)
    }

    pub async fn messages(&self, conversation: &Conversation) -> ClientResult<Vec<ChatMessage>> {
        let path = messages_path(conversation);
        let response = self.request(Method::GET, &path).await.send().await?;
        Self::parse_response(response).await
    }

    pub async fn send_message(&self, conversation: &Conversation, sender_id: &str, content: &str) -> ClientResult<ChatMessage> {
        let path = messages_path(conversation);
        let body = PostMessageRequest {
            chat_id: &conversation.id,
            sender_id,
            content,
            message_type: MessageType::Chat,
        };
        let response = self.request(Method::POST, &path).await.json(&body).send().await?;
        Self::parse_response(response).await
    }

    pub async fn create_individual_chat(&self, participant_ids: &[String]) -> ClientResult<Conversation> {
        let response = self
            .request(Method::POST, "/api/chat/create")
            .await
            .json(&CreateChatRequest { participant_ids })
            .send()
            .await?;
        let mut conv: Conversation = Self::parse_response(response).await?;
        conv.kind = ConversationKind::Individual;
        Ok(conv)
    }

    // ---- admin ----

    pub async fn pending_bookings(&self) -> ClientResult<Vec<BookingDetail>> {
        let response = self.request(Method::GET, "/api/admin/pending-bookings").await.send().await?;
        Self::parse_response(response).await
    }

    pub async fn approve_booking(&self, booking_id: &str) -> ClientResult<()> {
        let path = format!("/api/admin/bookings/{}/approve", booking_id);
        let response = self.request(Method::PUT, &path).await.send().await?;
        Self::check_status(response).await
    }

    pub async fn reject_booking(&self, booking_id: &str) -> ClientResult<()> {
        let path = format!("/api/admin/bookings/{}/reject", booking_id);
        let response = self.request(Method::PUT, &path).await.send().await?;
        Self::check_status(response).await
    }

    // ---- ask ----

    pub async fn ask(&self, question: &str) -> ClientResult<String> {
        let response = self
            .request(Method::POST, "/ask")
            .await
            .json(&AskRequest { question })
            .send()
            .await?;
        let answer: AskResponse = Self::parse_response(response).await?;
        Ok(answer.answer)
    }

    // ---- private helpers ----

    async fn ensure_success(response: reqwest::Response) -> ClientResult<reqwest::Response> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            debug!(status = status.as_u16(), body = %body, "API call rejected");
            return Err(ClientError::Api { status: status.as_u16(), body });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> ClientResult<T> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    async fn check_status(response: reqwest::Response) -> ClientResult<()> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}

fn chat_root(kind: ConversationKind) -> &'static str {
    match kind {
        ConversationKind::Individual => "/api/chat",
        ConversationKind::Group => "/api/groupchat",
    }
}

fn messages_path(conversation: &Conversation) -> String {
    format!("{}/{}/messages", chat_root(conversation.kind), conversation.id)
}

#[async_trait]
impl ChatService for PlannrApi {
    async fn individual_chats(&self, user_key: &str) -> ServiceResult<Vec<Conversation>> {
        Ok(self.list_chats(ConversationKind::Individual, user_key).await?)
    }

    async fn group_chats(&self, user_key: &str) -> ServiceResult<Vec<Conversation>> {
        Ok(self.list_chats(ConversationKind::Group, user_key).await?)
    }

    async fn history(&self, conversation: &Conversation) -> ServiceResult<Vec<ChatMessage>> {
        Ok(self.messages(conversation).await?)
    }

    async fn post_message(&self, conversation: &Conversation, sender_id: &str, content: &str) -> ServiceResult<ChatMessage> {
        Ok(self.send_message(conversation, sender_id, content).await?)
    }

    async fn create_chat(&self, participant_ids: &[String]) -> ServiceResult<Conversation> {
        Ok(self.create_individual_chat(participant_ids).await?)
    }
}

#[async_trait]
impl UserDirectory for PlannrApi {
    async fn search_users(&self, query: &str) -> ServiceResult<Vec<User>> {
        self.search_users_raw(query).await.map_err(ServiceError::from)
    }

    async fn get_user(&self, id: &str) -> ServiceResult<User> {
        self.user(id).await.map_err(ServiceError::from)
    }
}
