use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use plannr_chat::{ConversationSynchronizer, CurrentUser};
use plannr_core::clock::{Clock, SystemClock};
use plannr_core::repository::KeyValueStore;
use plannr_holds::{HoldManager, HoldScheduler};
use plannr_shared::{AuthResponse, Notification, User};
use plannr_store::app_config::Config;
use plannr_store::{activity, EventBus, FormDrafts, LocalStorage, RecentActivity, SessionStore};

use crate::api::{PlannrApi, SignUpRequest};
use crate::auth;
use crate::reconnect::{run_connection_loop, ReconnectConfig};
use crate::error::ClientResult;
use crate::transport::StompTransport;

/// Everything one signed-in session owns. Built at start-up, reset at
/// logout.
pub struct SessionContext {
    config: Config,
    api: Arc<PlannrApi>,
    transport: Arc<StompTransport>,
    store: SessionStore,
    events: EventBus,
    clock: Arc<dyn Clock>,
    holds: Arc<HoldScheduler>,
    chat: Arc<Mutex<ConversationSynchronizer>>,
    activity: RecentActivity,
    drafts: FormDrafts,
    user: RwLock<Option<User>>,
    cancel: CancellationToken,
    /// Stops the chat connection loop; cancelled at logout.
    connection: StdMutex<Option<CancellationToken>>,
}

impl SessionContext {
    pub fn new(config: Config, storage: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> ClientResult<Self> {
        let api = Arc::new(PlannrApi::from_config(&config.api)?);
        let transport = Arc::new(StompTransport::new(config.transport.clone()));
        let store = SessionStore::new(storage);
        let events = EventBus::new();

        let manager = HoldManager::new(
            Arc::new(store.holds()),
            clock.clone(),
            config.holds.hold_duration(),
            events.clone(),
        );
        let holds = HoldScheduler::new(Arc::new(Mutex::new(manager)), config.holds.tick_interval(), events.clone());

        let chat = ConversationSynchronizer::new(
            api.clone(),
            api.clone(),
            transport.clone(),
            config.transport.clone(),
            config.chat.send_mode,
            events.clone(),
        );

        Ok(Self {
            activity: RecentActivity::new(store.clone(), config.storage.recent_activity_limit),
            drafts: FormDrafts::new(store.clone()),
            config,
            api,
            transport,
            store,
            events,
            clock,
            holds,
            chat: Arc::new(Mutex::new(chat)),
            user: RwLock::new(None),
            cancel: CancellationToken::new(),
            connection: StdMutex::new(None),
        })
    }

    /// File-backed storage at `storage.path` and the system clock.
    pub fn open(config: Config) -> ClientResult<Self> {
        let storage = Arc::new(LocalStorage::open(&config.storage.path)?);
        Self::new(config, storage, Arc::new(SystemClock))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn api(&self) -> &Arc<PlannrApi> {
        &self.api
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn holds(&self) -> &Arc<HoldScheduler> {
        &self.holds
    }

    pub fn chat(&self) -> &Arc<Mutex<ConversationSynchronizer>> {
        &self.chat
    }

    pub fn activity(&self) -> &RecentActivity {
        &self.activity
    }

    pub fn drafts(&self) -> &FormDrafts {
        &self.drafts
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn current_user(&self) -> Option<User> {
        self.user.read().await.clone()
    }

    /// Start background tasks that live as long as the session.
    pub fn spawn_background(&self) -> tokio::task::JoinHandle<()> {
        activity::spawn_recorder(&self.events, self.activity.clone(), self.cancel.child_token())
    }

    /// Keep the chat transport connected until logout or shutdown. A loop
    /// that is already running is stopped first.
    pub fn spawn_connection_loop(&self) -> JoinHandle<()> {
        let token = self.cancel.child_token();
        let previous = self
            .connection
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(token.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }

        let reconnect = ReconnectConfig::from_transport(&self.config.transport);
        tokio::spawn(run_connection_loop(self.chat.clone(), reconnect, token))
    }

    fn stop_connection_loop(&self) {
        let token = self.connection.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(token) = token {
            token.cancel();
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> ClientResult<User> {
        let response = match self.api.sign_in(email, password).await {
            Ok(r) => r,
            Err(e) => {
                self.events.publish(Notification::InlineError { scope: "auth".into(), message: e.to_string() });
                return Err(e);
            }
        };
        self.establish(response).await
    }

    pub async fn sign_up(&self, request: &SignUpRequest) -> ClientResult<User> {
        let response = self.api.sign_up(request).await?;
        self.establish(response).await
    }

    /// Pick up the session persisted by a previous run. An expired token is
    /// cleared and reported as `AuthenticationRequired`.
    pub async fn restore(&self) -> ClientResult<Option<User>> {
        let (Some(token), Some(user)) = (self.store.auth_token()?, self.store.user()?) else {
            return Ok(None);
        };

        let claims = auth::decode_claims(&token).ok();
        if claims.as_ref().is_some_and(|c| auth::is_expired(c, self.clock.now())) {
            info!(user_id = %user.id, "Stored session expired");
            self.store.clear_auth()?;
            self.events.publish(Notification::AuthenticationRequired { reason: "Session expired".into() });
            return Ok(None);
        }

        self.activate(token, user.clone(), claims).await;
        Ok(Some(user))
    }

    pub async fn logout(&self) -> ClientResult<()> {
        self.stop_connection_loop();
        {
            let mut chat = self.chat.lock().await;
            if let Err(e) = chat.disconnect().await {
                warn!(error = %e, "Disconnect during logout failed");
            }
            chat.reset();
        }
        self.holds.manager().lock().await.discard_pending();
        self.api.set_token(None).await;
        self.transport.set_token(None).await;
        self.store.clear_auth()?;
        *self.user.write().await = None;
        info!("Signed out");
        Ok(())
    }

    /// Stop timers and background tasks. Holds stay persisted.
    pub async fn shutdown(&self) {
        self.holds.shutdown();
        if let Err(e) = self.chat.lock().await.disconnect().await {
            warn!(error = %e, "Chat disconnect on shutdown failed");
        }
        self.cancel.cancel();
    }

    async fn establish(&self, response: AuthResponse) -> ClientResult<User> {
        let token = response.token.into_inner();
        let user = response.user;
        self.store.save_auth(&token, &user)?;

        let claims = match auth::decode_claims(&token) {
            Ok(claims) => Some(claims),
            Err(e) => {
                warn!(error = %e, "Token claims unreadable");
                None
            }
        };
        self.activate(token, user.clone(), claims).await;
        info!(user_id = %user.id, "Signed in");

        if let Err(e) = self.holds.resume_pending(&user).await {
            warn!(error = %e, "Could not resume pending hold after sign-in");
            self.events.publish(Notification::InlineError { scope: "holds".into(), message: e.to_string() });
        }
        Ok(user)
    }

    async fn activate(&self, token: String, user: User, claims: Option<plannr_shared::TokenClaims>) {
        self.api.set_token(Some(token.clone())).await;
        self.transport.set_token(Some(token)).await;
        self.chat.lock().await.set_user(CurrentUser::from_user(&user), claims);
        *self.user.write().await = Some(user);
    }
}
