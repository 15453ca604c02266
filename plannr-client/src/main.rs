use std::time::Duration;

use anyhow::Context;
use plannr_client::{AdminPanel, SessionContext};
use plannr_shared::Notification;
use plannr_store::app_config::Config;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "plannr_client=debug,plannr_chat=debug,plannr_holds=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!(api = %config.api.base_url, ws = %config.transport.ws_url, "Starting PlannrAI client");

    let ctx = SessionContext::open(config.clone()).context("Failed to open session storage")?;
    let cancel = ctx.cancel_token();
    let _recorder = ctx.spawn_background();

    // Toasts
    let mut notifications = BroadcastStream::new(ctx.events().subscribe());
    let toast_cancel = cancel.child_token();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = toast_cancel.cancelled() => break,
                next = notifications.next() => match next {
                    Some(Ok(event)) => tracing::info!(target: "plannr_client::toast", "{}", event.summary()),
                    Some(Err(e)) => tracing::debug!(error = %e, "Notification stream lagged"),
                    None => break,
                },
            }
        }
    });

    match ctx.holds().restore().await {
        Ok(restored) => tracing::info!(holds = restored, "Hold timers restored"),
        Err(e) => {
            tracing::warn!(error = %e, "Could not restore holds");
            ctx.events().publish(Notification::InlineError { scope: "holds".into(), message: e.to_string() });
        }
    }

    let mut user = match ctx.restore().await {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!(error = %e, "Could not restore stored session");
            None
        }
    };
    if user.is_none() {
        if let (Ok(email), Ok(password)) = (std::env::var("PLANNR_EMAIL"), std::env::var("PLANNR_PASSWORD")) {
            match ctx.sign_in(&email, &password).await {
                Ok(u) => user = Some(u),
                Err(e) => tracing::warn!(error = %e, "Sign-in failed"),
            }
        }
    }

    match &user {
        Some(user) => {
            tracing::info!(user_id = %user.id, "Session active");

            let chat = ctx.chat().clone();
            let _connection = ctx.spawn_connection_loop();

            match chat.lock().await.list_conversations().await {
                Ok(list) => tracing::info!(conversations = list.len(), "Conversations loaded"),
                Err(e) => tracing::warn!(error = %e, "Could not load conversations"),
            }

            if user.is_admin() {
                let panel = AdminPanel::new(ctx.api().clone(), ctx.events().clone());
                panel.spawn_refresher(Duration::from_secs(config.admin.refresh_interval_secs), cancel.child_token());
            }
        }
        None => tracing::info!("No stored session; set PLANNR_EMAIL and PLANNR_PASSWORD to sign in"),
    }

    tokio::signal::ctrl_c().await.context("Failed to listen for ctrl-c")?;
    tracing::info!("Shutting down");
    ctx.shutdown().await;

    Ok(())
}
