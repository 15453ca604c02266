//! Live chat transport: STOMP over a SockJS websocket.
//!
//! [`StompTransport::connect`] performs the SockJS open and STOMP CONNECT
//! handshake, then splits the socket into a writer task (outgoing frames
//! plus heart-beats) and a reader task that turns MESSAGE frames into
//! [`Delivery`] values. The delivery channel closes when the socket does.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use plannr_core::repository::{Delivery, Transport};
use plannr_core::ServiceResult;
use plannr_store::app_config::TransportConfig;

use crate::error::{ClientError, ClientResult};
use crate::sockjs::{self, SockJsFrame};
use crate::stomp::{Command, Frame};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

struct Connection {
    outgoing: mpsc::UnboundedSender<String>,
    subscriptions: HashMap<String, String>,
    cancel: CancellationToken,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

pub struct StompTransport {
    config: TransportConfig,
    token: RwLock<Option<String>>,
    connection: Mutex<Option<Connection>>,
    next_id: AtomicU64,
}

impl StompTransport {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            token: RwLock::new(None),
            connection: Mutex::new(None),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Bearer token forwarded in the CONNECT frame.
    pub async fn set_token(&self, token: Option<String>) {
        *self.token.write().await = token;
    }

    pub async fn is_connected(&self) -> bool {
        self.connection
            .lock()
            .await
            .as_ref()
            .is_some_and(|c| !c.outgoing.is_closed())
    }

    async fn open(&self) -> ClientResult<mpsc::UnboundedReceiver<Delivery>> {
        let url = sockjs::websocket_url(&self.config.ws_url);
        let (ws, _response) = connect_async(&url).await?;
        let (mut sink, mut stream) = ws.split();

        let token = self.token.read().await.clone();
        tokio::time::timeout(HANDSHAKE_TIMEOUT, handshake(&mut sink, &mut stream, &self.config, token.as_deref()))
            .await
            .map_err(|_| ClientError::Protocol("STOMP handshake timed out".into()))??;
        info!(url = %url, "Connected to chat broker");

        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let (deliveries_tx, deliveries_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let heartbeat = (self.config.heartbeat_ms > 0).then(|| Duration::from_millis(self.config.heartbeat_ms));
        let writer = tokio::spawn(write_loop(sink, outgoing_rx, heartbeat, cancel.clone()));
        let reader = tokio::spawn(read_loop(stream, deliveries_tx, cancel.clone()));

        let previous = self.connection.lock().await.replace(Connection {
            outgoing: outgoing_tx,
            subscriptions: HashMap::new(),
            cancel,
            reader,
            writer,
        });
        if let Some(old) = previous {
            old.cancel.cancel();
        }

        Ok(deliveries_rx)
    }

    async fn send_frame(&self, frame: Frame) -> ClientResult<()> {
        let guard = self.connection.lock().await;
        let conn = guard.as_ref().ok_or(ClientError::NotConnected)?;
        conn.outgoing.send(frame.encode()).map_err(|_| ClientError::NotConnected)
    }

    async fn add_subscription(&self, destination: &str) -> ClientResult<String> {
        let id = format!("sub-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut guard = self.connection.lock().await;
        let conn = guard.as_mut().ok_or(ClientError::NotConnected)?;
        conn.outgoing
            .send(Frame::subscribe(&id, destination).encode())
            .map_err(|_| ClientError::NotConnected)?;
        conn.subscriptions.insert(id.clone(), destination.to_string());
        debug!(subscription = %id, destination = %destination, "STOMP subscribe");
        Ok(id)
    }

    async fn remove_subscription(&self, id: &str) -> ClientResult<()> {
        let mut guard = self.connection.lock().await;
        let conn = guard.as_mut().ok_or(ClientError::NotConnected)?;
        if conn.subscriptions.remove(id).is_none() {
            debug!(subscription = %id, "Unknown subscription id");
        }
        conn.outgoing
            .send(Frame::unsubscribe(id).encode())
            .map_err(|_| ClientError::NotConnected)
    }

    async fn close(&self) -> ClientResult<()> {
        let Some(conn) = self.connection.lock().await.take() else {
            return Ok(());
        };
        let receipt = format!("disconnect-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        let _ = conn.outgoing.send(Frame::disconnect(&receipt).encode());
        // writer drains queued frames once the sender is gone
        drop(conn.outgoing);
        if let Err(e) = conn.writer.await {
            warn!(error = %e, "Writer task failed");
        }
        conn.cancel.cancel();
        if let Err(e) = conn.reader.await {
            warn!(error = %e, "Reader task failed");
        }
        info!("Disconnected from chat broker");
        Ok(())
    }
}

async fn handshake(
    sink: &mut SplitSink<WsStream, Message>,
    stream: &mut SplitStream<WsStream>,
    config: &TransportConfig,
    token: Option<&str>,
) -> ClientResult<()> {
    let first = next_text(stream).await?;
    if sockjs::parse(&first)? != SockJsFrame::Open {
        return Err(ClientError::Protocol(format!("Expected SockJS open frame, got {}", first)));
    }

    let host = host_of(&config.ws_url);
    let connect = Frame::connect(&host, config.heartbeat_ms, token).encode();
    sink.send(Message::Text(sockjs::encode(&[connect]))).await?;

    loop {
        let text = next_text(stream).await?;
        match sockjs::parse(&text)? {
            SockJsFrame::Open | SockJsFrame::Heartbeat => continue,
            SockJsFrame::Close { code, reason } => {
                return Err(ClientError::Protocol(format!("Closed during handshake ({}): {}", code, reason)));
            }
            SockJsFrame::Messages(messages) => {
                for raw in messages {
                    match Frame::parse(&raw)? {
                        Some(frame) if frame.command == Command::Connected => {
                            debug!(version = ?frame.get("version"), "STOMP connected");
                            return Ok(());
                        }
                        Some(frame) if frame.command == Command::Error => {
                            let message = frame.get("message").unwrap_or("broker refused connection");
                            return Err(ClientError::Protocol(message.to_string()));
                        }
                        _ => {}
                    }
                }
            }
        }
    }
}

async fn next_text(stream: &mut SplitStream<WsStream>) -> ClientResult<String> {
    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => return Ok(text),
            Some(Ok(Message::Close(_))) | None => return Err(ClientError::NotConnected),
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
        }
    }
}

fn host_of(url: &str) -> String {
    let without_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    without_scheme.split(['/', ':']).next().unwrap_or_default().to_string()
}

async fn write_loop(
    mut sink: SplitSink<WsStream, Message>,
    mut outgoing: mpsc::UnboundedReceiver<String>,
    heartbeat: Option<Duration>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(heartbeat.unwrap_or(Duration::from_secs(3600)));
    ticker.tick().await;

    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break,
            frame = outgoing.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
            _ = ticker.tick(), if heartbeat.is_some() => "\n".to_string(),
        };
        if let Err(e) = sink.send(Message::Text(sockjs::encode(&[frame]))).await {
            warn!(error = %e, "Failed to write to chat broker");
            break;
        }
    }

    let _ = sink.close().await;
}

async fn read_loop(
    mut stream: SplitStream<WsStream>,
    deliveries: mpsc::UnboundedSender<Delivery>,
    cancel: CancellationToken,
) {
    loop {
        let text = tokio::select! {
            _ = cancel.cancelled() => break,
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => text,
                Some(Ok(Message::Close(frame))) => {
                    info!(?frame, "Chat broker closed the socket");
                    break;
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    warn!(error = %e, "Chat socket error");
                    break;
                }
                None => break,
            },
        };

        match sockjs::parse(&text) {
            Ok(SockJsFrame::Messages(messages)) => {
                for raw in messages {
                    if let Some(delivery) = to_delivery(&raw) {
                        if deliveries.send(delivery).is_err() {
                            return;
                        }
                    }
                }
            }
            Ok(SockJsFrame::Close { code, reason }) => {
                info!(code, reason = %reason, "SockJS session closed");
                break;
            }
            Ok(SockJsFrame::Open | SockJsFrame::Heartbeat) => {}
            Err(e) => warn!(error = %e, "Ignoring unreadable SockJS frame"),
        }
    }
}

fn to_delivery(raw: &str) -> Option<Delivery> {
    match Frame::parse(raw) {
        Ok(Some(frame)) if frame.command == Command::Message => Some(Delivery {
            destination: frame.get("destination").unwrap_or_default().to_string(),
            subscription_id: frame.get("subscription").map(str::to_string),
            body: frame.body,
        }),
        Ok(Some(frame)) if frame.command == Command::Error => {
            warn!(message = ?frame.get("message"), body = %frame.body, "STOMP error frame");
            None
        }
        Ok(_) => None,
        Err(e) => {
            warn!(error = %e, "Ignoring unreadable STOMP frame");
            None
        }
    }
}

#[async_trait]
impl Transport for StompTransport {
    async fn connect(&self) -> ServiceResult<mpsc::UnboundedReceiver<Delivery>> {
        Ok(self.open().await?)
    }

    async fn subscribe(&self, destination: &str) -> ServiceResult<String> {
        Ok(self.add_subscription(destination).await?)
    }

    async fn unsubscribe(&self, subscription_id: &str) -> ServiceResult<()> {
        Ok(self.remove_subscription(subscription_id).await?)
    }

    async fn publish(&self, destination: &str, body: &serde_json::Value) -> ServiceResult<()> {
        Ok(self.send_frame(Frame::send_json(destination, body)).await?)
    }

    async fn disconnect(&self) -> ServiceResult<()> {
        Ok(self.close().await?)
    }
}
