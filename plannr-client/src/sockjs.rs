//! SockJS websocket framing.
//!
//! The broker speaks SockJS on `{base}/{server-id}/{session-id}/websocket`.
//! Server frames: `o` open, `h` heartbeat, `a[...]` a JSON array of
//! messages, `c[code,"reason"]` close. Client frames are a JSON array of
//! strings.

use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::error::{ClientError, ClientResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SockJsFrame {
    Open,
    Heartbeat,
    Messages(Vec<String>),
    Close { code: u16, reason: String },
}

/// Raw websocket endpoint for a fresh session. `http(s)` bases are mapped to
/// `ws(s)`.
pub fn websocket_url(base: &str) -> String {
    let mut rng = rand::thread_rng();
    let server_id: u16 = rng.gen_range(0..1000);
    let session_id: String = (&mut rng).sample_iter(&Alphanumeric).take(8).map(char::from).collect();
    session_url(base, server_id, &session_id)
}

pub fn session_url(base: &str, server_id: u16, session_id: &str) -> String {
    let base = base.trim_end_matches('/');
    let base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base.to_string()
    };
    format!("{}/{:03}/{}/websocket", base, server_id, session_id)
}

pub fn parse(raw: &str) -> ClientResult<SockJsFrame> {
    let Some(kind) = raw.chars().next() else {
        return Err(ClientError::Protocol("Empty SockJS frame".into()));
    };
    let payload = &raw[kind.len_utf8()..];

    match kind {
        'o' => Ok(SockJsFrame::Open),
        'h' => Ok(SockJsFrame::Heartbeat),
        'a' => serde_json::from_str::<Vec<String>>(payload)
            .map(SockJsFrame::Messages)
            .map_err(|e| ClientError::Protocol(format!("Bad SockJS message array: {}", e))),
        'c' => {
            let (code, reason): (u16, String) = serde_json::from_str(payload)
                .map_err(|e| ClientError::Protocol(format!("Bad SockJS close frame: {}", e)))?;
            Ok(SockJsFrame::Close { code, reason })
        }
        other => Err(ClientError::Protocol(format!("Unknown SockJS frame type '{}'", other))),
    }
}

/// Client-to-server frame carrying `messages`.
pub fn encode(messages: &[String]) -> String {
    serde_json::Value::from(messages.to_vec()).to_string()
}
