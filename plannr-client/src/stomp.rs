//! STOMP 1.2 frames as used by the chat broker.
//!
//! A frame is `COMMAND\n` + `name:value\n` headers + a blank line + body +
//! NUL. Header values are escaped (`\\`, `\n`, `\r`, `\c`) on every command
//! except CONNECT and CONNECTED.

use std::fmt;

use crate::error::{ClientError, ClientResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Connect,
    Connected,
    Send,
    Subscribe,
    Unsubscribe,
    Disconnect,
    Message,
    Receipt,
    Error,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Connect => "CONNECT",
            Command::Connected => "CONNECTED",
            Command::Send => "SEND",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::Disconnect => "DISCONNECT",
            Command::Message => "MESSAGE",
            Command::Receipt => "RECEIPT",
            Command::Error => "ERROR",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "CONNECT" | "STOMP" => Command::Connect,
            "CONNECTED" => Command::Connected,
            "SEND" => Command::Send,
            "SUBSCRIBE" => Command::Subscribe,
            "UNSUBSCRIBE" => Command::Unsubscribe,
            "DISCONNECT" => Command::Disconnect,
            "MESSAGE" => Command::Message,
            "RECEIPT" => Command::Receipt,
            "ERROR" => Command::Error,
            _ => return None,
        })
    }

    fn escapes_headers(&self) -> bool {
        !matches!(self, Command::Connect | Command::Connected)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    pub fn new(command: Command) -> Self {
        Self { command, headers: Vec::new(), body: String::new() }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// First value wins when a header repeats.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    pub fn connect(host: &str, heartbeat_ms: u64, token: Option<&str>) -> Self {
        let heartbeat = format!("{},{}", heartbeat_ms, heartbeat_ms);
        let frame = Frame::new(Command::Connect)
            .header("accept-version", "1.2")
            .header("host", host)
            .header("heart-beat", heartbeat);
        match token {
            Some(token) => frame.header("Authorization", format!("Bearer {}", token)),
            None => frame,
        }
    }

    pub fn subscribe(id: &str, destination: &str) -> Self {
        Frame::new(Command::Subscribe)
            .header("id", id)
            .header("destination", destination)
            .header("ack", "auto")
    }

    pub fn unsubscribe(id: &str) -> Self {
        Frame::new(Command::Unsubscribe).header("id", id)
    }

    pub fn send_json(destination: &str, body: &serde_json::Value) -> Self {
        Frame::new(Command::Send)
            .header("destination", destination)
            .header("content-type", "application/json")
            .body(body.to_string())
    }

    pub fn disconnect(receipt: &str) -> Self {
        Frame::new(Command::Disconnect).header("receipt", receipt)
    }

    pub fn encode(&self) -> String {
        let escape = self.command.escapes_headers();
        let mut out = String::with_capacity(32 + self.body.len());
        out.push_str(self.command.as_str());
        out.push('\n');
        for (name, value) in &self.headers {
            if escape {
                out.push_str(&escape_header(name));
                out.push(':');
                out.push_str(&escape_header(value));
            } else {
                out.push_str(name);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }
        if !self.body.is_empty() && self.get("content-length").is_none() {
            out.push_str(&format!("content-length:{}\n", self.body.len()));
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }

    /// Parse one frame. Returns `Ok(None)` for a heart-beat (bare EOL).
    pub fn parse(raw: &str) -> ClientResult<Option<Frame>> {
        let raw = raw.trim_start_matches(['\r', '\n']);
        if raw.is_empty() {
            return Ok(None);
        }

        let (head, rest) = match raw.find("\n\n") {
            Some(i) => (&raw[..i], &raw[i + 2..]),
            None => match raw.find("\r\n\r\n") {
                Some(i) => (&raw[..i], &raw[i + 4..]),
                None => return Err(ClientError::Protocol("STOMP frame without header terminator".into())),
            },
        };

        let mut lines = head.lines();
        let command_line = lines.next().unwrap_or_default().trim_end_matches('\r');
        let command = Command::parse(command_line)
            .ok_or_else(|| ClientError::Protocol(format!("Unknown STOMP command: {}", command_line)))?;
        let unescape = command.escapes_headers();

        let mut headers = Vec::new();
        for line in lines {
            let line = line.trim_end_matches('\r');
            let Some((name, value)) = line.split_once(':') else {
                return Err(ClientError::Protocol(format!("Malformed STOMP header: {}", line)));
            };
            if unescape {
                headers.push((unescape_header(name)?, unescape_header(value)?));
            } else {
                headers.push((name.to_string(), value.to_string()));
            }
        }

        let frame = Frame { command, headers, body: String::new() };
        let body = match frame.get("content-length").and_then(|n| n.parse::<usize>().ok()) {
            Some(len) if len <= rest.len() && rest.is_char_boundary(len) => &rest[..len],
            _ => rest.split('\0').next().unwrap_or_default(),
        };

        Ok(Some(Frame { body: body.to_string(), ..frame }))
    }
}

fn escape_header(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            c => out.push(c),
        }
    }
    out
}

fn unescape_header(s: &str) -> ClientResult<String> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            other => {
                return Err(ClientError::Protocol(format!("Invalid STOMP header escape: \\{}", other.unwrap_or(' '))));
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_encoding() {
        let frame = Frame::subscribe("sub-0", "/topic/chat/c1").encode();
        assert_eq!(frame, "SUBSCRIBE\nid:sub-0\ndestination:/topic/chat/c1\nack:auto\n\n\0");
    }

    #[test]
    fn test_send_carries_content_length() {
        let body = serde_json::json!({ "chatId": "c1" });
        let frame = Frame::send_json("/app/sendMessage", &body).encode();
        assert!(frame.starts_with("SEND\ndestination:/app/sendMessage\ncontent-type:application/json\n"));
        assert!(frame.contains("content-length:15\n"));
        assert!(frame.ends_with("\n\n{\"chatId\":\"c1\"}\0"));
    }

    #[test]
    fn test_parse_message_frame() {
        let raw = "MESSAGE\ndestination:/topic/chat/c1\nsubscription:sub-0\nmessage-id:7\n\n{\"id\":\"m1\"}\0";
        let frame = Frame::parse(raw).unwrap().unwrap();
        assert_eq!(frame.command, Command::Message);
        assert_eq!(frame.get("destination"), Some("/topic/chat/c1"));
        assert_eq!(frame.get("subscription"), Some("sub-0"));
        assert_eq!(frame.body, "{\"id\":\"m1\"}");
    }

    #[test]
    fn test_parse_connected_keeps_raw_headers() {
        let raw = "CONNECTED\nversion:1.2\nheart-beat:0,0\n\n\0";
        let frame = Frame::parse(raw).unwrap().unwrap();
        assert_eq!(frame.command, Command::Connected);
        assert_eq!(frame.get("version"), Some("1.2"));
    }

    #[test]
    fn test_header_escapes() {
        let frame = Frame::new(Command::Send).header("destination", "a:b\nc");
        let encoded = frame.encode();
        assert!(encoded.contains("destination:a\\cb\\nc\n"));
        let parsed = Frame::parse(&encoded).unwrap().unwrap();
        assert_eq!(parsed.get("destination"), Some("a:b\nc"));
    }

    #[test]
    fn test_heartbeat_and_garbage() {
        assert_eq!(Frame::parse("\n").unwrap(), None);
        assert!(Frame::parse("BOGUS\n\n\0").is_err());
        assert!(Frame::parse("MESSAGE\ndestination").is_err());
    }

    #[test]
    fn test_repeated_header_first_wins() {
        let raw = "MESSAGE\nfoo:1\nfoo:2\n\n\0";
        let frame = Frame::parse(raw).unwrap().unwrap();
        assert_eq!(frame.get("foo"), Some("1"));
    }
}
