//! Server-to-client lines
//!
//! Every line the server emits is one [`ServerMessage`]. Direct replies are
//! `ACKNOWLEDGE`, `PING` and `ERROR`; fan-out notifications travel as
//! `UPDATE <KIND> ...`.

use core::fmt;

use crate::protocol::codec::{encode, ARGUMENT_SEPARATOR};
use crate::types::MessageId;

pub const ACKNOWLEDGE: &str = "ACKNOWLEDGE";
pub const ERROR: &str = "ERROR";

// ----------------------------------------------------------------------------
// Error Codes
// ----------------------------------------------------------------------------

/// Machine-readable reason carried by `c2/ERROR`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The command requires a CONNECTED session
    NotConnected,
    /// CONNECT outside the CONNECTING state
    AlreadyConnected,
    /// update_message named an id the log does not hold
    UnknownMessage,
    /// The edit policy refused the update
    NotAuthorized,
    /// Arguments of a known command were unusable
    InvalidArguments,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NotConnected => "not_connected",
            ErrorCode::AlreadyConnected => "already_connected",
            ErrorCode::UnknownMessage => "unknown_message",
            ErrorCode::NotAuthorized => "not_authorized",
            ErrorCode::InvalidArguments => "invalid_arguments",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ----------------------------------------------------------------------------
// Notifications
// ----------------------------------------------------------------------------

/// Fan-out notification sent as `c2/UPDATE <KIND> ...`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// `MESSAGE <sender>;<text>`
    Message { sender: String, text: String },
    /// `MESSAGE_EDIT <id>; <content>`
    MessageEdited { id: MessageId, content: String },
    /// `NEW_USER <username>`
    NewUser { username: String },
    /// `DISCONNECT <username>`
    Disconnect { username: String },
    /// `BROADCAST <text>`
    Broadcast { text: String },
    /// `USER_LIST <a>;<b>`
    UserList { usernames: Vec<String> },
    /// `SERVER_SHUTDOWN`
    ServerShutdown,
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::Message { .. } => "MESSAGE",
            Notification::MessageEdited { .. } => "MESSAGE_EDIT",
            Notification::NewUser { .. } => "NEW_USER",
            Notification::Disconnect { .. } => "DISCONNECT",
            Notification::Broadcast { .. } => "BROADCAST",
            Notification::UserList { .. } => "USER_LIST",
            Notification::ServerShutdown => "SERVER_SHUTDOWN",
        }
    }

    fn payload(&self) -> String {
        match self {
            // Clients split sender from text on the first bare ';'
            Notification::Message { sender, text } => format!("{};{}", sender, text),
            Notification::MessageEdited { id, content } => {
                format!("{}{}{}", id, ARGUMENT_SEPARATOR, content)
            }
            Notification::NewUser { username } => username.clone(),
            Notification::Disconnect { username } => username.clone(),
            Notification::Broadcast { text } => text.clone(),
            Notification::UserList { usernames } => usernames.join(";"),
            Notification::ServerShutdown => String::new(),
        }
    }
}

// ----------------------------------------------------------------------------
// Server Message
// ----------------------------------------------------------------------------

/// One outbound protocol line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// `c2/ACKNOWLEDGE` with an optional payload
    Acknowledge(Option<String>),
    /// `c2/PING <serverID>`
    Ping { server_id: i64 },
    /// `c2/ERROR <code>[; detail]`
    Error {
        code: ErrorCode,
        detail: Option<String>,
    },
    /// `c2/UPDATE <KIND> ...`
    Update(Notification),
}

impl ServerMessage {
    pub fn ack() -> Self {
        ServerMessage::Acknowledge(None)
    }

    pub fn ack_with<T: Into<String>>(payload: T) -> Self {
        ServerMessage::Acknowledge(Some(payload.into()))
    }

    /// `ACKNOWLEDGE [a, b]` reply to an active_users query
    pub fn user_list<S: AsRef<str>>(usernames: &[S]) -> Self {
        let joined = usernames
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(", ");
        ServerMessage::Acknowledge(Some(format!("[{}]", joined)))
    }

    pub fn error(code: ErrorCode) -> Self {
        ServerMessage::Error { code, detail: None }
    }

    pub fn error_with<T: Into<String>>(code: ErrorCode, detail: T) -> Self {
        ServerMessage::Error {
            code,
            detail: Some(detail.into()),
        }
    }

    /// Serialize to a protocol line (without newline)
    pub fn encode(&self) -> String {
        match self {
            ServerMessage::Acknowledge(payload) => {
                encode(ACKNOWLEDGE, payload.as_deref().unwrap_or(""))
            }
            ServerMessage::Ping { server_id } => encode(super::command::PING, &server_id.to_string()),
            ServerMessage::Error { code, detail } => match detail {
                Some(detail) => encode(
                    ERROR,
                    &format!("{}{}{}", code, ARGUMENT_SEPARATOR, detail),
                ),
                None => encode(ERROR, code.as_str()),
            },
            ServerMessage::Update(notification) => {
                let payload = notification.payload();
                let content = if payload.is_empty() {
                    notification.kind().to_string()
                } else {
                    format!("{} {}", notification.kind(), payload)
                };
                encode(super::command::UPDATE, &content)
            }
        }
    }
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acknowledge_lines() {
        assert_eq!(ServerMessage::ack().encode(), "c2/ACKNOWLEDGE");
        assert_eq!(
            ServerMessage::ack_with("TestServer").encode(),
            "c2/ACKNOWLEDGE TestServer"
        );
        assert_eq!(ServerMessage::Ping { server_id: 0 }.encode(), "c2/PING 0");
    }

    #[test]
    fn test_user_list_formatting() {
        assert_eq!(
            ServerMessage::user_list(&["Dummy"]).encode(),
            "c2/ACKNOWLEDGE [Dummy]"
        );
        assert_eq!(
            ServerMessage::user_list(&["Alice", "Bob"]).encode(),
            "c2/ACKNOWLEDGE [Alice, Bob]"
        );
        let empty: [&str; 0] = [];
        assert_eq!(ServerMessage::user_list(&empty).encode(), "c2/ACKNOWLEDGE []");
    }

    #[test]
    fn test_error_lines() {
        assert_eq!(
            ServerMessage::error(ErrorCode::NotConnected).encode(),
            "c2/ERROR not_connected"
        );
        assert_eq!(
            ServerMessage::error_with(ErrorCode::UnknownMessage, "abc").encode(),
            "c2/ERROR unknown_message; abc"
        );
    }

    #[test]
    fn test_notifications() {
        let message = ServerMessage::Update(Notification::Message {
            sender: "Alice".to_string(),
            text: "hi; there".to_string(),
        });
        assert_eq!(message.encode(), "c2/UPDATE MESSAGE Alice;hi; there");

        let shutdown = ServerMessage::Update(Notification::ServerShutdown);
        assert_eq!(shutdown.encode(), "c2/UPDATE SERVER_SHUTDOWN");

        let left = ServerMessage::Update(Notification::Disconnect {
            username: "Bob".to_string(),
        });
        assert_eq!(left.to_string(), "c2/UPDATE DISCONNECT Bob");
    }

    #[test]
    fn test_user_list_notification() {
        let roster = ServerMessage::Update(Notification::UserList {
            usernames: vec!["Alice".to_string(), "Bob".to_string()],
        });
        assert_eq!(roster.encode(), "c2/UPDATE USER_LIST Alice;Bob");

        let empty = ServerMessage::Update(Notification::UserList { usernames: Vec::new() });
        assert_eq!(empty.encode(), "c2/UPDATE USER_LIST");
    }
}
