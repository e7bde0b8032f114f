//! Client commands
//!
//! Decoded lines are mapped onto a closed set of commands. Types the server
//! does not know become [`Command::Unknown`] so the dispatcher can drop them
//! without failing; known types with unusable arguments become
//! [`Command::Invalid`].

use crate::protocol::codec::{split_arguments, RawMessage};
use crate::types::Timestamp;

// ----------------------------------------------------------------------------
// Wire Names
// ----------------------------------------------------------------------------

pub const CONNECT: &str = "CONNECT";
pub const PING: &str = "PING";
pub const QUERY: &str = "QUERY";
pub const MSG: &str = "MSG";
pub const UPDATE: &str = "UPDATE";
pub const DISCONNECT: &str = "DISCONNECT";

pub const QUERY_ACTIVE_USERS: &str = "active_users";
pub const QUERY_UPDATE_MESSAGE: &str = "update_message";
pub const UPDATE_USERNAME: &str = "username";

// ----------------------------------------------------------------------------
// Command Types
// ----------------------------------------------------------------------------

/// A command received from a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `c2/CONNECT <username>`
    Connect { username: String },
    /// `c2/PING`
    Ping,
    /// `c2/QUERY <name>[; args]`
    Query(Query),
    /// `c2/MSG <timestamp>; <text>`
    Message { timestamp: Timestamp, text: String },
    /// `c2/UPDATE <field>; <value>`
    Update(UpdateRequest),
    /// `c2/DISCONNECT`
    Disconnect,
    /// Known type whose arguments could not be used
    Invalid {
        message_type: String,
        reason: String,
    },
    /// Type this server does not implement
    Unknown {
        message_type: String,
        content: String,
    },
}

/// QUERY sub-protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    ActiveUsers,
    /// The id is kept raw; resolving it is the message log's business
    UpdateMessage { id: String, content: String },
    Unknown { name: String },
}

/// UPDATE sub-protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateRequest {
    Username { new_name: String },
    Unknown { field: String },
}

impl Command {
    /// Map a message type and its content onto a command
    pub fn parse(message_type: &str, content: &str) -> Self {
        match message_type {
            CONNECT => {
                if content.is_empty() {
                    Self::invalid(message_type, "username must not be empty")
                } else {
                    Command::Connect {
                        username: content.to_string(),
                    }
                }
            }
            PING => Command::Ping,
            QUERY => Self::parse_query(content),
            MSG => Self::parse_message(content),
            UPDATE => Self::parse_update(content),
            DISCONNECT => Command::Disconnect,
            _ => Command::Unknown {
                message_type: message_type.to_string(),
                content: content.to_string(),
            },
        }
    }

    fn parse_query(content: &str) -> Self {
        let args = split_arguments(content, 3);
        match args[0] {
            QUERY_ACTIVE_USERS => Command::Query(Query::ActiveUsers),
            QUERY_UPDATE_MESSAGE => match args.as_slice() {
                [_, id, new_content] => Command::Query(Query::UpdateMessage {
                    id: id.to_string(),
                    content: new_content.to_string(),
                }),
                _ => Self::invalid(QUERY, "update_message requires an id and content"),
            },
            name => Command::Query(Query::Unknown {
                name: name.to_string(),
            }),
        }
    }

    fn parse_message(content: &str) -> Self {
        let args = split_arguments(content, 2);
        let timestamp = match args[0].parse::<Timestamp>() {
            Ok(timestamp) => timestamp,
            Err(_) => return Self::invalid(MSG, "timestamp must be milliseconds since epoch"),
        };
        let text = args.get(1).copied().unwrap_or("").to_string();
        Command::Message { timestamp, text }
    }

    fn parse_update(content: &str) -> Self {
        let args = split_arguments(content, 2);
        match args[0] {
            UPDATE_USERNAME => match args.get(1) {
                Some(new_name) if !new_name.is_empty() => Command::Update(UpdateRequest::Username {
                    new_name: new_name.to_string(),
                }),
                _ => Self::invalid(UPDATE, "username must not be empty"),
            },
            field => Command::Update(UpdateRequest::Unknown {
                field: field.to_string(),
            }),
        }
    }

    fn invalid(message_type: &str, reason: &str) -> Self {
        Command::Invalid {
            message_type: message_type.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Short name for logging
    pub fn name(&self) -> &str {
        match self {
            Command::Connect { .. } => CONNECT,
            Command::Ping => PING,
            Command::Query(_) => QUERY,
            Command::Message { .. } => MSG,
            Command::Update(_) => UPDATE,
            Command::Disconnect => DISCONNECT,
            Command::Invalid { message_type, .. } => message_type,
            Command::Unknown { message_type, .. } => message_type,
        }
    }
}

impl From<&RawMessage> for Command {
    fn from(raw: &RawMessage) -> Self {
        Command::parse(&raw.message_type, &raw.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect() {
        assert_eq!(
            Command::parse("CONNECT", "Dummy"),
            Command::Connect {
                username: "Dummy".to_string()
            }
        );
        assert!(matches!(Command::parse("CONNECT", ""), Command::Invalid { .. }));
    }

    #[test]
    fn test_message_keeps_separators_in_text() {
        let command = Command::parse("MSG", "1700000000000; Test message; with more");
        assert_eq!(
            command,
            Command::Message {
                timestamp: Timestamp::new(1_700_000_000_000),
                text: "Test message; with more".to_string(),
            }
        );
        assert!(matches!(
            Command::parse("MSG", "yesterday; hi"),
            Command::Invalid { .. }
        ));
    }

    #[test]
    fn test_queries() {
        assert_eq!(
            Command::parse("QUERY", "active_users"),
            Command::Query(Query::ActiveUsers)
        );
        assert_eq!(
            Command::parse("QUERY", "update_message; some-id; New message value"),
            Command::Query(Query::UpdateMessage {
                id: "some-id".to_string(),
                content: "New message value".to_string(),
            })
        );
        assert!(matches!(
            Command::parse("QUERY", "update_message; only-id"),
            Command::Invalid { .. }
        ));
        assert_eq!(
            Command::parse("QUERY", "ping; true"),
            Command::Query(Query::Unknown {
                name: "ping".to_string()
            })
        );
    }

    #[test]
    fn test_update_username() {
        assert_eq!(
            Command::parse("UPDATE", "username; NewDummyName"),
            Command::Update(UpdateRequest::Username {
                new_name: "NewDummyName".to_string()
            })
        );
        assert!(matches!(
            Command::parse("UPDATE", "username"),
            Command::Invalid { .. }
        ));
        assert!(matches!(
            Command::parse("UPDATE", "avatar; cat.png"),
            Command::Update(UpdateRequest::Unknown { .. })
        ));
    }

    #[test]
    fn test_unknown_type() {
        let command = Command::parse("TELEPORT", "now");
        assert_eq!(command.name(), "TELEPORT");
        assert!(matches!(command, Command::Unknown { .. }));
    }
}
