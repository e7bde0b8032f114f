//! Command Dispatcher
//!
//! Translates decoded commands into registry and message-log mutations,
//! replies to the originating session, and fans notifications out to the
//! other connected sessions. Protocol errors never escape: they become
//! `c2/ERROR` replies or silent drops.

use std::str::FromStr;
use std::sync::Arc;

use chatter_core::{
    protocol::Notification, Command, EditPolicy, ErrorCode, MessageId, MessageLog,
    MessageLogError, Query, ServerIdentity, ServerMessage, Session, SessionSnapshot,
    Timestamp, UpdateRequest,
};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::managers::SessionRegistry;

// ----------------------------------------------------------------------------
// Dispatch Outcome
// ----------------------------------------------------------------------------

/// What happened to one command
///
/// `Disconnect` means the session was closed while handling the command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Command applied and acknowledged
    Replied,
    /// Command refused with an `ERROR` reply
    Rejected(ErrorCode),
    /// Command dropped without a reply
    Ignored,
    /// The client asked to end its session
    Disconnect,
}

impl DispatchOutcome {
    /// Whether the connection worker should stop reading
    pub fn ends_session(&self) -> bool {
        matches!(self, DispatchOutcome::Disconnect)
    }
}

// ----------------------------------------------------------------------------
// Dispatcher
// ----------------------------------------------------------------------------

/// Central command coordinator
#[derive(Debug)]
pub struct Dispatcher {
    identity: ServerIdentity,
    registry: Arc<SessionRegistry>,
    log: Arc<RwLock<MessageLog>>,
    edit_policy: EditPolicy,
    announce_connections: bool,
}

impl Dispatcher {
    pub fn new(
        identity: ServerIdentity,
        registry: Arc<SessionRegistry>,
        log: Arc<RwLock<MessageLog>>,
    ) -> Self {
        Self {
            identity,
            registry,
            log,
            edit_policy: EditPolicy::Open,
            announce_connections: false,
        }
    }

    pub fn with_edit_policy(mut self, policy: EditPolicy) -> Self {
        self.edit_policy = policy;
        self
    }

    pub fn with_connection_announcements(mut self, enabled: bool) -> Self {
        self.announce_connections = enabled;
        self
    }

    pub fn identity(&self) -> &ServerIdentity {
        &self.identity
    }

    /// Handle one command from `session`
    pub async fn handle(&self, session: &Arc<Session>, command: Command) -> DispatchOutcome {
        match command {
            Command::Connect { username } => self.handle_connect(session, &username).await,
            Command::Ping => self.handle_ping(session),
            Command::Query(query) => self.handle_query(session, query).await,
            Command::Message { timestamp, text } => {
                self.handle_message(session, timestamp, &text).await
            }
            Command::Update(request) => self.handle_update(session, request).await,
            Command::Disconnect => {
                debug!(connection = %session.connection_id(), "Client requested disconnect");
                match self.handle_close(session).await {
                    Some(_) => DispatchOutcome::Disconnect,
                    None => DispatchOutcome::Ignored,
                }
            }
            Command::Invalid {
                message_type,
                reason,
            } => {
                debug!(connection = %session.connection_id(), %message_type, %reason, "Invalid command arguments");
                self.reject(session, ErrorCode::InvalidArguments, Some(reason))
            }
            Command::Unknown { message_type, .. } => {
                debug!(connection = %session.connection_id(), %message_type, "Ignoring unknown command type");
                DispatchOutcome::Ignored
            }
        }
    }

    /// Close `session`, detach it from the registry and tell the others
    ///
    /// Returns the pre-close snapshot when this call performed the close.
    pub async fn handle_close(&self, session: &Arc<Session>) -> Option<SessionSnapshot> {
        let closed = session.close().await;
        self.registry.remove(session.connection_id()).await;

        let before = closed?;
        if before.state.is_connected() {
            info!(connection = %before.connection, username = %before.username, "User disconnected");
            self.registry
                .broadcast(
                    Some(before.connection),
                    &ServerMessage::Update(Notification::Disconnect {
                        username: before.username.clone(),
                    }),
                )
                .await;
            self.refresh_user_list(None).await;
        }
        Some(before)
    }

    // ------------------------------------------------------------------------
    // Handlers
    // ------------------------------------------------------------------------

    async fn handle_connect(&self, session: &Arc<Session>, username: &str) -> DispatchOutcome {
        if let Err(e) = session.connect(username).await {
            debug!(connection = %session.connection_id(), error = %e, "CONNECT rejected");
            return self.reject(session, ErrorCode::AlreadyConnected, None);
        }

        info!(connection = %session.connection_id(), username, "User connected");
        self.reply(session, ServerMessage::ack_with(self.identity.name.clone()));

        if self.announce_connections {
            self.registry
                .broadcast(
                    Some(session.connection_id()),
                    &ServerMessage::Update(Notification::NewUser {
                        username: username.to_string(),
                    }),
                )
                .await;
            self.refresh_user_list(Some(session)).await;
        }
        DispatchOutcome::Replied
    }

    fn handle_ping(&self, session: &Arc<Session>) -> DispatchOutcome {
        self.reply(
            session,
            ServerMessage::Ping {
                server_id: self.identity.id,
            },
        );
        DispatchOutcome::Replied
    }

    async fn handle_query(&self, session: &Arc<Session>, query: Query) -> DispatchOutcome {
        match query {
            Query::ActiveUsers => {
                if let Err(outcome) = self.require_connected(session).await {
                    return outcome;
                }
                let usernames = self.registry.active_usernames().await;
                self.reply(session, ServerMessage::user_list(&usernames));
                DispatchOutcome::Replied
            }
            Query::UpdateMessage { id, content } => {
                self.handle_update_message(session, &id, &content).await
            }
            Query::Unknown { name } => {
                debug!(connection = %session.connection_id(), query = %name, "Ignoring unknown query");
                DispatchOutcome::Ignored
            }
        }
    }

    async fn handle_update_message(
        &self,
        session: &Arc<Session>,
        raw_id: &str,
        content: &str,
    ) -> DispatchOutcome {
        let requester = match self.require_connected(session).await {
            Ok(snapshot) => snapshot,
            Err(outcome) => return outcome,
        };

        let Ok(id) = MessageId::from_str(raw_id) else {
            return self.reject(session, ErrorCode::UnknownMessage, Some(raw_id.to_string()));
        };

        let result = {
            let mut log = self.log.write().await;
            if self.edit_policy == EditPolicy::SenderOnly {
                if let Some(entry) = log.get(&id) {
                    if entry.sender() != requester.username {
                        warn!(
                            connection = %requester.connection,
                            requester = %requester.username,
                            sender = entry.sender(),
                            %id,
                            "Rejected edit of another user's message"
                        );
                        drop(log);
                        return self.reject(session, ErrorCode::NotAuthorized, Some(id.to_string()));
                    }
                }
            }
            log.update(&id, content)
        };

        match result {
            Ok(entry) => {
                debug!(connection = %requester.connection, %id, "Message edited");
                self.reply(session, ServerMessage::ack());
                self.registry
                    .broadcast(
                        Some(requester.connection),
                        &ServerMessage::Update(Notification::MessageEdited {
                            id: entry.id(),
                            content: entry.content().to_string(),
                        }),
                    )
                    .await;
                DispatchOutcome::Replied
            }
            Err(MessageLogError::NotFound { id }) => {
                self.reject(session, ErrorCode::UnknownMessage, Some(id.to_string()))
            }
        }
    }

    async fn handle_message(
        &self,
        session: &Arc<Session>,
        timestamp: Timestamp,
        text: &str,
    ) -> DispatchOutcome {
        let sender = match self.require_connected(session).await {
            Ok(snapshot) => snapshot,
            Err(outcome) => return outcome,
        };

        // Append completes before the ACK, so a follow-up edit always finds the entry
        let id = self.log.write().await.append(&sender.username, timestamp, text);
        debug!(connection = %sender.connection, %id, "Message logged");

        self.reply(session, ServerMessage::ack());
        self.registry
            .broadcast(
                Some(sender.connection),
                &ServerMessage::Update(Notification::Message {
                    sender: sender.username,
                    text: text.to_string(),
                }),
            )
            .await;
        DispatchOutcome::Replied
    }

    async fn handle_update(&self, session: &Arc<Session>, request: UpdateRequest) -> DispatchOutcome {
        match request {
            UpdateRequest::Username { new_name } => {
                let previous = match session.rename(&new_name).await {
                    Ok(previous) => previous,
                    Err(e) => {
                        debug!(connection = %session.connection_id(), error = %e, "Rename rejected");
                        return self.reject(session, ErrorCode::NotConnected, None);
                    }
                };

                info!(connection = %session.connection_id(), from = %previous, to = %new_name, "User renamed");
                self.reply(session, ServerMessage::ack());
                self.registry
                    .broadcast(
                        Some(session.connection_id()),
                        &ServerMessage::Update(Notification::NewUser { username: new_name }),
                    )
                    .await;
                self.refresh_user_list(Some(session)).await;
                DispatchOutcome::Replied
            }
            UpdateRequest::Unknown { field } => {
                debug!(connection = %session.connection_id(), %field, "Ignoring unknown update field");
                DispatchOutcome::Ignored
            }
        }
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    /// Push `UPDATE USER_LIST` to connected sessions other than `subject`
    async fn refresh_user_list(&self, subject: Option<&Arc<Session>>) {
        if !self.announce_connections {
            return;
        }
        let usernames = self.registry.active_usernames().await;
        self.registry
            .broadcast(
                subject.map(|session| session.connection_id()),
                &ServerMessage::Update(Notification::UserList { usernames }),
            )
            .await;
    }

    async fn require_connected(
        &self,
        session: &Arc<Session>,
    ) -> Result<SessionSnapshot, DispatchOutcome> {
        let snapshot = session.snapshot().await;
        if snapshot.state.is_connected() {
            Ok(snapshot)
        } else {
            debug!(connection = %snapshot.connection, state = snapshot.state.state_name(), "Command requires a connected session");
            Err(self.reject(session, ErrorCode::NotConnected, None))
        }
    }

    fn reject(
        &self,
        session: &Arc<Session>,
        code: ErrorCode,
        detail: Option<String>,
    ) -> DispatchOutcome {
        let message = match detail {
            Some(detail) => ServerMessage::error_with(code, detail),
            None => ServerMessage::error(code),
        };
        self.reply(session, message);
        DispatchOutcome::Rejected(code)
    }

    fn reply(&self, session: &Arc<Session>, message: ServerMessage) {
        if let Err(e) = session.send(&message) {
            debug!(connection = %session.connection_id(), error = %e, "Reply not delivered");
        }
    }
}
