//! Server Configuration
//!
//! One serde-friendly structure holds everything the server needs at
//! construction time: identity, listener address, heartbeat schedule, edit
//! policy and transport buffer limits.

use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{ChatterError, Result};
use crate::types::{saturating_millis, ServerIdentity};

// ----------------------------------------------------------------------------
// Edit Policy
// ----------------------------------------------------------------------------

/// Who may change the content of a logged message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditPolicy {
    /// Any connected session may edit any message
    #[default]
    Open,
    /// Only a session whose current username matches the original sender
    SenderOnly,
}

// ----------------------------------------------------------------------------
// Server Configuration
// ----------------------------------------------------------------------------

/// Configuration for a chat server instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Name returned in the CONNECT acknowledgement
    pub server_name: String,
    /// Numeric id returned in PING replies
    pub server_id: i64,
    /// Address the TCP listener binds to
    pub bind_address: String,
    /// Whether each connection gets a server-sent PING schedule
    pub heartbeat_enabled: bool,
    /// Interval between heartbeat PINGs
    pub heartbeat_interval_ms: u64,
    /// Edit authorization for `update_message`
    pub edit_policy: EditPolicy,
    /// Send `UPDATE NEW_USER` to others when a session completes CONNECT
    pub announce_connections: bool,
    /// Lines queued per connection before writes start failing
    pub outbound_buffer_size: usize,
    /// Longest accepted inbound line in bytes
    pub max_line_length: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_name: "Chatter2".to_string(),
            server_id: 0,
            bind_address: "127.0.0.1:5000".to_string(),
            heartbeat_enabled: true,
            heartbeat_interval_ms: 1000, // matches the client ping loop
            edit_policy: EditPolicy::Open,
            announce_connections: false,
            outbound_buffer_size: 64,
            max_line_length: 8192,
        }
    }
}

impl ServerConfig {
    /// Create configuration optimized for testing
    pub fn testing() -> Self {
        Self {
            server_name: "TestServer".to_string(),
            server_id: 0,
            bind_address: "127.0.0.1:0".to_string(),
            heartbeat_enabled: false,
            heartbeat_interval_ms: 50,
            edit_policy: EditPolicy::Open,
            announce_connections: false,
            outbound_buffer_size: 16,
            max_line_length: 1024,
        }
    }

    pub fn with_identity<N: Into<String>>(mut self, name: N, id: i64) -> Self {
        self.server_name = name.into();
        self.server_id = id;
        self
    }

    pub fn with_edit_policy(mut self, policy: EditPolicy) -> Self {
        self.edit_policy = policy;
        self
    }

    pub fn with_heartbeat(mut self, interval: Duration) -> Self {
        self.heartbeat_enabled = true;
        self.heartbeat_interval_ms = saturating_millis(interval);
        self
    }

    pub fn identity(&self) -> ServerIdentity {
        ServerIdentity::new(self.server_name.clone(), self.server_id)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Reject values the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.server_name.trim().is_empty() {
            return Err(ChatterError::config_error("server_name must not be empty"));
        }
        if self.heartbeat_enabled && self.heartbeat_interval_ms == 0 {
            return Err(ChatterError::config_error(
                "heartbeat_interval_ms must be positive when heartbeats are enabled",
            ));
        }
        if self.outbound_buffer_size == 0 {
            return Err(ChatterError::config_error(
                "outbound_buffer_size must be positive",
            ));
        }
        if self.max_line_length == 0 {
            return Err(ChatterError::config_error("max_line_length must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ServerConfig::default().validate().is_ok());
        assert!(ServerConfig::testing().validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let config = ServerConfig::default().with_identity("  ", 1);
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.heartbeat_interval_ms = 0;
        assert!(config.validate().is_err());
        config.heartbeat_enabled = false;
        assert!(config.validate().is_ok());

        let mut config = ServerConfig::default();
        config.outbound_buffer_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ServerConfig =
            serde_json::from_str(r#"{"server_name": "Lobby", "edit_policy": "sender_only"}"#)
                .unwrap();
        assert_eq!(config.server_name, "Lobby");
        assert_eq!(config.edit_policy, EditPolicy::SenderOnly);
        assert_eq!(config.heartbeat_interval_ms, 1000);
        assert_eq!(config.identity(), ServerIdentity::new("Lobby", 0));
    }

    #[test]
    fn test_heartbeat_interval_saturates() {
        let config = ServerConfig::default().with_heartbeat(Duration::from_millis(250));
        assert!(config.heartbeat_enabled);
        assert_eq!(config.heartbeat_interval_ms, 250);

        let config = ServerConfig::default().with_heartbeat(Duration::MAX);
        assert_eq!(config.heartbeat_interval_ms, u64::MAX);
        assert!(config.validate().is_ok());
    }
}
