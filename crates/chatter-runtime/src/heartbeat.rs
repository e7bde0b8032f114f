//! Per-connection heartbeat
//!
//! Sends `c2/PING <serverId>` to one connection on a fixed interval. A full
//! outbound buffer skips the tick; a closed connection ends the task.

use std::sync::Arc;
use std::time::Duration;

use chatter_core::{Connection, ServerMessage, TransportError};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, trace};

// ----------------------------------------------------------------------------
// Heartbeat Task
// ----------------------------------------------------------------------------

/// Server-side PING schedule for one connection
#[derive(Debug)]
pub struct HeartbeatTask {
    connection: Arc<dyn Connection>,
    server_id: i64,
    period: Duration,
}

impl HeartbeatTask {
    pub fn new(connection: Arc<dyn Connection>, server_id: i64, period: Duration) -> Self {
        Self {
            connection,
            server_id,
            period,
        }
    }

    /// Start the schedule on the current runtime
    pub fn spawn(self) -> HeartbeatHandle {
        HeartbeatHandle {
            handle: tokio::spawn(self.run()),
        }
    }

    async fn run(self) {
        let id = self.connection.id();
        let line = ServerMessage::Ping {
            server_id: self.server_id,
        }
        .encode();

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if !self.connection.is_open() {
                break;
            }
            match self.connection.write(&line) {
                Ok(()) => trace!(connection = %id, "Heartbeat sent"),
                Err(TransportError::BufferFull { .. }) => {
                    debug!(connection = %id, "Outbound buffer full; skipping heartbeat");
                }
                Err(e) => {
                    debug!(connection = %id, error = %e, "Heartbeat write failed; stopping");
                    break;
                }
            }
        }
        debug!(connection = %id, "Heartbeat stopped");
    }
}

// ----------------------------------------------------------------------------
// Handle
// ----------------------------------------------------------------------------

/// Owner of a running heartbeat; dropping it stops the schedule
#[derive(Debug)]
pub struct HeartbeatHandle {
    handle: JoinHandle<()>,
}

impl HeartbeatHandle {
    pub fn abort(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for HeartbeatHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
