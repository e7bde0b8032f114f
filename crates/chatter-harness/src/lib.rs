//! Chatter2 Harness - Testing Support
//!
//! Provides in-memory [`Connection`] implementations so the server can be
//! driven without sockets:
//!
//! - [`MockConnection`] records every line written to it and can be switched
//!   to fail writes or report itself closed at any point
//! - [`MockConnection::wait_for_line`] lets async tests wait for lines sent
//!   by background tasks such as heartbeats
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use chatter_harness::MockConnection;
//!
//! let dummy = MockConnection::new();
//! let session = server.on_connect(dummy.clone()).await;
//! server.on_line(&session, "c2/CONNECT Dummy").await;
//! assert_eq!(dummy.pop_last_line().as_deref(), Some("c2/ACKNOWLEDGE TestServer"));
//! ```

pub mod mock_connection;

pub use mock_connection::{MockBehavior, MockConnection};
