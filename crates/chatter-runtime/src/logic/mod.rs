//! Core Logic Module
//!
//! - `dispatcher`: command handlers and the close path
//!
//! Each connection worker calls into the dispatcher for its own lines in
//! order. The registry and the message log are shared by all workers, each
//! behind its own lock; no handler holds a session lock while waiting on the
//! registry or the log.

pub mod dispatcher;

pub use dispatcher::{DispatchOutcome, Dispatcher};
