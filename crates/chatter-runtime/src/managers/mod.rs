//! Stateful managers for the Chatter2 runtime
//!
//! This module contains manager structs that own shared server state.

pub mod registry;

pub use registry::{BroadcastReport, SessionRegistry, StateDistribution};
