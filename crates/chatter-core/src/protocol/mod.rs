//! Chatter2 wire protocol
//!
//! - `codec`: the `c2/<TYPE> <content>` line format
//! - `command`: client-to-server commands as a closed enum
//! - `server_message`: every line the server writes back

pub mod codec;
pub mod command;
pub mod server_message;

pub use codec::{
    decode, encode, parse_message_arguments, parse_message_content, parse_message_type,
    split_arguments, RawMessage, ARGUMENT_SEPARATOR, LINE_PREFIX,
};
pub use command::{Command, Query, UpdateRequest};
pub use server_message::{ErrorCode, Notification, ServerMessage};
