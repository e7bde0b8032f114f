//! Line codec for the `c2/` text protocol
//!
//! A line has the fixed shape `c2/<TYPE> <CONTENT>`. The type is the token
//! between the prefix and the first space; the content is everything after
//! that space. Arguments inside the content are separated by `"; "` only, so
//! free text containing a bare `;` is never split.

use crate::errors::CodecError;

// ----------------------------------------------------------------------------
// Constants
// ----------------------------------------------------------------------------

/// Prefix carried by every protocol line
pub const LINE_PREFIX: &str = "c2/";

/// Separator between arguments inside the content
pub const ARGUMENT_SEPARATOR: &str = "; ";

// ----------------------------------------------------------------------------
// Parsing
// ----------------------------------------------------------------------------

/// Extract the message type, or `None` if the prefix is absent or the type is empty
pub fn parse_message_type(line: &str) -> Option<&str> {
    let rest = line.strip_prefix(LINE_PREFIX)?;
    let message_type = match rest.find(' ') {
        Some(index) => &rest[..index],
        None => rest,
    };
    if message_type.is_empty() {
        None
    } else {
        Some(message_type)
    }
}

/// Extract everything after `c2/<TYPE> `
///
/// Returns `None` when the line is not a `message_type` line at all. A line
/// carrying only the type yields empty content.
pub fn parse_message_content<'a>(message_type: &str, line: &'a str) -> Option<&'a str> {
    let rest = line.strip_prefix(LINE_PREFIX)?.strip_prefix(message_type)?;
    if rest.is_empty() {
        return Some("");
    }
    rest.strip_prefix(' ')
}

/// Split content on `"; "`. Empty content yields a single empty argument.
pub fn parse_message_arguments(content: &str) -> Vec<String> {
    content
        .split(ARGUMENT_SEPARATOR)
        .map(str::to_string)
        .collect()
}

/// Split content into at most `limit` arguments; the last keeps any further separators
pub fn split_arguments(content: &str, limit: usize) -> Vec<&str> {
    content.splitn(limit.max(1), ARGUMENT_SEPARATOR).collect()
}

// ----------------------------------------------------------------------------
// Encoding
// ----------------------------------------------------------------------------

/// Build a protocol line; empty content produces the bare `c2/<TYPE>` form
pub fn encode(message_type: &str, content: &str) -> String {
    let mut line = String::with_capacity(LINE_PREFIX.len() + message_type.len() + content.len() + 1);
    line.push_str(LINE_PREFIX);
    line.push_str(message_type);
    if !content.is_empty() {
        line.push(' ');
        line.push_str(content);
    }
    line
}

// ----------------------------------------------------------------------------
// Raw Message
// ----------------------------------------------------------------------------

/// A decoded line before it is mapped onto a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub message_type: String,
    pub content: String,
}

impl RawMessage {
    pub fn new<T: Into<String>, C: Into<String>>(message_type: T, content: C) -> Self {
        Self {
            message_type: message_type.into(),
            content: content.into(),
        }
    }

    pub fn encode(&self) -> String {
        encode(&self.message_type, &self.content)
    }
}

/// Decode one transport line, tolerating a trailing `\r`
pub fn decode(line: &str) -> Result<RawMessage, CodecError> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    if !line.starts_with(LINE_PREFIX) {
        return Err(CodecError::MissingPrefix);
    }
    let message_type = parse_message_type(line).ok_or(CodecError::MissingType)?;
    let content = parse_message_content(message_type, line).unwrap_or("");
    Ok(RawMessage::new(message_type, content))
}
