//! Wire message definitions.
//!
//! One JSON object per newline-terminated UTF-8 line; no length prefixing.
//! `id` correlates a request with exactly one response or error. Events are
//! broadcast and carry no `id`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A single protocol line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Message {
    /// Inbound command from the host.
    Request {
        id: String,
        command: String,
        #[serde(default)]
        payload: Value,
    },

    /// Successful reply to a request.
    Response { id: String, payload: Value },

    /// Failure reply to a request.
    Error {
        id: String,
        code: ErrorCode,
        message: String,
    },

    /// Uncorrelated broadcast from the monitor. `ts` is unix milliseconds.
    Event {
        event: String,
        payload: Value,
        ts: i64,
    },
}

impl Message {
    /// Build an event stamped with the current wall clock.
    pub fn event(name: impl Into<String>, payload: Value) -> Self {
        Message::Event {
            event: name.into(),
            payload,
            ts: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Error codes for error replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Command string not in the dispatch table
    UnknownCommand,
    /// Required payload fields missing or of the wrong shape
    InvalidPayload,
    /// Handler failed internally
    InternalError,
}

/// Failure outcome of a command handler, turned into an error reply on the
/// same request id.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct CommandError {
    pub code: ErrorCode,
    pub message: String,
}

impl CommandError {
    pub fn unknown_command(command: &str) -> Self {
        Self {
            code: ErrorCode::UnknownCommand,
            message: format!("unknown command: {command}"),
        }
    }

    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::InvalidPayload,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::InternalError,
            message: message.into(),
        }
    }
}

/// Outcome of handling one command: a response payload or an error reply.
pub type CommandResult = Result<Value, CommandError>;
