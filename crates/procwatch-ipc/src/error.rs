//! IPC error types

use thiserror::Error;

use crate::ErrorCode;

/// Errors that can occur on the client side of the channel
#[derive(Debug, Error)]
pub enum IpcError {
    /// Transport closed before the request could complete
    #[error("channel closed")]
    ChannelClosed,

    /// No reply arrived within the request timeout
    #[error("request timed out")]
    Timeout(#[from] tokio::time::error::Elapsed),

    /// The monitor replied with an error message
    #[error("command failed ({code:?}): {message}")]
    Command { code: ErrorCode, message: String },
}
