//! procwatch IPC protocol and channel
//!
//! This crate provides the newline-delimited JSON message types and the
//! transport channel used between the monitor engine and its host, plus a
//! client helper for the host side of the pipe.

mod channel;
mod client;
mod error;
mod protocol;

pub use channel::{Channel, CommandHandler};
pub use client::ChannelClient;
pub use error::IpcError;
pub use protocol::{CommandError, CommandResult, ErrorCode, Message};
