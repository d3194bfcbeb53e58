//! The live connection to the storefront messaging channel.

mod client;
mod events;

pub use client::{ChannelClient, ChannelEvent};
pub use events::{ClientEvent, MessagePush, ServerEvent};

use thiserror::Error;

/// Transport-level failures. All of these are non-fatal: the connection task
/// keeps retrying, and emits simply fail until the channel is up again.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("not connected to the messaging channel")]
    NotConnected,
    #[error("invalid channel endpoint: {0}")]
    Handshake(String),
    #[error("session cookie contains characters that cannot be sent in a header")]
    InvalidCookie,
    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
}
