//! In-memory storefront messaging server.
//!
//! Emulates the remote backend's chat protocol (conversation listing, joins,
//! send acknowledgements, message pushes) for local development and for the
//! client's integration tests. This module exposes the server components so
//! tests can embed it on an ephemeral port.

mod connection;
mod events;
mod state;

pub use connection::{handle_connection, handle_event, NO_MESSAGES_ERROR};
pub use events::{ClientEvent, Conversation, MessagePush, MessageRecord, ServerEvent};
pub use state::{ProductListing, ServerState, StoredConversation, StoredMessage};
