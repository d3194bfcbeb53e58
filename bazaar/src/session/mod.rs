//! The Conversation Session Manager.
//!
//! One `ChatSession` per mounted chat view: it owns the channel connection,
//! holds the client-side view of the conversation list and the joined
//! conversation's log, and reconciles local sends with server-confirmed and
//! server-pushed events. The render layer owns the session by handle and
//! drives it from its own event loop; there is no process-wide singleton.

mod state;

pub use state::{LoadState, PreparedSend, SendError, SessionPhase, SessionState, NO_MESSAGES_ERROR};

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::warn;

use crate::channel::{ChannelClient, ChannelEvent, ClientEvent};
use crate::config::Config;
use crate::models::MessageView;

pub struct ChatSession {
    state: SessionState,
    channel: ChannelClient,
    events: mpsc::UnboundedReceiver<ChannelEvent>,
}

impl ChatSession {
    /// Open a session on the messaging channel. `product_context` is the
    /// product the view was entered from, when the user arrived via a
    /// product page and no conversation exists yet.
    pub fn open(config: &Config, product_context: Option<String>) -> Self {
        let channel = ChannelClient::new(config);
        let events = channel.open();
        Self {
            state: SessionState::new(product_context),
            channel,
            events,
        }
    }

    /// The current client-side view. Cheap accessor for rendering.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Mutable access to the view, e.g. to drain notices for display.
    pub fn state_mut(&mut self) -> &mut SessionState {
        &mut self.state
    }

    /// The joined conversation's log with avatars resolved.
    pub fn messages(&self) -> Vec<MessageView<'_>> {
        self.state.messages().collect()
    }

    /// Wait for the next channel event and apply it. Returns false once the
    /// channel task has ended and no more events will arrive. Events are
    /// applied strictly one at a time, in arrival order.
    pub async fn next_event(&mut self) -> bool {
        match self.events.recv().await {
            Some(event) => {
                let effects = self.state.apply(event, Utc::now());
                self.flush(effects);
                true
            }
            None => false,
        }
    }

    /// Apply every event already queued, without waiting. Returns how many
    /// were applied. Suits render loops that poll once per frame.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events.try_recv() {
            let effects = self.state.apply(event, Utc::now());
            self.flush(effects);
            applied += 1;
        }
        applied
    }

    /// Request a fresh conversation listing.
    pub fn refresh_conversations(&mut self) {
        self.emit(ClientEvent::ListConversations);
    }

    /// Make a listed conversation active and fetch its log. Unknown ids are
    /// a no-op; re-selecting the active conversation re-fetches it.
    pub fn select_conversation(&mut self, chat_id: i64) {
        if let Some(join) = self.state.select_conversation(chat_id, Utc::now()) {
            self.emit(join);
        }
    }

    /// Send a message to the active conversation, or start a new conversation
    /// from the entry product when none is active. The text is consumed
    /// either way: callers clear their input on invocation, not on success.
    pub fn send_message(&mut self, text: &str) -> Result<(), SendError> {
        let prepared = self.state.send_message(text)?;
        if let Err(e) = self.channel.emit(&prepared.event) {
            self.state.abort_send(prepared.ack);
            return Err(SendError::Channel(e));
        }
        Ok(())
    }

    /// Close the connection. Terminal: a new view mounts a new session.
    pub fn close(&mut self) {
        self.channel.close();
        self.state.close();
    }

    fn emit(&mut self, event: ClientEvent) {
        if let Err(e) = self.channel.emit(&event) {
            warn!(error = %e, "Dropped outbound event");
        }
    }

    fn flush(&mut self, effects: Vec<ClientEvent>) {
        for event in effects {
            self.emit(event);
        }
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.channel.close();
    }
}
