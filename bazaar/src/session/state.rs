use std::collections::HashMap;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, warn};

use crate::channel::{ChannelEvent, ClientEvent, MessagePush, ServerEvent};
use crate::models::input::{SendMessageInput, ValidateExt};
use crate::models::{Conversation, MessageRecord, MessageView};

/// The backend reports a joined-but-empty chat through its error event with
/// exactly this message. It is a valid empty result, not a failure.
pub const NO_MESSAGES_ERROR: &str = "No messages found for this chat";

/// Whether the active conversation's log has been fetched. Distinguishes
/// "still fetching" from "fetched zero messages" so the view can show a
/// loading indicator instead of a wrong empty state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    NotRequested,
    Pending,
    Loaded,
}

/// Connection lifecycle of one mounted session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Terminal: the session was closed.
    Disconnected,
    /// The channel is establishing (or re-establishing) its connection.
    Connecting,
    /// Connected, no conversation selected.
    Idle,
    /// Connected with an active conversation.
    Active,
}

/// Why a message could not be handed to the channel.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("message text is empty")]
    Empty,
    #[error("invalid message: {0}")]
    Invalid(String),
    #[error("no conversation or product selected")]
    NoTarget,
    #[error(transparent)]
    Channel(#[from] crate::channel::ChannelError),
}

#[derive(Debug, Clone)]
enum SendKind {
    NewConversation,
    Existing { chat_id: i64 },
}

#[derive(Debug, Clone)]
struct PendingSend {
    kind: SendKind,
    content: String,
}

/// An emit prepared by [`SessionState::send_message`]. The ack id lets the
/// caller roll the pending entry back if the emit never leaves the client.
#[derive(Debug)]
pub struct PreparedSend {
    pub ack: u64,
    pub event: ClientEvent,
}

/// The client-held view of the user's conversations and of the one joined
/// conversation. All transitions run on a single event stream in arrival
/// order, so the struct needs no interior locking; methods that react to
/// server events return the emits they caused as effects.
pub struct SessionState {
    phase: SessionPhase,
    conversations: Vec<Conversation>,
    messages: Vec<MessageRecord>,
    current_chat_id: Option<i64>,
    product_id: Option<String>,
    /// True when the view was entered from a product page. Suppresses the
    /// most-recent-conversation auto-select so the pre-conversation state
    /// (product chosen, no chat yet) survives the first listing.
    entered_with_product: bool,
    messages_loaded: LoadState,
    current_user_image: Option<String>,
    other_user_image: Option<String>,
    pending_sends: HashMap<u64, PendingSend>,
    next_ack: u64,
    notices: Vec<String>,
}

impl SessionState {
    pub fn new(product_context: Option<String>) -> Self {
        Self {
            phase: SessionPhase::Connecting,
            conversations: Vec::new(),
            messages: Vec::new(),
            current_chat_id: None,
            entered_with_product: product_context.is_some(),
            product_id: product_context,
            messages_loaded: LoadState::NotRequested,
            current_user_image: None,
            other_user_image: None,
            pending_sends: HashMap::new(),
            next_ack: 1,
            notices: Vec::new(),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn current_chat_id(&self) -> Option<i64> {
        self.current_chat_id
    }

    pub fn product_id(&self) -> Option<&str> {
        self.product_id.as_deref()
    }

    pub fn messages_loaded(&self) -> LoadState {
        self.messages_loaded
    }

    /// The active conversation's log with sender avatars resolved. The avatar
    /// is a pure function of the message side and the session's two profile
    /// images, recomputed per read so it never goes stale.
    pub fn messages(&self) -> impl Iterator<Item = MessageView<'_>> {
        self.messages.iter().map(|record| MessageView {
            content: &record.content,
            is_current_user: record.is_current_user,
            sender_image: if record.is_current_user {
                self.current_user_image.as_deref()
            } else {
                self.other_user_image.as_deref()
            },
        })
    }

    /// Drain accumulated non-fatal notices for display.
    pub fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }

    /// Apply one channel event. Returns the emits it caused.
    pub fn apply(&mut self, event: ChannelEvent, now: DateTime<Utc>) -> Vec<ClientEvent> {
        match event {
            ChannelEvent::Up => self.handle_connected(now),
            ChannelEvent::Down => {
                self.handle_disconnected();
                Vec::new()
            }
            ChannelEvent::Event(server_event) => match server_event {
                ServerEvent::ConversationsListed { conversations } => {
                    self.apply_conversations_listed(conversations, now)
                }
                ServerEvent::MessagesListed {
                    chat_id,
                    messages,
                    current_user_image,
                    other_user_image,
                } => {
                    self.apply_messages_listed(chat_id, messages, current_user_image, other_user_image);
                    Vec::new()
                }
                ServerEvent::MessageCreated { data } => self.apply_message_created(data, now),
                ServerEvent::Ack {
                    id,
                    success,
                    chat_id,
                    message,
                    error,
                } => self.apply_ack(id, success, chat_id, message, error),
                ServerEvent::Error { message } => {
                    self.apply_error(message);
                    Vec::new()
                }
            },
        }
    }

    /// Select a conversation from the list. Unknown ids are a no-op. Returns
    /// the join emit; re-selecting the active conversation re-fetches its log.
    pub fn select_conversation(&mut self, chat_id: i64, now: DateTime<Utc>) -> Option<ClientEvent> {
        let conversation = self
            .conversations
            .iter()
            .find(|conv| conv.chat_id == chat_id)?;
        self.product_id = conversation.product_id.clone();
        Some(self.activate(chat_id, now))
    }

    /// Prepare a message send. Validates client-side, decides between the
    /// new-conversation and existing-chat emits, and registers the pending
    /// acknowledgement. The log is not touched until the server confirms.
    pub fn send_message(&mut self, text: &str) -> Result<PreparedSend, SendError> {
        let content = text.trim().to_string();
        if content.is_empty() {
            return Err(SendError::Empty);
        }
        let input = SendMessageInput {
            content: content.clone(),
        };
        input.validate_input().map_err(SendError::Invalid)?;

        match (self.current_chat_id, self.product_id.clone()) {
            (Some(chat_id), _) => {
                let ack = self.register_send(SendKind::Existing { chat_id }, content.clone());
                Ok(PreparedSend {
                    ack,
                    event: ClientEvent::SendMessage {
                        ack,
                        chat_id,
                        content,
                    },
                })
            }
            (None, Some(product_id)) => {
                let ack = self.register_send(SendKind::NewConversation, content.clone());
                Ok(PreparedSend {
                    ack,
                    event: ClientEvent::CreateConversationAndMessage {
                        ack,
                        product_id,
                        content,
                    },
                })
            }
            (None, None) => Err(SendError::NoTarget),
        }
    }

    /// Roll back a pending send whose emit never reached the channel.
    pub fn abort_send(&mut self, ack: u64) {
        self.pending_sends.remove(&ack);
    }

    /// Mark the session closed. Terminal: a new mount builds a new session.
    pub fn close(&mut self) {
        self.phase = SessionPhase::Disconnected;
    }

    fn handle_connected(&mut self, now: DateTime<Utc>) -> Vec<ClientEvent> {
        let mut effects = vec![ClientEvent::ListConversations];
        match self.current_chat_id {
            Some(chat_id) => {
                // Server-side state is not replayed across connections, so an
                // active conversation must be re-joined.
                self.phase = SessionPhase::Active;
                self.messages_loaded = LoadState::Pending;
                effects.push(ClientEvent::JoinConversation { chat_id, date: now });
            }
            None => {
                self.phase = SessionPhase::Idle;
            }
        }
        effects
    }

    fn handle_disconnected(&mut self) {
        // The channel keeps retrying; Disconnected is reserved for close().
        if self.phase != SessionPhase::Disconnected {
            self.phase = SessionPhase::Connecting;
        }
    }

    fn apply_conversations_listed(
        &mut self,
        conversations: Vec<Conversation>,
        now: DateTime<Utc>,
    ) -> Vec<ClientEvent> {
        self.conversations = conversations;
        sort_by_recency(&mut self.conversations);

        // Convenience default: with nothing active and no product context
        // from the entry point, open the most recent conversation.
        if self.current_chat_id.is_none() && !self.entered_with_product {
            if let Some(most_recent) = self.conversations.first() {
                let chat_id = most_recent.chat_id;
                self.product_id = most_recent.product_id.clone();
                return vec![self.activate(chat_id, now)];
            }
        }
        Vec::new()
    }

    fn apply_messages_listed(
        &mut self,
        chat_id: i64,
        messages: Vec<MessageRecord>,
        current_user_image: Option<String>,
        other_user_image: Option<String>,
    ) {
        // A join answered after the user moved on must not overwrite the
        // newer conversation's log.
        if self.current_chat_id != Some(chat_id) {
            debug!(chat_id, current = ?self.current_chat_id, "Ignoring stale join response");
            return;
        }

        self.current_user_image = current_user_image;
        self.other_user_image = other_user_image;
        self.messages = messages;
        self.messages_loaded = LoadState::Loaded;
    }

    fn apply_message_created(&mut self, push: MessagePush, now: DateTime<Utc>) -> Vec<ClientEvent> {
        if self.current_chat_id == Some(push.chat_id) {
            self.messages.push(MessageRecord {
                content: push.content.clone(),
                is_current_user: push.is_current_user,
                created_at: push.created_at,
            });
        }

        // Background conversations update too: the list doubles as the
        // recency ordering even while another thread is open.
        let date = push.created_at.unwrap_or(now);
        match self
            .conversations
            .iter_mut()
            .find(|conv| conv.chat_id == push.chat_id)
        {
            Some(conversation) => {
                conversation.last_message = Some(push.content);
                conversation.last_message_date = Some(date);
                sort_by_recency(&mut self.conversations);
                Vec::new()
            }
            None => {
                // A push for a thread we have never listed; refresh instead
                // of dropping it.
                debug!(chat_id = push.chat_id, "Push for unlisted conversation, refreshing list");
                vec![ClientEvent::ListConversations]
            }
        }
    }

    fn apply_ack(
        &mut self,
        id: u64,
        success: bool,
        chat_id: Option<i64>,
        message: Option<MessageRecord>,
        error: Option<String>,
    ) -> Vec<ClientEvent> {
        let Some(pending) = self.pending_sends.remove(&id) else {
            debug!(ack = id, "Acknowledgement for unknown send");
            return Vec::new();
        };

        if !success {
            let reason = error.unwrap_or_else(|| "The message could not be sent".to_string());
            warn!(ack = id, reason = %reason, "Send rejected by server");
            self.notices.push(reason);
            return Vec::new();
        }

        match pending.kind {
            SendKind::NewConversation => {
                if let Some(new_chat_id) = chat_id {
                    self.current_chat_id = Some(new_chat_id);
                    if self.phase == SessionPhase::Idle {
                        self.phase = SessionPhase::Active;
                    }
                }
                self.append_confirmed(pending.content, message);
            }
            SendKind::Existing { chat_id: target } => {
                // Only append when the user is still looking at that chat.
                if self.current_chat_id == Some(target) {
                    self.append_confirmed(pending.content, message);
                }
            }
        }

        // Refresh summaries so the list reflects the confirmed message.
        vec![ClientEvent::ListConversations]
    }

    fn apply_error(&mut self, message: String) {
        if message == NO_MESSAGES_ERROR {
            // A joined chat with no history: a valid empty result.
            self.messages.clear();
            self.messages_loaded = LoadState::Loaded;
        } else {
            warn!(notice = %message, "Error from messaging channel");
            self.notices.push(message);
        }
    }

    fn activate(&mut self, chat_id: i64, now: DateTime<Utc>) -> ClientEvent {
        self.current_chat_id = Some(chat_id);
        self.messages_loaded = LoadState::Pending;
        if self.phase == SessionPhase::Idle {
            self.phase = SessionPhase::Active;
        }
        ClientEvent::JoinConversation { chat_id, date: now }
    }

    fn register_send(&mut self, kind: SendKind, content: String) -> u64 {
        let ack = self.next_ack;
        self.next_ack += 1;
        self.pending_sends.insert(ack, PendingSend { kind, content });
        ack
    }

    fn append_confirmed(&mut self, sent_content: String, message: Option<MessageRecord>) {
        let record = match message {
            Some(record) => MessageRecord {
                // Always rendered as the current user's own message.
                is_current_user: true,
                ..record
            },
            None => MessageRecord {
                content: sent_content,
                is_current_user: true,
                created_at: None,
            },
        };
        self.messages.push(record);
        self.messages_loaded = LoadState::Loaded;
    }
}

/// Most recent first; entries without a date sink to the end. The sort is
/// stable, so equal dates keep their arrival order.
fn sort_by_recency(conversations: &mut [Conversation]) {
    conversations.sort_by(|a, b| b.last_message_date.cmp(&a.last_message_date));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(value: &str) -> DateTime<Utc> {
        value.parse().unwrap()
    }

    fn now() -> DateTime<Utc> {
        date("2024-11-02T12:00:00Z")
    }

    fn conversation(chat_id: i64, last_message_date: Option<&str>) -> Conversation {
        Conversation {
            chat_id,
            product_id: Some(format!("p-{}", chat_id)),
            product_name: format!("Product {}", chat_id),
            product_image: None,
            last_message: Some("hello".to_string()),
            last_message_date: last_message_date.map(date),
        }
    }

    fn listed(conversations: Vec<Conversation>) -> ChannelEvent {
        ChannelEvent::Event(ServerEvent::ConversationsListed { conversations })
    }

    fn push(chat_id: i64, content: &str, at: &str) -> ChannelEvent {
        ChannelEvent::Event(ServerEvent::MessageCreated {
            data: MessagePush {
                chat_id,
                content: content.to_string(),
                is_current_user: false,
                created_at: Some(date(at)),
            },
        })
    }

    fn messages_listed(chat_id: i64, messages: Vec<MessageRecord>) -> ChannelEvent {
        ChannelEvent::Event(ServerEvent::MessagesListed {
            chat_id,
            messages,
            current_user_image: Some("me.png".to_string()),
            other_user_image: Some("them.png".to_string()),
        })
    }

    fn record(content: &str, is_current_user: bool) -> MessageRecord {
        MessageRecord {
            content: content.to_string(),
            is_current_user,
            created_at: None,
        }
    }

    /// A connected session with no product context and no auto-selected chat.
    fn connected_state() -> SessionState {
        let mut state = SessionState::new(None);
        state.apply(ChannelEvent::Up, now());
        state
    }

    fn chat_ids(state: &SessionState) -> Vec<i64> {
        state.conversations().iter().map(|c| c.chat_id).collect()
    }

    // ==================== connection lifecycle ====================

    #[test]
    fn test_connect_requests_conversation_list() {
        let mut state = SessionState::new(None);
        assert_eq!(state.phase(), SessionPhase::Connecting);

        let effects = state.apply(ChannelEvent::Up, now());
        assert!(matches!(effects.as_slice(), [ClientEvent::ListConversations]));
        assert_eq!(state.phase(), SessionPhase::Idle);
    }

    #[test]
    fn test_reconnect_rejoins_active_conversation() {
        let mut state = connected_state();
        state.apply(listed(vec![conversation(1, Some("2024-11-01T10:00:00Z"))]), now());
        assert_eq!(state.current_chat_id(), Some(1));

        state.apply(ChannelEvent::Down, now());
        assert_eq!(state.phase(), SessionPhase::Connecting);

        let effects = state.apply(ChannelEvent::Up, now());
        assert!(matches!(
            effects.as_slice(),
            [
                ClientEvent::ListConversations,
                ClientEvent::JoinConversation { chat_id: 1, .. }
            ]
        ));
        assert_eq!(state.messages_loaded(), LoadState::Pending);
        assert_eq!(state.phase(), SessionPhase::Active);
    }

    #[test]
    fn test_close_is_terminal() {
        let mut state = connected_state();
        state.close();
        assert_eq!(state.phase(), SessionPhase::Disconnected);

        state.apply(ChannelEvent::Down, now());
        assert_eq!(state.phase(), SessionPhase::Disconnected);
    }

    // ==================== conversation listing ====================

    #[test]
    fn test_conversations_sorted_most_recent_first() {
        let mut state = SessionState::new(Some("p-9".to_string()));
        state.apply(ChannelEvent::Up, now());

        state.apply(
            listed(vec![
                conversation(1, Some("2024-11-01T10:00:00Z")),
                conversation(2, Some("2024-11-02T10:00:00Z")),
                conversation(3, None),
                conversation(4, Some("2024-10-30T10:00:00Z")),
            ]),
            now(),
        );

        assert_eq!(chat_ids(&state), vec![2, 1, 4, 3]);
    }

    #[test]
    fn test_sort_preserves_arrival_order_on_ties() {
        let mut state = SessionState::new(Some("p-9".to_string()));
        state.apply(ChannelEvent::Up, now());

        state.apply(
            listed(vec![
                conversation(5, Some("2024-11-01T10:00:00Z")),
                conversation(6, Some("2024-11-01T10:00:00Z")),
                conversation(7, Some("2024-11-01T10:00:00Z")),
            ]),
            now(),
        );

        assert_eq!(chat_ids(&state), vec![5, 6, 7]);
    }

    #[test]
    fn test_auto_selects_most_recent_conversation() {
        let mut state = connected_state();

        let effects = state.apply(
            listed(vec![
                conversation(1, Some("2024-11-01T10:00:00Z")),
                conversation(2, Some("2024-11-02T10:00:00Z")),
            ]),
            now(),
        );

        assert_eq!(state.current_chat_id(), Some(2));
        assert_eq!(state.product_id(), Some("p-2"));
        assert_eq!(state.messages_loaded(), LoadState::Pending);
        assert!(matches!(
            effects.as_slice(),
            [ClientEvent::JoinConversation { chat_id: 2, .. }]
        ));
    }

    #[test]
    fn test_product_context_suppresses_auto_select() {
        let mut state = SessionState::new(Some("p-42".to_string()));
        state.apply(ChannelEvent::Up, now());

        let effects = state.apply(
            listed(vec![conversation(1, Some("2024-11-01T10:00:00Z"))]),
            now(),
        );

        assert!(effects.is_empty());
        assert_eq!(state.current_chat_id(), None);
        assert_eq!(state.product_id(), Some("p-42"));
    }

    #[test]
    fn test_empty_listing_selects_nothing() {
        let mut state = connected_state();
        let effects = state.apply(listed(Vec::new()), now());
        assert!(effects.is_empty());
        assert_eq!(state.current_chat_id(), None);
    }

    // ==================== selection and joining ====================

    #[test]
    fn test_select_conversation_joins_and_resets_load_state() {
        let mut state = SessionState::new(Some("p-9".to_string()));
        state.apply(ChannelEvent::Up, now());
        state.apply(listed(vec![conversation(1, Some("2024-11-01T10:00:00Z"))]), now());

        let emit = state.select_conversation(1, now());
        assert!(matches!(
            emit,
            Some(ClientEvent::JoinConversation { chat_id: 1, .. })
        ));
        assert_eq!(state.current_chat_id(), Some(1));
        assert_eq!(state.product_id(), Some("p-1"));
        assert_eq!(state.messages_loaded(), LoadState::Pending);
        assert_eq!(state.phase(), SessionPhase::Active);
    }

    #[test]
    fn test_select_unknown_conversation_is_noop() {
        let mut state = connected_state();
        state.apply(listed(vec![conversation(1, Some("2024-11-01T10:00:00Z"))]), now());
        let before = state.current_chat_id();

        assert!(state.select_conversation(99, now()).is_none());
        assert_eq!(state.current_chat_id(), before);
    }

    #[test]
    fn test_messages_listed_replaces_log_and_captures_avatars() {
        let mut state = SessionState::new(Some("p-1".to_string()));
        state.apply(ChannelEvent::Up, now());
        state.apply(listed(vec![conversation(1, Some("2024-11-01T10:00:00Z"))]), now());
        state.select_conversation(1, now());

        state.apply(
            messages_listed(1, vec![record("hi", true), record("hello!", false)]),
            now(),
        );

        assert_eq!(state.messages_loaded(), LoadState::Loaded);
        let views: Vec<_> = state.messages().collect();
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].sender_image, Some("me.png"));
        assert_eq!(views[1].sender_image, Some("them.png"));
    }

    #[test]
    fn test_empty_messages_listed_is_loaded_not_pending() {
        let mut state = SessionState::new(Some("p-1".to_string()));
        state.apply(ChannelEvent::Up, now());
        state.apply(listed(vec![conversation(1, Some("2024-11-01T10:00:00Z"))]), now());
        state.select_conversation(1, now());
        assert_eq!(state.messages_loaded(), LoadState::Pending);

        state.apply(messages_listed(1, Vec::new()), now());

        assert_eq!(state.messages_loaded(), LoadState::Loaded);
        assert_eq!(state.messages().count(), 0);
    }

    #[test]
    fn test_stale_join_response_does_not_overwrite_newer_log() {
        let mut state = SessionState::new(Some("p-1".to_string()));
        state.apply(ChannelEvent::Up, now());
        state.apply(
            listed(vec![
                conversation(1, Some("2024-11-01T10:00:00Z")),
                conversation(2, Some("2024-11-02T10:00:00Z")),
            ]),
            now(),
        );

        // Join 1, then immediately join 2. The response for 1 arrives last.
        state.select_conversation(1, now());
        state.select_conversation(2, now());
        state.apply(messages_listed(2, vec![record("for chat 2", false)]), now());
        state.apply(messages_listed(1, vec![record("for chat 1", false)]), now());

        let contents: Vec<_> = state.messages().map(|v| v.content.to_string()).collect();
        assert_eq!(contents, vec!["for chat 2"]);
        assert_eq!(state.messages_loaded(), LoadState::Loaded);
    }

    // ==================== sending ====================

    #[test]
    fn test_send_without_chat_creates_conversation() {
        let mut state = SessionState::new(Some("p-42".to_string()));
        state.apply(ChannelEvent::Up, now());

        let prepared = state.send_message("Is this still available?").unwrap();
        match prepared.event {
            ClientEvent::CreateConversationAndMessage {
                product_id,
                content,
                ..
            } => {
                assert_eq!(product_id, "p-42");
                assert_eq!(content, "Is this still available?");
            }
            other => panic!("Expected CreateConversationAndMessage, got {:?}", other),
        }
    }

    #[test]
    fn test_send_with_chat_uses_send_message() {
        let mut state = connected_state();
        state.apply(listed(vec![conversation(1, Some("2024-11-01T10:00:00Z"))]), now());

        let prepared = state.send_message("still there?").unwrap();
        assert!(matches!(
            prepared.event,
            ClientEvent::SendMessage { chat_id: 1, .. }
        ));
    }

    #[test]
    fn test_send_trims_and_rejects_empty_text() {
        let mut state = SessionState::new(Some("p-1".to_string()));
        assert!(matches!(state.send_message("   "), Err(SendError::Empty)));
        assert!(matches!(state.send_message(""), Err(SendError::Empty)));
    }

    #[test]
    fn test_send_without_target_is_rejected() {
        let mut state = connected_state();
        assert!(matches!(
            state.send_message("hello"),
            Err(SendError::NoTarget)
        ));
    }

    #[test]
    fn test_no_append_before_acknowledgement() {
        let mut state = SessionState::new(Some("p-42".to_string()));
        state.apply(ChannelEvent::Up, now());

        state.send_message("first").unwrap();
        assert_eq!(state.messages().count(), 0);
    }

    #[test]
    fn test_successful_create_ack_adopts_chat_and_appends() {
        let mut state = SessionState::new(Some("p-42".to_string()));
        state.apply(ChannelEvent::Up, now());
        let prepared = state.send_message("first").unwrap();

        let effects = state.apply(
            ChannelEvent::Event(ServerEvent::Ack {
                id: prepared.ack,
                success: true,
                chat_id: Some(77),
                message: Some(record("first", true)),
                error: None,
            }),
            now(),
        );

        assert_eq!(state.current_chat_id(), Some(77));
        assert_eq!(state.phase(), SessionPhase::Active);
        let views: Vec<_> = state.messages().collect();
        assert_eq!(views.len(), 1);
        assert!(views[0].is_current_user);
        assert!(matches!(effects.as_slice(), [ClientEvent::ListConversations]));
    }

    #[test]
    fn test_failed_ack_leaves_state_untouched() {
        let mut state = SessionState::new(Some("p-42".to_string()));
        state.apply(ChannelEvent::Up, now());
        let prepared = state.send_message("first").unwrap();

        let effects = state.apply(
            ChannelEvent::Event(ServerEvent::Ack {
                id: prepared.ack,
                success: false,
                chat_id: None,
                message: None,
                error: Some("Product not found".to_string()),
            }),
            now(),
        );

        assert!(effects.is_empty());
        assert_eq!(state.current_chat_id(), None);
        assert_eq!(state.messages().count(), 0);
        assert_eq!(state.take_notices(), vec!["Product not found".to_string()]);
    }

    #[test]
    fn test_existing_chat_ack_appends_current_user_message() {
        let mut state = connected_state();
        state.apply(listed(vec![conversation(1, Some("2024-11-01T10:00:00Z"))]), now());
        state.apply(messages_listed(1, vec![record("hello!", false)]), now());

        let prepared = state.send_message("hi there").unwrap();
        state.apply(
            ChannelEvent::Event(ServerEvent::Ack {
                id: prepared.ack,
                success: true,
                chat_id: None,
                message: Some(record("hi there", true)),
                error: None,
            }),
            now(),
        );

        let views: Vec<_> = state.messages().collect();
        assert_eq!(views.len(), 2);
        assert!(views[1].is_current_user);
        assert_eq!(views[1].sender_image, Some("me.png"));
    }

    #[test]
    fn test_ack_after_switching_chats_does_not_append() {
        let mut state = connected_state();
        state.apply(
            listed(vec![
                conversation(1, Some("2024-11-02T10:00:00Z")),
                conversation(2, Some("2024-11-01T10:00:00Z")),
            ]),
            now(),
        );
        // Auto-selected chat 1; send there, then switch to 2 mid-flight.
        let prepared = state.send_message("to chat 1").unwrap();
        state.select_conversation(2, now());
        state.apply(messages_listed(2, Vec::new()), now());

        let effects = state.apply(
            ChannelEvent::Event(ServerEvent::Ack {
                id: prepared.ack,
                success: true,
                chat_id: None,
                message: Some(record("to chat 1", true)),
                error: None,
            }),
            now(),
        );

        // The confirmed message belongs to chat 1 and must not land in 2's
        // log; the summary refresh still runs.
        assert_eq!(state.messages().count(), 0);
        assert!(matches!(effects.as_slice(), [ClientEvent::ListConversations]));
    }

    #[test]
    fn test_unknown_ack_is_ignored() {
        let mut state = connected_state();
        let effects = state.apply(
            ChannelEvent::Event(ServerEvent::Ack {
                id: 999,
                success: true,
                chat_id: Some(1),
                message: None,
                error: None,
            }),
            now(),
        );
        assert!(effects.is_empty());
        assert_eq!(state.current_chat_id(), None);
    }

    #[test]
    fn test_aborted_send_forgets_pending_ack() {
        let mut state = SessionState::new(Some("p-1".to_string()));
        state.apply(ChannelEvent::Up, now());
        let prepared = state.send_message("never sent").unwrap();
        state.abort_send(prepared.ack);

        state.apply(
            ChannelEvent::Event(ServerEvent::Ack {
                id: prepared.ack,
                success: true,
                chat_id: Some(5),
                message: Some(record("never sent", true)),
                error: None,
            }),
            now(),
        );

        assert_eq!(state.current_chat_id(), None);
        assert_eq!(state.messages().count(), 0);
    }

    // ==================== pushed messages ====================

    #[test]
    fn test_push_for_active_chat_appends_and_moves_to_front() {
        let mut state = connected_state();
        state.apply(
            listed(vec![
                conversation(1, Some("2024-11-01T10:00:00Z")),
                conversation(2, Some("2024-11-02T10:00:00Z")),
            ]),
            now(),
        );
        // Auto-select picked 2; move to the older chat 1.
        state.select_conversation(1, now());
        state.apply(messages_listed(1, Vec::new()), now());
        assert_eq!(chat_ids(&state), vec![2, 1]);

        let effects = state.apply(push(1, "fresh news", "2024-11-02T11:00:00Z"), now());

        assert!(effects.is_empty());
        let views: Vec<_> = state.messages().collect();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].content, "fresh news");
        assert_eq!(views[0].sender_image, Some("them.png"));
        assert_eq!(chat_ids(&state), vec![1, 2]);
        assert_eq!(
            state.conversations()[0].last_message.as_deref(),
            Some("fresh news")
        );
    }

    #[test]
    fn test_push_for_background_chat_updates_summary_only() {
        let mut state = connected_state();
        state.apply(
            listed(vec![
                conversation(1, Some("2024-11-02T10:00:00Z")),
                conversation(2, Some("2024-11-01T10:00:00Z")),
            ]),
            now(),
        );
        // Active chat is 1 (auto-selected); a push arrives for 2.
        state.apply(messages_listed(1, Vec::new()), now());

        state.apply(push(2, "psst", "2024-11-02T13:00:00Z"), now());

        assert_eq!(state.messages().count(), 0);
        assert_eq!(chat_ids(&state), vec![2, 1]);
        assert_eq!(
            state.conversations()[0].last_message.as_deref(),
            Some("psst")
        );
    }

    #[test]
    fn test_push_for_unlisted_chat_triggers_refresh() {
        let mut state = connected_state();
        state.apply(listed(vec![conversation(1, Some("2024-11-01T10:00:00Z"))]), now());

        let effects = state.apply(push(42, "new thread", "2024-11-02T13:00:00Z"), now());
        assert!(matches!(effects.as_slice(), [ClientEvent::ListConversations]));
    }

    #[test]
    fn test_push_without_date_falls_back_to_clock() {
        let mut state = connected_state();
        state.apply(
            listed(vec![
                conversation(1, Some("2024-11-01T10:00:00Z")),
                conversation(2, Some("2024-11-02T10:00:00Z")),
            ]),
            now(),
        );
        state.select_conversation(1, now());
        state.apply(messages_listed(1, Vec::new()), now());

        let undated = ChannelEvent::Event(ServerEvent::MessageCreated {
            data: MessagePush {
                chat_id: 1,
                content: "undated".to_string(),
                is_current_user: false,
                created_at: None,
            },
        });
        // `now` is later than every listed date, so chat 1 comes first.
        state.apply(undated, now());
        assert_eq!(chat_ids(&state), vec![1, 2]);
    }

    // ==================== channel errors ====================

    #[test]
    fn test_no_messages_error_is_empty_state() {
        let mut state = SessionState::new(Some("p-1".to_string()));
        state.apply(ChannelEvent::Up, now());
        state.apply(listed(vec![conversation(1, Some("2024-11-01T10:00:00Z"))]), now());
        state.select_conversation(1, now());
        assert_eq!(state.messages_loaded(), LoadState::Pending);

        state.apply(
            ChannelEvent::Event(ServerEvent::Error {
                message: NO_MESSAGES_ERROR.to_string(),
            }),
            now(),
        );

        assert_eq!(state.messages_loaded(), LoadState::Loaded);
        assert_eq!(state.messages().count(), 0);
        assert!(state.take_notices().is_empty());
    }

    #[test]
    fn test_other_errors_become_notices() {
        let mut state = connected_state();
        state.apply(
            ChannelEvent::Event(ServerEvent::Error {
                message: "Chat not found".to_string(),
            }),
            now(),
        );

        assert_eq!(state.take_notices(), vec!["Chat not found".to_string()]);
        // Draining clears them.
        assert!(state.take_notices().is_empty());
        assert_eq!(state.phase(), SessionPhase::Idle);
    }
}
