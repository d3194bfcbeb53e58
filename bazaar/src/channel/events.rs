use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Conversation, MessageRecord};

/// Events the client emits on the messaging channel (shared between server
/// and client). Event names and payload casing follow the backend protocol,
/// so every variant is renamed explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "listConversations")]
    ListConversations,
    #[serde(rename = "joinConversation")]
    JoinConversation {
        #[serde(rename = "chatId")]
        chat_id: i64,
        date: DateTime<Utc>,
    },
    #[serde(rename = "createConversationAndMessage")]
    CreateConversationAndMessage {
        ack: u64,
        #[serde(rename = "productid")]
        product_id: String,
        content: String,
    },
    #[serde(rename = "sendMessage")]
    SendMessage {
        ack: u64,
        #[serde(rename = "chatId")]
        chat_id: i64,
        content: String,
    },
}

/// Events pushed by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "conversations_listed")]
    ConversationsListed { conversations: Vec<Conversation> },
    #[serde(rename = "messages_listed")]
    MessagesListed {
        #[serde(rename = "chatId")]
        chat_id: i64,
        messages: Vec<MessageRecord>,
        #[serde(rename = "isCurrentUserImage")]
        current_user_image: Option<String>,
        #[serde(rename = "otherUserImage")]
        other_user_image: Option<String>,
    },
    #[serde(rename = "message_created")]
    MessageCreated { data: MessagePush },
    #[serde(rename = "ack")]
    Ack {
        id: u64,
        success: bool,
        #[serde(rename = "chatId", default, skip_serializing_if = "Option::is_none")]
        chat_id: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<MessageRecord>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    #[serde(rename = "error")]
    Error { message: String },
}

/// Payload of a `message_created` push. Carries the chat it belongs to, which
/// may not be the conversation the viewer is currently in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePush {
    pub chat_id: i64,
    pub content: String,
    pub is_current_user: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}
