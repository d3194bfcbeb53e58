use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wire events for the storefront messaging channel (shared between server and
/// client). Event names and payload field casing follow the backend protocol,
/// so everything is tagged and renamed explicitly.
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

/// Conversation summary as listed to one participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub chat_id: i64,
    #[serde(default)]
    pub product_id: Option<String>,
    pub product_name: String,
    #[serde(default)]
    pub product_image: Option<String>,
    #[serde(default)]
    pub last_message: Option<String>,
    #[serde(default)]
    pub last_message_date: Option<DateTime<Utc>>,
}

/// One message of a joined conversation, from the viewer's perspective.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub content: String,
    pub is_current_user: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Payload of a `message_created` push.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePush {
    pub chat_id: i64,
    pub content: String,
    pub is_current_user: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_conversations_serialization() {
        let event = ClientEvent::ListConversations;

        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"listConversations"}"#);

        let parsed: ClientEvent = serde_json::from_str(&json).unwrap();
        assert!(matches!(parsed, ClientEvent::ListConversations));
    }

    #[test]
    fn test_join_conversation_serialization() {
        let json = r#"{"type":"joinConversation","chatId":7,"date":"2024-11-02T10:00:00Z"}"#;

        let parsed: ClientEvent = serde_json::from_str(json).unwrap();
        if let ClientEvent::JoinConversation { chat_id, .. } = parsed {
            assert_eq!(chat_id, 7);
        } else {
            panic!("Expected JoinConversation");
        }
    }

    #[test]
    fn test_create_conversation_uses_backend_field_names() {
        let event = ClientEvent::CreateConversationAndMessage {
            ack: 1,
            product_id: "p-42".to_string(),
            content: "Is this still available?".to_string(),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"createConversationAndMessage\""));
        // The backend expects the all-lowercase `productid` key.
        assert!(json.contains("\"productid\":\"p-42\""));
        assert!(!json.contains("productId"));
    }

    #[test]
    fn test_ack_success_serialization() {
        let event = ServerEvent::Ack {
            id: 3,
            success: true,
            chat_id: Some(12),
            message: Some(MessageRecord {
                content: "hello".to_string(),
                is_current_user: true,
                created_at: None,
            }),
            error: None,
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"ack\""));
        assert!(json.contains("\"success\":true"));
        assert!(json.contains("\"chatId\":12"));
        assert!(!json.contains("\"error\""));
    }

    #[test]
    fn test_ack_failure_serialization() {
        let event = ServerEvent::Ack {
            id: 4,
            success: false,
            chat_id: None,
            message: None,
            error: Some("Chat not found".to_string()),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"success\":false"));
        assert!(json.contains("\"error\":\"Chat not found\""));
        assert!(!json.contains("\"chatId\""));
    }

    #[test]
    fn test_message_created_round_trip() {
        let json = r#"{"type":"message_created","data":{"chatId":5,"content":"hi","isCurrentUser":false,"createdAt":"2024-11-02T10:00:00Z"}}"#;

        let parsed: ServerEvent = serde_json::from_str(json).unwrap();
        if let ServerEvent::MessageCreated { data } = parsed {
            assert_eq!(data.chat_id, 5);
            assert_eq!(data.content, "hi");
            assert!(!data.is_current_user);
            assert!(data.created_at.is_some());
        } else {
            panic!("Expected MessageCreated");
        }
    }

    #[test]
    fn test_conversation_wire_casing() {
        let conversation = Conversation {
            chat_id: 9,
            product_id: Some("p-1".to_string()),
            product_name: "Mechanical keyboard".to_string(),
            product_image: None,
            last_message: Some("deal".to_string()),
            last_message_date: None,
        };

        let json = serde_json::to_string(&conversation).unwrap();
        assert!(json.contains("\"chatId\":9"));
        assert!(json.contains("\"productName\":\"Mechanical keyboard\""));
        assert!(json.contains("\"lastMessage\":\"deal\""));
    }

    #[test]
    fn test_conversation_tolerates_missing_optional_fields() {
        let json = r#"{"chatId":1,"productName":"Lamp"}"#;
        let parsed: Conversation = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.chat_id, 1);
        assert!(parsed.product_id.is_none());
        assert!(parsed.last_message_date.is_none());
    }
}
