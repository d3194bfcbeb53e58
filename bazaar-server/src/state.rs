use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::info;

use crate::events::{Conversation, MessageRecord};

/// A message as stored, independent of who is looking at it.
#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub sender: String,
    pub content: String,
    pub date: DateTime<Utc>,
}

/// A buyer-seller thread about one product.
#[derive(Debug, Clone)]
pub struct StoredConversation {
    pub chat_id: i64,
    pub product_id: String,
    pub buyer: String,
    pub seller: String,
    pub messages: Vec<StoredMessage>,
}

/// A product known to the store, with the user selling it.
#[derive(Debug, Clone)]
pub struct ProductListing {
    pub name: String,
    pub image: Option<String>,
    pub seller: String,
}

/// Server state: connected clients plus the in-memory store the real backend
/// would keep in its database.
pub struct ServerState {
    /// user id -> list of sender channels (supports multiple connections per user)
    pub clients: DashMap<String, Vec<mpsc::UnboundedSender<String>>>,
    conversations: DashMap<i64, StoredConversation>,
    products: DashMap<String, ProductListing>,
    avatars: DashMap<String, String>,
    next_chat_id: AtomicI64,
}

impl ServerState {
    pub fn new() -> Self {
        Self {
            clients: DashMap::new(),
            conversations: DashMap::new(),
            products: DashMap::new(),
            avatars: DashMap::new(),
            next_chat_id: AtomicI64::new(1),
        }
    }

    /// Register a new client connection (supports multiple connections per user)
    pub fn add_client(&self, user_id: String, tx: mpsc::UnboundedSender<String>) {
        self.clients.entry(user_id).or_default().push(tx);
    }

    /// Drop closed channels for a user, removing the entry once none remain.
    pub fn remove_client(&self, user_id: &str) {
        if let Some(mut entry) = self.clients.get_mut(user_id) {
            entry.retain(|tx| !tx.is_closed());
            if entry.is_empty() {
                drop(entry);
                self.clients.remove(user_id);
            }
        }
    }

    /// Send a payload to every connection of a user.
    pub fn send_to_user(&self, user_id: &str, message: &str) -> bool {
        if let Some(channels) = self.clients.get(user_id) {
            let mut sent = false;
            for tx in channels.iter() {
                if tx.send(message.to_string()).is_ok() {
                    sent = true;
                }
            }
            sent
        } else {
            false
        }
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.clients
            .get(user_id)
            .map(|channels| !channels.is_empty())
            .unwrap_or(false)
    }

    /// Put a product on sale. Conversations can only be opened about listed products.
    pub fn seed_product(&self, product_id: &str, name: &str, image: Option<&str>, seller: &str) {
        self.products.insert(
            product_id.to_string(),
            ProductListing {
                name: name.to_string(),
                image: image.map(String::from),
                seller: seller.to_string(),
            },
        );
    }

    pub fn seed_avatar(&self, user_id: &str, url: &str) {
        self.avatars.insert(user_id.to_string(), url.to_string());
    }

    pub fn avatar(&self, user_id: &str) -> Option<String> {
        self.avatars.get(user_id).map(|entry| entry.value().clone())
    }

    /// Conversation summaries a user participates in, with the product
    /// metadata and last-message fields the client renders.
    pub fn conversations_for(&self, user_id: &str) -> Vec<Conversation> {
        let mut summaries = Vec::new();
        for entry in self.conversations.iter() {
            let conv = entry.value();
            if conv.buyer != user_id && conv.seller != user_id {
                continue;
            }
            let listing = self.products.get(&conv.product_id);
            let last = conv.messages.last();
            summaries.push(Conversation {
                chat_id: conv.chat_id,
                product_id: Some(conv.product_id.clone()),
                product_name: listing
                    .as_ref()
                    .map(|l| l.name.clone())
                    .unwrap_or_else(|| "Unknown product".to_string()),
                product_image: listing.as_ref().and_then(|l| l.image.clone()),
                last_message: last.map(|m| m.content.clone()),
                last_message_date: last.map(|m| m.date),
            });
        }
        summaries
    }

    /// Messages of a chat from one participant's perspective, or None when the
    /// chat does not exist or the user is not part of it.
    pub fn messages_for(&self, user_id: &str, chat_id: i64) -> Option<Vec<MessageRecord>> {
        let conv = self.conversations.get(&chat_id)?;
        if conv.buyer != user_id && conv.seller != user_id {
            return None;
        }
        Some(
            conv.messages
                .iter()
                .map(|m| MessageRecord {
                    content: m.content.clone(),
                    is_current_user: m.sender == user_id,
                    created_at: Some(m.date),
                })
                .collect(),
        )
    }

    /// The participant on the other side of a chat.
    pub fn other_participant(&self, chat_id: i64, user_id: &str) -> Option<String> {
        let conv = self.conversations.get(&chat_id)?;
        if conv.buyer == user_id {
            Some(conv.seller.clone())
        } else if conv.seller == user_id {
            Some(conv.buyer.clone())
        } else {
            None
        }
    }

    /// Create an empty thread directly, bypassing the first-message flow.
    /// Lets tests reproduce the backend's "no messages" join response.
    pub fn seed_conversation(&self, buyer: &str, seller: &str, product_id: &str) -> i64 {
        let id = self.next_chat_id.fetch_add(1, Ordering::Relaxed);
        self.conversations.insert(
            id,
            StoredConversation {
                chat_id: id,
                product_id: product_id.to_string(),
                buyer: buyer.to_string(),
                seller: seller.to_string(),
                messages: Vec::new(),
            },
        );
        id
    }

    /// Open a thread about a product and store its first message. Re-uses the
    /// existing thread when the buyer already contacted this seller about the
    /// same product.
    pub fn create_conversation(
        &self,
        buyer: &str,
        product_id: &str,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<(i64, StoredMessage), String> {
        let seller = match self.products.get(product_id) {
            Some(listing) => listing.seller.clone(),
            None => return Err("Product not found".to_string()),
        };
        if seller == buyer {
            return Err("Cannot open a conversation about your own product".to_string());
        }

        let existing = self
            .conversations
            .iter()
            .find(|entry| entry.value().buyer == buyer && entry.value().product_id == product_id)
            .map(|entry| entry.value().chat_id);

        let chat_id = match existing {
            Some(id) => id,
            None => {
                let id = self.next_chat_id.fetch_add(1, Ordering::Relaxed);
                self.conversations.insert(
                    id,
                    StoredConversation {
                        chat_id: id,
                        product_id: product_id.to_string(),
                        buyer: buyer.to_string(),
                        seller,
                        messages: Vec::new(),
                    },
                );
                info!(chat_id = id, buyer, product_id, "Conversation created");
                id
            }
        };

        let message = self.append_message(chat_id, buyer, content, now)?;
        Ok((chat_id, message))
    }

    /// Append to an existing thread. Fails for unknown chats and non-participants.
    pub fn append_message(
        &self,
        chat_id: i64,
        sender: &str,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<StoredMessage, String> {
        let mut conv = self
            .conversations
            .get_mut(&chat_id)
            .ok_or_else(|| "Chat not found".to_string())?;
        if conv.buyer != sender && conv.seller != sender {
            return Err("Not a participant of this chat".to_string());
        }
        let message = StoredMessage {
            sender: sender.to_string(),
            content: content.to_string(),
            date: now,
        };
        conv.messages.push(message.clone());
        Ok(message)
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}
