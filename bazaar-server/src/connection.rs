use std::sync::Arc;

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::{accept_hdr_async, tungstenite::Message};
use tracing::{error, info, warn};

use crate::events::{ClientEvent, MessagePush, MessageRecord, ServerEvent};
use crate::state::ServerState;

/// The error message the real backend emits for a joined chat with no history.
/// Clients reinterpret it as an empty conversation, so the wording matters.
pub const NO_MESSAGES_ERROR: &str = "No messages found for this chat";

/// Handle a single WebSocket connection. The session cookie on the upgrade
/// request identifies the user; connections without one are rejected.
pub async fn handle_connection(stream: TcpStream, state: Arc<ServerState>) {
    let mut session_user: Option<String> = None;
    let ws_stream = match accept_hdr_async(stream, |request: &Request, response: Response| {
        session_user = request
            .headers()
            .get("cookie")
            .and_then(|value| value.to_str().ok())
            .and_then(session_from_cookie);
        Ok(response)
    })
    .await
    {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake failed: {}", e);
            return;
        }
    };

    let user_id = match session_user {
        Some(id) => id,
        None => {
            warn!("Connection closed: no session cookie presented");
            return;
        }
    };

    info!("User connected: {}", user_id);

    // Channel for payloads addressed to this connection
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    state.add_client(user_id.clone(), tx.clone());

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // Forward queued payloads to the socket
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            res = ws_receiver.next() => {
                match res {
                    Some(Ok(Message::Text(text))) => {
                        handle_event(&text, &user_id, &state, &tx);
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("User {} sent close frame", user_id);
                        break;
                    }
                    Some(Err(e)) => {
                        error!("WebSocket error for user {}: {}", user_id, e);
                        break;
                    }
                    None => {
                        info!("WebSocket stream ended for user {}", user_id);
                        break;
                    }
                    _ => {}
                }
            }
            _ = &mut send_task => {
                info!("Send task finished for user {} (likely connection lost)", user_id);
                break;
            }
        }
    }

    send_task.abort();
    state.remove_client(&user_id);
    info!("User disconnected: {}", user_id);
}

/// Handle one event from a connected client. Replies (listings, acks, errors)
/// go back on the emitting connection; `message_created` pushes fan out to the
/// other participant's connections.
pub fn handle_event(
    text: &str,
    user_id: &str,
    state: &ServerState,
    reply: &mpsc::UnboundedSender<String>,
) {
    let event: ClientEvent = match serde_json::from_str(text) {
        Ok(event) => event,
        Err(e) => {
            warn!("Failed to parse event from {}: {}", user_id, e);
            return;
        }
    };

    match event {
        ClientEvent::ListConversations => {
            let conversations = state.conversations_for(user_id);
            send(reply, &ServerEvent::ConversationsListed { conversations });
        }
        ClientEvent::JoinConversation { chat_id, .. } => {
            match state.messages_for(user_id, chat_id) {
                Some(messages) if !messages.is_empty() => {
                    let other = state.other_participant(chat_id, user_id);
                    send(
                        reply,
                        &ServerEvent::MessagesListed {
                            chat_id,
                            messages,
                            current_user_image: state.avatar(user_id),
                            other_user_image: other.and_then(|o| state.avatar(&o)),
                        },
                    );
                }
                Some(_) => {
                    send(
                        reply,
                        &ServerEvent::Error {
                            message: NO_MESSAGES_ERROR.to_string(),
                        },
                    );
                }
                None => {
                    send(
                        reply,
                        &ServerEvent::Error {
                            message: "Chat not found".to_string(),
                        },
                    );
                }
            }
        }
        ClientEvent::CreateConversationAndMessage {
            ack,
            product_id,
            content,
        } => match state.create_conversation(user_id, &product_id, &content, Utc::now()) {
            Ok((chat_id, stored)) => {
                send(
                    reply,
                    &ServerEvent::Ack {
                        id: ack,
                        success: true,
                        chat_id: Some(chat_id),
                        message: Some(MessageRecord {
                            content: stored.content.clone(),
                            is_current_user: true,
                            created_at: Some(stored.date),
                        }),
                        error: None,
                    },
                );
                push_to_other(state, chat_id, user_id, &stored.content, stored.date);
            }
            Err(reason) => send_failure(reply, ack, reason),
        },
        ClientEvent::SendMessage {
            ack,
            chat_id,
            content,
        } => match state.append_message(chat_id, user_id, &content, Utc::now()) {
            Ok(stored) => {
                send(
                    reply,
                    &ServerEvent::Ack {
                        id: ack,
                        success: true,
                        chat_id: None,
                        message: Some(MessageRecord {
                            content: stored.content.clone(),
                            is_current_user: true,
                            created_at: Some(stored.date),
                        }),
                        error: None,
                    },
                );
                push_to_other(state, chat_id, user_id, &stored.content, stored.date);
            }
            Err(reason) => send_failure(reply, ack, reason),
        },
    }
}

/// Notify the other participant of a new message on all their connections.
fn push_to_other(
    state: &ServerState,
    chat_id: i64,
    sender: &str,
    content: &str,
    date: chrono::DateTime<Utc>,
) {
    if let Some(other) = state.other_participant(chat_id, sender) {
        let event = ServerEvent::MessageCreated {
            data: MessagePush {
                chat_id,
                content: content.to_string(),
                is_current_user: false,
                created_at: Some(date),
            },
        };
        match serde_json::to_string(&event) {
            Ok(json) => {
                state.send_to_user(&other, &json);
            }
            Err(e) => error!("Failed to serialize push for chat {}: {}", chat_id, e),
        }
    }
}

fn send_failure(reply: &mpsc::UnboundedSender<String>, ack: u64, reason: String) {
    send(
        reply,
        &ServerEvent::Ack {
            id: ack,
            success: false,
            chat_id: None,
            message: None,
            error: Some(reason),
        },
    );
}

fn send(reply: &mpsc::UnboundedSender<String>, event: &ServerEvent) {
    match serde_json::to_string(event) {
        Ok(json) => {
            let _ = reply.send(json);
        }
        Err(e) => error!("Failed to serialize event: {}", e),
    }
}

/// Pull the `session` cookie value out of a Cookie header.
fn session_from_cookie(header: &str) -> Option<String> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == "session")
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}
