use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One buyer-seller thread about a product, as summarized in the inbox list.
/// Field casing follows the backend wire format.
#[derive(Debug, Serialize, Deserialize, Clone)]
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
