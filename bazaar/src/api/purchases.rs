use serde::Deserialize;

use super::{ApiClient, ApiError};
use crate::models::PurchasedProduct;

#[derive(Debug, Deserialize)]
struct PurchasesEnvelope {
    #[serde(rename = "purchasedProducts", default)]
    purchased_products: Vec<PurchasedProduct>,
}

impl ApiClient {
    /// Everything the logged-in user has bought, most recent purchases as the
    /// backend orders them.
    pub async fn show_purchases(&self) -> Result<Vec<PurchasedProduct>, ApiError> {
        let response = self.get("/purchases/showPurchasedProducts").await?;
        let body: PurchasesEnvelope = response.json().await?;
        Ok(body.purchased_products)
    }
}
