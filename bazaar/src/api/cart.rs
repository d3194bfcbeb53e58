use serde::Deserialize;
use serde_json::json;

use super::{confirmation, ApiClient, ApiError};
use crate::models::CartProduct;

#[derive(Debug, Deserialize)]
struct CartEnvelope {
    #[serde(rename = "cartProducts", default)]
    cart_products: Vec<CartProduct>,
}

impl ApiClient {
    /// The logged-in user's cart.
    pub async fn show_cart(&self) -> Result<Vec<CartProduct>, ApiError> {
        let response = self.get("/cart/showUserProducts").await?;
        let body: CartEnvelope = response.json().await?;
        Ok(body.cart_products)
    }

    /// Remove a product from the cart entirely.
    pub async fn remove_from_cart(&self, productid: &str) -> Result<String, ApiError> {
        let response = self
            .post_json("/cart/deleteProduct", &json!({ "productid": productid }))
            .await?;
        confirmation(response).await
    }

    /// Check out the whole cart.
    pub async fn buy_products(&self) -> Result<(), ApiError> {
        self.get("/cart/buyProducts").await?;
        Ok(())
    }
}
