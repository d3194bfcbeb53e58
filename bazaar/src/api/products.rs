use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;

use super::{confirmation, ApiClient, ApiError};
use crate::models::input::{CartQuantityInput, ProductForm, ValidateExt};
use crate::models::{BaseProduct, Category, Product};

/// An image attached to a product form, uploaded as a multipart file part.
#[derive(Debug, Clone)]
pub struct ProductImage {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Deserialize)]
struct UserProductsEnvelope {
    // The backend names this field `product`, singular, for the whole list.
    #[serde(default)]
    product: Vec<BaseProduct>,
}

#[derive(Debug, Deserialize)]
struct ProductEnvelope {
    product: Product,
}

#[derive(Debug, Deserialize)]
struct CategoriesEnvelope {
    #[serde(default)]
    categories: Vec<Category>,
}

impl ApiClient {
    /// Products the logged-in user is selling.
    pub async fn show_user_products(&self) -> Result<Vec<BaseProduct>, ApiError> {
        let response = self.get("/products/showUserProducts").await?;
        let body: UserProductsEnvelope = response.json().await?;
        Ok(body.product)
    }

    /// Full detail of one product.
    pub async fn show_product(&self, productid: &str) -> Result<Product, ApiError> {
        let response = self
            .post_json("/products/showProduct", &json!({ "productid": productid }))
            .await?;
        let body: ProductEnvelope = response.json().await?;
        Ok(body.product)
    }

    pub async fn show_categories(&self) -> Result<Vec<Category>, ApiError> {
        let response = self.get("/products/showCategories").await?;
        let body: CategoriesEnvelope = response.json().await?;
        Ok(body.categories)
    }

    /// Put a new product on sale. Returns the backend's confirmation message.
    pub async fn create_product(
        &self,
        form: &ProductForm,
        images: Vec<ProductImage>,
    ) -> Result<String, ApiError> {
        form.validate_input().map_err(ApiError::Invalid)?;
        let multipart = product_form(form, images);
        let response = self.post_multipart("/products/create", multipart).await?;
        confirmation(response).await
    }

    /// Update an existing product.
    pub async fn update_product(
        &self,
        productid: &str,
        form: &ProductForm,
        images: Vec<ProductImage>,
    ) -> Result<String, ApiError> {
        form.validate_input().map_err(ApiError::Invalid)?;
        let multipart = product_form(form, images).text("productid", productid.to_string());
        let response = self.post_multipart("/products/update", multipart).await?;
        confirmation(response).await
    }

    pub async fn delete_product(&self, productid: &str) -> Result<String, ApiError> {
        let response = self
            .post_json("/products/delete", &json!({ "productid": productid }))
            .await?;
        confirmation(response).await
    }

    /// Set a product's quantity in the user's cart. Quantity zero removes it.
    pub async fn alter_product_in_cart(
        &self,
        productid: &str,
        quantity: i64,
    ) -> Result<String, ApiError> {
        let input = CartQuantityInput {
            productid: productid.to_string(),
            quantity,
        };
        input.validate_input().map_err(ApiError::Invalid)?;

        let response = self
            .post_json(
                "/products/alterProductToCart",
                &json!({ "productid": productid, "quantity": quantity }),
            )
            .await?;
        confirmation(response).await
    }
}

/// The multipart body shared by create and update, mirroring the form the
/// backend expects: scalar fields as text parts, every image under `images`.
fn product_form(form: &ProductForm, images: Vec<ProductImage>) -> Form {
    let mut multipart = Form::new()
        .text("name", form.name.clone())
        .text("description", form.description.clone())
        .text("price", form.price.to_string())
        .text("stock", form.stock.to_string())
        .text("categoryid", form.categoryid.to_string());

    for image in images {
        multipart = multipart.part("images", Part::bytes(image.bytes).file_name(image.file_name));
    }
    multipart
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_products_envelope_uses_singular_field() {
        let json = r#"{"product": [
            {"productid": "p-1", "name": "Lamp", "price": 19.99, "imageurls": ["a.png"]}
        ]}"#;

        let body: UserProductsEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(body.product.len(), 1);
        assert_eq!(body.product[0].name, "Lamp");
        assert_eq!(body.product[0].imageurls, vec!["a.png"]);
    }

    #[test]
    fn test_user_products_envelope_tolerates_missing_list() {
        let body: UserProductsEnvelope = serde_json::from_str("{}").unwrap();
        assert!(body.product.is_empty());
    }

    #[test]
    fn test_product_envelope() {
        let json = r#"{"product": {
            "productid": "p-1", "name": "Lamp", "description": "A lamp.",
            "price": 19.99, "stock": 3, "categoryid": 2, "imageurls": []
        }}"#;

        let body: ProductEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(body.product.stock, 3);
        assert_eq!(body.product.categoryid, 2);
    }

    #[test]
    fn test_categories_envelope() {
        let json = r#"{"categories": [
            {"categoryid": 1, "category": "Electronics"},
            {"categoryid": 2, "category": "Home"}
        ]}"#;

        let body: CategoriesEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(body.categories.len(), 2);
        assert_eq!(body.categories[1].category, "Home");
    }
}
