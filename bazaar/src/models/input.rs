//! Input DTOs with garde validation.
//!
//! These structs validate user-entered data client-side, before anything is
//! emitted on the channel or sent to the data service.

use garde::Validate;
use serde::Deserialize;

/// Validation constants
const MAX_MESSAGE_LENGTH: usize = 2000;
const MAX_PRODUCT_ID_LENGTH: usize = 64;
const MAX_PRODUCT_NAME_LENGTH: usize = 120;
const MAX_DESCRIPTION_LENGTH: usize = 2000;
const MAX_CART_QUANTITY: i64 = 999;

/// Chat message text. Callers trim before validating, so a minimum length of
/// one rejects whitespace-only input.
#[derive(Debug, Deserialize, Validate)]
#[garde(context(()))]
pub struct SendMessageInput {
    #[garde(length(min = 1, max = MAX_MESSAGE_LENGTH))]
    pub content: String,
}

/// Fields of `/products/create` and `/products/update`.
#[derive(Debug, Deserialize, Validate)]
#[garde(context(()))]
pub struct ProductForm {
    #[garde(length(min = 1, max = MAX_PRODUCT_NAME_LENGTH))]
    pub name: String,
    #[garde(length(max = MAX_DESCRIPTION_LENGTH))]
    pub description: String,
    #[garde(range(min = 0.0))]
    pub price: f64,
    #[garde(range(min = 0))]
    pub stock: i64,
    #[garde(range(min = 1))]
    pub categoryid: i64,
}

/// Cart quantity change for `/products/alterProductToCart`. Quantity zero
/// means "remove from cart" on the backend.
#[derive(Debug, Deserialize, Validate)]
#[garde(context(()))]
pub struct CartQuantityInput {
    #[garde(length(min = 1, max = MAX_PRODUCT_ID_LENGTH))]
    pub productid: String,
    #[garde(range(min = 0, max = MAX_CART_QUANTITY))]
    pub quantity: i64,
}

/// Account verification for `/users/verify`.
#[derive(Debug, Deserialize, Validate)]
#[garde(context(()))]
pub struct VerifyAccountInput {
    #[garde(email)]
    pub email: String,
    #[garde(length(min = 4, max = 12), ascii)]
    pub code: String,
}

/// Helper trait to convert garde validation errors to String
pub trait ValidateExt {
    fn validate_input(&self) -> Result<(), String>;
}

impl<T: Validate<Context = ()>> ValidateExt for T {
    fn validate_input(&self) -> Result<(), String> {
        self.validate().map_err(|e| e.to_string())
    }
}
