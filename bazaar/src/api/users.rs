use serde_json::json;

use super::{confirmation, ApiClient, ApiError};
use crate::models::input::{ValidateExt, VerifyAccountInput};

impl ApiClient {
    /// Confirm a freshly registered account with the emailed code. Returns
    /// the backend's confirmation message; a rejected code arrives as
    /// [`ApiError::Status`] carrying the backend's explanation.
    pub async fn verify_account(&self, email: &str, code: &str) -> Result<String, ApiError> {
        let input = VerifyAccountInput {
            email: email.to_string(),
            code: code.to_string(),
        };
        input.validate_input().map_err(ApiError::Invalid)?;

        let response = self
            .post_json("/users/verify", &json!({ "email": email, "code": code }))
            .await?;
        confirmation(response).await
    }
}
