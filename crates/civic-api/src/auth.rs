use civic_types::api::{VerificationRequest, VerificationResponse};

use crate::client::ApiClient;
use crate::error::ApiError;

impl ApiClient {
    pub async fn submit_verification(&self, code: &str) -> Result<VerificationResponse, ApiError> {
        let req = VerificationRequest {
            verification_code: code.to_string(),
        };
        let resp: VerificationResponse = self
            .post_json(&["user", "register", "verification"], &req)
            .await?;

        if resp.success == Some(false) {
            return Err(ApiError::Rejected(
                resp.message.unwrap_or_else(|| "verification failed".into()),
            ));
        }
        Ok(resp)
    }
}
