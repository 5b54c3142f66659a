use civic_types::api::EmergencyServicesResponse;
use civic_types::models::EmergencyService;

use crate::client::ApiClient;
use crate::error::ApiError;

impl ApiClient {
    /// The emergency endpoint reports failure in-band with `success: false`.
    pub async fn get_emergency_services(&self) -> Result<Vec<EmergencyService>, ApiError> {
        let resp: EmergencyServicesResponse = self
            .get_json(&["emergency", "get-all-emergency-services"])
            .await?;
        if !resp.success {
            return Err(ApiError::Rejected(
                resp.message
                    .unwrap_or_else(|| "emergency services are unavailable".into()),
            ));
        }
        Ok(resp.data)
    }
}
