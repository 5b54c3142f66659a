use std::sync::Arc;

use tracing::{info, warn};

use civic_api::CivicApi;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationState {
    Idle,
    Verified(String),
    Failed(String),
}

/// Confirms a registration with the code the user received by email.
pub struct VerificationPage {
    api: Arc<dyn CivicApi>,
    state: VerificationState,
}

impl VerificationPage {
    pub fn new(api: Arc<dyn CivicApi>) -> Self {
        Self {
            api,
            state: VerificationState::Idle,
        }
    }

    pub fn state(&self) -> &VerificationState {
        &self.state
    }

    pub async fn submit(&mut self, code: &str) -> &VerificationState {
        let code = code.trim();
        if code.is_empty() || !code.chars().all(|c| c.is_ascii_digit()) {
            self.state = VerificationState::Failed("Enter the numeric code from your email.".into());
            return &self.state;
        }

        self.state = match self.api.verify_registration(code).await {
            Ok(resp) => {
                info!("Registration verified");
                VerificationState::Verified(resp.message.unwrap_or_else(|| "Account verified.".into()))
            }
            Err(e) => {
                warn!("Verification failed: {}", e);
                VerificationState::Failed(e.to_string())
            }
        };
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeApi;
    use civic_types::api::VerificationResponse;

    #[tokio::test]
    async fn malformed_codes_never_reach_the_server() {
        let api = Arc::new(FakeApi::new());
        let mut page = VerificationPage::new(api.clone());

        for code in ["", "   ", "12a456", "12 34"] {
            assert!(matches!(page.submit(code).await, VerificationState::Failed(_)), "{:?}", code);
        }
        assert!(api.codes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn trimmed_code_is_submitted() {
        let api = FakeApi::new();
        *api.verification.lock().unwrap() = Ok(VerificationResponse {
            success: Some(true),
            message: Some("Welcome aboard".into()),
        });
        let api = Arc::new(api);
        let mut page = VerificationPage::new(api.clone());

        let state = page.submit(" 123456\n").await.clone();
        assert_eq!(state, VerificationState::Verified("Welcome aboard".into()));
        assert_eq!(api.codes.lock().unwrap().as_slice(), ["123456".to_string()]);
    }

    #[tokio::test]
    async fn server_rejection_is_shown() {
        let api = FakeApi::new();
        *api.verification.lock().unwrap() = Err("Invalid code".into());
        let mut page = VerificationPage::new(Arc::new(api));
        page.submit("000000").await;
        assert!(matches!(page.state(), VerificationState::Failed(m) if m.contains("Invalid code")));
    }
}
