use std::sync::Arc;

use tracing::{info, warn};

use civic_api::CivicApi;
use civic_types::models::EmergencyService;

use crate::search;
use crate::state::PageState;

const EMPTY_MESSAGE: &str = "No emergency services listed.";

pub struct EmergencyPage {
    api: Arc<dyn CivicApi>,
    state: PageState<Vec<EmergencyService>>,
    query: String,
}

impl EmergencyPage {
    pub fn new(api: Arc<dyn CivicApi>) -> Self {
        Self {
            api,
            state: PageState::Loading,
            query: String::new(),
        }
    }

    pub async fn load(&mut self) {
        self.state = PageState::Loading;
        let result = self.api.emergency_services().await;
        match &result {
            Ok(list) => info!("Loaded {} emergency services", list.len()),
            Err(e) => warn!("Failed to load emergency services: {}", e),
        }
        self.state = PageState::from_result(result);
    }

    pub fn state(&self) -> &PageState<Vec<EmergencyService>> {
        &self.state
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    pub fn visible(&self) -> Vec<&EmergencyService> {
        search::filter(self.state.items(), &self.query, |s| {
            vec![s.title.as_str(), s.location.as_str(), s.contact.as_str()]
        })
    }

    pub fn banner(&self) -> Option<String> {
        if let Some(text) = self.state.banner(EMPTY_MESSAGE) {
            return Some(text);
        }
        if self.visible().is_empty() {
            return Some(format!("No services match \"{}\".", self.query.trim()));
        }
        None
    }
}
