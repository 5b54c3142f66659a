use std::sync::Arc;

use tracing::{info, warn};

use civic_api::geocode::ReverseGeocoder;
use civic_types::models::{Coordinates, Place};

use crate::state::PageState;

const IDLE_MESSAGE: &str = "Share your location to see where you are.";

pub struct LocationPage {
    geocoder: Arc<dyn ReverseGeocoder>,
    state: PageState<Place>,
}

impl LocationPage {
    pub fn new(geocoder: Arc<dyn ReverseGeocoder>) -> Self {
        Self {
            geocoder,
            state: PageState::Empty,
        }
    }

    pub fn state(&self) -> &PageState<Place> {
        &self.state
    }

    pub fn banner(&self) -> Option<String> {
        self.state.banner(IDLE_MESSAGE)
    }

    pub async fn locate(&mut self, at: Coordinates) -> &PageState<Place> {
        if !at.is_valid() {
            self.state = PageState::Failed(format!(
                "Invalid coordinates ({}, {})",
                at.latitude, at.longitude
            ));
            return &self.state;
        }

        self.state = PageState::Loading;
        self.state = match self.geocoder.reverse(at).await {
            Ok(place) => {
                info!("Resolved location via {}", place.provider);
                PageState::Loaded(place)
            }
            Err(e) => {
                warn!("Reverse geocoding failed: {}", e);
                PageState::Failed(e.to_string())
            }
        };
        &self.state
    }
}
