use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use civic_api::CivicApi;
use civic_types::models::Announcement;

use crate::carousel::Carousel;
use crate::format::{capitalize, relative_time, truncate};
use crate::search;
use crate::state::PageState;

const EMPTY_MESSAGE: &str = "No announcements yet.";
const SUMMARY_CHARS: usize = 120;

/// One announcement as the list shows it.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnouncementCard {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub location: Option<String>,
    pub image: Option<String>,
    pub posted: Option<String>,
}

pub struct AnnouncementsPage {
    api: Arc<dyn CivicApi>,
    state: PageState<Vec<Announcement>>,
    query: String,
    carousel: Carousel,
}

impl AnnouncementsPage {
    pub fn new(api: Arc<dyn CivicApi>) -> Self {
        Self {
            api,
            state: PageState::Loading,
            query: String::new(),
            carousel: Carousel::default(),
        }
    }

    pub async fn load(&mut self) {
        self.state = PageState::Loading;
        let result = self.api.announcements().await;
        match &result {
            Ok(list) => info!("Loaded {} announcements", list.len()),
            Err(e) => warn!("Failed to load announcements: {}", e),
        }
        self.state = PageState::from_result(result);
        self.carousel = Carousel::new(self.visible().len());
    }

    pub fn state(&self) -> &PageState<Vec<Announcement>> {
        &self.state
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
        let len = self.visible().len();
        self.carousel.reset(len);
    }

    pub fn visible(&self) -> Vec<&Announcement> {
        search::filter(self.state.items(), &self.query, |a| {
            vec![
                a.title.as_str(),
                a.description.as_str(),
                a.location.as_deref().unwrap_or_default(),
            ]
        })
    }

    /// Currently featured announcement in the carousel.
    pub fn featured(&self) -> Option<&Announcement> {
        let index = self.carousel.index()?;
        self.visible().get(index).copied()
    }

    pub fn next(&mut self) {
        self.carousel.next();
    }

    pub fn prev(&mut self) {
        self.carousel.prev();
    }

    pub fn go_to(&mut self, index: usize) {
        self.carousel.go_to(index);
    }

    pub fn cards(&self, now: DateTime<Utc>) -> Vec<AnnouncementCard> {
        self.visible()
            .into_iter()
            .map(|a| AnnouncementCard {
                id: a.id.clone(),
                title: capitalize(&a.title),
                summary: truncate(&a.description, SUMMARY_CHARS),
                location: a.location.clone(),
                image: a.image.clone(),
                posted: a.created_at.map(|t| relative_time(t, now)),
            })
            .collect()
    }

    pub fn banner(&self) -> Option<String> {
        if let Some(text) = self.state.banner(EMPTY_MESSAGE) {
            return Some(text);
        }
        if self.visible().is_empty() {
            return Some(format!("No announcements match \"{}\".", self.query.trim()));
        }
        None
    }
}
