use civic_types::api::AnnouncementsResponse;
use civic_types::models::Announcement;

use crate::client::ApiClient;
use crate::error::ApiError;

impl ApiClient {
    pub async fn get_announcements(&self) -> Result<Vec<Announcement>, ApiError> {
        let resp: AnnouncementsResponse = self.get_json(&["post", "announcements", "all"]).await?;
        Ok(resp.announcements)
    }
}
