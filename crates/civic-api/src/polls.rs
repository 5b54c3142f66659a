use civic_types::api::{PostResults, PostsResponse, ResultsResponse, VoteRequest, VoteResponse};
use civic_types::models::Post;

use crate::client::ApiClient;
use crate::error::ApiError;

impl ApiClient {
    pub async fn get_posts(&self) -> Result<Vec<Post>, ApiError> {
        let resp: PostsResponse = self.get_json(&["post", "survey-and-poll-posts"]).await?;
        Ok(resp.posts)
    }

    /// Votes are tied to the signed-in user, so this fails locally without a token.
    pub async fn cast_vote(&self, post_id: &str, vote: &VoteRequest) -> Result<VoteResponse, ApiError> {
        self.require_token()?;
        self.post_json(&["post", post_id, "vote"], vote).await
    }

    pub async fn get_results(&self, post_id: &str) -> Result<PostResults, ApiError> {
        let resp: ResultsResponse = self.get_json(&["post", post_id, "results"]).await?;
        Ok(resp.results)
    }
}
