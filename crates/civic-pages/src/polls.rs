use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use civic_api::{ApiError, CivicApi};
use civic_types::api::{PostResults, VoteRequest, VoteResponse};
use civic_types::models::{Post, PostKind};

use crate::search;
use crate::state::{PageState, Toast};

const EMPTY_MESSAGE: &str = "No polls or surveys right now.";
const DEFAULT_RATING_SCALE: u8 = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KindFilter {
    #[default]
    All,
    Polls,
    Surveys,
}

impl KindFilter {
    fn admits(self, kind: PostKind) -> bool {
        match self {
            Self::All => true,
            Self::Polls => kind == PostKind::Poll,
            Self::Surveys => kind == PostKind::Survey,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum VoteError {
    #[error("posts are not loaded")]
    NotLoaded,

    #[error("unknown post {0}")]
    UnknownPost(String),

    #[error("you already voted on this post")]
    AlreadyVoted,

    #[error("\"{0}\" is not an option of this poll")]
    UnknownOption(String),

    #[error("rating {rating} is outside 1..={scale}")]
    RatingOutOfRange { rating: u8, scale: u8 },

    #[error("response is empty")]
    EmptyResponse,

    #[error("this kind of answer does not apply to a {0:?}")]
    WrongKind(PostKind),

    #[error("{0}")]
    Api(String),
}

/// A vote applied locally but not yet confirmed by the server. Holds the
/// post as it was so a failed request can be undone.
#[derive(Debug, Clone)]
pub struct PendingVote {
    pub update_id: Uuid,
    pub post_id: String,
    pub request: VoteRequest,
    pub original: Post,
    pub created_at: DateTime<Utc>,
}

pub struct PollsPage {
    api: Arc<dyn CivicApi>,
    state: PageState<Vec<Post>>,
    filter: KindFilter,
    query: String,
    results: HashMap<String, PostResults>,
    toast: Option<Toast>,
}

impl PollsPage {
    pub fn new(api: Arc<dyn CivicApi>) -> Self {
        Self {
            api,
            state: PageState::Loading,
            filter: KindFilter::All,
            query: String::new(),
            results: HashMap::new(),
            toast: None,
        }
    }

    pub async fn load(&mut self) {
        self.state = PageState::Loading;
        let result = self.api.posts().await;
        match &result {
            Ok(posts) => info!("Loaded {} posts", posts.len()),
            Err(e) => warn!("Failed to load posts: {}", e),
        }
        self.state = PageState::from_result(result);
    }

    pub fn state(&self) -> &PageState<Vec<Post>> {
        &self.state
    }

    pub fn set_filter(&mut self, filter: KindFilter) {
        self.filter = filter;
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    pub fn visible(&self) -> Vec<&Post> {
        search::filter(self.state.items(), &self.query, |p| {
            vec![p.title.as_str(), p.description.as_str()]
        })
        .into_iter()
        .filter(|p| self.filter.admits(p.kind))
        .collect()
    }

    pub fn post(&self, post_id: &str) -> Option<&Post> {
        self.state.items().iter().find(|p| p.id == post_id)
    }

    pub fn results(&self, post_id: &str) -> Option<&PostResults> {
        self.results.get(post_id)
    }

    /// Take the pending notification, if any.
    pub fn take_toast(&mut self) -> Option<Toast> {
        self.toast.take()
    }

    pub fn banner(&self) -> Option<String> {
        self.state.banner(EMPTY_MESSAGE)
    }

    /// Vote and wait for the server. The tally moves before the request is
    /// sent and moves back if it fails.
    pub async fn vote(&mut self, post_id: &str, vote: VoteRequest) -> Result<(), VoteError> {
        let pending = self.begin_vote(post_id, vote)?;
        let result = self.api.vote(&pending.post_id, &pending.request).await;
        self.finish_vote(pending, result)
    }

    /// Validate and apply a vote locally.
    pub fn begin_vote(&mut self, post_id: &str, vote: VoteRequest) -> Result<PendingVote, VoteError> {
        let posts = self.state.loaded_mut().ok_or(VoteError::NotLoaded)?;
        let post = posts
            .iter_mut()
            .find(|p| p.id == post_id)
            .ok_or_else(|| VoteError::UnknownPost(post_id.to_string()))?;

        if post.has_voted {
            return Err(VoteError::AlreadyVoted);
        }
        validate(post, &vote)?;

        let original = post.clone();
        if let VoteRequest::Option(text) = &vote {
            if let Some(option) = post.option_mut(text) {
                option.votes += 1;
            }
        }
        post.has_voted = true;

        Ok(PendingVote {
            update_id: Uuid::new_v4(),
            post_id: post_id.to_string(),
            request: vote,
            original,
            created_at: Utc::now(),
        })
    }

    /// Settle a pending vote with the server's answer.
    pub fn finish_vote(
        &mut self,
        pending: PendingVote,
        result: Result<VoteResponse, ApiError>,
    ) -> Result<(), VoteError> {
        match result {
            Ok(resp) => {
                info!("Vote {} on {} confirmed", pending.update_id, pending.post_id);
                self.toast = Some(Toast::info(
                    resp.message.unwrap_or_else(|| "Thanks for voting!".into()),
                ));
                Ok(())
            }
            Err(e) => {
                warn!("Vote {} on {} failed, rolling back: {}", pending.update_id, pending.post_id, e);
                if let Some(post) = self
                    .state
                    .loaded_mut()
                    .and_then(|posts| posts.iter_mut().find(|p| p.id == pending.post_id))
                {
                    *post = pending.original;
                }
                self.toast = Some(Toast::error(format!("Your vote was not recorded: {}", e)));
                Err(VoteError::Api(e.to_string()))
            }
        }
    }

    pub async fn load_results(&mut self, post_id: &str) -> Option<&PostResults> {
        match self.api.results(post_id).await {
            Ok(results) => {
                self.results.insert(post_id.to_string(), results);
                self.results.get(post_id)
            }
            Err(e) => {
                warn!("Failed to load results for {}: {}", post_id, e);
                self.toast = Some(Toast::error(format!("Could not load results: {}", e)));
                None
            }
        }
    }
}

fn validate(post: &Post, vote: &VoteRequest) -> Result<(), VoteError> {
    match (post.kind, vote) {
        (PostKind::Poll, VoteRequest::Option(text)) => {
            if post.options.iter().any(|o| &o.text == text) {
                Ok(())
            } else {
                Err(VoteError::UnknownOption(text.clone()))
            }
        }
        (PostKind::Survey, VoteRequest::Response(text)) => {
            if text.trim().is_empty() {
                Err(VoteError::EmptyResponse)
            } else {
                Ok(())
            }
        }
        (PostKind::Survey, VoteRequest::Rating(rating)) => {
            let scale = post.rating_scale.unwrap_or(DEFAULT_RATING_SCALE);
            if (1..=scale).contains(rating) {
                Ok(())
            } else {
                Err(VoteError::RatingOutOfRange {
                    rating: *rating,
                    scale,
                })
            }
        }
        (kind, _) => Err(VoteError::WrongKind(kind)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ToastLevel;
    use crate::testing::FakeApi;
    use civic_types::models::PollOption;

    fn poll(id: &str, title: &str) -> Post {
        Post {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            kind: PostKind::Poll,
            options: vec![
                PollOption { text: "Yes".into(), votes: 4 },
                PollOption { text: "No".into(), votes: 2 },
            ],
            rating_scale: None,
            has_voted: false,
            created_at: None,
        }
    }

    fn survey(id: &str, title: &str) -> Post {
        Post {
            kind: PostKind::Survey,
            options: vec![],
            rating_scale: Some(10),
            ..poll(id, title)
        }
    }

    async fn loaded(api: FakeApi) -> (PollsPage, Arc<FakeApi>) {
        *api.posts.lock().unwrap() = Ok(vec![
            poll("p1", "New skate park?"),
            survey("s1", "Rate the bus service"),
            poll("p2", "Extend library hours?"),
        ]);
        let api = Arc::new(api);
        let mut page = PollsPage::new(api.clone());
        page.load().await;
        (page, api)
    }

    fn yes_votes(page: &PollsPage, id: &str) -> u64 {
        page.post(id).unwrap().options[0].votes
    }

    #[tokio::test]
    async fn tally_moves_before_confirmation() {
        let (mut page, _) = loaded(FakeApi::new()).await;

        let pending = page.begin_vote("p1", VoteRequest::Option("Yes".into())).unwrap();
        assert_eq!(yes_votes(&page, "p1"), 5);
        assert!(page.post("p1").unwrap().has_voted);

        page.finish_vote(pending, Ok(VoteResponse { message: Some("Vote recorded".into()) }))
            .unwrap();
        assert_eq!(yes_votes(&page, "p1"), 5);
        assert_eq!(page.take_toast(), Some(Toast::info("Vote recorded")));
    }

    #[tokio::test]
    async fn failed_vote_rolls_back() {
        let api = FakeApi::new();
        *api.vote.lock().unwrap() = Err("database offline".into());
        let (mut page, api) = loaded(api).await;

        let err = page.vote("p1", VoteRequest::Option("Yes".into())).await.unwrap_err();
        assert!(matches!(err, VoteError::Api(m) if m.contains("database offline")));
        assert_eq!(yes_votes(&page, "p1"), 4);
        assert!(!page.post("p1").unwrap().has_voted);

        let toast = page.take_toast().unwrap();
        assert_eq!(toast.level, ToastLevel::Error);
        assert_eq!(api.votes.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn second_vote_is_refused_locally() {
        let (mut page, api) = loaded(FakeApi::new()).await;
        page.vote("p1", VoteRequest::Option("No".into())).await.unwrap();
        assert_eq!(
            page.vote("p1", VoteRequest::Option("Yes".into())).await,
            Err(VoteError::AlreadyVoted)
        );
        assert_eq!(api.votes.lock().unwrap().len(), 1);
        assert_eq!(page.post("p1").unwrap().total_votes(), 7);
    }

    #[tokio::test]
    async fn invalid_answers_are_refused_locally() {
        let (mut page, api) = loaded(FakeApi::new()).await;

        assert_eq!(
            page.vote("s1", VoteRequest::Rating(11)).await,
            Err(VoteError::RatingOutOfRange { rating: 11, scale: 10 })
        );
        assert_eq!(
            page.vote("s1", VoteRequest::Rating(0)).await,
            Err(VoteError::RatingOutOfRange { rating: 0, scale: 10 })
        );
        assert_eq!(
            page.vote("s1", VoteRequest::Response("  ".into())).await,
            Err(VoteError::EmptyResponse)
        );
        assert_eq!(
            page.vote("p1", VoteRequest::Option("Maybe".into())).await,
            Err(VoteError::UnknownOption("Maybe".into()))
        );
        assert_eq!(
            page.vote("p1", VoteRequest::Rating(3)).await,
            Err(VoteError::WrongKind(PostKind::Poll))
        );
        assert!(matches!(
            page.vote("nope", VoteRequest::Rating(3)).await,
            Err(VoteError::UnknownPost(_))
        ));
        assert!(api.votes.lock().unwrap().is_empty());

        page.vote("s1", VoteRequest::Rating(10)).await.unwrap();
        assert!(page.post("s1").unwrap().has_voted);
    }

    #[tokio::test]
    async fn vote_before_load_is_refused() {
        let mut page = PollsPage::new(Arc::new(FakeApi::new()));
        assert_eq!(
            page.vote("p1", VoteRequest::Option("Yes".into())).await,
            Err(VoteError::NotLoaded)
        );
    }

    #[tokio::test]
    async fn kind_filter_combines_with_search() {
        let (mut page, _) = loaded(FakeApi::new()).await;
        assert_eq!(page.visible().len(), 3);

        page.set_filter(KindFilter::Polls);
        assert_eq!(page.visible().len(), 2);

        page.set_query("library");
        let ids: Vec<&str> = page.visible().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p2"]);

        page.set_filter(KindFilter::Surveys);
        assert!(page.visible().is_empty());

        page.set_query("");
        assert_eq!(page.visible()[0].id, "s1");
    }

    #[tokio::test]
    async fn results_are_kept_per_post() {
        let api = FakeApi::new();
        *api.results.lock().unwrap() = Ok(PostResults::Responses(vec!["more buses".into()]));
        let (mut page, _) = loaded(api).await;

        assert!(page.results("s1").is_none());
        assert!(page.load_results("s1").await.is_some());
        assert_eq!(
            page.results("s1"),
            Some(&PostResults::Responses(vec!["more buses".into()]))
        );
        assert!(page.results("p1").is_none());
    }

    #[tokio::test]
    async fn failed_results_raise_a_toast() {
        let (mut page, _) = loaded(FakeApi::new()).await;
        assert!(page.load_results("p1").await.is_none());
        assert_eq!(page.take_toast().unwrap().level, ToastLevel::Error);
    }
}
