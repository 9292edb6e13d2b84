use crate::api::RedditApiClient;
use discovery_engine::FeedProvider;
use postscout_core::{CoreError, Submission, SubmissionPage};

impl FeedProvider for RedditApiClient {
    async fn hot(&self, subreddit: &str, limit: u32) -> Result<Vec<Submission>, CoreError> {
        self.get_hot(subreddit, limit).await
    }

    async fn user_submissions(
        &self,
        username: &str,
        after: Option<&str>,
    ) -> Result<SubmissionPage, CoreError> {
        self.get_user_submissions(username, after).await
    }
}
