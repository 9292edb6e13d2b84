use crate::auth::AppOnlyAuthenticator;
use postscout_core::{
    AppConfig, ConfigError, CoreError, RedditApiError, RedditCredentials, Submission,
    SubmissionPage, DEFAULT_API_BASE, DEFAULT_TOKEN_URL,
};
use reqwest::{redirect, Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const HISTORY_PAGE_SIZE: u32 = 100;
const DEFAULT_RETRY_AFTER: u64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListing<T> {
    pub kind: String,
    pub data: RedditListingData<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingData<T> {
    pub children: Vec<RedditListingChild<T>>,
    #[serde(default)]
    pub after: Option<String>,
    #[serde(default)]
    pub before: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingChild<T> {
    pub kind: String,
    pub data: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditPostData {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    pub subreddit: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub permalink: String,
    pub created_utc: f64,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub ups: i64,
    #[serde(default)]
    pub stickied: bool,
}

/// Which listing a request targets; decides how a 404 is reported.
#[derive(Debug, Clone, Copy)]
enum Target<'a> {
    Subreddit(&'a str),
    User(&'a str),
}

impl Target<'_> {
    fn not_found(self) -> CoreError {
        match self {
            Target::Subreddit(subreddit) => RedditApiError::SubredditNotFound {
                subreddit: subreddit.to_string(),
            },
            Target::User(username) => RedditApiError::UserNotFound {
                username: username.to_string(),
            },
        }
        .into()
    }
}

#[derive(Debug)]
pub struct RedditApiClient {
    http_client: Client,
    auth: AppOnlyAuthenticator,
    api_base: Url,
    user_agent: String,
}

impl RedditApiClient {
    pub fn new(credentials: RedditCredentials) -> Result<Self, CoreError> {
        Self::with_endpoints(credentials, DEFAULT_API_BASE, DEFAULT_TOKEN_URL)
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, CoreError> {
        Self::with_endpoints(
            config.credentials()?,
            &config.reddit.api_base,
            &config.reddit.token_url,
        )
    }

    pub fn with_endpoints(
        credentials: RedditCredentials,
        api_base: &str,
        token_url: &str,
    ) -> Result<Self, CoreError> {
        let api_base = Url::parse(api_base).map_err(|_| ConfigError::InvalidValue {
            field: "reddit.api_base".to_string(),
            value: api_base.to_string(),
        })?;
        if api_base.cannot_be_a_base() {
            return Err(ConfigError::InvalidValue {
                field: "reddit.api_base".to_string(),
                value: api_base.to_string(),
            }
            .into());
        }

        // Reddit answers unknown subreddits with a redirect to search.
        let http_client = Client::builder()
            .user_agent(&credentials.user_agent)
            .timeout(REQUEST_TIMEOUT)
            .redirect(redirect::Policy::none())
            .build()?;

        let auth = AppOnlyAuthenticator::new(&credentials, token_url, http_client.clone())?;

        Ok(Self {
            http_client,
            auth,
            api_base,
            user_agent: credentials.user_agent,
        })
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn authenticator(&self) -> &AppOnlyAuthenticator {
        &self.auth
    }

    fn endpoint_url(&self, segments: &[&str]) -> Url {
        let mut url = self.api_base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn make_request(
        &self,
        target: Target<'_>,
        url: Url,
        query_params: &[(&str, String)],
    ) -> Result<Response, CoreError> {
        let endpoint = url.path().to_string();
        let access_token = self.auth.access_token().await?;

        info!("Making Reddit API request: GET {}", endpoint);
        let response = match self
            .http_client
            .get(url)
            .bearer_auth(&access_token)
            .query(query_params)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!("Network error for GET {}: {}", endpoint, e);
                if e.is_timeout() {
                    return Err(CoreError::RedditApi(RedditApiError::RequestTimeout));
                }
                return Err(CoreError::Network(e));
            }
        };

        let status = response.status();
        if status.is_success() {
            debug!("Request successful: {} {}", status, endpoint);
            return Ok(response);
        }

        warn!("Request failed with status: {} for {}", status, endpoint);
        Err(match status {
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| value.trim().parse::<u64>().ok())
                    .unwrap_or(DEFAULT_RETRY_AFTER);
                RedditApiError::RateLimitExceeded { retry_after }.into()
            }
            StatusCode::UNAUTHORIZED => {
                self.auth.invalidate().await;
                RedditApiError::InvalidToken.into()
            }
            StatusCode::FORBIDDEN => RedditApiError::Forbidden { resource: endpoint }.into(),
            StatusCode::NOT_FOUND => target.not_found(),
            status if status.is_redirection() => target.not_found(),
            status if status.is_server_error() => RedditApiError::ServerError {
                status_code: status.as_u16(),
            }
            .into(),
            status => CoreError::RequestFailed {
                message: format!("GET {} returned {}", endpoint, status),
                status_code: Some(status.as_u16()),
            },
        })
    }

    async fn read_listing(
        response: Response,
        context: &str,
    ) -> Result<RedditListing<RedditPostData>, CoreError> {
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            error!("Failed to parse {}: {}", context, e);
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!("Failed to parse {}", context),
            })
        })
    }

    /// Up to `limit` hot submissions from `subreddit`.
    pub async fn get_hot(&self, subreddit: &str, limit: u32) -> Result<Vec<Submission>, CoreError> {
        let url = self.endpoint_url(&["r", subreddit, "hot"]);
        let params = [("limit", limit.to_string()), ("raw_json", "1".to_string())];

        let response = self
            .make_request(Target::Subreddit(subreddit), url, &params)
            .await?;
        let listing = Self::read_listing(response, &format!("posts for r/{}", subreddit)).await?;

        let submissions: Vec<Submission> = listing
            .data
            .children
            .into_iter()
            .map(|child| child.data.into())
            .take(limit as usize)
            .collect();

        info!("Retrieved {} posts from r/{}", submissions.len(), subreddit);
        Ok(submissions)
    }

    /// One page of `username`'s submissions, newest first.
    pub async fn get_user_submissions(
        &self,
        username: &str,
        after: Option<&str>,
    ) -> Result<SubmissionPage, CoreError> {
        let url = self.endpoint_url(&["user", username, "submitted"]);
        let mut params = vec![
            ("sort", "new".to_string()),
            ("limit", HISTORY_PAGE_SIZE.to_string()),
            ("raw_json", "1".to_string()),
        ];
        if let Some(cursor) = after {
            params.push(("after", cursor.to_string()));
        }

        let response = self
            .make_request(Target::User(username), url, &params)
            .await?;
        let listing = Self::read_listing(response, &format!("submissions for u/{}", username)).await?;

        let page = SubmissionPage {
            after: listing.data.after,
            submissions: listing
                .data
                .children
                .into_iter()
                .map(|child| child.data.into())
                .collect(),
        };

        debug!(
            "Retrieved {} submissions for u/{}",
            page.submissions.len(),
            username
        );
        Ok(page)
    }
}

impl From<RedditPostData> for Submission {
    fn from(post_data: RedditPostData) -> Self {
        let author = post_data
            .author
            .filter(|name| !name.is_empty() && name != "[deleted]");
        let url = if post_data.url.is_empty() {
            format!("https://www.reddit.com{}", post_data.permalink)
        } else {
            post_data.url
        };

        Self {
            id: post_data.id,
            title: post_data.title,
            url,
            author,
            subreddit: post_data.subreddit,
            upvotes: post_data.ups,
            created_utc: post_data.created_utc as i64,
        }
    }
}
