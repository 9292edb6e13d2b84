//! App-only OAuth2 authentication.
//!
//! Reddit's "application only" flow is a plain client-credentials grant
//! authenticated with HTTP basic auth. The bearer token is cached and
//! re-acquired shortly before it expires or after the API rejects it.

use oauth2::basic::BasicClient;
use oauth2::{AuthUrl, ClientId, ClientSecret, HttpRequest, HttpResponse, TokenResponse, TokenUrl};
use postscout_core::{ConfigError, CoreError, RedditApiError, RedditCredentials};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, error, info};

const REDDIT_AUTHORIZE_URL: &str = "https://www.reddit.com/api/v1/authorize";

/// Tokens are refreshed this long before Reddit would expire them.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

#[derive(Debug)]
pub struct AppOnlyAuthenticator {
    oauth_client: BasicClient,
    http_client: reqwest::Client,
    token: RwLock<Option<CachedToken>>,
}

impl AppOnlyAuthenticator {
    pub fn new(
        credentials: &RedditCredentials,
        token_url: &str,
        http_client: reqwest::Client,
    ) -> Result<Self, CoreError> {
        let auth_url = AuthUrl::new(REDDIT_AUTHORIZE_URL.to_string()).map_err(|e| {
            ConfigError::InvalidValue {
                field: "reddit.authorize_url".to_string(),
                value: e.to_string(),
            }
        })?;
        let token_url =
            TokenUrl::new(token_url.to_string()).map_err(|_| ConfigError::InvalidValue {
                field: "reddit.token_url".to_string(),
                value: token_url.to_string(),
            })?;

        let oauth_client = BasicClient::new(
            ClientId::new(credentials.client_id.clone()),
            Some(ClientSecret::new(credentials.client_secret.clone())),
            auth_url,
            Some(token_url),
        );

        Ok(Self {
            oauth_client,
            http_client,
            token: RwLock::new(None),
        })
    }

    /// Returns a valid bearer token, requesting a new one when needed.
    pub async fn access_token(&self) -> Result<String, CoreError> {
        if let Some(token) = self.token.read().await.as_ref() {
            if token.is_fresh() {
                return Ok(token.access_token.clone());
            }
        }

        let mut cached = self.token.write().await;
        if let Some(token) = cached.as_ref() {
            if token.is_fresh() {
                return Ok(token.access_token.clone());
            }
        }

        info!("Requesting app-only Reddit access token");
        let http_client = self.http_client.clone();
        let response = self
            .oauth_client
            .exchange_client_credentials()
            .request_async(|request| send_token_request(http_client, request))
            .await
            .map_err(|e| {
                error!("Token request failed: {}", e);
                CoreError::RedditApi(RedditApiError::AuthenticationFailed {
                    reason: e.to_string(),
                })
            })?;

        let lifetime = response.expires_in().unwrap_or(DEFAULT_TOKEN_LIFETIME);
        let token = CachedToken {
            access_token: response.access_token().secret().clone(),
            expires_at: Instant::now() + lifetime.saturating_sub(TOKEN_EXPIRY_MARGIN),
        };
        debug!("Access token valid for {:?}", lifetime);

        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    /// Drops the cached token so the next request re-authenticates.
    pub async fn invalidate(&self) {
        self.token.write().await.take();
    }

    pub async fn has_token(&self) -> bool {
        self.token
            .read()
            .await
            .as_ref()
            .is_some_and(CachedToken::is_fresh)
    }
}

async fn send_token_request(
    http_client: reqwest::Client,
    request: HttpRequest,
) -> Result<HttpResponse, reqwest::Error> {
    let response = http_client
        .request(request.method, request.url.as_str())
        .headers(request.headers)
        .body(request.body)
        .send()
        .await?;

    let status_code = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().await?.to_vec();

    Ok(HttpResponse {
        status_code,
        headers,
        body,
    })
}
