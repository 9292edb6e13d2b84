pub mod api;
pub mod auth;
mod provider;


pub use api::RedditApiClient;
pub use auth::AppOnlyAuthenticator;
