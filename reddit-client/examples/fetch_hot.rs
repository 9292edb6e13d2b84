use discovery_engine::DiscoveryEngine;
use postscout_core::{AppConfig, SubredditScanForm};
use reddit_client::RedditApiClient;
use std::io::{self, Write};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for logging
    tracing_subscriber::fmt::init();

    println!("=== Reddit Hot Listing Manual Test ===\n");
    println!("Credentials are read from REDDIT_CLIENT_ID, REDDIT_CLIENT_SECRET and");
    println!("REDDIT_USER_AGENT (a .env file in the working directory also works).\n");

    let config = AppConfig::load()?;
    let client = RedditApiClient::from_config(&config)?;

    let mut form = SubredditScanForm::default();
    print!("Enter subreddits (comma-separated): ");
    io::stdout().flush()?;
    io::stdin().read_line(&mut form.subreddits)?;

    print!("Enter usernames (comma-separated): ");
    io::stdout().flush()?;
    io::stdin().read_line(&mut form.usernames)?;

    let criteria = match form.validate() {
        Ok(criteria) => criteria,
        Err(e) => {
            println!("{}", e);
            return Ok(());
        }
    };

    let engine = DiscoveryEngine::with_history_settings(client, config.history);
    let report = engine
        .discover_subreddits(&criteria, |progress| println!("{}", progress))
        .await;

    for warning in &report.warnings {
        println!("warning: {}", warning.notice());
    }
    println!("\n{}", report.summary_notice());
    for post in &report.posts {
        println!("### {} ({})", post.title, post.url);
        println!("Subreddit: r/{}", post.subreddit);
        println!("Author: {}", post.author);
        println!("Upvotes: {}", post.upvotes);
        println!("---");
    }

    Ok(())
}
