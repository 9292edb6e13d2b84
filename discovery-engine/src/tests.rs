use crate::{DiscoveryEngine, FeedProvider};
use chrono::{DateTime, Duration, TimeZone, Utc};
use postscout_core::{
    CoreError, HistorySettings, RedditApiError, ScanProgress, ScanUnit, Submission,
    SubmissionPage, SubredditScanCriteria, UserHistoryCriteria,
};
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

/// In-memory provider with scripted responses and a call log.
#[derive(Default)]
struct ScriptedProvider {
    hot: HashMap<String, Result<Vec<Submission>, RedditApiError>>,
    histories: HashMap<String, Result<Vec<Submission>, RedditApiError>>,
    history_failures: HashMap<String, (usize, RedditApiError)>,
    page_size: usize,
    calls: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    fn new() -> Self {
        Self {
            page_size: 100,
            ..Default::default()
        }
    }

    fn with_hot(mut self, subreddit: &str, posts: Vec<Submission>) -> Self {
        self.hot.insert(subreddit.to_string(), Ok(posts));
        self
    }

    fn with_failing_hot(mut self, subreddit: &str) -> Self {
        self.hot.insert(
            subreddit.to_string(),
            Err(RedditApiError::SubredditNotFound {
                subreddit: subreddit.to_string(),
            }),
        );
        self
    }

    fn with_history(mut self, username: &str, posts: Vec<Submission>) -> Self {
        self.histories.insert(username.to_string(), Ok(posts));
        self
    }

    fn with_failing_history(mut self, username: &str) -> Self {
        self.histories.insert(
            username.to_string(),
            Err(RedditApiError::UserNotFound {
                username: username.to_string(),
            }),
        );
        self
    }

    /// Serves `username`'s history until page `page` (1-based), which fails.
    fn with_history_failing_on_page(
        mut self,
        username: &str,
        posts: Vec<Submission>,
        page: usize,
    ) -> Self {
        self.histories.insert(username.to_string(), Ok(posts));
        self.history_failures.insert(
            username.to_string(),
            (page, RedditApiError::ServerError { status_code: 503 }),
        );
        self
    }

    fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn hot_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| call.strip_prefix("hot:").map(String::from))
            .collect()
    }

    fn history_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.starts_with("user:"))
            .count()
    }
}

impl FeedProvider for ScriptedProvider {
    async fn hot(&self, subreddit: &str, limit: u32) -> Result<Vec<Submission>, CoreError> {
        self.calls.lock().unwrap().push(format!("hot:{subreddit}"));
        match self.hot.get(subreddit) {
            Some(Ok(posts)) => Ok(posts.iter().take(limit as usize).cloned().collect()),
            Some(Err(error)) => Err(CoreError::RedditApi(error.clone())),
            None => Ok(Vec::new()),
        }
    }

    async fn user_submissions(
        &self,
        username: &str,
        after: Option<&str>,
    ) -> Result<SubmissionPage, CoreError> {
        self.calls.lock().unwrap().push(format!("user:{username}"));
        let history = match self.histories.get(username) {
            Some(Ok(posts)) => posts,
            Some(Err(error)) => return Err(CoreError::RedditApi(error.clone())),
            None => return Ok(SubmissionPage::default()),
        };

        let start: usize = after.map(|cursor| cursor.parse().unwrap()).unwrap_or(0);
        if let Some((page, error)) = self.history_failures.get(username) {
            if start / self.page_size + 1 == *page {
                return Err(CoreError::RedditApi(error.clone()));
            }
        }
        let end = (start + self.page_size).min(history.len());
        Ok(SubmissionPage {
            submissions: history[start..end].to_vec(),
            after: (end < history.len()).then(|| end.to_string()),
        })
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
}

fn post(id: &str, author: Option<&str>, subreddit: &str, age: Duration) -> Submission {
    Submission {
        id: id.to_string(),
        title: format!("Post {id}"),
        url: format!("https://www.reddit.com/r/{subreddit}/comments/{id}"),
        author: author.map(String::from),
        subreddit: subreddit.to_string(),
        upvotes: 10,
        created_utc: (now() - age).timestamp(),
    }
}

fn names(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn subreddit_criteria(subreddits: &[&str], authors: &[&str], limit: u32) -> SubredditScanCriteria {
    SubredditScanCriteria {
        subreddits: subreddits.iter().map(|s| s.to_string()).collect(),
        allowed_authors: names(authors),
        limit,
    }
}

fn history_criteria(authors: &[&str], days: i64, limit: u32) -> UserHistoryCriteria {
    UserHistoryCriteria {
        authors: names(authors),
        lookback: Duration::days(days),
        limit,
    }
}

// Subreddit scan

#[tokio::test]
async fn test_subreddit_scan_keeps_only_allowed_author() {
    let provider = ScriptedProvider::new().with_hot(
        "test",
        vec![
            post("1", Some("alice"), "test", Duration::hours(1)),
            post("2", None, "test", Duration::hours(1)),
            post("3", Some("bob"), "test", Duration::hours(1)),
            post("4", Some("carol"), "test", Duration::hours(1)),
            post("5", None, "test", Duration::hours(1)),
        ],
    );
    let engine = DiscoveryEngine::new(provider);

    let report = engine
        .discover_subreddits(&subreddit_criteria(&["test"], &["bob"], 5), |_| {})
        .await;

    assert_eq!(report.posts.len(), 1);
    assert_eq!(report.posts[0].title, "Post 3");
    assert_eq!(report.posts[0].author, "bob");
    assert_eq!(report.posts[0].subreddit, "test");
    assert_eq!(report.posts[0].created_at, None);
    assert!(report.warnings.is_empty());
}

#[tokio::test]
async fn test_subreddit_scan_isolates_failures() {
    let provider = ScriptedProvider::new().with_failing_hot("a").with_hot(
        "b",
        vec![
            post("1", Some("bob"), "b", Duration::hours(1)),
            post("2", Some("bob"), "b", Duration::hours(2)),
        ],
    );
    let engine = DiscoveryEngine::new(provider);

    let report = engine
        .discover_subreddits(&subreddit_criteria(&["a", "b"], &["bob"], 10), |_| {})
        .await;

    assert_eq!(report.posts.len(), 2);
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].unit, ScanUnit::Subreddit("a".to_string()));
    assert_eq!(report.warnings[0].code, "REDDIT_SUBREDDIT_NOT_FOUND");
    assert_eq!(engine.provider().hot_calls(), vec!["a", "b"]);
}

#[tokio::test]
async fn test_subreddit_scan_with_no_authors_makes_no_calls() {
    let engine = DiscoveryEngine::new(ScriptedProvider::new());

    let report = engine
        .discover_subreddits(&subreddit_criteria(&["rust", "linux"], &[], 5), |_| {})
        .await;
    assert!(report.posts.is_empty());
    assert!(report.warnings.is_empty());

    let report = engine
        .discover_subreddits(&subreddit_criteria(&[], &["bob"], 5), |_| {})
        .await;
    assert!(report.posts.is_empty());
    assert!(engine.provider().calls().is_empty());
}

#[tokio::test]
async fn test_subreddit_scan_preserves_order_without_dedup() {
    let provider = ScriptedProvider::new()
        .with_hot(
            "rust",
            vec![
                post("r1", Some("bob"), "rust", Duration::days(400)),
                post("r2", Some("alice"), "rust", Duration::hours(1)),
            ],
        )
        .with_hot("linux", vec![post("l1", Some("alice"), "linux", Duration::hours(3))]);
    let engine = DiscoveryEngine::new(provider);

    let report = engine
        .discover_subreddits(
            &subreddit_criteria(&["rust", "linux", "rust"], &["alice", "bob"], 5),
            |_| {},
        )
        .await;

    let titles: Vec<&str> = report.posts.iter().map(|p| p.title.as_str()).collect();
    // No recency filter in this mode, and a repeated subreddit is scanned again.
    assert_eq!(titles, vec!["Post r1", "Post r2", "Post l1", "Post r1", "Post r2"]);
}

#[tokio::test]
async fn test_subreddit_scan_respects_limit() {
    let provider = ScriptedProvider::new().with_hot(
        "rust",
        vec![
            post("1", Some("carol"), "rust", Duration::hours(1)),
            post("2", Some("bob"), "rust", Duration::hours(1)),
        ],
    );
    let engine = DiscoveryEngine::new(provider);

    let report = engine
        .discover_subreddits(&subreddit_criteria(&["rust"], &["bob"], 1), |_| {})
        .await;
    assert!(report.posts.is_empty());
}

#[tokio::test]
async fn test_subreddit_scan_reports_progress() {
    let provider = ScriptedProvider::new()
        .with_failing_hot("broken")
        .with_hot("rust", vec![]);
    let engine = DiscoveryEngine::new(provider);

    let mut seen: Vec<ScanProgress> = Vec::new();
    engine
        .discover_subreddits(&subreddit_criteria(&["rust", "broken"], &["bob"], 5), |p| {
            seen.push(p.clone())
        })
        .await;

    let progress: Vec<(usize, usize, &str)> = seen
        .iter()
        .map(|p| (p.processed, p.total, p.subreddit.as_str()))
        .collect();
    assert_eq!(progress, vec![(1, 2, "rust"), (2, 2, "broken")]);
    assert_eq!(seen[1].to_string(), "Processed 2 of 2 subreddits (r/broken)");
}

#[tokio::test]
async fn test_subreddit_scan_is_idempotent() {
    let provider = ScriptedProvider::new()
        .with_hot(
            "rust",
            vec![
                post("1", Some("bob"), "rust", Duration::hours(1)),
                post("2", Some("alice"), "rust", Duration::hours(2)),
            ],
        )
        .with_failing_hot("gone");
    let engine = DiscoveryEngine::new(provider);
    let criteria = subreddit_criteria(&["gone", "rust"], &["alice", "bob"], 10);

    let first = engine.discover_subreddits(&criteria, |_| {}).await;
    let second = engine.discover_subreddits(&criteria, |_| {}).await;
    assert_eq!(first, second);
}

// User history scan

#[tokio::test]
async fn test_history_candidates_only_from_recent_posts() {
    let provider = ScriptedProvider::new()
        .with_history(
            "alice",
            vec![
                post("h1", Some("alice"), "foo", Duration::days(3)),
                post("h2", Some("alice"), "bar", Duration::days(10)),
            ],
        )
        .with_hot("foo", vec![post("f1", Some("alice"), "foo", Duration::days(1))])
        .with_hot("bar", vec![post("b1", Some("alice"), "bar", Duration::days(1))]);
    let engine = DiscoveryEngine::new(provider);

    let report = engine
        .discover_user_history_at(now(), &history_criteria(&["alice"], 7, 10), |_| {})
        .await;

    assert_eq!(report.candidate_subreddits, vec!["foo"]);
    assert_eq!(engine.provider().hot_calls(), vec!["foo"]);
    assert_eq!(report.posts.len(), 1);
    assert_eq!(report.posts[0].title, "Post f1");
}

#[tokio::test]
async fn test_history_without_recent_activity_skips_scan() {
    let provider = ScriptedProvider::new()
        .with_history("alice", vec![post("h1", Some("alice"), "foo", Duration::days(30))])
        .with_history("bob", vec![]);
    let engine = DiscoveryEngine::new(provider);

    let report = engine
        .discover_user_history_at(now(), &history_criteria(&["alice", "bob"], 7, 10), |_| {})
        .await;

    assert!(report.posts.is_empty());
    assert!(report.candidate_subreddits.is_empty());
    assert!(engine.provider().hot_calls().is_empty());
}

#[tokio::test]
async fn test_history_scan_applies_window_to_hot_posts() {
    let provider = ScriptedProvider::new()
        .with_history("alice", vec![post("h1", Some("alice"), "foo", Duration::days(1))])
        .with_hot(
            "foo",
            vec![
                post("old", Some("alice"), "foo", Duration::days(8)),
                post("edge", Some("alice"), "foo", Duration::days(7)),
                post("new", Some("alice"), "foo", Duration::hours(5)),
                post("other", Some("mallory"), "foo", Duration::hours(5)),
                post("deleted", None, "foo", Duration::hours(5)),
            ],
        );
    let engine = DiscoveryEngine::new(provider);

    let report = engine
        .discover_user_history_at(now(), &history_criteria(&["alice"], 7, 10), |_| {})
        .await;

    let titles: Vec<&str> = report.posts.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, vec!["Post edge", "Post new"]);

    let cutoff = now() - Duration::days(7);
    for record in &report.posts {
        assert_eq!(record.author, "alice");
        assert!(record.created_at.unwrap() >= cutoff);
    }
    assert_eq!(
        report.posts[1].created_at_display().as_deref(),
        Some("2024-06-15 07:00:00 UTC")
    );
}

#[tokio::test]
async fn test_history_isolates_user_and_subreddit_failures() {
    let provider = ScriptedProvider::new()
        .with_failing_history("ghost")
        .with_history(
            "alice",
            vec![
                post("h1", Some("alice"), "foo", Duration::days(1)),
                post("h2", Some("alice"), "broken", Duration::days(2)),
            ],
        )
        .with_failing_hot("broken")
        .with_hot("foo", vec![post("f1", Some("alice"), "foo", Duration::hours(2))]);
    let engine = DiscoveryEngine::new(provider);

    let report = engine
        .discover_user_history_at(now(), &history_criteria(&["alice", "ghost"], 7, 10), |_| {})
        .await;

    assert_eq!(report.posts.len(), 1);
    let units: Vec<&ScanUnit> = report.warnings.iter().map(|w| &w.unit).collect();
    assert_eq!(
        units,
        vec![
            &ScanUnit::User("ghost".to_string()),
            &ScanUnit::Subreddit("broken".to_string()),
        ]
    );
    assert_eq!(report.warnings[0].code, "REDDIT_USER_NOT_FOUND");
}

#[tokio::test]
async fn test_history_failure_on_later_page_discards_user_activity() {
    let provider = ScriptedProvider::new()
        .with_page_size(1)
        .with_history_failing_on_page(
            "alice",
            vec![
                post("h1", Some("alice"), "foo", Duration::days(1)),
                post("h2", Some("alice"), "bar", Duration::days(2)),
            ],
            2,
        )
        .with_hot("foo", vec![post("f1", Some("alice"), "foo", Duration::hours(1))]);
    let engine = DiscoveryEngine::new(provider);

    let report = engine
        .discover_user_history_at(now(), &history_criteria(&["alice"], 7, 10), |_| {})
        .await;

    assert!(report.candidate_subreddits.is_empty());
    assert!(report.posts.is_empty());
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].unit, ScanUnit::User("alice".to_string()));
    assert_eq!(report.warnings[0].code, "REDDIT_SERVER_ERROR");
    assert_eq!(engine.provider().history_calls(), 2);
    assert!(engine.provider().hot_calls().is_empty());
}

#[tokio::test]
async fn test_history_with_unrepresentable_lookback_is_empty() {
    let provider = ScriptedProvider::new()
        .with_history("alice", vec![post("h1", Some("alice"), "foo", Duration::days(1))]);
    let engine = DiscoveryEngine::new(provider);
    let criteria = UserHistoryCriteria {
        authors: names(&["alice"]),
        lookback: Duration::days(100_000_000_000),
        limit: 10,
    };

    let report = engine
        .discover_user_history_at(now(), &criteria, |_| {})
        .await;

    assert_eq!(report, Default::default());
    assert!(engine.provider().calls().is_empty());
}

#[tokio::test]
async fn test_history_with_no_authors_makes_no_calls() {
    let engine = DiscoveryEngine::new(ScriptedProvider::new());
    let report = engine
        .discover_user_history_at(now(), &history_criteria(&[], 7, 10), |_| {})
        .await;
    assert_eq!(report, Default::default());
    assert!(engine.provider().calls().is_empty());
}

#[tokio::test]
async fn test_history_scan_order_is_stable_and_idempotent() {
    let provider = ScriptedProvider::new()
        .with_history(
            "bob",
            vec![
                post("h1", Some("bob"), "zeta", Duration::days(1)),
                post("h2", Some("bob"), "alpha", Duration::days(1)),
            ],
        )
        .with_history("alice", vec![post("h3", Some("alice"), "mid", Duration::days(1))])
        .with_hot("zeta", vec![post("z", Some("bob"), "zeta", Duration::hours(1))])
        .with_hot("alpha", vec![post("a", Some("alice"), "alpha", Duration::hours(1))])
        .with_hot("mid", vec![post("m", Some("bob"), "mid", Duration::hours(1))]);
    let engine = DiscoveryEngine::new(provider);
    let criteria = history_criteria(&["alice", "bob"], 7, 10);

    let mut progress = Vec::new();
    let first = engine
        .discover_user_history_at(now(), &criteria, |p| progress.push(p.subreddit.clone()))
        .await;
    let second = engine
        .discover_user_history_at(now(), &criteria, |_| {})
        .await;

    assert_eq!(progress, vec!["alpha", "mid", "zeta"]);
    let titles: Vec<&str> = first.posts.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, vec!["Post a", "Post m", "Post z"]);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_history_pulls_every_page_by_default() {
    let provider = ScriptedProvider::new()
        .with_page_size(1)
        .with_history(
            "alice",
            vec![
                post("h1", Some("alice"), "foo", Duration::days(1)),
                post("h2", Some("alice"), "old", Duration::days(20)),
                post("h3", Some("alice"), "bar", Duration::days(2)),
            ],
        );
    let engine = DiscoveryEngine::new(provider);

    let report = engine
        .discover_user_history_at(now(), &history_criteria(&["alice"], 7, 10), |_| {})
        .await;

    // History order is not trusted, so the recent post after the old one counts.
    assert_eq!(report.candidate_subreddits, vec!["bar", "foo"]);
    assert_eq!(engine.provider().history_calls(), 3);
}

#[tokio::test]
async fn test_history_stops_at_window_edge_when_configured() {
    let provider = ScriptedProvider::new()
        .with_page_size(1)
        .with_history(
            "alice",
            vec![
                post("h1", Some("alice"), "foo", Duration::days(1)),
                post("h2", Some("alice"), "old", Duration::days(20)),
                post("h3", Some("alice"), "older", Duration::days(30)),
            ],
        );
    let settings = HistorySettings {
        max_pages: 10,
        stop_at_window_edge: true,
    };
    let engine = DiscoveryEngine::with_history_settings(provider, settings);

    let report = engine
        .discover_user_history_at(now(), &history_criteria(&["alice"], 7, 10), |_| {})
        .await;

    assert_eq!(report.candidate_subreddits, vec!["foo"]);
    assert_eq!(engine.provider().history_calls(), 2);
}

#[tokio::test]
async fn test_history_page_cap() {
    let history: Vec<Submission> = (0..5)
        .map(|i| post(&i.to_string(), Some("alice"), &format!("sub{i}"), Duration::hours(1)))
        .collect();
    let provider = ScriptedProvider::new()
        .with_page_size(1)
        .with_history("alice", history);
    let settings = HistorySettings {
        max_pages: 2,
        stop_at_window_edge: false,
    };
    let engine = DiscoveryEngine::with_history_settings(provider, settings);

    let mut warnings = Vec::new();
    let activity = engine
        .subreddit_activity(&names(&["alice"]), now() - Duration::days(7), &mut warnings)
        .await;

    assert_eq!(activity["alice"], names(&["sub0", "sub1"]));
    assert!(warnings.is_empty());
}
