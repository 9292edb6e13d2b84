use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Display format for post creation times.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// A candidate post as returned by a feed provider, before filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub id: String,
    pub title: String,
    pub url: String,
    /// `None` for deleted or removed accounts.
    pub author: Option<String>,
    pub subreddit: String,
    pub upvotes: i64,
    pub created_utc: i64,
}

impl Submission {
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.created_utc, 0).single()
    }

    pub fn is_authored_by(&self, authors: &BTreeSet<String>) -> bool {
        self.author
            .as_ref()
            .is_some_and(|name| authors.contains(name))
    }
}

/// One page of a user's submission history.
#[derive(Debug, Clone, Default)]
pub struct SubmissionPage {
    pub submissions: Vec<Submission>,
    /// Cursor for the next page; `None` once the history is exhausted.
    pub after: Option<String>,
}

/// A matched post, ready for presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRecord {
    pub title: String,
    pub url: String,
    pub author: String,
    pub subreddit: String,
    pub upvotes: i64,
    pub created_at: Option<DateTime<Utc>>,
}

impl PostRecord {
    pub fn created_at_display(&self) -> Option<String> {
        self.created_at
            .map(|created| created.format(TIMESTAMP_FORMAT).to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScanUnit {
    Subreddit(String),
    User(String),
}

impl fmt::Display for ScanUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanUnit::Subreddit(name) => write!(f, "r/{name}"),
            ScanUnit::User(name) => write!(f, "u/{name}"),
        }
    }
}

/// A provider failure isolated to a single subreddit or user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanWarning {
    pub unit: ScanUnit,
    pub code: String,
    pub message: String,
}

impl ScanWarning {
    pub fn notice(&self) -> String {
        match &self.unit {
            ScanUnit::Subreddit(_) => {
                format!("Error fetching posts from {}: {}", self.unit, self.message)
            }
            ScanUnit::User(_) => {
                format!("Error fetching history for {}: {}", self.unit, self.message)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanProgress {
    pub processed: usize,
    pub total: usize,
    pub subreddit: String,
}

impl fmt::Display for ScanProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Processed {} of {} subreddits (r/{})",
            self.processed, self.total, self.subreddit
        )
    }
}

/// Outcome of one fetch: matched posts plus every isolated failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    pub posts: Vec<PostRecord>,
    pub warnings: Vec<ScanWarning>,
    pub candidate_subreddits: Vec<String>,
}

impl DiscoveryReport {
    pub fn summary_notice(&self) -> String {
        if self.posts.is_empty() {
            "No posts found".to_string()
        } else {
            format!("Found {} posts", self.posts.len())
        }
    }
}
