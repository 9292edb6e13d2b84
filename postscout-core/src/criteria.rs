//! Fetch criteria and the form input that produces them.

use crate::error::CoreError;
use std::collections::BTreeSet;
use std::ops::RangeInclusive;

pub const TOP_RANGE: RangeInclusive<u32> = 1..=100;
pub const LOOKBACK_DAYS_RANGE: RangeInclusive<u32> = 1..=30;
pub const TOP_PER_SUBREDDIT_RANGE: RangeInclusive<u32> = 1..=20;

pub const DEFAULT_TOP: u32 = 5;
pub const DEFAULT_LOOKBACK_DAYS: u32 = 7;
pub const DEFAULT_TOP_PER_SUBREDDIT: u32 = 10;

/// Mode A: scan named subreddits for posts by allowed authors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubredditScanCriteria {
    pub subreddits: Vec<String>,
    pub allowed_authors: BTreeSet<String>,
    pub limit: u32,
}

/// Mode B: discover subreddits from authors' recent history, then scan them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserHistoryCriteria {
    pub authors: BTreeSet<String>,
    pub lookback: chrono::Duration,
    pub limit: u32,
}

/// Removes all whitespace, splits on commas and drops empty fragments.
pub fn split_list(input: &str) -> Vec<String> {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    compact
        .split(',')
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn parse_subreddits(input: &str) -> Vec<String> {
    split_list(input)
        .into_iter()
        .map(|name| match name.strip_prefix("r/") {
            Some(stripped) => stripped.to_string(),
            None => name,
        })
        .filter(|name| !name.is_empty())
        .collect()
}

pub fn parse_usernames(input: &str) -> BTreeSet<String> {
    split_list(input)
        .into_iter()
        .map(|name| match name.strip_prefix("u/") {
            Some(stripped) => stripped.to_string(),
            None => name,
        })
        .filter(|name| !name.is_empty())
        .collect()
}

fn check_range(field: &str, value: u32, range: &RangeInclusive<u32>) -> Result<u32, CoreError> {
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(CoreError::invalid_input(format!(
            "{} must be between {} and {}",
            field,
            range.start(),
            range.end()
        )))
    }
}

/// Raw values of the "Post Fetcher" form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubredditScanForm {
    pub subreddits: String,
    pub usernames: String,
    pub top: u32,
}

impl Default for SubredditScanForm {
    fn default() -> Self {
        Self {
            subreddits: String::new(),
            usernames: String::new(),
            top: DEFAULT_TOP,
        }
    }
}

impl SubredditScanForm {
    pub fn validate(&self) -> Result<SubredditScanCriteria, CoreError> {
        let subreddits = parse_subreddits(&self.subreddits);
        if subreddits.is_empty() {
            return Err(CoreError::invalid_input("Please enter subreddits"));
        }

        let allowed_authors = parse_usernames(&self.usernames);
        if allowed_authors.is_empty() {
            return Err(CoreError::invalid_input("Please enter usernames"));
        }

        Ok(SubredditScanCriteria {
            subreddits,
            allowed_authors,
            limit: check_range("Top", self.top, &TOP_RANGE)?,
        })
    }
}

/// Raw values of the "User History" form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserHistoryForm {
    pub usernames: String,
    pub lookback_days: u32,
    pub top_per_subreddit: u32,
}

impl Default for UserHistoryForm {
    fn default() -> Self {
        Self {
            usernames: String::new(),
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            top_per_subreddit: DEFAULT_TOP_PER_SUBREDDIT,
        }
    }
}

impl UserHistoryForm {
    pub fn validate(&self) -> Result<UserHistoryCriteria, CoreError> {
        let authors = parse_usernames(&self.usernames);
        if authors.is_empty() {
            return Err(CoreError::invalid_input("Please enter usernames"));
        }

        let days = check_range("Days to look back", self.lookback_days, &LOOKBACK_DAYS_RANGE)?;
        let limit = check_range(
            "Top posts per subreddit",
            self.top_per_subreddit,
            &TOP_PER_SUBREDDIT_RANGE,
        )?;

        Ok(UserHistoryCriteria {
            authors,
            lookback: chrono::Duration::days(i64::from(days)),
            limit,
        })
    }
}
