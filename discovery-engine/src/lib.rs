//! Post discovery over a feed provider.
//!
//! Two modes share one shape: fetch a bounded list of candidates per unit of
//! work, keep the ones matching a predicate, and isolate any failure to the
//! unit that produced it.
//!
//! - [`DiscoveryEngine::discover_subreddits`] scans named subreddits and keeps
//!   posts by allowed authors.
//! - [`DiscoveryEngine::discover_user_history`] first derives the subreddits
//!   the authors were recently active in, then scans those for their posts
//!   inside the lookback window.

use chrono::{DateTime, Utc};
use postscout_core::{
    CoreError, DiscoveryReport, ErrorExt, ErrorReporter, HistorySettings, PostRecord,
    ScanProgress, ScanUnit, ScanWarning, Submission, SubmissionPage, SubredditScanCriteria,
    UserHistoryCriteria,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

#[cfg(test)]
mod tests;

/// Username to the subreddits they posted in within the lookback window.
pub type SubredditActivityMap = BTreeMap<String, BTreeSet<String>>;

/// Source of candidate submissions.
#[allow(async_fn_in_trait)]
pub trait FeedProvider {
    /// Up to `limit` currently hot submissions in `subreddit`.
    async fn hot(&self, subreddit: &str, limit: u32) -> Result<Vec<Submission>, CoreError>;

    /// One page of `username`'s submission history, starting after `after`.
    async fn user_submissions(
        &self,
        username: &str,
        after: Option<&str>,
    ) -> Result<SubmissionPage, CoreError>;
}

pub struct DiscoveryEngine<P> {
    provider: P,
    history: HistorySettings,
    reporter: ErrorReporter,
}

impl<P: FeedProvider> DiscoveryEngine<P> {
    pub fn new(provider: P) -> Self {
        Self::with_history_settings(provider, HistorySettings::default())
    }

    pub fn with_history_settings(provider: P, history: HistorySettings) -> Self {
        Self {
            provider,
            history,
            reporter: ErrorReporter::new().with_error_reporting(false),
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Scans each subreddit's hot listing for posts by `allowed_authors`.
    ///
    /// Results keep subreddit order, then provider order. Subreddits named
    /// twice are scanned twice.
    pub async fn discover_subreddits<F>(
        &self,
        criteria: &SubredditScanCriteria,
        mut on_progress: F,
    ) -> DiscoveryReport
    where
        F: FnMut(&ScanProgress),
    {
        let mut report = DiscoveryReport::default();
        if criteria.subreddits.is_empty() || criteria.allowed_authors.is_empty() {
            debug!("Nothing to scan: empty subreddit or author list");
            return report;
        }

        let total = criteria.subreddits.len();
        info!(
            "Scanning {} subreddits for posts by {} authors (top {})",
            total,
            criteria.allowed_authors.len(),
            criteria.limit
        );

        for (index, subreddit) in criteria.subreddits.iter().enumerate() {
            match self.provider.hot(subreddit, criteria.limit).await {
                Ok(candidates) => {
                    let before = report.posts.len();
                    report.posts.extend(
                        candidates
                            .into_iter()
                            .filter(|candidate| candidate.is_authored_by(&criteria.allowed_authors))
                            .filter_map(|candidate| to_record(candidate, subreddit, None)),
                    );
                    debug!(
                        "r/{}: {} matching posts",
                        subreddit,
                        report.posts.len() - before
                    );
                }
                Err(error) => {
                    let warning = self.isolate(ScanUnit::Subreddit(subreddit.clone()), &error);
                    report.warnings.push(warning);
                }
            }

            on_progress(&ScanProgress {
                processed: index + 1,
                total,
                subreddit: subreddit.clone(),
            });
        }

        info!(
            "Subreddit scan finished: {} posts, {} warnings",
            report.posts.len(),
            report.warnings.len()
        );
        report
    }

    /// Runs the two-phase history scan against the current time.
    pub async fn discover_user_history<F>(
        &self,
        criteria: &UserHistoryCriteria,
        on_progress: F,
    ) -> DiscoveryReport
    where
        F: FnMut(&ScanProgress),
    {
        self.discover_user_history_at(Utc::now(), criteria, on_progress)
            .await
    }

    /// Runs the two-phase history scan with `now` as the single reference
    /// time for both phases.
    pub async fn discover_user_history_at<F>(
        &self,
        now: DateTime<Utc>,
        criteria: &UserHistoryCriteria,
        mut on_progress: F,
    ) -> DiscoveryReport
    where
        F: FnMut(&ScanProgress),
    {
        let mut report = DiscoveryReport::default();
        if criteria.authors.is_empty() {
            debug!("Nothing to scan: empty author list");
            return report;
        }

        let Some(cutoff) = now.checked_sub_signed(criteria.lookback) else {
            warn!(
                "Lookback of {} days is out of range; nothing to scan",
                criteria.lookback.num_days()
            );
            return report;
        };
        info!(
            "Discovering subreddits for {} authors active since {}",
            criteria.authors.len(),
            cutoff
        );

        let activity = self
            .subreddit_activity(&criteria.authors, cutoff, &mut report.warnings)
            .await;
        let candidates: BTreeSet<String> = activity.into_values().flatten().collect();
        report.candidate_subreddits = candidates.iter().cloned().collect();

        if candidates.is_empty() {
            info!("No recent activity found; skipping subreddit scan");
            return report;
        }

        let total = candidates.len();
        info!("Scanning {} candidate subreddits", total);

        for (index, subreddit) in candidates.iter().enumerate() {
            match self.provider.hot(subreddit, criteria.limit).await {
                Ok(posts) => {
                    let before = report.posts.len();
                    for submission in posts {
                        if !submission.is_authored_by(&criteria.authors) {
                            continue;
                        }
                        let Some(created_at) = submission.created_at() else {
                            continue;
                        };
                        if created_at < cutoff {
                            continue;
                        }
                        let name = submission.subreddit.clone();
                        report
                            .posts
                            .extend(to_record(submission, &name, Some(created_at)));
                    }
                    debug!(
                        "r/{}: {} matching posts",
                        subreddit,
                        report.posts.len() - before
                    );
                }
                Err(error) => {
                    let warning = self.isolate(ScanUnit::Subreddit(subreddit.clone()), &error);
                    report.warnings.push(warning);
                }
            }

            on_progress(&ScanProgress {
                processed: index + 1,
                total,
                subreddit: subreddit.clone(),
            });
        }

        info!(
            "History scan finished: {} posts, {} warnings",
            report.posts.len(),
            report.warnings.len()
        );
        report
    }

    /// Builds the activity map for `authors`. A user whose history cannot be
    /// read contributes nothing and adds one warning.
    pub async fn subreddit_activity(
        &self,
        authors: &BTreeSet<String>,
        cutoff: DateTime<Utc>,
        warnings: &mut Vec<ScanWarning>,
    ) -> SubredditActivityMap {
        let mut activity = SubredditActivityMap::new();

        for author in authors {
            match self.recent_subreddits(author, cutoff).await {
                Ok(subreddits) => {
                    debug!("u/{} active in {} subreddits", author, subreddits.len());
                    activity.insert(author.clone(), subreddits);
                }
                Err(error) => {
                    warnings.push(self.isolate(ScanUnit::User(author.clone()), &error));
                }
            }
        }

        activity
    }

    async fn recent_subreddits(
        &self,
        author: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<BTreeSet<String>, CoreError> {
        let mut subreddits = BTreeSet::new();
        let mut after: Option<String> = None;

        for page_number in 1..=self.history.max_pages {
            let page = self
                .provider
                .user_submissions(author, after.as_deref())
                .await?;

            let mut reached_edge = false;
            for submission in &page.submissions {
                match submission.created_at() {
                    Some(created_at) if created_at >= cutoff => {
                        subreddits.insert(submission.subreddit.clone());
                    }
                    _ => reached_edge = true,
                }
            }
            debug!(
                "u/{} history page {}: {} submissions",
                author,
                page_number,
                page.submissions.len()
            );

            if reached_edge && self.history.stop_at_window_edge {
                break;
            }
            match page.after {
                Some(next) => after = Some(next),
                None => break,
            }
        }

        Ok(subreddits)
    }

    fn isolate(&self, unit: ScanUnit, error: &CoreError) -> ScanWarning {
        warn!("Skipping {} after provider failure", unit);
        self.reporter.report_warning(error);

        let code = match error {
            CoreError::RedditApi(inner) => inner.error_code(),
            other => other.error_code(),
        };
        ScanWarning {
            unit,
            code,
            message: error.user_friendly_message(),
        }
    }
}

fn to_record(
    submission: Submission,
    subreddit: &str,
    created_at: Option<DateTime<Utc>>,
) -> Option<PostRecord> {
    Some(PostRecord {
        author: submission.author?,
        title: submission.title,
        url: submission.url,
        subreddit: subreddit.to_string(),
        upvotes: submission.upvotes,
        created_at,
    })
}
