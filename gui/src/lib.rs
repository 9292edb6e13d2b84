use discovery_engine::DiscoveryEngine;
use iced::futures::channel::mpsc;
use iced::futures::SinkExt;
use iced::widget::{
    button, column, container, horizontal_rule, row, scrollable, slider, text, text_input, Column,
};
use iced::{subscription, Color, Command, Element, Length, Subscription, Theme};
use postscout_core::{
    CoreError, DiscoveryReport, ErrorExt, PostRecord, ScanProgress, SubredditScanCriteria,
    SubredditScanForm, UserHistoryCriteria, UserHistoryForm, LOOKBACK_DAYS_RANGE, TOP_PER_SUBREDDIT_RANGE,
    TOP_RANGE,
};
use reddit_client::RedditApiClient;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub type RedditEngine = DiscoveryEngine<RedditApiClient>;

const ERROR_COLOR: Color = Color {
    r: 0.8,
    g: 0.2,
    b: 0.2,
    a: 1.0,
};

const FETCH_SUBSCRIPTION: &str = "postscout-fetch";
const PROGRESS_BUFFER: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    PostFetcher,
    UserHistory,
}

#[derive(Debug, Clone)]
pub enum Message {
    TabSelected(Tab),
    SubredditsChanged(String),
    ScanUsernamesChanged(String),
    TopChanged(u32),
    HistoryUsernamesChanged(String),
    LookbackDaysChanged(u32),
    TopPerSubredditChanged(u32),
    FetchPressed,
    Progress(ScanProgress),
    FetchCompleted(FetchOutcome),
    PostClicked(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Success(String),
    Warning(String),
    Error(String),
}

impl Notice {
    fn color(&self) -> Color {
        match self {
            Notice::Info(_) => Color::from_rgb(0.3, 0.5, 0.8),
            Notice::Success(_) => Color::from_rgb(0.2, 0.6, 0.3),
            Notice::Warning(_) => Color::from_rgb(0.8, 0.55, 0.0),
            Notice::Error(_) => ERROR_COLOR,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Notice::Info(m) | Notice::Success(m) | Notice::Warning(m) | Notice::Error(m) => m,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchRequest {
    Subreddits(SubredditScanCriteria),
    UserHistory(UserHistoryCriteria),
}

#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub tab: Tab,
    pub report: DiscoveryReport,
}

/// A running fetch; its id keys the subscription that drives it.
#[derive(Debug, Clone)]
struct ActiveFetch {
    id: u64,
    request: FetchRequest,
}

pub struct App {
    engine: Option<Arc<RedditEngine>>,
    startup_error: Option<String>,
    tab: Tab,
    scan_form: SubredditScanForm,
    history_form: UserHistoryForm,
    active_fetch: Option<ActiveFetch>,
    next_fetch_id: u64,
    progress: Option<ScanProgress>,
    notices: Vec<Notice>,
    outcome: Option<FetchOutcome>,
}

impl App {
    pub fn new(engine: Result<RedditEngine, CoreError>) -> Self {
        let (engine, startup_error) = match engine {
            Ok(engine) => (Some(Arc::new(engine)), None),
            Err(e) => (None, Some(e.user_friendly_message())),
        };

        Self {
            engine,
            startup_error,
            tab: Tab::PostFetcher,
            scan_form: SubredditScanForm::default(),
            history_form: UserHistoryForm::default(),
            active_fetch: None,
            next_fetch_id: 0,
            progress: None,
            notices: Vec::new(),
            outcome: None,
        }
    }

    pub fn tab(&self) -> Tab {
        self.tab
    }

    pub fn is_fetching(&self) -> bool {
        self.active_fetch.is_some()
    }

    /// Notices shown under the active tab. A finished fetch only speaks on
    /// the tab that started it.
    pub fn notices(&self) -> &[Notice] {
        match &self.outcome {
            Some(outcome) if outcome.tab != self.tab => &[],
            _ => &self.notices,
        }
    }

    pub fn visible_outcome(&self) -> Option<&FetchOutcome> {
        self.outcome.as_ref().filter(|outcome| outcome.tab == self.tab)
    }

    pub fn update(&mut self, message: Message) -> Command<Message> {
        match message {
            Message::TabSelected(tab) => {
                self.tab = tab;
                if !self.is_fetching() && self.outcome.is_none() {
                    self.notices.clear();
                }
            }
            Message::SubredditsChanged(value) => self.scan_form.subreddits = value,
            Message::ScanUsernamesChanged(value) => self.scan_form.usernames = value,
            Message::TopChanged(value) => self.scan_form.top = value,
            Message::HistoryUsernamesChanged(value) => self.history_form.usernames = value,
            Message::LookbackDaysChanged(value) => self.history_form.lookback_days = value,
            Message::TopPerSubredditChanged(value) => self.history_form.top_per_subreddit = value,
            Message::FetchPressed => {
                if let Some(request) = self.submit() {
                    self.start_fetch(request);
                }
            }
            Message::Progress(progress) => self.record_progress(progress),
            Message::FetchCompleted(outcome) => self.finish_fetch(outcome),
            Message::PostClicked(url) => open_in_browser(&url),
        }
        Command::none()
    }

    /// Drives the active fetch, streaming progress and the final outcome
    /// back into `update`.
    pub fn subscription(&self) -> Subscription<Message> {
        match (&self.active_fetch, &self.engine) {
            (Some(fetch), Some(engine)) => {
                fetch_subscription(fetch.id, Arc::clone(engine), fetch.request.clone())
            }
            _ => Subscription::none(),
        }
    }

    /// Validates the active form. A missing field blocks the fetch with a
    /// warning notice.
    pub fn submit(&mut self) -> Option<FetchRequest> {
        if self.is_fetching() {
            debug!("Fetch already running; ignoring submit");
            return None;
        }

        let request = match self.tab {
            Tab::PostFetcher => self.scan_form.validate().map(FetchRequest::Subreddits),
            Tab::UserHistory => self.history_form.validate().map(FetchRequest::UserHistory),
        };

        match request {
            Ok(request) if self.engine.is_some() => Some(request),
            Ok(_) => {
                let message = self
                    .startup_error
                    .clone()
                    .unwrap_or_else(|| "Reddit client is not configured.".to_string());
                self.notices = vec![Notice::Error(message)];
                None
            }
            Err(e) => {
                self.notices = vec![Notice::Warning(e.user_friendly_message())];
                self.outcome = None;
                None
            }
        }
    }

    fn start_fetch(&mut self, request: FetchRequest) {
        if self.engine.is_none() {
            return;
        }

        self.next_fetch_id += 1;
        self.active_fetch = Some(ActiveFetch {
            id: self.next_fetch_id,
            request,
        });
        self.outcome = None;
        self.progress = None;
        self.notices = vec![Notice::Info("Fetching posts...".to_string())];
    }

    fn record_progress(&mut self, progress: ScanProgress) {
        if !self.is_fetching() {
            return;
        }
        self.notices = vec![
            Notice::Info("Fetching posts...".to_string()),
            Notice::Info(progress.to_string()),
        ];
        self.progress = Some(progress);
    }

    fn finish_fetch(&mut self, outcome: FetchOutcome) {
        self.active_fetch = None;
        self.notices = outcome
            .report
            .warnings
            .iter()
            .map(|warning| Notice::Warning(warning.notice()))
            .collect();

        let summary = outcome.report.summary_notice();
        self.notices.push(if outcome.report.posts.is_empty() {
            Notice::Warning(summary)
        } else {
            Notice::Success(summary)
        });
        self.outcome = Some(outcome);
    }

    pub fn view(&self) -> Element<Message, Theme> {
        let title: Element<Message, Theme> = text("Reddit Post Fetcher").size(28).into();

        let tabs = row![
            tab_button("Post Fetcher", Tab::PostFetcher, self.tab),
            tab_button("User History", Tab::UserHistory, self.tab),
        ]
        .spacing(10);

        let form = match self.tab {
            Tab::PostFetcher => self.scan_form_view(),
            Tab::UserHistory => self.history_form_view(),
        };

        let fetch_enabled = !self.is_fetching() && self.engine.is_some();
        let fetch_button =
            button("Fetch Posts").on_press_maybe(fetch_enabled.then_some(Message::FetchPressed));

        let mut notices = Column::new().spacing(5);
        if let Some(error) = &self.startup_error {
            notices = notices.push(text(error).style(ERROR_COLOR));
        }
        for notice in self.notices() {
            notices = notices.push(text(notice.message()).style(notice.color()));
        }

        let main_content: Element<Message, Theme> = column![
            title,
            tabs,
            form,
            fetch_button,
            notices,
            scrollable(self.results_view()).height(Length::Fill),
        ]
        .spacing(20)
        .into();

        container(main_content)
            .width(Length::Fill)
            .height(Length::Fill)
            .padding(20)
            .into()
    }

    fn scan_form_view(&self) -> Element<Message, Theme> {
        column![
            text_input("Enter subreddits (comma-separated)", &self.scan_form.subreddits)
                .on_input(Message::SubredditsChanged),
            text_input("Enter usernames (comma-separated)", &self.scan_form.usernames)
                .on_input(Message::ScanUsernamesChanged),
            text(format!("Top: {}", self.scan_form.top)),
            slider(TOP_RANGE, self.scan_form.top, Message::TopChanged),
        ]
        .spacing(10)
        .into()
    }

    fn history_form_view(&self) -> Element<Message, Theme> {
        column![
            text_input("Enter usernames (comma-separated)", &self.history_form.usernames)
                .on_input(Message::HistoryUsernamesChanged),
            text(format!("Days to look back: {}", self.history_form.lookback_days)),
            slider(
                LOOKBACK_DAYS_RANGE,
                self.history_form.lookback_days,
                Message::LookbackDaysChanged
            ),
            text(format!(
                "Top posts per subreddit: {}",
                self.history_form.top_per_subreddit
            )),
            slider(
                TOP_PER_SUBREDDIT_RANGE,
                self.history_form.top_per_subreddit,
                Message::TopPerSubredditChanged
            ),
        ]
        .spacing(10)
        .into()
    }

    fn results_view(&self) -> Element<Message, Theme> {
        let Some(outcome) = self.visible_outcome() else {
            return Column::new().into();
        };

        let mut results = Column::new().spacing(10);
        if outcome.tab == Tab::UserHistory && !outcome.report.candidate_subreddits.is_empty() {
            results = results.push(
                text(format!(
                    "Scanned subreddits: {}",
                    outcome
                        .report
                        .candidate_subreddits
                        .iter()
                        .map(|name| format!("r/{name}"))
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
                .size(14),
            );
        }
        if let Some(progress) = &self.progress {
            results = results.push(text(progress.to_string()).size(12));
        }
        for post in &outcome.report.posts {
            results = results.push(post_block(post));
        }
        results.into()
    }
}

fn tab_button(label: &str, tab: Tab, active: Tab) -> Element<'_, Message, Theme> {
    let style = if tab == active {
        iced::theme::Button::Primary
    } else {
        iced::theme::Button::Secondary
    };
    button(text(label))
        .style(style)
        .on_press(Message::TabSelected(tab))
        .into()
}

fn post_block(post: &PostRecord) -> Element<Message, Theme> {
    let title = button(text(&post.title).size(18))
        .style(iced::theme::Button::Text)
        .padding(0)
        .on_press(Message::PostClicked(post.url.clone()));

    let mut block = column![
        title,
        text(&post.url).size(12),
        text(format!("Subreddit: r/{}", post.subreddit)),
        text(format!("Author: {}", post.author)),
        text(format!("Upvotes: {}", post.upvotes)),
    ]
    .spacing(4);

    if let Some(created) = post.created_at_display() {
        block = block.push(text(format!("Created: {}", created)));
    }

    column![block, horizontal_rule(1)].spacing(10).into()
}

/// Only web links are handed to the system opener.
fn browsable_url(url: &str) -> Option<&str> {
    let lower = url.to_ascii_lowercase();
    (lower.starts_with("https://") || lower.starts_with("http://")).then_some(url)
}

fn open_in_browser(url: &str) {
    let Some(url) = browsable_url(url) else {
        warn!("Refusing to open non-web link: {}", url);
        return;
    };
    info!("Opening {} in browser", url);
    if let Err(e) = open::that(url) {
        warn!("Failed to open {}: {}", url, e);
    }
}

fn fetch_subscription(
    id: u64,
    engine: Arc<RedditEngine>,
    request: FetchRequest,
) -> Subscription<Message> {
    subscription::channel(
        (FETCH_SUBSCRIPTION, id),
        PROGRESS_BUFFER,
        move |mut output: mpsc::Sender<Message>| async move {
            let outcome = run_fetch(engine, request, |progress| {
                info!("{}", progress);
                if output.try_send(Message::Progress(progress.clone())).is_err() {
                    debug!("Progress buffer full; dropping update");
                }
            })
            .await;

            if output.send(Message::FetchCompleted(outcome)).await.is_err() {
                warn!("Fetch finished after the window stopped listening");
            }

            loop {
                std::future::pending::<()>().await;
            }
        },
    )
}

async fn run_fetch<F>(engine: Arc<RedditEngine>, request: FetchRequest, on_progress: F) -> FetchOutcome
where
    F: FnMut(&ScanProgress),
{
    let (tab, report) = match request {
        FetchRequest::Subreddits(criteria) => (
            Tab::PostFetcher,
            engine.discover_subreddits(&criteria, on_progress).await,
        ),
        FetchRequest::UserHistory(criteria) => (
            Tab::UserHistory,
            engine.discover_user_history(&criteria, on_progress).await,
        ),
    };

    FetchOutcome { tab, report }
}
