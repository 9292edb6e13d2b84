use discovery_engine::DiscoveryEngine;
use gui::{App, RedditEngine};
use iced::{Application, Settings};
use postscout_core::{AppConfig, CoreError, ErrorReporter};
use reddit_client::RedditApiClient;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str =
    "postscout=info,gui=info,discovery_engine=info,reddit_client=info";

fn main() -> Result<(), CoreError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    tracing::info!("Starting Postscout - Reddit Post Fetcher");

    let engine = build_engine();
    if let Err(e) = &engine {
        ErrorReporter::new().report_error(e);
    }

    let mut settings = Settings::with_flags(engine);
    settings.window = iced::window::Settings {
        size: iced::Size::new(900.0, 800.0),
        min_size: Some(iced::Size::new(600.0, 500.0)),
        ..Default::default()
    };

    PostscoutApp::run(settings).map_err(|e| {
        tracing::error!("Application error: {}", e);
        CoreError::Internal {
            message: format!("GUI error: {e}"),
        }
    })
}

fn build_engine() -> Result<RedditEngine, CoreError> {
    let config = AppConfig::load()?;
    let client = RedditApiClient::from_config(&config)?;
    Ok(DiscoveryEngine::with_history_settings(client, config.history))
}

struct PostscoutApp {
    app: App,
}

impl Application for PostscoutApp {
    type Message = gui::Message;
    type Theme = iced::Theme;
    type Executor = iced::executor::Default;
    type Flags = Result<RedditEngine, CoreError>;

    fn new(flags: Self::Flags) -> (Self, iced::Command<Self::Message>) {
        tracing::info!("Initializing application");
        (Self { app: App::new(flags) }, iced::Command::none())
    }

    fn title(&self) -> String {
        "Reddit Post Fetcher".to_string()
    }

    fn update(&mut self, message: Self::Message) -> iced::Command<Self::Message> {
        self.app.update(message)
    }

    fn subscription(&self) -> iced::Subscription<Self::Message> {
        self.app.subscription()
    }

    fn view(&self) -> iced::Element<Self::Message> {
        self.app.view()
    }
}
