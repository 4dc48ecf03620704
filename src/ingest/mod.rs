pub mod http;
pub mod parse;

use std::future::Future;
use std::time::Duration;

use crate::config::AppConfig;
use crate::models::Event;

pub use http::FetchError;
pub use parse::parse_events;

pub const DEFAULT_EVENTS_URL: &str =
    "https://isen-smart-companion-default-rtdb.europe-west1.firebasedatabase.app/events.json";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Where the events screen gets its list from.
///
/// Implementations fail soft: any failure is logged and reported as an empty
/// list, never as an error.
pub trait EventSource: Send + Sync {
    fn fetch_events(&self) -> impl Future<Output = Vec<Event>> + Send;
}

#[derive(Debug, Clone)]
pub struct RemoteEventSource {
    url: String,
    timeout: Duration,
}

impl RemoteEventSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.events_url.clone()).with_timeout(config.request_timeout())
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Same as [`EventSource::fetch_events`] but surfaces transport failures.
    pub async fn try_fetch(&self) -> Result<Vec<Event>, FetchError> {
        let client = http::build_client(&self.url, self.timeout)?;
        let body = http::fetch_json_text(&client, &self.url).await?;
        Ok(parse_events(&body))
    }
}

impl Default for RemoteEventSource {
    fn default() -> Self {
        Self::new(DEFAULT_EVENTS_URL)
    }
}

impl EventSource for RemoteEventSource {
    async fn fetch_events(&self) -> Vec<Event> {
        match self.try_fetch().await {
            Ok(events) => {
                tracing::info!(count = events.len(), "events fetched");
                events
            }
            Err(err) => {
                tracing::error!("events fetch failed: {err}");
                Vec::new()
            }
        }
    }
}

/// One-shot fetch against `url` with the default timeouts.
pub async fn fetch_events(url: &str) -> Vec<Event> {
    RemoteEventSource::new(url).fetch_events().await
}
