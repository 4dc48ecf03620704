pub mod calendar;
pub mod chat;
mod cli;
pub mod config;
pub mod db;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod scheduler;
pub mod session;
mod utils;

#[cfg(test)]
mod test_support;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use calendar::{build_day_index, generate_month_grid, shift_month, DateParser, DayIndex, FrenchDateParser, MonthGrid};
pub use chat::ChatSession;
pub use config::{AppConfig, ConfigStore};
pub use db::Store;
pub use ingest::{fetch_events, EventSource, RemoteEventSource};
pub use llm::{Assistant, CannedAssistant, ConfiguredAssistant, GeminiAssistant};
pub use models::{Conversation, DayKey, Event, EventsState, MessageExchange};
pub use scheduler::{Notifier, TokioScheduler};
pub use session::EventsSession;

const DEFAULT_LOG_FILTER: &str = "smart_companion_lib=info";

pub fn run() -> anyhow::Result<()> {
    init_tracing();
    let cli = cli::Cli::parse();
    let config_store = ConfigStore::load();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(cli::dispatch(cli, &config_store))
}

fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
