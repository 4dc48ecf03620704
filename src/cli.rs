use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use crate::calendar::{today_in, DayIndex, MonthGrid, WEEKDAY_LABELS};
use crate::chat::ChatSession;
use crate::config::{AppConfig, ConfigStore};
use crate::db::Store;
use crate::ingest::RemoteEventSource;
use crate::llm::ConfiguredAssistant;
use crate::models::{DayKey, Event, EventsState};
use crate::scheduler::{ConsoleSink, Notification, Notifier, TokioScheduler};
use crate::session::EventsSession;

#[derive(Debug, Parser)]
#[command(name = "smart-companion", version, about = "Campus events, agenda and assistant")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List every event from the feed
    Events,
    /// Show one event in detail
    Event { id: String },
    /// Month view with event markers
    Agenda {
        #[arg(long)]
        year: Option<i32>,
        /// 1 = January
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
        month: Option<u32>,
        /// Months to move forward (negative goes back)
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        shift: i32,
        /// Day whose events are listed under the grid
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=31))]
        day: Option<u32>,
    },
    /// Ask the assistant a question
    Ask {
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },
    /// Past conversations
    History {
        #[command(subcommand)]
        action: Option<HistoryAction>,
    },
    /// Schedule a reminder and wait for it
    Remind {
        title: Option<String>,
        #[arg(long)]
        message: Option<String>,
        /// Build the reminder from an event of the feed
        #[arg(long)]
        event: Option<String>,
        /// Seconds before delivery
        #[arg(long)]
        delay: Option<u64>,
    },
    /// Show or change settings
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Debug, Subcommand)]
enum HistoryAction {
    List,
    Delete { id: i64 },
    Clear,
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    Show,
    Set {
        #[arg(long)]
        events_url: Option<String>,
        #[arg(long)]
        timeout: Option<u64>,
        #[arg(long)]
        gemini_key: Option<String>,
        #[arg(long)]
        gemini_model: Option<String>,
        #[arg(long)]
        gemini_endpoint: Option<String>,
        #[arg(long)]
        timezone: Option<String>,
        #[arg(long)]
        reminder_delay: Option<u64>,
    },
}

pub async fn dispatch(cli: Cli, config_store: &ConfigStore) -> anyhow::Result<()> {
    let config = config_store.read();
    match cli.command {
        Commands::Events => list_events(&config).await,
        Commands::Event { id } => show_event(&config, &id).await,
        Commands::Agenda {
            year,
            month,
            shift,
            day,
        } => agenda(&config, year, month, shift, day).await,
        Commands::Ask { message } => ask(&config, &message.join(" ")).await,
        Commands::History { action } => history(&config, action.unwrap_or(HistoryAction::List)).await,
        Commands::Remind {
            title,
            message,
            event,
            delay,
        } => remind(&config, title, message, event, delay).await,
        Commands::Config { action } => configure(config_store, action.unwrap_or(ConfigAction::Show)),
    }
}

async fn load_session(config: &AppConfig) -> EventsSession<RemoteEventSource> {
    let mut session = EventsSession::new(RemoteEventSource::from_config(config));
    session.load().await;
    session
}

async fn list_events(config: &AppConfig) -> anyhow::Result<()> {
    let session = load_session(config).await;
    match session.state() {
        EventsState::Success(events) => {
            for event in events {
                println!(
                    "{:<12} {:<20} {} ({}, {})",
                    event.id, event.date, event.title, event.location, event.category
                );
            }
        }
        EventsState::Error(message) => {
            println!("{message}");
            println!("URL: {}", config.events_url);
        }
        EventsState::Loading => {}
    }
    Ok(())
}

async fn show_event(config: &AppConfig, id: &str) -> anyhow::Result<()> {
    let session = load_session(config).await;
    let Some(event) = session.event_by_id(id) else {
        bail!("événement '{id}' introuvable");
    };
    print!("{}", render_event(event));
    Ok(())
}

fn render_event(event: &Event) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", event.title);
    let _ = writeln!(out, "  Date      : {}", event.date);
    let _ = writeln!(out, "  Lieu      : {}", event.location);
    let _ = writeln!(out, "  Catégorie : {}", event.category);
    if !event.description.trim().is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", event.description.trim());
    }
    out
}

async fn agenda(
    config: &AppConfig,
    year: Option<i32>,
    month: Option<u32>,
    shift: i32,
    day: Option<u32>,
) -> anyhow::Result<()> {
    let today = today_in(config.tz());
    let base = MonthGrid::new(
        year.unwrap_or(today.year),
        month.map(|m| m - 1).unwrap_or(today.month),
    );
    let grid = base.shifted(shift);

    let session = load_session(config).await;
    if let EventsState::Error(message) = session.state() {
        tracing::warn!("agenda shown without events: {message}");
    }

    let selected = DayKey::new(grid.year, grid.month, day.unwrap_or(today.day));
    print!("{}", render_agenda(&grid, session.day_index(), Some(&selected)));
    Ok(())
}

/// Text month view. In-month days with events carry a `*`; filler days
/// from adjacent months are shown in parentheses.
fn render_agenda(grid: &MonthGrid, index: &DayIndex, selected: Option<&DayKey>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", grid.title());
    for label in WEEKDAY_LABELS {
        let _ = write!(out, "{label:^5}");
    }
    let _ = writeln!(out);

    for week in grid.weeks() {
        for cell in week {
            let marker = if index.has_events(cell) { '*' } else { ' ' };
            if grid.is_current_month(cell) {
                let _ = write!(out, " {:>2}{} ", cell.day, marker);
            } else {
                let _ = write!(out, "({:>2}){}", cell.day, marker);
            }
        }
        let _ = writeln!(out);
    }

    if let Some(day) = selected {
        let _ = writeln!(out);
        let _ = writeln!(out, "Événements du {}", day.label());
        let titles = index.titles(day);
        if titles.is_empty() {
            let _ = writeln!(out, "  Aucun événement");
        }
        for title in titles {
            let _ = writeln!(out, "  - {title}");
        }
    }
    out
}

async fn ask(config: &AppConfig, message: &str) -> anyhow::Result<()> {
    let store = Store::open_default().context("failed to open conversation store")?;
    let mut chat = ChatSession::new(ConfiguredAssistant::from_config(config), store);
    match chat.send(message).await {
        Some(reply) => println!("{reply}"),
        None => bail!("message vide"),
    }
    Ok(())
}

async fn history(config: &AppConfig, action: HistoryAction) -> anyhow::Result<()> {
    let tz = config.tz();
    let output = tokio::task::spawn_blocking(move || -> anyhow::Result<String> {
        let store = Store::open_default().context("failed to open conversation store")?;
        let mut out = String::new();
        match action {
            HistoryAction::List => {
                let conversations = store.list_all().context("failed to list history")?;
                if conversations.is_empty() {
                    let _ = writeln!(out, "Aucun historique");
                }
                for conversation in conversations {
                    let _ = writeln!(out, "#{} {}", conversation.id, conversation.display_time(tz));
                    let _ = writeln!(out, "  Q: {}", conversation.user_message);
                    let _ = writeln!(out, "  R: {}", conversation.ai_response);
                }
            }
            HistoryAction::Delete { id } => {
                let Some(conversation) = store.get(id).context("history lookup failed")? else {
                    bail!("aucune conversation #{id}");
                };
                store.delete(&conversation).context("failed to delete conversation")?;
                let _ = writeln!(out, "Conversation #{id} supprimée");
            }
            HistoryAction::Clear => {
                let removed = store.delete_all().context("failed to clear history")?;
                let _ = writeln!(out, "{removed} conversation(s) supprimée(s)");
            }
        }
        Ok(out)
    })
    .await
    .context("history task failed")??;
    print!("{output}");
    Ok(())
}

async fn remind(
    config: &AppConfig,
    title: Option<String>,
    message: Option<String>,
    event_id: Option<String>,
    delay: Option<u64>,
) -> anyhow::Result<()> {
    let notification = match event_id {
        Some(id) => {
            let session = load_session(config).await;
            let event = session
                .event_by_id(&id)
                .with_context(|| format!("événement '{id}' introuvable"))?;
            Notification::for_event(event)
        }
        None => Notification::new(
            title.as_deref().unwrap_or_default(),
            message.as_deref().unwrap_or_default(),
        ),
    };
    let delay = delay.unwrap_or(config.reminder_delay_seconds);

    let scheduler = TokioScheduler::new(Arc::new(ConsoleSink));
    scheduler.schedule(&notification.title, &notification.message, delay);
    println!("Rappel programmé dans {delay} s");
    scheduler.wait_all().await;
    Ok(())
}

fn configure(config_store: &ConfigStore, action: ConfigAction) -> anyhow::Result<()> {
    let config = match action {
        ConfigAction::Show => config_store.read(),
        ConfigAction::Set {
            events_url,
            timeout,
            gemini_key,
            gemini_model,
            gemini_endpoint,
            timezone,
            reminder_delay,
        } => {
            if let Some(zone) = &timezone {
                if zone.parse::<chrono_tz::Tz>().is_err() {
                    bail!("fuseau horaire inconnu: {zone}");
                }
            }
            config_store
                .update(|config| {
                    if let Some(url) = events_url {
                        config.events_url = url;
                    }
                    if let Some(secs) = timeout {
                        config.request_timeout_secs = secs;
                    }
                    if let Some(key) = gemini_key {
                        config.gemini_api_key = Some(key).filter(|k| !k.trim().is_empty());
                    }
                    if let Some(model) = gemini_model {
                        config.gemini_model = model;
                    }
                    if let Some(endpoint) = gemini_endpoint {
                        config.gemini_endpoint = endpoint;
                    }
                    if let Some(zone) = timezone {
                        config.timezone = zone;
                    }
                    if let Some(secs) = reminder_delay {
                        config.reminder_delay_seconds = secs;
                    }
                })
                .with_context(|| format!("failed to write {:?}", config_store.path()))?
        }
    };

    let mut shown = config;
    if shown.gemini_api_key.is_some() {
        shown.gemini_api_key = Some("********".to_string());
    }
    println!("{}", serde_json::to_string_pretty(&shown)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_with(entries: &[(DayKey, &str)]) -> DayIndex {
        let mut index = DayIndex::default();
        for (key, title) in entries {
            index.add_local(*key, title);
        }
        index
    }

    #[test]
    fn agenda_marks_days_with_events() {
        let grid = MonthGrid::new(2025, 0);
        let index = index_with(&[(DayKey::new(2025, 0, 3), "Kickoff")]);
        let rendered = render_agenda(&grid, &index, Some(&DayKey::new(2025, 0, 3)));
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(lines[0], "Janvier 2025");
        assert!(lines[1].starts_with(" Lun "));
        assert!(lines[2].starts_with("(30) (31)   1    2    3* "));
        assert_eq!(rendered.lines().filter(|l| l.contains('*')).count(), 1);
        assert!(rendered.contains("Événements du 3/1/2025\n  - Kickoff\n"));
    }

    #[test]
    fn agenda_without_events_for_selected_day() {
        let grid = MonthGrid::new(2025, 1);
        let rendered = render_agenda(&grid, &DayIndex::default(), Some(&DayKey::new(2025, 1, 30)));
        assert!(rendered.starts_with("Février 2025\n"));
        assert!(rendered.ends_with("Événements du 30/2/2025\n  Aucun événement\n"));
    }

    #[test]
    fn event_details_skip_blank_description() {
        let event = Event {
            id: "e1".to_string(),
            title: "Gala".to_string(),
            description: "  ".to_string(),
            date: "14 février 2025".to_string(),
            location: "Palais Neptune".to_string(),
            category: "BDE".to_string(),
        };
        let rendered = render_event(&event);
        assert!(rendered.starts_with("Gala\n  Date      : 14 février 2025\n"));
        assert!(rendered.ends_with("Catégorie : BDE\n"));
    }

    #[test]
    fn parses_agenda_and_history_arguments() {
        let cli = Cli::try_parse_from(["smart-companion", "agenda", "--month", "3", "--shift", "-2"])
            .expect("agenda args");
        assert!(matches!(
            cli.command,
            Commands::Agenda {
                month: Some(3),
                shift: -2,
                year: None,
                day: None
            }
        ));

        let cli = Cli::try_parse_from(["smart-companion", "history", "delete", "7"]).expect("history args");
        assert!(matches!(
            cli.command,
            Commands::History {
                action: Some(HistoryAction::Delete { id: 7 })
            }
        ));

        assert!(Cli::try_parse_from(["smart-companion", "agenda", "--month", "13"]).is_err());
        assert!(Cli::try_parse_from(["smart-companion", "ask"]).is_err());
    }
}
