use crate::calendar::{build_day_index, DateParser, DayIndex, FrenchDateParser};
use crate::ingest::EventSource;
use crate::models::{Event, EventsState};

pub const NO_EVENTS_MESSAGE: &str = "Aucun événement trouvé. Vérifiez la connexion et réessayez.";

/// State of one events/agenda screen: the fetched list and the day index
/// derived from it. Each screen owns its own session; nothing is shared.
pub struct EventsSession<S, P = FrenchDateParser> {
    source: S,
    parser: P,
    state: EventsState,
    index: DayIndex,
}

impl<S: EventSource> EventsSession<S> {
    pub fn new(source: S) -> Self {
        Self::with_parser(source, FrenchDateParser)
    }
}

impl<S: EventSource, P: DateParser> EventsSession<S, P> {
    pub fn with_parser(source: S, parser: P) -> Self {
        Self {
            source,
            parser,
            state: EventsState::Loading,
            index: DayIndex::default(),
        }
    }

    pub fn state(&self) -> &EventsState {
        &self.state
    }

    pub fn events(&self) -> &[Event] {
        self.state.events()
    }

    pub fn day_index(&self) -> &DayIndex {
        &self.index
    }

    pub fn day_index_mut(&mut self) -> &mut DayIndex {
        &mut self.index
    }

    /// Fetches once and replaces both the list and the index wholesale.
    pub async fn load(&mut self) -> &EventsState {
        let events = self.source.fetch_events().await;
        self.apply(events);
        &self.state
    }

    /// Back to `Loading`, then a fresh fetch.
    pub async fn refresh(&mut self) -> &EventsState {
        self.mark_loading();
        self.load().await
    }

    pub fn mark_loading(&mut self) {
        self.state = EventsState::Loading;
    }

    pub fn event_by_id(&self, id: &str) -> Option<&Event> {
        self.events().iter().find(|event| event.id == id)
    }

    fn apply(&mut self, events: Vec<Event>) {
        if events.is_empty() {
            tracing::warn!("no events available");
            self.index = DayIndex::default();
            self.state = EventsState::Error(NO_EVENTS_MESSAGE.to_string());
            return;
        }
        tracing::info!(count = events.len(), "events loaded");
        self.index = build_day_index(&events, &self.parser);
        self.state = EventsState::Success(events);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DayKey;
    use std::sync::Mutex;

    struct ScriptedSource {
        batches: Mutex<Vec<Vec<Event>>>,
    }

    impl ScriptedSource {
        fn new(mut batches: Vec<Vec<Event>>) -> Self {
            batches.reverse();
            Self {
                batches: Mutex::new(batches),
            }
        }
    }

    impl EventSource for ScriptedSource {
        async fn fetch_events(&self) -> Vec<Event> {
            self.batches.lock().unwrap().pop().unwrap_or_default()
        }
    }

    fn event(id: &str, title: &str, date: &str) -> Event {
        Event {
            id: id.to_string(),
            title: title.to_string(),
            description: String::new(),
            date: date.to_string(),
            location: "Campus".to_string(),
            category: "BDE".to_string(),
        }
    }

    #[tokio::test]
    async fn successful_load_builds_the_index() {
        let source = ScriptedSource::new(vec![vec![
            event("a", "Kickoff", "3 janvier 2025"),
            event("b", "Sans date", "Non spécifié"),
        ]]);
        let mut session = EventsSession::new(source);
        assert!(session.state().is_loading());

        session.load().await;
        assert_eq!(session.events().len(), 2);
        assert_eq!(session.day_index().len(), 1);
        assert_eq!(
            session.day_index().titles(&DayKey::new(2025, 0, 3)),
            &["Kickoff".to_string()]
        );
        assert_eq!(session.event_by_id("b").map(|e| e.title.as_str()), Some("Sans date"));
        assert!(session.event_by_id("zzz").is_none());
    }

    #[tokio::test]
    async fn empty_fetch_becomes_error_state() {
        let mut session = EventsSession::new(ScriptedSource::new(vec![vec![]]));
        let state = session.load().await.clone();
        assert_eq!(state, EventsState::Error(NO_EVENTS_MESSAGE.to_string()));
        assert!(session.event_by_id("a").is_none());
        assert!(session.day_index().is_empty());
    }

    #[tokio::test]
    async fn refresh_replaces_list_and_index_wholesale() {
        let source = ScriptedSource::new(vec![
            vec![event("a", "Gala", "14 février 2025")],
            vec![event("a", "Forum", "20 mars 2025")],
        ]);
        let mut session = EventsSession::new(source);
        session.load().await;
        assert!(session.day_index().has_events(&DayKey::new(2025, 1, 14)));

        session.mark_loading();
        assert!(session.state().is_loading());
        assert!(session.events().is_empty());

        session.refresh().await;
        assert_eq!(session.event_by_id("a").map(|e| e.title.as_str()), Some("Forum"));
        assert!(!session.day_index().has_events(&DayKey::new(2025, 1, 14)));
        assert!(session.day_index().has_events(&DayKey::new(2025, 2, 20)));
    }

    #[tokio::test]
    async fn custom_parser_is_used_for_the_index() {
        let source = ScriptedSource::new(vec![vec![event("a", "ISO", "2025-04-05")]]);
        let iso = |text: &str| chrono::NaiveDate::parse_from_str(text, "%Y-%m-%d").ok();
        let mut session = EventsSession::with_parser(source, iso);
        session.load().await;
        assert!(session.day_index().has_events(&DayKey::new(2025, 3, 5)));
    }
}
