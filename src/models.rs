use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// One entry of the remote events feed, normalized from whatever shape the
/// endpoint returned. Rebuilt from scratch on every fetch.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Event {
    pub id: String, // object key, or array index when the element carries none
    pub title: String,
    pub description: String,
    pub date: String, // free text, usually "3 janvier 2025"
    pub location: String,
    pub category: String,
}

/// Calendar day used both as day-index key and as month-grid cell.
/// `month` is zero-based (January = 0).
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DayKey {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl DayKey {
    pub const fn new(year: i32, month: u32, day: u32) -> Self {
        Self { year, month, day }
    }

    /// `d/M/yyyy`, the way the agenda titles a selected day.
    pub fn label(&self) -> String {
        format!("{}/{}/{}", self.day, self.month + 1, self.year)
    }
}

impl From<(i32, u32, u32)> for DayKey {
    fn from((year, month, day): (i32, u32, u32)) -> Self {
        Self::new(year, month, day)
    }
}

/// A persisted question/answer pair from the assistant screen.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Conversation {
    pub id: i64,
    pub user_message: String,
    pub ai_response: String,
    pub timestamp: DateTime<Utc>,
}

impl Conversation {
    /// `dd/MM/yyyy HH:mm` in the given zone.
    pub fn display_time(&self, tz: Tz) -> String {
        self.timestamp.with_timezone(&tz).format("%d/%m/%Y %H:%M").to_string()
    }
}

/// In-memory transcript line shown on the assistant screen.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MessageExchange {
    pub user_message: String,
    pub response_message: String,
}

/// What the events screen renders.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventsState {
    Loading,
    Success(Vec<Event>),
    Error(String),
}

impl EventsState {
    pub fn events(&self) -> &[Event] {
        match self {
            EventsState::Success(events) => events,
            _ => &[],
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, EventsState::Loading)
    }
}
