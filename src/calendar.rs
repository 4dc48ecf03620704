use std::collections::BTreeMap;

use chrono::{Datelike, Days, NaiveDate, Utc};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{DayKey, Event};

/// Six full Monday-first weeks.
pub const GRID_CELLS: usize = 42;

pub const WEEKDAY_LABELS: [&str; 7] = ["Lun", "Mar", "Mer", "Jeu", "Ven", "Sam", "Dim"];

const MONTH_NAMES: [&str; 12] = [
    "janvier",
    "février",
    "mars",
    "avril",
    "mai",
    "juin",
    "juillet",
    "août",
    "septembre",
    "octobre",
    "novembre",
    "décembre",
];

// "3 janvier 2025", "1er mai 2025", "14 févr. 2025 à 18h"
static FRENCH_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(\d{1,2})(?:er)?\s+(\p{L}+)\.?\s+(\d{4})\b")
        .expect("valid french date regex")
});

/// Turns an event's free-text date into a calendar date.
pub trait DateParser {
    fn parse_date(&self, text: &str) -> Option<NaiveDate>;
}

impl<F> DateParser for F
where
    F: Fn(&str) -> Option<NaiveDate>,
{
    fn parse_date(&self, text: &str) -> Option<NaiveDate> {
        self(text)
    }
}

/// Pattern `d MMMM yyyy` with French month names, independent of host locale.
///
/// Impossible days such as "31 février 2025" are rejected rather than rolled
/// over into the next month, so a typo in the feed leaves the event off the
/// agenda instead of pinning it to the wrong day.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrenchDateParser;

impl DateParser for FrenchDateParser {
    fn parse_date(&self, text: &str) -> Option<NaiveDate> {
        let caps = FRENCH_DATE_RE.captures(text)?;
        let day = caps.get(1)?.as_str().parse::<u32>().ok()?;
        let month = french_month_number(caps.get(2)?.as_str())?;
        let year = caps.get(3)?.as_str().parse::<i32>().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
    }
}

/// 1-based month for a French month name or its usual abbreviation.
fn french_month_number(name: &str) -> Option<u32> {
    let folded: String = name
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'é' | 'è' | 'ê' => 'e',
            'û' | 'ù' => 'u',
            'ô' => 'o',
            other => other,
        })
        .collect();
    let month = match folded.as_str() {
        "janvier" | "janv" => 1,
        "fevrier" | "fevr" | "fev" => 2,
        "mars" => 3,
        "avril" | "avr" => 4,
        "mai" => 5,
        "juin" => 6,
        "juillet" | "juil" => 7,
        "aout" => 8,
        "septembre" | "sept" => 9,
        "octobre" | "oct" => 10,
        "novembre" | "nov" => 11,
        "decembre" | "dec" => 12,
        _ => return None,
    };
    Some(month)
}

impl From<NaiveDate> for DayKey {
    fn from(date: NaiveDate) -> Self {
        DayKey::new(date.year(), date.month0(), date.day())
    }
}

/// Event titles bucketed per calendar day, in ingestion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DayIndex {
    buckets: BTreeMap<DayKey, Vec<String>>,
}

impl DayIndex {
    pub fn titles(&self, key: &DayKey) -> &[String] {
        self.buckets.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_events(&self, key: &DayKey) -> bool {
        !self.titles(key).is_empty()
    }

    /// Adds a title typed in on the agenda. Blank titles are ignored.
    pub fn add_local(&mut self, key: DayKey, title: &str) -> bool {
        let title = title.trim();
        if title.is_empty() {
            return false;
        }
        self.push(key, title.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DayKey, &Vec<String>)> {
        self.buckets.iter()
    }

    pub fn as_map(&self) -> &BTreeMap<DayKey, Vec<String>> {
        &self.buckets
    }

    fn push(&mut self, key: DayKey, title: String) {
        self.buckets.entry(key).or_default().push(title);
    }
}

/// Buckets every event whose date parses; the others are left out.
pub fn build_day_index<P>(events: &[Event], parser: &P) -> DayIndex
where
    P: DateParser + ?Sized,
{
    let mut index = DayIndex::default();
    for event in events {
        match parser.parse_date(&event.date) {
            Some(date) => index.push(DayKey::from(date), event.title.clone()),
            None => tracing::debug!(id = %event.id, date = %event.date, "unparseable event date, not indexed"),
        }
    }
    index
}

/// Adds `delta` months to a zero-based (year, month), rolling over years.
pub fn shift_month(year: i32, month: u32, delta: i32) -> (i32, u32) {
    let total = i64::from(year) * 12 + i64::from(month) + i64::from(delta);
    let year = total
        .div_euclid(12)
        .clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32;
    (year, total.rem_euclid(12) as u32)
}

/// The 42 days shown for a month, starting on the Monday on or before the
/// 1st. Days of the neighbouring months are included as-is.
///
/// Empty only when the month lies outside chrono's supported range.
pub fn generate_month_grid(year: i32, month: u32) -> Vec<DayKey> {
    let (year, month) = shift_month(year, month, 0);
    let Some(first) = NaiveDate::from_ymd_opt(year, month + 1, 1) else {
        tracing::warn!(year, month, "month outside supported calendar range");
        return Vec::new();
    };
    let offset = u64::from(first.weekday().num_days_from_monday());
    let Some(start) = first.checked_sub_days(Days::new(offset)) else {
        return Vec::new();
    };
    start.iter_days().take(GRID_CELLS).map(DayKey::from).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthGrid {
    pub year: i32,
    pub month: u32,
    pub cells: Vec<DayKey>,
}

impl MonthGrid {
    pub fn new(year: i32, month: u32) -> Self {
        let (year, month) = shift_month(year, month, 0);
        Self {
            year,
            month,
            cells: generate_month_grid(year, month),
        }
    }

    pub fn shifted(&self, delta: i32) -> Self {
        let (year, month) = shift_month(self.year, self.month, delta);
        Self::new(year, month)
    }

    pub fn weeks(&self) -> std::slice::Chunks<'_, DayKey> {
        self.cells.chunks(7)
    }

    /// Filler days from adjacent months are told apart by month alone.
    pub fn is_current_month(&self, cell: &DayKey) -> bool {
        cell.month == self.month
    }

    pub fn title(&self) -> String {
        month_label(self.year, self.month)
    }
}

/// "Janvier 2025"
pub fn month_label(year: i32, month: u32) -> String {
    let (year, month) = shift_month(year, month, 0);
    let name = MONTH_NAMES[month as usize];
    let mut chars = name.chars();
    let capitalized = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
        None => String::new(),
    };
    format!("{capitalized} {year}")
}

pub fn today_in(tz: Tz) -> DayKey {
    DayKey::from(Utc::now().with_timezone(&tz).date_naive())
}
