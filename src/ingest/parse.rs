use serde_json::{Map, Value};

use crate::models::Event;

const UNSPECIFIED: &str = "Non spécifié";
const DEFAULT_CATEGORY: &str = "Général";

/// Turns an events payload into records.
///
/// The feed is normally an object keyed by event id (`{"e1": {...}}`), and
/// some mirrors serve a plain array instead. The keyed shape is tried first;
/// when it yields nothing usable the array shape is tried. Entries that are
/// not objects are skipped without aborting the batch. A blank body, `null`
/// or `{}` means "no events" and is not retried as an array.
pub fn parse_events(body: &str) -> Vec<Event> {
    let trimmed = body.trim();
    if trimmed.is_empty() || trimmed == "null" {
        tracing::warn!("events payload is empty or null");
        return Vec::new();
    }

    let document: Value = match serde_json::from_str(trimmed) {
        Ok(value) => value,
        Err(err) => {
            tracing::error!("events payload is neither a JSON object nor a JSON array: {err}");
            return Vec::new();
        }
    };

    if let Value::Object(map) = &document {
        if map.is_empty() {
            tracing::warn!("events payload is an empty object");
            return Vec::new();
        }
        let events = parse_keyed(map);
        if !events.is_empty() {
            tracing::debug!(count = events.len(), "parsed keyed events");
            return events;
        }
    }

    match document {
        Value::Array(items) => {
            let events = parse_listed(&items);
            tracing::debug!(count = events.len(), "parsed listed events");
            events
        }
        Value::Object(_) => {
            tracing::warn!("keyed events payload contained no usable entry");
            Vec::new()
        }
        other => {
            tracing::error!(
                "events payload is neither a JSON object nor a JSON array: {}",
                kind_of(&other)
            );
            Vec::new()
        }
    }
}

fn parse_keyed(map: &Map<String, Value>) -> Vec<Event> {
    let mut events = Vec::with_capacity(map.len());
    for (key, value) in map {
        let Some(entry) = value.as_object() else {
            tracing::warn!("value for key '{key}' is not a JSON object, skipping");
            continue;
        };
        events.push(Event {
            id: key.clone(),
            title: text_field(entry, "title", ""),
            description: text_field(entry, "description", ""),
            date: text_field(entry, "date", ""),
            location: text_field(entry, "location", ""),
            category: text_field(entry, "category", ""),
        });
    }
    events
}

fn parse_listed(items: &[Value]) -> Vec<Event> {
    let mut events = Vec::with_capacity(items.len());
    for (index, value) in items.iter().enumerate() {
        let Some(entry) = value.as_object() else {
            tracing::warn!("array element {index} is not a JSON object, skipping");
            continue;
        };
        let description = entry
            .get("body")
            .and_then(Value::as_str)
            .or_else(|| entry.get("description").and_then(Value::as_str))
            .unwrap_or_default()
            .to_string();
        events.push(Event {
            id: text_field(entry, "id", &index.to_string()),
            title: text_field(entry, "title", ""),
            description,
            date: text_field(entry, "date", UNSPECIFIED),
            location: text_field(entry, "location", UNSPECIFIED),
            category: text_field(entry, "category", DEFAULT_CATEGORY),
        });
    }
    events
}

// Anything that is not a JSON string (number, bool, null, nested) falls back.
fn text_field(entry: &Map<String, Value>, key: &str, default: &str) -> String {
    entry
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or(default)
        .to_string()
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
