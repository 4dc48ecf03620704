use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::models::Conversation;
use crate::utils;

/// Assistant history, one row per question/answer exchange.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open_default() -> rusqlite::Result<Self> {
        let path = utils::database_path();
        Self::open(&path)
    }

    pub fn open(path: &Path) -> rusqlite::Result<Self> {
        utils::ensure_parent(path);
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> rusqlite::Result<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> rusqlite::Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS conversations(
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_message TEXT NOT NULL,
                ai_response TEXT NOT NULL,
                timestamp TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    pub fn insert(&self, user_message: &str, ai_response: &str) -> rusqlite::Result<Conversation> {
        self.insert_at(user_message, ai_response, Utc::now())
    }

    pub fn insert_at(
        &self,
        user_message: &str,
        ai_response: &str,
        timestamp: DateTime<Utc>,
    ) -> rusqlite::Result<Conversation> {
        self.conn.execute(
            "INSERT INTO conversations (user_message, ai_response, timestamp)
             VALUES (?1, ?2, ?3)",
            params![user_message, ai_response, timestamp],
        )?;
        Ok(Conversation {
            id: self.conn.last_insert_rowid(),
            user_message: user_message.to_string(),
            ai_response: ai_response.to_string(),
            timestamp,
        })
    }

    /// Newest first.
    pub fn list_all(&self) -> rusqlite::Result<Vec<Conversation>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_message, ai_response, timestamp FROM conversations
             ORDER BY timestamp DESC, id DESC",
        )?;
        let rows = stmt.query_map([], conversation_from_row)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn get(&self, id: i64) -> rusqlite::Result<Option<Conversation>> {
        self.conn
            .query_row(
                "SELECT id, user_message, ai_response, timestamp FROM conversations WHERE id = ?1",
                params![id],
                conversation_from_row,
            )
            .optional()
    }

    /// Returns whether a row was removed.
    pub fn delete(&self, conversation: &Conversation) -> rusqlite::Result<bool> {
        let removed = self.conn.execute(
            "DELETE FROM conversations WHERE id = ?1",
            params![conversation.id],
        )?;
        Ok(removed > 0)
    }

    pub fn delete_all(&self) -> rusqlite::Result<usize> {
        self.conn.execute("DELETE FROM conversations", [])
    }
}

fn conversation_from_row(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        user_message: row.get(1)?,
        ai_response: row.get(2)?,
        timestamp: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, hour, 0, 0).unwrap()
    }

    #[test]
    fn list_all_returns_newest_first() {
        let store = Store::open_in_memory().expect("open store");
        store.insert_at("bonjour", "Bonjour !", at(9)).unwrap();
        store.insert_at("isen ?", "Une école", at(11)).unwrap();
        store.insert_at("kotlin ?", "Un langage", at(10)).unwrap();

        let all = store.list_all().expect("list");
        let questions: Vec<&str> = all.iter().map(|c| c.user_message.as_str()).collect();
        assert_eq!(questions, vec!["isen ?", "kotlin ?", "bonjour"]);
        assert_eq!(all[0].timestamp, at(11));
    }

    #[test]
    fn equal_timestamps_fall_back_to_insertion_order() {
        let store = Store::open_in_memory().expect("open store");
        let first = store.insert_at("a", "1", at(8)).unwrap();
        let second = store.insert_at("b", "2", at(8)).unwrap();
        let all = store.list_all().unwrap();
        assert_eq!(all[0].id, second.id);
        assert_eq!(all[1].id, first.id);
    }

    #[test]
    fn delete_removes_only_that_record() {
        let store = Store::open_in_memory().expect("open store");
        let keep = store.insert("garder", "ok").unwrap();
        let drop = store.insert("supprimer", "ok").unwrap();

        assert!(store.delete(&drop).unwrap());
        assert!(!store.delete(&drop).unwrap());
        assert_eq!(store.get(drop.id).unwrap(), None);
        assert_eq!(store.get(keep.id).unwrap().map(|c| c.user_message), Some("garder".to_string()));
        assert_eq!(store.list_all().unwrap().len(), 1);
    }

    #[test]
    fn delete_all_empties_history() {
        let store = Store::open_in_memory().expect("open store");
        store.insert("a", "1").unwrap();
        store.insert("b", "2").unwrap();
        assert_eq!(store.delete_all().unwrap(), 2);
        assert!(store.list_all().unwrap().is_empty());
    }
}
