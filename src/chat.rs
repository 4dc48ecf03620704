use std::sync::{Arc, Mutex};

use crate::db::Store;
use crate::llm::Assistant;
use crate::models::{Conversation, MessageExchange};

pub const PENDING_REPLY: &str = "Génération de la réponse en cours...";
pub const EMPTY_REPLY: &str = "Désolé, je n'ai pas pu générer de réponse.";

/// Assistant screen: the visible transcript plus the persisted history.
pub struct ChatSession<A> {
    assistant: A,
    store: Arc<Mutex<Store>>,
    transcript: Vec<MessageExchange>,
}

impl<A: Assistant> ChatSession<A> {
    pub fn new(assistant: A, store: Store) -> Self {
        Self::with_shared_store(assistant, Arc::new(Mutex::new(store)))
    }

    pub fn with_shared_store(assistant: A, store: Arc<Mutex<Store>>) -> Self {
        Self {
            assistant,
            store,
            transcript: Vec::new(),
        }
    }

    pub fn transcript(&self) -> &[MessageExchange] {
        &self.transcript
    }

    /// Sends one message and returns the reply shown to the user.
    ///
    /// Provider failures never propagate: they become an apology, and the
    /// exchange is stored either way. Blank messages are ignored.
    pub async fn send(&mut self, message: &str) -> Option<String> {
        let message = message.trim();
        if message.is_empty() {
            return None;
        }

        self.transcript.push(MessageExchange {
            user_message: message.to_string(),
            response_message: PENDING_REPLY.to_string(),
        });

        let reply = match self.assistant.generate_reply(message).await {
            Ok(text) if text.trim().is_empty() => EMPTY_REPLY.to_string(),
            Ok(text) => text,
            Err(err) => {
                tracing::error!("assistant reply failed: {err}");
                apology(&err.to_string())
            }
        };

        if let Some(last) = self.transcript.last_mut() {
            last.response_message = reply.clone();
        }
        self.record(message, &reply).await;
        Some(reply)
    }

    async fn record(&self, message: &str, reply: &str) {
        let store = Arc::clone(&self.store);
        let message = message.to_string();
        let reply = reply.to_string();
        let result = tokio::task::spawn_blocking(move || -> rusqlite::Result<Conversation> {
            let store = store.lock().unwrap_or_else(|p| p.into_inner());
            store.insert(&message, &reply)
        })
        .await;

        match result {
            Ok(Ok(saved)) => tracing::debug!(id = saved.id, "conversation saved"),
            Ok(Err(err)) => tracing::error!("failed to save conversation: {err}"),
            Err(err) => tracing::error!("conversation save task failed: {err}"),
        }
    }
}

pub fn apology(reason: &str) -> String {
    let reason = reason.trim();
    let reason = if reason.is_empty() { "erreur inconnue" } else { reason };
    format!("Désolé, une erreur s'est produite: {reason}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::AssistantError;

    enum FakeAssistant {
        Reply(&'static str),
        Fail(&'static str),
    }

    impl Assistant for FakeAssistant {
        async fn generate_reply(&self, _prompt: &str) -> Result<String, AssistantError> {
            match self {
                FakeAssistant::Reply(text) => Ok(text.to_string()),
                FakeAssistant::Fail(reason) => Err(AssistantError::Provider(reason.to_string())),
            }
        }
    }

    fn shared_store() -> Arc<Mutex<Store>> {
        Arc::new(Mutex::new(Store::open_in_memory().expect("open store")))
    }

    #[tokio::test]
    async fn successful_reply_is_shown_and_saved() {
        let store = shared_store();
        let mut chat =
            ChatSession::with_shared_store(FakeAssistant::Reply("L'ISEN forme des ingénieurs."), store.clone());

        let reply = chat.send("  Qu'est-ce que l'ISEN ?  ").await;
        assert_eq!(reply.as_deref(), Some("L'ISEN forme des ingénieurs."));
        assert_eq!(
            chat.transcript(),
            &[MessageExchange {
                user_message: "Qu'est-ce que l'ISEN ?".to_string(),
                response_message: "L'ISEN forme des ingénieurs.".to_string(),
            }]
        );

        let history = store.lock().unwrap().list_all().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].user_message, "Qu'est-ce que l'ISEN ?");
        assert_eq!(history[0].ai_response, "L'ISEN forme des ingénieurs.");
    }

    #[tokio::test]
    async fn failure_becomes_apology_and_is_still_recorded() {
        let store = shared_store();
        let mut chat = ChatSession::with_shared_store(FakeAssistant::Fail("quota exceeded"), store.clone());

        let reply = chat.send("Bonjour").await.expect("reply");
        assert!(reply.starts_with("Désolé, une erreur s'est produite"));
        assert!(reply.contains("quota exceeded"));

        let history = store.lock().unwrap().list_all().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].ai_response, reply);
    }

    #[tokio::test]
    async fn empty_reply_uses_fallback_text() {
        let mut chat = ChatSession::new(FakeAssistant::Reply("   "), Store::open_in_memory().unwrap());
        assert_eq!(chat.send("Salut").await.as_deref(), Some(EMPTY_REPLY));
    }

    #[tokio::test]
    async fn blank_messages_are_ignored() {
        let store = shared_store();
        let mut chat = ChatSession::with_shared_store(FakeAssistant::Reply("x"), store.clone());
        assert_eq!(chat.send("   ").await, None);
        assert!(chat.transcript().is_empty());
        assert!(store.lock().unwrap().list_all().unwrap().is_empty());
    }

    #[test]
    fn apology_without_reason_says_unknown() {
        assert_eq!(apology(""), "Désolé, une erreur s'est produite: erreur inconnue");
    }
}
