use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::models::Event;

pub const DEFAULT_TITLE: &str = "Rappel";
pub const DEFAULT_MESSAGE: &str = "Vous avez un événement.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub message: String,
}

impl Notification {
    /// Blank parts are replaced by the generic reminder wording.
    pub fn new(title: &str, message: &str) -> Self {
        let pick = |value: &str, default: &str| {
            let value = value.trim();
            if value.is_empty() {
                default.to_string()
            } else {
                value.to_string()
            }
        };
        Self {
            title: pick(title, DEFAULT_TITLE),
            message: pick(message, DEFAULT_MESSAGE),
        }
    }

    pub fn for_event(event: &Event) -> Self {
        let date = event.date.trim();
        let location = event.location.trim();
        let message = match (date.is_empty(), location.is_empty()) {
            (true, _) => String::new(),
            (false, true) => format!("Le {date}"),
            (false, false) => format!("Le {date} à {location}"),
        };
        Self::new(&event.title, &message)
    }
}

/// Where due reminders end up.
pub trait NotificationSink: Send + Sync {
    fn deliver(&self, notification: &Notification);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn deliver(&self, notification: &Notification) {
        tracing::info!(title = %notification.title, message = %notification.message, "reminder delivered");
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink;

impl NotificationSink for ConsoleSink {
    fn deliver(&self, notification: &Notification) {
        println!("[{}] {}", notification.title, notification.message);
    }
}

/// Fire-and-forget reminder scheduling. No handle is returned and nothing
/// can be cancelled.
pub trait Notifier {
    fn schedule(&self, title: &str, message: &str, delay_seconds: u64);
}

pub struct TokioScheduler {
    sink: Arc<dyn NotificationSink>,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl TokioScheduler {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            sink,
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn pending(&self) -> usize {
        let mut pending = self.pending.lock().unwrap_or_else(|p| p.into_inner());
        pending.retain(|task| !task.is_finished());
        pending.len()
    }

    /// Waits for every reminder scheduled so far to be delivered.
    pub async fn wait_all(&self) {
        let tasks: Vec<JoinHandle<()>> = {
            let mut pending = self.pending.lock().unwrap_or_else(|p| p.into_inner());
            std::mem::take(&mut *pending)
        };
        for task in tasks {
            if let Err(err) = task.await {
                tracing::error!("reminder task failed: {err}");
            }
        }
    }
}

impl Default for TokioScheduler {
    fn default() -> Self {
        Self::new(Arc::new(LogSink))
    }
}

impl Notifier for TokioScheduler {
    fn schedule(&self, title: &str, message: &str, delay_seconds: u64) {
        let notification = Notification::new(title, message);
        let Ok(runtime) = Handle::try_current() else {
            tracing::error!(title = %notification.title, "no async runtime, reminder dropped");
            return;
        };

        tracing::info!(title = %notification.title, delay_seconds, "reminder scheduled");
        let sink = Arc::clone(&self.sink);
        let task = runtime.spawn(async move {
            sleep(Duration::from_secs(delay_seconds)).await;
            sink.deliver(&notification);
        });

        let mut pending = self.pending.lock().unwrap_or_else(|p| p.into_inner());
        pending.retain(|task| !task.is_finished());
        pending.push(task);
    }
}
