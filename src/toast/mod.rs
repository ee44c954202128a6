//! Transient user-facing messages.
//!
//! Components publish toasts here; whatever renders the UI subscribes and shows them.

use tokio::sync::broadcast;

/// Number of toasts buffered for slow subscribers before the oldest are dropped.
const TOAST_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub level: ToastLevel,
    pub title: String,
    pub description: Option<String>,
}

/// Broadcast feed of toasts.
#[derive(Debug, Clone)]
pub struct Toaster {
    tx: broadcast::Sender<Toast>,
}

impl Default for Toaster {
    fn default() -> Self {
        Self::new()
    }
}

impl Toaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(TOAST_BUFFER);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Toast> {
        self.tx.subscribe()
    }

    pub fn info(&self, title: impl Into<String>, description: Option<String>) {
        self.publish(ToastLevel::Info, title.into(), description);
    }

    pub fn error(&self, title: impl Into<String>, description: Option<String>) {
        self.publish(ToastLevel::Error, title.into(), description);
    }

    fn publish(&self, level: ToastLevel, title: String, description: Option<String>) {
        // No subscribers is fine: nobody is looking at the screen.
        let _ = self.tx.send(Toast {
            level,
            title,
            description,
        });
    }
}
