//! Single-slot transient notifications
//!
//! At most one notification is visible at a time. Showing anything evicts
//! whatever was there; messages expire on their own after the configured
//! delay, loading indicators stay until cleared.
//!
//! State machine:
//!
//! ```text
//! idle ──show_loading──▶ loading ──show_message──▶ message(kind)
//!  ▲                       │                          │  │
//!  └──hide_loading/clear───┘                          │  └─show_message─▶ message(kind')
//!  └────────────── expiry / dismiss / clear ──────────┘
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::config::NotificationConfig;

/// Default auto-dismiss delay
pub const DEFAULT_DISMISS_AFTER: Duration = Duration::from_millis(5000);

/// Kind of a dismissible message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Something failed
    Error,
    /// Something succeeded
    Success,
    /// Advisory, nothing failed
    Warning,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Error => "error",
            Self::Success => "success",
            Self::Warning => "warning",
        })
    }
}

/// The visible notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A request is in flight
    Loading,
    /// A dismissible message
    Message {
        /// Identifier used for manual dismissal
        id: u64,
        /// Message kind
        kind: MessageKind,
        /// Message text
        text: String,
    },
}

impl Notification {
    /// Message kind, `None` for the loading indicator
    #[must_use]
    pub fn kind(&self) -> Option<MessageKind> {
        match self {
            Self::Loading => None,
            Self::Message { kind, .. } => Some(*kind),
        }
    }

    /// Message text, `None` for the loading indicator
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Loading => None,
            Self::Message { text, .. } => Some(text),
        }
    }
}

#[derive(Default)]
struct Slot {
    current: Option<Notification>,
    expiry: Option<AbortHandle>,
}

impl Slot {
    fn visible_message(&self) -> Option<u64> {
        match self.current {
            Some(Notification::Message { id, .. }) => Some(id),
            _ => None,
        }
    }

    fn cancel_expiry(&mut self) {
        if let Some(handle) = self.expiry.take() {
            handle.abort();
        }
    }
}

struct Shared {
    dismiss_after: Duration,
    slot: Mutex<Slot>,
    next_id: AtomicU64,
    changes: watch::Sender<Option<Notification>>,
}

impl Shared {
    /// Replace the slot content and publish the new state
    fn replace(&self, slot: &mut Slot, next: Option<Notification>) {
        slot.cancel_expiry();
        slot.current = next.clone();
        self.changes.send_replace(next);
    }
}

/// Owner of the visible notification.
///
/// Cloning is cheap; clones share the same slot. Concurrent requests race
/// for it and the last one to show something wins.
#[derive(Clone)]
pub struct NotificationCenter {
    shared: Arc<Shared>,
}

impl fmt::Debug for NotificationCenter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationCenter")
            .field("dismiss_after", &self.shared.dismiss_after)
            .field("current", &self.current())
            .finish()
    }
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new(DEFAULT_DISMISS_AFTER)
    }
}

impl NotificationCenter {
    /// Create a center whose messages expire after `dismiss_after`
    #[must_use]
    pub fn new(dismiss_after: Duration) -> Self {
        let (changes, _) = watch::channel(None);
        Self {
            shared: Arc::new(Shared {
                dismiss_after,
                slot: Mutex::new(Slot::default()),
                next_id: AtomicU64::new(1),
                changes,
            }),
        }
    }

    /// Create from configuration
    #[must_use]
    pub fn from_config(config: &NotificationConfig) -> Self {
        Self::new(config.dismiss_after)
    }

    /// Auto-dismiss delay
    #[must_use]
    pub fn dismiss_after(&self) -> Duration {
        self.shared.dismiss_after
    }

    /// Snapshot of the visible notification
    #[must_use]
    pub fn current(&self) -> Option<Notification> {
        self.shared.slot.lock().current.clone()
    }

    /// Observe every state change
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Notification>> {
        self.shared.changes.subscribe()
    }

    /// Show the loading indicator, evicting anything visible. Never expires.
    pub fn show_loading(&self) {
        let mut slot = self.shared.slot.lock();
        trace!("Showing loading indicator");
        self.shared.replace(&mut slot, Some(Notification::Loading));
    }

    /// Remove the loading indicator if it is what is visible
    pub fn hide_loading(&self) {
        let mut slot = self.shared.slot.lock();
        if slot.current == Some(Notification::Loading) {
            self.shared.replace(&mut slot, None);
        }
    }

    /// Show a dismissible message and schedule its expiry. Returns its id.
    pub fn show_message(&self, kind: MessageKind, text: impl Into<String>) -> u64 {
        let text = text.into();
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let mut slot = self.shared.slot.lock();

        debug!(id, %kind, text = %text, "Showing notification");
        self.shared
            .replace(&mut slot, Some(Notification::Message { id, kind, text }));
        slot.expiry = self.schedule_expiry(id);
        id
    }

    /// Show an error message
    pub fn show_error(&self, text: impl Into<String>) -> u64 {
        self.show_message(MessageKind::Error, text)
    }

    /// Show a success message
    pub fn show_success(&self, text: impl Into<String>) -> u64 {
        self.show_message(MessageKind::Success, text)
    }

    /// Show a warning message
    pub fn show_warning(&self, text: impl Into<String>) -> u64 {
        self.show_message(MessageKind::Warning, text)
    }

    /// Manually close a message. Returns false if it is no longer visible.
    pub fn dismiss(&self, id: u64) -> bool {
        let mut slot = self.shared.slot.lock();
        remove_if_current(&self.shared, &mut slot, id)
    }

    /// Remove the loading indicator and/or message. Idempotent.
    pub fn clear_all(&self) {
        let mut slot = self.shared.slot.lock();
        if slot.current.is_some() || slot.expiry.is_some() {
            self.shared.replace(&mut slot, None);
        }
    }

    fn schedule_expiry(&self, id: u64) -> Option<AbortHandle> {
        let Ok(runtime) = Handle::try_current() else {
            warn!(id, "No async runtime; notification will not expire on its own");
            return None;
        };

        let shared: Weak<Shared> = Arc::downgrade(&self.shared);
        // Deadline counts from when the message was shown, not first poll
        let deadline = Instant::now() + self.shared.dismiss_after;
        let task = runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let Some(shared) = shared.upgrade() else {
                return;
            };
            let mut slot = shared.slot.lock();
            if slot.visible_message() == Some(id) {
                // The stored handle is ours; drop it rather than abort ourselves
                slot.expiry = None;
                remove_if_current(&shared, &mut slot, id);
                trace!(id, "Notification expired");
            }
        });
        Some(task.abort_handle())
    }
}

fn remove_if_current(shared: &Shared, slot: &mut Slot, id: u64) -> bool {
    if slot.visible_message() == Some(id) {
        shared.replace(slot, None);
        true
    } else {
        false
    }
}
