// src/infrastructure/notifications.rs
use crate::application::ports::notify::{Notification, NotificationLevel, Notifier};
use std::sync::{
    Arc, Weak,
    atomic::{AtomicU64, Ordering},
};
use tokio::{runtime::Handle, sync::watch};
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedNotification {
    pub id: u64,
    pub notification: Notification,
}

/// Queue of visible toasts for the view layer. Each toast dismisses itself
/// after its duration when a runtime is available.
pub struct NotificationCenter {
    next_id: AtomicU64,
    queue: Arc<watch::Sender<Vec<PostedNotification>>>,
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationCenter {
    pub fn new() -> Self {
        let (queue, _) = watch::channel(Vec::new());
        Self {
            next_id: AtomicU64::new(1),
            queue: Arc::new(queue),
        }
    }

    pub fn list(&self) -> Vec<PostedNotification> {
        self.queue.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Vec<PostedNotification>> {
        self.queue.subscribe()
    }

    pub fn remove(&self, id: u64) -> bool {
        dismiss(&self.queue, id)
    }

    pub fn clear(&self) {
        self.queue.send_modify(Vec::clear);
    }

    fn schedule_dismiss(&self, id: u64, posted: &Notification) {
        let Ok(runtime) = Handle::try_current() else {
            return;
        };
        let queue: Weak<_> = Arc::downgrade(&self.queue);
        let after = posted.duration;
        runtime.spawn(async move {
            tokio::time::sleep(after).await;
            if let Some(queue) = queue.upgrade() {
                dismiss(&queue, id);
            }
        });
    }
}

fn dismiss(queue: &watch::Sender<Vec<PostedNotification>>, id: u64) -> bool {
    queue.send_if_modified(|items| {
        let before = items.len();
        items.retain(|item| item.id != id);
        items.len() != before
    })
}

impl Notifier for NotificationCenter {
    fn notify(&self, notification: Notification) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.schedule_dismiss(id, &notification);
        self.queue
            .send_modify(|items| items.push(PostedNotification { id, notification }));
    }
}

/// Writes toasts to the log. Used where nothing renders them.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        let message = notification.message.as_str();
        match notification.level {
            NotificationLevel::Success | NotificationLevel::Info => info!(target: "notification", "{message}"),
            NotificationLevel::Warning => warn!(target: "notification", "{message}"),
            NotificationLevel::Error => error!(target: "notification", "{message}"),
        }
    }
}
