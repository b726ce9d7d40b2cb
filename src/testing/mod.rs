use std::ops::Range;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::groups::{CourseId, GroupingSettings, MemoryStore, PeerGroupService, StudentId};
use crate::notify::{ChannelNotifier, Notification};

/// Test utilities: an in-memory store wired to a service whose notifications
/// land on a channel the test can drain.
pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub service: Arc<PeerGroupService>,
    pub notifications: mpsc::UnboundedReceiver<Notification>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_notifier(ChannelNotifier::new())
    }

    /// Build a context around a preconfigured channel notifier, e.g. one that
    /// rejects mail for chosen recipients.
    pub fn with_notifier(
        (notifier, notifications): (ChannelNotifier, mpsc::UnboundedReceiver<Notification>),
    ) -> Self {
        let store = Arc::new(MemoryStore::new());
        let service = Arc::new(PeerGroupService::new(
            store.clone(),
            store.clone(),
            Arc::new(notifier),
            GroupingSettings::default(),
        ));
        Self {
            store,
            service,
            notifications,
        }
    }

    /// Wait until `count` notifications arrived (or the channel closed).
    pub async fn next_notifications(&mut self, count: usize) -> Vec<Notification> {
        let mut received = Vec::with_capacity(count);
        while received.len() < count {
            match self.notifications.recv().await {
                Some(note) => received.push(note),
                None => break,
            }
        }
        received
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Enroll students with ids in `ids` into `course`.
pub async fn seed_course(store: &MemoryStore, course: CourseId, ids: Range<i64>) {
    for id in ids {
        store
            .enroll(
                StudentId(id),
                &format!("Student {}", id),
                &format!("student{}@example.com", id),
                course,
            )
            .await;
    }
}
