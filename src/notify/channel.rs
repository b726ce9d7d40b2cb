use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc;

use super::templates::render;
use super::{Notification, NotificationError, Notifier};

/// Notifier that hands rendered-and-accepted messages to an in-process channel.
///
/// Lets the test suites and embedders observe exactly what was sent, and
/// simulate bounces for chosen recipients.
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
    failing: HashSet<String>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                failing: HashSet::new(),
            },
            rx,
        )
    }

    /// Reject every message addressed to `recipient`.
    pub fn failing_for(mut self, recipient: &str) -> Self {
        self.failing.insert(recipient.to_string());
        self
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn send(
        &self,
        to: &str,
        template: &str,
        variables: &HashMap<String, String>,
    ) -> Result<(), NotificationError> {
        render(template, variables)?;
        if self.failing.contains(to) {
            return Err(NotificationError::SendFailed(format!("mailbox {} rejected the message", to)));
        }
        self.tx
            .send(Notification {
                to: to.to_string(),
                template: template.to_string(),
                variables: variables.clone(),
            })
            .map_err(|_| NotificationError::SendFailed("notification channel closed".to_string()))
    }
}
