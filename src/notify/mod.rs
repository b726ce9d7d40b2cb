//! Notification dispatcher for peer-group events.
//!
//! Delivery is best-effort: callers hand a batch to [`dispatch_batch`] after
//! their transaction committed and never wait on, or fail because of, the result.

mod channel;
mod smtp;
pub mod templates;

pub use channel::ChannelNotifier;
pub use smtp::SmtpNotifier;
pub use templates::GROUP_ASSIGNED;

use async_trait::async_trait;
use futures::StreamExt;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::config::MailConfig;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Unknown email template: {0}")]
    UnknownTemplate(String),

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to send notification: {0}")]
    SendFailed(String),
}

/// Outbound message channel (email in production).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(
        &self,
        to: &str,
        template: &str,
        variables: &HashMap<String, String>,
    ) -> Result<(), NotificationError>;
}

/// One queued message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub to: String,
    pub template: String,
    pub variables: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub sent: usize,
    pub failed: usize,
}

/// Used when no SMTP relay is configured: messages are only logged.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(
        &self,
        to: &str,
        template: &str,
        variables: &HashMap<String, String>,
    ) -> Result<(), NotificationError> {
        let content = templates::render(template, variables)?;
        tracing::info!(to = %to, template = %template, subject = %content.subject, "Notification (mail disabled)");
        Ok(())
    }
}

/// Build the notifier the mail configuration asks for.
pub fn notifier_from_config(config: &MailConfig) -> Result<Arc<dyn Notifier>, NotificationError> {
    match &config.smtp {
        Some(smtp) => {
            tracing::info!("Notifications delivered via SMTP relay {}:{}", smtp.host, smtp.port);
            Ok(Arc::new(SmtpNotifier::new(smtp, &config.from_address, config.from_name.as_deref())?))
        }
        None => {
            tracing::info!("SMTP not configured; notifications will be logged only");
            Ok(Arc::new(LogNotifier))
        }
    }
}

/// Send `batch` on a background task with at most `concurrency` sends in flight.
///
/// Failures are logged per recipient and never retried.
pub fn dispatch_batch(
    notifier: Arc<dyn Notifier>,
    batch: Vec<Notification>,
    concurrency: usize,
) -> JoinHandle<DispatchReport> {
    tokio::spawn(async move {
        let sent = AtomicUsize::new(0);
        let failed = AtomicUsize::new(0);

        futures::stream::iter(batch)
            .for_each_concurrent(concurrency.max(1), |note| {
                let notifier = Arc::clone(&notifier);
                let (sent, failed) = (&sent, &failed);
                async move {
                    match notifier.send(&note.to, &note.template, &note.variables).await {
                        Ok(()) => {
                            sent.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => {
                            failed.fetch_add(1, Ordering::Relaxed);
                            tracing::warn!(
                                to = %note.to,
                                group = note.variables.get("group_name").map(String::as_str).unwrap_or_default(),
                                "Peer group notification failed: {}",
                                e
                            );
                        }
                    }
                }
            })
            .await;

        let report = DispatchReport {
            sent: sent.into_inner(),
            failed: failed.into_inner(),
        };
        tracing::debug!("Notification batch finished: {} sent, {} failed", report.sent, report.failed);
        report
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(to: &str) -> Notification {
        Notification {
            to: to.to_string(),
            template: GROUP_ASSIGNED.to_string(),
            variables: HashMap::from([("group_name".to_string(), "Smart-Hub".to_string())]),
        }
    }

    #[tokio::test]
    async fn batch_reports_sent_and_failed() {
        let (notifier, mut rx) = ChannelNotifier::new();
        let notifier = notifier.failing_for("bounce@example.com");

        let report = dispatch_batch(
            Arc::new(notifier),
            vec![note("a@example.com"), note("bounce@example.com"), note("b@example.com")],
            2,
        )
        .await
        .unwrap();

        assert_eq!(report, DispatchReport { sent: 2, failed: 1 });
        let mut delivered = vec![rx.recv().await.unwrap().to, rx.recv().await.unwrap().to];
        delivered.sort();
        assert_eq!(delivered, vec!["a@example.com", "b@example.com"]);
    }

    #[tokio::test]
    async fn log_notifier_rejects_unknown_templates() {
        let err = LogNotifier.send("a@example.com", "nope", &HashMap::new()).await.unwrap_err();
        assert!(matches!(err, NotificationError::UnknownTemplate(_)));
    }

    #[test]
    fn missing_smtp_config_falls_back_to_logging() {
        let config = MailConfig {
            smtp: None,
            from_address: "noreply@merilearn.test".to_string(),
            from_name: None,
            max_concurrent_sends: 4,
        };
        assert!(notifier_from_config(&config).is_ok());
    }
}
