//! SMTP delivery through lettre.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, MultiPart, SinglePart},
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::collections::HashMap;
use std::time::Duration;

use crate::config::SmtpConfig;

use super::templates::render;
use super::{NotificationError, Notifier};

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpNotifier {
    /// Port 465 uses implicit TLS, `use_tls` on other ports uses STARTTLS,
    /// otherwise the relay is spoken to in plaintext (local development relays).
    pub fn new(config: &SmtpConfig, from_address: &str, from_name: Option<&str>) -> Result<Self, NotificationError> {
        let host = config.host.as_str();
        let mut builder = if config.use_tls {
            let tls_params = TlsParameters::new(host.to_string()).map_err(|e| {
                NotificationError::InvalidConfig(format!("TLS configuration error: {}", e))
            })?;

            if config.port == 465 {
                AsyncSmtpTransport::<Tokio1Executor>::relay(host)
                    .map_err(|e| NotificationError::InvalidConfig(format!("SMTP relay error: {}", e)))?
                    .port(config.port)
                    .tls(Tls::Wrapper(tls_params))
            } else {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                    .map_err(|e| NotificationError::InvalidConfig(format!("SMTP relay error: {}", e)))?
                    .port(config.port)
                    .tls(Tls::Required(tls_params))
            }
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host).port(config.port)
        };

        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        let from = match from_name {
            Some(name) => format!("{} <{}>", name, from_address),
            None => from_address.to_string(),
        };

        Ok(Self {
            transport: builder.timeout(Some(Duration::from_secs(config.timeout_secs))).build(),
            from,
        })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(
        &self,
        to: &str,
        template: &str,
        variables: &HashMap<String, String>,
    ) -> Result<(), NotificationError> {
        let content = render(template, variables)?;

        let message = Message::builder()
            .from(self.from.parse().map_err(|e| {
                NotificationError::InvalidConfig(format!("Invalid from address: {}", e))
            })?)
            .to(to
                .parse()
                .map_err(|e| NotificationError::InvalidRecipient(format!("{}: {}", to, e)))?)
            .subject(content.subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(content.text),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(content.html),
                    ),
            )
            .map_err(|e| NotificationError::SendFailed(format!("Failed to build email: {}", e)))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| NotificationError::SendFailed(e.to_string()))?;

        Ok(())
    }
}
