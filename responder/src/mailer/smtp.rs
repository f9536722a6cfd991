//! SMTP delivery through lettre's async transport.

use std::time::Duration;

use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use tracing::{debug, info};

use super::{build_message, MailError, Mailer, OutgoingEmail};
use crate::config::{Config, SmtpTls};

const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Mailer backed by a real SMTP server.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    /// Build the transport described by the configuration.
    ///
    /// Nothing is contacted until the first send. Credentials are attached
    /// only when a password is configured; the username is the sender
    /// address.
    pub fn from_config(config: &Config) -> Result<Self, MailError> {
        let from = config
            .noreply_email
            .clone()
            .ok_or(MailError::MissingSender)?;
        let host = config.smtp_server.as_str();

        let builder = match config.smtp_tls {
            SmtpTls::StartTls => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
                .tls(Tls::Required(TlsParameters::new(host.to_string())?)),
            SmtpTls::Wrapper => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
                .tls(Tls::Wrapper(TlsParameters::new(host.to_string())?)),
            SmtpTls::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host),
        }
        .port(config.smtp_port)
        .timeout(Some(SMTP_TIMEOUT));

        let builder = match &config.email_password {
            Some(password) => builder.credentials(Credentials::new(from.clone(), password.clone())),
            None => builder,
        };

        info!(
            host = %host,
            port = config.smtp_port,
            tls = ?config.smtp_tls,
            authenticated = config.email_password.is_some(),
            "smtp_transport_configured"
        );

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
        let message = build_message(&self.from, &email)?;
        let response = self.transport.send(message).await?;

        debug!(
            to = %email.to,
            code = %response.code(),
            "smtp_response"
        );

        Ok(())
    }
}
