//! Outgoing mail.
//!
//! Replies go out one message per respondent. Delivery problems are logged
//! and counted; nothing is retried.

pub mod smtp;

use async_trait::async_trait;
use lettre::address::AddressError;
use lettre::message::{header::ContentType, Mailbox};
use lettre::Message;
use thiserror::Error;
use tracing::{error, info};

pub use smtp::SmtpMailer;

/// Body of an outgoing email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailContent {
    Plain(String),
    Html(String),
}

/// A single reply addressed to one respondent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub bcc: Vec<String>,
    pub subject: String,
    pub content: EmailContent,
}

/// Counts from sending a batch of replies.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    pub sent: usize,
    pub failed: usize,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("sender address is not configured")]
    MissingSender,

    #[error("invalid address {address}: {source}")]
    Address {
        address: String,
        #[source]
        source: AddressError,
    },

    #[error("failed to build message: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("SMTP delivery failed: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

/// Something that can deliver a reply.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError>;
}

fn parse_mailbox(address: &str) -> Result<Mailbox, MailError> {
    address.trim().parse().map_err(|source| MailError::Address {
        address: address.to_string(),
        source,
    })
}

/// Build the MIME message for one reply.
///
/// BCC recipients end up in the SMTP envelope only; lettre drops the header
/// when formatting the message.
pub fn build_message(from: &str, email: &OutgoingEmail) -> Result<Message, MailError> {
    let mut builder = Message::builder()
        .from(parse_mailbox(from)?)
        .to(parse_mailbox(&email.to)?)
        .subject(email.subject.as_str());

    for bcc in &email.bcc {
        builder = builder.bcc(parse_mailbox(bcc)?);
    }

    let message = match &email.content {
        EmailContent::Plain(text) => builder.header(ContentType::TEXT_PLAIN).body(text.clone())?,
        EmailContent::Html(html) => builder.header(ContentType::TEXT_HTML).body(html.clone())?,
    };

    Ok(message)
}

/// Send the same reply to every recipient, one message each.
///
/// A failure for one recipient does not stop the others.
pub async fn send_to_each(
    mailer: &dyn Mailer,
    recipients: &[String],
    bcc: &[String],
    subject: &str,
    content: &EmailContent,
) -> DeliveryReport {
    let mut report = DeliveryReport::default();

    for recipient in recipients {
        let email = OutgoingEmail {
            to: recipient.clone(),
            bcc: bcc.to_vec(),
            subject: subject.to_string(),
            content: content.clone(),
        };

        match mailer.send(email).await {
            Ok(()) => {
                report.sent += 1;
                info!(to = %recipient, bcc_count = bcc.len(), "email_sent");
            }
            Err(e) => {
                report.failed += 1;
                error!(to = %recipient, error = %e, "email_send_failed");
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FlakyMailer {
        reject: &'static str,
        delivered: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Mailer for FlakyMailer {
        async fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
            if email.to == self.reject {
                return Err(MailError::MissingSender);
            }
            self.delivered.lock().unwrap().push(email.to);
            Ok(())
        }
    }

    fn reply(content: EmailContent) -> OutgoingEmail {
        OutgoingEmail {
            to: "ada@example.com".to_string(),
            bcc: vec!["archive@example.com".to_string()],
            subject: "Thanks".to_string(),
            content,
        }
    }

    #[test]
    fn test_build_message_html() {
        let message =
            build_message("noreply@example.com", &reply(EmailContent::Html("<p>Hi</p>".into())))
                .unwrap();

        let formatted = String::from_utf8(message.formatted()).unwrap();
        assert!(formatted.contains("From: noreply@example.com"));
        assert!(formatted.contains("To: ada@example.com"));
        assert!(formatted.contains("Subject: Thanks"));
        assert!(formatted.contains("Content-Type: text/html; charset=utf-8"));
        assert!(!formatted.contains("Bcc:"));
    }

    #[test]
    fn test_build_message_envelope_includes_bcc() {
        let message =
            build_message("noreply@example.com", &reply(EmailContent::Plain("Hi".into())))
                .unwrap();

        let recipients: Vec<String> = message
            .envelope()
            .to()
            .iter()
            .map(|address| address.to_string())
            .collect();
        assert_eq!(recipients.len(), 2);
        assert!(recipients.contains(&"ada@example.com".to_string()));
        assert!(recipients.contains(&"archive@example.com".to_string()));
    }

    #[test]
    fn test_build_message_plain() {
        let message =
            build_message("noreply@example.com", &reply(EmailContent::Plain("Hi".into())))
                .unwrap();

        let formatted = String::from_utf8(message.formatted()).unwrap();
        assert!(formatted.contains("Content-Type: text/plain; charset=utf-8"));
    }

    #[test]
    fn test_build_message_invalid_recipient() {
        let mut email = reply(EmailContent::Plain("Hi".into()));
        email.to = "not an address".to_string();

        let err = build_message("noreply@example.com", &email).unwrap_err();

        assert!(matches!(err, MailError::Address { ref address, .. } if address == "not an address"));
    }

    #[tokio::test]
    async fn test_send_to_each_continues_after_failure() {
        let mailer = FlakyMailer {
            reject: "bad@example.com",
            delivered: Mutex::new(Vec::new()),
        };
        let recipients = vec![
            "one@example.com".to_string(),
            "bad@example.com".to_string(),
            "two@example.com".to_string(),
        ];

        let report = send_to_each(
            &mailer,
            &recipients,
            &[],
            "Subject",
            &EmailContent::Plain("Body".into()),
        )
        .await;

        assert_eq!(report, DeliveryReport { sent: 2, failed: 1 });
        assert_eq!(
            *mailer.delivered.lock().unwrap(),
            vec!["one@example.com", "two@example.com"]
        );
    }
}
