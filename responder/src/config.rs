//! Configuration module for environment variable parsing.
//!
//! Every setting comes from the process environment; unset or malformed
//! values fall back to defaults.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::warn;

use crate::template::Signature;

/// Default location of the flat template file.
pub const DEFAULT_TEMPLATES_PATH: &str = "data.txt";

/// How the SMTP connection is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpTls {
    /// Plaintext connect, then STARTTLS is required before authenticating
    StartTls,
    /// TLS from the first byte (SMTPS)
    Wrapper,
    /// No encryption at all; only for local relays
    None,
}

impl FromStr for SmtpTls {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "starttls" => Ok(SmtpTls::StartTls),
            "tls" | "smtps" => Ok(SmtpTls::Wrapper),
            "none" | "plain" => Ok(SmtpTls::None),
            other => Err(format!("unknown SMTP TLS mode: {other}")),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// Shared secret Typeform signs webhook payloads with
    pub typeform_secret: Option<String>,

    /// Path of the flat file holding per-form templates
    pub templates_path: PathBuf,

    /// Maximum accepted request body size in bytes
    pub max_body_bytes: usize,

    // =========================================================================
    // Outgoing Mail
    // =========================================================================

    /// SMTP server host
    pub smtp_server: String,

    /// SMTP server port
    pub smtp_port: u16,

    /// SMTP transport security
    pub smtp_tls: SmtpTls,

    /// Sender address, also used as the SMTP username
    pub noreply_email: Option<String>,

    /// SMTP password
    pub email_password: Option<String>,

    /// Addresses blind-copied on every reply
    pub bcc_emails: Vec<String>,

    /// Wrap replies in the HTML layout instead of sending plain text
    pub send_html: bool,

    /// Signature block appended to HTML replies
    pub signature: Option<Signature>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Config {
            port: parse_or("PORT", 5000),

            typeform_secret: non_blank("TYPEFORM_SECRET"),

            templates_path: env::var("TEMPLATES_PATH")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TEMPLATES_PATH)),

            max_body_bytes: parse_or("MAX_BODY_BYTES", 1024 * 1024),

            smtp_server: non_blank("SMTP_SERVER").unwrap_or_else(|| "localhost".to_string()),

            smtp_port: parse_or("SMTP_PORT", 587),

            smtp_tls: parse_or("SMTP_TLS", SmtpTls::StartTls),

            noreply_email: non_blank("NOREPLY_EMAIL"),

            email_password: non_blank("EMAIL_PASSWORD"),

            bcc_emails: parse_csv("BCC_EMAILS").unwrap_or_default(),

            send_html: parse_bool("SEND_HTML", true),

            signature: non_blank("SIGNATURE_NAME").map(|name| Signature {
                name,
                title: non_blank("SIGNATURE_TITLE"),
                email: non_blank("SIGNATURE_EMAIL"),
                linkedin_url: non_blank("SIGNATURE_LINKEDIN"),
            }),
        }
    }
}

/// Read a variable, treating blank values as unset.
fn non_blank(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a variable with `FromStr`, warning and falling back on bad input.
fn parse_or<T: FromStr>(name: &str, default: T) -> T {
    let Some(raw) = non_blank(name) else {
        return default;
    };

    match raw.parse() {
        Ok(value) => value,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid value, using default");
            default
        }
    }
}

/// Parse a boolean flag such as "true", "0" or "no".
fn parse_bool(name: &str, default: bool) -> bool {
    let Some(raw) = non_blank(name) else {
        return default;
    };

    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => {
            warn!(env_var = name, value = %raw, "Invalid boolean, using default");
            default
        }
    }
}

/// Parse a comma-separated list of strings.
fn parse_csv(name: &str) -> Option<Vec<String>> {
    env::var(name).ok().map(|raw| {
        raw.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}
