//! Typeform Responder - webhook-driven auto-reply service.
//!
//! This library provides the modules shared by the two binaries:
//! - `responder-web`: Web server receiving Typeform webhooks and serving the editor
//! - `responder-edit`: Command-line client for updating a form's reply template
//!
//! ## Flow
//!
//! ```text
//! Typeform → /api/webhook → signature check → template lookup → SMTP reply
//! Operator → /editor or responder-edit → /api/update_email → template file
//! ```

pub mod config;
pub mod mailer;
pub mod store;
pub mod template;
pub mod web;

// Re-export commonly used types
pub use config::{Config, SmtpTls};
pub use mailer::{EmailContent, MailError, Mailer, OutgoingEmail, SmtpMailer};
pub use store::{StoreError, TemplateRecord, TemplateStore, UpsertOutcome};
pub use template::Signature;
pub use web::{build_router, AppState};
