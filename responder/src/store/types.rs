//! Record and error types for the template store.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A stored reply template for one form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRecord {
    /// Typeform form identifier
    pub form_id: String,
    /// Reply subject line
    pub subject: String,
    /// Reply body; may contain HTML and the `{first_name}` placeholder
    pub body: String,
}

impl TemplateRecord {
    /// Build a record that can be written to the flat file.
    ///
    /// All three values are trimmed. They must be non-empty and must not
    /// contain line breaks, since each value occupies exactly one line.
    pub fn new(
        form_id: impl AsRef<str>,
        subject: impl AsRef<str>,
        body: impl AsRef<str>,
    ) -> Result<Self, StoreError> {
        let form_id = form_id.as_ref().trim();
        let subject = subject.as_ref().trim();
        let body = body.as_ref().trim();

        for (name, value) in [("form_id", form_id), ("subject", subject), ("body", body)] {
            if value.is_empty() {
                return Err(StoreError::InvalidRecord(format!("{name} is empty")));
            }
            if value.contains(['\n', '\r']) {
                return Err(StoreError::InvalidRecord(format!(
                    "{name} must fit on a single line"
                )));
            }
        }

        Ok(Self {
            form_id: form_id.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        })
    }
}

/// What an upsert did to the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// An existing record for the form was rewritten in place
    Updated,
    /// A new record was appended
    Created,
}

/// Template store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("template file I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid template record: {0}")]
    InvalidRecord(String),
}
