//! Typeform webhook payload.
//!
//! Only the parts of the payload the responder reads are modelled; every
//! other field is ignored.
//! Reference: https://www.typeform.com/developers/webhooks/example-payload/

use serde::Deserialize;

/// Top-level webhook body.
#[derive(Debug, Deserialize)]
pub struct TypeformWebhook {
    #[serde(default)]
    pub event_id: Option<String>,
    pub form_response: FormResponse,
}

/// One submitted response.
#[derive(Debug, Deserialize)]
pub struct FormResponse {
    #[serde(default)]
    pub form_id: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub answers: Vec<Answer>,
}

/// A single answer. Which value field is present depends on the field type.
#[derive(Debug, Deserialize)]
pub struct Answer {
    pub field: AnswerField,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnswerField {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub field_type: String,
}

impl FormResponse {
    /// The form id, if present and not blank.
    pub fn form_id(&self) -> Option<&str> {
        self.form_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    /// Addresses from every `email` question, in answer order.
    pub fn recipient_emails(&self) -> Vec<String> {
        self.answers
            .iter()
            .filter(|answer| answer.field.field_type == "email")
            .filter_map(|answer| answer.email.as_deref())
            .map(str::trim)
            .filter(|email| !email.is_empty())
            .map(String::from)
            .collect()
    }

    /// Text of the first `short_text` question, taken as the first name.
    pub fn first_name(&self) -> Option<&str> {
        self.answers
            .iter()
            .find(|answer| answer.field.field_type == "short_text")
            .and_then(|answer| answer.text.as_deref())
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}
