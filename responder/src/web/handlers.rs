//! Webhook and template API handlers.
//!
//! The webhook handler does the whole job inline:
//! 1. Verify the Typeform signature over the raw body
//! 2. Look up the reply template for the form
//! 3. Personalize and send one reply per respondent address
//!
//! Delivery failures are logged and reported in the response counts.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::mailer::{send_to_each, EmailContent, Mailer};
use crate::store::{StoreError, TemplateRecord, TemplateStore, UpsertOutcome};
use crate::template::{personalize, render_html_email};
use crate::web::signature::{
    is_signature_verification_enabled, verify_typeform_signature, SIGNATURE_HEADER,
};
use crate::web::typeform::TypeformWebhook;
use crate::Config;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: TemplateStore,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub fn new(config: Config, mailer: Arc<dyn Mailer>) -> Self {
        let store = TemplateStore::new(config.templates_path.clone());
        Self {
            config: Arc::new(config),
            store,
            mailer,
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Typeform Webhook
// =============================================================================

/// Webhook response.
#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed: Option<usize>,
}

impl WebhookResponse {
    fn message(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<Self>) {
        (
            status,
            Json(Self {
                message: message.into(),
                sent: None,
                failed: None,
            }),
        )
    }
}

/// Typeform webhook endpoint.
///
/// The body is taken as raw bytes because the signature covers the exact
/// bytes Typeform sent.
pub async fn typeform_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    info!(
        body_length = body.len(),
        has_signature = signature.is_some(),
        "typeform_webhook_received"
    );
    debug!(payload = %String::from_utf8_lossy(&body), "typeform_webhook_payload");

    let verified = match &state.config.typeform_secret {
        Some(secret) if is_signature_verification_enabled(&state.config.typeform_secret) => {
            verify_typeform_signature(secret, &body, signature)
        }
        _ => {
            warn!("typeform_secret_not_configured");
            false
        }
    };
    if !verified {
        warn!("typeform_signature_invalid");
        return WebhookResponse::message(
            StatusCode::FORBIDDEN,
            "Invalid signature. Permission denied.",
        );
    }

    let webhook: TypeformWebhook = match serde_json::from_slice(&body) {
        Ok(webhook) => webhook,
        Err(e) => {
            warn!(error = %e, "typeform_payload_invalid");
            return WebhookResponse::message(StatusCode::BAD_REQUEST, "Invalid webhook payload.");
        }
    };
    let response = webhook.form_response;

    let Some(form_id) = response.form_id() else {
        warn!(event_id = ?webhook.event_id, "typeform_form_id_missing");
        return WebhookResponse::message(
            StatusCode::BAD_REQUEST,
            "No form_id found in the payload.",
        );
    };

    let record = match state.store.find(form_id).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            warn!(form_id = %form_id, "template_not_found");
            return WebhookResponse::message(
                StatusCode::NOT_FOUND,
                format!("No content found for form_id: {form_id}"),
            );
        }
        Err(e) => {
            error!(form_id = %form_id, error = %e, "template_lookup_failed");
            return WebhookResponse::message(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load email content.",
            );
        }
    };

    let recipients = response.recipient_emails();
    if recipients.is_empty() {
        warn!(form_id = %form_id, "typeform_no_recipient");
        return WebhookResponse::message(
            StatusCode::BAD_REQUEST,
            "No email address found in the payload.",
        );
    }

    let first_name = response.first_name();
    let content = if state.config.send_html {
        let escaped_name = first_name.map(|name| {
            let mut escaped = String::with_capacity(name.len());
            tinytemplate::escape(name, &mut escaped);
            escaped
        });
        let body = personalize(&record.body, escaped_name.as_deref());
        match render_html_email(&body, state.config.signature.as_ref()) {
            Ok(html) => EmailContent::Html(html),
            Err(e) => {
                error!(form_id = %form_id, error = %e, "reply_render_failed");
                return WebhookResponse::message(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to compose email.",
                );
            }
        }
    } else {
        EmailContent::Plain(personalize(&record.body, first_name))
    };

    let report = send_to_each(
        state.mailer.as_ref(),
        &recipients,
        &state.config.bcc_emails,
        &record.subject,
        &content,
    )
    .await;

    info!(
        form_id = %form_id,
        response_token = ?response.token,
        has_first_name = first_name.is_some(),
        sent = report.sent,
        failed = report.failed,
        "typeform_webhook_processed"
    );

    (
        StatusCode::OK,
        Json(WebhookResponse {
            message: "Emails sent successfully".to_string(),
            sent: Some(report.sent),
            failed: Some(report.failed),
        }),
    )
}

// =============================================================================
// Template Update API
// =============================================================================

/// JSON body of the template update endpoint.
#[derive(Debug, Deserialize)]
pub struct UpdateEmailRequest {
    #[serde(default)]
    pub form_id: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Serialize)]
struct UpdateSuccess {
    message: &'static str,
}

#[derive(Serialize)]
struct UpdateFailure {
    error: String,
}

/// Why a template could not be saved.
#[derive(Debug)]
pub enum SaveError {
    /// A required value was missing or blank
    Incomplete,
    /// A value cannot be represented in the template file
    Invalid(String),
    /// The template file could not be read or written
    Storage(StoreError),
}

/// Validate and store a template; shared by the API and the editor page.
pub async fn save_template(
    state: &AppState,
    form_id: &str,
    subject: &str,
    body: &str,
) -> Result<UpsertOutcome, SaveError> {
    if form_id.trim().is_empty() || subject.trim().is_empty() || body.trim().is_empty() {
        return Err(SaveError::Incomplete);
    }

    let record = TemplateRecord::new(form_id, subject, body).map_err(|e| match e {
        StoreError::InvalidRecord(message) => SaveError::Invalid(message),
        other => SaveError::Storage(other),
    })?;

    state.store.upsert(&record).await.map_err(SaveError::Storage)
}

/// Template update endpoint.
///
/// Malformed JSON gets the same `{"error": ...}` response as missing fields.
pub async fn update_email(State(state): State<AppState>, body: Bytes) -> Response {
    let failure = |status: StatusCode, error: String| {
        (status, Json(UpdateFailure { error })).into_response()
    };

    let request: UpdateEmailRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "update_email_payload_invalid");
            return failure(StatusCode::BAD_REQUEST, "Incomplete data provided".to_string());
        }
    };

    let form_id = request.form_id.as_deref().unwrap_or("").trim();
    debug!(form_id = %form_id, "update_email_received");

    let saved = save_template(
        &state,
        form_id,
        request.subject.as_deref().unwrap_or(""),
        request.body.as_deref().unwrap_or(""),
    )
    .await;

    match saved {
        Ok(outcome) => {
            info!(form_id = %form_id, outcome = ?outcome, "update_email_stored");
            (
                StatusCode::OK,
                Json(UpdateSuccess {
                    message: "Email content updated successfully",
                }),
            )
                .into_response()
        }
        Err(SaveError::Incomplete) => {
            warn!(form_id = %form_id, "update_email_incomplete");
            failure(StatusCode::BAD_REQUEST, "Incomplete data provided".to_string())
        }
        Err(SaveError::Invalid(message)) => {
            warn!(form_id = %form_id, reason = %message, "update_email_invalid");
            failure(StatusCode::BAD_REQUEST, message)
        }
        Err(SaveError::Storage(e)) => {
            error!(form_id = %form_id, error = %e, "update_email_store_failed");
            failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to update email content".to_string(),
            )
        }
    }
}
