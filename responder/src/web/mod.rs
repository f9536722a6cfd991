//! Web server module.
//!
//! This module provides the HTTP surface of the responder:
//! - Receives signed Typeform webhooks and sends the replies
//! - Accepts template updates as JSON
//! - Serves the operator editor page

pub mod editor;
pub mod handlers;
pub mod signature;
pub mod typeform;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use editor::{convert_to_html, editor_page, editor_submit, EditorForm};
pub use handlers::{
    health, save_template, typeform_webhook, update_email, AppState, HealthResponse, SaveError,
    UpdateEmailRequest, WebhookResponse,
};
pub use signature::{
    compute_signature, is_signature_verification_enabled, verify_typeform_signature,
};
pub use typeform::TypeformWebhook;

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    let max_body_bytes = state.config.max_body_bytes;

    Router::new()
        .route("/health", get(health))
        .route("/api/webhook", post(typeform_webhook))
        .route("/api/update_email", post(update_email))
        .route("/editor", get(editor_page).post(editor_submit))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
