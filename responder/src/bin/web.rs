//! Responder Web Server - Typeform webhook receiver.
//!
//! This binary:
//! - Receives Typeform webhooks and verifies their signature
//! - Replies to each respondent by email using the form's stored template
//! - Serves the template editor and update API
//!
//! Replies are sent inline; there is no queue and no retry.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use responder::web::is_signature_verification_enabled;
use responder::{build_router, AppState, Config, SmtpMailer};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("web_server_starting");

    // Load configuration
    let config = Config::from_env();
    info!(
        port = config.port,
        templates_path = %config.templates_path.display(),
        smtp_server = %config.smtp_server,
        smtp_port = config.smtp_port,
        smtp_tls = ?config.smtp_tls,
        bcc_count = config.bcc_emails.len(),
        send_html = config.send_html,
        signature_configured = config.signature.is_some(),
        "config_loaded"
    );

    if !is_signature_verification_enabled(&config.typeform_secret) {
        warn!("TYPEFORM_SECRET is not set; every webhook will be rejected");
    }

    let mailer = SmtpMailer::from_config(&config).context("Failed to configure SMTP transport")?;

    let port = config.port;
    let state = AppState::new(config, Arc::new(mailer));
    let app = build_router(state);

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "web_server_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("web_server_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("web_server_shutting_down");
}
