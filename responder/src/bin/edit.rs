//! Responder Edit - push a reply template to a running responder.
//!
//! The body is typed as plain text; URLs and line breaks are converted to
//! HTML the same way the web editor does before the update is sent.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use url::Url;

use responder::web::convert_to_html;

#[derive(Parser, Debug)]
#[command(name = "responder-edit", about = "Update the reply template for a Typeform form")]
struct Args {
    /// Typeform form ID the template belongs to
    #[arg(long)]
    form_id: String,

    /// Subject line of the reply
    #[arg(long)]
    subject: String,

    /// Body text; use {first_name} for the respondent's first name
    #[arg(long, conflicts_with = "body_file", required_unless_present = "body_file")]
    body: Option<String>,

    /// Read the body text from a file instead
    #[arg(long)]
    body_file: Option<PathBuf>,

    /// Base URL of the responder web server
    #[arg(long, env = "BACKEND_URL", default_value = "http://localhost:5000")]
    backend_url: Url,
}

#[derive(Serialize)]
struct UpdatePayload<'a> {
    form_id: &'a str,
    subject: &'a str,
    body: &'a str,
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();

    let args = Args::parse();

    match run(args).await {
        Ok(()) => {
            println!("Email content updated successfully. Text converted to HTML format.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "update_failed");
            eprintln!("Failed to update email content: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let body = match (&args.body, &args.body_file) {
        (Some(body), _) => body.clone(),
        (None, Some(path)) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?,
        (None, None) => bail!("Either --body or --body-file is required"),
    };

    let form_id = args.form_id.trim();
    if form_id.is_empty() || args.subject.trim().is_empty() || body.trim().is_empty() {
        bail!("Please fill in the form ID, subject line and body text.");
    }

    let html_body = convert_to_html(&body);
    let endpoint = args
        .backend_url
        .join("/api/update_email")
        .context("Invalid backend URL")?;

    info!(endpoint = %endpoint, form_id = %form_id, "update_sending");

    let response = reqwest::Client::new()
        .post(endpoint)
        .json(&UpdatePayload {
            form_id,
            subject: args.subject.trim(),
            body: &html_body,
        })
        .send()
        .await
        .context("Failed to connect to the backend server. Please make sure it's running.")?;

    let status = response.status();
    if !status.is_success() {
        let detail = response.text().await.unwrap_or_default();
        bail!("Backend responded with {status}: {detail}");
    }

    Ok(())
}
