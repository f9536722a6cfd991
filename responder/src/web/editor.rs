//! Operator UI for editing the per-form reply template.
//!
//! A single HTML form posts back to itself. The plain-text body typed by the
//! operator is converted to HTML before it is stored.

use std::borrow::Cow;

use axum::{
    extract::{Form, State},
    http::StatusCode,
    response::{Html as HtmlResponse, IntoResponse, Response},
};
use scraper::{ElementRef, Html, Node};
use serde::{Deserialize, Serialize};
use tinytemplate::TinyTemplate;
use tracing::{error, info, warn};
use url::Url;

use super::handlers::{save_template, AppState, SaveError};
use crate::store::TemplateRecord;
use crate::template::TemplateError;

const EDITOR_TEMPLATE_NAME: &str = "editor";
const EDITOR_TEMPLATE: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/assets/editor.html"));

const LINK_TEXT: &str = "Click here";

/// Convert operator-typed text into the HTML body stored in the template.
///
/// URLs become "Click here" links and line breaks become `<br>`. The result
/// is normalized through an HTML parser, top-level nodes are joined with a
/// space and a trailing `<br>` is added.
pub fn convert_to_html(text: &str) -> String {
    let linked = link_urls(text);
    let with_breaks = linked.replace("\r\n", "\n").replace('\n', "<br>");

    let fragment = Html::parse_fragment(&with_breaks);
    let parts: Vec<String> = fragment
        .root_element()
        .children()
        .filter_map(|node| match node.value() {
            Node::Text(text) => Some(escaped(text)),
            Node::Element(_) => ElementRef::wrap(node).map(|element| element.html()),
            _ => None,
        })
        .collect();

    let mut html = parts.join(" ");
    html.push_str("<br>");
    html
}

fn link_urls(text: &str) -> String {
    let mut linked = String::with_capacity(text.len());
    for piece in text.split_inclusive(char::is_whitespace) {
        let word_len = piece.trim_end_matches(char::is_whitespace).len();
        let (word, space) = piece.split_at(word_len);
        linked.push_str(&link_word(word));
        linked.push_str(space);
    }
    linked
}

fn link_word(word: &str) -> Cow<'_, str> {
    let Some(start) = ["http://", "https://"]
        .iter()
        .filter_map(|scheme| word.find(scheme))
        .min()
    else {
        return Cow::Borrowed(word);
    };

    let (prefix, candidate) = word.split_at(start);
    // The href keeps the text as typed; parsing only decides whether it is a link.
    match Url::parse(candidate) {
        Ok(url) if url.host_str().is_some() => Cow::Owned(format!(
            "{prefix}<a href=\"{}\">{LINK_TEXT}</a>",
            escaped(candidate)
        )),
        _ => Cow::Borrowed(word),
    }
}

fn escaped(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    tinytemplate::escape(text, &mut out);
    out
}

// =============================================================================
// Page rendering
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct EditorForm {
    #[serde(default)]
    pub form_id: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
}

#[derive(Serialize)]
struct Flash {
    kind: &'static str,
    text: String,
}

#[derive(Serialize)]
struct EditorContext<'a> {
    flash: Option<Flash>,
    form_id: &'a str,
    subject: &'a str,
    body: &'a str,
    templates: Vec<TemplateRecord>,
}

fn render_editor(context: &EditorContext) -> Result<String, TemplateError> {
    let mut tt = TinyTemplate::new();
    tt.add_template(EDITOR_TEMPLATE_NAME, EDITOR_TEMPLATE)?;
    Ok(tt.render(EDITOR_TEMPLATE_NAME, context)?)
}

async fn editor_response(
    state: &AppState,
    status: StatusCode,
    flash: Option<Flash>,
    form: &EditorForm,
) -> Response {
    let templates = match state.store.records().await {
        Ok(records) => records,
        Err(e) => {
            warn!(error = %e, "editor_template_list_failed");
            Vec::new()
        }
    };

    let context = EditorContext {
        flash,
        form_id: &form.form_id,
        subject: &form.subject,
        body: &form.body,
        templates,
    };

    match render_editor(&context) {
        Ok(page) => (status, HtmlResponse(page)).into_response(),
        Err(e) => {
            error!(error = %e, "editor_render_failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to render editor").into_response()
        }
    }
}

/// Show the empty editor form.
pub async fn editor_page(State(state): State<AppState>) -> Response {
    editor_response(&state, StatusCode::OK, None, &EditorForm::default()).await
}

/// Store the submitted template and show the outcome.
pub async fn editor_submit(
    State(state): State<AppState>,
    Form(form): Form<EditorForm>,
) -> Response {
    info!(form_id = %form.form_id.trim(), "editor_submit_received");

    let warning = |text: &str| Flash {
        kind: "warning",
        text: text.to_string(),
    };

    if form.subject.trim().is_empty() || form.body.trim().is_empty() {
        let flash = warning("Please fill in both subject line and body text.");
        return editor_response(&state, StatusCode::BAD_REQUEST, Some(flash), &form).await;
    }
    if form.form_id.trim().is_empty() {
        let flash = warning("Please enter a Form ID.");
        return editor_response(&state, StatusCode::BAD_REQUEST, Some(flash), &form).await;
    }

    let html_body = convert_to_html(&form.body);

    let saved = save_template(&state, &form.form_id, &form.subject, &html_body).await;

    let (status, flash) = match saved {
        Ok(_) => (
            StatusCode::OK,
            Flash {
                kind: "success",
                text: "Email content updated successfully. Text converted to HTML format."
                    .to_string(),
            },
        ),
        Err(SaveError::Incomplete) => (
            StatusCode::BAD_REQUEST,
            warning("Please fill in both subject line and body text."),
        ),
        Err(SaveError::Invalid(message)) => (StatusCode::BAD_REQUEST, warning(&message)),
        Err(SaveError::Storage(_)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Flash {
                kind: "error",
                text: "Failed to update email content.".to_string(),
            },
        ),
    };

    editor_response(&state, status, Some(flash), &form).await
}
