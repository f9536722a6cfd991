//! Reply composition: first-name substitution and the HTML layout.

use serde::Serialize;
use thiserror::Error;
use tinytemplate::TinyTemplate;

/// Placeholder replaced with the respondent's first name.
pub const FIRST_NAME_PLACEHOLDER: &str = "{first_name}";

const REPLY_TEMPLATE_NAME: &str = "reply";
const REPLY_TEMPLATE: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/assets/reply.html"));

/// Sender signature shown under HTML replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Signature {
    pub name: String,
    pub title: Option<String>,
    pub email: Option<String>,
    pub linkedin_url: Option<String>,
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to render template: {0}")]
    Render(#[from] tinytemplate::error::Error),
}

#[derive(Serialize)]
struct ReplyContext<'a> {
    body: &'a str,
    signature: Option<&'a Signature>,
}

/// Substitute the first name into a template body.
///
/// An unknown name leaves nothing behind, so "Hi {first_name}," becomes
/// "Hi ,".
pub fn personalize(body: &str, first_name: Option<&str>) -> String {
    body.replace(FIRST_NAME_PLACEHOLDER, first_name.unwrap_or(""))
}

/// Wrap an HTML body in the reply layout.
///
/// The body is operator-authored HTML and is inserted as is. Signature
/// fields are escaped.
pub fn render_html_email(
    body: &str,
    signature: Option<&Signature>,
) -> Result<String, TemplateError> {
    let mut tt = TinyTemplate::new();
    tt.add_template(REPLY_TEMPLATE_NAME, REPLY_TEMPLATE)?;

    let context = ReplyContext { body, signature };
    Ok(tt.render(REPLY_TEMPLATE_NAME, &context)?)
}
