//! End-to-end delivery through a local fake SMTP server.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use mailin_embedded::{Handler, Server, SslConfig};
use mailparse::{parse_mail, MailHeaderMap};
use tempfile::TempDir;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::timeout;
use tower::ServiceExt;

use responder::web::compute_signature;
use responder::{
    build_router, AppState, Config, EmailContent, Mailer, OutgoingEmail, Signature, SmtpMailer,
    SmtpTls,
};

const SECRET: &str = "integration-secret";

#[derive(Clone)]
struct CapturingHandler {
    buffer: Vec<u8>,
    delivered: Arc<Mutex<UnboundedSender<String>>>,
}

impl Handler for CapturingHandler {
    fn data(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.buffer.extend(buf);
        Ok(())
    }

    fn data_end(&mut self) -> mailin_embedded::Response {
        let message = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();
        let _ = self.delivered.lock().unwrap().send(message);
        mailin_embedded::response::OK
    }
}

fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

async fn wait_until_listening(port: u16) {
    timeout(Duration::from_secs(10), async {
        while tokio::net::TcpStream::connect(("127.0.0.1", port)).await.is_err() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("fake SMTP server did not start listening");
}

async fn start_fake_smtp() -> (u16, UnboundedReceiver<String>) {
    let port = free_port();
    let (sender, receiver) = mpsc::unbounded_channel();
    let handler = CapturingHandler {
        buffer: Vec::new(),
        delivered: Arc::new(Mutex::new(sender)),
    };

    let mut server = Server::new(handler);
    server
        .with_name("responder.test")
        .with_ssl(SslConfig::None)
        .unwrap()
        .with_addr(format!("127.0.0.1:{port}"))
        .unwrap();
    std::thread::spawn(move || {
        let _ = server.serve();
    });
    wait_until_listening(port).await;

    (port, receiver)
}

fn smtp_config(port: u16, templates_path: PathBuf) -> Config {
    Config {
        port: 0,
        typeform_secret: Some(SECRET.to_string()),
        templates_path,
        max_body_bytes: 64 * 1024,
        smtp_server: "127.0.0.1".to_string(),
        smtp_port: port,
        smtp_tls: SmtpTls::None,
        noreply_email: Some("noreply@example.com".to_string()),
        email_password: None,
        bcc_emails: Vec::new(),
        send_html: true,
        signature: Some(Signature {
            name: "Admissions Office".to_string(),
            title: Some("Team Lead".to_string()),
            email: None,
            linkedin_url: None,
        }),
    }
}

async fn next_message(receiver: &mut UnboundedReceiver<String>) -> String {
    timeout(Duration::from_secs(10), receiver.recv())
        .await
        .expect("no message reached the fake SMTP server")
        .expect("fake SMTP server stopped")
}

#[tokio::test]
async fn test_smtp_mailer_delivers_html_reply() {
    let (port, mut received) = start_fake_smtp().await;

    let dir = TempDir::new().unwrap();
    let mailer = SmtpMailer::from_config(&smtp_config(port, dir.path().join("data.txt"))).unwrap();

    mailer
        .send(OutgoingEmail {
            to: "ada@example.com".to_string(),
            bcc: vec!["archive@example.com".to_string()],
            subject: "Thanks for applying".to_string(),
            content: EmailContent::Html("<p>Hi Ada</p>".to_string()),
        })
        .await
        .unwrap();

    let raw = next_message(&mut received).await;
    let parsed = parse_mail(raw.as_bytes()).unwrap();

    assert_eq!(
        parsed.headers.get_first_value("Subject").as_deref(),
        Some("Thanks for applying")
    );
    assert!(parsed
        .headers
        .get_first_value("To")
        .unwrap()
        .contains("ada@example.com"));
    assert!(parsed.headers.get_first_value("Bcc").is_none());
    assert_eq!(parsed.ctype.mimetype, "text/html");
    assert!(parsed.get_body().unwrap().contains("<p>Hi Ada</p>"));
}

#[tokio::test]
async fn test_signed_webhook_delivers_personalized_reply() {
    let (port, mut received) = start_fake_smtp().await;

    let dir = TempDir::new().unwrap();
    let templates = dir.path().join("data.txt");
    std::fs::write(
        &templates,
        "form_id: abc123\nSubject: Welcome aboard\nBody: Hello {first_name}, see you soon.<br>\n",
    )
    .unwrap();

    let config = smtp_config(port, templates);
    let mailer = SmtpMailer::from_config(&config).unwrap();
    let router = build_router(AppState::new(config, Arc::new(mailer)));

    let payload = serde_json::json!({
        "event_id": "01INTEGRATION",
        "event_type": "form_response",
        "form_response": {
            "form_id": "abc123",
            "token": "tok",
            "answers": [
                {"type": "text", "text": "Grace", "field": {"id": "f1", "type": "short_text"}},
                {"type": "email", "email": "grace@example.com", "field": {"id": "f2", "type": "email"}}
            ]
        }
    })
    .to_string();
    let signature = compute_signature(SECRET, payload.as_bytes()).unwrap();

    let response = router
        .oneshot(
            Request::post("/api/webhook")
                .header("Typeform-Signature", signature)
                .header("Content-Type", "application/json")
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["sent"], 1);
    assert_eq!(body["failed"], 0);

    let raw = next_message(&mut received).await;
    let parsed = parse_mail(raw.as_bytes()).unwrap();
    let html = parsed.get_body().unwrap();

    assert_eq!(
        parsed.headers.get_first_value("Subject").as_deref(),
        Some("Welcome aboard")
    );
    assert!(html.contains("Hello Grace, see you soon."));
    assert!(html.contains("Admissions Office"));
    assert!(html.contains("Team Lead"));
}
