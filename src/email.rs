//! Outgoing mail.
//!
//! Certificates go out through a Mailgun-compatible HTTP API. The
//! [`EmailClient`] trait is the seam the orchestrator talks to, so tests
//! and dry runs can swap the transport without touching the send loop.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, Secret};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// One mail ready for dispatch.
#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub to: String,
    pub bcc: Vec<String>,
    pub subject: String,
    pub text: String,
    pub attachments: Vec<Attachment>,
}

/// File attached to an outgoing mail.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait EmailClient: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<()>;
}

/// Mailgun HTTP transport.
pub struct MailgunClient {
    http: reqwest::Client,
    base_url: String,
    domain: String,
    api_key: Secret<String>,
    sender: String,
}

impl MailgunClient {
    pub fn new(
        base_url: String,
        domain: String,
        api_key: Secret<String>,
        sender: String,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base_url, domain, api_key, sender })
    }

    fn messages_url(&self) -> String {
        format!("{}/v3/{}/messages", self.base_url.trim_end_matches('/'), self.domain)
    }
}

#[async_trait]
impl EmailClient for MailgunClient {
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        let mut form = Form::new()
            .text("from", self.sender.clone())
            .text("to", email.to.clone())
            .text("subject", email.subject.clone())
            .text("text", email.text.clone());
        if !email.bcc.is_empty() {
            form = form.text("bcc", email.bcc.join(", "));
        }
        for attachment in &email.attachments {
            let part = Part::bytes(attachment.bytes.clone())
                .file_name(attachment.file_name.clone())
                .mime_str(&attachment.content_type)
                .map_err(|err| Error::Email(err.to_string()))?;
            form = form.part("attachment", part);
        }

        let response = self
            .http
            .post(self.messages_url())
            .basic_auth("api", Some(self.api_key.expose_secret()))
            .multipart(form)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Email(format!("mail API returned {status}: {body}")));
        }
        info!(to = %email.to, subject = %email.subject, "sent certificate email");
        Ok(())
    }
}

/// Transport that only logs, used by `send --dry-run`.
pub struct DryRunMailer;

#[async_trait]
impl EmailClient for DryRunMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        let attachment_bytes: usize = email.attachments.iter().map(|a| a.bytes.len()).sum();
        info!(
            to = %email.to,
            subject = %email.subject,
            attachment_bytes,
            "dry run, not sending"
        );
        Ok(())
    }
}

/// Recording double for tests: keeps every mail and can be told to fail
/// for specific recipients.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
    failing: Mutex<Vec<String>>,
}

impl RecordingMailer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every send to this address fail until [`Self::repair`].
    pub fn fail_for(&self, email: &str) {
        self.failing.lock().expect("poisoned").push(email.to_string());
    }

    /// Stop failing for every address.
    pub fn repair(&self) {
        self.failing.lock().expect("poisoned").clear();
    }

    pub fn is_sent_to(&self, email: &str) -> bool {
        self.sent_count(email) > 0
    }

    pub fn sent_count(&self, email: &str) -> usize {
        self.sent.lock().expect("poisoned").iter().filter(|mail| mail.to == email).count()
    }

    pub fn total_send_count(&self) -> usize {
        self.sent.lock().expect("poisoned").len()
    }

    pub fn bcc_for(&self, email: &str) -> Vec<String> {
        self.sent
            .lock()
            .expect("poisoned")
            .iter()
            .filter(|mail| mail.to == email)
            .flat_map(|mail| mail.bcc.clone())
            .collect()
    }

    pub fn attachments_for(&self, email: &str) -> Vec<Attachment> {
        self.sent
            .lock()
            .expect("poisoned")
            .iter()
            .filter(|mail| mail.to == email)
            .flat_map(|mail| mail.attachments.clone())
            .collect()
    }
}

#[async_trait]
impl EmailClient for RecordingMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        if self.failing.lock().expect("poisoned").iter().any(|addr| *addr == email.to) {
            return Err(Error::Email(format!("simulated failure sending to {}", email.to)));
        }
        debug!(to = %email.to, "recorded outgoing email");
        self.sent.lock().expect("poisoned").push(email.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claim::{assert_err, assert_ok};
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn email_with_attachment() -> OutgoingEmail {
        OutgoingEmail {
            to: "maria@example.com".to_string(),
            bcc: vec!["archive@example.com".to_string()],
            subject: "Ваш сертификат".to_string(),
            text: "Мария, добрый день!".to_string(),
            attachments: vec![Attachment {
                file_name: "certificate.png".to_string(),
                content_type: "image/png".to_string(),
                bytes: vec![0x89, b'P', b'N', b'G'],
            }],
        }
    }

    fn client(base_url: String) -> MailgunClient {
        MailgunClient::new(
            base_url,
            "mg.example.com".to_string(),
            Secret::new("key-test".to_string()),
            "Certificates <certs@mg.example.com>".to_string(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn posts_multipart_message_with_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/mg.example.com/messages"))
            .and(header_exists("Authorization"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = client(server.uri()).send(&email_with_attachment()).await;
        assert_ok!(outcome);
    }

    #[tokio::test]
    async fn surfaces_api_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Forbidden"))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = client(server.uri()).send(&email_with_attachment()).await;
        assert_err!(outcome);
    }

    #[tokio::test]
    async fn recording_mailer_counts_and_fails_on_demand() {
        let mailer = RecordingMailer::new();
        let email = email_with_attachment();
        mailer.fail_for("maria@example.com");
        assert_err!(mailer.send(&email).await);
        assert!(!mailer.is_sent_to("maria@example.com"));

        mailer.repair();
        assert_ok!(mailer.send(&email).await);
        assert_eq!(mailer.sent_count("maria@example.com"), 1);
        assert_eq!(mailer.total_send_count(), 1);
        assert_eq!(mailer.attachments_for("maria@example.com").len(), 1);
    }
}
