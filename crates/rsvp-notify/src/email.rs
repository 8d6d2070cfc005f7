//! Transactional email.

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::error::NotifyResult;
use crate::https::HttpsClient;

/// One outbound HTML email to a single recipient.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Sends email. `Ok` means the provider accepted the message.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> NotifyResult<()>;
}

/// Email through the Resend HTTP API.
#[derive(Debug, Clone)]
pub struct ResendMailer {
    client: HttpsClient,
    api_base: String,
    api_key: String,
}

#[derive(Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

impl ResendMailer {
    pub fn new(client: HttpsClient, api_base: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl EmailSender for ResendMailer {
    async fn send(&self, email: &OutboundEmail) -> NotifyResult<()> {
        let body = SendEmailRequest {
            from: &email.from,
            to: [&email.to],
            subject: &email.subject,
            html: &email.html,
        };
        let url = format!("{}/emails", self.api_base);
        self.client
            .post_json(&url, Some(&self.api_key), &body)
            .await?;
        debug!(to = %email.to, subject = %email.subject, "email accepted");
        Ok(())
    }
}
