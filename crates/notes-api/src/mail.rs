//! Outbound mail: the dispatcher seam used by the OTP flow and its transports.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct OutgoingMail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// What the transport reported back for an accepted message.
#[derive(Debug, Clone, Default)]
pub struct Delivery {
    pub message_id: Option<String>,
    /// Web preview of the message, offered by some development transports.
    pub preview_url: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mail transport unreachable: {0}")]
    Transport(String),
    #[error("mail provider rejected message ({status}): {body}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<Delivery, MailError>;
}

/// Verification-code email with HTML and plain-text bodies.
pub fn otp_message(from: &str, to: &str, code: &str, expiry_minutes: i64) -> OutgoingMail {
    let html = format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;
            border: 1px solid #e0e0e0; border-radius: 5px;">
  <h2 style="color: #1976d2; text-align: center;">Notes App</h2>
  <p style="font-size: 16px;">Hello,</p>
  <p style="font-size: 16px;">Your verification code is:</p>
  <h1 style="text-align: center; letter-spacing: 5px; font-size: 32px; padding: 10px;
             background-color: #f5f5f5; border-radius: 4px;">{code}</h1>
  <p style="font-size: 16px;">This code will expire in {expiry_minutes} minutes.</p>
  <p style="font-size: 16px;">If you didn't request this code, please ignore this email.</p>
  <p style="font-size: 16px;">Best regards,<br>The Notes App Team</p>
</div>"#
    );
    let text = format!(
        "Hello,\n\nYour verification code is: {code}\n\nThis code will expire in {expiry_minutes} minutes.\n\n\
         If you didn't request this code, please ignore this email.\n\nBest regards,\nThe Notes App Team"
    );

    OutgoingMail {
        from: from.to_string(),
        to: to.to_string(),
        subject: "Your Verification Code".to_string(),
        html,
        text,
    }
}

#[derive(Debug, Clone)]
pub struct HttpMailerOptions {
    pub endpoint: String,
    pub api_key: Option<String>,
    /// Upper bound for one send, connect to last byte.
    pub timeout: Duration,
}

/// Delivers through a JSON mail API (`POST {from,to,subject,html,text}`).
#[derive(Debug, Clone)]
pub struct HttpMailer {
    options: HttpMailerOptions,
    client: Client,
}

#[derive(Debug, Default, Deserialize)]
struct ProviderReply {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    preview_url: Option<String>,
}

impl HttpMailer {
    pub fn new(options: HttpMailerOptions) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(options.timeout)
            .build()
            .context("Failed to create mail HTTP client")?;

        Ok(Self { options, client })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<Delivery, MailError> {
        let mut request = self.client.post(&self.options.endpoint).json(mail);
        if let Some(key) = &self.options.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            error!("Mail API request failed: {}", e);
            MailError::Transport(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Mail API error ({}): {}", status, body);
            return Err(MailError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        // The reply body is informational; an unexpected shape still means sent.
        let reply = response.json::<ProviderReply>().await.unwrap_or_default();
        info!("Mail to {} accepted by provider", mail.to);

        Ok(Delivery {
            message_id: reply.id,
            preview_url: reply.preview_url,
        })
    }
}

/// Development transport: writes the message to the log instead of sending it.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<Delivery, MailError> {
        let message_id = Uuid::new_v4().to_string();
        info!(
            to = %mail.to,
            subject = %mail.subject,
            message_id = %message_id,
            "Mail not sent (no mail API configured):\n{}",
            mail.text
        );
        Ok(Delivery {
            message_id: Some(message_id),
            preview_url: None,
        })
    }
}
