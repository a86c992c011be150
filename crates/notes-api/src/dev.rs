//! Developer-only diagnostics: the last dispatched email and a test-send route.
//! Mounted only when `NOTES_DEV_ENDPOINTS` is enabled.

use std::sync::Mutex;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    response::IntoResponse,
};
use chrono::Utc;
use tracing::{info, warn};

use notes_types::api::{LastDispatchResponse, TestEmailRequest, TestEmailResponse};
use notes_types::models::normalize_email;

use crate::AppState;
use crate::error::ApiError;
use crate::mail::{Delivery, OutgoingMail};

/// Holds the most recent successful dispatch. Passed explicitly to whoever
/// records into it.
#[derive(Debug, Default)]
pub struct DispatchLog {
    last: Mutex<Option<LastDispatchResponse>>,
}

impl DispatchLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, mail: &OutgoingMail, delivery: &Delivery) {
        let entry = LastDispatchResponse {
            url: delivery.preview_url.clone(),
            to: mail.to.clone(),
            subject: mail.subject.clone(),
            sent_at: Utc::now(),
        };
        match self.last.lock() {
            Ok(mut last) => *last = Some(entry),
            Err(e) => warn!("Dispatch log lock poisoned: {}", e),
        }
    }

    pub fn last(&self) -> Option<LastDispatchResponse> {
        self.last.lock().ok().and_then(|last| last.clone())
    }
}

pub async fn last_email_url(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    state
        .dispatch_log
        .as_ref()
        .and_then(|log| log.last())
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("No email has been sent yet".into()))
}

/// Sends a throwaway verification email without touching any account.
pub async fn test_email(
    State(state): State<AppState>,
    payload: Result<Json<TestEmailRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let email = req
        .email
        .as_deref()
        .map(normalize_email)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ApiError::Validation("Email address is required".into()))?;

    info!("Sending test email to {}", email);
    let delivery = state.otp.send_test_email(&email).await.map_err(|e| {
        warn!("Test email to {} failed: {}", email, e);
        ApiError::Dispatch("Failed to send test email".into())
    })?;

    Ok(Json(TestEmailResponse {
        message: "Test email sent successfully!".into(),
        preview_url: delivery
            .preview_url
            .unwrap_or_else(|| "No preview URL available".into()),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::otp_message;

    #[test]
    fn dispatch_log_keeps_only_latest() {
        let log = DispatchLog::new();
        assert!(log.last().is_none());

        let first = otp_message("f", "a@x.com", "111111", 10);
        let second = otp_message("f", "b@x.com", "222222", 10);
        log.record(&first, &Delivery::default());
        log.record(
            &second,
            &Delivery {
                message_id: None,
                preview_url: Some("https://preview/2".into()),
            },
        );

        let last = log.last().unwrap();
        assert_eq!(last.to, "b@x.com");
        assert_eq!(last.url.as_deref(), Some("https://preview/2"));
    }
}
