use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A live one-time password attached to a user. Absent once verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpData {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

impl OtpData {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Whether an account has finished signup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountState {
    /// Created by an OTP request; no name recorded yet.
    Pending,
    Confirmed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub dob: Option<NaiveDate>,
    pub profile_picture: Option<String>,
    pub google_id: Option<String>,
    pub otp: Option<OtpData>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// A fresh account for `email` with no profile and no OTP.
    pub fn new(email: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.to_string(),
            name: String::new(),
            dob: None,
            profile_picture: None,
            google_id: None,
            otp: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn state(&self) -> AccountState {
        if self.name.is_empty() {
            AccountState::Pending
        } else {
            AccountState::Confirmed
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lowercase and trim an address so lookups hit the unique index.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn new_user_is_pending_until_named() {
        let mut user = User::new("a@x.com", Utc::now());
        assert_eq!(user.state(), AccountState::Pending);

        user.name = "Ann".into();
        assert_eq!(user.state(), AccountState::Confirmed);
    }

    #[test]
    fn otp_expiry_is_strictly_after_deadline() {
        let now = Utc::now();
        let otp = OtpData { code: "123456".into(), expires_at: now };
        assert!(!otp.is_expired(now));
        assert!(otp.is_expired(now + Duration::seconds(1)));
    }

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email("  Ann@Example.COM "), "ann@example.com");
    }
}
