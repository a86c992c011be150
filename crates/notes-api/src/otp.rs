//! Email one-time-password lifecycle.
//!
//! Per email the state lives in `User::otp`: absent (no code) or a live code
//! with an expiry. Requesting a code overwrites any previous one; a successful
//! verification clears it, so each code verifies at most once.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rand::Rng;
use tracing::{error, info, warn};
use uuid::Uuid;

use notes_db::Database;
use notes_types::models::{AccountState, OtpData, User, normalize_email};

use crate::dev::DispatchLog;
use crate::mail::{Delivery, MailError, Mailer, OutgoingMail, otp_message};

/// Six random decimal digits, never with a leading zero (100000..=999999).
pub fn generate_code() -> String {
    rand::rng().random_range(100_000..=999_999u32).to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    /// No code outstanding for this account.
    Missing,
    Mismatch,
    Expired,
}

impl RejectionReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectionReason::Missing => "No OTP data found",
            RejectionReason::Mismatch => "OTP mismatch",
            RejectionReason::Expired => "OTP expired",
        }
    }
}

/// Why a submitted code was refused. `expired` is reported independently of
/// the reason: a mismatched code against a stale record is also expired, and
/// a missing record always counts as expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OtpRejection {
    pub reason: RejectionReason,
    pub expired: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum OtpError {
    #[error("User not found")]
    UnknownEmail,
    #[error("Invalid or expired OTP: {}", .0.reason.as_str())]
    Rejected(OtpRejection),
    #[error("Failed to send OTP: {0}")]
    Dispatch(#[source] MailError),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Result of a committed OTP request.
#[derive(Debug, Clone)]
pub struct IssuedOtp {
    pub user_id: Uuid,
    /// Whether the request created the (pending) account.
    pub created: bool,
    pub expires_at: DateTime<Utc>,
}

/// Optional profile fields submitted alongside a code.
#[derive(Debug, Clone, Default)]
pub struct ProfileCompletion {
    pub name: Option<String>,
    pub dob: Option<NaiveDate>,
}

/// What the create-or-update step did, so a failed dispatch undoes only that.
enum Upsert {
    Created(Uuid),
    Updated(Uuid),
}

impl Upsert {
    fn user_id(&self) -> Uuid {
        match self {
            Upsert::Created(id) | Upsert::Updated(id) => *id,
        }
    }
}

type CodeSource = Arc<dyn Fn() -> String + Send + Sync>;

pub struct OtpService {
    db: Arc<Database>,
    mailer: Arc<dyn Mailer>,
    mail_from: String,
    expiry_minutes: i64,
    dispatch_log: Option<Arc<DispatchLog>>,
    code_source: CodeSource,
}

impl OtpService {
    pub fn new(
        db: Arc<Database>,
        mailer: Arc<dyn Mailer>,
        mail_from: impl Into<String>,
        expiry_minutes: i64,
    ) -> Self {
        Self {
            db,
            mailer,
            mail_from: mail_from.into(),
            expiry_minutes,
            dispatch_log: None,
            code_source: Arc::new(generate_code),
        }
    }

    /// Replace `generate_code` as the source of new codes.
    pub fn with_code_source(mut self, source: impl Fn() -> String + Send + Sync + 'static) -> Self {
        self.code_source = Arc::new(source);
        self
    }

    /// Record every successful dispatch into `log`.
    pub fn with_dispatch_log(mut self, log: Arc<DispatchLog>) -> Self {
        self.dispatch_log = Some(log);
        self
    }

    pub fn expiry_minutes(&self) -> i64 {
        self.expiry_minutes
    }

    pub async fn request_otp(&self, email: &str) -> Result<IssuedOtp, OtpError> {
        self.request_otp_at(email, Utc::now()).await
    }

    /// Issue a fresh code for `email` and mail it. If the mail cannot be sent
    /// and this call created the account, the account is removed again. A
    /// pre-existing account keeps the new, undelivered code.
    pub async fn request_otp_at(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedOtp, OtpError> {
        let email = normalize_email(email);
        let otp = OtpData {
            code: (self.code_source)(),
            expires_at: now + Duration::minutes(self.expiry_minutes),
        };

        let upsert = self.store_otp(&email, &otp, now)?;

        let mail = otp_message(&self.mail_from, &email, &otp.code, self.expiry_minutes);
        if let Err(e) = self.dispatch(&mail).await {
            error!("Failed to send OTP email to {}: {}", email, e);
            self.undo(&upsert);
            return Err(OtpError::Dispatch(e));
        }

        info!("OTP sent to {} (expires {})", email, otp.expires_at);
        Ok(IssuedOtp {
            user_id: upsert.user_id(),
            created: matches!(upsert, Upsert::Created(_)),
            expires_at: otp.expires_at,
        })
    }

    fn store_otp(&self, email: &str, otp: &OtpData, now: DateTime<Utc>) -> anyhow::Result<Upsert> {
        match self.db.get_user_by_email(email)? {
            Some(user) => {
                self.db.set_user_otp(user.id, Some(otp), now)?;
                info!("Replaced OTP for existing user {}", user.id);
                Ok(Upsert::Updated(user.id))
            }
            None => {
                let mut user = User::new(email, now);
                user.otp = Some(otp.clone());
                self.db.create_user(&user)?;
                info!("Created pending user {} for {}", user.id, email);
                Ok(Upsert::Created(user.id))
            }
        }
    }

    fn undo(&self, upsert: &Upsert) {
        let Upsert::Created(id) = upsert else {
            return;
        };

        match self.db.delete_user(*id) {
            Ok(_) => warn!("Removed pending user {} after failed dispatch", id),
            Err(e) => error!("Could not remove pending user {}: {}", id, e),
        }
    }

    pub fn verify_otp(
        &self,
        email: &str,
        code: &str,
        completion: ProfileCompletion,
    ) -> Result<User, OtpError> {
        self.verify_otp_at(email, code, completion, Utc::now())
    }

    /// Check `code` against the stored one. On success the code is cleared,
    /// the name is filled in if the account has none yet, and a supplied date
    /// of birth always replaces the stored one.
    pub fn verify_otp_at(
        &self,
        email: &str,
        code: &str,
        completion: ProfileCompletion,
        now: DateTime<Utc>,
    ) -> Result<User, OtpError> {
        let email = normalize_email(email);
        let mut user = self.db.get_user_by_email(&email)?.ok_or(OtpError::UnknownEmail)?;

        if let Err(rejection) = check(user.otp.as_ref(), code, now) {
            warn!("OTP verification failed for {}: {}", email, rejection.reason.as_str());
            return Err(OtpError::Rejected(rejection));
        }

        user.otp = None;
        if user.state() == AccountState::Pending {
            if let Some(name) = completion.name.filter(|n| !n.trim().is_empty()) {
                info!("Completing signup for user {}", user.id);
                user.name = name.trim().to_string();
            }
        }
        if let Some(dob) = completion.dob {
            user.dob = Some(dob);
        }
        user.updated_at = now;

        self.db.update_user(&user)?;
        info!("OTP verified for user {}", user.id);
        Ok(user)
    }

    /// Send a verification-style email that is not tied to any account.
    pub async fn send_test_email(&self, email: &str) -> Result<Delivery, MailError> {
        let mail = otp_message(&self.mail_from, email, &(self.code_source)(), self.expiry_minutes);
        self.dispatch(&mail).await
    }

    async fn dispatch(&self, mail: &OutgoingMail) -> Result<Delivery, MailError> {
        let delivery = self.mailer.send(mail).await?;
        if let Some(log) = &self.dispatch_log {
            log.record(mail, &delivery);
        }
        Ok(delivery)
    }
}

fn check(stored: Option<&OtpData>, code: &str, now: DateTime<Utc>) -> Result<(), OtpRejection> {
    let Some(stored) = stored else {
        return Err(OtpRejection {
            reason: RejectionReason::Missing,
            expired: true,
        });
    };

    let expired = stored.is_expired(now);
    if stored.code != code {
        return Err(OtpRejection {
            reason: RejectionReason::Mismatch,
            expired,
        });
    }
    if expired {
        return Err(OtpRejection {
            reason: RejectionReason::Expired,
            expired,
        });
    }
    Ok(())
}
