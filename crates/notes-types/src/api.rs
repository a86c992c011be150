use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Note, User};

// -- JWT Claims --

/// Session token claims, shared by the token issuer and the auth middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub exp: usize,
}

// -- Auth --
//
// Request fields are optional at the serde level so that a missing field
// surfaces as our own 400 message instead of an extractor rejection.

#[derive(Debug, Default, Deserialize)]
pub struct SendOtpRequest {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendOtpResponse {
    pub message: String,
    pub success: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct VerifyOtpRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub otp: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub dob: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleLoginRequest {
    #[serde(default)]
    pub id_token: Option<String>,
}

/// Returned by both OTP verification and Google sign-in.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub dob: Option<NaiveDate>,
    pub profile_picture: Option<String>,
    pub token: String,
}

impl AuthResponse {
    pub fn new(user: &User, token: String) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            dob: user.dob,
            profile_picture: user.profile_picture.clone(),
            token,
        }
    }
}

/// User profile without any authentication state.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub dob: Option<NaiveDate>,
    pub profile_picture: Option<String>,
    pub google_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for ProfileResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            dob: user.dob,
            profile_picture: user.profile_picture,
            google_id: user.google_id,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

// -- Notes --

#[derive(Debug, Default, Deserialize)]
pub struct CreateNoteRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteResponse {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    /// Owner id.
    pub user: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Note> for NoteResponse {
    fn from(note: Note) -> Self {
        Self {
            id: note.id,
            title: note.title,
            content: note.content,
            user: note.user_id,
            created_at: note.created_at,
            updated_at: note.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteNoteResponse {
    pub id: Uuid,
}

// -- Developer diagnostics --

#[derive(Debug, Default, Deserialize)]
pub struct TestEmailRequest {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestEmailResponse {
    pub message: String,
    pub preview_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastDispatchResponse {
    pub url: Option<String>,
    pub to: String,
    pub subject: String,
    pub sent_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_request_tolerates_missing_optional_fields() {
        let req: VerifyOtpRequest = serde_json::from_str(r#"{"email":"a@x.com","otp":"123456"}"#).unwrap();
        assert_eq!(req.email.as_deref(), Some("a@x.com"));
        assert!(req.name.is_none());
        assert!(req.dob.is_none());
    }

    #[test]
    fn google_request_reads_camel_case_token() {
        let req: GoogleLoginRequest = serde_json::from_str(r#"{"idToken":"abc"}"#).unwrap();
        assert_eq!(req.id_token.as_deref(), Some("abc"));
    }

    #[test]
    fn auth_response_uses_camel_case_and_plain_dates() {
        let mut user = User::new("a@x.com", Utc::now());
        user.name = "Ann".into();
        user.dob = NaiveDate::from_ymd_opt(1990, 1, 1);
        user.profile_picture = Some("https://img/ann.png".into());

        let json = serde_json::to_value(AuthResponse::new(&user, "tok".into())).unwrap();
        assert_eq!(json["dob"], "1990-01-01");
        assert_eq!(json["profilePicture"], "https://img/ann.png");
        assert_eq!(json["token"], "tok");
    }
}
