use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info};

use notes_types::api::{
    AuthResponse, GoogleLoginRequest, ProfileResponse, SendOtpRequest, SendOtpResponse, VerifyOtpRequest,
};
use notes_types::models::{User, normalize_email};

use crate::AppState;
use crate::error::ApiError;
use crate::middleware::Claims;
use crate::otp::ProfileCompletion;

pub async fn send_otp(
    State(state): State<AppState>,
    payload: Result<Json<SendOtpRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let email = required(req.email.as_deref()).ok_or_else(|| ApiError::Validation("Email is required".into()))?;
    debug!("OTP requested for {}", email);

    state.otp.request_otp(email).await?;

    Ok((
        StatusCode::OK,
        Json(SendOtpResponse {
            message: format!(
                "OTP sent to {}. Valid for {} minutes.",
                normalize_email(email),
                state.otp.expiry_minutes()
            ),
            success: true,
        }),
    ))
}

pub async fn verify_otp(
    State(state): State<AppState>,
    payload: Result<Json<VerifyOtpRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let (Some(email), Some(code)) = (required(req.email.as_deref()), required(req.otp.as_deref())) else {
        return Err(ApiError::Validation("Email and OTP are required".into()));
    };

    let dob = required(req.dob.as_deref()).map(parse_dob).transpose()?;
    let completion = ProfileCompletion { name: req.name, dob };

    let user = state.otp.verify_otp(email, code, completion)?;
    let token = state.tokens.issue(&user)?;

    Ok(Json(AuthResponse::new(&user, token)))
}

/// Sign in with a Google ID token. Creates the account on first use and links
/// the Google identity to an existing email account that has none yet.
pub async fn google_login(
    State(state): State<AppState>,
    payload: Result<Json<GoogleLoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let id_token = required(req.id_token.as_deref())
        .ok_or_else(|| ApiError::UpstreamAuth("Invalid Google token".into()))?;

    let identity = state.identity.verify(id_token).await?;
    let email = normalize_email(&identity.email);
    let now = Utc::now();

    let user = match state.db.get_user_by_email(&email)? {
        None => {
            let mut user = User::new(&email, now);
            user.name = identity.name.unwrap_or_default();
            user.google_id = Some(identity.subject);
            user.profile_picture = identity.picture;
            state.db.create_user(&user)?;
            info!("Created user {} from Google sign-in", user.id);
            user
        }
        Some(mut user) if user.google_id.is_none() => {
            user.google_id = Some(identity.subject);
            if identity.picture.is_some() {
                user.profile_picture = identity.picture;
            }
            user.updated_at = now;
            state.db.update_user(&user)?;
            info!("Linked Google identity to user {}", user.id);
            user
        }
        Some(user) => user,
    };

    let token = state.tokens.issue(&user)?;
    Ok(Json(AuthResponse::new(&user, token)))
}

pub async fn profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .get_user_by_id(claims.sub)?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    Ok(Json(ProfileResponse::from(user)))
}

/// Treat absent and blank values alike.
fn required(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp.
fn parse_dob(raw: &str) -> Result<NaiveDate, ApiError> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|ts| ts.date_naive()))
        .map_err(|_| ApiError::Validation(format!("Invalid date of birth: '{}'", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dob_accepts_plain_dates_and_timestamps() {
        let expected = NaiveDate::from_ymd_opt(1990, 1, 1).unwrap();
        assert_eq!(parse_dob("1990-01-01").unwrap(), expected);
        assert_eq!(parse_dob("1990-01-01T00:00:00.000Z").unwrap(), expected);
        assert!(parse_dob("01/01/1990").is_err());
    }

    #[test]
    fn blank_values_count_as_missing() {
        assert_eq!(required(Some("  ")), None);
        assert_eq!(required(None), None);
        assert_eq!(required(Some("a@x.com")), Some("a@x.com"));
    }
}
