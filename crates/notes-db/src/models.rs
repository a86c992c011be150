//! Database row types. These map directly to SQLite rows; conversion to the
//! `notes-types` domain models happens here so callers never see raw strings.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use notes_types::models::{Note, OtpData, User};

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub name: String,
    pub dob: Option<String>,
    pub profile_picture: Option<String>,
    pub google_id: Option<String>,
    pub otp_code: Option<String>,
    pub otp_expires_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub struct NoteRow {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Fixed-width UTC timestamps so that string order is time order.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let ts = DateTime::parse_from_rfc3339(raw).with_context(|| format!("bad timestamp '{}'", raw))?;
    Ok(ts.with_timezone(&Utc))
}

impl From<&User> for UserRow {
    fn from(user: &User) -> Self {
        let (otp_code, otp_expires_at) = match &user.otp {
            Some(otp) => (Some(otp.code.clone()), Some(format_timestamp(otp.expires_at))),
            None => (None, None),
        };

        Self {
            id: user.id.to_string(),
            email: user.email.clone(),
            name: user.name.clone(),
            dob: user.dob.map(|d| d.format("%Y-%m-%d").to_string()),
            profile_picture: user.profile_picture.clone(),
            google_id: user.google_id.clone(),
            otp_code,
            otp_expires_at,
            created_at: format_timestamp(user.created_at),
            updated_at: format_timestamp(user.updated_at),
        }
    }
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(row: UserRow) -> Result<Self> {
        let otp = match (row.otp_code, row.otp_expires_at) {
            (Some(code), Some(expires_at)) => Some(OtpData {
                code,
                expires_at: parse_timestamp(&expires_at)?,
            }),
            (None, None) => None,
            _ => return Err(anyhow!("user {} has a half-written OTP", row.id)),
        };

        let dob = row
            .dob
            .map(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d"))
            .transpose()
            .with_context(|| format!("bad dob on user {}", row.id))?;

        Ok(User {
            id: row.id.parse().with_context(|| format!("corrupt user id '{}'", row.id))?,
            email: row.email,
            name: row.name,
            dob,
            profile_picture: row.profile_picture,
            google_id: row.google_id,
            otp,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

impl From<&Note> for NoteRow {
    fn from(note: &Note) -> Self {
        Self {
            id: note.id.to_string(),
            user_id: note.user_id.to_string(),
            title: note.title.clone(),
            content: note.content.clone(),
            created_at: format_timestamp(note.created_at),
            updated_at: format_timestamp(note.updated_at),
        }
    }
}

impl TryFrom<NoteRow> for Note {
    type Error = anyhow::Error;

    fn try_from(row: NoteRow) -> Result<Self> {
        Ok(Note {
            id: row.id.parse().with_context(|| format!("corrupt note id '{}'", row.id))?,
            user_id: row
                .user_id
                .parse()
                .with_context(|| format!("corrupt user_id '{}' on note '{}'", row.user_id, row.id))?,
            title: row.title,
            content: row.content,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}
