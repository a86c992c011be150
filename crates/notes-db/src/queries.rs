use crate::Database;
use crate::models::{NoteRow, UserRow, format_timestamp};
use anyhow::Result;
use chrono::{DateTime, Utc};
use notes_types::models::{Note, OtpData, User};
use rusqlite::{Connection, Row};
use uuid::Uuid;

const USER_COLUMNS: &str =
    "id, email, name, dob, profile_picture, google_id, otp_code, otp_expires_at, created_at, updated_at";
const NOTE_COLUMNS: &str = "id, user_id, title, content, created_at, updated_at";

impl Database {
    // -- Users --

    pub fn create_user(&self, user: &User) -> Result<()> {
        let row = UserRow::from(user);
        self.with_conn(|conn| {
            conn.execute(
                &format!("INSERT INTO users ({USER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"),
                rusqlite::params![
                    row.id,
                    row.email,
                    row.name,
                    row.dob,
                    row.profile_picture,
                    row.google_id,
                    row.otp_code,
                    row.otp_expires_at,
                    row.created_at,
                    row.updated_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = self.with_conn(|conn| query_user(conn, "email", email))?;
        row.map(User::try_from).transpose()
    }

    pub fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let row = self.with_conn(|conn| query_user(conn, "id", &id.to_string()))?;
        row.map(User::try_from).transpose()
    }

    /// Overwrite every mutable column of an existing user. Last write wins.
    pub fn update_user(&self, user: &User) -> Result<()> {
        let row = UserRow::from(user);
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users
                 SET name = ?2, dob = ?3, profile_picture = ?4, google_id = ?5,
                     otp_code = ?6, otp_expires_at = ?7, updated_at = ?8
                 WHERE id = ?1",
                rusqlite::params![
                    row.id,
                    row.name,
                    row.dob,
                    row.profile_picture,
                    row.google_id,
                    row.otp_code,
                    row.otp_expires_at,
                    row.updated_at,
                ],
            )?;
            Ok(())
        })
    }

    /// Replace (or clear) the OTP columns only, leaving the profile untouched.
    pub fn set_user_otp(&self, id: Uuid, otp: Option<&OtpData>, now: DateTime<Utc>) -> Result<()> {
        let code = otp.map(|o| o.code.clone());
        let expires_at = otp.map(|o| format_timestamp(o.expires_at));
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET otp_code = ?2, otp_expires_at = ?3, updated_at = ?4 WHERE id = ?1",
                rusqlite::params![id.to_string(), code, expires_at, format_timestamp(now)],
            )?;
            Ok(())
        })
    }

    /// Returns whether a row was removed.
    pub fn delete_user(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM users WHERE id = ?1", [id.to_string()])?;
            Ok(n > 0)
        })
    }

    // -- Notes --

    pub fn create_note(&self, note: &Note) -> Result<()> {
        let row = NoteRow::from(note);
        self.with_conn(|conn| {
            conn.execute(
                &format!("INSERT INTO notes ({NOTE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
                rusqlite::params![row.id, row.user_id, row.title, row.content, row.created_at, row.updated_at],
            )?;
            Ok(())
        })
    }

    /// All notes owned by `user_id`, newest first.
    pub fn get_notes_for_user(&self, user_id: Uuid) -> Result<Vec<Note>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {NOTE_COLUMNS} FROM notes WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC"
            ))?;
            let rows = stmt
                .query_map([user_id.to_string()], read_note)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        rows.into_iter().map(Note::try_from).collect()
    }

    pub fn get_note_by_id(&self, id: Uuid) -> Result<Option<Note>> {
        let row = self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ?1"))?;
            stmt.query_row([id.to_string()], read_note).optional()
        })?;
        row.map(Note::try_from).transpose()
    }

    /// Returns whether a row was removed.
    pub fn delete_note(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM notes WHERE id = ?1", [id.to_string()])?;
            Ok(n > 0)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1"))?;
    stmt.query_row([value], read_user).optional()
}

fn read_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        dob: row.get(3)?,
        profile_picture: row.get(4)?,
        google_id: row.get(5)?,
        otp_code: row.get(6)?,
        otp_expires_at: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn read_note(row: &Row<'_>) -> rusqlite::Result<NoteRow> {
    Ok(NoteRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn note_for(user: &User, title: &str, at: DateTime<Utc>) -> Note {
        Note {
            id: Uuid::new_v4(),
            user_id: user.id,
            title: title.into(),
            content: "body".into(),
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn user_round_trips_through_email_and_id() {
        let db = db();
        let now = Utc::now();
        let mut user = User::new("ann@x.com", now);
        user.name = "Ann".into();
        user.dob = NaiveDate::from_ymd_opt(1990, 1, 1);
        user.otp = Some(OtpData { code: "123456".into(), expires_at: now + Duration::minutes(10) });
        db.create_user(&user).unwrap();

        let by_email = db.get_user_by_email("ann@x.com").unwrap().unwrap();
        assert_eq!(by_email.id, user.id);
        assert_eq!(by_email.name, "Ann");
        assert_eq!(by_email.dob, user.dob);
        assert_eq!(by_email.otp.as_ref().map(|o| o.code.as_str()), Some("123456"));

        let by_id = db.get_user_by_id(user.id).unwrap().unwrap();
        assert_eq!(by_id.email, "ann@x.com");

        assert!(db.get_user_by_email("nobody@x.com").unwrap().is_none());
    }

    #[test]
    fn email_is_unique() {
        let db = db();
        db.create_user(&User::new("dup@x.com", Utc::now())).unwrap();
        assert!(db.create_user(&User::new("dup@x.com", Utc::now())).is_err());
    }

    #[test]
    fn set_user_otp_leaves_profile_alone() {
        let db = db();
        let now = Utc::now();
        let mut user = User::new("ann@x.com", now);
        user.name = "Ann".into();
        user.profile_picture = Some("pic".into());
        db.create_user(&user).unwrap();

        let otp = OtpData { code: "654321".into(), expires_at: now + Duration::minutes(5) };
        db.set_user_otp(user.id, Some(&otp), now).unwrap();

        let stored = db.get_user_by_id(user.id).unwrap().unwrap();
        assert_eq!(stored.name, "Ann");
        assert_eq!(stored.profile_picture.as_deref(), Some("pic"));
        assert_eq!(stored.otp.unwrap().code, "654321");

        db.set_user_otp(user.id, None, now).unwrap();
        assert!(db.get_user_by_id(user.id).unwrap().unwrap().otp.is_none());
    }

    #[test]
    fn delete_user_reports_whether_removed() {
        let db = db();
        let user = User::new("gone@x.com", Utc::now());
        db.create_user(&user).unwrap();

        assert!(db.delete_user(user.id).unwrap());
        assert!(!db.delete_user(user.id).unwrap());
        assert!(db.get_user_by_email("gone@x.com").unwrap().is_none());
    }

    #[test]
    fn notes_are_listed_newest_first_per_owner() {
        let db = db();
        let now = Utc::now();
        let ann = User::new("ann@x.com", now);
        let bob = User::new("bob@x.com", now);
        db.create_user(&ann).unwrap();
        db.create_user(&bob).unwrap();

        db.create_note(&note_for(&ann, "older", now)).unwrap();
        db.create_note(&note_for(&ann, "newer", now + Duration::seconds(1))).unwrap();
        db.create_note(&note_for(&bob, "bob's", now)).unwrap();

        let titles: Vec<String> = db
            .get_notes_for_user(ann.id)
            .unwrap()
            .into_iter()
            .map(|n| n.title)
            .collect();
        assert_eq!(titles, vec!["newer", "older"]);
    }

    #[test]
    fn note_lookup_and_delete() {
        let db = db();
        let ann = User::new("ann@x.com", Utc::now());
        db.create_user(&ann).unwrap();
        let note = note_for(&ann, "t", Utc::now());
        db.create_note(&note).unwrap();

        let found = db.get_note_by_id(note.id).unwrap().unwrap();
        assert_eq!(found.user_id, ann.id);

        assert!(db.delete_note(note.id).unwrap());
        assert!(db.get_note_by_id(note.id).unwrap().is_none());
        assert!(!db.delete_note(note.id).unwrap());
    }
}
