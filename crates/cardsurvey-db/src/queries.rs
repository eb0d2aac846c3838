use crate::Database;
use crate::models::{UserRow, now_timestamp};
use anyhow::Result;
use rusqlite::{Connection, ErrorCode, OptionalExtension};

impl Database {
    // -- Users --

    /// Returns false when the email is already registered.
    pub fn create_user(
        &self,
        id: &str,
        email: &str,
        password_hash: &str,
        display_name: &str,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (id, email, password, display_name, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (id, email, password_hash, display_name, now_timestamp()),
            );

            match inserted {
                Ok(_) => Ok(true),
                Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                    Ok(false)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    /// `photo_url`: `None` leaves it, `Some(None)` clears it.
    pub fn update_profile(
        &self,
        id: &str,
        display_name: Option<&str>,
        photo_url: Option<Option<&str>>,
    ) -> Result<Option<UserRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            if let Some(name) = display_name {
                tx.execute("UPDATE users SET display_name = ?1 WHERE id = ?2", (name, id))?;
            }
            if let Some(photo) = photo_url {
                tx.execute("UPDATE users SET photo_url = ?1 WHERE id = ?2", (photo, id))?;
            }
            let row = query_user(&tx, "id", id)?;
            tx.commit()?;
            Ok(row)
        })
    }

    // -- Sessions --

    pub fn create_session(&self, id: &str, user_id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO sessions (id, user_id, created_at) VALUES (?1, ?2, ?3)",
                (id, user_id, now_timestamp()),
            )?;
            Ok(())
        })
    }

    pub fn is_session_active(&self, id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn
                .query_row(
                    "SELECT 1 FROM sessions WHERE id = ?1 AND user_id = ?2 AND revoked_at IS NULL",
                    (id, user_id),
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Returns false if the session was unknown or already revoked.
    pub fn revoke_session(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE sessions SET revoked_at = ?1 WHERE id = ?2 AND revoked_at IS NULL",
                (now_timestamp(), id),
            )?;
            Ok(changed > 0)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!(
        "SELECT id, email, password, display_name, photo_url, created_at FROM users WHERE {} = ?1",
        column
    );
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                email: row.get(1)?,
                password: row.get(2)?,
                display_name: row.get(3)?,
                photo_url: row.get(4)?,
                created_at: row.get(5)?,
            })
        })
        .optional()?;

    Ok(row)
}
