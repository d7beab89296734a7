//! User account operations

use rusqlite::{params, OptionalExtension};

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{NewUser, ProfileUpdate, User};

const USER_COLUMNS: &str = "id, email, name, country, currency, avatar_url, monthly_budget, created_at, updated_at";

impl Database {
    /// Register a new user
    ///
    /// Emails are unique (case-insensitive); a duplicate yields `Error::Conflict`.
    pub fn create_user(&self, user: &NewUser) -> Result<User> {
        let email = user.email.trim();
        let conn = self.conn()?;

        let exists: Option<i64> = conn
            .query_row(
                "SELECT id FROM users WHERE email = ?",
                params![email],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_some() {
            return Err(Error::Conflict(format!(
                "An account with email {} already exists",
                email
            )));
        }

        conn.execute(
            r#"
            INSERT INTO users (email, password_hash, name, country, currency)
            VALUES (?, ?, ?, ?, ?)
            "#,
            params![
                email,
                user.password_hash,
                user.name,
                user.country,
                user.currency.as_deref().unwrap_or("USD").to_uppercase(),
            ],
        )?;
        let id = conn.last_insert_rowid();

        // Link invitations sent before this account existed
        conn.execute(
            "UPDATE shared_plan_participants SET user_id = ? WHERE email = ? AND user_id IS NULL",
            params![id, email],
        )?;
        drop(conn);

        self.get_user(id)?
            .ok_or_else(|| Error::NotFound(format!("User {}", id)))
    }

    /// Get a user by ID
    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
        let user = conn
            .query_row(&sql, params![id], Self::row_to_user)
            .optional()?;
        Ok(user)
    }

    /// Get a user by email (case-insensitive)
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS);
        let user = conn
            .query_row(&sql, params![email.trim()], Self::row_to_user)
            .optional()?;
        Ok(user)
    }

    /// Get a user together with the stored password hash, for login
    pub fn get_user_credentials(&self, email: &str) -> Result<Option<(User, String)>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {}, password_hash FROM users WHERE email = ?",
            USER_COLUMNS
        );
        let result = conn
            .query_row(&sql, params![email.trim()], |row| {
                Ok((Self::row_to_user(row)?, row.get::<_, String>(9)?))
            })
            .optional()?;
        Ok(result)
    }

    /// Get the stored password hash for a user
    pub fn get_password_hash(&self, user_id: i64) -> Result<String> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT password_hash FROM users WHERE id = ?",
            params![user_id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| Error::NotFound(format!("User {}", user_id)))
    }

    /// List all users (admin/CLI use)
    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let users = stmt
            .query_map([], Self::row_to_user)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(users)
    }

    /// Apply a partial profile update
    pub fn update_user_profile(&self, user_id: i64, update: &ProfileUpdate) -> Result<User> {
        let conn = self.conn()?;
        let changed = conn.execute(
            r#"
            UPDATE users SET
                name = COALESCE(?, name),
                country = COALESCE(?, country),
                currency = COALESCE(?, currency),
                monthly_budget = COALESCE(?, monthly_budget),
                updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
            params![
                update.name,
                update.country,
                update.currency.as_ref().map(|c| c.to_uppercase()),
                update.monthly_budget,
                user_id
            ],
        )?;
        drop(conn);

        if changed == 0 {
            return Err(Error::NotFound(format!("User {}", user_id)));
        }
        self.get_user(user_id)?
            .ok_or_else(|| Error::NotFound(format!("User {}", user_id)))
    }

    /// Replace the stored password hash
    pub fn update_user_password(&self, user_id: i64, password_hash: &str) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE users SET password_hash = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
            params![password_hash, user_id],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("User {}", user_id)));
        }
        Ok(())
    }

    /// Set the avatar URL
    pub fn set_user_avatar(&self, user_id: i64, avatar_url: &str) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE users SET avatar_url = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
            params![avatar_url, user_id],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("User {}", user_id)));
        }
        Ok(())
    }

    /// Set or clear the monthly budget
    pub fn set_monthly_budget(&self, user_id: i64, budget: Option<f64>) -> Result<()> {
        if let Some(b) = budget {
            if b < 0.0 || !b.is_finite() {
                return Err(Error::Validation(
                    "Monthly budget must be a non-negative number".to_string(),
                ));
            }
        }

        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE users SET monthly_budget = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
            params![budget, user_id],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("User {}", user_id)));
        }
        Ok(())
    }

    /// Delete a user and everything they own
    pub fn delete_user(&self, user_id: i64) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute("DELETE FROM users WHERE id = ?", params![user_id])?;
        if changed == 0 {
            return Err(Error::NotFound(format!("User {}", user_id)));
        }
        Ok(())
    }

    fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
        let created_at: String = row.get(7)?;
        let updated_at: String = row.get(8)?;
        Ok(User {
            id: row.get(0)?,
            email: row.get(1)?,
            name: row.get(2)?,
            country: row.get(3)?,
            currency: row.get(4)?,
            avatar_url: row.get(5)?,
            monthly_budget: row.get(6)?,
            created_at: parse_datetime(&created_at),
            updated_at: parse_datetime(&updated_at),
        })
    }
}
