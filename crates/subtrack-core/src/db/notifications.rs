//! Notification operations

use rusqlite::{params, Connection};

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::Notification;

/// Insert a notification on an existing connection or transaction
pub(super) fn insert_notification(
    conn: &Connection,
    user_id: i64,
    kind: &str,
    title: &str,
    message: &str,
    related_id: Option<i64>,
) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO notifications (user_id, kind, title, message, related_id)
        VALUES (?, ?, ?, ?, ?)
        "#,
        params![user_id, kind, title, message, related_id],
    )?;
    Ok(conn.last_insert_rowid())
}

impl Database {
    /// Create a notification for a user
    pub fn create_notification(
        &self,
        user_id: i64,
        kind: &str,
        title: &str,
        message: &str,
        related_id: Option<i64>,
    ) -> Result<i64> {
        let conn = self.conn()?;
        insert_notification(&conn, user_id, kind, title, message, related_id)
    }

    /// List a user's notifications, newest first
    pub fn list_notifications(&self, user_id: i64, unread_only: bool) -> Result<Vec<Notification>> {
        let conn = self.conn()?;
        let sql = if unread_only {
            r#"
            SELECT id, user_id, kind, title, message, related_id, is_read, created_at
            FROM notifications
            WHERE user_id = ? AND is_read = 0
            ORDER BY created_at DESC, id DESC
            "#
        } else {
            r#"
            SELECT id, user_id, kind, title, message, related_id, is_read, created_at
            FROM notifications
            WHERE user_id = ?
            ORDER BY created_at DESC, id DESC
            "#
        };

        let mut stmt = conn.prepare(sql)?;
        let notifications = stmt
            .query_map(params![user_id], |row| {
                let created_at: String = row.get(7)?;
                Ok(Notification {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    kind: row.get(2)?,
                    title: row.get(3)?,
                    message: row.get(4)?,
                    related_id: row.get(5)?,
                    is_read: row.get(6)?,
                    created_at: parse_datetime(&created_at),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(notifications)
    }

    /// Count unread notifications
    pub fn count_unread_notifications(&self, user_id: i64) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ? AND is_read = 0",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Mark one notification as read
    pub fn mark_notification_read(&self, user_id: i64, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE notifications SET is_read = 1 WHERE id = ? AND user_id = ?",
            params![id, user_id],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("Notification {}", id)));
        }
        Ok(())
    }

    /// Mark all of a user's notifications as read, returning how many changed
    pub fn mark_all_notifications_read(&self, user_id: i64) -> Result<usize> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE notifications SET is_read = 1 WHERE user_id = ? AND is_read = 0",
            params![user_id],
        )?;
        Ok(changed)
    }

    pub fn delete_notification(&self, user_id: i64, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "DELETE FROM notifications WHERE id = ? AND user_id = ?",
            params![id, user_id],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("Notification {}", id)));
        }
        Ok(())
    }
}
