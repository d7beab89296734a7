//! AI insight persistence

use std::collections::HashSet;

use rusqlite::{params, Connection};

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{AiInsight, GeneratedInsight, InsightType};

fn unresolved_messages(conn: &Connection, user_id: i64) -> Result<HashSet<String>> {
    let mut stmt =
        conn.prepare("SELECT message FROM ai_insights WHERE user_id = ? AND is_resolved = 0")?;
    let messages = stmt
        .query_map(params![user_id], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<HashSet<_>, _>>()?;
    Ok(messages)
}

impl Database {
    /// List a user's insights, newest first
    pub fn list_insights(&self, user_id: i64, include_resolved: bool) -> Result<Vec<AiInsight>> {
        let conn = self.conn()?;
        let sql = if include_resolved {
            r#"
            SELECT id, user_id, insight_type, message, affected_services, confidence_score,
                   is_resolved, created_at, resolved_at
            FROM ai_insights
            WHERE user_id = ?
            ORDER BY is_resolved, created_at DESC, id
            "#
        } else {
            r#"
            SELECT id, user_id, insight_type, message, affected_services, confidence_score,
                   is_resolved, created_at, resolved_at
            FROM ai_insights
            WHERE user_id = ? AND is_resolved = 0
            ORDER BY created_at DESC, id
            "#
        };

        let mut stmt = conn.prepare(sql)?;
        let insights = stmt
            .query_map(params![user_id], Self::row_to_insight)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(insights)
    }

    /// Messages of the user's unresolved insights
    pub fn unresolved_insight_messages(&self, user_id: i64) -> Result<HashSet<String>> {
        let conn = self.conn()?;
        unresolved_messages(&conn, user_id)
    }

    /// Persist a batch of generated insights in one transaction
    ///
    /// Items whose message matches an existing unresolved insight (or an
    /// earlier item in the batch) are skipped. Returns how many were inserted.
    pub fn persist_new_insights(&self, user_id: i64, batch: &[GeneratedInsight]) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let mut existing = unresolved_messages(&tx, user_id)?;

        let mut inserted = 0;
        for insight in batch {
            if !existing.insert(insight.message.clone()) {
                continue;
            }
            let services = serde_json::to_string(&insight.affected_services)?;
            tx.execute(
                r#"
                INSERT INTO ai_insights (user_id, insight_type, message, affected_services, confidence_score)
                VALUES (?, ?, ?, ?, ?)
                "#,
                params![
                    user_id,
                    insight.insight_type.as_str(),
                    insight.message,
                    services,
                    insight.confidence_score
                ],
            )?;
            inserted += 1;
        }

        tx.commit()?;
        Ok(inserted)
    }

    /// Mark an insight resolved
    pub fn resolve_insight(&self, user_id: i64, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            r#"
            UPDATE ai_insights
            SET is_resolved = 1, resolved_at = COALESCE(resolved_at, CURRENT_TIMESTAMP)
            WHERE id = ? AND user_id = ?
            "#,
            params![id, user_id],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("Insight {}", id)));
        }
        Ok(())
    }

    pub fn delete_insight(&self, user_id: i64, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "DELETE FROM ai_insights WHERE id = ? AND user_id = ?",
            params![id, user_id],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("Insight {}", id)));
        }
        Ok(())
    }

    fn row_to_insight(row: &rusqlite::Row) -> rusqlite::Result<AiInsight> {
        let type_str: String = row.get(2)?;
        let services_json: String = row.get(4)?;
        let created_at: String = row.get(7)?;
        let resolved_at: Option<String> = row.get(8)?;

        Ok(AiInsight {
            id: row.get(0)?,
            user_id: row.get(1)?,
            insight_type: type_str.parse().unwrap_or(InsightType::Suggestion),
            message: row.get(3)?,
            affected_services: serde_json::from_str(&services_json).unwrap_or_default(),
            confidence_score: row.get(5)?,
            is_resolved: row.get(6)?,
            created_at: parse_datetime(&created_at),
            resolved_at: resolved_at.map(|s| parse_datetime(&s)),
        })
    }
}
