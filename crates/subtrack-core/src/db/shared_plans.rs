//! Shared plan operations
//!
//! A shared plan splits one subscription cost among an owner and invitees.
//! The owner row is created with the plan and can never be removed.

use std::collections::HashSet;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::notifications::insert_notification;
use super::{format_datetime, parse_datetime, Database};
use crate::billing::round_currency;
use crate::error::{Error, Result};
use crate::models::{
    BillingCycle, NewParticipant, NewSharedPlan, Participant, ParticipantStatus, SharedPlan,
    SharedPlanWithParticipants, SplitType, User,
};

const PLAN_COLUMNS: &str = "p.id, p.owner_id, p.subscription_id, p.name, p.description, p.total_amount, p.currency, p.billing_cycle, p.split_type, p.created_at";

const PARTICIPANT_COLUMNS: &str = "id, plan_id, user_id, email, name, status, split_amount, is_owner, joined_at, created_at";

/// Per-person share for an equal split, computed over the full participant count
pub fn equal_split(total: f64, participant_count: usize) -> f64 {
    if participant_count == 0 {
        return 0.0;
    }
    round_currency(total / participant_count as f64)
}

impl Database {
    /// Create a shared plan with its owner and invited participants
    ///
    /// One transaction: plan row, owner participant (accepted), invitees
    /// (invited), and a notification for every invitee with an account.
    pub fn create_shared_plan(
        &self,
        owner: &User,
        plan: &NewSharedPlan,
    ) -> Result<SharedPlanWithParticipants> {
        if plan.total_amount < 0.0 || !plan.total_amount.is_finite() {
            return Err(Error::Validation(
                "Total amount must be a non-negative number".to_string(),
            ));
        }

        // Invitees, deduplicated and never including the owner
        let mut seen: HashSet<String> = HashSet::new();
        seen.insert(owner.email.to_lowercase());
        let invitees: Vec<&NewParticipant> = plan
            .participants
            .iter()
            .filter(|p| !p.email.trim().is_empty())
            .filter(|p| seen.insert(p.email.trim().to_lowercase()))
            .collect();

        let split_amount = match plan.split_type {
            SplitType::Equal => equal_split(plan.total_amount, invitees.len() + 1),
            SplitType::Custom | SplitType::Percentage => 0.0,
        };

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        if let Some(sub_id) = plan.subscription_id {
            let owned: Option<i64> = tx
                .query_row(
                    "SELECT id FROM subscriptions WHERE id = ? AND user_id = ?",
                    params![sub_id, owner.id],
                    |row| row.get(0),
                )
                .optional()?;
            if owned.is_none() {
                return Err(Error::NotFound(format!("Subscription {}", sub_id)));
            }
        }

        tx.execute(
            r#"
            INSERT INTO shared_plans (owner_id, subscription_id, name, description, total_amount, currency, billing_cycle, split_type)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                owner.id,
                plan.subscription_id,
                plan.name.trim(),
                plan.description,
                plan.total_amount,
                plan.currency.to_uppercase(),
                plan.billing_cycle.as_str(),
                plan.split_type.as_str(),
            ],
        )?;
        let plan_id = tx.last_insert_rowid();
        let now = format_datetime(&Utc::now());

        tx.execute(
            r#"
            INSERT INTO shared_plan_participants (plan_id, user_id, email, name, status, split_amount, is_owner, joined_at)
            VALUES (?, ?, ?, ?, 'accepted', ?, 1, ?)
            "#,
            params![plan_id, owner.id, owner.email, owner.name, split_amount, now],
        )?;

        for invitee in &invitees {
            let email = invitee.email.trim();
            let linked_user: Option<i64> = tx
                .query_row(
                    "SELECT id FROM users WHERE email = ?",
                    params![email],
                    |row| row.get(0),
                )
                .optional()?;

            tx.execute(
                r#"
                INSERT INTO shared_plan_participants (plan_id, user_id, email, name, status, split_amount, is_owner)
                VALUES (?, ?, ?, ?, 'invited', ?, 0)
                "#,
                params![plan_id, linked_user, email, invitee.name, split_amount],
            )?;

            if let Some(uid) = linked_user {
                insert_notification(
                    &tx,
                    uid,
                    "shared_plan_invite",
                    "Shared plan invitation",
                    &format!(
                        "{} invited you to share \"{}\" ({:.2} {})",
                        owner.name,
                        plan.name.trim(),
                        split_amount,
                        plan.currency.to_uppercase()
                    ),
                    Some(plan_id),
                )?;
            }
        }

        let result = Self::load_plan(&tx, plan_id)?;
        tx.commit()?;

        debug!(plan_id, participants = invitees.len() + 1, "Created shared plan");
        result.ok_or_else(|| Error::NotFound(format!("Shared plan {}", plan_id)))
    }

    /// Plans the user owns or participates in
    pub fn list_shared_plans(&self, user_id: i64) -> Result<Vec<SharedPlanWithParticipants>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {} FROM shared_plans p
            WHERE p.owner_id = ?
               OR EXISTS (
                   SELECT 1 FROM shared_plan_participants sp
                   WHERE sp.plan_id = p.id AND sp.user_id = ?
               )
            ORDER BY p.created_at DESC, p.id DESC
            "#,
            PLAN_COLUMNS
        ))?;
        let plans = stmt
            .query_map(params![user_id, user_id], Self::row_to_shared_plan)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut result = Vec::with_capacity(plans.len());
        for plan in plans {
            let participants = Self::load_participants(&conn, plan.id)?;
            result.push(SharedPlanWithParticipants { plan, participants });
        }
        Ok(result)
    }

    /// Get a plan visible to the user (as owner or participant)
    pub fn get_shared_plan(
        &self,
        user_id: i64,
        plan_id: i64,
    ) -> Result<Option<SharedPlanWithParticipants>> {
        let conn = self.conn()?;
        let visible: Option<i64> = conn
            .query_row(
                r#"
                SELECT p.id FROM shared_plans p
                WHERE p.id = ?
                  AND (p.owner_id = ? OR EXISTS (
                      SELECT 1 FROM shared_plan_participants sp
                      WHERE sp.plan_id = p.id AND sp.user_id = ?
                  ))
                "#,
                params![plan_id, user_id, user_id],
                |row| row.get(0),
            )
            .optional()?;

        match visible {
            Some(id) => Self::load_plan(&conn, id),
            None => Ok(None),
        }
    }

    /// Invite another participant (owner only)
    ///
    /// Existing split amounts are left as they are; a late joiner starts at 0.
    pub fn add_participant(
        &self,
        owner_id: i64,
        plan_id: i64,
        participant: &NewParticipant,
    ) -> Result<Participant> {
        let email = participant.email.trim();
        if email.is_empty() {
            return Err(Error::missing_fields(&["email"]));
        }

        let conn = self.conn()?;
        let plan = Self::owned_plan(&conn, owner_id, plan_id)?;

        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM shared_plan_participants WHERE plan_id = ? AND email = ?",
                params![plan_id, email],
                |row| row.get(0),
            )
            .optional()?;
        if existing.is_some() {
            return Err(Error::Conflict(format!(
                "{} is already part of this plan",
                email
            )));
        }

        let linked_user: Option<i64> = conn
            .query_row(
                "SELECT id FROM users WHERE email = ?",
                params![email],
                |row| row.get(0),
            )
            .optional()?;

        conn.execute(
            r#"
            INSERT INTO shared_plan_participants (plan_id, user_id, email, name, status, split_amount, is_owner)
            VALUES (?, ?, ?, ?, 'invited', 0, 0)
            "#,
            params![plan_id, linked_user, email, participant.name],
        )?;
        let participant_id = conn.last_insert_rowid();

        if let Some(uid) = linked_user {
            insert_notification(
                &conn,
                uid,
                "shared_plan_invite",
                "Shared plan invitation",
                &format!("You were invited to share \"{}\"", plan.name),
                Some(plan_id),
            )?;
        }

        Self::get_participant(&conn, participant_id)
    }

    /// Accept or decline an invitation addressed to this user
    pub fn respond_to_invitation(
        &self,
        user: &User,
        plan_id: i64,
        accept: bool,
    ) -> Result<Participant> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let row: Option<(i64, i64, String)> = tx
            .query_row(
                r#"
                SELECT sp.id, p.owner_id, p.name
                FROM shared_plan_participants sp
                JOIN shared_plans p ON p.id = sp.plan_id
                WHERE sp.plan_id = ? AND sp.is_owner = 0 AND sp.status = 'invited'
                  AND (sp.user_id = ? OR sp.email = ?)
                "#,
                params![plan_id, user.id, user.email],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let (participant_id, owner_id, plan_name) =
            row.ok_or_else(|| Error::NotFound(format!("Invitation for shared plan {}", plan_id)))?;

        let status = if accept {
            ParticipantStatus::Accepted
        } else {
            ParticipantStatus::Declined
        };
        let joined_at = accept.then(|| format_datetime(&Utc::now()));

        tx.execute(
            "UPDATE shared_plan_participants SET status = ?, user_id = ?, joined_at = ? WHERE id = ?",
            params![status.as_str(), user.id, joined_at, participant_id],
        )?;

        insert_notification(
            &tx,
            owner_id,
            "shared_plan_response",
            "Shared plan invitation answered",
            &format!("{} {} your invitation to \"{}\"", user.name, status, plan_name),
            Some(plan_id),
        )?;

        let participant = Self::get_participant(&tx, participant_id)?;
        tx.commit()?;
        Ok(participant)
    }

    /// Remove a participant (owner only, never the owner row)
    pub fn remove_participant(&self, owner_id: i64, plan_id: i64, participant_id: i64) -> Result<()> {
        let conn = self.conn()?;
        Self::owned_plan(&conn, owner_id, plan_id)?;

        let is_owner: Option<bool> = conn
            .query_row(
                "SELECT is_owner FROM shared_plan_participants WHERE id = ? AND plan_id = ?",
                params![participant_id, plan_id],
                |row| row.get(0),
            )
            .optional()?;

        match is_owner {
            None => Err(Error::NotFound(format!("Participant {}", participant_id))),
            Some(true) => Err(Error::Validation(
                "The plan owner cannot be removed".to_string(),
            )),
            Some(false) => {
                conn.execute(
                    "DELETE FROM shared_plan_participants WHERE id = ? AND plan_id = ?",
                    params![participant_id, plan_id],
                )?;
                Ok(())
            }
        }
    }

    /// Delete a plan (owner only)
    pub fn delete_shared_plan(&self, owner_id: i64, plan_id: i64) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "DELETE FROM shared_plans WHERE id = ? AND owner_id = ?",
            params![plan_id, owner_id],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("Shared plan {}", plan_id)));
        }
        Ok(())
    }

    fn owned_plan(conn: &Connection, owner_id: i64, plan_id: i64) -> Result<SharedPlan> {
        conn.query_row(
            &format!(
                "SELECT {} FROM shared_plans p WHERE p.id = ? AND p.owner_id = ?",
                PLAN_COLUMNS
            ),
            params![plan_id, owner_id],
            Self::row_to_shared_plan,
        )
        .optional()?
        .ok_or_else(|| Error::NotFound(format!("Shared plan {}", plan_id)))
    }

    fn load_plan(conn: &Connection, plan_id: i64) -> Result<Option<SharedPlanWithParticipants>> {
        let plan = conn
            .query_row(
                &format!("SELECT {} FROM shared_plans p WHERE p.id = ?", PLAN_COLUMNS),
                params![plan_id],
                Self::row_to_shared_plan,
            )
            .optional()?;

        match plan {
            Some(plan) => {
                let participants = Self::load_participants(conn, plan.id)?;
                Ok(Some(SharedPlanWithParticipants { plan, participants }))
            }
            None => Ok(None),
        }
    }

    fn load_participants(conn: &Connection, plan_id: i64) -> Result<Vec<Participant>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM shared_plan_participants WHERE plan_id = ? ORDER BY is_owner DESC, id",
            PARTICIPANT_COLUMNS
        ))?;
        let participants = stmt
            .query_map(params![plan_id], Self::row_to_participant)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(participants)
    }

    fn get_participant(conn: &Connection, id: i64) -> Result<Participant> {
        conn.query_row(
            &format!(
                "SELECT {} FROM shared_plan_participants WHERE id = ?",
                PARTICIPANT_COLUMNS
            ),
            params![id],
            Self::row_to_participant,
        )
        .optional()?
        .ok_or_else(|| Error::NotFound(format!("Participant {}", id)))
    }

    fn row_to_shared_plan(row: &rusqlite::Row) -> rusqlite::Result<SharedPlan> {
        let cycle: String = row.get(7)?;
        let split: String = row.get(8)?;
        let created_at: String = row.get(9)?;
        Ok(SharedPlan {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            subscription_id: row.get(2)?,
            name: row.get(3)?,
            description: row.get(4)?,
            total_amount: row.get(5)?,
            currency: row.get(6)?,
            billing_cycle: BillingCycle::parse_or_default(Some(&cycle)),
            split_type: split.parse().unwrap_or_default(),
            created_at: parse_datetime(&created_at),
        })
    }

    fn row_to_participant(row: &rusqlite::Row) -> rusqlite::Result<Participant> {
        let status: String = row.get(5)?;
        let joined_at: Option<String> = row.get(8)?;
        let created_at: String = row.get(9)?;
        Ok(Participant {
            id: row.get(0)?,
            plan_id: row.get(1)?,
            user_id: row.get(2)?,
            email: row.get(3)?,
            name: row.get(4)?,
            status: status.parse().unwrap_or(ParticipantStatus::Invited),
            split_amount: row.get(6)?,
            is_owner: row.get(7)?,
            joined_at: joined_at.map(|s| parse_datetime(&s)),
            created_at: parse_datetime(&created_at),
        })
    }
}
