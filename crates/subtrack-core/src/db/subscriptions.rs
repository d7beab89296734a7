//! Subscription operations

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension};

use super::{parse_date, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{
    BillingCycle, NewSubscription, Subscription, SubscriptionFilter, SubscriptionStatus,
    SubscriptionUpdate, UpcomingRenewal,
};

pub(crate) const SUBSCRIPTION_COLUMNS: &str = r#"
    id, user_id, name, description, category, amount, currency, billing_cycle,
    start_date, next_billing_date, last_billing_date, status, auto_renew,
    payment_method, website_url, notes, reminder_days, total_payments, payment_count,
    created_at, updated_at
"#;

impl Database {
    /// Create a subscription owned by `user_id`
    pub fn create_subscription(&self, user_id: i64, sub: &NewSubscription) -> Result<Subscription> {
        if sub.amount < 0.0 || !sub.amount.is_finite() {
            return Err(Error::Validation(
                "Amount must be a non-negative number".to_string(),
            ));
        }

        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO subscriptions (
                user_id, name, description, category, amount, currency, billing_cycle,
                start_date, next_billing_date, status, auto_renew, payment_method,
                website_url, notes, reminder_days
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 'active', ?, ?, ?, ?, ?)
            "#,
            params![
                user_id,
                sub.name.trim(),
                sub.description,
                sub.category,
                sub.amount,
                sub.currency.to_uppercase(),
                sub.billing_cycle.as_str(),
                sub.start_date.to_string(),
                sub.next_billing_date.to_string(),
                sub.auto_renew,
                sub.payment_method,
                sub.website_url,
                sub.notes,
                sub.reminder_days,
            ],
        )?;
        let id = conn.last_insert_rowid();
        drop(conn);

        self.get_subscription(user_id, id)?
            .ok_or_else(|| Error::NotFound(format!("Subscription {}", id)))
    }

    /// List a user's subscriptions, soonest billing first
    pub fn list_subscriptions(
        &self,
        user_id: i64,
        filter: &SubscriptionFilter,
    ) -> Result<Vec<Subscription>> {
        let conn = self.conn()?;

        let mut sql = format!(
            "SELECT {} FROM subscriptions WHERE user_id = ?",
            SUBSCRIPTION_COLUMNS
        );
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(user_id)];

        if let Some(status) = filter.status {
            sql.push_str(" AND status = ?");
            params_vec.push(Box::new(status.as_str()));
        }
        if let Some(ref category) = filter.category {
            sql.push_str(" AND category = ?");
            params_vec.push(Box::new(category.clone()));
        }
        sql.push_str(" ORDER BY next_billing_date IS NULL, next_billing_date, name");

        let mut stmt = conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();

        let subscriptions = stmt
            .query_map(params_refs.as_slice(), Self::row_to_subscription)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(subscriptions)
    }

    /// Get one subscription, scoped to its owner
    pub fn get_subscription(&self, user_id: i64, id: i64) -> Result<Option<Subscription>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM subscriptions WHERE id = ? AND user_id = ?",
            SUBSCRIPTION_COLUMNS
        );
        let sub = conn
            .query_row(&sql, params![id, user_id], Self::row_to_subscription)
            .optional()?;
        Ok(sub)
    }

    /// Apply a partial update to a subscription
    ///
    /// A cancelled subscription keeps its billing schedule: changing its
    /// cycle or next billing date is a validation error.
    pub fn update_subscription(
        &self,
        user_id: i64,
        id: i64,
        update: &SubscriptionUpdate,
    ) -> Result<Subscription> {
        if let Some(amount) = update.amount {
            if amount < 0.0 || !amount.is_finite() {
                return Err(Error::Validation(
                    "Amount must be a non-negative number".to_string(),
                ));
            }
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let status: String = tx
            .query_row(
                "SELECT status FROM subscriptions WHERE id = ? AND user_id = ?",
                params![id, user_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("Subscription {}", id)))?;

        let reschedules = update.billing_cycle.is_some() || update.next_billing_date.is_some();
        if reschedules && status == SubscriptionStatus::Cancelled.as_str() {
            return Err(Error::Validation(format!(
                "Subscription {} is cancelled; its billing schedule cannot change",
                id
            )));
        }

        tx.execute(
            r#"
            UPDATE subscriptions SET
                name = COALESCE(?, name),
                description = COALESCE(?, description),
                category = COALESCE(?, category),
                amount = COALESCE(?, amount),
                currency = COALESCE(?, currency),
                billing_cycle = CASE WHEN status = 'cancelled' THEN billing_cycle
                                     ELSE COALESCE(?, billing_cycle) END,
                next_billing_date = CASE WHEN status = 'cancelled' THEN next_billing_date
                                         ELSE COALESCE(?, next_billing_date) END,
                auto_renew = COALESCE(?, auto_renew),
                payment_method = COALESCE(?, payment_method),
                website_url = COALESCE(?, website_url),
                notes = COALESCE(?, notes),
                reminder_days = COALESCE(?, reminder_days),
                updated_at = CURRENT_TIMESTAMP
            WHERE id = ? AND user_id = ?
            "#,
            params![
                update.name,
                update.description,
                update.category,
                update.amount,
                update.currency.as_ref().map(|c| c.to_uppercase()),
                update.billing_cycle.map(|c| c.as_str()),
                update.next_billing_date.map(|d| d.to_string()),
                update.auto_renew,
                update.payment_method,
                update.website_url,
                update.notes,
                update.reminder_days,
                id,
                user_id,
            ],
        )?;

        let sql = format!(
            "SELECT {} FROM subscriptions WHERE id = ? AND user_id = ?",
            SUBSCRIPTION_COLUMNS
        );
        let updated = tx.query_row(&sql, params![id, user_id], Self::row_to_subscription)?;
        tx.commit()?;
        Ok(updated)
    }

    /// Change a subscription's status (cancel, pause, resume)
    ///
    /// Cancellation is final: a cancelled subscription cannot be paused or resumed.
    pub fn set_subscription_status(
        &self,
        user_id: i64,
        id: i64,
        status: SubscriptionStatus,
    ) -> Result<Subscription> {
        let current = self
            .get_subscription(user_id, id)?
            .ok_or_else(|| Error::NotFound(format!("Subscription {}", id)))?;

        if current.status == SubscriptionStatus::Cancelled && status != SubscriptionStatus::Cancelled
        {
            return Err(Error::Validation(format!(
                "Subscription {} is cancelled and cannot be set to {}",
                id, status
            )));
        }

        let conn = self.conn()?;
        let changed = conn.execute(
            r#"
            UPDATE subscriptions
            SET status = ?,
                auto_renew = CASE WHEN ? = 'cancelled' THEN 0 ELSE auto_renew END,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = ? AND user_id = ?
            "#,
            params![status.as_str(), status.as_str(), id, user_id],
        )?;
        drop(conn);

        if changed == 0 {
            return Err(Error::NotFound(format!("Subscription {}", id)));
        }
        self.get_subscription(user_id, id)?
            .ok_or_else(|| Error::NotFound(format!("Subscription {}", id)))
    }

    /// Delete a subscription (and its payments)
    pub fn delete_subscription(&self, user_id: i64, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "DELETE FROM subscriptions WHERE id = ? AND user_id = ?",
            params![id, user_id],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("Subscription {}", id)));
        }
        Ok(())
    }

    /// Active subscriptions due between `today` and `today + days` inclusive
    pub fn list_upcoming_renewals(
        &self,
        user_id: i64,
        today: NaiveDate,
        days: i64,
    ) -> Result<Vec<UpcomingRenewal>> {
        let until = today + chrono::Duration::days(days.max(0));
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, name, amount, currency, next_billing_date
            FROM subscriptions
            WHERE user_id = ? AND status = 'active'
              AND next_billing_date IS NOT NULL
              AND next_billing_date >= ? AND next_billing_date <= ?
            ORDER BY next_billing_date, name
            "#,
        )?;

        let rows = stmt
            .query_map(
                params![user_id, today.to_string(), until.to_string()],
                |row| {
                    let next: String = row.get(4)?;
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, f64>(2)?,
                        row.get::<_, String>(3)?,
                        next,
                    ))
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows
            .into_iter()
            .filter_map(|(id, name, amount, currency, next)| {
                let next_billing_date = parse_date(&next)?;
                Some(UpcomingRenewal {
                    subscription_id: id,
                    name,
                    amount,
                    currency,
                    next_billing_date,
                    days_until_due: (next_billing_date - today).num_days(),
                })
            })
            .collect())
    }

    pub(crate) fn row_to_subscription(row: &rusqlite::Row) -> rusqlite::Result<Subscription> {
        let cycle_str: String = row.get(7)?;
        let start_str: String = row.get(8)?;
        let next_str: Option<String> = row.get(9)?;
        let last_str: Option<String> = row.get(10)?;
        let status_str: String = row.get(11)?;
        let created_at: String = row.get(19)?;
        let updated_at: String = row.get(20)?;

        Ok(Subscription {
            id: row.get(0)?,
            user_id: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            category: row.get(4)?,
            amount: row.get(5)?,
            currency: row.get(6)?,
            billing_cycle: BillingCycle::parse_or_default(Some(&cycle_str)),
            start_date: parse_date(&start_str).unwrap_or_default(),
            next_billing_date: next_str.as_deref().and_then(parse_date),
            last_billing_date: last_str.as_deref().and_then(parse_date),
            status: status_str.parse().unwrap_or(SubscriptionStatus::Active),
            auto_renew: row.get(12)?,
            payment_method: row.get(13)?,
            website_url: row.get(14)?,
            notes: row.get(15)?,
            reminder_days: row.get(16)?,
            total_payments: row.get(17)?,
            payment_count: row.get(18)?,
            created_at: parse_datetime(&created_at),
            updated_at: parse_datetime(&updated_at),
        })
    }
}
