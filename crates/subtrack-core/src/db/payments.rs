//! Payment operations
//!
//! Recording a completed payment is the only place a subscription's billing
//! date moves. `total_payments` and `payment_count` only ever count
//! completed payments, so they agree with the analytics figures.

use chrono::{NaiveDate, Utc};
use rusqlite::{params, OptionalExtension};
use tracing::debug;

use super::subscriptions::SUBSCRIPTION_COLUMNS;
use super::{format_datetime, parse_datetime, Database};
use crate::billing::next_billing_date;
use crate::error::{Error, Result};
use crate::models::{
    NewPayment, Payment, PaymentFilter, PaymentRecorded, PaymentStatus, SubscriptionStatus,
};

const PAYMENT_COLUMNS: &str = "id, subscription_id, user_id, amount, currency, payment_method, status, paid_at, notes, created_at";

impl Database {
    /// Record a payment and advance the subscription's billing dates
    ///
    /// Runs in one transaction: inserts the payment and, when it is
    /// completed, moves `next_billing_date` one cycle forward from its
    /// current value (or from the paid date when unset), sets
    /// `last_billing_date` to the paid date and bumps the running totals.
    /// Pending and failed payments leave the subscription untouched.
    /// Cancelled subscriptions are rejected.
    pub fn record_payment(
        &self,
        user_id: i64,
        subscription_id: i64,
        payment: &NewPayment,
    ) -> Result<PaymentRecorded> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let sql = format!(
            "SELECT {} FROM subscriptions WHERE id = ? AND user_id = ?",
            SUBSCRIPTION_COLUMNS
        );
        let sub = tx
            .query_row(
                &sql,
                params![subscription_id, user_id],
                Self::row_to_subscription,
            )
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("Subscription {}", subscription_id)))?;

        if sub.status == SubscriptionStatus::Cancelled {
            return Err(Error::Validation(format!(
                "Subscription {} is cancelled; payments cannot be recorded",
                subscription_id
            )));
        }

        let amount = payment.amount.unwrap_or(sub.amount);
        if amount < 0.0 || !amount.is_finite() {
            return Err(Error::Validation(
                "Amount must be a non-negative number".to_string(),
            ));
        }
        let currency = payment
            .currency
            .as_ref()
            .map(|c| c.to_uppercase())
            .unwrap_or_else(|| sub.currency.clone());
        let paid_at = payment.paid_at.unwrap_or_else(Utc::now);
        let paid_date = paid_at.date_naive();

        tx.execute(
            r#"
            INSERT INTO payments (subscription_id, user_id, amount, currency, payment_method, status, paid_at, notes)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                subscription_id,
                user_id,
                amount,
                currency,
                payment
                    .payment_method
                    .as_ref()
                    .or(sub.payment_method.as_ref()),
                payment.status.as_str(),
                format_datetime(&paid_at),
                payment.notes,
            ],
        )?;
        let payment_id = tx.last_insert_rowid();

        let mut next = sub.next_billing_date;
        if payment.status == PaymentStatus::Completed {
            let reference = sub.next_billing_date.unwrap_or(paid_date);
            let advanced = next_billing_date(sub.billing_cycle, reference)?;
            tx.execute(
                r#"
                UPDATE subscriptions
                SET next_billing_date = ?,
                    last_billing_date = ?,
                    total_payments = total_payments + ?,
                    payment_count = payment_count + 1,
                    updated_at = CURRENT_TIMESTAMP
                WHERE id = ? AND user_id = ?
                "#,
                params![
                    advanced.to_string(),
                    paid_date.to_string(),
                    amount,
                    subscription_id,
                    user_id
                ],
            )?;
            next = Some(advanced);
        }

        let recorded_payment = tx.query_row(
            &format!("SELECT {} FROM payments WHERE id = ?", PAYMENT_COLUMNS),
            params![payment_id],
            Self::row_to_payment,
        )?;
        let subscription = tx.query_row(&sql, params![subscription_id, user_id], Self::row_to_subscription)?;

        tx.commit()?;

        debug!(
            subscription_id,
            payment_id,
            status = %payment.status,
            next_billing_date = ?next,
            "Recorded payment"
        );

        Ok(PaymentRecorded {
            payment: recorded_payment,
            subscription,
        })
    }

    /// List a user's payments, newest first
    pub fn list_payments(&self, user_id: i64, filter: &PaymentFilter) -> Result<Vec<Payment>> {
        let conn = self.conn()?;

        let mut sql = format!("SELECT {} FROM payments WHERE user_id = ?", PAYMENT_COLUMNS);
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(user_id)];

        if let Some(sub_id) = filter.subscription_id {
            sql.push_str(" AND subscription_id = ?");
            params_vec.push(Box::new(sub_id));
        }
        if let Some(status) = filter.status {
            sql.push_str(" AND status = ?");
            params_vec.push(Box::new(status.as_str()));
        }
        sql.push_str(" ORDER BY paid_at DESC, id DESC LIMIT ? OFFSET ?");
        let limit = if filter.limit > 0 { filter.limit } else { 100 };
        params_vec.push(Box::new(limit));
        params_vec.push(Box::new(filter.offset.max(0)));

        let mut stmt = conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();

        let payments = stmt
            .query_map(params_refs.as_slice(), Self::row_to_payment)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(payments)
    }

    /// Get a single payment, scoped to its owner
    pub fn get_payment(&self, user_id: i64, id: i64) -> Result<Option<Payment>> {
        let conn = self.conn()?;
        let payment = conn
            .query_row(
                &format!(
                    "SELECT {} FROM payments WHERE id = ? AND user_id = ?",
                    PAYMENT_COLUMNS
                ),
                params![id, user_id],
                Self::row_to_payment,
            )
            .optional()?;
        Ok(payment)
    }

    /// Change a payment's status, the only mutation allowed on a recorded payment
    ///
    /// Moving a payment into or out of `completed` adjusts the subscription's
    /// running totals in the same transaction. Billing dates stay put.
    pub fn update_payment_status(
        &self,
        user_id: i64,
        id: i64,
        status: PaymentStatus,
    ) -> Result<Payment> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let select = format!(
            "SELECT {} FROM payments WHERE id = ? AND user_id = ?",
            PAYMENT_COLUMNS
        );
        let current = tx
            .query_row(&select, params![id, user_id], Self::row_to_payment)
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("Payment {}", id)))?;

        tx.execute(
            "UPDATE payments SET status = ? WHERE id = ? AND user_id = ?",
            params![status.as_str(), id, user_id],
        )?;

        let was_completed = current.status == PaymentStatus::Completed;
        let is_completed = status == PaymentStatus::Completed;
        if was_completed != is_completed {
            let (amount, count) = if is_completed {
                (current.amount, 1)
            } else {
                (-current.amount, -1)
            };
            tx.execute(
                r#"
                UPDATE subscriptions
                SET total_payments = MAX(total_payments + ?, 0),
                    payment_count = MAX(payment_count + ?, 0),
                    updated_at = CURRENT_TIMESTAMP
                WHERE id = ? AND user_id = ?
                "#,
                params![amount, count, current.subscription_id, user_id],
            )?;
        }

        let updated = tx.query_row(&select, params![id, user_id], Self::row_to_payment)?;
        tx.commit()?;

        debug!(payment_id = id, from = %current.status, to = %status, "Payment status changed");
        Ok(updated)
    }

    /// All of a user's payments with `paid_at` on or after `since`, oldest first
    pub fn list_payments_since(&self, user_id: i64, since: NaiveDate) -> Result<Vec<Payment>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM payments WHERE user_id = ? AND paid_at >= ? ORDER BY paid_at, id",
            PAYMENT_COLUMNS
        ))?;
        let payments = stmt
            .query_map(
                params![user_id, format!("{} 00:00:00", since)],
                Self::row_to_payment,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(payments)
    }

    fn row_to_payment(row: &rusqlite::Row) -> rusqlite::Result<Payment> {
        let status_str: String = row.get(6)?;
        let paid_at: String = row.get(7)?;
        let created_at: String = row.get(9)?;
        Ok(Payment {
            id: row.get(0)?,
            subscription_id: row.get(1)?,
            user_id: row.get(2)?,
            amount: row.get(3)?,
            currency: row.get(4)?,
            payment_method: row.get(5)?,
            status: status_str.parse().unwrap_or_default(),
            paid_at: parse_datetime(&paid_at),
            notes: row.get(8)?,
            created_at: parse_datetime(&created_at),
        })
    }
}
