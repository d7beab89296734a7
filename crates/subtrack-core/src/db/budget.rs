//! Budget report operations

use rusqlite::{params, OptionalExtension};

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{BudgetReport, NewBudgetReport};

const REPORT_COLUMNS: &str = "id, user_id, month, budget, total_spent, expected_spend, currency, subscription_count, category_breakdown, created_at, updated_at";

/// Check a `YYYY-MM` month key
pub fn validate_month(month: &str) -> Result<()> {
    let valid = month.len() == 7
        && chrono::NaiveDate::parse_from_str(&format!("{}-01", month), "%Y-%m-%d").is_ok();
    if valid {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "Invalid month '{}', expected YYYY-MM",
            month
        )))
    }
}

impl Database {
    /// Insert or replace the report for `(user_id, month)`
    pub fn upsert_budget_report(&self, user_id: i64, report: &NewBudgetReport) -> Result<BudgetReport> {
        validate_month(&report.month)?;
        let breakdown = serde_json::to_string(&report.category_breakdown)?;

        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO budget_reports (
                user_id, month, budget, total_spent, expected_spend, currency,
                subscription_count, category_breakdown
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id, month) DO UPDATE SET
                budget = excluded.budget,
                total_spent = excluded.total_spent,
                expected_spend = excluded.expected_spend,
                currency = excluded.currency,
                subscription_count = excluded.subscription_count,
                category_breakdown = excluded.category_breakdown,
                updated_at = CURRENT_TIMESTAMP
            "#,
            params![
                user_id,
                report.month,
                report.budget,
                report.total_spent,
                report.expected_spend,
                report.currency,
                report.subscription_count,
                breakdown
            ],
        )?;
        drop(conn);

        self.get_budget_report(user_id, &report.month)?
            .ok_or_else(|| Error::NotFound(format!("Budget report {}", report.month)))
    }

    /// List a user's reports, most recent month first
    pub fn list_budget_reports(&self, user_id: i64) -> Result<Vec<BudgetReport>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM budget_reports WHERE user_id = ? ORDER BY month DESC",
            REPORT_COLUMNS
        ))?;
        let reports = stmt
            .query_map(params![user_id], Self::row_to_budget_report)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(reports)
    }

    pub fn get_budget_report(&self, user_id: i64, month: &str) -> Result<Option<BudgetReport>> {
        let conn = self.conn()?;
        let report = conn
            .query_row(
                &format!(
                    "SELECT {} FROM budget_reports WHERE user_id = ? AND month = ?",
                    REPORT_COLUMNS
                ),
                params![user_id, month],
                Self::row_to_budget_report,
            )
            .optional()?;
        Ok(report)
    }

    fn row_to_budget_report(row: &rusqlite::Row) -> rusqlite::Result<BudgetReport> {
        let breakdown: String = row.get(8)?;
        let created_at: String = row.get(9)?;
        let updated_at: String = row.get(10)?;
        Ok(BudgetReport {
            id: row.get(0)?,
            user_id: row.get(1)?,
            month: row.get(2)?,
            budget: row.get(3)?,
            total_spent: row.get(4)?,
            expected_spend: row.get(5)?,
            currency: row.get(6)?,
            subscription_count: row.get(7)?,
            category_breakdown: serde_json::from_str(&breakdown).unwrap_or_default(),
            created_at: parse_datetime(&created_at),
            updated_at: parse_datetime(&updated_at),
        })
    }
}
