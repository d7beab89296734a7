//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `users` - Accounts, credentials and profile data
//! - `subscriptions` - Subscription CRUD and status changes
//! - `payments` - Payment recording and billing-date advancement
//! - `shared_plans` - Shared plans, participants and invitations
//! - `notifications` - In-app notifications
//! - `insights` - Persisted AI insights
//! - `budget` - Monthly budget reports
//!
//! Every query on user-owned rows is scoped by `user_id` in SQL.

use chrono::{DateTime, NaiveDate, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use tracing::info;

use crate::error::Result;

mod budget;
mod insights;
mod notifications;
mod payments;
mod shared_plans;
mod subscriptions;
mod users;

pub use budget::validate_month;
pub use shared_plans::equal_split;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Timestamp format used for all DATETIME columns (matches CURRENT_TIMESTAMP)
pub(crate) const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse a SQLite datetime string into a DateTime<Utc>
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    chrono::NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

/// Format a timestamp for storage
pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format(DATETIME_FORMAT).to_string()
}

/// Parse a stored `YYYY-MM-DD` date
pub(crate) fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
}

impl Database {
    /// Open (or create) a database file and apply migrations
    pub fn new(path: &str) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            // foreign_keys is per-connection in SQLite
            conn.execute_batch("PRAGMA foreign_keys = ON;")
        });

        let pool = Pool::builder().max_size(10).build(manager)?;

        let db = Self {
            pool,
            db_path: path.to_string(),
        };
        db.run_migrations()?;

        Ok(db)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Create a throwaway database (for testing)
    ///
    /// Uses a temporary file rather than `:memory:` so every pooled
    /// connection sees the same data.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir()
            .join(format!("subtrack_test_{}_{}.db", std::process::id(), id));

        // Remove any existing file
        let _ = std::fs::remove_file(&path);

        Self::new(&path.to_string_lossy())
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            -- WAL mode: readers don't block writers
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;

            -- Users
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                email TEXT NOT NULL UNIQUE COLLATE NOCASE,
                password_hash TEXT NOT NULL,
                name TEXT NOT NULL,
                country TEXT,
                currency TEXT NOT NULL DEFAULT 'USD',
                avatar_url TEXT,
                monthly_budget REAL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            -- Subscriptions (user-entered recurring services)
            CREATE TABLE IF NOT EXISTS subscriptions (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                description TEXT,
                category TEXT,
                amount REAL NOT NULL,
                currency TEXT NOT NULL DEFAULT 'USD',
                billing_cycle TEXT NOT NULL DEFAULT 'monthly',  -- daily, weekly, monthly, quarterly, yearly
                start_date DATE NOT NULL,
                next_billing_date DATE,
                last_billing_date DATE,
                status TEXT NOT NULL DEFAULT 'active',          -- active, paused, cancelled
                auto_renew BOOLEAN NOT NULL DEFAULT 1,
                payment_method TEXT,
                website_url TEXT,
                notes TEXT,
                reminder_days INTEGER NOT NULL DEFAULT 3,
                total_payments REAL NOT NULL DEFAULT 0,
                payment_count INTEGER NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_subscriptions_user ON subscriptions(user_id, status);
            CREATE INDEX IF NOT EXISTS idx_subscriptions_next ON subscriptions(next_billing_date);

            -- Payments (append-only apart from status)
            CREATE TABLE IF NOT EXISTS payments (
                id INTEGER PRIMARY KEY,
                subscription_id INTEGER NOT NULL REFERENCES subscriptions(id) ON DELETE CASCADE,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                amount REAL NOT NULL,
                currency TEXT NOT NULL,
                payment_method TEXT,
                status TEXT NOT NULL DEFAULT 'completed',       -- completed, pending, failed, refunded
                paid_at DATETIME NOT NULL,
                notes TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_payments_user ON payments(user_id, paid_at);
            CREATE INDEX IF NOT EXISTS idx_payments_subscription ON payments(subscription_id);

            -- Shared plans
            CREATE TABLE IF NOT EXISTS shared_plans (
                id INTEGER PRIMARY KEY,
                owner_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                subscription_id INTEGER REFERENCES subscriptions(id) ON DELETE SET NULL,
                name TEXT NOT NULL,
                description TEXT,
                total_amount REAL NOT NULL,
                currency TEXT NOT NULL DEFAULT 'USD',
                billing_cycle TEXT NOT NULL DEFAULT 'monthly',
                split_type TEXT NOT NULL DEFAULT 'equal',       -- equal, custom, percentage
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_shared_plans_owner ON shared_plans(owner_id);

            CREATE TABLE IF NOT EXISTS shared_plan_participants (
                id INTEGER PRIMARY KEY,
                plan_id INTEGER NOT NULL REFERENCES shared_plans(id) ON DELETE CASCADE,
                user_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
                email TEXT NOT NULL COLLATE NOCASE,
                name TEXT,
                status TEXT NOT NULL DEFAULT 'invited',         -- invited, accepted, declined
                split_amount REAL NOT NULL DEFAULT 0,
                is_owner BOOLEAN NOT NULL DEFAULT 0,
                joined_at DATETIME,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(plan_id, email)
            );

            CREATE INDEX IF NOT EXISTS idx_participants_user ON shared_plan_participants(user_id);

            -- Notifications
            CREATE TABLE IF NOT EXISTS notifications (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                kind TEXT NOT NULL,
                title TEXT NOT NULL,
                message TEXT NOT NULL,
                related_id INTEGER,
                is_read BOOLEAN NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id, is_read);

            -- AI insights
            CREATE TABLE IF NOT EXISTS ai_insights (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                insight_type TEXT NOT NULL,                     -- saving, warning, suggestion, reminder, trend
                message TEXT NOT NULL,
                affected_services TEXT NOT NULL DEFAULT '[]',   -- JSON array of names
                confidence_score REAL NOT NULL DEFAULT 0.7,
                is_resolved BOOLEAN NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                resolved_at DATETIME
            );

            CREATE INDEX IF NOT EXISTS idx_ai_insights_user ON ai_insights(user_id, is_resolved);

            -- Budget reports (one per user and month)
            CREATE TABLE IF NOT EXISTS budget_reports (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                month TEXT NOT NULL,                            -- YYYY-MM
                budget REAL,
                total_spent REAL NOT NULL DEFAULT 0,
                expected_spend REAL NOT NULL DEFAULT 0,
                currency TEXT NOT NULL DEFAULT 'USD',
                subscription_count INTEGER NOT NULL DEFAULT 0,
                category_breakdown TEXT NOT NULL DEFAULT '[]',  -- JSON array of CategorySpending
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(user_id, month)
            );
            "#,
        )?;

        info!("Database schema initialized");
        Ok(())
    }
}
