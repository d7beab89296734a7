//! Account listing

use anyhow::Result;
use subtrack_core::db::Database;
use subtrack_core::models::SubscriptionFilter;

use super::truncate;

pub fn cmd_users(db: &Database) -> Result<()> {
    let users = db.list_users()?;

    if users.is_empty() {
        println!("No accounts yet. Register through the API: POST /api/auth/register");
        return Ok(());
    }

    println!();
    println!("👤 Accounts");
    println!("   ─────────────────────────────────────────────────────────────");

    for user in users {
        let subscriptions = db.list_subscriptions(user.id, &SubscriptionFilter::default())?;
        let budget = user
            .monthly_budget
            .map(|b| format!("{:.2}", b))
            .unwrap_or_else(|| "-".to_string());

        println!(
            "   #{:<4} {:28} │ {:20} │ {} │ {:>3} subs │ budget {}",
            user.id,
            truncate(&user.email, 28),
            truncate(&user.name, 20),
            user.currency,
            subscriptions.len(),
            budget
        );
    }

    Ok(())
}
