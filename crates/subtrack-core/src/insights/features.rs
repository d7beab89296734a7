//! Feature summary: the facts the insight generator reasons over
//!
//! The same summary feeds the AI prompt (serialized as JSON) and the
//! heuristic rules, so both paths see identical numbers.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::Serialize;

use crate::billing::{monthly_equivalent, round_currency};
use crate::models::{
    BillingCycle, Payment, PaymentStatus, Subscription, SubscriptionStatus, User,
};

/// Relative difference between current amount and payment average that counts as a price change
pub const PRICE_CHANGE_THRESHOLD: f64 = 0.15;

/// Days without a payment after which an auto-renewing subscription looks unused
pub const LOW_USAGE_DAYS: i64 = 45;

/// Days ahead (inclusive) that count as "due soon"
pub const DUE_SOON_DAYS: i64 = 7;

/// Monthly cost above which a subscription counts as expensive, per currency
pub fn expensive_threshold(currency: &str) -> f64 {
    match currency.to_uppercase().as_str() {
        "USD" => 50.0,
        "EUR" => 45.0,
        "GBP" => 40.0,
        "CAD" => 65.0,
        "AUD" => 75.0,
        "INR" => 2000.0,
        "JPY" => 7000.0,
        _ => 50.0,
    }
}

/// One subscription with derived statistics
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionFeatures {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub amount: f64,
    pub currency: String,
    pub billing_cycle: BillingCycle,
    pub status: SubscriptionStatus,
    pub auto_renew: bool,
    pub monthly_cost: f64,
    pub payment_count: usize,
    pub average_payment: Option<f64>,
    pub days_since_last_payment: Option<i64>,
    pub days_until_due: Option<i64>,
    #[serde(skip)]
    notes: Option<String>,
    #[serde(skip)]
    start_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
pub struct PriceChange {
    pub name: String,
    pub current_amount: f64,
    pub average_amount: f64,
    pub currency: String,
    /// Signed change relative to the average, in percent
    pub change_percent: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LowUsage {
    pub name: String,
    pub days_inactive: i64,
    pub monthly_cost: f64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DueSoon {
    pub name: String,
    pub days_until_due: i64,
    pub amount: f64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Expensive {
    pub name: String,
    pub monthly_cost: f64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Overlap {
    pub category: String,
    pub services: Vec<String>,
    pub combined_monthly_cost: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryTotal {
    pub category: String,
    pub monthly_total: f64,
    pub count: usize,
}

/// Everything the generator knows about a user's subscriptions
#[derive(Debug, Clone, Serialize)]
pub struct FeatureSummary {
    pub currency: String,
    pub today: NaiveDate,
    pub monthly_budget: Option<f64>,
    /// Monthly cost of active subscriptions in `currency`
    pub total_monthly_spend: f64,
    pub active_count: usize,
    pub paused_count: usize,
    pub subscriptions: Vec<SubscriptionFeatures>,
    pub price_changes: Vec<PriceChange>,
    pub low_usage: Vec<LowUsage>,
    pub due_soon: Vec<DueSoon>,
    pub free_trials: Vec<String>,
    pub expensive: Vec<Expensive>,
    pub overlaps: Vec<Overlap>,
    /// Sorted by monthly total, largest first
    pub category_totals: Vec<CategoryTotal>,
}

impl FeatureSummary {
    /// Build the summary from a user's subscriptions and payment history
    ///
    /// Cancelled subscriptions are ignored. Only completed payments count
    /// toward averages and recency.
    pub fn build(
        user: &User,
        subscriptions: &[Subscription],
        payments: &[Payment],
        today: NaiveDate,
    ) -> Self {
        let currency = user.currency.to_uppercase();

        let mut paid: HashMap<i64, Vec<&Payment>> = HashMap::new();
        for payment in payments
            .iter()
            .filter(|p| p.status == PaymentStatus::Completed)
        {
            paid.entry(payment.subscription_id).or_default().push(payment);
        }

        let features: Vec<SubscriptionFeatures> = subscriptions
            .iter()
            .filter(|s| s.status != SubscriptionStatus::Cancelled)
            .map(|s| {
                let history = paid.get(&s.id).map(Vec::as_slice).unwrap_or(&[]);
                let average_payment = if history.is_empty() {
                    None
                } else {
                    Some(history.iter().map(|p| p.amount).sum::<f64>() / history.len() as f64)
                };
                let last_paid = history.iter().map(|p| p.paid_at.date_naive()).max();

                SubscriptionFeatures {
                    id: s.id,
                    name: s.name.clone(),
                    category: s
                        .category
                        .clone()
                        .filter(|c| !c.trim().is_empty())
                        .unwrap_or_else(|| "Other".to_string()),
                    amount: s.amount,
                    currency: s.currency.to_uppercase(),
                    billing_cycle: s.billing_cycle,
                    status: s.status,
                    auto_renew: s.auto_renew,
                    monthly_cost: round_currency(monthly_equivalent(s.amount, s.billing_cycle)),
                    payment_count: history.len(),
                    average_payment: average_payment.map(round_currency),
                    days_since_last_payment: last_paid.map(|d| (today - d).num_days()),
                    days_until_due: s.next_billing_date.map(|d| (d - today).num_days()),
                    notes: s.notes.clone(),
                    start_date: s.start_date,
                }
            })
            .collect();

        let active: Vec<&SubscriptionFeatures> = features
            .iter()
            .filter(|f| f.status == SubscriptionStatus::Active)
            .collect();
        let in_currency = |f: &&&SubscriptionFeatures| f.currency == currency;

        let price_changes = features
            .iter()
            .filter_map(|f| {
                let avg = f.average_payment?;
                if avg <= 0.0 {
                    return None;
                }
                let change = (f.amount - avg) / avg;
                (change.abs() > PRICE_CHANGE_THRESHOLD).then(|| PriceChange {
                    name: f.name.clone(),
                    current_amount: f.amount,
                    average_amount: avg,
                    currency: f.currency.clone(),
                    change_percent: round_currency(change * 100.0),
                })
            })
            .collect();

        let low_usage = active
            .iter()
            .filter(|f| f.auto_renew)
            .filter_map(|f| {
                let days_inactive = f
                    .days_since_last_payment
                    .unwrap_or_else(|| (today - f.start_date).num_days());
                (days_inactive > LOW_USAGE_DAYS).then(|| LowUsage {
                    name: f.name.clone(),
                    days_inactive,
                    monthly_cost: f.monthly_cost,
                    currency: f.currency.clone(),
                })
            })
            .collect();

        let mut due_soon: Vec<DueSoon> = active
            .iter()
            .filter_map(|f| {
                let days = f.days_until_due?;
                (0..=DUE_SOON_DAYS).contains(&days).then(|| DueSoon {
                    name: f.name.clone(),
                    days_until_due: days,
                    amount: f.amount,
                    currency: f.currency.clone(),
                })
            })
            .collect();
        due_soon.sort_by_key(|d| d.days_until_due);

        let free_trials = features
            .iter()
            .filter(|f| {
                f.amount == 0.0
                    || f.name.to_lowercase().contains("trial")
                    || f.notes
                        .as_deref()
                        .is_some_and(|n| n.to_lowercase().contains("trial"))
            })
            .map(|f| f.name.clone())
            .collect();

        let mut expensive: Vec<Expensive> = active
            .iter()
            .filter(|f| f.monthly_cost > expensive_threshold(&f.currency))
            .map(|f| Expensive {
                name: f.name.clone(),
                monthly_cost: f.monthly_cost,
                currency: f.currency.clone(),
            })
            .collect();
        expensive.sort_by(|a, b| {
            b.monthly_cost
                .partial_cmp(&a.monthly_cost)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        // BTreeMap keeps category order stable for prompts and tests
        let mut by_category: BTreeMap<String, Vec<&SubscriptionFeatures>> = BTreeMap::new();
        for f in active.iter().filter(in_currency) {
            by_category.entry(f.category.clone()).or_default().push(*f);
        }

        let overlaps = by_category
            .iter()
            .filter(|(_, subs)| subs.len() >= 2)
            .map(|(category, subs)| Overlap {
                category: category.clone(),
                services: subs.iter().map(|f| f.name.clone()).collect(),
                combined_monthly_cost: round_currency(subs.iter().map(|f| f.monthly_cost).sum()),
            })
            .collect();

        let mut category_totals: Vec<CategoryTotal> = by_category
            .iter()
            .map(|(category, subs)| CategoryTotal {
                category: category.clone(),
                monthly_total: round_currency(subs.iter().map(|f| f.monthly_cost).sum()),
                count: subs.len(),
            })
            .collect();
        category_totals.sort_by(|a, b| {
            b.monthly_total
                .partial_cmp(&a.monthly_total)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let total_monthly_spend = round_currency(
            active
                .iter()
                .filter(in_currency)
                .map(|f| f.monthly_cost)
                .sum(),
        );

        Self {
            currency,
            today,
            monthly_budget: user.monthly_budget,
            total_monthly_spend,
            active_count: active.len(),
            paused_count: features
                .iter()
                .filter(|f| f.status == SubscriptionStatus::Paused)
                .count(),
            price_changes,
            low_usage,
            due_soon,
            free_trials,
            expensive,
            overlaps,
            category_totals,
            subscriptions: features,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn user() -> User {
        User {
            id: 1,
            email: "a@example.com".to_string(),
            name: "A".to_string(),
            country: None,
            currency: "USD".to_string(),
            avatar_url: None,
            monthly_budget: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn sub(id: i64, name: &str, amount: f64, category: &str) -> Subscription {
        Subscription {
            id,
            user_id: 1,
            name: name.to_string(),
            description: None,
            category: Some(category.to_string()),
            amount,
            currency: "USD".to_string(),
            billing_cycle: BillingCycle::Monthly,
            start_date: date(2024, 1, 1),
            next_billing_date: None,
            last_billing_date: None,
            status: SubscriptionStatus::Active,
            auto_renew: true,
            payment_method: None,
            website_url: None,
            notes: None,
            reminder_days: 3,
            total_payments: 0.0,
            payment_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn paid(sub_id: i64, amount: f64, day: NaiveDate) -> Payment {
        Payment {
            id: 0,
            subscription_id: sub_id,
            user_id: 1,
            amount,
            currency: "USD".to_string(),
            payment_method: None,
            status: PaymentStatus::Completed,
            paid_at: Utc.from_utc_datetime(&day.and_hms_opt(9, 0, 0).unwrap()),
            notes: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_expensive_thresholds() {
        assert_eq!(expensive_threshold("usd"), 50.0);
        assert_eq!(expensive_threshold("JPY"), 7000.0);
        assert_eq!(expensive_threshold("CHF"), 50.0);
    }

    #[test]
    fn test_overlaps_and_category_totals() {
        let today = date(2024, 6, 1);
        let subs = vec![
            sub(1, "Netflix", 15.0, "Streaming"),
            sub(2, "Hulu", 10.0, "Streaming"),
            sub(3, "Spotify", 11.0, "Music"),
        ];
        let summary = FeatureSummary::build(&user(), &subs, &[], today);

        assert_eq!(summary.overlaps.len(), 1);
        assert_eq!(summary.overlaps[0].category, "Streaming");
        assert_eq!(summary.overlaps[0].combined_monthly_cost, 25.0);
        assert_eq!(summary.category_totals[0].category, "Streaming");
        assert_eq!(summary.total_monthly_spend, 36.0);
        assert_eq!(summary.active_count, 3);
    }

    #[test]
    fn test_price_change_detection() {
        let today = date(2024, 6, 1);
        let subs = vec![sub(1, "Netflix", 20.0, "Streaming"), sub(2, "Hulu", 10.0, "Streaming")];
        let payments = vec![
            paid(1, 15.0, date(2024, 4, 1)),
            paid(1, 15.0, date(2024, 5, 1)),
            paid(2, 10.5, date(2024, 5, 20)),
        ];
        let summary = FeatureSummary::build(&user(), &subs, &payments, today);

        assert_eq!(summary.price_changes.len(), 1);
        assert_eq!(summary.price_changes[0].name, "Netflix");
        assert_eq!(summary.price_changes[0].change_percent, 33.33);
    }

    #[test]
    fn test_low_usage_uses_start_date_when_never_paid() {
        let today = date(2024, 6, 1);
        let mut recent = sub(2, "New", 5.0, "Tools");
        recent.start_date = date(2024, 5, 20);
        let mut manual = sub(3, "Manual", 5.0, "Tools");
        manual.auto_renew = false;
        let subs = vec![sub(1, "Old", 5.0, "Tools"), recent, manual];
        let payments = vec![paid(1, 5.0, date(2024, 4, 1))];

        let summary = FeatureSummary::build(&user(), &subs, &payments, today);
        let names: Vec<&str> = summary.low_usage.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["Old"]);
        assert_eq!(summary.low_usage[0].days_inactive, 61);
    }

    #[test]
    fn test_due_soon_window_inclusive() {
        let today = date(2024, 6, 1);
        let mut a = sub(1, "Today", 5.0, "X");
        a.next_billing_date = Some(today);
        let mut b = sub(2, "Seven", 5.0, "Y");
        b.next_billing_date = Some(date(2024, 6, 8));
        let mut c = sub(3, "Eight", 5.0, "Z");
        c.next_billing_date = Some(date(2024, 6, 9));
        let mut d = sub(4, "Overdue", 5.0, "W");
        d.next_billing_date = Some(date(2024, 5, 30));

        let summary = FeatureSummary::build(&user(), &[a, b, c, d], &[], today);
        let names: Vec<&str> = summary.due_soon.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Today", "Seven"]);
    }

    #[test]
    fn test_free_trials_and_expensive() {
        let today = date(2024, 6, 1);
        let mut trial = sub(1, "Audible", 0.0, "Books");
        trial.notes = Some("Free TRIAL until July".to_string());
        let mut yearly = sub(2, "Adobe", 720.0, "Software");
        yearly.billing_cycle = BillingCycle::Yearly;
        let pricey = sub(3, "Cloud", 80.0, "Software");

        let summary = FeatureSummary::build(&user(), &[trial, yearly, pricey], &[], today);
        assert_eq!(summary.free_trials, vec!["Audible"]);
        let names: Vec<&str> = summary.expensive.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Cloud", "Adobe"]);
    }

    #[test]
    fn test_cancelled_ignored() {
        let today = date(2024, 6, 1);
        let mut gone = sub(1, "Gone", 30.0, "Streaming");
        gone.status = SubscriptionStatus::Cancelled;
        let summary = FeatureSummary::build(&user(), &[gone], &[], today);
        assert!(summary.subscriptions.is_empty());
        assert_eq!(summary.total_monthly_spend, 0.0);
    }
}
