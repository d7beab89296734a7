//! Spending analytics: period summaries, category breakdowns, trends and budget
//!
//! Two modes are supported everywhere:
//! - `actual` sums completed payments whose date falls in the window
//! - `expected` sums normalized costs of active subscriptions
//!
//! Only rows in the filter currency are counted; there is no conversion.

use std::collections::HashMap;

use chrono::{Datelike, Days, Months, NaiveDate};

use crate::billing::{normalize_amount, round_currency};
use crate::db::{validate_month, Database};
use crate::error::{Error, Result};
use crate::models::{
    AnalyticsMode, AnalyticsPeriod, BudgetStatus, CategorySpending, NewBudgetReport, Payment,
    PaymentStatus, SpendingSummary, Subscription, SubscriptionFilter, SubscriptionStatus,
    TrendPoint, TrendsReport, UpcomingRenewal, User,
};

/// Currency used when neither the request nor the user specifies one
pub const DEFAULT_CURRENCY: &str = "USD";

/// Label for subscriptions without a category
const UNCATEGORIZED: &str = "Other";

/// Pick the filter currency: request parameter, then user preference, then USD
pub fn resolve_currency(requested: Option<&str>, user: Option<&User>) -> String {
    requested
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(|c| c.to_uppercase())
        .or_else(|| {
            user.map(|u| u.currency.trim().to_uppercase())
                .filter(|c| !c.is_empty())
        })
        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string())
}

/// First day of the period containing `today` (Monday, 1st of month, or January 1)
pub fn period_start(period: AnalyticsPeriod, today: NaiveDate) -> NaiveDate {
    match period {
        AnalyticsPeriod::Weekly => {
            today - Days::new(u64::from(today.weekday().num_days_from_monday()))
        }
        AnalyticsPeriod::Monthly => today.with_day(1).unwrap_or(today),
        AnalyticsPeriod::Yearly => NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today),
    }
}

/// A trend bucket: `[start, end]` inclusive
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    pub label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Chronological buckets ending with the one containing `today`
pub fn trend_buckets(period: AnalyticsPeriod, today: NaiveDate) -> Result<Vec<Bucket>> {
    let current = period_start(period, today);
    let count = period.lookback();
    let out_of_range = || Error::InvalidData(format!("Trend window out of range for {}", today));

    (0..count)
        .rev()
        .map(|back| {
            let back = back as u32;
            let (start, next_start) = match period {
                AnalyticsPeriod::Weekly => {
                    let start = current
                        .checked_sub_days(Days::new(7 * u64::from(back)))
                        .ok_or_else(out_of_range)?;
                    (start, start.checked_add_days(Days::new(7)))
                }
                AnalyticsPeriod::Monthly => {
                    let start = current
                        .checked_sub_months(Months::new(back))
                        .ok_or_else(out_of_range)?;
                    (start, start.checked_add_months(Months::new(1)))
                }
                AnalyticsPeriod::Yearly => {
                    let start = current
                        .checked_sub_months(Months::new(12 * back))
                        .ok_or_else(out_of_range)?;
                    (start, start.checked_add_months(Months::new(12)))
                }
            };
            let end = next_start
                .and_then(|d| d.pred_opt())
                .ok_or_else(out_of_range)?;

            let label = match period {
                AnalyticsPeriod::Weekly => start.format("%Y-%m-%d").to_string(),
                AnalyticsPeriod::Monthly => start.format("%Y-%m").to_string(),
                AnalyticsPeriod::Yearly => start.format("%Y").to_string(),
            };
            Ok(Bucket { label, start, end })
        })
        .collect()
}

/// Start and end dates of a `YYYY-MM` month
pub fn month_bounds(month: &str) -> Result<(NaiveDate, NaiveDate)> {
    validate_month(month)?;
    let start = NaiveDate::parse_from_str(&format!("{}-01", month), "%Y-%m-%d")
        .map_err(|e| Error::Validation(format!("Invalid month '{}': {}", month, e)))?;
    let end = start
        .checked_add_months(Months::new(1))
        .and_then(|d| d.pred_opt())
        .ok_or_else(|| Error::InvalidData(format!("Month out of range: {}", month)))?;
    Ok((start, end))
}

fn same_currency(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

fn category_of(sub: &Subscription) -> String {
    sub.category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(UNCATEGORIZED)
        .to_string()
}

/// Group `(category, amount)` pairs, sorted by amount descending
pub fn group_by_category(items: impl IntoIterator<Item = (String, f64)>) -> Vec<CategorySpending> {
    let mut totals: HashMap<String, (f64, i64)> = HashMap::new();
    for (category, amount) in items {
        let entry = totals.entry(category).or_insert((0.0, 0));
        entry.0 += amount;
        entry.1 += 1;
    }

    let grand_total: f64 = totals.values().map(|(amount, _)| amount).sum();
    let mut categories: Vec<CategorySpending> = totals
        .into_iter()
        .map(|(category, (amount, count))| CategorySpending {
            category,
            amount: round_currency(amount),
            count,
            percentage: if grand_total > 0.0 {
                round_currency(amount / grand_total * 100.0)
            } else {
                0.0
            },
        })
        .collect();

    categories.sort_by(|a, b| {
        b.amount
            .partial_cmp(&a.amount)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.category.cmp(&b.category))
    });
    categories
}

/// Active subscriptions in `currency`, as `(category, normalized amount)`
fn expected_items<'a>(
    subscriptions: &'a [Subscription],
    period: AnalyticsPeriod,
    currency: &'a str,
    started_by: Option<NaiveDate>,
) -> impl Iterator<Item = (String, f64)> + 'a {
    subscriptions
        .iter()
        .filter(move |s| s.status == SubscriptionStatus::Active)
        .filter(move |s| same_currency(&s.currency, currency))
        .filter(move |s| started_by.map_or(true, |end| s.start_date <= end))
        .map(move |s| {
            (
                category_of(s),
                normalize_amount(s.amount, s.billing_cycle, period),
            )
        })
}

/// Completed payments in `currency` paid within `[start, end]`, as `(category, amount)`
fn actual_items<'a>(
    payments: &'a [Payment],
    categories: &'a HashMap<i64, String>,
    currency: &'a str,
    start: NaiveDate,
    end: NaiveDate,
) -> impl Iterator<Item = (String, f64)> + 'a {
    payments
        .iter()
        .filter(|p| p.status == PaymentStatus::Completed)
        .filter(move |p| same_currency(&p.currency, currency))
        .filter(move |p| {
            let day = p.paid_at.date_naive();
            day >= start && day <= end
        })
        .map(move |p| {
            (
                categories
                    .get(&p.subscription_id)
                    .cloned()
                    .unwrap_or_else(|| UNCATEGORIZED.to_string()),
                p.amount,
            )
        })
}

/// Sum expected costs of active subscriptions for one period
///
/// With `started_by`, subscriptions starting after that day are left out.
pub fn expected_total(
    subscriptions: &[Subscription],
    period: AnalyticsPeriod,
    currency: &str,
    started_by: Option<NaiveDate>,
) -> f64 {
    expected_items(subscriptions, period, currency, started_by)
        .map(|(_, amount)| amount)
        .sum()
}

/// Build a trend series from already loaded rows
pub fn build_trend_points(
    buckets: &[Bucket],
    mode: AnalyticsMode,
    period: AnalyticsPeriod,
    currency: &str,
    subscriptions: &[Subscription],
    payments: &[Payment],
) -> Vec<TrendPoint> {
    let categories = category_index(subscriptions);
    buckets
        .iter()
        .map(|bucket| {
            let amount: f64 = match mode {
                AnalyticsMode::Actual => {
                    actual_items(payments, &categories, currency, bucket.start, bucket.end)
                        .map(|(_, a)| a)
                        .sum()
                }
                AnalyticsMode::Expected => {
                    expected_total(subscriptions, period, currency, Some(bucket.end))
                }
            };
            TrendPoint {
                label: bucket.label.clone(),
                start: bucket.start,
                end: bucket.end,
                amount: round_currency(amount),
            }
        })
        .collect()
}

fn category_index(subscriptions: &[Subscription]) -> HashMap<i64, String> {
    subscriptions
        .iter()
        .map(|s| (s.id, category_of(s)))
        .collect()
}

fn all_subscriptions(db: &Database, user_id: i64) -> Result<Vec<Subscription>> {
    db.list_subscriptions(user_id, &SubscriptionFilter::default())
}

/// Total spend for the period containing `today`
pub fn spending_summary(
    db: &Database,
    user_id: i64,
    period: AnalyticsPeriod,
    mode: AnalyticsMode,
    currency: &str,
    today: NaiveDate,
) -> Result<SpendingSummary> {
    let window_start = period_start(period, today);
    let subscriptions = all_subscriptions(db, user_id)?;

    let items: Vec<(String, f64)> = match mode {
        AnalyticsMode::Expected => expected_items(&subscriptions, period, currency, None).collect(),
        AnalyticsMode::Actual => {
            let payments = db.list_payments_since(user_id, window_start)?;
            let categories = category_index(&subscriptions);
            actual_items(&payments, &categories, currency, window_start, today).collect()
        }
    };

    let total: f64 = items.iter().map(|(_, amount)| amount).sum();
    let item_count = items.len() as i64;

    Ok(SpendingSummary {
        period,
        mode,
        currency: currency.to_string(),
        window_start,
        window_end: today,
        total: round_currency(total),
        item_count,
        categories: group_by_category(items),
    })
}

/// Spend per category for the period containing `today`
pub fn category_breakdown(
    db: &Database,
    user_id: i64,
    period: AnalyticsPeriod,
    mode: AnalyticsMode,
    currency: &str,
    today: NaiveDate,
) -> Result<Vec<CategorySpending>> {
    Ok(spending_summary(db, user_id, period, mode, currency, today)?.categories)
}

/// Fixed-length spending series ending with the current period
pub fn trends(
    db: &Database,
    user_id: i64,
    period: AnalyticsPeriod,
    mode: AnalyticsMode,
    currency: &str,
    today: NaiveDate,
) -> Result<TrendsReport> {
    let buckets = trend_buckets(period, today)?;
    let subscriptions = all_subscriptions(db, user_id)?;

    let payments = match (mode, buckets.first()) {
        (AnalyticsMode::Actual, Some(first)) => db.list_payments_since(user_id, first.start)?,
        _ => Vec::new(),
    };

    Ok(TrendsReport {
        period,
        mode,
        currency: currency.to_string(),
        points: build_trend_points(&buckets, mode, period, currency, &subscriptions, &payments),
    })
}

/// Active subscriptions due within `days` of `today`
pub fn upcoming_renewals(
    db: &Database,
    user_id: i64,
    today: NaiveDate,
    days: i64,
) -> Result<Vec<UpcomingRenewal>> {
    db.list_upcoming_renewals(user_id, today, days)
}

/// Current-month spend against the user's monthly budget
pub fn budget_status(db: &Database, user: &User, currency: &str, today: NaiveDate) -> Result<BudgetStatus> {
    let month = today.format("%Y-%m").to_string();
    let report = compute_budget_report(db, user, &month, currency)?;

    let remaining = user.monthly_budget.map(|b| round_currency(b - report.total_spent));
    let percentage_used = user
        .monthly_budget
        .filter(|b| *b > 0.0)
        .map(|b| round_currency(report.total_spent / b * 100.0));
    let over_budget = user
        .monthly_budget
        .is_some_and(|b| report.total_spent > b || report.expected_spend > b);

    Ok(BudgetStatus {
        month,
        currency: currency.to_string(),
        monthly_budget: user.monthly_budget,
        spent: report.total_spent,
        expected: report.expected_spend,
        remaining,
        percentage_used,
        over_budget,
    })
}

/// Compute a month's budget report without saving it
///
/// Spent sums completed payments in the month; expected sums the monthly
/// cost of active subscriptions started on or before the month's last day.
pub fn compute_budget_report(
    db: &Database,
    user: &User,
    month: &str,
    currency: &str,
) -> Result<NewBudgetReport> {
    let (start, end) = month_bounds(month)?;
    let subscriptions = all_subscriptions(db, user.id)?;
    let payments = db.list_payments_since(user.id, start)?;
    let categories = category_index(&subscriptions);

    let total_spent: f64 = actual_items(&payments, &categories, currency, start, end)
        .map(|(_, a)| a)
        .sum();

    let expected: Vec<(String, f64)> =
        expected_items(&subscriptions, AnalyticsPeriod::Monthly, currency, Some(end)).collect();
    let expected_spend: f64 = expected.iter().map(|(_, a)| a).sum();
    let subscription_count = expected.len() as i64;

    Ok(NewBudgetReport {
        month: month.to_string(),
        budget: user.monthly_budget,
        total_spent: round_currency(total_spent),
        expected_spend: round_currency(expected_spend),
        currency: currency.to_string(),
        subscription_count,
        category_breakdown: group_by_category(expected),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BillingCycle;
    use chrono::{TimeZone, Utc};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sub(id: i64, amount: f64, cycle: BillingCycle, category: Option<&str>, start: NaiveDate) -> Subscription {
        Subscription {
            id,
            user_id: 1,
            name: format!("Service {}", id),
            description: None,
            category: category.map(String::from),
            amount,
            currency: "USD".to_string(),
            billing_cycle: cycle,
            start_date: start,
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

    fn payment(sub_id: i64, amount: f64, day: NaiveDate, status: PaymentStatus) -> Payment {
        Payment {
            id: 0,
            subscription_id: sub_id,
            user_id: 1,
            amount,
            currency: "USD".to_string(),
            payment_method: None,
            status,
            paid_at: Utc.from_utc_datetime(&day.and_hms_opt(12, 0, 0).unwrap()),
            notes: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_period_start() {
        // 2024-05-16 is a Thursday
        let today = date(2024, 5, 16);
        assert_eq!(period_start(AnalyticsPeriod::Weekly, today), date(2024, 5, 13));
        assert_eq!(period_start(AnalyticsPeriod::Monthly, today), date(2024, 5, 1));
        assert_eq!(period_start(AnalyticsPeriod::Yearly, today), date(2024, 1, 1));
        // Monday is its own week start
        assert_eq!(period_start(AnalyticsPeriod::Weekly, date(2024, 5, 13)), date(2024, 5, 13));
    }

    #[test]
    fn test_trend_buckets_lengths_and_order() {
        let today = date(2024, 3, 10);
        for (period, len) in [
            (AnalyticsPeriod::Weekly, 8),
            (AnalyticsPeriod::Monthly, 6),
            (AnalyticsPeriod::Yearly, 5),
        ] {
            let buckets = trend_buckets(period, today).unwrap();
            assert_eq!(buckets.len(), len);
            for pair in buckets.windows(2) {
                assert!(pair[0].end < pair[1].start);
                assert_eq!(pair[0].end.succ_opt().unwrap(), pair[1].start);
            }
            let last = buckets.last().unwrap();
            assert!(last.start <= today && today <= last.end);
        }
    }

    #[test]
    fn test_trend_bucket_labels() {
        let today = date(2024, 3, 10);
        let monthly = trend_buckets(AnalyticsPeriod::Monthly, today).unwrap();
        let labels: Vec<&str> = monthly.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["2023-10", "2023-11", "2023-12", "2024-01", "2024-02", "2024-03"]
        );
        assert_eq!(monthly[4].end, date(2024, 2, 29));

        let yearly = trend_buckets(AnalyticsPeriod::Yearly, today).unwrap();
        assert_eq!(yearly[0].label, "2020");
        assert_eq!(yearly[4].label, "2024");

        let weekly = trend_buckets(AnalyticsPeriod::Weekly, today).unwrap();
        // 2024-03-10 is a Sunday; its week starts Monday 2024-03-04
        assert_eq!(weekly[7].label, "2024-03-04");
        assert_eq!(weekly[0].label, "2024-01-15");
    }

    #[test]
    fn test_expected_total_normalizes() {
        let start = date(2024, 1, 1);
        let monthly = vec![sub(1, 1200.0, BillingCycle::Monthly, None, start)];
        assert_eq!(
            round_currency(expected_total(&monthly, AnalyticsPeriod::Yearly, "USD", None)),
            14400.0
        );

        let yearly = vec![sub(2, 1200.0, BillingCycle::Yearly, None, start)];
        assert_eq!(
            round_currency(expected_total(&yearly, AnalyticsPeriod::Monthly, "USD", None)),
            100.0
        );
    }

    #[test]
    fn test_expected_total_skips_inactive_and_other_currency() {
        let start = date(2024, 1, 1);
        let mut paused = sub(1, 10.0, BillingCycle::Monthly, None, start);
        paused.status = SubscriptionStatus::Paused;
        let mut euro = sub(2, 10.0, BillingCycle::Monthly, None, start);
        euro.currency = "EUR".to_string();
        let active = sub(3, 15.0, BillingCycle::Monthly, None, start);

        let subs = vec![paused, euro, active];
        assert_eq!(expected_total(&subs, AnalyticsPeriod::Monthly, "USD", None), 15.0);
        assert_eq!(expected_total(&subs, AnalyticsPeriod::Monthly, "eur", None), 10.0);
    }

    #[test]
    fn test_trend_points_zero_filled_actual() {
        let today = date(2024, 3, 10);
        let buckets = trend_buckets(AnalyticsPeriod::Monthly, today).unwrap();
        let subs = vec![sub(1, 10.0, BillingCycle::Monthly, Some("Video"), date(2023, 1, 1))];
        let payments = vec![
            payment(1, 10.0, date(2024, 1, 5), PaymentStatus::Completed),
            payment(1, 12.0, date(2024, 3, 5), PaymentStatus::Completed),
            payment(1, 99.0, date(2024, 3, 6), PaymentStatus::Failed),
        ];

        let points = build_trend_points(
            &buckets,
            AnalyticsMode::Actual,
            AnalyticsPeriod::Monthly,
            "USD",
            &subs,
            &payments,
        );
        let amounts: Vec<f64> = points.iter().map(|p| p.amount).collect();
        assert_eq!(amounts, vec![0.0, 0.0, 0.0, 10.0, 0.0, 12.0]);
    }

    #[test]
    fn test_trend_points_expected_respects_start_date() {
        let today = date(2024, 3, 10);
        let buckets = trend_buckets(AnalyticsPeriod::Monthly, today).unwrap();
        let subs = vec![
            sub(1, 10.0, BillingCycle::Monthly, None, date(2023, 1, 1)),
            sub(2, 5.0, BillingCycle::Monthly, None, date(2024, 2, 15)),
        ];

        let points = build_trend_points(
            &buckets,
            AnalyticsMode::Expected,
            AnalyticsPeriod::Monthly,
            "USD",
            &subs,
            &[],
        );
        let amounts: Vec<f64> = points.iter().map(|p| p.amount).collect();
        assert_eq!(amounts, vec![10.0, 10.0, 10.0, 10.0, 15.0, 15.0]);
    }

    #[test]
    fn test_group_by_category_sorted_with_percentages() {
        let groups = group_by_category(vec![
            ("Music".to_string(), 10.0),
            ("Video".to_string(), 20.0),
            ("Video".to_string(), 10.0),
        ]);
        assert_eq!(groups[0].category, "Video");
        assert_eq!(groups[0].amount, 30.0);
        assert_eq!(groups[0].count, 2);
        assert_eq!(groups[0].percentage, 75.0);
        assert_eq!(groups[1].percentage, 25.0);
    }

    #[test]
    fn test_resolve_currency() {
        assert_eq!(resolve_currency(Some("eur"), None), "EUR");
        assert_eq!(resolve_currency(Some("  "), None), "USD");
        assert_eq!(resolve_currency(None, None), "USD");
    }

    #[test]
    fn test_month_bounds() {
        assert_eq!(
            month_bounds("2024-02").unwrap(),
            (date(2024, 2, 1), date(2024, 2, 29))
        );
        assert!(month_bounds("2024-13").is_err());
        assert!(month_bounds("March").is_err());
    }
}
