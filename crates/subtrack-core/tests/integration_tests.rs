//! Integration tests for subtrack-core
//!
//! These tests exercise the full subscribe → pay → analyze → insights workflow.

use chrono::{NaiveDate, TimeZone, Utc};
use subtrack_core::{
    ai::{AIClient, MockBackend},
    analytics,
    db::Database,
    insights::{AnalysisContext, InsightEngine},
    models::{
        AnalyticsMode, AnalyticsPeriod, BillingCycle, InsightType, NewPayment, NewSubscription,
        NewUser, SubscriptionStatus, User,
    },
    password::{hash_password, verify_password},
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn register(db: &Database, email: &str) -> User {
    let hash = hash_password("correct horse battery").expect("hash");
    db.create_user(&NewUser {
        email: email.to_string(),
        password_hash: hash,
        name: "Test User".to_string(),
        country: Some("US".to_string()),
        currency: Some("usd".to_string()),
    })
    .expect("Failed to create user")
}

fn subscription(
    name: &str,
    category: &str,
    amount: f64,
    cycle: BillingCycle,
    next: NaiveDate,
) -> NewSubscription {
    NewSubscription {
        name: name.to_string(),
        description: None,
        category: Some(category.to_string()),
        amount,
        currency: "USD".to_string(),
        billing_cycle: cycle,
        start_date: date(2024, 1, 1),
        next_billing_date: next,
        auto_renew: true,
        payment_method: Some("card".to_string()),
        website_url: None,
        notes: None,
        reminder_days: 3,
    }
}

/// Streaming overlap, a yearly plan, and one payment this month
fn seed(db: &Database, user: &User) {
    let netflix = db
        .create_subscription(
            user.id,
            &subscription("Netflix", "Streaming", 15.0, BillingCycle::Monthly, date(2024, 6, 3)),
        )
        .unwrap();
    db.create_subscription(
        user.id,
        &subscription("Hulu", "Streaming", 10.0, BillingCycle::Monthly, date(2024, 6, 20)),
    )
    .unwrap();
    db.create_subscription(
        user.id,
        &subscription("Cloud Storage", "Productivity", 120.0, BillingCycle::Yearly, date(2024, 11, 1)),
    )
    .unwrap();

    db.record_payment(
        user.id,
        netflix.id,
        &NewPayment {
            paid_at: Some(Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap()),
            ..Default::default()
        },
    )
    .unwrap();
}

// =============================================================================
// Accounts
// =============================================================================

#[test]
fn test_register_and_verify_credentials() {
    let db = Database::in_memory().expect("Failed to create in-memory database");
    let user = register(&db, "flow@example.com");

    let (found, hash) = db
        .get_user_credentials("flow@example.com")
        .unwrap()
        .expect("user exists");
    assert_eq!(found.id, user.id);
    assert_eq!(found.currency, "USD");
    assert!(verify_password("correct horse battery", &hash));
    assert!(!verify_password("wrong password", &hash));
}

// =============================================================================
// Analytics
// =============================================================================

#[test]
fn test_expected_and_actual_summaries() {
    let db = Database::in_memory().unwrap();
    let user = register(&db, "analytics@example.com");
    seed(&db, &user);
    let today = date(2024, 6, 15);

    let expected = analytics::spending_summary(
        &db,
        user.id,
        AnalyticsPeriod::Monthly,
        AnalyticsMode::Expected,
        "USD",
        today,
    )
    .unwrap();
    // 15 + 10 + 120/12
    assert_eq!(expected.total, 35.0);
    assert_eq!(expected.item_count, 3);
    assert_eq!(expected.categories[0].category, "Streaming");
    assert_eq!(expected.categories[0].amount, 25.0);

    let actual = analytics::spending_summary(
        &db,
        user.id,
        AnalyticsPeriod::Monthly,
        AnalyticsMode::Actual,
        "USD",
        today,
    )
    .unwrap();
    assert_eq!(actual.total, 15.0);
    assert_eq!(actual.window_start, date(2024, 6, 1));

    // Other currencies are not converted, just excluded
    let eur = analytics::spending_summary(
        &db,
        user.id,
        AnalyticsPeriod::Monthly,
        AnalyticsMode::Expected,
        "EUR",
        today,
    )
    .unwrap();
    assert_eq!(eur.total, 0.0);
    assert!(eur.categories.is_empty());
}

#[test]
fn test_trends_series_shape() {
    let db = Database::in_memory().unwrap();
    let user = register(&db, "trends@example.com");
    seed(&db, &user);

    let report = analytics::trends(
        &db,
        user.id,
        AnalyticsPeriod::Monthly,
        AnalyticsMode::Actual,
        "USD",
        date(2024, 6, 15),
    )
    .unwrap();

    assert_eq!(report.points.len(), 6);
    assert_eq!(report.points[0].label, "2024-01");
    let last = report.points.last().unwrap();
    assert_eq!(last.label, "2024-06");
    assert_eq!(last.amount, 15.0);
    assert!(report.points[..5].iter().all(|p| p.amount == 0.0));
}

#[test]
fn test_budget_status_and_report() {
    let db = Database::in_memory().unwrap();
    let user = register(&db, "budget@example.com");
    seed(&db, &user);
    db.set_monthly_budget(user.id, Some(30.0)).unwrap();
    let user = db.get_user(user.id).unwrap().unwrap();

    let status = analytics::budget_status(&db, &user, "USD", date(2024, 6, 15)).unwrap();
    assert_eq!(status.month, "2024-06");
    assert_eq!(status.spent, 15.0);
    assert_eq!(status.expected, 35.0);
    assert_eq!(status.remaining, Some(15.0));
    assert_eq!(status.percentage_used, Some(50.0));
    // Expected spend is above budget even though actual spend is not
    assert!(status.over_budget);

    let report = analytics::compute_budget_report(&db, &user, "2024-06", "USD").unwrap();
    let saved = db.upsert_budget_report(user.id, &report).unwrap();
    assert_eq!(saved.subscription_count, 3);
    assert_eq!(saved.budget, Some(30.0));
    assert_eq!(db.list_budget_reports(user.id).unwrap().len(), 1);
}

#[test]
fn test_cancelled_subscriptions_leave_expected_spend() {
    let db = Database::in_memory().unwrap();
    let user = register(&db, "cancel@example.com");
    seed(&db, &user);

    let hulu = db
        .list_subscriptions(user.id, &Default::default())
        .unwrap()
        .into_iter()
        .find(|s| s.name == "Hulu")
        .unwrap();
    db.set_subscription_status(user.id, hulu.id, SubscriptionStatus::Cancelled)
        .unwrap();

    let expected = analytics::spending_summary(
        &db,
        user.id,
        AnalyticsPeriod::Monthly,
        AnalyticsMode::Expected,
        "USD",
        date(2024, 6, 15),
    )
    .unwrap();
    assert_eq!(expected.total, 25.0);
}

// =============================================================================
// Insights
// =============================================================================

#[tokio::test]
async fn test_insights_from_ai_backend() {
    let db = Database::in_memory().unwrap();
    let user = register(&db, "ai@example.com");
    seed(&db, &user);

    let ai = AIClient::mock();
    let ctx = AnalysisContext::new(&db, Some(&ai), &user, date(2024, 6, 1));
    let insights = InsightEngine::new().generate(&ctx).await.unwrap();

    // The mock returns three items, enough to skip the heuristics
    assert_eq!(insights.len(), 3);
    assert!(insights
        .iter()
        .any(|i| i.message == "Review overlapping subscriptions to cut monthly costs."));
}

#[tokio::test]
async fn test_insights_fall_back_when_ai_fails() {
    let db = Database::in_memory().unwrap();
    let user = register(&db, "fallback@example.com");
    seed(&db, &user);

    let ai = AIClient::Mock(MockBackend::failing());
    let ctx = AnalysisContext::new(&db, Some(&ai), &user, date(2024, 6, 1));
    let insights = InsightEngine::new().generate(&ctx).await.unwrap();

    assert!(insights.len() >= 3);
    let overlap = insights
        .iter()
        .find(|i| i.insight_type == InsightType::Saving)
        .expect("overlap saving insight");
    assert!(overlap.affected_services.contains(&"Netflix".to_string()));
    assert!(overlap.affected_services.contains(&"Hulu".to_string()));
    // Hulu has never been paid since January
    assert!(insights
        .iter()
        .any(|i| i.insight_type == InsightType::Warning && i.affected_services == vec!["Hulu"]));
}

#[tokio::test]
async fn test_insights_top_up_sparse_ai_output() {
    let db = Database::in_memory().unwrap();
    let user = register(&db, "sparse@example.com");
    seed(&db, &user);

    let ai = AIClient::Mock(MockBackend::with_response(
        r#"{"insights": [{"type": "trend", "message": "Streaming dominates.", "confidence_score": 2}]}"#,
    ));
    let ctx = AnalysisContext::new(&db, Some(&ai), &user, date(2024, 6, 1));
    let generated = InsightEngine::new().analyze(&ctx).await.unwrap();

    assert!(generated.len() > 1);
    assert_eq!(generated[0].message, "Streaming dominates.");
    assert_eq!(generated[0].confidence_score, 1.0);
}

#[tokio::test]
async fn test_insight_generation_is_idempotent() {
    let db = Database::in_memory().unwrap();
    let user = register(&db, "repeat@example.com");
    seed(&db, &user);

    let engine = InsightEngine::new();
    let ctx = AnalysisContext::new(&db, None, &user, date(2024, 6, 1));

    let first = engine.generate(&ctx).await.unwrap();
    let second = engine.generate(&ctx).await.unwrap();
    assert_eq!(first.len(), second.len());
    assert_eq!(db.list_insights(user.id, true).unwrap().len(), first.len());
}

#[tokio::test]
async fn test_insights_for_empty_account() {
    let db = Database::in_memory().unwrap();
    let user = register(&db, "empty@example.com");

    let ctx = AnalysisContext::new(&db, None, &user, date(2024, 6, 1));
    let insights = InsightEngine::new().analyze(&ctx).await.unwrap();

    assert!(!insights.is_empty());
    assert!(insights
        .iter()
        .all(|i| i.insight_type == InsightType::Suggestion));
}
