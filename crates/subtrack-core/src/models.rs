//! Domain models for SubTrack

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ========== Users ==========

/// A registered user
///
/// The password hash lives only in the database and is never part of this struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub country: Option<String>,
    /// Preferred currency (ISO 4217 code), used as the default analytics filter
    pub currency: String,
    /// URL path of the uploaded avatar image
    pub avatar_url: Option<String>,
    pub monthly_budget: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user to be registered (password already hashed)
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub country: Option<String>,
    pub currency: Option<String>,
}

/// Profile fields a user can change
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub country: Option<String>,
    pub currency: Option<String>,
    pub monthly_budget: Option<f64>,
}

// ========== Subscriptions ==========

/// Recurrence tag of a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BillingCycle {
    Daily,
    Weekly,
    #[default]
    Monthly,
    Quarterly,
    Yearly,
}

impl BillingCycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::Yearly => "yearly",
        }
    }

    /// Lenient parse: unknown or missing tags are treated as monthly
    pub fn parse_or_default(s: Option<&str>) -> Self {
        s.and_then(|s| s.parse().ok()).unwrap_or_default()
    }
}

impl std::str::FromStr for BillingCycle {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "quarterly" => Ok(Self::Quarterly),
            "yearly" | "annual" | "annually" => Ok(Self::Yearly),
            _ => Err(format!("Unknown billing cycle: {}", s)),
        }
    }
}

impl std::fmt::Display for BillingCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Subscription status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    #[default]
    Active,
    Paused,
    /// Terminal for billing: the next billing date is never advanced again
    Cancelled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            _ => Err(format!("Unknown subscription status: {}", s)),
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A tracked subscription
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub amount: f64,
    pub currency: String,
    pub billing_cycle: BillingCycle,
    pub start_date: NaiveDate,
    pub next_billing_date: Option<NaiveDate>,
    pub last_billing_date: Option<NaiveDate>,
    pub status: SubscriptionStatus,
    pub auto_renew: bool,
    pub payment_method: Option<String>,
    pub website_url: Option<String>,
    pub notes: Option<String>,
    /// Days before the due date the user wants to be reminded
    pub reminder_days: i64,
    /// Running sum of recorded payment amounts
    pub total_payments: f64,
    pub payment_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A subscription to be created
#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub amount: f64,
    pub currency: String,
    pub billing_cycle: BillingCycle,
    pub start_date: NaiveDate,
    pub next_billing_date: NaiveDate,
    pub auto_renew: bool,
    pub payment_method: Option<String>,
    pub website_url: Option<String>,
    pub notes: Option<String>,
    pub reminder_days: i64,
}

/// Partial update of a subscription; `None` leaves the column unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscriptionUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub billing_cycle: Option<BillingCycle>,
    pub next_billing_date: Option<NaiveDate>,
    pub auto_renew: Option<bool>,
    pub payment_method: Option<String>,
    pub website_url: Option<String>,
    pub notes: Option<String>,
    pub reminder_days: Option<i64>,
}

/// Filters for listing subscriptions
#[derive(Debug, Clone, Default)]
pub struct SubscriptionFilter {
    pub status: Option<SubscriptionStatus>,
    pub category: Option<String>,
}

/// An active subscription due soon
#[derive(Debug, Clone, Serialize)]
pub struct UpcomingRenewal {
    pub subscription_id: i64,
    pub name: String,
    pub amount: f64,
    pub currency: String,
    pub next_billing_date: NaiveDate,
    pub days_until_due: i64,
}

// ========== Payments ==========

/// Payment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Counted as a successful payment by analytics
    #[default]
    Completed,
    Pending,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Pending => "pending",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        }
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "completed" | "success" | "paid" => Ok(Self::Completed),
            "pending" => Ok(Self::Pending),
            "failed" => Ok(Self::Failed),
            "refunded" => Ok(Self::Refunded),
            _ => Err(format!("Unknown payment status: {}", s)),
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A recorded payment for a subscription
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub subscription_id: i64,
    pub user_id: i64,
    pub amount: f64,
    pub currency: String,
    pub payment_method: Option<String>,
    pub status: PaymentStatus,
    pub paid_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A payment to be recorded; missing amount/currency fall back to the subscription's
#[derive(Debug, Clone, Default)]
pub struct NewPayment {
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub payment_method: Option<String>,
    pub status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

/// Filters for listing payments
#[derive(Debug, Clone, Default)]
pub struct PaymentFilter {
    pub subscription_id: Option<i64>,
    pub status: Option<PaymentStatus>,
    pub limit: i64,
    pub offset: i64,
}

/// Result of recording a payment: the payment and the subscription after advancement
#[derive(Debug, Clone, Serialize)]
pub struct PaymentRecorded {
    pub payment: Payment,
    pub subscription: Subscription,
}

// ========== Shared plans ==========

/// How a shared plan's cost is divided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SplitType {
    #[default]
    Equal,
    Custom,
    Percentage,
}

impl SplitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equal => "equal",
            Self::Custom => "custom",
            Self::Percentage => "percentage",
        }
    }
}

impl std::str::FromStr for SplitType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "equal" => Ok(Self::Equal),
            "custom" => Ok(Self::Custom),
            "percentage" => Ok(Self::Percentage),
            _ => Err(format!("Unknown split type: {}", s)),
        }
    }
}

impl std::fmt::Display for SplitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Participant status within a shared plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantStatus {
    Invited,
    Accepted,
    Declined,
}

impl ParticipantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Invited => "invited",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
        }
    }
}

impl std::str::FromStr for ParticipantStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "invited" => Ok(Self::Invited),
            "accepted" => Ok(Self::Accepted),
            "declined" => Ok(Self::Declined),
            _ => Err(format!("Unknown participant status: {}", s)),
        }
    }
}

impl std::fmt::Display for ParticipantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A subscription cost shared among several people
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedPlan {
    pub id: i64,
    pub owner_id: i64,
    pub subscription_id: Option<i64>,
    pub name: String,
    pub description: Option<String>,
    pub total_amount: f64,
    pub currency: String,
    pub billing_cycle: BillingCycle,
    pub split_type: SplitType,
    pub created_at: DateTime<Utc>,
}

/// A member of a shared plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub id: i64,
    pub plan_id: i64,
    /// Linked account, when the invited email belongs to a registered user
    pub user_id: Option<i64>,
    pub email: String,
    pub name: Option<String>,
    pub status: ParticipantStatus,
    pub split_amount: f64,
    pub is_owner: bool,
    pub joined_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A participant to invite
#[derive(Debug, Clone, Deserialize)]
pub struct NewParticipant {
    pub email: String,
    pub name: Option<String>,
}

/// A shared plan to be created
#[derive(Debug, Clone)]
pub struct NewSharedPlan {
    pub subscription_id: Option<i64>,
    pub name: String,
    pub description: Option<String>,
    pub total_amount: f64,
    pub currency: String,
    pub billing_cycle: BillingCycle,
    pub split_type: SplitType,
    pub participants: Vec<NewParticipant>,
}

/// Shared plan with its participants (API response shape)
#[derive(Debug, Clone, Serialize)]
pub struct SharedPlanWithParticipants {
    #[serde(flatten)]
    pub plan: SharedPlan,
    pub participants: Vec<Participant>,
}

// ========== Notifications ==========

/// An in-app notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    /// Machine-readable kind, e.g. `shared_plan_invite`
    pub kind: String,
    pub title: String,
    pub message: String,
    pub related_id: Option<i64>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

// ========== AI insights ==========

/// Category tag of a generated insight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InsightType {
    Saving,
    Warning,
    #[default]
    Suggestion,
    Reminder,
    Trend,
}

impl InsightType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Saving => "saving",
            Self::Warning => "warning",
            Self::Suggestion => "suggestion",
            Self::Reminder => "reminder",
            Self::Trend => "trend",
        }
    }
}

impl std::str::FromStr for InsightType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "saving" | "savings" => Ok(Self::Saving),
            "warning" => Ok(Self::Warning),
            "suggestion" => Ok(Self::Suggestion),
            "reminder" => Ok(Self::Reminder),
            "trend" => Ok(Self::Trend),
            _ => Err(format!("Unknown insight type: {}", s)),
        }
    }
}

impl std::fmt::Display for InsightType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A generated insight before persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedInsight {
    #[serde(rename = "type")]
    pub insight_type: InsightType,
    pub message: String,
    pub affected_services: Vec<String>,
    pub confidence_score: f64,
}

/// A persisted insight
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiInsight {
    pub id: i64,
    pub user_id: i64,
    #[serde(rename = "type")]
    pub insight_type: InsightType,
    pub message: String,
    pub affected_services: Vec<String>,
    pub confidence_score: f64,
    pub is_resolved: bool,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

// ========== Analytics ==========

/// Reporting period for analytics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AnalyticsPeriod {
    Weekly,
    #[default]
    Monthly,
    Yearly,
}

impl AnalyticsPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }

    /// Number of buckets in a trend series for this period
    pub fn lookback(&self) -> usize {
        match self {
            Self::Weekly => 8,
            Self::Monthly => 6,
            Self::Yearly => 5,
        }
    }

    /// Lenient parse: unknown or missing values are treated as monthly
    pub fn parse_or_default(s: Option<&str>) -> Self {
        s.and_then(|s| s.parse().ok()).unwrap_or_default()
    }
}

impl std::str::FromStr for AnalyticsPeriod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "weekly" | "week" => Ok(Self::Weekly),
            "monthly" | "month" => Ok(Self::Monthly),
            "yearly" | "year" => Ok(Self::Yearly),
            _ => Err(format!("Unknown period: {}", s)),
        }
    }
}

/// Whether analytics sum recorded payments or projected subscription costs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AnalyticsMode {
    #[default]
    Actual,
    Expected,
}

impl AnalyticsMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Actual => "actual",
            Self::Expected => "expected",
        }
    }

    pub fn parse_or_default(s: Option<&str>) -> Self {
        s.and_then(|s| s.parse().ok()).unwrap_or_default()
    }
}

impl std::str::FromStr for AnalyticsMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "actual" => Ok(Self::Actual),
            "expected" | "projected" => Ok(Self::Expected),
            _ => Err(format!("Unknown analytics mode: {}", s)),
        }
    }
}

/// Spending for one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySpending {
    pub category: String,
    pub amount: f64,
    pub count: i64,
    pub percentage: f64,
}

/// Spending total for the current period window
#[derive(Debug, Clone, Serialize)]
pub struct SpendingSummary {
    pub period: AnalyticsPeriod,
    pub mode: AnalyticsMode,
    pub currency: String,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub total: f64,
    /// Subscriptions (expected mode) or payments (actual mode) that were summed
    pub item_count: i64,
    pub categories: Vec<CategorySpending>,
}

/// One bucket of a spending trend
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub amount: f64,
}

/// Fixed-length, chronological spending series
#[derive(Debug, Clone, Serialize)]
pub struct TrendsReport {
    pub period: AnalyticsPeriod,
    pub mode: AnalyticsMode,
    pub currency: String,
    pub points: Vec<TrendPoint>,
}

// ========== Budget ==========

/// Current-month budget position
#[derive(Debug, Clone, Serialize)]
pub struct BudgetStatus {
    pub month: String,
    pub currency: String,
    pub monthly_budget: Option<f64>,
    pub spent: f64,
    pub expected: f64,
    pub remaining: Option<f64>,
    pub percentage_used: Option<f64>,
    pub over_budget: bool,
}

/// Monthly snapshot of spend against budget
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetReport {
    pub id: i64,
    pub user_id: i64,
    /// Month key in `YYYY-MM` form
    pub month: String,
    pub budget: Option<f64>,
    pub total_spent: f64,
    pub expected_spend: f64,
    pub currency: String,
    pub subscription_count: i64,
    pub category_breakdown: Vec<CategorySpending>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Values for a budget report upsert
#[derive(Debug, Clone)]
pub struct NewBudgetReport {
    pub month: String,
    pub budget: Option<f64>,
    pub total_spent: f64,
    pub expected_spend: f64,
    pub currency: String,
    pub subscription_count: i64,
    pub category_breakdown: Vec<CategorySpending>,
}
