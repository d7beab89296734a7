//! Insight engine: AI first, heuristics as fallback, then persistence

use std::collections::HashSet;

use chrono::{Days, NaiveDate};
use tracing::{debug, info, warn};

use crate::ai::parsing::MAX_INSIGHTS;
use crate::ai::{AIBackend, AIClient};
use crate::db::Database;
use crate::models::{AiInsight, GeneratedInsight, SubscriptionFilter, User};
use crate::Result;

use super::features::FeatureSummary;
use super::heuristics::generate_heuristic_insights;
use super::prompt::build_insight_prompt;

/// Payment history window used for averages and recency
const PAYMENT_HISTORY_DAYS: u64 = 730;

/// Context provided to the insight engine
pub struct AnalysisContext<'a> {
    /// Database for loading subscriptions and storing insights
    pub db: &'a Database,
    /// Optional AI client; `None` means heuristics only
    pub ai: Option<&'a AIClient>,
    /// User the insights are for
    pub user: &'a User,
    /// Reference date for recency and due-date calculations
    pub today: NaiveDate,
}

impl<'a> AnalysisContext<'a> {
    pub fn new(db: &'a Database, ai: Option<&'a AIClient>, user: &'a User, today: NaiveDate) -> Self {
        Self { db, ai, user, today }
    }

    /// Context dated today (local time)
    pub fn today(db: &'a Database, ai: Option<&'a AIClient>, user: &'a User) -> Self {
        Self::new(db, ai, user, chrono::Local::now().date_naive())
    }
}

/// Merge AI and heuristic insights: AI first, exact-message dedupe, capped
pub fn merge_insights(
    ai: Vec<GeneratedInsight>,
    heuristic: Vec<GeneratedInsight>,
) -> Vec<GeneratedInsight> {
    let mut seen = HashSet::new();
    ai.into_iter()
        .chain(heuristic)
        .filter(|i| seen.insert(i.message.clone()))
        .take(MAX_INSIGHTS)
        .collect()
}

/// Orchestrates insight generation
pub struct InsightEngine {
    /// AI results below this count trigger the heuristic fallback
    min_ai_insights: usize,
}

impl Default for InsightEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl InsightEngine {
    pub fn new() -> Self {
        Self { min_ai_insights: 3 }
    }

    /// Load the user's data and build the feature summary
    pub fn build_summary(&self, ctx: &AnalysisContext<'_>) -> Result<FeatureSummary> {
        let subscriptions = ctx
            .db
            .list_subscriptions(ctx.user.id, &SubscriptionFilter::default())?;
        let since = ctx
            .today
            .checked_sub_days(Days::new(PAYMENT_HISTORY_DAYS))
            .unwrap_or(ctx.today);
        let payments = ctx.db.list_payments_since(ctx.user.id, since)?;

        Ok(FeatureSummary::build(
            ctx.user,
            &subscriptions,
            &payments,
            ctx.today,
        ))
    }

    /// Produce insights without persisting them
    ///
    /// AI failures are logged and never returned; the heuristics cover for them.
    pub async fn analyze(&self, ctx: &AnalysisContext<'_>) -> Result<Vec<GeneratedInsight>> {
        let summary = self.build_summary(ctx)?;

        let ai_insights = match ctx.ai {
            Some(ai) => {
                let prompt = build_insight_prompt(&summary)?;
                match ai.generate_insights(&prompt).await {
                    Ok(items) => {
                        debug!(
                            user_id = ctx.user.id,
                            model = ai.model(),
                            count = items.len(),
                            "AI insights received"
                        );
                        items
                    }
                    Err(e) => {
                        warn!(
                            user_id = ctx.user.id,
                            host = ai.host(),
                            error = %e,
                            "AI insight generation failed, using heuristics"
                        );
                        Vec::new()
                    }
                }
            }
            None => Vec::new(),
        };

        let heuristic = if ai_insights.len() < self.min_ai_insights {
            if ctx.ai.is_some() && !ai_insights.is_empty() {
                warn!(
                    user_id = ctx.user.id,
                    count = ai_insights.len(),
                    "Too few AI insights, adding heuristics"
                );
            }
            generate_heuristic_insights(&summary)
        } else {
            Vec::new()
        };

        Ok(merge_insights(ai_insights, heuristic))
    }

    /// Generate, persist, and return the user's unresolved insights
    ///
    /// Messages already present as unresolved insights are not stored
    /// again, so repeated calls return the same set.
    pub async fn generate(&self, ctx: &AnalysisContext<'_>) -> Result<Vec<AiInsight>> {
        let insights = self.analyze(ctx).await?;
        let inserted = ctx.db.persist_new_insights(ctx.user.id, &insights)?;

        info!(
            user_id = ctx.user.id,
            generated = insights.len(),
            inserted,
            "Insights generated"
        );

        ctx.db.list_insights(ctx.user.id, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InsightType;

    fn gi(message: &str) -> GeneratedInsight {
        GeneratedInsight {
            insight_type: InsightType::Suggestion,
            message: message.to_string(),
            affected_services: Vec::new(),
            confidence_score: 0.7,
        }
    }

    #[test]
    fn test_merge_ai_first_and_dedupe() {
        let merged = merge_insights(vec![gi("a"), gi("b")], vec![gi("b"), gi("c")]);
        let messages: Vec<&str> = merged.iter().map(|i| i.message.as_str()).collect();
        assert_eq!(messages, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_merge_caps() {
        let ai: Vec<_> = (0..5).map(|i| gi(&format!("ai{}", i))).collect();
        let heuristic: Vec<_> = (0..5).map(|i| gi(&format!("h{}", i))).collect();
        let merged = merge_insights(ai, heuristic);
        assert_eq!(merged.len(), MAX_INSIGHTS);
        assert_eq!(merged[0].message, "ai0");
        assert_eq!(merged[6].message, "h1");
    }
}
