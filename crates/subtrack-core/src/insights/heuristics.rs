//! Rule-based insights used when the AI backend is unavailable or terse

use crate::ai::parsing::MAX_INSIGHTS;
use crate::billing::round_currency;
use crate::models::{GeneratedInsight, InsightType};

use super::features::FeatureSummary;

/// Minimum number of insights the heuristics try to produce
pub const MIN_HEURISTIC_INSIGHTS: usize = 3;

fn insight(
    insight_type: InsightType,
    message: String,
    affected_services: Vec<String>,
    confidence_score: f64,
) -> GeneratedInsight {
    GeneratedInsight {
        insight_type,
        message,
        affected_services,
        confidence_score,
    }
}

fn when(days: i64) -> String {
    match days {
        0 => "today".to_string(),
        1 => "tomorrow".to_string(),
        n => format!("in {} days", n),
    }
}

/// Generate insights from the feature summary alone
///
/// Each rule contributes at most one insight, grouping every matching
/// service into it, so the list never exceeds [`MAX_INSIGHTS`]. Rules run
/// in a fixed order so the most actionable findings come first.
pub fn generate_heuristic_insights(summary: &FeatureSummary) -> Vec<GeneratedInsight> {
    let mut out = Vec::new();
    let cur = &summary.currency;

    match summary.overlaps.as_slice() {
        [] => {}
        [only] => out.push(insight(
            InsightType::Saving,
            format!(
                "You have {} {} subscriptions ({}) costing {} {:.2}/month combined. Consider keeping just one.",
                only.services.len(),
                only.category,
                only.services.join(", "),
                cur,
                only.combined_monthly_cost
            ),
            only.services.clone(),
            0.8,
        )),
        many => out.push(insight(
            InsightType::Saving,
            format!(
                "You have overlapping subscriptions in {} categories: {}. Consider keeping one per category.",
                many.len(),
                many.iter()
                    .map(|o| format!("{} ({})", o.category, o.services.join(", ")))
                    .collect::<Vec<_>>()
                    .join("; ")
            ),
            many.iter().flat_map(|o| o.services.iter().cloned()).collect(),
            0.8,
        )),
    }

    match summary.due_soon.as_slice() {
        [] => {}
        [only] => out.push(insight(
            InsightType::Reminder,
            format!(
                "{} renews {} for {} {:.2}.",
                only.name,
                when(only.days_until_due),
                only.currency,
                only.amount
            ),
            vec![only.name.clone()],
            0.95,
        )),
        many => out.push(insight(
            InsightType::Reminder,
            format!(
                "{} subscriptions renew within the next week: {}.",
                many.len(),
                many.iter()
                    .map(|d| format!("{} ({})", d.name, when(d.days_until_due)))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            many.iter().map(|d| d.name.clone()).collect(),
            0.95,
        )),
    }

    match summary.low_usage.as_slice() {
        [] => {}
        [only] => out.push(insight(
            InsightType::Warning,
            format!(
                "No payment recorded for {} in {} days. If you no longer use it, cancelling saves {} {:.2}/month.",
                only.name, only.days_inactive, only.currency, only.monthly_cost
            ),
            vec![only.name.clone()],
            0.65,
        )),
        many => out.push(insight(
            InsightType::Warning,
            format!(
                "{} subscriptions have had no payment in a long time: {}. Cancel the ones you no longer use.",
                many.len(),
                many.iter()
                    .map(|l| format!("{} ({} days)", l.name, l.days_inactive))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            many.iter().map(|l| l.name.clone()).collect(),
            0.65,
        )),
    }

    let direction = |percent: f64| if percent >= 0.0 { "up" } else { "down" };
    match summary.price_changes.as_slice() {
        [] => {}
        [only] => out.push(insight(
            InsightType::Warning,
            format!(
                "{} now costs {} {:.2}, {} {:.0}% from your average payment of {:.2}.",
                only.name,
                only.currency,
                only.current_amount,
                direction(only.change_percent),
                only.change_percent.abs(),
                only.average_amount
            ),
            vec![only.name.clone()],
            0.75,
        )),
        many => out.push(insight(
            InsightType::Warning,
            format!(
                "Prices changed for {} subscriptions: {}. Check that the new prices are still worth it.",
                many.len(),
                many.iter()
                    .map(|c| format!(
                        "{} ({} {:.0}%)",
                        c.name,
                        direction(c.change_percent),
                        c.change_percent.abs()
                    ))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            many.iter().map(|c| c.name.clone()).collect(),
            0.75,
        )),
    }

    if let Some(top) = summary.category_totals.first() {
        if summary.total_monthly_spend > 0.0 && top.monthly_total > 0.0 {
            out.push(insight(
                InsightType::Trend,
                format!(
                    "{} is your largest spending category at {} {:.2}/month ({:.0}% of your subscription spend).",
                    top.category,
                    cur,
                    top.monthly_total,
                    top.monthly_total / summary.total_monthly_spend * 100.0
                ),
                Vec::new(),
                0.9,
            ));
        }
    }

    if let Some(priciest) = summary.expensive.first() {
        out.push(insight(
            InsightType::Saving,
            format!(
                "{} is your most expensive subscription at {} {:.2}/month. Check for a cheaper plan or an annual billing discount.",
                priciest.name, priciest.currency, priciest.monthly_cost
            ),
            vec![priciest.name.clone()],
            0.7,
        ));
    }

    match summary.free_trials.as_slice() {
        [] => {}
        [only] => out.push(insight(
            InsightType::Reminder,
            format!(
                "{} looks like a free trial. Cancel before it converts to a paid plan if you don't need it.",
                only
            ),
            vec![only.clone()],
            0.6,
        )),
        many => out.push(insight(
            InsightType::Reminder,
            format!(
                "{} look like free trials. Cancel before they convert to paid plans if you don't need them.",
                many.join(", ")
            ),
            many.to_vec(),
            0.6,
        )),
    }

    // Baseline suggestions so there is always something to show
    if out.len() < MIN_HEURISTIC_INSIGHTS {
        if summary.active_count > 0 {
            out.push(insight(
                InsightType::Suggestion,
                format!(
                    "You spend {} {:.2}/month ({} {:.2}/year) on {} active subscription{}.",
                    cur,
                    summary.total_monthly_spend,
                    cur,
                    round_currency(summary.total_monthly_spend * 12.0),
                    summary.active_count,
                    if summary.active_count == 1 { "" } else { "s" }
                ),
                Vec::new(),
                0.9,
            ));
        } else {
            out.push(insight(
                InsightType::Suggestion,
                "Add your subscriptions to start tracking renewals and spending.".to_string(),
                Vec::new(),
                0.9,
            ));
        }
    }

    if out.len() < MIN_HEURISTIC_INSIGHTS && summary.monthly_budget.is_none() {
        out.push(insight(
            InsightType::Suggestion,
            "Set a monthly budget to get warned when subscription spending exceeds it.".to_string(),
            Vec::new(),
            0.8,
        ));
    }

    if out.len() < MIN_HEURISTIC_INSIGHTS && summary.active_count > 0 {
        out.push(insight(
            InsightType::Suggestion,
            "Review your subscriptions each month and cancel the ones you haven't used.".to_string(),
            Vec::new(),
            0.7,
        ));
    }

    out.truncate(MAX_INSIGHTS);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::engine::merge_insights;
    use crate::insights::features::{CategoryTotal, DueSoon, Expensive, LowUsage, Overlap, PriceChange};
    use chrono::NaiveDate;

    fn empty_summary() -> FeatureSummary {
        FeatureSummary {
            currency: "USD".to_string(),
            today: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            monthly_budget: None,
            total_monthly_spend: 0.0,
            active_count: 0,
            paused_count: 0,
            subscriptions: Vec::new(),
            price_changes: Vec::new(),
            low_usage: Vec::new(),
            due_soon: Vec::new(),
            free_trials: Vec::new(),
            expensive: Vec::new(),
            overlaps: Vec::new(),
            category_totals: Vec::new(),
        }
    }

    #[test]
    fn test_empty_summary_gets_baseline() {
        let insights = generate_heuristic_insights(&empty_summary());
        assert_eq!(insights.len(), 2);
        assert!(insights
            .iter()
            .all(|i| i.insight_type == InsightType::Suggestion));
    }

    #[test]
    fn test_rule_mapping() {
        let mut summary = empty_summary();
        summary.active_count = 3;
        summary.total_monthly_spend = 85.0;
        summary.overlaps.push(Overlap {
            category: "Streaming".to_string(),
            services: vec!["Netflix".to_string(), "Hulu".to_string()],
            combined_monthly_cost: 25.0,
        });
        summary.due_soon.push(DueSoon {
            name: "Netflix".to_string(),
            days_until_due: 1,
            amount: 15.0,
            currency: "USD".to_string(),
        });
        summary.expensive.push(Expensive {
            name: "Cloud".to_string(),
            monthly_cost: 60.0,
            currency: "USD".to_string(),
        });

        let insights = generate_heuristic_insights(&summary);
        assert_eq!(insights.len(), 3);
        assert_eq!(insights[0].insight_type, InsightType::Saving);
        assert_eq!(insights[0].affected_services, vec!["Netflix", "Hulu"]);
        assert_eq!(insights[1].insight_type, InsightType::Reminder);
        assert!(insights[1].message.contains("tomorrow"));
        assert_eq!(insights[2].insight_type, InsightType::Saving);
        assert!(insights[2].message.starts_with("Cloud"));
    }

    #[test]
    fn test_multiple_due_soon_grouped() {
        let mut summary = empty_summary();
        for (name, days) in [("A", 0), ("B", 3)] {
            summary.due_soon.push(DueSoon {
                name: name.to_string(),
                days_until_due: days,
                amount: 5.0,
                currency: "USD".to_string(),
            });
        }
        let insights = generate_heuristic_insights(&summary);
        assert_eq!(insights[0].message, "2 subscriptions renew within the next week: A (today), B (in 3 days).");
    }

    #[test]
    fn test_busy_summary_keeps_one_insight_per_rule() {
        let mut summary = empty_summary();
        summary.active_count = 12;
        summary.total_monthly_spend = 240.0;
        for (category, services) in [
            ("Streaming", ["Netflix", "Hulu"]),
            ("Music", ["Spotify", "Tidal"]),
            ("Cloud", ["Dropbox", "iCloud"]),
        ] {
            summary.overlaps.push(Overlap {
                category: category.to_string(),
                services: services.iter().map(|s| s.to_string()).collect(),
                combined_monthly_cost: 20.0,
            });
        }
        for i in 0..6 {
            summary.low_usage.push(LowUsage {
                name: format!("Idle {}", i),
                days_inactive: 60 + i,
                monthly_cost: 5.0,
                currency: "USD".to_string(),
            });
            summary.price_changes.push(PriceChange {
                name: format!("Raised {}", i),
                current_amount: 12.0,
                average_amount: 10.0,
                currency: "USD".to_string(),
                change_percent: 20.0,
            });
        }
        summary.free_trials = vec!["Trial A".to_string(), "Trial B".to_string()];
        summary.category_totals.push(CategoryTotal {
            category: "Streaming".to_string(),
            monthly_total: 120.0,
            count: 4,
        });
        summary.expensive.push(Expensive {
            name: "Adobe".to_string(),
            monthly_cost: 60.0,
            currency: "USD".to_string(),
        });

        let insights = generate_heuristic_insights(&summary);
        assert!(insights.len() <= MAX_INSIGHTS);
        assert_eq!(insights[0].affected_services.len(), 6);
        assert_eq!(insights[1].affected_services.len(), 6);

        // Category and most-expensive rules survive the merge cap
        let merged = merge_insights(Vec::new(), insights);
        assert!(merged
            .iter()
            .any(|i| i.insight_type == InsightType::Trend && i.message.starts_with("Streaming")));
        assert!(merged.iter().any(|i| i.message.starts_with("Adobe")));
        assert!(merged.iter().any(|i| i.affected_services == vec!["Trial A", "Trial B"]));
    }
}
