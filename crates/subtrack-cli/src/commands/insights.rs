//! Insight generation command

use anyhow::{Context, Result};
use tracing::debug;
use subtrack_core::ai::{AIBackend, AIClient};
use subtrack_core::db::Database;
use subtrack_core::models::{AiInsight, InsightType};
use subtrack_core::{AnalysisContext, InsightEngine};

fn type_icon(insight_type: InsightType) -> &'static str {
    match insight_type {
        InsightType::Saving => "💰",
        InsightType::Warning => "⚠️ ",
        InsightType::Suggestion => "💡",
        InsightType::Trend => "📈",
        InsightType::Reminder => "⏰",
    }
}

fn print_insight(insight: &AiInsight) {
    let resolved = if insight.is_resolved { " (resolved)" } else { "" };
    println!(
        "   {} [{}] {}{}",
        type_icon(insight.insight_type),
        insight.insight_type,
        insight.message,
        resolved
    );
    if !insight.affected_services.is_empty() {
        println!("      ↳ {}", insight.affected_services.join(", "));
    }
}

pub async fn cmd_insights(db: &Database, user_id: i64, include_resolved: bool) -> Result<()> {
    let user = db
        .get_user(user_id)?
        .with_context(|| format!("User {} not found", user_id))?;

    println!("🔍 Analyzing subscriptions for {} ({})...", user.name, user.email);

    let ai = AIClient::from_env();
    match &ai {
        Some(client) => println!(
            "   🤖 AI backend: {} ({})",
            client.backend_name(),
            client.model()
        ),
        None => println!("   💡 Tip: Set OLLAMA_HOST for AI-generated insights"),
    }

    let ctx = AnalysisContext::today(db, ai.as_ref(), &user);
    let mut insights = InsightEngine::new().generate(&ctx).await?;
    debug!(user_id, unresolved = insights.len(), "Insight generation finished");
    if include_resolved {
        insights = db.list_insights(user.id, true)?;
    }

    println!();
    println!("📊 Insights");
    println!("   ─────────────────────────────");
    if insights.is_empty() {
        println!("   Nothing to report.");
    }
    for insight in &insights {
        print_insight(insight);
    }

    Ok(())
}
