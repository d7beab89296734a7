//! Prompt construction for AI-generated insights

use crate::error::Result;

use super::features::FeatureSummary;

const INSTRUCTIONS: &str = r#"You are a personal finance assistant reviewing a user's recurring subscriptions.
Using the JSON summary below, write between 3 and 7 short, specific, actionable insights.

Rules:
- Each insight has a "type": one of "saving", "warning", "suggestion", "reminder", "trend".
- "message" is one or two sentences addressed to the user, citing service names and amounts.
- "affected_services" lists the subscription names the insight is about (may be empty).
- "confidence_score" is a number between 0 and 1.
- Use the currency codes given in the data. Do not invent subscriptions.

Respond with JSON only, in this shape:
{"insights": [{"type": "saving", "message": "...", "affected_services": ["..."], "confidence_score": 0.8}]}

Subscription summary:
"#;

/// Build the insight prompt: fixed instructions followed by the summary as pretty JSON
pub fn build_insight_prompt(summary: &FeatureSummary) -> Result<String> {
    let data = serde_json::to_string_pretty(summary)?;
    Ok(format!("{}{}\n", INSTRUCTIONS, data))
}
