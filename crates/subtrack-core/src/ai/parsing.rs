//! JSON parsing helpers for AI backend responses
//!
//! Models often wrap JSON in markdown fences or add prose around it, and
//! field shapes drift between models. Everything here is lenient on input
//! and strict on output.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::models::{GeneratedInsight, InsightType};

/// Maximum number of insights kept from one generation
pub const MAX_INSIGHTS: usize = 7;

/// Maximum number of service names kept per insight
pub const MAX_AFFECTED_SERVICES: usize = 10;

/// Confidence used when the model gives none
pub const DEFAULT_CONFIDENCE: f64 = 0.7;

/// Remove markdown code fence lines (```json ... ```)
pub fn strip_code_fences(response: &str) -> String {
    response
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn truncate_for_error(s: &str) -> String {
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s.to_string()
    }
}

/// Locate and parse the JSON payload in a model response
fn extract_json(response: &str) -> Result<Value> {
    let cleaned = strip_code_fences(response);
    let cleaned = cleaned.trim();

    if let Ok(value) = serde_json::from_str::<Value>(cleaned) {
        return Ok(value);
    }

    // Whichever bracket opens first decides the payload shape
    let array = cleaned.find('[').zip(cleaned.rfind(']'));
    let object = cleaned.find('{').zip(cleaned.rfind('}'));
    let mut candidates: Vec<(usize, usize)> = [array, object]
        .into_iter()
        .flatten()
        .filter(|(s, e)| s < e)
        .collect();
    candidates.sort_by_key(|(s, _)| *s);

    for (s, e) in candidates {
        if let Ok(value) = serde_json::from_str::<Value>(&cleaned[s..=e]) {
            return Ok(value);
        }
    }

    Err(Error::InvalidData(format!(
        "No JSON found in AI response | Raw: {}",
        truncate_for_error(cleaned)
    )))
}

/// Parse and sanitize an insight list from an AI response
///
/// Accepts a bare array, an object wrapping an `insights` array, or a
/// single insight object. Invalid items are dropped and the result is
/// capped at [`MAX_INSIGHTS`].
pub fn parse_insight_response(response: &str) -> Result<Vec<GeneratedInsight>> {
    let value = extract_json(response)?;

    let items: Vec<Value> = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("insights") {
            Some(Value::Array(items)) => items,
            Some(_) => {
                return Err(Error::InvalidData(
                    "AI response 'insights' field is not a list".into(),
                ))
            }
            None => vec![Value::Object(map)],
        },
        other => {
            return Err(Error::InvalidData(format!(
                "Unexpected AI response shape: {}",
                truncate_for_error(&other.to_string())
            )))
        }
    };

    Ok(items
        .iter()
        .filter_map(sanitize_insight)
        .take(MAX_INSIGHTS)
        .collect())
}

/// Normalize one raw insight object; `None` if it has no usable message
pub fn sanitize_insight(raw: &Value) -> Option<GeneratedInsight> {
    let obj = raw.as_object()?;

    let message = ["message", "description", "text"]
        .iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .filter(|m| !m.is_empty())?
        .to_string();

    let insight_type = ["type", "insight_type", "category"]
        .iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_str))
        .and_then(|t| t.parse::<InsightType>().ok())
        .unwrap_or(InsightType::Suggestion);

    let confidence_score = ["confidence_score", "confidence"]
        .iter()
        .find_map(|key| obj.get(*key).and_then(as_number))
        .filter(|c| c.is_finite())
        .map(|c| c.clamp(0.0, 1.0))
        .unwrap_or(DEFAULT_CONFIDENCE);

    let affected_services = match obj
        .get("affected_services")
        .or_else(|| obj.get("services"))
    {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .take(MAX_AFFECTED_SERVICES)
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    };

    Some(GeneratedInsight {
        insight_type,
        message,
        affected_services,
        confidence_score,
    })
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_array() {
        let response = r#"[
            {"type": "saving", "message": "Cancel Hulu", "affected_services": ["Hulu"], "confidence_score": 0.9},
            {"type": "warning", "message": "Price went up", "confidence_score": 0.6}
        ]"#;
        let insights = parse_insight_response(response).unwrap();
        assert_eq!(insights.len(), 2);
        assert_eq!(insights[0].insight_type, InsightType::Saving);
        assert_eq!(insights[0].affected_services, vec!["Hulu"]);
        assert!(insights[1].affected_services.is_empty());
    }

    #[test]
    fn test_parse_fenced_wrapped_object() {
        let response = "Here you go:\n```json\n{\"insights\": [{\"type\": \"trend\", \"message\": \"Streaming is your top category\"}]}\n```";
        let insights = parse_insight_response(response).unwrap();
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].insight_type, InsightType::Trend);
        assert_eq!(insights[0].confidence_score, DEFAULT_CONFIDENCE);
    }

    #[test]
    fn test_parse_single_object() {
        let insights =
            parse_insight_response(r#"{"type": "reminder", "message": "Netflix renews tomorrow"}"#)
                .unwrap();
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].insight_type, InsightType::Reminder);
    }

    #[test]
    fn test_sanitize_clamps_and_defaults() {
        let response = r#"[
            {"type": "bogus", "message": "A", "confidence_score": 3.5},
            {"type": "saving", "message": "B", "confidence_score": -1},
            {"type": "saving", "message": "C", "confidence": "0.4"},
            {"type": "saving", "message": "D", "affected_services": "Spotify"}
        ]"#;
        let insights = parse_insight_response(response).unwrap();
        assert_eq!(insights[0].insight_type, InsightType::Suggestion);
        assert_eq!(insights[0].confidence_score, 1.0);
        assert_eq!(insights[1].confidence_score, 0.0);
        assert_eq!(insights[2].confidence_score, 0.4);
        assert_eq!(insights[3].affected_services, vec!["Spotify"]);
    }

    #[test]
    fn test_sanitize_drops_empty_messages() {
        let response = r#"[
            {"type": "saving", "message": "   "},
            {"type": "saving"},
            "not an object",
            {"type": "saving", "message": "Keep me"}
        ]"#;
        let insights = parse_insight_response(response).unwrap();
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].message, "Keep me");
    }

    #[test]
    fn test_caps_items_and_services() {
        let services: Vec<String> = (0..15).map(|i| format!("\"S{}\"", i)).collect();
        let items: Vec<String> = (0..12)
            .map(|i| {
                format!(
                    r#"{{"type": "saving", "message": "M{}", "affected_services": [{}]}}"#,
                    i,
                    services.join(",")
                )
            })
            .collect();
        let response = format!("[{}]", items.join(","));

        let insights = parse_insight_response(&response).unwrap();
        assert_eq!(insights.len(), MAX_INSIGHTS);
        assert!(insights
            .iter()
            .all(|i| i.affected_services.len() == MAX_AFFECTED_SERVICES));
    }

    #[test]
    fn test_no_json_is_error() {
        assert!(matches!(
            parse_insight_response("I cannot help with that."),
            Err(Error::InvalidData(_))
        ));
        assert!(parse_insight_response("42").is_err());
    }
}
