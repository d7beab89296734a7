//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod ai_insights;
pub mod analytics;
pub mod auth;
pub mod budget;
pub mod health;
pub mod notifications;
pub mod payments;
pub mod shared_plans;
pub mod subscriptions;
pub mod user;

// Re-export all handlers for use in router
pub use ai_insights::*;
pub use analytics::*;
pub use auth::*;
pub use budget::*;
pub use health::*;
pub use notifications::*;
pub use payments::*;
pub use shared_plans::*;
pub use subscriptions::*;
pub use user::*;

use chrono::NaiveDate;

use crate::AppError;

/// Current local date, the reference for billing windows and analytics
pub(crate) fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Collects required request fields that were absent or blank
///
/// ```rust,ignore
/// let mut required = RequiredFields::default();
/// let name = required.text("name", req.name.as_deref());
/// let amount = required.value("amount", req.amount);
/// required.finish()?;
/// ```
#[derive(Default)]
pub(crate) struct RequiredFields(Vec<&'static str>);

impl RequiredFields {
    pub fn value<T>(&mut self, field: &'static str, value: Option<T>) -> Option<T> {
        if value.is_none() {
            self.0.push(field);
        }
        value
    }

    /// Trimmed text; blank counts as missing
    pub fn text(&mut self, field: &'static str, value: Option<&str>) -> Option<String> {
        let value = value.map(str::trim).filter(|v| !v.is_empty()).map(String::from);
        self.value(field, value)
    }

    /// 400 listing every missing field, if any
    pub fn finish(self) -> Result<(), AppError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(AppError::missing_fields(&self.0))
        }
    }
}

/// Parse an optional enum query/body value, rejecting unknown tags with 400
pub(crate) fn parse_optional<T>(field: &str, value: Option<&str>) -> Result<Option<T>, AppError>
where
    T: std::str::FromStr<Err = String>,
{
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| {
            v.parse::<T>()
                .map_err(|e| AppError::bad_request(&format!("Invalid {}: {}", field, e)))
        })
        .transpose()
}
