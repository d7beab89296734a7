//! Billing-cycle arithmetic
//!
//! All cost normalization goes through [`normalize_amount`] so that the
//! dashboard, trends, budget and insight features agree on the same numbers.

use chrono::{Days, Months, NaiveDate};

use crate::error::{Error, Result};
use crate::models::{AnalyticsPeriod, BillingCycle};

/// Average number of weeks in a month
pub const WEEKS_PER_MONTH: f64 = 4.33;

/// Compute the next billing date one cycle after `reference`
///
/// Calendar-month steps clamp to the last day of the target month, so
/// January 31 advances to February 28 (or 29).
pub fn next_billing_date(cycle: BillingCycle, reference: NaiveDate) -> Result<NaiveDate> {
    let next = match cycle {
        BillingCycle::Daily => reference.checked_add_days(Days::new(1)),
        BillingCycle::Weekly => reference.checked_add_days(Days::new(7)),
        BillingCycle::Monthly => reference.checked_add_months(Months::new(1)),
        BillingCycle::Quarterly => reference.checked_add_months(Months::new(3)),
        BillingCycle::Yearly => reference.checked_add_months(Months::new(12)),
    };

    next.ok_or_else(|| {
        Error::InvalidData(format!(
            "Billing date out of range: {} + {}",
            reference, cycle
        ))
    })
}

/// Convert a per-cycle amount into the equivalent amount for a reporting period
pub fn normalize_amount(amount: f64, cycle: BillingCycle, period: AnalyticsPeriod) -> f64 {
    match period {
        AnalyticsPeriod::Weekly => match cycle {
            BillingCycle::Daily => amount * 7.0,
            BillingCycle::Weekly => amount,
            BillingCycle::Monthly => amount / WEEKS_PER_MONTH,
            BillingCycle::Quarterly => amount / 13.0,
            BillingCycle::Yearly => amount / 52.0,
        },
        AnalyticsPeriod::Monthly => match cycle {
            BillingCycle::Daily => amount * 30.0,
            BillingCycle::Weekly => amount * WEEKS_PER_MONTH,
            BillingCycle::Monthly => amount,
            BillingCycle::Quarterly => amount / 3.0,
            BillingCycle::Yearly => amount / 12.0,
        },
        AnalyticsPeriod::Yearly => match cycle {
            BillingCycle::Daily => amount * 365.0,
            BillingCycle::Weekly => amount * 52.0,
            BillingCycle::Monthly => amount * 12.0,
            BillingCycle::Quarterly => amount * 4.0,
            BillingCycle::Yearly => amount,
        },
    }
}

/// Monthly cost of a subscription
pub fn monthly_equivalent(amount: f64, cycle: BillingCycle) -> f64 {
    normalize_amount(amount, cycle, AnalyticsPeriod::Monthly)
}

/// Round to cents for presentation
pub fn round_currency(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_next_billing_date_per_cycle() {
        let start = date(2024, 3, 15);
        assert_eq!(
            next_billing_date(BillingCycle::Daily, start).unwrap(),
            date(2024, 3, 16)
        );
        assert_eq!(
            next_billing_date(BillingCycle::Weekly, start).unwrap(),
            date(2024, 3, 22)
        );
        assert_eq!(
            next_billing_date(BillingCycle::Monthly, start).unwrap(),
            date(2024, 4, 15)
        );
        assert_eq!(
            next_billing_date(BillingCycle::Quarterly, start).unwrap(),
            date(2024, 6, 15)
        );
        assert_eq!(
            next_billing_date(BillingCycle::Yearly, start).unwrap(),
            date(2025, 3, 15)
        );
    }

    #[test]
    fn test_next_billing_date_clamps_month_end() {
        assert_eq!(
            next_billing_date(BillingCycle::Monthly, date(2024, 1, 31)).unwrap(),
            date(2024, 2, 29)
        );
        assert_eq!(
            next_billing_date(BillingCycle::Monthly, date(2023, 1, 31)).unwrap(),
            date(2023, 2, 28)
        );
        assert_eq!(
            next_billing_date(BillingCycle::Quarterly, date(2024, 11, 30)).unwrap(),
            date(2025, 2, 28)
        );
        assert_eq!(
            next_billing_date(BillingCycle::Yearly, date(2024, 2, 29)).unwrap(),
            date(2025, 2, 28)
        );
    }

    #[test]
    fn test_unknown_cycle_advances_monthly() {
        let cycle = BillingCycle::parse_or_default(Some("biweekly"));
        assert_eq!(
            next_billing_date(cycle, date(2024, 5, 10)).unwrap(),
            date(2024, 6, 10)
        );
    }

    #[test]
    fn test_next_billing_date_overflow_is_error() {
        assert!(next_billing_date(BillingCycle::Yearly, NaiveDate::MAX).is_err());
    }

    #[test]
    fn test_normalize_amount_table() {
        let eps = 1e-9;
        assert!((normalize_amount(1200.0, BillingCycle::Monthly, AnalyticsPeriod::Yearly) - 14400.0).abs() < eps);
        assert!((normalize_amount(1200.0, BillingCycle::Yearly, AnalyticsPeriod::Monthly) - 100.0).abs() < eps);
        assert!((normalize_amount(10.0, BillingCycle::Weekly, AnalyticsPeriod::Monthly) - 43.3).abs() < eps);
        assert!((normalize_amount(2.0, BillingCycle::Daily, AnalyticsPeriod::Weekly) - 14.0).abs() < eps);
        assert!((normalize_amount(30.0, BillingCycle::Quarterly, AnalyticsPeriod::Monthly) - 10.0).abs() < eps);
        assert!((normalize_amount(52.0, BillingCycle::Yearly, AnalyticsPeriod::Weekly) - 1.0).abs() < eps);
        assert!((normalize_amount(5.0, BillingCycle::Quarterly, AnalyticsPeriod::Yearly) - 20.0).abs() < eps);
    }

    #[test]
    fn test_monthly_equivalent_and_rounding() {
        assert_eq!(round_currency(monthly_equivalent(99.99, BillingCycle::Yearly)), 8.33);
        assert_eq!(round_currency(monthly_equivalent(15.49, BillingCycle::Monthly)), 15.49);
        assert_eq!(round_currency(100.0 / 3.0), 33.33);
    }
}
