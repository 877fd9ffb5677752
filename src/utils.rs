use crate::error::{AnalyticsError, Result};
use crate::schema::MAX_MONTHS;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A calendar month, ordered chronologically.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(AnalyticsError::DateError(format!(
                "Invalid month {} for year {}: must be between 1 and 12",
                month, year
            )));
        }
        Ok(Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Shifts by whole months; negative offsets move into the past.
    pub fn offset(self, months: i32) -> Self {
        let index = self.year * 12 + (self.month as i32 - 1) + months;
        Self {
            year: index.div_euclid(12),
            month: index.rem_euclid(12) as u32 + 1,
        }
    }

    pub fn first_day(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    pub fn contains(self, date: NaiveDate) -> bool {
        Self::from_date(date) == self
    }

    /// Short display label, e.g. "Jan 2024".
    pub fn label(self) -> String {
        match self.first_day() {
            Some(date) => format_period_label(date),
            None => self.to_string(),
        }
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Formats a date as "Mon YYYY" (e.g. "Jan 2024").
pub fn format_period_label(date: NaiveDate) -> String {
    date.format("%b %Y").to_string()
}

/// Returns the `count` months ending with the month of `today`, oldest first.
/// `count` is capped at [`MAX_MONTHS`].
pub fn trailing_months(today: NaiveDate, count: usize) -> Vec<MonthKey> {
    let current = MonthKey::from_date(today);
    let count = i32::try_from(count.min(MAX_MONTHS)).unwrap_or(0);
    (0..count)
        .rev()
        .map(|back| current.offset(-back))
        .collect()
}

/// Parses a month string in the format "YYYY-MM".
pub fn parse_month(period: &str) -> Result<MonthKey> {
    let start_str = format!("{}-01", period.trim());
    let start_date = NaiveDate::parse_from_str(&start_str, "%Y-%m-%d").map_err(|_| {
        AnalyticsError::DateError(format!(
            "Invalid month format: {}. Expected YYYY-MM",
            period
        ))
    })?;
    Ok(MonthKey::from_date(start_date))
}

/// Parses the date shapes the database hands back: plain dates, RFC 3339
/// timestamps and "YYYY-MM-DD HH:MM:SS".
pub fn parse_flexible_date(value: &str) -> Result<NaiveDate> {
    let trimmed = value.trim();

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(ts.date_naive());
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S") {
        return Ok(ts.date());
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(ts.date());
    }

    Err(AnalyticsError::DateError(format!(
        "Unrecognized date '{}'. Expected YYYY-MM-DD or an RFC 3339 timestamp",
        value
    )))
}

/// Percentage change of `actual` against `expected`, 0 when nothing was expected.
pub fn variance_percentage(actual: f64, expected: f64) -> f64 {
    if expected > 0.0 {
        (actual - expected) / expected * 100.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_offset_crosses_years() {
        let jan = MonthKey::new(2024, 1).unwrap();
        assert_eq!(jan.offset(-1), MonthKey::new(2023, 12).unwrap());
        assert_eq!(jan.offset(-13), MonthKey::new(2022, 12).unwrap());
        assert_eq!(jan.offset(11), MonthKey::new(2024, 12).unwrap());
        assert_eq!(jan.offset(12), MonthKey::new(2025, 1).unwrap());
    }

    #[test]
    fn test_month_key_rejects_month_thirteen() {
        assert!(MonthKey::new(2024, 13).is_err());
        assert!(MonthKey::new(2024, 0).is_err());
    }

    #[test]
    fn test_month_key_display_and_label() {
        let key = MonthKey::new(2024, 3).unwrap();
        assert_eq!(key.to_string(), "2024-03");
        assert_eq!(key.label(), "Mar 2024");
    }

    #[test]
    fn test_month_key_contains() {
        let feb = MonthKey::new(2024, 2).unwrap();
        assert!(feb.contains(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()));
        assert!(!feb.contains(NaiveDate::from_ymd_opt(2023, 2, 1).unwrap()));
        assert!(!feb.contains(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()));
    }

    #[test]
    fn test_trailing_months() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let months: Vec<String> = trailing_months(today, 6)
            .into_iter()
            .map(|m| m.to_string())
            .collect();
        assert_eq!(
            months,
            vec!["2023-10", "2023-11", "2023-12", "2024-01", "2024-02", "2024-03"]
        );
    }

    #[test]
    fn test_trailing_months_is_capped() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let months = trailing_months(today, usize::MAX);
        assert_eq!(months.len(), MAX_MONTHS);
        assert_eq!(months.last().unwrap().to_string(), "2024-03");
        assert_eq!(months[0].to_string(), "1924-04");
    }

    #[test]
    fn test_parse_month() {
        assert_eq!(parse_month("2023-02").unwrap(), MonthKey::new(2023, 2).unwrap());
        assert!(parse_month("2023-13").is_err());
        assert!(parse_month("Feb 2023").is_err());
    }

    #[test]
    fn test_parse_flexible_date() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(parse_flexible_date("2024-01-15").unwrap(), expected);
        assert_eq!(
            parse_flexible_date("2024-01-15T10:30:00+00:00").unwrap(),
            expected
        );
        assert_eq!(parse_flexible_date("2024-01-15 08:00:00").unwrap(), expected);
        assert_eq!(
            parse_flexible_date("2024-01-15T08:00:00.123").unwrap(),
            expected
        );
        assert!(parse_flexible_date("not a date").is_err());
        assert!(parse_flexible_date("").is_err());
    }

    #[test]
    fn test_variance_percentage_zero_guard() {
        assert!((variance_percentage(1200.0, 1000.0) - 20.0).abs() < 1e-9);
        assert_eq!(variance_percentage(300.0, 0.0), 0.0);
    }
}
