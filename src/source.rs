use crate::error::Result;
use crate::schema::{InvoiceRecord, ProjectionRecord, ProjectionStatus};
use crate::utils::{parse_month, MonthKey};
use chrono::NaiveDate;
use futures::future::{self, BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};

/// One calendar month used to restrict invoices by payment date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub year: i32,
    pub month: u32,
}

impl DateRange {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        MonthKey::new(year, month)?;
        Ok(Self { year, month })
    }

    /// Parses "YYYY-MM".
    pub fn parse(value: &str) -> Result<Self> {
        Ok(parse_month(value)?.into())
    }

    pub fn month(&self) -> MonthKey {
        MonthKey {
            year: self.year,
            month: self.month,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.month().contains(date)
    }

    /// True when `date` falls in any of `ranges`. No ranges means no restriction.
    pub fn any_contains(ranges: &[DateRange], date: NaiveDate) -> bool {
        ranges.is_empty() || ranges.iter().any(|r| r.contains(date))
    }
}

impl From<MonthKey> for DateRange {
    fn from(month: MonthKey) -> Self {
        Self {
            year: month.year,
            month: month.month,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionFilter {
    /// `None` fetches projections in every status.
    pub status: Option<ProjectionStatus>,
}

impl Default for ProjectionFilter {
    fn default() -> Self {
        Self {
            status: Some(ProjectionStatus::Active),
        }
    }
}

impl ProjectionFilter {
    pub fn all() -> Self {
        Self { status: None }
    }

    pub fn accepts(&self, projection: &ProjectionRecord) -> bool {
        self.status.map_or(true, |status| projection.status == status)
    }
}

/// The external query layer the analytics read from.
pub trait AnalyticsSource: Send + Sync {
    fn fetch_projections<'a>(
        &'a self,
        filter: &'a ProjectionFilter,
    ) -> BoxFuture<'a, Result<Vec<ProjectionRecord>>>;

    /// Paid invoices whose payment date falls in any of `ranges`.
    fn fetch_paid_invoices<'a>(
        &'a self,
        ranges: &'a [DateRange],
    ) -> BoxFuture<'a, Result<Vec<InvoiceRecord>>>;
}

/// Serves already-loaded rows, applying the same filters a database query would.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    projections: Vec<ProjectionRecord>,
    invoices: Vec<InvoiceRecord>,
}

impl InMemorySource {
    pub fn new(projections: Vec<ProjectionRecord>, invoices: Vec<InvoiceRecord>) -> Self {
        Self {
            projections,
            invoices,
        }
    }
}

impl AnalyticsSource for InMemorySource {
    fn fetch_projections<'a>(
        &'a self,
        filter: &'a ProjectionFilter,
    ) -> BoxFuture<'a, Result<Vec<ProjectionRecord>>> {
        let rows: Vec<ProjectionRecord> = self
            .projections
            .iter()
            .filter(|p| filter.accepts(p))
            .cloned()
            .collect();
        future::ready(Ok(rows)).boxed()
    }

    fn fetch_paid_invoices<'a>(
        &'a self,
        ranges: &'a [DateRange],
    ) -> BoxFuture<'a, Result<Vec<InvoiceRecord>>> {
        let rows: Vec<InvoiceRecord> = self
            .invoices
            .iter()
            .filter(|i| DateRange::any_contains(ranges, i.date_paid))
            .cloned()
            .collect();
        future::ready(Ok(rows)).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_date_range_parse_and_contains() {
        let range = DateRange::parse("2024-02").unwrap();
        assert_eq!(range, DateRange::new(2024, 2).unwrap());
        assert!(range.contains(date(2024, 2, 29)));
        assert!(!range.contains(date(2024, 3, 1)));
        assert!(DateRange::new(2024, 13).is_err());
        assert_eq!(DateRange::from(range.month()), range);
    }

    #[test]
    fn test_any_range_matches() {
        let ranges = [DateRange::new(2024, 1).unwrap(), DateRange::new(2024, 3).unwrap()];
        assert!(DateRange::any_contains(&ranges, date(2024, 3, 5)));
        assert!(!DateRange::any_contains(&ranges, date(2024, 2, 5)));
        assert!(DateRange::any_contains(&[], date(1999, 1, 1)));
    }

    #[test]
    fn test_in_memory_source_filters() {
        let source = InMemorySource::new(
            vec![
                ProjectionRecord::new("Active Co", 100.0),
                ProjectionRecord::new("Draft Co", 100.0).with_status(ProjectionStatus::Draft),
            ],
            vec![
                InvoiceRecord::new("Jan", 1.0, date(2024, 1, 10)),
                InvoiceRecord::new("Feb", 2.0, date(2024, 2, 10)),
            ],
        );

        let active = block_on(source.fetch_projections(&ProjectionFilter::default())).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].entity_label, "Active Co");

        let all = block_on(source.fetch_projections(&ProjectionFilter::all())).unwrap();
        assert_eq!(all.len(), 2);

        let ranges = [DateRange::new(2024, 2).unwrap()];
        let feb = block_on(source.fetch_paid_invoices(&ranges)).unwrap();
        assert_eq!(feb.len(), 1);
        assert_eq!(feb[0].client_name, "Feb");

        assert_eq!(block_on(source.fetch_paid_invoices(&[])).unwrap().len(), 2);
    }
}
