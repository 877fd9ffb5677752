use crate::error::{AnalyticsError, Result};
use crate::schema::{InvoiceRecord, ProjectionPriority, ProjectionRecord, ProjectionStatus};
use crate::utils::parse_flexible_date;
use chrono::NaiveDate;
use log::warn;
use serde::{Deserialize, Serialize};

/// A numeric column as the database returns it: sometimes a number,
/// sometimes a numeric string (`line_total` is stored as text).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawAmount {
    Number(f64),
    Text(String),
}

impl RawAmount {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) if n.is_finite() => Some(*n),
            Self::Number(_) => None,
            Self::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawBillingPeriod {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawLocation {
    #[serde(default)]
    pub location_description: Option<String>,
}

/// One row of the `projections` table joined with its location and billing period.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawProjectionRow {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub location_description: Option<String>,
    #[serde(default)]
    pub staff_locations: Option<RawLocation>,
    #[serde(default)]
    pub billing_periods: Option<RawBillingPeriod>,
    #[serde(default)]
    pub expected_revenue: Option<RawAmount>,
    #[serde(default)]
    pub expected_hours: Option<RawAmount>,
    #[serde(default)]
    pub actual_revenue: Option<RawAmount>,
    #[serde(default)]
    pub actual_hours: Option<RawAmount>,
    #[serde(default)]
    pub variance_percentage: Option<RawAmount>,
    #[serde(default)]
    pub estimator_percentage: Option<RawAmount>,
    #[serde(default)]
    pub projection_date: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
}

/// One row of the `finance_invoices` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawInvoiceRow {
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub line_total: Option<RawAmount>,
    #[serde(default)]
    pub date_paid: Option<String>,
    #[serde(default)]
    pub invoice_status: Option<String>,
}

/// What happened to a batch of raw rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionReport {
    pub accepted: usize,
    pub rejected: usize,
    /// Accepted rows where at least one field fell back to a default.
    pub coerced: usize,
}

/// Tracks per-row coercions so each row is counted once.
struct RowContext<'a> {
    table: &'a str,
    row: usize,
    coerced: bool,
}

impl<'a> RowContext<'a> {
    fn new(table: &'a str, row: usize) -> Self {
        Self {
            table,
            row,
            coerced: false,
        }
    }

    fn amount_or_zero(&mut self, field: &str, raw: &Option<RawAmount>) -> f64 {
        self.optional_amount(field, raw).unwrap_or(0.0)
    }

    fn optional_amount(&mut self, field: &str, raw: &Option<RawAmount>) -> Option<f64> {
        let raw = raw.as_ref()?;
        match raw.as_f64() {
            Some(value) => Some(value),
            None => {
                warn!(
                    "{} row #{}: non-numeric {} {:?}, treating as 0",
                    self.table, self.row, field, raw
                );
                self.coerced = true;
                None
            }
        }
    }

    fn optional_date(&mut self, field: &str, raw: Option<&str>) -> Option<NaiveDate> {
        let raw = raw?;
        match parse_flexible_date(raw) {
            Ok(date) => Some(date),
            Err(e) => {
                warn!("{} row #{}: ignoring {}: {}", self.table, self.row, field, e);
                self.coerced = true;
                None
            }
        }
    }

    fn malformed(&self, details: impl Into<String>) -> AnalyticsError {
        AnalyticsError::MalformedRow {
            table: self.table.to_string(),
            row: self.row,
            details: details.into(),
        }
    }
}

impl RawProjectionRow {
    /// Label used to reconcile the projection: title, then location, then "Unknown".
    pub fn entity_label(&self) -> String {
        let nested = self
            .staff_locations
            .as_ref()
            .and_then(|l| l.location_description.as_deref());

        [self.title.as_deref(), self.location_description.as_deref(), nested]
            .into_iter()
            .flatten()
            .find(|label| !label.trim().is_empty())
            .unwrap_or("Unknown")
            .to_string()
    }

    fn location(&self) -> Option<String> {
        self.staff_locations
            .as_ref()
            .and_then(|l| l.location_description.clone())
            .or_else(|| self.location_description.clone())
    }

    fn to_record(&self, ctx: &mut RowContext<'_>) -> ProjectionRecord {
        let period = self.billing_periods.clone().unwrap_or_default();

        let status = match self.status.as_deref() {
            None => ProjectionStatus::default(),
            Some(raw) => raw.parse::<ProjectionStatus>().unwrap_or_else(|e| {
                warn!("{} row #{}: {}, assuming ACTIVE", ctx.table, ctx.row, e);
                ctx.coerced = true;
                ProjectionStatus::default()
            }),
        };
        let priority = match self.priority.as_deref() {
            None => ProjectionPriority::default(),
            Some(raw) => raw.parse::<ProjectionPriority>().unwrap_or_else(|e| {
                warn!("{} row #{}: {}, assuming MEDIUM", ctx.table, ctx.row, e);
                ctx.coerced = true;
                ProjectionPriority::default()
            }),
        };

        ProjectionRecord {
            entity_label: self.entity_label(),
            expected_revenue: ctx.amount_or_zero("expected_revenue", &self.expected_revenue),
            expected_hours: ctx.amount_or_zero("expected_hours", &self.expected_hours),
            actual_revenue: ctx.optional_amount("actual_revenue", &self.actual_revenue),
            actual_hours: ctx.optional_amount("actual_hours", &self.actual_hours),
            period_label: period.name.clone(),
            period_start: ctx.optional_date("billing period start", period.start_date.as_deref()),
            projection_date: ctx.optional_date("projection_date", self.projection_date.as_deref()),
            status,
            priority,
            location: self.location(),
            variance_percentage: ctx
                .optional_amount("variance_percentage", &self.variance_percentage),
            estimator_percentage: ctx
                .optional_amount("estimator_percentage", &self.estimator_percentage),
        }
    }
}

impl RawInvoiceRow {
    fn to_record(&self, ctx: &mut RowContext<'_>) -> Result<InvoiceRecord> {
        if let Some(status) = self.invoice_status.as_deref() {
            if !status.trim().eq_ignore_ascii_case("paid") {
                return Err(ctx.malformed(format!("invoice status is '{}', not paid", status)));
            }
        }

        let client_name = self
            .client_name
            .clone()
            .ok_or_else(|| ctx.malformed("missing client_name"))?;

        let raw_date = self
            .date_paid
            .as_deref()
            .ok_or_else(|| ctx.malformed("missing date_paid"))?;
        let date_paid =
            parse_flexible_date(raw_date).map_err(|e| ctx.malformed(e.to_string()))?;

        Ok(InvoiceRecord {
            client_name,
            amount_paid: ctx.amount_or_zero("line_total", &self.line_total),
            date_paid,
        })
    }
}

/// Converts projection rows. Rows are never dropped: unparseable numbers
/// become 0 and unparseable dates become `None`, each with a warning.
pub fn convert_projection_rows(
    rows: &[RawProjectionRow],
) -> (Vec<ProjectionRecord>, IngestionReport) {
    let mut report = IngestionReport::default();
    let records = rows
        .iter()
        .enumerate()
        .map(|(idx, row)| {
            let mut ctx = RowContext::new("projections", idx);
            let record = row.to_record(&mut ctx);
            report.accepted += 1;
            if ctx.coerced {
                report.coerced += 1;
            }
            record
        })
        .collect();
    (records, report)
}

/// Converts invoice rows. Rows without a usable payment date or client, or
/// whose status is not "paid", are rejected with a warning.
pub fn convert_invoice_rows(rows: &[RawInvoiceRow]) -> (Vec<InvoiceRecord>, IngestionReport) {
    let mut report = IngestionReport::default();
    let mut records = Vec::with_capacity(rows.len());

    for (idx, row) in rows.iter().enumerate() {
        let mut ctx = RowContext::new("finance_invoices", idx);
        match row.to_record(&mut ctx) {
            Ok(record) => {
                report.accepted += 1;
                if ctx.coerced {
                    report.coerced += 1;
                }
                records.push(record);
            }
            Err(e) => {
                warn!("Skipping invoice: {}", e);
                report.rejected += 1;
            }
        }
    }

    (records, report)
}

pub fn parse_projection_rows_json(
    json: &str,
) -> Result<(Vec<ProjectionRecord>, IngestionReport)> {
    let rows: Vec<RawProjectionRow> = serde_json::from_str(json)?;
    Ok(convert_projection_rows(&rows))
}

pub fn parse_invoice_rows_json(
    json: &str,
) -> Result<(Vec<InvoiceRecord>, IngestionReport)> {
    let rows: Vec<RawInvoiceRow> = serde_json::from_str(json)?;
    Ok(convert_invoice_rows(&rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_parsing() {
        assert_eq!(RawAmount::Number(12.5).as_f64(), Some(12.5));
        assert_eq!(RawAmount::Text(" 1200.50 ".to_string()).as_f64(), Some(1200.5));
        assert_eq!(RawAmount::Text("n/a".to_string()).as_f64(), None);
        assert_eq!(RawAmount::Text("NaN".to_string()).as_f64(), None);
    }

    #[test]
    fn test_projection_label_fallbacks() {
        let titled = RawProjectionRow {
            title: Some("Harbor Project".to_string()),
            location_description: Some("Harbor".to_string()),
            ..Default::default()
        };
        assert_eq!(titled.entity_label(), "Harbor Project");

        let nested = RawProjectionRow {
            staff_locations: Some(RawLocation {
                location_description: Some("Main Street".to_string()),
            }),
            ..Default::default()
        };
        assert_eq!(nested.entity_label(), "Main Street");

        let blank_title = RawProjectionRow {
            title: Some("  ".to_string()),
            location_description: Some("Harbor".to_string()),
            ..Default::default()
        };
        assert_eq!(blank_title.entity_label(), "Harbor");

        assert_eq!(RawProjectionRow::default().entity_label(), "Unknown");
    }

    #[test]
    fn test_projection_rows_from_json() {
        let json = r#"[
            {
                "title": "Acme Corp",
                "expected_revenue": 1000,
                "expected_hours": "40",
                "actual_revenue": null,
                "projection_date": "2024-01-05",
                "status": "APPROVED",
                "priority": "HIGH",
                "estimator_percentage": "7.5",
                "billing_periods": {"name": "Jan 2024", "start_date": "2024-01-01", "end_date": "2024-01-31"}
            },
            {
                "location_description": "North Site",
                "expected_revenue": "abc",
                "projection_date": "sometime",
                "status": "PENDING"
            }
        ]"#;

        let (records, report) = parse_projection_rows_json(json).unwrap();
        assert_eq!(report.accepted, 2);
        assert_eq!(report.rejected, 0);
        assert_eq!(report.coerced, 1);

        let acme = &records[0];
        assert_eq!(acme.entity_label, "Acme Corp");
        assert_eq!(acme.expected_revenue, 1000.0);
        assert_eq!(acme.expected_hours, 40.0);
        assert_eq!(acme.actual_revenue, None);
        assert_eq!(acme.period_label.as_deref(), Some("Jan 2024"));
        assert_eq!(acme.period_start, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(acme.status, ProjectionStatus::Approved);
        assert_eq!(acme.priority, ProjectionPriority::High);
        assert_eq!(acme.estimator_percentage, Some(7.5));

        let north = &records[1];
        assert_eq!(north.expected_revenue, 0.0);
        assert_eq!(north.projection_date, None);
        assert_eq!(north.status, ProjectionStatus::Active);
        assert_eq!(north.location.as_deref(), Some("North Site"));
        assert_eq!(north.estimator_percentage, None);
    }

    #[test]
    fn test_invoice_rows_from_json() {
        let json = r#"[
            {"client_name": "ACME CORP.", "line_total": "1200.00", "date_paid": "2024-01-15", "invoice_status": "paid"},
            {"client_name": "Beta LLC", "line_total": 50, "date_paid": "2024-01-16T09:00:00Z"},
            {"client_name": "Gamma Inc", "line_total": "oops", "date_paid": "2024-01-17"},
            {"client_name": "Draft Co", "line_total": 10, "date_paid": "2024-01-18", "invoice_status": "draft"},
            {"client_name": "No Date", "line_total": 10},
            {"client_name": "Bad Date", "line_total": 10, "date_paid": "31/01/2024"},
            {"line_total": 10, "date_paid": "2024-01-18"}
        ]"#;

        let (records, report) = parse_invoice_rows_json(json).unwrap();
        assert_eq!(report.accepted, 3);
        assert_eq!(report.rejected, 4);
        assert_eq!(report.coerced, 1);

        assert_eq!(records[0].amount_paid, 1200.0);
        assert_eq!(records[1].date_paid, NaiveDate::from_ymd_opt(2024, 1, 16).unwrap());
        assert_eq!(records[2].amount_paid, 0.0);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(matches!(
            parse_invoice_rows_json("{not json"),
            Err(AnalyticsError::SerializationError(_))
        ));
    }
}
