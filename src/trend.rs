use crate::schema::{
    InvoiceRecord, MonthlyPoint, PeriodPerformance, ProjectionRecord, DEFAULT_TREND_MONTHS,
};
use crate::utils::{trailing_months, variance_percentage, MonthKey};
use chrono::NaiveDate;
use std::collections::BTreeMap;

#[derive(Debug, Default, Clone, Copy)]
struct MonthTotals {
    expected: f64,
    actual: f64,
    projections: usize,
}

/// Six-month trend ending with the month of `today`, oldest first.
pub fn build_monthly_trend(
    invoices: &[InvoiceRecord],
    projections: &[ProjectionRecord],
    today: NaiveDate,
) -> Vec<MonthlyPoint> {
    build_trend(invoices, projections, today, DEFAULT_TREND_MONTHS)
}

/// Trend over the `months` calendar months ending with the month of `today`.
///
/// Returns exactly `months` points, capped at [`MAX_MONTHS`](crate::schema::MAX_MONTHS).
/// Months without data are zero filled. Invoices count by payment date,
/// projections by projection date; projections without a date are left out.
pub fn build_trend(
    invoices: &[InvoiceRecord],
    projections: &[ProjectionRecord],
    today: NaiveDate,
    months: usize,
) -> Vec<MonthlyPoint> {
    let mut grid: BTreeMap<MonthKey, MonthTotals> = trailing_months(today, months)
        .into_iter()
        .map(|month| (month, MonthTotals::default()))
        .collect();

    for invoice in invoices {
        if let Some(totals) = grid.get_mut(&MonthKey::from_date(invoice.date_paid)) {
            totals.actual += invoice.amount_paid;
        }
    }

    for projection in projections {
        let Some(date) = projection.projection_date else {
            continue;
        };
        if let Some(totals) = grid.get_mut(&MonthKey::from_date(date)) {
            totals.expected += projection.expected_revenue;
            totals.projections += 1;
        }
    }

    grid.into_iter()
        .map(|(month, totals)| MonthlyPoint {
            month: month.to_string(),
            variance_percentage: variance_percentage(totals.actual, totals.expected),
            projections: totals.projections,
            actual_revenue: totals.actual,
            expected_revenue: totals.expected,
        })
        .collect()
}

/// Projected vs actual for every month that has any data, in calendar order.
/// Projections are placed by the start of their billing period.
pub fn build_period_breakdown(
    projections: &[ProjectionRecord],
    invoices: &[InvoiceRecord],
) -> Vec<PeriodPerformance> {
    let mut months: BTreeMap<MonthKey, (f64, f64)> = BTreeMap::new();

    for projection in projections {
        if let Some(start) = projection.period_start {
            months.entry(MonthKey::from_date(start)).or_default().0 += projection.expected_revenue;
        }
    }

    for invoice in invoices {
        months.entry(MonthKey::from_date(invoice.date_paid)).or_default().1 += invoice.amount_paid;
    }

    months
        .into_iter()
        .map(|(month, (projected, actual))| PeriodPerformance {
            month: month.to_string(),
            label: month.label(),
            projected,
            actual,
            variance: actual - projected,
            variance_percentage: variance_percentage(actual, projected),
        })
        .collect()
}
