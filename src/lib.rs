//! # Revenue Performance Analytics
//!
//! Reconciles projected revenue against paid invoices and scores how each
//! company (or site) performed against its projection.
//!
//! ## Core Concepts
//!
//! - **Normalization**: Company and location names from different tables are
//!   lowercased and stripped of punctuation before they are compared
//! - **Fuzzy Matching**: An invoice joins an existing company when the
//!   normalized Levenshtein similarity of the names is at least 0.8
//! - **Reconciliation**: Projections seed one bucket per normalized name;
//!   invoices fold into the first matching bucket or open a new one
//! - **Performance Score**: Actual over projected revenue, scaled to 0-100;
//!   companies with nothing projected score a neutral 50
//! - **Monthly Trend**: A zero-filled six-month series of projected vs actual
//!   revenue ending with the current month
//! - **Revenue Forecast**: A least-squares trend over monthly paid revenue,
//!   blended with upcoming projections for the next six months, plus growth,
//!   seasonality and per-client breakdowns
//!
//! ## Example
//!
//! ```rust,ignore
//! use revenue_performance_analytics::*;
//! use chrono::NaiveDate;
//!
//! let projections = vec![
//!     ProjectionRecord::new("Acme Corp", 1000.0).with_period("Jan 2024", None),
//! ];
//! let invoices = vec![InvoiceRecord::new(
//!     "ACME CORP.",
//!     1200.0,
//!     NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
//! )];
//!
//! let today = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
//! let report = analyze_performance(&projections, &invoices, today);
//! assert_eq!(report.company_performances[0].performance_score, 100.0);
//! ```

pub mod error;
pub mod forecast;
pub mod ingestion;
pub mod matcher;
pub mod metrics;
pub mod normalize;
pub mod reconciler;
pub mod schema;
pub mod source;
pub mod stats;
pub mod trend;
pub mod utils;

pub use error::{AnalyticsError, Result};
pub use forecast::{fit_trend_line, forecast_revenue, growth_metrics, RevenueForecaster};
pub use ingestion::*;
pub use matcher::{is_match, similarity, FuzzyMatcher};
pub use metrics::{score_entities, MetricsCalculator, RankedPerformance};
pub use normalize::normalize;
pub use reconciler::{reconcile, EntityBucket, EntityBuckets, Reconciler};
pub use schema::*;
pub use source::{AnalyticsSource, DateRange, InMemorySource, ProjectionFilter};
pub use stats::{LocationTotals, ProjectionStats};
pub use trend::{build_monthly_trend, build_period_breakdown, build_trend};
pub use utils::MonthKey;

use chrono::NaiveDate;
use futures::future;
use log::{debug, info};

pub struct PerformanceAnalyzer {
    config: AnalyticsConfig,
    matcher: FuzzyMatcher,
    projection_filter: ProjectionFilter,
}

impl Default for PerformanceAnalyzer {
    fn default() -> Self {
        Self {
            config: AnalyticsConfig::default(),
            matcher: FuzzyMatcher::default(),
            projection_filter: ProjectionFilter::default(),
        }
    }
}

impl PerformanceAnalyzer {
    pub fn new(config: AnalyticsConfig) -> Result<Self> {
        config.validate()?;
        let matcher = FuzzyMatcher::new(config.match_threshold)?;
        Ok(Self {
            config,
            matcher,
            projection_filter: ProjectionFilter::default(),
        })
    }

    pub fn with_projection_filter(mut self, filter: ProjectionFilter) -> Self {
        self.projection_filter = filter;
        self
    }

    /// Runs the whole pipeline over rows already in memory. Never fails; empty
    /// inputs give a zeroed report with a zero-filled trend.
    pub fn analyze(
        &self,
        projections: &[ProjectionRecord],
        invoices: &[InvoiceRecord],
        today: NaiveDate,
    ) -> PerformanceReport {
        debug!(
            "Analyzing {} projections against {} paid invoices",
            projections.len(),
            invoices.len()
        );

        let buckets =
            Reconciler::with_matcher(&self.config, self.matcher).reconcile(projections, invoices);
        let ranked = MetricsCalculator::new(&self.config).rank(&buckets);

        info!(
            "Performance analytics: {} companies analyzed, overall performance {:.1}%",
            ranked.company_performances.len(),
            ranked.summary.performance_score
        );

        PerformanceReport {
            summary: ranked.summary,
            company_performances: ranked.company_performances,
            top_performers: ranked.top_performers,
            under_performers: ranked.under_performers,
            monthly_trend: build_trend(invoices, projections, today, self.config.trend_months),
            period_breakdown: build_period_breakdown(projections, invoices),
        }
    }

    /// Fetches projections and paid invoices from `source`, then analyzes them.
    /// Fetch failures are returned as [`AnalyticsError::UpstreamFetch`]; nothing
    /// is retried.
    pub async fn run<S>(
        &self,
        source: &S,
        ranges: &[DateRange],
        today: NaiveDate,
    ) -> Result<PerformanceReport>
    where
        S: AnalyticsSource + ?Sized,
    {
        let (projections, invoices) = future::try_join(
            async {
                source
                    .fetch_projections(&self.projection_filter)
                    .await
                    .map_err(|e| as_upstream("projections", e))
            },
            async {
                source
                    .fetch_paid_invoices(ranges)
                    .await
                    .map_err(|e| as_upstream("paid invoices", e))
            },
        )
        .await?;

        info!(
            "Found {} projections and {} paid invoices",
            projections.len(),
            invoices.len()
        );

        Ok(self.analyze(&projections, &invoices, today))
    }

    /// Forecasts revenue from rows already in memory.
    pub fn forecast(
        &self,
        projections: &[ProjectionRecord],
        invoices: &[InvoiceRecord],
        today: NaiveDate,
    ) -> RevenueForecast {
        RevenueForecaster::new(&self.config).forecast(projections, invoices, today)
    }

    /// Fetches projections in every status plus the paid invoices of the
    /// history window, then forecasts. The analyzer's projection filter does
    /// not apply; the forecast picks its own pipeline.
    pub async fn run_forecast<S>(&self, source: &S, today: NaiveDate) -> Result<RevenueForecast>
    where
        S: AnalyticsSource + ?Sized,
    {
        let filter = ProjectionFilter::all();
        let ranges: Vec<DateRange> = RevenueForecaster::new(&self.config)
            .history_window(today)
            .into_iter()
            .map(DateRange::from)
            .collect();

        let (projections, invoices) = future::try_join(
            async {
                source
                    .fetch_projections(&filter)
                    .await
                    .map_err(|e| as_upstream("projections", e))
            },
            async {
                source
                    .fetch_paid_invoices(&ranges)
                    .await
                    .map_err(|e| as_upstream("paid invoices", e))
            },
        )
        .await?;

        debug!(
            "Forecast input: {} projections, {} paid invoices over {} months",
            projections.len(),
            invoices.len(),
            ranges.len()
        );

        Ok(self.forecast(&projections, &invoices, today))
    }
}

fn as_upstream(source_name: &str, error: AnalyticsError) -> AnalyticsError {
    match error {
        AnalyticsError::UpstreamFetch { .. } => error,
        other => AnalyticsError::upstream(source_name, other.to_string()),
    }
}

impl PerformanceReport {
    /// The zeroed report a caller shows when the data could not be fetched.
    pub fn empty(today: NaiveDate, trend_months: usize) -> Self {
        Self {
            summary: PerformanceSummary::default(),
            company_performances: Vec::new(),
            top_performers: Vec::new(),
            under_performers: Vec::new(),
            monthly_trend: build_trend(&[], &[], today, trend_months),
            period_breakdown: Vec::new(),
        }
    }
}

/// Analyzes with the default configuration.
pub fn analyze_performance(
    projections: &[ProjectionRecord],
    invoices: &[InvoiceRecord],
    today: NaiveDate,
) -> PerformanceReport {
    PerformanceAnalyzer::default().analyze(projections, invoices, today)
}
