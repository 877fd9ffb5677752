use crate::error::{AnalyticsError, Result};
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.8;
pub const DEFAULT_TREND_MONTHS: usize = 6;
pub const DEFAULT_TOP_N: usize = 5;
pub const NEUTRAL_PERFORMANCE_SCORE: f64 = 50.0;
pub const UNKNOWN_PERIOD: &str = "Unknown Period";
pub const DEFAULT_FORECAST_MONTHS: usize = 6;
pub const DEFAULT_HISTORY_MONTHS: usize = 24;
pub const DEFAULT_TREND_WEIGHT: f64 = 0.6;
pub const DEFAULT_TOP_SOURCES: usize = 10;
/// Upper bound for every month-count setting (one hundred years).
pub const MAX_MONTHS: usize = 1200;

#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
    JsonSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectionStatus {
    Draft,
    #[default]
    Active,
    UnderReview,
    Approved,
    Archived,
}

#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
    JsonSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectionPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl FromStr for ProjectionStatus {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DRAFT" => Ok(Self::Draft),
            "ACTIVE" => Ok(Self::Active),
            "UNDER_REVIEW" => Ok(Self::UnderReview),
            "APPROVED" => Ok(Self::Approved),
            "ARCHIVED" => Ok(Self::Archived),
            _ => Err(AnalyticsError::InvalidValue {
                field: "status".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

impl FromStr for ProjectionPriority {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            "URGENT" => Ok(Self::Urgent),
            _ => Err(AnalyticsError::InvalidValue {
                field: "priority".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// A revenue projection as stored upstream. Read-only input to the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ProjectionRecord {
    #[schemars(description = "Free-text entity label, usually the title or location description")]
    pub entity_label: String,

    pub expected_revenue: f64,

    #[serde(default)]
    pub expected_hours: f64,

    #[serde(default)]
    #[schemars(description = "Manually entered actual revenue, added to invoice actuals")]
    pub actual_revenue: Option<f64>,

    #[serde(default)]
    pub actual_hours: Option<f64>,

    #[serde(default)]
    #[schemars(description = "Billing period name, e.g. 'Jan 2024'")]
    pub period_label: Option<String>,

    #[serde(default)]
    #[schemars(description = "First day of the billing period, used by the period breakdown")]
    pub period_start: Option<NaiveDate>,

    #[serde(default)]
    #[schemars(description = "Date the projection applies to, used by the monthly trend")]
    pub projection_date: Option<NaiveDate>,

    #[serde(default)]
    pub status: ProjectionStatus,

    #[serde(default)]
    pub priority: ProjectionPriority,

    #[serde(default)]
    pub location: Option<String>,

    #[serde(default)]
    #[schemars(description = "Variance percentage recorded on the projection row itself")]
    pub variance_percentage: Option<f64>,

    #[serde(default)]
    #[schemars(description = "Estimator adjustment percentage applied to the projection")]
    pub estimator_percentage: Option<f64>,
}

impl ProjectionRecord {
    pub fn new(entity_label: impl Into<String>, expected_revenue: f64) -> Self {
        Self {
            entity_label: entity_label.into(),
            expected_revenue,
            expected_hours: 0.0,
            actual_revenue: None,
            actual_hours: None,
            period_label: None,
            period_start: None,
            projection_date: None,
            status: ProjectionStatus::default(),
            priority: ProjectionPriority::default(),
            location: None,
            variance_percentage: None,
            estimator_percentage: None,
        }
    }

    pub fn with_hours(mut self, expected_hours: f64) -> Self {
        self.expected_hours = expected_hours;
        self
    }

    pub fn with_actuals(mut self, revenue: Option<f64>, hours: Option<f64>) -> Self {
        self.actual_revenue = revenue;
        self.actual_hours = hours;
        self
    }

    pub fn with_period(mut self, label: impl Into<String>, start: Option<NaiveDate>) -> Self {
        self.period_label = Some(label.into());
        self.period_start = start;
        self
    }

    pub fn with_projection_date(mut self, date: NaiveDate) -> Self {
        self.projection_date = Some(date);
        self
    }

    pub fn with_status(mut self, status: ProjectionStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_priority(mut self, priority: ProjectionPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// A paid invoice. Callers only hand over rows already filtered to "paid".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct InvoiceRecord {
    pub client_name: String,
    pub amount_paid: f64,
    pub date_paid: NaiveDate,
}

impl InvoiceRecord {
    pub fn new(client_name: impl Into<String>, amount_paid: f64, date_paid: NaiveDate) -> Self {
        Self {
            client_name: client_name.into(),
            amount_paid,
            date_paid,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct CompanyPerformance {
    #[schemars(description = "Normalized entity name the figures were reconciled under")]
    pub company_name: String,
    pub projected_revenue: f64,
    pub actual_revenue: f64,
    #[schemars(description = "actual_revenue - projected_revenue")]
    pub variance: f64,
    #[schemars(description = "variance / projected_revenue * 100, or 0 when nothing was projected")]
    pub variance_percentage: f64,
    pub projected_hours: f64,
    pub actual_hours: f64,
    #[schemars(description = "Achievement ratio scaled to 0-100; 50 when nothing was projected")]
    pub performance_score: f64,
    pub period: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct MonthlyPoint {
    #[schemars(description = "Calendar month in YYYY-MM format")]
    pub month: String,
    pub variance_percentage: f64,
    #[schemars(description = "Number of projections dated in this month")]
    pub projections: usize,
    pub actual_revenue: f64,
    pub expected_revenue: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct PeriodPerformance {
    #[schemars(description = "Calendar month in YYYY-MM format")]
    pub month: String,
    #[schemars(description = "Display label, e.g. 'Jan 2024'")]
    pub label: String,
    pub projected: f64,
    pub actual: f64,
    pub variance: f64,
    pub variance_percentage: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct PerformanceSummary {
    pub total_projected_revenue: f64,
    pub total_actual_revenue: f64,
    pub overall_variance: f64,
    pub overall_variance_percentage: f64,
    #[schemars(description = "Aggregate achievement ratio scaled to 0-100; 0 if nothing projected")]
    pub performance_score: f64,
    pub companies_over_performing: usize,
    pub companies_under_performing: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct PerformanceReport {
    pub summary: PerformanceSummary,
    #[schemars(description = "All entities with non-zero figures, best score first")]
    pub company_performances: Vec<CompanyPerformance>,
    pub top_performers: Vec<CompanyPerformance>,
    #[schemars(description = "Entities with negative variance, most negative first")]
    pub under_performers: Vec<CompanyPerformance>,
    pub monthly_trend: Vec<MonthlyPoint>,
    pub period_breakdown: Vec<PeriodPerformance>,
}

impl PerformanceReport {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(PerformanceReport)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

/// Least-squares line over monthly revenue, x = month index from 0.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct TrendLine {
    pub slope: f64,
    pub intercept: f64,
    #[schemars(description = "Coefficient of determination; 0 for flat or short series")]
    pub r_squared: f64,
}

impl TrendLine {
    pub fn value_at(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TrendStrength {
    Strong,
    Moderate,
    Weak,
}

impl TrendStrength {
    pub fn from_r_squared(r_squared: f64) -> Self {
        if r_squared > 0.7 {
            Self::Strong
        } else if r_squared > 0.4 {
            Self::Moderate
        } else {
            Self::Weak
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum VolatilityLevel {
    High,
    Moderate,
    Low,
}

impl VolatilityLevel {
    pub fn from_volatility(volatility: f64) -> Self {
        if volatility > 20.0 {
            Self::High
        } else if volatility > 10.0 {
            Self::Moderate
        } else {
            Self::Low
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    #[default]
    Stable,
}

impl TrendDirection {
    /// More than 5% average growth either way counts as a direction.
    pub fn from_growth_rate(growth_rate: f64) -> Self {
        if growth_rate > 5.0 {
            Self::Increasing
        } else if growth_rate < -5.0 {
            Self::Decreasing
        } else {
            Self::Stable
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RiskFactor {
    HighVolatility,
    ClientConcentration,
    UnpredictableTrend,
    InsufficientData,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Opportunity {
    PositiveGrowth,
    StrongPipeline,
    SeasonalPeaks,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct MonthlyRevenue {
    #[schemars(description = "Calendar month in YYYY-MM format")]
    pub month: String,
    pub label: String,
    pub total: f64,
    pub invoices: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct GrowthMetrics {
    pub month_over_month: f64,
    #[schemars(description = "Last three months against the three before; 0 with under six months")]
    pub quarter_over_quarter: f64,
    #[schemars(description = "Last month against the same month a year earlier; 0 without it")]
    pub year_over_year: f64,
    pub average_growth_rate: f64,
    #[schemars(description = "Population standard deviation of month-over-month growth rates")]
    pub volatility: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ForecastPeriod {
    #[schemars(description = "Calendar month in YYYY-MM format")]
    pub month: String,
    pub label: String,
    #[schemars(description = "Blended forecast, never negative")]
    pub projected: f64,
    #[schemars(description = "Confidence in percent, at most 95")]
    pub confidence: f64,
    pub trend_based: f64,
    pub projection_based: f64,
    pub trend_strength: TrendStrength,
    pub has_projection_data: bool,
    pub volatility_level: VolatilityLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct SourceRevenue {
    pub source: String,
    pub amount: f64,
    #[schemars(description = "Share of all paid revenue in the history window")]
    pub percentage: f64,
    #[schemars(description = "Average of the last three payments against the earlier ones")]
    pub growth: f64,
    pub forecast: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct SeasonalFactor {
    #[schemars(description = "Calendar month, 1-12")]
    pub month: u32,
    pub month_name: String,
    #[schemars(description = "Average invoice amount paid in this calendar month")]
    pub average_revenue: f64,
    #[schemars(description = "average_revenue over the average of all invoices")]
    pub seasonal_factor: f64,
    pub invoices: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ForecastInsights {
    pub trend_direction: TrendDirection,
    pub best_month: Option<String>,
    pub worst_month: Option<String>,
    pub top_source: Option<String>,
    pub risk_factors: Vec<RiskFactor>,
    pub opportunities: Vec<Opportunity>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct RevenueForecast {
    #[schemars(description = "Paid revenue of the most recent month in the history")]
    pub current_revenue: f64,
    #[schemars(description = "Expected revenue of active and draft projections dated from today")]
    pub projected_revenue: f64,
    #[schemars(description = "First-to-last change in percent, divided by the number of months")]
    pub growth_rate: f64,
    pub confidence_level: f64,
    pub trend: TrendLine,
    pub history: Vec<MonthlyRevenue>,
    pub periods: Vec<ForecastPeriod>,
    pub revenue_by_source: Vec<SourceRevenue>,
    pub seasonal_trends: Vec<SeasonalFactor>,
    pub growth: GrowthMetrics,
    pub insights: ForecastInsights,
    pub is_data_complete: bool,
}

impl RevenueForecast {
    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&schemars::schema_for!(RevenueForecast))
    }
}

/// Tunables for the analytics pipeline. Every field falls back to its default
/// when absent from a JSON document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(default)]
pub struct AnalyticsConfig {
    #[schemars(description = "Minimum name similarity (0.0-1.0) to treat two names as one entity")]
    pub match_threshold: f64,

    #[schemars(description = "Months in the trailing monthly trend, current month included")]
    pub trend_months: usize,

    #[schemars(description = "Length of the top and under performer lists")]
    pub top_n: usize,

    #[schemars(description = "Score given to entities with no projected revenue (0-100)")]
    pub neutral_score: f64,

    #[schemars(description = "Period label used when a projection has no billing period")]
    pub unknown_period_label: String,

    #[schemars(description = "Months forecast ahead of the current month")]
    pub forecast_months: usize,

    #[schemars(description = "Months of paid invoices the forecast is fitted on")]
    pub history_months: usize,

    #[schemars(description = "Weight (0.0-1.0) of the historical trend when projections exist")]
    pub trend_weight: f64,

    #[schemars(description = "Length of the revenue-by-source list")]
    pub top_sources: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            trend_months: DEFAULT_TREND_MONTHS,
            top_n: DEFAULT_TOP_N,
            neutral_score: NEUTRAL_PERFORMANCE_SCORE,
            unknown_period_label: UNKNOWN_PERIOD.to_string(),
            forecast_months: DEFAULT_FORECAST_MONTHS,
            history_months: DEFAULT_HISTORY_MONTHS,
            trend_weight: DEFAULT_TREND_WEIGHT,
            top_sources: DEFAULT_TOP_SOURCES,
        }
    }
}

impl AnalyticsConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.match_threshold) {
            return Err(AnalyticsError::InvalidThreshold(self.match_threshold));
        }
        for (name, months) in [
            ("trend_months", self.trend_months),
            ("forecast_months", self.forecast_months),
            ("history_months", self.history_months),
        ] {
            if !(1..=MAX_MONTHS).contains(&months) {
                return Err(AnalyticsError::InvalidConfig(format!(
                    "{} must be between 1 and {} (got {})",
                    name, MAX_MONTHS, months
                )));
            }
        }
        if self.top_n == 0 {
            return Err(AnalyticsError::InvalidConfig(
                "top_n must be at least 1".to_string(),
            ));
        }
        if self.top_sources == 0 {
            return Err(AnalyticsError::InvalidConfig(
                "top_sources must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.trend_weight) {
            return Err(AnalyticsError::InvalidConfig(format!(
                "trend_weight {} must be between 0.0 and 1.0",
                self.trend_weight
            )));
        }
        if !(0.0..=100.0).contains(&self.neutral_score) {
            return Err(AnalyticsError::InvalidConfig(format!(
                "neutral_score {} must be between 0 and 100",
                self.neutral_score
            )));
        }
        Ok(())
    }
}
