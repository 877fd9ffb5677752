use crate::schema::{
    AnalyticsConfig, ForecastInsights, ForecastPeriod, GrowthMetrics, InvoiceRecord,
    MonthlyRevenue, Opportunity, ProjectionRecord, ProjectionStatus, RevenueForecast, RiskFactor,
    SeasonalFactor, SourceRevenue, TrendDirection, TrendLine, TrendStrength, VolatilityLevel,
};
use crate::utils::{trailing_months, variance_percentage, MonthKey};
use chrono::{Datelike, NaiveDate};
use log::{debug, info};
use std::collections::BTreeMap;

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const UNKNOWN_SOURCE: &str = "Unknown";

const MIN_BASE_CONFIDENCE: f64 = 50.0;
const MAX_CONFIDENCE: f64 = 95.0;
const DECAY_PER_MONTH: f64 = 0.1;
const MIN_TIME_DECAY: f64 = 0.1;
const MIN_VOLATILITY_ADJUSTMENT: f64 = 0.5;

const RECENT_PAYMENTS: usize = 3;
const CONCENTRATION_SHARE: f64 = 50.0;
const UNPREDICTABLE_R_SQUARED: f64 = 0.4;
const SEASONAL_PEAK_FACTOR: f64 = 1.2;

/// Ordinary least squares over `values`, with x = 0, 1, 2, ...
pub fn fit_trend_line(values: &[f64]) -> TrendLine {
    if values.len() < 2 {
        return TrendLine::default();
    }

    let n = values.len() as f64;
    let (sum_x, sum_y, sum_xy, sum_xx) = values.iter().enumerate().fold(
        (0.0, 0.0, 0.0, 0.0),
        |(sx, sy, sxy, sxx), (i, &y)| {
            let x = i as f64;
            (sx + x, sy + y, sxy + x * y, sxx + x * x)
        },
    );

    let slope = (n * sum_xy - sum_x * sum_y) / (n * sum_xx - sum_x * sum_x);
    let intercept = (sum_y - slope * sum_x) / n;

    let mean = sum_y / n;
    let (ss_res, ss_tot) = values
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(res, tot), (i, &y)| {
            let predicted = slope * i as f64 + intercept;
            (res + (y - predicted).powi(2), tot + (y - mean).powi(2))
        });
    let r_squared = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };

    TrendLine {
        slope,
        intercept,
        r_squared,
    }
}

/// Growth figures over consecutive monthly totals, oldest first.
///
/// Months whose predecessor earned nothing are left out of the average and
/// the volatility.
pub fn growth_metrics(values: &[f64]) -> GrowthMetrics {
    let rates: Vec<f64> = values
        .windows(2)
        .filter(|pair| pair[0] > 0.0)
        .map(|pair| variance_percentage(pair[1], pair[0]))
        .collect();

    let average_growth_rate = mean(&rates);
    let volatility = if rates.is_empty() {
        0.0
    } else {
        let spread: f64 = rates
            .iter()
            .map(|rate| (rate - average_growth_rate).powi(2))
            .sum();
        (spread / rates.len() as f64).sqrt()
    };

    let month_over_month = match values {
        [.., previous, last] => variance_percentage(*last, *previous),
        _ => 0.0,
    };

    let len = values.len();
    let quarter_over_quarter = if len >= 6 {
        let recent: f64 = values[len - 3..].iter().sum();
        let previous: f64 = values[len - 6..len - 3].iter().sum();
        variance_percentage(recent, previous)
    } else {
        0.0
    };
    let year_over_year = if len >= 13 {
        variance_percentage(values[len - 1], values[len - 13])
    } else {
        0.0
    };

    GrowthMetrics {
        month_over_month,
        quarter_over_quarter,
        year_over_year,
        average_growth_rate,
        volatility,
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Active and draft projections dated today or later.
fn is_pipeline(projection: &ProjectionRecord, today: NaiveDate) -> bool {
    matches!(
        projection.status,
        ProjectionStatus::Active | ProjectionStatus::Draft
    ) && projection.projection_date.is_some_and(|date| date >= today)
}

pub struct RevenueForecaster<'a> {
    config: &'a AnalyticsConfig,
}

impl<'a> RevenueForecaster<'a> {
    pub fn new(config: &'a AnalyticsConfig) -> Self {
        Self { config }
    }

    /// The calendar months of paid invoices the forecast looks at, oldest first.
    pub fn history_window(&self, today: NaiveDate) -> Vec<MonthKey> {
        trailing_months(today, self.config.history_months)
    }

    /// Forecasts revenue from paid invoices inside the history window and the
    /// pipeline of upcoming projections. Invoices outside the window and
    /// projections that are not pipeline are ignored, so callers may pass
    /// unfiltered rows.
    pub fn forecast(
        &self,
        projections: &[ProjectionRecord],
        invoices: &[InvoiceRecord],
        today: NaiveDate,
    ) -> RevenueForecast {
        let window = self.history_window(today);
        let mut history: Vec<&InvoiceRecord> = match (window.first(), window.last()) {
            (Some(&first), Some(&last)) => invoices
                .iter()
                .filter(|invoice| {
                    let month = MonthKey::from_date(invoice.date_paid);
                    first <= month && month <= last
                })
                .collect(),
            _ => Vec::new(),
        };
        history.sort_by_key(|invoice| invoice.date_paid);

        let pipeline: Vec<&ProjectionRecord> = projections
            .iter()
            .filter(|projection| is_pipeline(projection, today))
            .collect();

        debug!(
            "Forecasting from {} paid invoices and {} pipeline projections",
            history.len(),
            pipeline.len()
        );

        let monthly = monthly_history(&history);
        let values: Vec<f64> = monthly.iter().map(|month| month.total).collect();
        let trend = fit_trend_line(&values);
        let growth = growth_metrics(&values);

        let growth_rate = match (values.first(), values.last()) {
            (Some(&first), Some(&last)) if values.len() > 1 => {
                variance_percentage(last, first) / values.len() as f64
            }
            _ => 0.0,
        };

        let periods =
            self.forecast_periods(values.len(), &trend, growth.volatility, &pipeline, today);

        let mut forecast = RevenueForecast {
            current_revenue: values.last().copied().unwrap_or(0.0),
            projected_revenue: pipeline.iter().map(|p| p.expected_revenue).sum(),
            growth_rate,
            confidence_level: (trend.r_squared * 100.0).clamp(MIN_BASE_CONFIDENCE, MAX_CONFIDENCE),
            trend,
            periods,
            revenue_by_source: self.revenue_by_source(&history),
            seasonal_trends: seasonal_factors(&history),
            history: monthly,
            growth,
            insights: ForecastInsights::default(),
            is_data_complete: !history.is_empty(),
        };
        forecast.insights = derive_insights(&forecast);

        info!(
            "Revenue forecast: current {:.2}, growth {:.1}%, {} months ahead",
            forecast.current_revenue,
            forecast.growth_rate,
            forecast.periods.len()
        );

        forecast
    }

    fn forecast_periods(
        &self,
        history_len: usize,
        trend: &TrendLine,
        volatility: f64,
        pipeline: &[&ProjectionRecord],
        today: NaiveDate,
    ) -> Vec<ForecastPeriod> {
        let current = MonthKey::from_date(today);
        let base_confidence = (trend.r_squared * 100.0).max(MIN_BASE_CONFIDENCE);
        let volatility_adjustment = (1.0 - volatility / 100.0).max(MIN_VOLATILITY_ADJUSTMENT);
        let trend_weight = self.config.trend_weight;

        (1..=self.config.forecast_months)
            .map(|ahead| {
                let month = current.offset(ahead as i32);
                let trend_based = trend.value_at((history_len + ahead - 1) as f64);
                let projection_based: f64 = pipeline
                    .iter()
                    .filter(|p| p.projection_date.is_some_and(|date| month.contains(date)))
                    .map(|p| p.expected_revenue)
                    .sum();

                let blended = if projection_based > 0.0 {
                    trend_based * trend_weight + projection_based * (1.0 - trend_weight)
                } else {
                    trend_based
                };
                let time_decay = (1.0 - ahead as f64 * DECAY_PER_MONTH).max(MIN_TIME_DECAY);

                ForecastPeriod {
                    month: month.to_string(),
                    label: month.label(),
                    projected: blended.max(0.0),
                    confidence: (base_confidence * time_decay * volatility_adjustment)
                        .min(MAX_CONFIDENCE),
                    trend_based,
                    projection_based,
                    trend_strength: TrendStrength::from_r_squared(trend.r_squared),
                    has_projection_data: projection_based > 0.0,
                    volatility_level: VolatilityLevel::from_volatility(volatility),
                }
            })
            .collect()
    }

    /// Paid revenue per client name, largest first. `history` must be in
    /// payment order; growth compares the last few payments with the rest.
    fn revenue_by_source(&self, history: &[&InvoiceRecord]) -> Vec<SourceRevenue> {
        let mut by_client: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
        for invoice in history {
            let name = invoice.client_name.trim();
            let name = if name.is_empty() { UNKNOWN_SOURCE } else { name };
            by_client.entry(name).or_default().push(invoice.amount_paid);
        }

        let total: f64 = by_client.values().flatten().sum();

        let mut sources: Vec<SourceRevenue> = by_client
            .into_iter()
            .map(|(source, amounts)| {
                let amount: f64 = amounts.iter().sum();
                let split = amounts.len().saturating_sub(RECENT_PAYMENTS);
                let (older, recent) = amounts.split_at(split);
                let growth = variance_percentage(mean(recent), mean(older));

                SourceRevenue {
                    source: source.to_string(),
                    amount,
                    percentage: if total > 0.0 { amount / total * 100.0 } else { 0.0 },
                    growth,
                    forecast: (amount * (1.0 + growth / 100.0)).max(0.0),
                }
            })
            .collect();

        sources.sort_by(|a, b| b.amount.total_cmp(&a.amount));
        sources.truncate(self.config.top_sources);
        sources
    }
}

/// Monthly totals from the first to the last month with a payment. Months
/// in between without payments are zero filled.
fn monthly_history(history: &[&InvoiceRecord]) -> Vec<MonthlyRevenue> {
    let mut grid: BTreeMap<MonthKey, (f64, usize)> = BTreeMap::new();
    for invoice in history {
        let totals = grid.entry(MonthKey::from_date(invoice.date_paid)).or_default();
        totals.0 += invoice.amount_paid;
        totals.1 += 1;
    }

    let (Some(&first), Some(&last)) = (grid.keys().next(), grid.keys().next_back()) else {
        return Vec::new();
    };

    let mut months = Vec::new();
    let mut month = first;
    while month <= last {
        let (total, invoices) = grid.get(&month).copied().unwrap_or_default();
        months.push(MonthlyRevenue {
            month: month.to_string(),
            label: month.label(),
            total,
            invoices,
        });
        month = month.offset(1);
    }
    months
}

/// Average invoice size per calendar month against the overall average.
fn seasonal_factors(history: &[&InvoiceRecord]) -> Vec<SeasonalFactor> {
    let mut by_month: [Vec<f64>; 12] = Default::default();
    for invoice in history {
        by_month[invoice.date_paid.month0() as usize].push(invoice.amount_paid);
    }

    let all: Vec<f64> = by_month.iter().flatten().copied().collect();
    let overall_average = mean(&all);

    by_month
        .iter()
        .zip(MONTH_NAMES)
        .enumerate()
        .map(|(idx, (amounts, name))| {
            let average_revenue = mean(amounts);
            SeasonalFactor {
                month: idx as u32 + 1,
                month_name: name.to_string(),
                average_revenue,
                seasonal_factor: if overall_average > 0.0 {
                    average_revenue / overall_average
                } else {
                    1.0
                },
                invoices: amounts.len(),
            }
        })
        .collect()
}

fn derive_insights(forecast: &RevenueForecast) -> ForecastInsights {
    let observed = || forecast.seasonal_trends.iter().filter(|s| s.invoices > 0);
    let best_month = observed()
        .reduce(|best, s| if s.average_revenue > best.average_revenue { s } else { best })
        .map(|s| s.month_name.clone());
    let worst_month = observed()
        .reduce(|worst, s| if s.average_revenue < worst.average_revenue { s } else { worst })
        .map(|s| s.month_name.clone());
    let top_source = forecast.revenue_by_source.first();

    let mut risk_factors = Vec::new();
    if !forecast.is_data_complete {
        risk_factors.push(RiskFactor::InsufficientData);
    }
    if forecast.growth.volatility > 20.0 {
        risk_factors.push(RiskFactor::HighVolatility);
    }
    if top_source.is_some_and(|s| s.percentage > CONCENTRATION_SHARE) {
        risk_factors.push(RiskFactor::ClientConcentration);
    }
    if forecast.trend.r_squared < UNPREDICTABLE_R_SQUARED {
        risk_factors.push(RiskFactor::UnpredictableTrend);
    }

    let mut opportunities = Vec::new();
    if forecast.growth_rate > 0.0 {
        opportunities.push(Opportunity::PositiveGrowth);
    }
    if forecast.projected_revenue > forecast.current_revenue {
        opportunities.push(Opportunity::StrongPipeline);
    }
    if forecast
        .seasonal_trends
        .iter()
        .any(|s| s.seasonal_factor > SEASONAL_PEAK_FACTOR)
    {
        opportunities.push(Opportunity::SeasonalPeaks);
    }

    ForecastInsights {
        trend_direction: TrendDirection::from_growth_rate(forecast.growth_rate),
        best_month,
        worst_month,
        top_source: top_source.map(|s| s.source.clone()),
        risk_factors,
        opportunities,
    }
}

impl RevenueForecast {
    /// The forecast a caller shows when the data could not be fetched.
    pub fn empty() -> Self {
        Self {
            insights: ForecastInsights {
                risk_factors: vec![RiskFactor::InsufficientData],
                ..ForecastInsights::default()
            },
            is_data_complete: false,
            ..Self::default()
        }
    }
}

/// Forecasts with the default configuration.
pub fn forecast_revenue(
    projections: &[ProjectionRecord],
    invoices: &[InvoiceRecord],
    today: NaiveDate,
) -> RevenueForecast {
    let config = AnalyticsConfig::default();
    RevenueForecaster::new(&config).forecast(projections, invoices, today)
}
