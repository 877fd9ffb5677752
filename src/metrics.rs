use crate::reconciler::{EntityBucket, EntityBuckets};
use crate::schema::{AnalyticsConfig, CompanyPerformance, PerformanceSummary};
use crate::utils::variance_percentage;

/// Scored entities plus the aggregates derived from them.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedPerformance {
    pub summary: PerformanceSummary,
    /// Best score first; equal scores keep bucket creation order.
    pub company_performances: Vec<CompanyPerformance>,
    pub top_performers: Vec<CompanyPerformance>,
    pub under_performers: Vec<CompanyPerformance>,
}

pub struct MetricsCalculator<'a> {
    config: &'a AnalyticsConfig,
}

impl<'a> MetricsCalculator<'a> {
    pub fn new(config: &'a AnalyticsConfig) -> Self {
        Self { config }
    }

    /// Achievement ratio clamped to 0-100. Entities with nothing projected get
    /// the neutral score regardless of what they earned.
    pub fn performance_score(&self, actual: f64, projected: f64) -> f64 {
        if projected > 0.0 {
            (actual / projected * 100.0).clamp(0.0, 100.0)
        } else {
            self.config.neutral_score
        }
    }

    pub fn score_bucket(&self, name: &str, bucket: &EntityBucket) -> CompanyPerformance {
        CompanyPerformance {
            company_name: name.to_string(),
            projected_revenue: bucket.projected_revenue,
            actual_revenue: bucket.actual_revenue,
            variance: bucket.actual_revenue - bucket.projected_revenue,
            variance_percentage: variance_percentage(
                bucket.actual_revenue,
                bucket.projected_revenue,
            ),
            projected_hours: bucket.projected_hours,
            actual_hours: bucket.actual_hours,
            performance_score: self.performance_score(
                bucket.actual_revenue,
                bucket.projected_revenue,
            ),
            period: bucket.period.clone(),
        }
    }

    /// Scores every bucket with non-zero figures and sorts by score descending.
    pub fn score_entities(&self, buckets: &EntityBuckets) -> Vec<CompanyPerformance> {
        let mut scored: Vec<CompanyPerformance> = buckets
            .iter()
            .filter(|(_, bucket)| !bucket.is_empty())
            .map(|(name, bucket)| self.score_bucket(name, bucket))
            .collect();

        // sort_by is stable, so ties stay in creation order
        scored.sort_by(|a, b| b.performance_score.total_cmp(&a.performance_score));
        scored
    }

    pub fn summarize(&self, performances: &[CompanyPerformance]) -> PerformanceSummary {
        let total_projected: f64 = performances.iter().map(|c| c.projected_revenue).sum();
        let total_actual: f64 = performances.iter().map(|c| c.actual_revenue).sum();

        let performance_score = if total_projected > 0.0 {
            (total_actual / total_projected * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };

        PerformanceSummary {
            total_projected_revenue: total_projected,
            total_actual_revenue: total_actual,
            overall_variance: total_actual - total_projected,
            overall_variance_percentage: variance_percentage(total_actual, total_projected),
            performance_score,
            companies_over_performing: performances
                .iter()
                .filter(|c| c.variance_percentage > 0.0)
                .count(),
            companies_under_performing: performances
                .iter()
                .filter(|c| c.variance_percentage < 0.0)
                .count(),
        }
    }

    pub fn rank(&self, buckets: &EntityBuckets) -> RankedPerformance {
        let company_performances = self.score_entities(buckets);
        let summary = self.summarize(&company_performances);

        let top_performers = company_performances
            .iter()
            .take(self.config.top_n)
            .cloned()
            .collect();

        let mut under_performers: Vec<CompanyPerformance> = company_performances
            .iter()
            .filter(|c| c.variance_percentage < 0.0)
            .cloned()
            .collect();
        under_performers.sort_by(|a, b| a.variance_percentage.total_cmp(&b.variance_percentage));
        under_performers.truncate(self.config.top_n);

        RankedPerformance {
            summary,
            company_performances,
            top_performers,
            under_performers,
        }
    }
}

/// Scores buckets with the default configuration.
pub fn score_entities(buckets: &EntityBuckets) -> Vec<CompanyPerformance> {
    let config = AnalyticsConfig::default();
    MetricsCalculator::new(&config).score_entities(buckets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciler::reconcile;
    use crate::schema::{InvoiceRecord, ProjectionRecord};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn ranked(projections: &[ProjectionRecord], invoices: &[InvoiceRecord]) -> RankedPerformance {
        let config = AnalyticsConfig::default();
        MetricsCalculator::new(&config).rank(&reconcile(projections, invoices))
    }

    #[test]
    fn test_score_entities_with_defaults() {
        let buckets = reconcile(
            &[
                ProjectionRecord::new("Acme Corp", 1000.0).with_period("Jan 2024", None),
                ProjectionRecord::new("Idle Co", 0.0),
            ],
            &[
                InvoiceRecord::new("ACME CORP.", 1200.0, date(2024, 1, 15)),
                InvoiceRecord::new("Gamma Inc", 300.0, date(2024, 2, 1)),
            ],
        );

        let scored = score_entities(&buckets);
        assert_eq!(scored.len(), 2);

        let acme = &scored[0];
        assert_eq!(acme.company_name, "acme corp");
        assert_eq!(acme.performance_score, 100.0);
        assert_eq!(acme.variance, 200.0);
        assert!((acme.variance_percentage - 20.0).abs() < 1e-9);
        assert_eq!(acme.period, "Jan 2024");

        let gamma = &scored[1];
        assert_eq!(gamma.company_name, "gamma inc");
        assert_eq!(gamma.performance_score, 50.0);
        assert_eq!(gamma.period, "Feb 2024");
    }

    #[test]
    fn test_score_is_clamped() {
        let config = AnalyticsConfig::default();
        let calc = MetricsCalculator::new(&config);
        assert_eq!(calc.performance_score(1200.0, 1000.0), 100.0);
        assert_eq!(calc.performance_score(-50.0, 1000.0), 0.0);
        assert!((calc.performance_score(750.0, 1000.0) - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_projection_is_neutral() {
        let result = ranked(
            &[],
            &[InvoiceRecord::new("Gamma Inc", 300.0, date(2024, 2, 1))],
        );
        let gamma = &result.company_performances[0];
        assert_eq!(gamma.performance_score, 50.0);
        assert_eq!(gamma.variance_percentage, 0.0);
        assert_eq!(gamma.variance, 300.0);
    }

    #[test]
    fn test_empty_buckets_are_filtered() {
        let result = ranked(
            &[
                ProjectionRecord::new("Zero Co", 0.0).with_hours(10.0),
                ProjectionRecord::new("Real Co", 100.0),
            ],
            &[],
        );
        assert_eq!(result.company_performances.len(), 1);
        assert_eq!(result.company_performances[0].company_name, "real co");
    }

    #[test]
    fn test_sort_is_stable_for_equal_scores() {
        let result = ranked(
            &[
                ProjectionRecord::new("First", 100.0).with_actuals(Some(100.0), None),
                ProjectionRecord::new("Second", 100.0).with_actuals(Some(50.0), None),
                ProjectionRecord::new("Third", 200.0).with_actuals(Some(200.0), None),
            ],
            &[],
        );
        let names: Vec<&str> = result
            .company_performances
            .iter()
            .map(|c| c.company_name.as_str())
            .collect();
        assert_eq!(names, vec!["first", "third", "second"]);
    }

    #[test]
    fn test_summary_counts_and_totals() {
        let result = ranked(
            &[
                ProjectionRecord::new("Over", 100.0).with_actuals(Some(150.0), None),
                ProjectionRecord::new("Under", 200.0).with_actuals(Some(100.0), None),
                ProjectionRecord::new("Even", 100.0).with_actuals(Some(100.0), None),
            ],
            &[],
        );
        let summary = &result.summary;
        assert_eq!(summary.total_projected_revenue, 400.0);
        assert_eq!(summary.total_actual_revenue, 350.0);
        assert_eq!(summary.overall_variance, -50.0);
        assert!((summary.overall_variance_percentage - -12.5).abs() < 1e-9);
        assert!((summary.performance_score - 87.5).abs() < 1e-9);
        assert_eq!(summary.companies_over_performing, 1);
        assert_eq!(summary.companies_under_performing, 1);
    }

    #[test]
    fn test_summary_of_nothing_is_zeroed() {
        let config = AnalyticsConfig::default();
        let summary = MetricsCalculator::new(&config).summarize(&[]);
        assert_eq!(summary, PerformanceSummary::default());
    }

    #[test]
    fn test_top_and_under_performer_lists() {
        let projections: Vec<ProjectionRecord> = (1..=7)
            .map(|i| {
                ProjectionRecord::new(format!("Site {}", i), 100.0)
                    .with_actuals(Some(100.0 - (i as f64) * 10.0), None)
            })
            .collect();
        let result = ranked(&projections, &[]);

        assert_eq!(result.top_performers.len(), 5);
        assert_eq!(result.top_performers[0].company_name, "site 1");

        assert_eq!(result.under_performers.len(), 5);
        assert_eq!(result.under_performers[0].company_name, "site 7");
        assert!(result
            .under_performers
            .windows(2)
            .all(|w| w[0].variance_percentage <= w[1].variance_percentage));
    }

    #[test]
    fn test_variance_is_exact_difference() {
        let result = ranked(
            &[
                ProjectionRecord::new("A", 1234.56).with_actuals(Some(789.01), None),
                ProjectionRecord::new("B", 0.1).with_actuals(Some(0.2), None),
            ],
            &[InvoiceRecord::new("C", 42.0, date(2024, 1, 1))],
        );
        for c in &result.company_performances {
            assert_eq!(c.variance, c.actual_revenue - c.projected_revenue);
            assert!((0.0..=100.0).contains(&c.performance_score));
        }
    }
}
