use crate::schema::{ProjectionPriority, ProjectionRecord, ProjectionStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationTotals {
    pub projections: usize,
    /// Actual revenue where recorded, expected revenue otherwise.
    pub revenue: f64,
}

/// Portfolio-level counts and totals over a set of projections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectionStats {
    pub total_projections: usize,
    pub by_status: BTreeMap<ProjectionStatus, usize>,
    pub by_priority: BTreeMap<ProjectionPriority, usize>,
    pub total_expected_revenue: f64,
    pub total_actual_revenue: f64,
    pub total_expected_hours: f64,
    pub total_actual_hours: f64,
    /// Mean of the variance percentages recorded on the rows; 0 when none are.
    pub avg_variance_percentage: f64,
    /// Mean estimator adjustment over rows that carry one; 0 when none do.
    pub avg_estimator_impact: f64,
    pub locations: BTreeMap<String, LocationTotals>,
}

impl ProjectionStats {
    pub fn from_projections(projections: &[ProjectionRecord]) -> Self {
        let mut stats = Self {
            total_projections: projections.len(),
            ..Self::default()
        };

        let mut variance_sum = 0.0;
        let mut variance_rows = 0usize;
        let mut estimator_sum = 0.0;
        let mut estimator_rows = 0usize;

        for projection in projections {
            *stats.by_status.entry(projection.status).or_default() += 1;
            *stats.by_priority.entry(projection.priority).or_default() += 1;

            stats.total_expected_revenue += projection.expected_revenue;
            stats.total_actual_revenue += projection.actual_revenue.unwrap_or(0.0);
            stats.total_expected_hours += projection.expected_hours;
            stats.total_actual_hours += projection.actual_hours.unwrap_or(0.0);

            if let Some(variance) = projection.variance_percentage {
                variance_sum += variance;
                variance_rows += 1;
            }
            if let Some(estimator) = projection.estimator_percentage {
                estimator_sum += estimator;
                estimator_rows += 1;
            }

            let location = projection
                .location
                .clone()
                .unwrap_or_else(|| projection.entity_label.clone());
            let totals = stats.locations.entry(location).or_default();
            totals.projections += 1;
            // A recorded actual of zero counts as unset.
            totals.revenue += projection
                .actual_revenue
                .filter(|revenue| *revenue != 0.0)
                .unwrap_or(projection.expected_revenue);
        }

        if variance_rows > 0 {
            stats.avg_variance_percentage = variance_sum / variance_rows as f64;
        }
        if estimator_rows > 0 {
            stats.avg_estimator_impact = estimator_sum / estimator_rows as f64;
        }

        stats
    }

    pub fn count_with_status(&self, status: ProjectionStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_projection_set() {
        let stats = ProjectionStats::from_projections(&[]);
        assert_eq!(stats, ProjectionStats::default());
        assert_eq!(stats.count_with_status(ProjectionStatus::Active), 0);
    }

    #[test]
    fn test_counts_and_totals() {
        let mut with_variance = ProjectionRecord::new("North Site", 1000.0)
            .with_hours(100.0)
            .with_actuals(Some(900.0), Some(95.0))
            .with_status(ProjectionStatus::Approved)
            .with_priority(ProjectionPriority::High)
            .with_location("North");
        with_variance.variance_percentage = Some(-10.0);

        let mut with_variance_too = ProjectionRecord::new("North Annex", 500.0)
            .with_status(ProjectionStatus::Draft)
            .with_location("North");
        with_variance_too.variance_percentage = Some(20.0);

        let projections = vec![
            with_variance,
            with_variance_too,
            ProjectionRecord::new("South Site", 200.0).with_hours(20.0),
        ];

        let stats = ProjectionStats::from_projections(&projections);
        assert_eq!(stats.total_projections, 3);
        assert_eq!(stats.count_with_status(ProjectionStatus::Approved), 1);
        assert_eq!(stats.count_with_status(ProjectionStatus::Draft), 1);
        assert_eq!(stats.count_with_status(ProjectionStatus::Active), 1);
        assert_eq!(stats.by_priority[&ProjectionPriority::Medium], 2);
        assert_eq!(stats.by_priority[&ProjectionPriority::High], 1);

        assert_eq!(stats.total_expected_revenue, 1700.0);
        assert_eq!(stats.total_actual_revenue, 900.0);
        assert_eq!(stats.total_expected_hours, 120.0);
        assert_eq!(stats.total_actual_hours, 95.0);
        assert!((stats.avg_variance_percentage - 5.0).abs() < 1e-9);

        let north = &stats.locations["North"];
        assert_eq!(north.projections, 2);
        assert_eq!(north.revenue, 1400.0);
        assert_eq!(stats.locations["South Site"].revenue, 200.0);
        assert_eq!(stats.avg_estimator_impact, 0.0);
    }

    #[test]
    fn test_zero_actual_falls_back_to_expected_revenue() {
        let projections = vec![
            ProjectionRecord::new("East Site", 800.0)
                .with_actuals(Some(0.0), None)
                .with_location("East"),
            ProjectionRecord::new("East Annex", 300.0)
                .with_actuals(Some(250.0), None)
                .with_location("East"),
        ];

        let stats = ProjectionStats::from_projections(&projections);
        assert_eq!(stats.locations["East"].revenue, 1050.0);
        assert_eq!(stats.total_actual_revenue, 250.0);
    }

    #[test]
    fn test_average_estimator_impact_skips_unset_rows() {
        let mut raised = ProjectionRecord::new("North Site", 1000.0);
        raised.estimator_percentage = Some(10.0);
        let mut lowered = ProjectionRecord::new("South Site", 1000.0);
        lowered.estimator_percentage = Some(-4.0);

        let projections = vec![raised, lowered, ProjectionRecord::new("West Site", 500.0)];
        let stats = ProjectionStats::from_projections(&projections);
        assert!((stats.avg_estimator_impact - 3.0).abs() < 1e-9);
    }
}
