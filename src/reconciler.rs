use crate::error::Result;
use crate::matcher::FuzzyMatcher;
use crate::normalize::normalize;
use crate::schema::{AnalyticsConfig, InvoiceRecord, ProjectionRecord};
use crate::utils::format_period_label;
use log::debug;
use std::collections::HashMap;

/// Running projected/actual totals for one reconciled entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityBucket {
    pub projected_revenue: f64,
    pub actual_revenue: f64,
    pub projected_hours: f64,
    pub actual_hours: f64,
    /// Period label of the row that created the bucket.
    pub period: String,
}

impl EntityBucket {
    fn with_period(period: String) -> Self {
        Self {
            period,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.projected_revenue == 0.0 && self.actual_revenue == 0.0
    }
}

/// Buckets keyed by normalized entity name, iterated in creation order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityBuckets {
    entries: Vec<(String, EntityBucket)>,
    index: HashMap<String, usize>,
}

impl EntityBuckets {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&EntityBucket> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &EntityBucket)> {
        self.entries.iter().map(|(key, bucket)| (key.as_str(), bucket))
    }

    fn get_or_insert_with<F>(&mut self, key: &str, make: F) -> &mut EntityBucket
    where
        F: FnOnce() -> EntityBucket,
    {
        let idx = match self.index.get(key) {
            Some(&idx) => idx,
            None => {
                self.entries.push((key.to_string(), make()));
                let idx = self.entries.len() - 1;
                self.index.insert(key.to_string(), idx);
                idx
            }
        };
        &mut self.entries[idx].1
    }
}

pub struct Reconciler<'a> {
    config: &'a AnalyticsConfig,
    matcher: FuzzyMatcher,
}

impl<'a> Reconciler<'a> {
    pub fn new(config: &'a AnalyticsConfig) -> Result<Self> {
        let matcher = FuzzyMatcher::new(config.match_threshold)?;
        Ok(Self::with_matcher(config, matcher))
    }

    pub fn with_matcher(config: &'a AnalyticsConfig, matcher: FuzzyMatcher) -> Self {
        Self { config, matcher }
    }

    /// Seeds buckets from projections, then folds each invoice into the first
    /// existing bucket whose key matches its client name, creating a new bucket
    /// when none does. Buckets are never merged once created.
    pub fn reconcile(
        &self,
        projections: &[ProjectionRecord],
        invoices: &[InvoiceRecord],
    ) -> EntityBuckets {
        let seeded = projections
            .iter()
            .fold(EntityBuckets::default(), |mut buckets, projection| {
                self.add_projection(&mut buckets, projection);
                buckets
            });

        invoices.iter().fold(seeded, |mut buckets, invoice| {
            self.add_invoice(&mut buckets, invoice);
            buckets
        })
    }

    fn add_projection(&self, buckets: &mut EntityBuckets, projection: &ProjectionRecord) {
        let key = normalize(&projection.entity_label);
        let bucket = buckets.get_or_insert_with(&key, || {
            EntityBucket::with_period(
                projection
                    .period_label
                    .clone()
                    .unwrap_or_else(|| self.config.unknown_period_label.clone()),
            )
        });

        bucket.projected_revenue += projection.expected_revenue;
        bucket.projected_hours += projection.expected_hours;

        // Manually entered actuals add to whatever invoices contribute later.
        if let Some(revenue) = projection.actual_revenue {
            bucket.actual_revenue += revenue;
        }
        if let Some(hours) = projection.actual_hours {
            bucket.actual_hours += hours;
        }
    }

    fn add_invoice(&self, buckets: &mut EntityBuckets, invoice: &InvoiceRecord) {
        let normalized = normalize(&invoice.client_name);

        let key = match self.matcher.first_match(&normalized, buckets.keys()) {
            Some(existing) => {
                if existing != normalized {
                    debug!(
                        "Matched invoice client '{}' to entity '{}'",
                        invoice.client_name, existing
                    );
                }
                existing.to_string()
            }
            None => normalized,
        };

        let bucket = buckets.get_or_insert_with(&key, || {
            EntityBucket::with_period(format_period_label(invoice.date_paid))
        });
        bucket.actual_revenue += invoice.amount_paid;
    }
}

/// Reconciles with the default configuration.
pub fn reconcile(projections: &[ProjectionRecord], invoices: &[InvoiceRecord]) -> EntityBuckets {
    let config = AnalyticsConfig::default();
    Reconciler::with_matcher(&config, FuzzyMatcher::default()).reconcile(projections, invoices)
}
