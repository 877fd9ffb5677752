use crate::error::{AnalyticsError, Result};
use crate::schema::DEFAULT_MATCH_THRESHOLD;
use strsim::levenshtein;

/// Normalized Levenshtein similarity in `[0.0, 1.0]`.
///
/// `a` is taken as the longer string unless `b` is strictly longer. Two empty
/// strings are identical (similarity 1.0).
pub fn similarity(a: &str, b: &str) -> f64 {
    let a_len = a.chars().count();
    let b_len = b.chars().count();
    let (longer, shorter, longer_len) = if b_len > a_len {
        (b, a, b_len)
    } else {
        (a, b, a_len)
    };

    if longer_len == 0 {
        return 1.0;
    }

    let distance = levenshtein(longer, shorter);
    (longer_len - distance) as f64 / longer_len as f64
}

pub fn is_match(a: &str, b: &str, threshold: f64) -> bool {
    similarity(a, b) >= threshold
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuzzyMatcher {
    threshold: f64,
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_MATCH_THRESHOLD,
        }
    }
}

impl FuzzyMatcher {
    pub fn new(threshold: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(AnalyticsError::InvalidThreshold(threshold));
        }
        Ok(Self { threshold })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn is_match(&self, a: &str, b: &str) -> bool {
        is_match(a, b, self.threshold)
    }

    /// First candidate, in iteration order, that matches `name`. Earlier
    /// candidates win even when a later one is more similar.
    pub fn first_match<'a, I>(&self, name: &str, candidates: I) -> Option<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        candidates
            .into_iter()
            .find(|candidate| self.is_match(name, candidate))
    }
}
