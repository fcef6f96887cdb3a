//! Runtime statistics collection, feeding the adaptive optimizer.

use std::sync::Arc;

/// What one observed statistic describes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StatisticKind {
    /// Observed events of this type per unit time.
    ArrivalRate(Arc<str>),
    /// Observed fraction of `(left, right)` candidate pairs that pass their
    /// join predicate.
    Selectivity(Arc<str>, Arc<str>),
}

/// One observed statistic's current value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatisticValue {
    ArrivalRate(f64),
    Selectivity(f64),
}

impl StatisticValue {
    pub fn as_f64(&self) -> f64 {
        match self {
            StatisticValue::ArrivalRate(v) | StatisticValue::Selectivity(v) => *v,
        }
    }
}

/// Accumulates observations and reports a moving-average estimate per
/// [`StatisticKind`].
///
/// Arrival rates are counted per fixed-size time bucket (`bucket_nanos`)
/// and reported as `count / bucket_nanos`; selectivities are a running
/// `passed / attempted` ratio. Neither ever needs an explicit reset: each
/// is an online average that naturally tracks drift.
#[derive(Debug)]
pub struct StatisticsCollector {
    bucket_nanos: i64,
    arrivals: hashbrown::HashMap<Arc<str>, ArrivalBucket>,
    selectivity: hashbrown::HashMap<(Arc<str>, Arc<str>), SelectivityCounter>,
}

#[derive(Debug, Default)]
struct ArrivalBucket {
    bucket_start: i64,
    count_in_bucket: u64,
    rate_estimate: f64,
}

#[derive(Debug, Default)]
struct SelectivityCounter {
    attempted: u64,
    passed: u64,
}

impl StatisticsCollector {
    pub fn new(bucket_nanos: i64) -> Self {
        Self {
            bucket_nanos,
            arrivals: hashbrown::HashMap::new(),
            selectivity: hashbrown::HashMap::new(),
        }
    }

    /// Record one observed event of `event_type` at `timestamp`.
    pub fn observe_arrival(&mut self, event_type: Arc<str>, timestamp: i64) {
        let bucket = self.arrivals.entry(event_type).or_insert_with(|| ArrivalBucket {
            bucket_start: timestamp,
            count_in_bucket: 0,
            rate_estimate: 0.0,
        });
        if timestamp - bucket.bucket_start >= self.bucket_nanos {
            let elapsed = (timestamp - bucket.bucket_start).max(1) as f64;
            bucket.rate_estimate = bucket.count_in_bucket as f64 / elapsed;
            bucket.bucket_start = timestamp;
            bucket.count_in_bucket = 0;
        }
        bucket.count_in_bucket += 1;
    }

    /// Record one join attempt between `left`/`right` event types and
    /// whether its predicate passed.
    pub fn observe_join(&mut self, left: Arc<str>, right: Arc<str>, passed: bool) {
        let counter = self.selectivity.entry((left, right)).or_default();
        counter.attempted += 1;
        if passed {
            counter.passed += 1;
        }
    }

    pub fn value_of(&self, kind: &StatisticKind) -> Option<StatisticValue> {
        match kind {
            StatisticKind::ArrivalRate(t) => {
                self.arrivals.get(t).map(|b| StatisticValue::ArrivalRate(b.rate_estimate))
            }
            StatisticKind::Selectivity(l, r) => self.selectivity.get(&(Arc::clone(l), Arc::clone(r))).map(|c| {
                let ratio = if c.attempted == 0 {
                    0.0
                } else {
                    c.passed as f64 / c.attempted as f64
                };
                StatisticValue::Selectivity(ratio)
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectivity_is_passed_over_attempted() {
        let mut stats = StatisticsCollector::new(1_000_000_000);
        let a: Arc<str> = Arc::from("A");
        let b: Arc<str> = Arc::from("B");
        stats.observe_join(a.clone(), b.clone(), true);
        stats.observe_join(a.clone(), b.clone(), false);
        stats.observe_join(a.clone(), b.clone(), true);
        let v = stats.value_of(&StatisticKind::Selectivity(a, b)).unwrap();
        assert!((v.as_f64() - (2.0 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn unseen_kind_reports_none() {
        let stats = StatisticsCollector::new(1_000);
        assert!(stats
            .value_of(&StatisticKind::ArrivalRate(Arc::from("Unknown")))
            .is_none());
    }
}
