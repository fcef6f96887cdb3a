//! The evaluation mechanism's metric instruments.
//!
//! One [`Metrics`] is owned by one [`crate::eval::EvaluationMechanism`] and
//! records every counted event over a shared [`metric::Registry`], which
//! renders each observation as one line in the `time type metric value
//! attribute attribute_value` wire format.

use metric::{Histogram, Registry, U64Counter};

/// The named instruments this crate records, grouped on one struct so a
/// caller constructs them once and clones handles into whatever needs to
/// record.
#[derive(Debug, Clone)]
pub struct Metrics {
    /// One per event accepted at any leaf/Kc/negation entry point.
    pub processed_events: U64Counter,
    /// A raw input row the data formatter could not decode; the event is
    /// dropped and processing continues.
    pub malformed_events: U64Counter,
    /// One per full match emitted at a root.
    pub full_matches: U64Counter,
    /// One per partial match discarded by the load shedder.
    pub shed_partials: U64Counter,
    /// One per adaptive tree reoptimization actually carried out.
    pub reoptimizations: U64Counter,
    /// Per-event wall-clock processing latency in nanoseconds, tagged by
    /// pattern id.
    pub event_processing_latency: Histogram,
}

impl Metrics {
    /// Register every instrument this crate needs against `registry`.
    pub fn new(registry: &Registry) -> Self {
        Self {
            processed_events: registry.register_counter("processed_events"),
            malformed_events: registry.register_counter("malformed_events"),
            full_matches: registry.register_counter("full_matches"),
            shed_partials: registry.register_counter("shed_partials"),
            reoptimizations: registry.register_counter("reoptimizations"),
            event_processing_latency: registry.register_histogram("event_processing_latency"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cep_time::{MockProvider, Time, TimeProviderRef};
    use std::sync::Arc;

    #[test]
    fn every_instrument_is_independently_addressable() {
        let provider: TimeProviderRef = Arc::new(MockProvider::new(Time::from_timestamp_millis(0)));
        let registry = Registry::with_sink(Box::new(std::io::sink()), provider);
        let metrics = Metrics::new(&registry);
        metrics.processed_events.inc();
        metrics.malformed_events.inc();
        metrics.full_matches.inc();
        assert_eq!(metrics.processed_events.total(), 1);
        assert_eq!(metrics.malformed_events.total(), 1);
        assert_eq!(metrics.full_matches.total(), 1);
        assert_eq!(metrics.shed_partials.total(), 0);
    }
}
