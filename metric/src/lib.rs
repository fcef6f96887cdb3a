//! A typed metric registry that renders every observation as one
//! whitespace-delimited line on a shared sink, matching the metrics-stream
//! wire format: `time type metric value attribute attribute_value`.
//!
//! Counters always log `value=1` per observation (they are an event log,
//! not a running total snapshot) and expose a cumulative `total()` for
//! in-process inspection. Histograms log one `(attribute, attribute_value)`
//! pair per point. The sink is guarded by a single mutex so concurrent
//! writers never interleave partial lines; if multiple workers ever share
//! one process they should hold their own per-thread counters and merge
//! periodically rather than contend on this lock on every event.
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(
    missing_copy_implementations,
    missing_debug_implementations,
    clippy::clone_on_ref_ptr
)]

use cep_time::TimeProviderRef;
use parking_lot::Mutex;
use std::{
    fmt::Display,
    io::{self, Write},
    sync::{
        atomic::{AtomicI64, AtomicU64, Ordering},
        Arc,
    },
};

/// Line sink shared by every instrument issued from one [`Registry`].
type Sink = Arc<Mutex<Box<dyn Write + Send>>>;

/// A registry of named metric instruments writing to one shared sink.
///
/// One `Registry` is normally owned by the binary (or by one
/// `EvaluationMechanism`) and cloned (it is cheap, `Arc`-backed) into every
/// component that needs to record an observation.
#[derive(Clone)]
pub struct Registry {
    sink: Sink,
    time_provider: TimeProviderRef,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry").finish_non_exhaustive()
    }
}

impl Registry {
    /// A registry that writes the metrics stream to stdout.
    pub fn new(time_provider: TimeProviderRef) -> Self {
        Self::with_sink(Box::new(io::stdout()), time_provider)
    }

    /// A registry that writes the metrics stream to an arbitrary sink; used
    /// in tests to capture emitted lines.
    pub fn with_sink(sink: Box<dyn Write + Send>, time_provider: TimeProviderRef) -> Self {
        Self {
            sink: Arc::new(Mutex::new(sink)),
            time_provider,
        }
    }

    /// Register (or re-obtain a handle to) a named counter.
    pub fn register_counter(&self, name: &'static str) -> U64Counter {
        U64Counter {
            name,
            total: Arc::new(AtomicU64::new(0)),
            sink: Arc::clone(&self.sink),
            time_provider: Arc::clone(&self.time_provider),
        }
    }

    /// Register (or re-obtain a handle to) a named histogram.
    pub fn register_histogram(&self, name: &'static str) -> Histogram {
        Histogram {
            name,
            last: Arc::new(AtomicI64::new(0)),
            sink: Arc::clone(&self.sink),
            time_provider: Arc::clone(&self.time_provider),
        }
    }
}

/// A named, monotonically-increasing counter.
///
/// Every [`U64Counter::inc`] call both bumps the in-process `total()` and
/// writes one `counter` line with `value=1` to the registry's sink, per the
/// metrics-stream contract.
#[derive(Clone)]
pub struct U64Counter {
    name: &'static str,
    total: Arc<AtomicU64>,
    sink: Sink,
    time_provider: TimeProviderRef,
}

impl std::fmt::Debug for U64Counter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("U64Counter")
            .field("name", &self.name)
            .field("total", &self.total())
            .finish()
    }
}

impl U64Counter {
    /// Increment the counter by one and emit one metrics-stream line.
    pub fn inc(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
        let now = self.time_provider.now().timestamp_nanos();
        let mut sink = self.sink.lock();
        let _ = writeln!(sink, "{now} counter {} 1 0 0", self.name);
    }

    /// The cumulative count observed by this handle (and any clones, since
    /// the underlying atomic is shared).
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

/// A named histogram recording individual `(value, attribute)` points.
#[derive(Clone)]
pub struct Histogram {
    name: &'static str,
    last: Arc<AtomicI64>,
    sink: Sink,
    time_provider: TimeProviderRef,
}

impl std::fmt::Debug for Histogram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Histogram")
            .field("name", &self.name)
            .field("last", &self.last())
            .finish()
    }
}

impl Histogram {
    /// Record one point, tagged with exactly one `(attribute, value)` pair.
    pub fn record(&self, value: i64, attribute: &str, attribute_value: impl Display) {
        self.last.store(value, Ordering::Relaxed);
        let now = self.time_provider.now().timestamp_nanos();
        let mut sink = self.sink.lock();
        let _ = writeln!(
            sink,
            "{now} hist {} {value} {attribute} {attribute_value}",
            self.name
        );
    }

    /// The most recently recorded value.
    pub fn last(&self) -> i64 {
        self.last.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cep_time::{MockProvider, Time};
    use std::sync::{Arc as StdArc, Mutex as StdMutex};

    #[derive(Clone, Default)]
    struct VecSink(StdArc<StdMutex<Vec<u8>>>);

    impl Write for VecSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn lines(sink: &VecSink) -> Vec<String> {
        String::from_utf8(sink.0.lock().unwrap().clone())
            .unwrap()
            .lines()
            .map(|l| l.to_string())
            .collect()
    }

    #[test]
    fn counter_emits_one_line_per_increment() {
        let sink = VecSink::default();
        let provider: TimeProviderRef =
            StdArc::new(MockProvider::new(Time::from_timestamp_millis(10)));
        let registry = Registry::with_sink(Box::new(sink.clone()), provider);
        let counter = registry.register_counter("processed_events");

        counter.inc();
        counter.inc();
        counter.inc();

        assert_eq!(counter.total(), 3);
        let out = lines(&sink);
        assert_eq!(out.len(), 3);
        for line in out {
            let fields: Vec<_> = line.split_whitespace().collect();
            assert_eq!(fields.len(), 6);
            assert_eq!(fields[1], "counter");
            assert_eq!(fields[2], "processed_events");
            assert_eq!(fields[3], "1");
            assert_eq!(fields[4], "0");
            assert_eq!(fields[5], "0");
        }
    }

    #[test]
    fn histogram_emits_attribute_pair() {
        let sink = VecSink::default();
        let provider: TimeProviderRef =
            StdArc::new(MockProvider::new(Time::from_timestamp_millis(10)));
        let registry = Registry::with_sink(Box::new(sink.clone()), provider);
        let hist = registry.register_histogram("event_processing_latency");

        hist.record(42, "pattern_id", 7);

        assert_eq!(hist.last(), 42);
        let out = lines(&sink);
        assert_eq!(out.len(), 1);
        let fields: Vec<_> = out[0].split_whitespace().collect();
        assert_eq!(fields[1], "hist");
        assert_eq!(fields[2], "event_processing_latency");
        assert_eq!(fields[3], "42");
        assert_eq!(fields[4], "pattern_id");
        assert_eq!(fields[5], "7");
    }
}
