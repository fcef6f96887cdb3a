//! Time functionality for the CEP evaluation core.
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(
    missing_copy_implementations,
    missing_debug_implementations,
    clippy::clone_on_ref_ptr
)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::RwLock;
use std::{fmt::Debug, sync::Arc};

/// A point in time, stored as nanoseconds since the Unix epoch.
///
/// Engine components never read the wall clock directly for sequencing
/// decisions (the evaluation mechanism is event-time driven per-event), but
/// `Time` is the common currency for anything that *does* need a clock: the
/// metrics stream, `cep_core::stats`'s statistics-update timer reference
/// point, and deterministic tests driven by [`MockProvider`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Time(i64);

impl Time {
    /// Construct a `Time` from nanoseconds since the Unix epoch.
    pub fn from_timestamp_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    /// Construct a `Time` from milliseconds since the Unix epoch.
    pub fn from_timestamp_millis(millis: i64) -> Self {
        Self(millis * 1_000_000)
    }

    /// Nanoseconds since the Unix epoch.
    pub fn timestamp_nanos(&self) -> i64 {
        self.0
    }

    /// Milliseconds since the Unix epoch.
    pub fn timestamp_millis(&self) -> i64 {
        self.0 / 1_000_000
    }

    /// The duration elapsed between `earlier` and `self`, saturating at zero.
    pub fn checked_duration_since(&self, earlier: Self) -> Option<std::time::Duration> {
        if self.0 < earlier.0 {
            None
        } else {
            Some(std::time::Duration::from_nanos((self.0 - earlier.0) as u64))
        }
    }

    /// `self + duration`.
    pub fn checked_add(&self, duration: std::time::Duration) -> Option<Self> {
        i64::try_from(duration.as_nanos())
            .ok()
            .and_then(|d| self.0.checked_add(d))
            .map(Self)
    }

    /// Convert to a [`chrono::DateTime<Utc>`].
    pub fn date_time(&self) -> DateTime<Utc> {
        Utc.timestamp_nanos(self.0)
    }
}

impl From<DateTime<Utc>> for Time {
    fn from(t: DateTime<Utc>) -> Self {
        Self(t.timestamp_nanos_opt().unwrap_or(i64::MAX))
    }
}

impl std::ops::Sub for Time {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Duration {
        Duration::nanoseconds(self.0 - rhs.0)
    }
}

/// Something that knows the current time.
///
/// Abstracted so tests can run the evaluation mechanism's statistics-tick
/// timer and metrics sink against a [`MockProvider`] instead of the real
/// clock.
pub trait TimeProvider: Debug + Send + Sync + 'static {
    /// Returns the current `Time`.
    fn now(&self) -> Time;
}

/// A [`TimeProvider`] that uses [`Utc::now`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProvider {}

impl SystemProvider {
    /// Create a new `SystemProvider`.
    pub fn new() -> Self {
        Self {}
    }
}

impl TimeProvider for SystemProvider {
    fn now(&self) -> Time {
        Utc::now().into()
    }
}

/// A [`TimeProvider`] that returns a fixed, externally-settable time.
///
/// Used by tests that need deterministic statistics-window ticks or
/// deterministic metric timestamps.
#[derive(Debug)]
pub struct MockProvider {
    now: RwLock<Time>,
}

impl MockProvider {
    /// Create a new `MockProvider` fixed at `now`.
    pub fn new(now: Time) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    /// Set the mocked time.
    pub fn set(&self, time: Time) {
        *self.now.write() = time;
    }

    /// Advance the mocked time by `duration`.
    pub fn inc(&self, duration: std::time::Duration) {
        let mut now = self.now.write();
        *now = now.checked_add(duration).expect("time overflow");
    }
}

impl TimeProvider for MockProvider {
    fn now(&self) -> Time {
        *self.now.read()
    }
}

/// Convenience alias for a shared, trait-object time provider.
pub type TimeProviderRef = Arc<dyn TimeProvider>;
