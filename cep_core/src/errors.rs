//! Error taxonomy.
//!
//! Configuration and pattern errors are fatal at construction time and are
//! always surfaced to the caller. Runtime data errors never propagate out
//! of [`crate::eval::EvaluationMechanism::eval_event`]; they are counted
//! and logged instead. Invariant violations indicate a programming error
//! and abort with context rather than being recovered from.

use snafu::Snafu;

/// Errors that can occur while constructing an evaluation mechanism from a
/// [`crate::config::EngineConfig`].
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    #[snafu(display("unknown configuration tag `{tag}` for `{option}`"))]
    UnknownEnumTag { option: &'static str, tag: String },

    #[snafu(display(
        "optimizer kind `{kind}` requires pre-seeded pattern statistics but none were supplied"
    ))]
    MissingStatistics { kind: &'static str },

    #[snafu(display(
        "adaptive reoptimization is not supported in multi-pattern mode ({pattern_count} patterns registered)"
    ))]
    AdaptivityWithMultiPattern { pattern_count: usize },
}

/// Errors that can occur while constructing a [`crate::pattern::Pattern`].
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PatternError {
    #[snafu(display("window must be a positive duration, got {window_nanos}ns"))]
    NonPositiveWindow { window_nanos: i64 },

    #[snafu(display("predicate over unbound name(s) `{names}` can never be satisfied"))]
    UnsatisfiablePredicate { names: String },

    #[snafu(display("pattern `{pattern_id}` has no primitive atoms"))]
    EmptyPattern { pattern_id: u64 },
}

/// A data error encountered while decoding one raw input row.
///
/// Never propagated out of the evaluation loop: the offending event is
/// dropped, [`crate::metrics::Metrics::malformed_events`] is incremented,
/// and processing continues with the next row.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RuntimeDataError {
    #[snafu(display("could not decode row `{raw}`: {reason}"))]
    Undecodable { raw: String, reason: String },
}

/// Programming-error-class failure: one of the tree's structural
/// invariants no longer holds. There is no recovery path; the caller is
/// expected to treat this as a bug report.
#[derive(Debug, Snafu)]
#[snafu(display("invariant {invariant} violated: {context}"))]
pub struct InvariantViolation {
    pub invariant: &'static str,
    pub context: String,
}

impl InvariantViolation {
    /// Build and immediately panic with an [`InvariantViolation`]'s message.
    ///
    /// Centralizes the "abort with context" policy from the error design so
    /// every call site reads the same way.
    #[track_caller]
    pub fn abort(invariant: &'static str, context: impl Into<String>) -> ! {
        panic!(
            "{}",
            InvariantViolation {
                invariant,
                context: context.into(),
            }
        )
    }
}
