//! Engine configuration: every enum tag the evaluation mechanism accepts,
//! gathered on one struct so a caller (programmatic embedder or the
//! `cep` binary's CLI) builds it once.

use crate::pattern::NegationAlgorithm;
use crate::stats::StatisticKind;

/// How the evaluation mechanism swaps a tree for a freshly built one when
/// the optimizer decides to reoptimize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeUpdateType {
    /// Drain the old tree's completed matches, then discard its buffered
    /// partial matches outright and start the new tree empty.
    Trivial,
    /// Run old and new trees side by side for one window, union their
    /// completed matches (de-duplicated), then discard the old tree.
    Simultaneous,
}

/// Which [`crate::optimizer::Optimizer`] the mechanism constructs.
#[derive(Debug, Clone)]
pub enum OptimizerKind {
    Trivial,
    DeviationAware {
        tracked: Vec<StatisticKind>,
        threshold: f64,
    },
    InvariantsAware,
}

/// Which [`crate::merge::MultiPatternMerger`] to use when more than one
/// pattern is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    ShareLeaves,
    SubtreeUnion,
    LocalSearch,
}

/// Full engine configuration, covering every recognized option.
///
/// `Config::validate` (called by [`crate::eval::EvaluationMechanism::new`])
/// is where configuration errors -- unknown enum tag (impossible to
/// construct via this typed API, but checked at the CLI/decoding boundary
/// instead, see `cep_core::io`), missing statistics where an optimizer
/// requires them, adaptivity combined with multi-pattern mode -- surface
/// before any tree is built.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Whether adaptive reoptimization runs at all. Forbidden when
    /// more than one pattern is registered.
    pub adaptive: bool,
    pub update_type: TreeUpdateType,
    pub optimizer: OptimizerKind,
    /// Event-time duration between statistics ticks; the optimizer's
    /// statistics window is an event-time duration, not a wall-clock one.
    pub statistics_update_window_nanos: i64,
    pub merge: MergeStrategy,
    /// Maximum concurrent active partial matches before a shed is
    /// triggered.
    pub load_shed_threshold: usize,
    /// Partial matches to free per shed, once triggered.
    pub load_shed_target: usize,
    /// Default negation algorithm for patterns that don't specify their
    /// own.
    pub negation_algorithm: NegationAlgorithm,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            adaptive: false,
            update_type: TreeUpdateType::Trivial,
            optimizer: OptimizerKind::Trivial,
            statistics_update_window_nanos: 1_000_000_000,
            merge: MergeStrategy::ShareLeaves,
            load_shed_threshold: usize::MAX,
            load_shed_target: 0,
            negation_algorithm: NegationAlgorithm::Naive,
        }
    }
}

impl EngineConfig {
    /// Configuration errors that are detectable from the config alone,
    /// before any pattern is known. `pattern_count`-dependent checks (the
    /// multi-pattern/adaptivity conflict, missing-statistics) are checked
    /// by [`crate::eval::EvaluationMechanism::new`] once the pattern set is
    /// in hand.
    pub fn validate_adaptivity(&self, pattern_count: usize) -> Result<(), crate::errors::ConfigError> {
        use crate::errors::AdaptivityWithMultiPatternSnafu;
        use snafu::ensure;
        ensure!(
            !(self.adaptive && pattern_count > 1),
            AdaptivityWithMultiPatternSnafu { pattern_count }
        );
        Ok(())
    }
}

/// Parse a `key=value`-style enum tag from the CLI/config boundary into a
/// typed value, surfacing an "unknown enum tag" configuration error for
/// anything unrecognized, rather than panicking on a malformed flag.
pub fn parse_update_type(tag: &str) -> Result<TreeUpdateType, crate::errors::ConfigError> {
    match tag {
        "trivial" => Ok(TreeUpdateType::Trivial),
        "simultaneous" => Ok(TreeUpdateType::Simultaneous),
        other => Err(unknown_tag("tree-update-type", other)),
    }
}

pub fn parse_merge_strategy(tag: &str) -> Result<MergeStrategy, crate::errors::ConfigError> {
    match tag {
        "share-leaves" => Ok(MergeStrategy::ShareLeaves),
        "subtree-union" => Ok(MergeStrategy::SubtreeUnion),
        "local-search" => Ok(MergeStrategy::LocalSearch),
        other => Err(unknown_tag("multi-pattern-merge", other)),
    }
}

pub fn parse_negation_algorithm(tag: &str) -> Result<NegationAlgorithm, crate::errors::ConfigError> {
    match tag {
        "naive" => Ok(NegationAlgorithm::Naive),
        "statistic" => Ok(NegationAlgorithm::Statistic),
        "lowest-position" => Ok(NegationAlgorithm::LowestPosition),
        other => Err(unknown_tag("negation-algorithm", other)),
    }
}

fn unknown_tag(option: &'static str, tag: &str) -> crate::errors::ConfigError {
    crate::errors::ConfigError::UnknownEnumTag {
        option,
        tag: tag.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_adaptivity_with_multiple_patterns() {
        let cfg = EngineConfig {
            adaptive: true,
            ..EngineConfig::default()
        };
        assert!(cfg.validate_adaptivity(2).is_err());
        assert!(cfg.validate_adaptivity(1).is_ok());
    }

    #[test]
    fn unknown_tag_is_a_config_error() {
        assert!(parse_update_type("bogus").is_err());
        assert_eq!(parse_update_type("trivial").unwrap(), TreeUpdateType::Trivial);
    }
}
