//! Adaptive reoptimization strategies: decide, after each event,
//! whether the current plan is still good enough or whether the tree
//! should be rebuilt from a fresh plan.
//!
//! Reoptimization itself (discarding a [`crate::tree::Tree`] and rebuilding
//! one from a new [`crate::plan::TreePlanNode`]) is the evaluation
//! mechanism's job; this module only answers "should I, right now".

use crate::pattern::NegationAlgorithm;
use crate::plan::TreePlanNode;
use crate::stats::{StatisticKind, StatisticValue, StatisticsCollector};
use std::sync::Arc;

/// Decides whether a tree should be reoptimized, given the latest
/// statistics observed since it was built.
pub trait Optimizer: std::fmt::Debug + Send {
    fn should_reoptimize(&mut self, stats: &StatisticsCollector) -> bool;

    /// Called after a reoptimization decision has been acted on, so the
    /// optimizer can reset whatever baseline it compares future
    /// observations against.
    fn reset_baseline(&mut self, stats: &StatisticsCollector);
}

/// Always reoptimizes: every event triggers a fresh plan. Used as the
/// initial optimizer before any statistics exist, and as a deliberately
/// wasteful baseline for testing.
#[derive(Debug, Default)]
pub struct TrivialOptimizer;

impl Optimizer for TrivialOptimizer {
    fn should_reoptimize(&mut self, _stats: &StatisticsCollector) -> bool {
        true
    }

    fn reset_baseline(&mut self, _stats: &StatisticsCollector) {}
}

/// Reoptimizes when any tracked statistic has drifted from its last-seen
/// value by more than a relative threshold `t`.
#[derive(Debug)]
pub struct StatisticsDeviationAwareOptimizer {
    tracked: Vec<StatisticKind>,
    threshold: f64,
    baseline: hashbrown::HashMap<StatisticKind, f64>,
}

impl StatisticsDeviationAwareOptimizer {
    pub fn new(tracked: Vec<StatisticKind>, threshold: f64) -> Self {
        Self {
            tracked,
            threshold,
            baseline: hashbrown::HashMap::new(),
        }
    }
}

impl Optimizer for StatisticsDeviationAwareOptimizer {
    fn should_reoptimize(&mut self, stats: &StatisticsCollector) -> bool {
        for kind in &self.tracked {
            let Some(current) = stats.value_of(kind) else {
                continue;
            };
            let current = current.as_f64();
            match self.baseline.get(kind) {
                None => return true,
                Some(&baseline) => {
                    let denom = baseline.abs().max(f64::EPSILON);
                    if ((current - baseline).abs() / denom) > self.threshold {
                        return true;
                    }
                }
            }
        }
        false
    }

    fn reset_baseline(&mut self, stats: &StatisticsCollector) {
        for kind in &self.tracked {
            if let Some(v) = stats.value_of(kind) {
                self.baseline.insert(kind.clone(), v.as_f64());
            }
        }
    }
}

/// A condition a [`TreePlanNode`] is expected to keep satisfying, e.g.
/// "this join's left child has the lower estimated arrival rate".
/// Evaluated against current statistics by [`InvariantsAwareOptimizer`].
pub type PlanInvariant = Arc<dyn Fn(&TreePlanNode, &StatisticsCollector) -> bool + Send + Sync>;

/// Builds a plan and returns the invariants that plan's shape relies on
/// staying true; reoptimization is triggered the moment one breaks.
pub trait InvariantAwarePlanBuilder: std::fmt::Debug + Send + Sync {
    fn build_with_invariants(
        &self,
        operator: &crate::pattern::Operator,
        negation_algorithm: NegationAlgorithm,
    ) -> (TreePlanNode, Vec<PlanInvariant>);
}

#[derive(Debug)]
pub struct InvariantsAwareOptimizer {
    plan: TreePlanNode,
    invariants: Vec<PlanInvariant>,
}

impl InvariantsAwareOptimizer {
    pub fn new(plan: TreePlanNode, invariants: Vec<PlanInvariant>) -> Self {
        Self { plan, invariants }
    }

    pub fn adopt(&mut self, plan: TreePlanNode, invariants: Vec<PlanInvariant>) {
        self.plan = plan;
        self.invariants = invariants;
    }
}

impl Optimizer for InvariantsAwareOptimizer {
    fn should_reoptimize(&mut self, stats: &StatisticsCollector) -> bool {
        !self.invariants.iter().all(|inv| inv(&self.plan, stats))
    }

    fn reset_baseline(&mut self, _stats: &StatisticsCollector) {}
}
