//! The evaluation mechanism: the per-event driving loop shared by
//! both tree-update strategies, plus the glue that ties statistics
//! collection, adaptive reoptimization, multi-pattern sharing, and load
//! shedding to one or more live [`Tree`]s.

use crate::config::{EngineConfig, TreeUpdateType};
use crate::errors::{ConfigError, PatternError};
use crate::merge::{plan_and_merge, MultiPatternMerger, NoMerge, ShareLeavesMerger, SubtreeUnionMerger};
use crate::metrics::Metrics;
use crate::optimizer::{Optimizer, TrivialOptimizer};
use crate::partial_match::{IdGenerator, PartialMatch};
use crate::pattern::Pattern;
use crate::plan::{TreePlanBuilder, TrivialLeftDeepBuilder};
use crate::stats::StatisticsCollector;
use crate::tree::{build_tree, Tree};
use std::sync::Arc;

/// One pattern group's live state: its tree, plus (only under
/// [`TreeUpdateType::Simultaneous`]) a still-draining predecessor.
struct TreeSlot {
    pattern_ids: Vec<u64>,
    tree: Tree,
    /// Present only while a simultaneous swap is in flight: the old tree,
    /// still fed every event, and the event-time deadline past which it is
    /// discarded.
    pending_old: Option<(Tree, i64)>,
}

/// Drives an event stream against one or more [`Tree`]s built from a
/// registered pattern set, coordinating statistics collection, adaptive
/// reoptimization, and load shedding.
pub struct EvaluationMechanism {
    config: EngineConfig,
    patterns: hashbrown::HashMap<u64, Pattern>,
    slots: Vec<TreeSlot>,
    ids: IdGenerator,
    stats: StatisticsCollector,
    optimizer: Option<Box<dyn Optimizer>>,
    builder: Box<dyn TreePlanBuilder>,
    last_statistics_tick: Option<i64>,
    /// The latest event's `max_timestamp` seen by [`EvaluationMechanism::eval_event`],
    /// used by [`EvaluationMechanism::finalize`] to know how far to advance
    /// event-time past end-of-stream.
    last_timestamp: Option<i64>,
    metrics: Metrics,
}

/// One rendered full match, ready for the output stream.
pub struct EmittedMatch {
    pub pattern_id: u64,
    pub pm: PartialMatch,
}

impl EvaluationMechanism {
    /// Build the mechanism's initial tree(s) from `patterns` and `config`.
    /// Configuration errors (adaptivity + multi-pattern) and pattern
    /// errors (invalid window, unsatisfiable predicate) surface here,
    /// before any event is processed.
    pub fn new(
        patterns: Vec<Pattern>,
        config: EngineConfig,
        metrics: Metrics,
    ) -> Result<Self, EngineError> {
        config
            .validate_adaptivity(patterns.len())
            .map_err(EngineError::Config)?;
        for p in &patterns {
            p.validate().map_err(EngineError::Pattern)?;
        }

        let ids = IdGenerator::new();
        let builder: Box<dyn TreePlanBuilder> = Box::new(TrivialLeftDeepBuilder);
        let merger: Box<dyn MultiPatternMerger> = match config.merge {
            crate::config::MergeStrategy::ShareLeaves => Box::new(ShareLeavesMerger),
            crate::config::MergeStrategy::SubtreeUnion => Box::new(SubtreeUnionMerger),
            crate::config::MergeStrategy::LocalSearch => {
                Box::new(crate::merge::LocalSearchMerger::default())
            }
        };
        let merger: Box<dyn MultiPatternMerger> = if patterns.len() <= 1 {
            Box::new(NoMerge)
        } else {
            merger
        };

        let groups = plan_and_merge(&patterns, builder.as_ref(), merger.as_ref());
        let patterns_by_id: hashbrown::HashMap<u64, Pattern> =
            patterns.into_iter().map(|p| (p.id, p)).collect();

        let mut slots = Vec::with_capacity(groups.len());
        for (anchor, ids_in_group) in groups {
            let anchor_pattern = patterns_by_id
                .get(&anchor)
                .expect("merge anchor is always one of the input pattern ids");
            let tree = build_tree(anchor_pattern, builder.as_ref(), ids.clone())
                .map_err(EngineError::Pattern)?;
            slots.push(TreeSlot {
                pattern_ids: ids_in_group,
                tree,
                pending_old: None,
            });
        }

        let optimizer: Option<Box<dyn Optimizer>> = if config.adaptive {
            Some(match &config.optimizer {
                crate::config::OptimizerKind::Trivial => {
                    Box::new(TrivialOptimizer) as Box<dyn Optimizer>
                }
                crate::config::OptimizerKind::DeviationAware { tracked, threshold } => Box::new(
                    crate::optimizer::StatisticsDeviationAwareOptimizer::new(
                        tracked.clone(),
                        *threshold,
                    ),
                ),
                // Invariants-aware optimization needs an
                // `InvariantAwarePlanBuilder` to supply the invariants a
                // plan relies on; this mechanism only wires the
                // statistics-free `TrivialLeftDeepBuilder`, so there is
                // nothing to seed `InvariantsAwareOptimizer` with yet.
                // Falls back to the always-reoptimize baseline rather than
                // silently accepting a config it can't honor.
                crate::config::OptimizerKind::InvariantsAware => {
                    Box::new(TrivialOptimizer) as Box<dyn Optimizer>
                }
            })
        } else {
            None
        };

        Ok(Self {
            stats: StatisticsCollector::new(config.statistics_update_window_nanos),
            config,
            patterns: patterns_by_id,
            slots,
            ids,
            optimizer,
            builder,
            last_statistics_tick: None,
            last_timestamp: None,
            metrics,
        })
    }

    /// Whether output should be prefixed with `pattern_id: ` (iff more
    /// than one pattern is registered).
    pub fn multi_pattern(&self) -> bool {
        self.patterns.len() > 1
    }

    /// This mechanism's metrics instrument set, for embedders that want to
    /// read counters directly rather than scrape the rendered stream.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Feed one event through every tree (and, mid-swap, every still-live
    /// predecessor), returning every full match produced. Per-event
    /// processing always runs to completion before this call returns:
    /// there is no suspension point inside.
    pub fn eval_event(&mut self, event: Arc<crate::event::Event>) -> Vec<EmittedMatch> {
        self.metrics.processed_events.inc();
        self.last_timestamp = Some(event.max_timestamp);
        self.stats
            .observe_arrival(Arc::clone(&event.event_type), event.max_timestamp);

        let mut emitted: Vec<PartialMatch> = Vec::new();
        for slot in &mut self.slots {
            slot.tree.on_event(Arc::clone(&event));
            // A shared tree is built once from its group's anchor pattern,
            // so every match it completes belongs to every pattern in the
            // group, not just the anchor -- retag before handing it out.
            for mut pm in slot.tree.drain() {
                pm.pattern_ids = slot.pattern_ids.clone();
                emitted.push(self.metrics.inc_and(pm));
            }
            for (left, right, passed) in slot.tree.drain_join_observations() {
                self.stats.observe_join(left, right, passed);
            }
            if let Some((old_tree, deadline)) = &mut slot.pending_old {
                old_tree.on_event(Arc::clone(&event));
                for mut pm in old_tree.drain() {
                    pm.pattern_ids = slot.pattern_ids.clone();
                    // De-duplicate against what the new tree already
                    // emitted this round: under simultaneous update, matches
                    // from either tree are unioned and de-duplicated by
                    // event-set equality.
                    if !emitted.iter().any(|e| e.content_eq(&pm)) {
                        emitted.push(self.metrics.inc_and(pm));
                    }
                }
                for (left, right, passed) in old_tree.drain_join_observations() {
                    self.stats.observe_join(left, right, passed);
                }
                if event.max_timestamp >= *deadline {
                    slot.pending_old = None;
                }
            }

            let total_active = slot.tree.active_partial_count()
                + slot
                    .pending_old
                    .as_ref()
                    .map(|(t, _)| t.active_partial_count())
                    .unwrap_or(0);
            if total_active > self.config.load_shed_threshold {
                let shed = slot.tree.shed(self.config.load_shed_target);
                for _ in &shed {
                    self.metrics.shed_partials.inc();
                }
            }
        }

        self.maybe_reoptimize(event.max_timestamp);

        emitted
            .into_iter()
            .flat_map(|pm| {
                let pattern_ids = pm.pattern_ids.clone();
                pattern_ids
                    .into_iter()
                    .filter(|pid| self.patterns.contains_key(pid))
                    .map(move |pid| EmittedMatch {
                        pattern_id: pid,
                        pm: pm.clone(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Called once after the event stream ends. Advances every live tree's
    /// event-time clock past the last observed timestamp plus its window, so
    /// any match still waiting on a window-close confirmation -- most
    /// notably a negation with no disqualifying event -- is flushed, then
    /// drains every tree (and any `pending_old` predecessor) one last time.
    /// Per the engine's cancellation contract, end-of-stream always triggers
    /// a graceful drain rather than silently discarding pending matches.
    pub fn finalize(&mut self) -> Vec<EmittedMatch> {
        let Some(last_timestamp) = self.last_timestamp else {
            return Vec::new();
        };

        let mut emitted: Vec<PartialMatch> = Vec::new();
        for slot in &mut self.slots {
            let anchor_id = *slot
                .pattern_ids
                .first()
                .expect("a tree slot always has at least one pattern id");
            let window_nanos = self.patterns.get(&anchor_id).map(|p| p.window_nanos).unwrap_or(0);
            let flush_ts = last_timestamp.saturating_add(window_nanos).saturating_add(1);

            slot.tree.advance_to(flush_ts);
            for mut pm in slot.tree.drain() {
                pm.pattern_ids = slot.pattern_ids.clone();
                emitted.push(self.metrics.inc_and(pm));
            }
            if let Some((old_tree, _)) = &mut slot.pending_old {
                old_tree.advance_to(flush_ts);
                for mut pm in old_tree.drain() {
                    pm.pattern_ids = slot.pattern_ids.clone();
                    if !emitted.iter().any(|e| e.content_eq(&pm)) {
                        emitted.push(self.metrics.inc_and(pm));
                    }
                }
            }
            slot.pending_old = None;
        }

        emitted
            .into_iter()
            .flat_map(|pm| {
                let pattern_ids = pm.pattern_ids.clone();
                pattern_ids
                    .into_iter()
                    .filter(|pid| self.patterns.contains_key(pid))
                    .map(move |pid| EmittedMatch {
                        pattern_id: pid,
                        pm: pm.clone(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// After the statistics window elapses (event-time) and the optimizer
    /// agrees, rebuild every tree from a fresh plan.
    fn maybe_reoptimize(&mut self, now: i64) {
        let Some(optimizer) = &mut self.optimizer else {
            return;
        };
        let due = match self.last_statistics_tick {
            None => true,
            Some(last) => now - last >= self.config.statistics_update_window_nanos,
        };
        if !due {
            return;
        }
        self.last_statistics_tick = Some(now);
        if !optimizer.should_reoptimize(&self.stats) {
            return;
        }
        optimizer.reset_baseline(&self.stats);
        self.metrics.reoptimizations.inc();

        for slot in &mut self.slots {
            let anchor_id = *slot
                .pattern_ids
                .first()
                .expect("a tree slot always has at least one pattern id");
            let pattern = self
                .patterns
                .get(&anchor_id)
                .expect("slot pattern id always refers to a registered pattern");
            let Ok(new_tree) = build_tree(pattern, self.builder.as_ref(), self.ids.clone()) else {
                continue;
            };
            match self.config.update_type {
                TreeUpdateType::Trivial => {
                    // Drain whatever the old tree had already completed,
                    // then discard its buffered partials outright.
                    let _ = slot.tree.drain();
                    slot.tree = new_tree;
                    slot.pending_old = None;
                }
                TreeUpdateType::Simultaneous => {
                    let old = std::mem::replace(&mut slot.tree, new_tree);
                    let window_nanos = pattern.window_nanos;
                    slot.pending_old = Some((old, now + window_nanos));
                }
            }
        }
    }
}

impl Metrics {
    /// Record one full match and hand it back, so call sites can count and
    /// collect in one expression.
    fn inc_and(&self, pm: PartialMatch) -> PartialMatch {
        self.full_matches.inc();
        pm
    }
}

#[derive(Debug)]
pub enum EngineError {
    Config(ConfigError),
    Pattern(PatternError),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Config(e) => write!(f, "{e}"),
            EngineError::Pattern(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for EngineError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use crate::pattern::{NegationAlgorithm, Operator, PatternAtom};
    use cep_time::{MockProvider, Time, TimeProviderRef};
    use hashbrown::HashMap as HMap;
    use metric::Registry;

    fn metrics() -> Metrics {
        let provider: TimeProviderRef = Arc::new(MockProvider::new(Time::from_timestamp_millis(0)));
        let registry = Registry::with_sink(Box::new(std::io::sink()), provider);
        Metrics::new(&registry)
    }

    fn seq_ab_pattern(id: u64, window_nanos: i64) -> Pattern {
        Pattern {
            id,
            operator: Operator::Seq(vec![
                Operator::Atom(PatternAtom::new("A", "a")),
                Operator::Atom(PatternAtom::new("B", "b")),
            ]),
            predicates: Vec::new(),
            window_nanos,
            confidence_threshold: None,
            statistics: None,
            negation_algorithm: NegationAlgorithm::Naive,
        }
    }

    #[test]
    fn single_pattern_emits_full_matches() {
        let pattern = seq_ab_pattern(1, 1_000);
        let mut mech =
            EvaluationMechanism::new(vec![pattern], EngineConfig::default(), metrics()).unwrap();
        let matches = mech.eval_event(Arc::new(Event::primitive("A", HMap::new(), 0)));
        assert!(matches.is_empty());
        let matches = mech.eval_event(Arc::new(Event::primitive("B", HMap::new(), 10)));
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].pattern_id, 1);
    }

    #[test]
    fn multi_pattern_construction_rejects_adaptivity() {
        let patterns = vec![seq_ab_pattern(1, 1_000), seq_ab_pattern(2, 1_000)];
        let cfg = EngineConfig {
            adaptive: true,
            ..EngineConfig::default()
        };
        let result = EvaluationMechanism::new(patterns, cfg, metrics());
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[test]
    fn share_leaves_merges_identical_leaf_patterns_into_one_tree() {
        let patterns = vec![seq_ab_pattern(1, 1_000), seq_ab_pattern(2, 1_000)];
        let mech = EvaluationMechanism::new(patterns, EngineConfig::default(), metrics()).unwrap();
        assert_eq!(mech.slots.len(), 1);
    }

    #[test]
    fn shared_tree_fans_a_match_out_to_every_pattern_in_its_group() {
        let patterns = vec![seq_ab_pattern(1, 1_000), seq_ab_pattern(2, 1_000)];
        let mut mech =
            EvaluationMechanism::new(patterns, EngineConfig::default(), metrics()).unwrap();
        mech.eval_event(Arc::new(Event::primitive("A", HMap::new(), 0)));
        let matches = mech.eval_event(Arc::new(Event::primitive("B", HMap::new(), 10)));
        let mut ids: Vec<u64> = matches.iter().map(|m| m.pattern_id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn trivial_optimizer_rebuilds_tree_on_every_statistics_tick() {
        let pattern = seq_ab_pattern(1, 1_000);
        let cfg = EngineConfig {
            adaptive: true,
            optimizer: crate::config::OptimizerKind::Trivial,
            statistics_update_window_nanos: 1,
            ..EngineConfig::default()
        };
        let mut mech = EvaluationMechanism::new(vec![pattern], cfg, metrics()).unwrap();
        mech.eval_event(Arc::new(Event::primitive("A", HMap::new(), 0)));
        // The reoptimization fires and rebuilds an empty tree, discarding
        // the buffered A -- so a later B alone should not complete a match.
        let matches = mech.eval_event(Arc::new(Event::primitive("B", HMap::new(), 100)));
        assert!(matches.is_empty());
    }

    #[test]
    fn load_shed_prevents_later_matches_using_shed_partials() {
        let pattern = Pattern {
            id: 1,
            operator: Operator::And(vec![
                Operator::Atom(PatternAtom::new("A", "a")),
                Operator::Atom(PatternAtom::new("B", "b")),
            ]),
            predicates: Vec::new(),
            window_nanos: 10_000,
            confidence_threshold: None,
            statistics: None,
            negation_algorithm: NegationAlgorithm::Naive,
        };
        let cfg = EngineConfig {
            load_shed_threshold: 2,
            load_shed_target: 5,
            ..EngineConfig::default()
        };
        let mut mech = EvaluationMechanism::new(vec![pattern], cfg, metrics()).unwrap();
        mech.eval_event(Arc::new(Event::primitive("A", HMap::new(), 0)));
        mech.eval_event(Arc::new(Event::primitive("A", HMap::new(), 1)));
        mech.eval_event(Arc::new(Event::primitive("A", HMap::new(), 2)));
        let matches = mech.eval_event(Arc::new(Event::primitive("B", HMap::new(), 3)));
        assert!(matches.is_empty());
        assert!(mech.metrics.shed_partials.total() > 0);
    }
}
