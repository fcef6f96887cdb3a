//! Multi-pattern merging: when several patterns are registered at
//! once, decide how much of their trees to share so a common sub-match
//! isn't recomputed once per pattern.

use crate::pattern::Pattern;
use crate::plan::{TreePlanBuilder, TreePlanNode};

/// One registered pattern's plan, tagged with the pattern it came from.
#[derive(Debug, Clone)]
pub struct PlannedPattern {
    pub pattern_id: u64,
    pub plan: TreePlanNode,
}

/// Decides how a set of per-pattern plans should be merged into a
/// (possibly smaller) set of trees to actually build.
pub trait MultiPatternMerger: std::fmt::Debug + Send + Sync {
    /// Returns groups of patterns that should become one shared tree each.
    /// Every input pattern id appears in exactly one output group.
    fn merge(&self, plans: &[PlannedPattern]) -> Vec<Vec<u64>>;
}

/// No sharing: every pattern gets its own tree. The trivial, always-correct
/// fallback every other strategy is judged against.
#[derive(Debug, Default)]
pub struct NoMerge;

impl MultiPatternMerger for NoMerge {
    fn merge(&self, plans: &[PlannedPattern]) -> Vec<Vec<u64>> {
        plans.iter().map(|p| vec![p.pattern_id]).collect()
    }
}

/// Groups patterns whose plans share an identical leaf atom (same event
/// type and bound name) at the same structural position, the cheapest
/// sharing granularity: the input leaves are computed once and the
/// resulting partial matches fan out to every pattern that needs them.
#[derive(Debug, Default)]
pub struct ShareLeavesMerger;

impl MultiPatternMerger for ShareLeavesMerger {
    fn merge(&self, plans: &[PlannedPattern]) -> Vec<Vec<u64>> {
        group_by_signature(plans, |plan| leaf_signature(plan))
    }
}

/// Groups patterns whose entire plan shape is identical up to pattern id
/// (same operator tree, same atoms, same predicates' labels): the whole
/// subtree is shared, not just its leaves.
#[derive(Debug, Default)]
pub struct SubtreeUnionMerger;

impl MultiPatternMerger for SubtreeUnionMerger {
    fn merge(&self, plans: &[PlannedPattern]) -> Vec<Vec<u64>> {
        group_by_signature(plans, |plan| plan_signature(plan))
    }
}

fn group_by_signature(
    plans: &[PlannedPattern],
    signature_of: impl Fn(&TreePlanNode) -> Vec<String>,
) -> Vec<Vec<u64>> {
    let mut groups: Vec<(Vec<String>, Vec<u64>)> = Vec::new();
    for p in plans {
        let sig = signature_of(&p.plan);
        match groups.iter_mut().find(|(s, _)| *s == sig) {
            Some((_, ids)) => ids.push(p.pattern_id),
            None => groups.push((sig, vec![p.pattern_id])),
        }
    }
    groups.into_iter().map(|(_, ids)| ids).collect()
}

fn leaf_signature(plan: &TreePlanNode) -> Vec<String> {
    plan.atoms()
        .into_iter()
        .map(|a| format!("{}/{}", a.event_type, a.name))
        .collect()
}

fn plan_signature(plan: &TreePlanNode) -> Vec<String> {
    fn walk(plan: &TreePlanNode, out: &mut Vec<String>) {
        match plan {
            TreePlanNode::Leaf { atom, .. } => out.push(format!("L:{}/{}", atom.event_type, atom.name)),
            TreePlanNode::Binary { operator, left, right, .. } => {
                out.push(format!("B:{operator:?}"));
                walk(left, out);
                walk(right, out);
            }
            TreePlanNode::Negation { positive, negated, .. } => {
                out.push(format!("N:{}/{}", negated.event_type, negated.name));
                walk(positive, out);
            }
            TreePlanNode::Kc { atom, max_iter, .. } => {
                out.push(format!("K:{}/{}/{}", atom.event_type, atom.name, max_iter));
            }
        }
    }
    let mut out = Vec::new();
    walk(plan, &mut out);
    out
}

/// A tabu-style local search: starting from [`SubtreeUnionMerger`]'s
/// grouping, repeatedly tries moving one pattern to a different group (or
/// its own), keeping the move only if it reduces the total estimated leaf
/// recomputation cost, and refuses to revisit a (pattern, group) move
/// already tried in the last `tabu_len` steps.
#[derive(Debug)]
pub struct LocalSearchMerger {
    pub iterations: usize,
    pub tabu_len: usize,
}

impl Default for LocalSearchMerger {
    fn default() -> Self {
        Self {
            iterations: 50,
            tabu_len: 10,
        }
    }
}

impl MultiPatternMerger for LocalSearchMerger {
    fn merge(&self, plans: &[PlannedPattern]) -> Vec<Vec<u64>> {
        let mut groups = SubtreeUnionMerger.merge(plans);
        let leaves: hashbrown::HashMap<u64, Vec<String>> =
            plans.iter().map(|p| (p.pattern_id, leaf_signature(&p.plan))).collect();

        let mut tabu: std::collections::VecDeque<(u64, usize)> = std::collections::VecDeque::new();
        for _ in 0..self.iterations {
            let mut best_move: Option<(usize, usize, usize, i64)> = None; // (pattern group idx, pattern idx in group, dest group idx, gain)
            for (gi, group) in groups.iter().enumerate() {
                for (pi, &pattern_id) in group.iter().enumerate() {
                    if group.len() <= 1 {
                        continue;
                    }
                    for (dest, _) in groups.iter().enumerate() {
                        if dest == gi || tabu.contains(&(pattern_id, dest)) {
                            continue;
                        }
                        let gain = move_gain(&groups, gi, pattern_id, dest, &leaves);
                        if gain > 0 && best_move.map(|(_, _, _, g)| gain > g).unwrap_or(true) {
                            best_move = Some((gi, pi, dest, gain));
                        }
                    }
                }
            }
            let Some((gi, pi, dest, _)) = best_move else {
                break;
            };
            let pattern_id = groups[gi][pi];
            groups[gi].remove(pi);
            groups[dest].push(pattern_id);
            groups.retain(|g| !g.is_empty());
            tabu.push_back((pattern_id, dest));
            if tabu.len() > self.tabu_len {
                tabu.pop_front();
            }
        }
        groups
    }
}

fn move_gain(
    groups: &[Vec<u64>],
    from: usize,
    pattern_id: u64,
    dest: usize,
    leaves: &hashbrown::HashMap<u64, Vec<String>>,
) -> i64 {
    let empty = Vec::new();
    let this_leaves = leaves.get(&pattern_id).unwrap_or(&empty);
    let shared_with_dest = groups[dest]
        .iter()
        .filter(|id| leaves.get(id).map(|l| l == this_leaves).unwrap_or(false))
        .count();
    let shared_with_from = groups[from]
        .iter()
        .filter(|&&id| id != pattern_id)
        .filter(|id| leaves.get(id).map(|l| l == this_leaves).unwrap_or(false))
        .count();
    shared_with_dest as i64 - shared_with_from as i64
}

/// Convenience entry point: plan every pattern with `builder`, merge with
/// `merger`, and return each resulting group's patterns alongside the
/// pattern id that should anchor its shared tree (the lowest id in the
/// group, deterministically).
pub fn plan_and_merge(
    patterns: &[Pattern],
    builder: &dyn TreePlanBuilder,
    merger: &dyn MultiPatternMerger,
) -> Vec<(u64, Vec<u64>)> {
    let plans: Vec<PlannedPattern> = patterns
        .iter()
        .map(|p| PlannedPattern {
            pattern_id: p.id,
            plan: builder.build(&p.operator, p.negation_algorithm),
        })
        .collect();
    merger
        .merge(&plans)
        .into_iter()
        .map(|mut ids| {
            ids.sort_unstable();
            let anchor = *ids.first().expect("merge never returns an empty group");
            (anchor, ids)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{NegationAlgorithm, Operator, PatternAtom};
    use crate::plan::TrivialLeftDeepBuilder;

    fn pattern(id: u64, op: Operator) -> Pattern {
        Pattern {
            id,
            operator: op,
            predicates: Vec::new(),
            window_nanos: 1_000,
            confidence_threshold: None,
            statistics: None,
            negation_algorithm: NegationAlgorithm::Naive,
        }
    }

    #[test]
    fn no_merge_keeps_every_pattern_separate() {
        let patterns = vec![
            pattern(1, Operator::Atom(PatternAtom::new("A", "a"))),
            pattern(2, Operator::Atom(PatternAtom::new("B", "b"))),
        ];
        let groups = plan_and_merge(&patterns, &TrivialLeftDeepBuilder, &NoMerge);
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn share_leaves_groups_identical_single_atom_patterns() {
        let patterns = vec![
            pattern(1, Operator::Atom(PatternAtom::new("A", "a"))),
            pattern(2, Operator::Atom(PatternAtom::new("A", "a"))),
            pattern(3, Operator::Atom(PatternAtom::new("B", "b"))),
        ];
        let groups = plan_and_merge(&patterns, &TrivialLeftDeepBuilder, &ShareLeavesMerger);
        assert_eq!(groups.len(), 2);
    }
}
