//! The pattern-preprocessing boundary: parsing and general preprocessing
//! are out of scope. The one preprocessing step this core does own is
//! splitting disjunctions, because the tree evaluation
//! mechanism has no `Or` node kind at all -- every [`TreePlanNode`]
//! variant is one of Leaf/Binary/Negation/Kc, never `Or`.

use crate::pattern::{NegationAlgorithm, Operator, Pattern, Predicate, StatisticsSeed};

/// Expand every top-level `Or` in `pattern.operator` into its own
/// `Or`-free pattern, one per disjunct, all sharing the original's window,
/// predicates, and statistics, each getting a distinct derived id.
///
/// A predicate that does not mention a disjunct's atoms is irrelevant to
/// it but harmless to keep: `Pattern::validate`'s unbound-name check is
/// re-run by the caller before use, so a disjunct a predicate doesn't
/// apply to would be rejected if it only runs against that disjunct's
/// narrower atom set -- so this function drops predicates whose names are
/// not a subset of the disjunct's atoms rather than carrying them over
/// uncritically.
pub fn split_disjunctions(pattern: &Pattern) -> Vec<Pattern> {
    let disjuncts = flatten(&pattern.operator);
    disjuncts
        .into_iter()
        .enumerate()
        .map(|(i, operator)| {
            let atom_names: Vec<_> = operator.atoms().into_iter().map(|a| a.name).collect();
            let predicates: Vec<Predicate> = pattern
                .predicates
                .iter()
                .filter(|p| p.names.iter().all(|n| atom_names.contains(n)))
                .cloned()
                .collect();
            Pattern {
                id: derived_id(pattern.id, i),
                operator,
                predicates,
                window_nanos: pattern.window_nanos,
                confidence_threshold: pattern.confidence_threshold,
                statistics: pattern.statistics.clone(),
                negation_algorithm: pattern.negation_algorithm,
            }
        })
        .collect()
}

/// Encodes the (original pattern id, disjunct index) pair into a single
/// `u64` so split patterns never collide with each other or with an
/// un-split pattern's id, while still letting a caller recover which
/// original pattern a disjunct came from.
fn derived_id(original: u64, disjunct_index: usize) -> u64 {
    original.wrapping_mul(1_000).wrapping_add(disjunct_index as u64)
}

/// Distribute `Or` over the tree, returning one `Or`-free [`Operator`] per
/// top-level disjunct. `Or` may appear nested under `And`/`Seq`, in which
/// case the cartesian product of each child's disjuncts is produced.
fn flatten(operator: &Operator) -> Vec<Operator> {
    match operator {
        Operator::Atom(_) | Operator::Neg(_) => vec![operator.clone()],
        Operator::Kc { .. } => vec![operator.clone()],
        Operator::Or(children) => children.iter().flat_map(flatten).collect(),
        Operator::And(children) => cartesian(children, Operator::And),
        Operator::Seq(children) => cartesian(children, Operator::Seq),
    }
}

fn cartesian(children: &[Operator], rebuild: fn(Vec<Operator>) -> Operator) -> Vec<Operator> {
    let per_child: Vec<Vec<Operator>> = children.iter().map(flatten).collect();
    let mut combos: Vec<Vec<Operator>> = vec![Vec::new()];
    for options in per_child {
        let mut next = Vec::with_capacity(combos.len() * options.len());
        for combo in &combos {
            for option in &options {
                let mut extended = combo.clone();
                extended.push(option.clone());
                next.push(extended);
            }
        }
        combos = next;
    }
    combos.into_iter().map(rebuild).collect()
}

/// Whether `seed`'s statistics still apply unchanged to a pattern split out
/// of a larger one: they do, verbatim, since disjuncts don't change
/// per-event-type arrival rates or selectivities.
pub fn carries_statistics(seed: &Option<StatisticsSeed>, _algorithm: NegationAlgorithm) -> bool {
    seed.is_some()
}
