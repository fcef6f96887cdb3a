//! The CLI's pattern file format: a JSON document describing one or more
//! [`cep_core::pattern::Pattern`]s.
//!
//! Pattern parsing internals are explicitly out of the evaluation core's
//! scope; this is the thin, CLI-only boundary that makes the binary
//! runnable without an embedder writing its own loader. It covers the
//! structural operator tree (atoms, AND/SEQ/OR/NEG/KC) and a window, but not
//! arbitrary predicates -- a predicate is a Rust closure
//! (`cep_core::pattern::Predicate`) and has no JSON representation, so
//! CLI-defined patterns are structural-only. Embedders that need predicates
//! construct `Pattern` values directly against `cep_core` instead of going
//! through this file format.

use cep_core::pattern::{NegationAlgorithm, Operator, Pattern, PatternAtom};
use cep_core::preprocess::split_disjunctions;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct PatternFile {
    pub patterns: Vec<PatternSpec>,
}

#[derive(Debug, Deserialize)]
pub struct PatternSpec {
    pub id: u64,
    pub window_millis: i64,
    pub operator: OperatorSpec,
    #[serde(default)]
    pub confidence_threshold: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OperatorSpec {
    Atom {
        event_type: String,
        name: String,
    },
    And {
        children: Vec<OperatorSpec>,
    },
    Seq {
        children: Vec<OperatorSpec>,
    },
    Or {
        children: Vec<OperatorSpec>,
    },
    Neg {
        child: Box<OperatorSpec>,
    },
    Kc {
        event_type: String,
        name: String,
        max_iter: usize,
    },
}

impl OperatorSpec {
    fn into_operator(self) -> Operator {
        match self {
            OperatorSpec::Atom { event_type, name } => Operator::Atom(PatternAtom::new(event_type, name)),
            OperatorSpec::And { children } => {
                Operator::And(children.into_iter().map(OperatorSpec::into_operator).collect())
            }
            OperatorSpec::Seq { children } => {
                Operator::Seq(children.into_iter().map(OperatorSpec::into_operator).collect())
            }
            OperatorSpec::Or { children } => {
                Operator::Or(children.into_iter().map(OperatorSpec::into_operator).collect())
            }
            OperatorSpec::Neg { child } => Operator::Neg(Box::new(child.into_operator())),
            OperatorSpec::Kc {
                event_type,
                name,
                max_iter,
            } => Operator::Kc {
                atom: PatternAtom::new(event_type, name),
                max_iter,
                step_predicate: None,
            },
        }
    }
}

impl PatternSpec {
    fn into_pattern(self, negation_algorithm: NegationAlgorithm) -> Pattern {
        Pattern {
            id: self.id,
            operator: self.operator.into_operator(),
            predicates: Vec::new(),
            window_nanos: self.window_millis.saturating_mul(1_000_000),
            confidence_threshold: self.confidence_threshold,
            statistics: None,
            negation_algorithm,
        }
    }
}

/// Load every pattern in `file`, eliminating `Or` via
/// [`split_disjunctions`] so the result is ready for
/// [`cep_core::eval::EvaluationMechanism::new`].
pub fn load_patterns(file: PatternFile, negation_algorithm: NegationAlgorithm) -> Vec<Pattern> {
    file.patterns
        .into_iter()
        .map(|spec| spec.into_pattern(negation_algorithm))
        .flat_map(|pattern| split_disjunctions(&pattern))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_sequence_pattern() {
        let json = r#"{
            "patterns": [
                {
                    "id": 1,
                    "window_millis": 1000,
                    "operator": {
                        "kind": "seq",
                        "children": [
                            {"kind": "atom", "event_type": "A", "name": "a"},
                            {"kind": "atom", "event_type": "B", "name": "b"}
                        ]
                    }
                }
            ]
        }"#;
        let file: PatternFile = serde_json::from_str(json).unwrap();
        let patterns = load_patterns(file, NegationAlgorithm::Naive);
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].window_nanos, 1_000_000_000);
        assert!(patterns[0].validate().is_ok());
    }

    #[test]
    fn or_is_eliminated_into_several_patterns() {
        let json = r#"{
            "patterns": [
                {
                    "id": 1,
                    "window_millis": 1000,
                    "operator": {
                        "kind": "or",
                        "children": [
                            {"kind": "atom", "event_type": "A", "name": "a"},
                            {"kind": "atom", "event_type": "B", "name": "b"}
                        ]
                    }
                }
            ]
        }"#;
        let file: PatternFile = serde_json::from_str(json).unwrap();
        let patterns = load_patterns(file, NegationAlgorithm::Naive);
        assert_eq!(patterns.len(), 2);
        for p in &patterns {
            assert!(!p.operator.contains_or());
        }
    }
}
