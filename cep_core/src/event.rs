//! Typed events: the unit the tree ingests at its leaves.

use hashbrown::HashMap;
use std::sync::Arc;

/// A primitive value an event's payload can carry.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

impl Value {
    /// Total order over `Value`, used by sorted storage when the
    /// designated attribute is numeric or textual. Cross-variant
    /// comparisons are arbitrary but stable, since sorted storage only ever
    /// compares values extracted from the same attribute of the same event
    /// type.
    pub fn cmp_total(&self, other: &Self) -> std::cmp::Ordering {
        use std::cmp::Ordering::*;
        use Value::*;
        match (self, other) {
            (Int(a), Int(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.partial_cmp(b).unwrap_or(Equal),
            (Str(a), Str(b)) => a.cmp(b),
            (Bool(a), Bool(b)) => a.cmp(b),
            (Int(a), Float(b)) => (*a as f64).partial_cmp(b).unwrap_or(Equal),
            (Float(a), Int(b)) => a.partial_cmp(&(*b as f64)).unwrap_or(Equal),
            _ => Equal,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }
}

/// An immutable, timestamped primitive event.
///
/// `min_timestamp` and `max_timestamp` coincide for events produced
/// directly by the input adapter; a composite event synthesized elsewhere
/// (out of this core's scope) could carry a wider span, which is why the
/// field is load-bearing rather than a convenience duplicate.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub event_type: Arc<str>,
    pub payload: HashMap<String, Value>,
    pub min_timestamp: i64,
    pub max_timestamp: i64,
}

impl Event {
    /// Construct a primitive event: `min_timestamp == max_timestamp == timestamp`.
    pub fn primitive(
        event_type: impl Into<Arc<str>>,
        payload: HashMap<String, Value>,
        timestamp: i64,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
            min_timestamp: timestamp,
            max_timestamp: timestamp,
        }
    }

    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.payload.get(attribute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_event_has_equal_timestamps() {
        let e = Event::primitive("A", HashMap::new(), 42);
        assert_eq!(e.min_timestamp, 42);
        assert_eq!(e.max_timestamp, 42);
    }

    #[test]
    fn value_total_order_is_numeric_across_int_and_float() {
        assert_eq!(
            Value::Int(1).cmp_total(&Value::Float(1.5)),
            std::cmp::Ordering::Less
        );
    }
}
