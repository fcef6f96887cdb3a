//! Partial-match storage policies.
//!
//! Both variants reject duplicate content (no two partial matches with
//! identical event sets *and* identical pattern-id sets) by rejecting
//! inserts that are `content_eq` to an existing entry.

use crate::partial_match::{PartialMatch, PartialMatchId};
use std::{fmt, sync::Arc};

/// A key extraction function for [`SortedStorage`]: pulls the designated
/// attribute off the designated child event.
pub type KeyExtractorFn = Arc<dyn Fn(&PartialMatch) -> f64 + Send + Sync>;

/// The common interface every node's partial-match buffer implements.
pub trait PartialMatchStorage: fmt::Debug + Send {
    /// Insert `pm`. Returns `false` (and does not insert) if an equal
    /// entry is already present.
    fn try_insert(&mut self, pm: PartialMatch) -> bool;

    /// Remove and return every entry whose `last_timestamp < before_ts`.
    fn prune_older_than(&mut self, before_ts: i64) -> Vec<PartialMatch>;

    /// Iterate all live entries, in storage order.
    fn iter(&self) -> Box<dyn Iterator<Item = &PartialMatch> + '_>;

    /// Remove one entry by id, for the load shedder.
    fn remove_by_id(&mut self, id: PartialMatchId) -> Option<PartialMatch>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Append-only storage: `prune`/`iterate` are linear scans.
#[derive(Debug, Default)]
pub struct UnsortedStorage {
    entries: Vec<PartialMatch>,
}

impl UnsortedStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PartialMatchStorage for UnsortedStorage {
    fn try_insert(&mut self, pm: PartialMatch) -> bool {
        if self.entries.iter().any(|e| e.content_eq(&pm)) {
            return false;
        }
        self.entries.push(pm);
        true
    }

    fn prune_older_than(&mut self, before_ts: i64) -> Vec<PartialMatch> {
        let mut removed = Vec::new();
        self.entries.retain(|pm| {
            if pm.last_timestamp < before_ts {
                removed.push(pm.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &PartialMatch> + '_> {
        Box::new(self.entries.iter())
    }

    fn remove_by_id(&mut self, id: PartialMatchId) -> Option<PartialMatch> {
        let pos = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(pos))
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// What a [`SortedStorage`] is ordered by.
#[derive(Clone)]
pub enum SortKey {
    /// Ordered by `last_timestamp`. Because every partial match placed into
    /// one storage arrives in non-decreasing event-time order, this
    /// ordering is maintained for free and `prune_older_than` becomes a
    /// genuine binary-search prefix drop.
    Timestamp,
    /// Ordered by a designated attribute, extracted from a designated
    /// child event. Chosen by the plan when a join predicate is an
    /// equality or range on that attribute, so the opposite-side scan
    /// during a join is also binary-searchable. Because attribute order is
    /// not generally time order, `prune_older_than` falls back to a full
    /// scan here.
    Attribute(KeyExtractorFn),
}

impl fmt::Debug for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortKey::Timestamp => write!(f, "SortKey::Timestamp"),
            SortKey::Attribute(_) => write!(f, "SortKey::Attribute(..)"),
        }
    }
}

impl SortKey {
    fn of(&self, pm: &PartialMatch) -> f64 {
        match self {
            SortKey::Timestamp => pm.last_timestamp as f64,
            SortKey::Attribute(f) => f(pm),
        }
    }
}

/// Storage kept in ascending order by a chosen key.
#[derive(Debug)]
pub struct SortedStorage {
    key: SortKey,
    entries: Vec<PartialMatch>,
}

impl SortedStorage {
    pub fn new(key: SortKey) -> Self {
        Self {
            key,
            entries: Vec::new(),
        }
    }

    fn insertion_point(&self, key: f64, id: PartialMatchId) -> usize {
        self.entries
            .partition_point(|e| (self.key.of(e), e.id) < (key, id))
    }
}

impl PartialMatchStorage for SortedStorage {
    fn try_insert(&mut self, pm: PartialMatch) -> bool {
        let key = self.key.of(&pm);
        // Duplicate content necessarily yields an equal key (the key is a
        // pure function of content), so scanning the equal-key run
        // suffices to reject it without a full scan.
        let start = self.entries.partition_point(|e| self.key.of(e) < key);
        let mut i = start;
        while i < self.entries.len() && self.key.of(&self.entries[i]) == key {
            if self.entries[i].content_eq(&pm) {
                return false;
            }
            i += 1;
        }
        let pos = self.insertion_point(key, pm.id);
        self.entries.insert(pos, pm);
        true
    }

    fn prune_older_than(&mut self, before_ts: i64) -> Vec<PartialMatch> {
        match &self.key {
            SortKey::Timestamp => {
                let cut = self.entries.partition_point(|e| e.last_timestamp < before_ts);
                self.entries.drain(0..cut).collect()
            }
            SortKey::Attribute(_) => {
                let mut removed = Vec::new();
                self.entries.retain(|pm| {
                    if pm.last_timestamp < before_ts {
                        removed.push(pm.clone());
                        false
                    } else {
                        true
                    }
                });
                removed
            }
        }
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &PartialMatch> + '_> {
        Box::new(self.entries.iter())
    }

    fn remove_by_id(&mut self, id: PartialMatchId) -> Option<PartialMatch> {
        let pos = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(pos))
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use crate::partial_match::IdGenerator;
    use hashbrown::HashMap;

    fn pm(ids: &IdGenerator, t: i64) -> PartialMatch {
        PartialMatch::singleton(
            Arc::new(Event::primitive("A", HashMap::new(), t)),
            vec![1],
            ids,
        )
    }

    #[test]
    fn unsorted_rejects_duplicate_content() {
        let ids = IdGenerator::new();
        let mut storage = UnsortedStorage::new();
        let a = pm(&ids, 1);
        let b = a.clone();
        assert!(storage.try_insert(a));
        assert!(!storage.try_insert(b));
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn sorted_by_timestamp_prunes_prefix() {
        let ids = IdGenerator::new();
        let mut storage = SortedStorage::new(SortKey::Timestamp);
        for t in [0, 5, 10, 15] {
            storage.try_insert(pm(&ids, t));
        }
        let removed = storage.prune_older_than(10);
        assert_eq!(removed.len(), 2);
        assert_eq!(storage.len(), 2);
        let remaining: Vec<_> = storage.iter().map(|e| e.last_timestamp).collect();
        assert_eq!(remaining, vec![10, 15]);
    }

    #[test]
    fn sorted_by_timestamp_stays_ordered() {
        let ids = IdGenerator::new();
        let mut storage = SortedStorage::new(SortKey::Timestamp);
        for t in [10, 0, 5] {
            storage.try_insert(pm(&ids, t));
        }
        let order: Vec<_> = storage.iter().map(|e| e.last_timestamp).collect();
        assert_eq!(order, vec![0, 5, 10]);
    }
}
