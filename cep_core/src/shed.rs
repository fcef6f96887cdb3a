//! Load shedding: when memory pressure is detected, discard the
//! least valuable buffered partial matches rather than fall behind or OOM.
//!
//! Buckets are keyed by `(slice_id, length_id)` -- `slice_id` identifies
//! which time slice of the window a partial match's span falls into,
//! `length_id` how many events it has accumulated. A bucket's value is
//! `slice_idx + length_idx`: older slices and shorter (less-invested)
//! matches are worth less, so they are shed first. This is the one
//! reconciled contract out of the source implementation's two diverging
//! `StateBasedLoadShedder` variants (see the design notes).

use crate::partial_match::PartialMatchId;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BucketKey {
    pub slice_id: usize,
    pub length_id: usize,
}

impl BucketKey {
    pub fn value(&self) -> usize {
        self.slice_id + self.length_id
    }
}

/// Tracks which bucket every currently-buffered partial match falls into,
/// and can answer "what should I shed next" in bucket-value order without
/// rescanning every node's storage.
#[derive(Debug, Default)]
pub struct BucketManager {
    members: hashbrown::HashMap<BucketKey, Vec<PartialMatchId>>,
    location: hashbrown::HashMap<PartialMatchId, BucketKey>,
}

impl BucketManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `id` under `key`. Idempotent: if `id` is already
    /// tracked under a different bucket, it is moved rather than
    /// double-counted.
    pub fn track(&mut self, id: PartialMatchId, key: BucketKey) {
        if let Some(&old_key) = self.location.get(&id) {
            if old_key == key {
                return;
            }
            if let Some(ids) = self.members.get_mut(&old_key) {
                ids.retain(|&existing| existing != id);
                if ids.is_empty() {
                    self.members.remove(&old_key);
                }
            }
        }
        self.members.entry(key).or_default().push(id);
        self.location.insert(id, key);
    }

    pub fn untrack(&mut self, id: PartialMatchId) {
        if let Some(key) = self.location.remove(&id) {
            if let Some(ids) = self.members.get_mut(&key) {
                ids.retain(|&existing| existing != id);
                if ids.is_empty() {
                    self.members.remove(&key);
                }
            }
        }
    }

    /// The lowest-value non-empty bucket currently tracked.
    pub fn lowest_value_bucket(&self) -> Option<BucketKey> {
        self.members
            .keys()
            .copied()
            .min_by_key(|k| (k.value(), k.slice_id, k.length_id))
    }

    /// Remove and return every id in the lowest-value bucket: whole-bucket
    /// removal, not partial, per the reconciled contract.
    pub fn shed_lowest_bucket(&mut self) -> Vec<PartialMatchId> {
        let Some(key) = self.lowest_value_bucket() else {
            return Vec::new();
        };
        let ids = self.members.remove(&key).unwrap_or_default();
        for id in &ids {
            self.location.remove(id);
        }
        ids
    }

    /// Shed whole buckets, lowest-value first, until at least `target`
    /// partial matches have been discarded (or nothing is left to shed).
    /// Returns every discarded id.
    pub fn shed_until(&mut self, target: usize) -> Vec<PartialMatchId> {
        let mut discarded = Vec::new();
        while discarded.len() < target && !self.members.is_empty() {
            let batch = self.shed_lowest_bucket();
            if batch.is_empty() {
                break;
            }
            discarded.extend(batch);
        }
        discarded
    }

    pub fn len(&self) -> usize {
        self.location.len()
    }

    pub fn is_empty(&self) -> bool {
        self.location.is_empty()
    }

    /// The buckets in ascending shed order, for observability.
    pub fn ordered_buckets(&self) -> Vec<BucketKey> {
        let mut heap: BinaryHeap<Reverse<(usize, usize, usize)>> = self
            .members
            .keys()
            .map(|k| Reverse((k.value(), k.slice_id, k.length_id)))
            .collect();
        let mut out = Vec::with_capacity(heap.len());
        while let Some(Reverse((_, slice_id, length_id))) = heap.pop() {
            out.push(BucketKey { slice_id, length_id });
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sheds_lowest_value_bucket_first() {
        let mut mgr = BucketManager::new();
        mgr.track(PartialMatchId(1), BucketKey { slice_id: 0, length_id: 0 });
        mgr.track(PartialMatchId(2), BucketKey { slice_id: 3, length_id: 1 });
        let shed = mgr.shed_lowest_bucket();
        assert_eq!(shed, vec![PartialMatchId(1)]);
        assert_eq!(mgr.len(), 1);
    }

    #[test]
    fn shed_until_removes_whole_buckets_not_partial() {
        let mut mgr = BucketManager::new();
        let key = BucketKey { slice_id: 0, length_id: 0 };
        mgr.track(PartialMatchId(1), key);
        mgr.track(PartialMatchId(2), key);
        mgr.track(PartialMatchId(3), BucketKey { slice_id: 5, length_id: 0 });
        let shed = mgr.shed_until(1);
        assert_eq!(shed.len(), 2);
        assert_eq!(mgr.len(), 1);
    }

    #[test]
    fn track_moves_an_already_tracked_id_instead_of_double_counting() {
        let mut mgr = BucketManager::new();
        let first = BucketKey { slice_id: 0, length_id: 0 };
        let second = BucketKey { slice_id: 2, length_id: 2 };
        mgr.track(PartialMatchId(1), first);
        mgr.track(PartialMatchId(1), second);
        assert_eq!(mgr.len(), 1);
        assert_eq!(mgr.lowest_value_bucket(), Some(second));
        let shed = mgr.shed_lowest_bucket();
        assert_eq!(shed, vec![PartialMatchId(1)]);
        assert!(mgr.is_empty());
    }

    #[test]
    fn untrack_removes_single_member_without_affecting_bucket() {
        let mut mgr = BucketManager::new();
        let key = BucketKey { slice_id: 1, length_id: 1 };
        mgr.track(PartialMatchId(1), key);
        mgr.track(PartialMatchId(2), key);
        mgr.untrack(PartialMatchId(1));
        assert_eq!(mgr.len(), 1);
        assert_eq!(mgr.lowest_value_bucket(), Some(key));
    }
}
