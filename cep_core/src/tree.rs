//! The evaluation tree: an arena of [`TreeNode`]s wired together by
//! [`NodeId`] edges, fed one event at a time.

use crate::errors::PatternError;
use crate::event::Event;
use crate::node::kc::{CURRENT_NAME, PREVIOUS_NAME};
use crate::node::{BinaryState, KcState, LeafState, NegationState, NodeId, NodeKind, TreeNode};
use crate::partial_match::{IdGenerator, PartialMatch, PartialMatchId};
use crate::pattern::{Bindings, Pattern, Predicate};
use crate::plan::{BinaryOp, StoragePlan, TreePlanBuilder, TreePlanNode};
use crate::shed::{BucketKey, BucketManager};
use crate::storage::{PartialMatchStorage, SortedStorage, SortKey, UnsortedStorage};
use std::sync::Arc;

/// Classify `pm`'s bucket: `slice_id` by age-third within the window,
/// `length_id` with longer (more-invested) matches mapped to lower ids so
/// they are shed last.
fn bucket_key(pm: &PartialMatch, window_nanos: i64) -> BucketKey {
    let third = (window_nanos as f64 / 3.0).max(1.0);
    let slice_id = ((pm.span().max(0) as f64 / third) as usize).min(2);
    let length_id = 2usize.saturating_sub(pm.events.len().saturating_sub(1).min(2));
    BucketKey { slice_id, length_id }
}

/// One pattern's evaluation tree: owns every node's buffered state and the
/// indices used to route an incoming event to the nodes interested in it.
#[derive(Debug)]
pub struct Tree {
    nodes: Vec<TreeNode>,
    root: NodeId,
    window_nanos: i64,
    pattern_ids: Vec<u64>,
    ids: IdGenerator,
    leaves_by_type: hashbrown::HashMap<Arc<str>, Vec<NodeId>>,
    kc_by_type: hashbrown::HashMap<Arc<str>, Vec<NodeId>>,
    negations_by_type: hashbrown::HashMap<Arc<str>, Vec<NodeId>>,
    /// Root-level accepted matches, ready to be drained.
    completed: Vec<PartialMatch>,
    /// Tracks every partial match currently buffered in any node's storage,
    /// by age/length bucket, so [`Tree::shed`] can answer "what's least
    /// valuable" without rescanning every storage. One instance per
    /// tree, never shared across trees.
    shedder: BucketManager,
    /// Every join attempt's (left type, right type, predicate passed)
    /// outcome since the last [`Tree::drain_join_observations`] call, fed
    /// to [`crate::stats::StatisticsCollector::observe_join`] by whichever
    /// evaluation mechanism owns this tree.
    join_observations: Vec<(Arc<str>, Arc<str>, bool)>,
}

fn make_storage(plan: &StoragePlan) -> Box<dyn PartialMatchStorage> {
    match plan {
        StoragePlan::Unsorted => Box::new(UnsortedStorage::new()),
        StoragePlan::SortedByTimestamp => Box::new(SortedStorage::new(SortKey::Timestamp)),
        // A concrete attribute extractor needs the runtime bound-name
        // table to resolve `bound_name` into an event; node state doesn't
        // have that context at construction time, so attribute-sorted
        // storage degrades to timestamp order here. The join itself is
        // still correct (join correctness never depends on storage
        // order), it simply forgoes the binary-search speedup sorted-by-
        // attribute storage gives for that case.
        StoragePlan::SortedByAttribute { .. } => Box::new(SortedStorage::new(SortKey::Timestamp)),
    }
}

impl Tree {
    /// Build a tree from a decided plan and a pattern's predicates/window.
    /// `ids` is shared across every tree in an [`crate::eval::EvaluationMechanism`]
    /// so partial-match ids stay unique process-wide.
    pub fn from_plan(plan: &TreePlanNode, pattern: &Pattern, ids: IdGenerator) -> Result<Self, PatternError> {
        pattern.validate()?;
        let mut nodes = Vec::new();
        let mut scopes: Vec<(NodeId, Vec<Arc<str>>)> = Vec::new();
        let root = build_recursive(plan, None, pattern.window_nanos, &mut nodes, &mut scopes);

        let mut remaining = pattern.predicates.clone();
        // Assign each predicate to the shallowest (smallest-scope) node
        // whose names cover it, so it is checked exactly once, as early as
        // possible.
        scopes.sort_by_key(|(_, names)| names.len());
        let mut assigned = vec![false; remaining.len()];
        for (node_id, scope) in &scopes {
            for (i, predicate) in remaining.iter().enumerate() {
                if assigned[i] || !predicate.satisfiable_within(scope) {
                    continue;
                }
                match &mut nodes[node_id.0].kind {
                    NodeKind::Binary(b) if predicate.names.len() > 1 || scope.len() == predicate.names.len() => {
                        b.predicates.push(predicate.clone());
                        assigned[i] = true;
                    }
                    NodeKind::Leaf(l) if predicate.names.len() <= 1 => {
                        l.predicates.push(predicate.clone());
                        assigned[i] = true;
                    }
                    NodeKind::Kc(k) if predicate.names.len() <= 1 => {
                        k.predicates.push(predicate.clone());
                        assigned[i] = true;
                    }
                    _ => {}
                }
            }
        }
        // Anything left over must still be a legal assignment per
        // `Pattern::validate` (all names are declared); place it at the
        // root's binary state if there is one, otherwise it is a
        // single-atom pattern and the predicate belongs on the leaf.
        for (i, predicate) in remaining.drain(..).enumerate() {
            if assigned[i] {
                continue;
            }
            // A predicate whose scope is only satisfied at a negation node
            // constrains names that include the negated atom; negation
            // here is presence/absence only, so fall back to its positive
            // child.
            let target = match &nodes[root.0].kind {
                NodeKind::Negation(n) => n.positive,
                _ => root,
            };
            match &mut nodes[target.0].kind {
                NodeKind::Binary(b) => b.predicates.push(predicate),
                NodeKind::Leaf(l) => l.predicates.push(predicate),
                NodeKind::Kc(k) => k.predicates.push(predicate),
                NodeKind::Negation(_) => {}
            }
        }

        let mut leaves_by_type: hashbrown::HashMap<Arc<str>, Vec<NodeId>> = hashbrown::HashMap::new();
        let mut kc_by_type: hashbrown::HashMap<Arc<str>, Vec<NodeId>> = hashbrown::HashMap::new();
        let mut negations_by_type: hashbrown::HashMap<Arc<str>, Vec<NodeId>> = hashbrown::HashMap::new();
        for (i, node) in nodes.iter().enumerate() {
            match &node.kind {
                NodeKind::Leaf(l) => leaves_by_type
                    .entry(Arc::clone(&l.atom.event_type))
                    .or_default()
                    .push(NodeId(i)),
                NodeKind::Kc(k) => kc_by_type
                    .entry(Arc::clone(&k.atom.event_type))
                    .or_default()
                    .push(NodeId(i)),
                NodeKind::Negation(n) => negations_by_type
                    .entry(Arc::clone(&n.negated.event_type))
                    .or_default()
                    .push(NodeId(i)),
                NodeKind::Binary(_) => {}
            }
        }

        Ok(Self {
            nodes,
            root,
            window_nanos: pattern.window_nanos,
            pattern_ids: vec![pattern.id],
            ids,
            leaves_by_type,
            kc_by_type,
            negations_by_type,
            completed: Vec::new(),
            shedder: BucketManager::new(),
            join_observations: Vec::new(),
        })
    }

    /// Total partial matches currently buffered across every node's
    /// storage, the quantity a load-shed threshold is compared against.
    pub fn active_partial_count(&self) -> usize {
        self.shedder.len()
    }

    /// Shed whole buckets, lowest-value first, until at least `target`
    /// partial matches have been discarded from this tree's storages.
    /// Returns the discarded ids.
    pub fn shed(&mut self, target: usize) -> Vec<PartialMatchId> {
        let ids = self.shedder.shed_until(target);
        for &id in &ids {
            self.drop_partial_by_id(id);
        }
        ids
    }

    /// Remove `id` from whichever node storage currently holds it, without
    /// touching the shedder's own bookkeeping (the caller already removed
    /// it there). Exposed so an external load-shed driver coordinating
    /// several trees can still call `drop_partial_by_id` on every node
    /// storage itself.
    fn drop_partial_by_id(&mut self, id: PartialMatchId) {
        for node in &mut self.nodes {
            match &mut node.kind {
                NodeKind::Binary(b) => {
                    if b.left_storage.remove_by_id(id).is_some()
                        || b.right_storage.remove_by_id(id).is_some()
                    {
                        node.forget(id);
                        return;
                    }
                }
                _ => {
                    if let Some(storage) = node.storage.as_mut() {
                        if storage.remove_by_id(id).is_some() {
                            node.forget(id);
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Feed one event through every entry point it is relevant to, then
    /// prune every node's storage to the pattern's window. Returns nothing;
    /// newly completed matches accumulate for [`Tree::drain`].
    pub fn on_event(&mut self, event: Arc<Event>) {
        if let Some(leaves) = self.leaves_by_type.get(&event.event_type).cloned() {
            for leaf in leaves {
                self.leaf_event(leaf, Arc::clone(&event));
            }
        }
        if let Some(kcs) = self.kc_by_type.get(&event.event_type).cloned() {
            for kc in kcs {
                self.kc_event(kc, Arc::clone(&event));
            }
        }
        if let Some(negs) = self.negations_by_type.get(&event.event_type).cloned() {
            for neg in negs {
                self.negative_event(neg, &event);
            }
        }
        self.advance_to(event.max_timestamp);
    }

    /// Advance event-time to `now` without a new event: flushes any
    /// negation buffer entries whose window has closed (so a positive
    /// match with no disqualifying event is confirmed and propagated) and
    /// prunes every node's storage to the window. This is the same tail
    /// `on_event` runs after routing an event; exposed separately so
    /// end-of-stream draining can flush pending confirmations without a
    /// real event to route.
    pub fn advance_to(&mut self, now: i64) {
        self.advance_time(now);
        self.prune_older_than(now - self.window_nanos);
    }

    /// Take every completed match accumulated so far.
    pub fn drain(&mut self) -> Vec<PartialMatch> {
        std::mem::take(&mut self.completed)
    }

    /// Take every join outcome observed so far, for the caller to feed into
    /// a [`crate::stats::StatisticsCollector`].
    pub fn drain_join_observations(&mut self) -> Vec<(Arc<str>, Arc<str>, bool)> {
        std::mem::take(&mut self.join_observations)
    }

    pub fn pattern_ids(&self) -> &[u64] {
        &self.pattern_ids
    }

    fn leaf_event(&mut self, leaf: NodeId, event: Arc<Event>) {
        let predicates_pass = {
            let NodeKind::Leaf(l) = &self.nodes[leaf.0].kind else {
                unreachable!()
            };
            let names = [Arc::clone(&l.atom.name)];
            let events = [Arc::clone(&event)];
            let bindings = Bindings::new(&names, &events);
            l.predicates.iter().all(|p| p.eval(&bindings))
        };
        if !predicates_pass {
            return;
        }
        let name = {
            let NodeKind::Leaf(l) = &self.nodes[leaf.0].kind else {
                unreachable!()
            };
            Arc::clone(&l.atom.name)
        };
        let pm = PartialMatch::singleton(event, self.pattern_ids.clone(), &self.ids);
        self.propagate_up(leaf, pm, vec![name]);
    }

    fn kc_event(&mut self, kc: NodeId, event: Arc<Event>) {
        let (atom_name, max_iter, predicates, step_predicate) = {
            let NodeKind::Kc(k) = &self.nodes[kc.0].kind else {
                unreachable!()
            };
            (
                Arc::clone(&k.atom.name),
                k.max_iter,
                k.predicates.clone(),
                k.step_predicate.clone(),
            )
        };
        let candidate_names = [Arc::clone(&atom_name)];
        let candidate_events = [Arc::clone(&event)];
        let bindings = Bindings::new(&candidate_names, &candidate_events);
        if !predicates.iter().all(|p| p.eval(&bindings)) {
            return;
        }

        let existing: Vec<(PartialMatch, Vec<Arc<str>>)> = {
            let node = &self.nodes[kc.0];
            node.storage
                .as_ref()
                .expect("Kc node always owns storage")
                .iter()
                .map(|pm| (pm.clone(), node.names_of(pm.id).to_vec()))
                .collect()
        };

        let mut new_chains = Vec::new();
        if max_iter >= 1 {
            let singleton = PartialMatch::singleton(Arc::clone(&event), self.pattern_ids.clone(), &self.ids);
            new_chains.push((singleton, vec![Arc::clone(&atom_name)]));
        }
        for (chain, chain_names) in &existing {
            if chain.events.len() >= max_iter {
                continue;
            }
            let last_event = chain.events.last().expect("chain always non-empty");
            let step_ok = match &step_predicate {
                Some(p) => {
                    let names = [
                        Arc::<str>::from(PREVIOUS_NAME),
                        Arc::<str>::from(CURRENT_NAME),
                    ];
                    let events = [Arc::clone(last_event), Arc::clone(&event)];
                    p.eval(&Bindings::new(&names, &events))
                }
                None => true,
            };
            if !step_ok {
                continue;
            }
            let mut events = chain.events.clone();
            events.push(Arc::clone(&event));
            let mut names = chain_names.clone();
            names.push(Arc::clone(&atom_name));
            let extended = PartialMatch {
                events,
                first_timestamp: chain.first_timestamp,
                last_timestamp: event.max_timestamp.max(chain.last_timestamp),
                pattern_ids: chain.pattern_ids.clone(),
                probability: chain.probability,
                id: self.ids.next(),
            };
            new_chains.push((extended, names));
        }

        for (chain, names) in new_chains {
            let chain_id = chain.id;
            let should_store = chain.events.len() < max_iter;
            if should_store {
                let node = &mut self.nodes[kc.0];
                let storage = node.storage.as_mut().expect("Kc node always owns storage");
                if !storage.try_insert(chain.clone()) {
                    continue;
                }
                node.record_names(chain_id, names.clone());
                self.shedder.track(chain_id, bucket_key(&chain, self.window_nanos));
            }
            self.propagate_up(kc, chain, names);
        }
    }

    fn negative_event(&mut self, neg: NodeId, event: &Event) {
        let window_nanos = self.nodes[neg.0].window_nanos;
        let candidates: Vec<(PartialMatchId, i64)> = {
            let node = &self.nodes[neg.0];
            node.storage
                .as_ref()
                .expect("Negation node always owns storage")
                .iter()
                .map(|pm| (pm.id, pm.first_timestamp))
                .collect()
        };
        for (id, first_timestamp) in candidates {
            // Checked against [first_timestamp, first_timestamp + window],
            // not the positive match's actual [first_timestamp,
            // last_timestamp] span -- a negative event past last_timestamp
            // but still inside the window is treated as disqualifying.
            let within = event.min_timestamp >= first_timestamp
                && event.min_timestamp <= first_timestamp + window_nanos;
            if !within {
                continue;
            }
            let node = &mut self.nodes[neg.0];
            let storage = node.storage.as_mut().expect("Negation node always owns storage");
            if storage.remove_by_id(id).is_some() {
                node.forget(id);
                self.shedder.untrack(id);
            }
        }
    }

    fn positive_arrived(&mut self, neg: NodeId, pm: PartialMatch, names: Vec<Arc<str>>) {
        let id = pm.id;
        let key = bucket_key(&pm, self.window_nanos);
        let node = &mut self.nodes[neg.0];
        let storage = node.storage.as_mut().expect("Negation node always owns storage");
        if storage.try_insert(pm) {
            node.record_names(id, names);
            self.shedder.track(id, key);
        }
    }

    /// Flush any pending negation buffer entries whose window has closed
    /// without a disqualifying event: they are now confirmed and propagate
    /// onward.
    fn advance_time(&mut self, now: i64) {
        let negation_ids: Vec<NodeId> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| matches!(n.kind, NodeKind::Negation(_)))
            .map(|(i, _)| NodeId(i))
            .collect();
        for neg in negation_ids {
            let window_nanos = self.nodes[neg.0].window_nanos;
            let ready: Vec<PartialMatchId> = {
                let node = &self.nodes[neg.0];
                node.storage
                    .as_ref()
                    .expect("Negation node always owns storage")
                    .iter()
                    .filter(|pm| pm.first_timestamp + window_nanos <= now)
                    .map(|pm| pm.id)
                    .collect()
            };
            for id in ready {
                let (pm, names) = {
                    let node = &mut self.nodes[neg.0];
                    let names = node.names_of(id).to_vec();
                    let storage = node.storage.as_mut().expect("Negation node always owns storage");
                    let pm = storage.remove_by_id(id);
                    node.forget(id);
                    (pm, names)
                };
                if let Some(pm) = pm {
                    self.shedder.untrack(id);
                    self.propagate_up(neg, pm, names);
                }
            }
        }
    }

    fn prune_older_than(&mut self, before_ts: i64) {
        for i in 0..self.nodes.len() {
            match &mut self.nodes[i].kind {
                NodeKind::Binary(b) => {
                    let left_removed = b.left_storage.prune_older_than(before_ts);
                    let right_removed = b.right_storage.prune_older_than(before_ts);
                    for pm in left_removed.into_iter().chain(right_removed) {
                        self.nodes[i].forget(pm.id);
                        self.shedder.untrack(pm.id);
                    }
                }
                _ => {
                    if let Some(storage) = self.nodes[i].storage.as_mut() {
                        let removed = storage.prune_older_than(before_ts);
                        for pm in removed {
                            self.nodes[i].forget(pm.id);
                            self.shedder.untrack(pm.id);
                        }
                    }
                }
            }
        }
    }

    fn propagate_up(&mut self, from: NodeId, pm: PartialMatch, names: Vec<Arc<str>>) {
        let parent = self.nodes[from.0].parent;
        let Some(parent) = parent else {
            self.completed.push(pm);
            return;
        };
        match &self.nodes[parent.0].kind {
            NodeKind::Binary(_) => self.join_at(parent, from, pm, names),
            NodeKind::Negation(_) => self.positive_arrived(parent, pm, names),
            NodeKind::Leaf(_) | NodeKind::Kc(_) => {
                unreachable!("leaf/Kc nodes are never a propagation parent")
            }
        }
    }

    fn join_at(&mut self, parent: NodeId, from: NodeId, pm: PartialMatch, names: Vec<Arc<str>>) {
        let pm_id = pm.id;
        let (is_left, operator, window_nanos, predicates, opposite): (
            bool,
            BinaryOp,
            i64,
            Vec<Predicate>,
            Vec<(PartialMatch, Vec<Arc<str>>)>,
        ) = {
            let node = &self.nodes[parent.0];
            let window_nanos = node.window_nanos;
            let NodeKind::Binary(b) = &node.kind else {
                unreachable!()
            };
            let is_left = from == b.left;
            let opposite_storage = if is_left { &b.right_storage } else { &b.left_storage };
            let opposite = opposite_storage
                .iter()
                .map(|o| (o.clone(), node.names_of(o.id).to_vec()))
                .collect();
            (is_left, b.operator, window_nanos, b.predicates.clone(), opposite)
        };

        let mut merged = Vec::new();
        for (opp, opp_names) in &opposite {
            let (left_pm, left_names, right_pm, right_names) = if is_left {
                (&pm, &names, opp, opp_names)
            } else {
                (opp, opp_names, &pm, &names)
            };
            if operator == BinaryOp::Seq && left_pm.last_timestamp > right_pm.first_timestamp {
                continue;
            }
            let span_lo = left_pm.first_timestamp.min(right_pm.first_timestamp);
            let span_hi = left_pm.last_timestamp.max(right_pm.last_timestamp);
            if span_hi - span_lo > window_nanos {
                continue;
            }
            let mut combined_events = left_pm.events.clone();
            combined_events.extend(right_pm.events.iter().cloned());
            let mut combined_names = left_names.clone();
            combined_names.extend(right_names.iter().cloned());
            if !predicates.is_empty() {
                let bindings = Bindings::new(&combined_names, &combined_events);
                let passed = predicates.iter().all(|p| p.eval(&bindings));
                self.join_observations.push((
                    Arc::clone(&left_pm.events[0].event_type),
                    Arc::clone(&right_pm.events[0].event_type),
                    passed,
                ));
                if !passed {
                    continue;
                }
            }
            let mut pattern_ids = left_pm.pattern_ids.clone();
            for pid in &right_pm.pattern_ids {
                if !pattern_ids.contains(pid) {
                    pattern_ids.push(*pid);
                }
            }
            let merged_pm = PartialMatch::merge(left_pm, right_pm, pattern_ids, &self.ids);
            merged.push((merged_pm, combined_names));
        }

        {
            let key = bucket_key(&pm, window_nanos);
            let node = &mut self.nodes[parent.0];
            let NodeKind::Binary(b) = &mut node.kind else {
                unreachable!()
            };
            let storage = if is_left {
                &mut b.left_storage
            } else {
                &mut b.right_storage
            };
            if storage.try_insert(pm) {
                node.record_names(pm_id, names);
                self.shedder.track(pm_id, key);
            }
        }

        for (merged_pm, merged_names) in merged {
            self.propagate_up(parent, merged_pm, merged_names);
        }
    }
}

fn build_recursive(
    plan: &TreePlanNode,
    parent: Option<NodeId>,
    window_nanos: i64,
    nodes: &mut Vec<TreeNode>,
    scopes: &mut Vec<(NodeId, Vec<Arc<str>>)>,
) -> NodeId {
    match plan {
        TreePlanNode::Leaf { atom, .. } => {
            let id = NodeId(nodes.len());
            nodes.push(TreeNode {
                kind: NodeKind::Leaf(LeafState {
                    atom: atom.clone(),
                    predicates: Vec::new(),
                }),
                parent,
                storage: None,
                bound_names: hashbrown::HashMap::new(),
                window_nanos,
            });
            scopes.push((id, vec![Arc::clone(&atom.name)]));
            id
        }
        TreePlanNode::Kc {
            atom,
            max_iter,
            step_predicate,
            storage,
        } => {
            let id = NodeId(nodes.len());
            nodes.push(TreeNode {
                kind: NodeKind::Kc(KcState {
                    atom: atom.clone(),
                    max_iter: *max_iter,
                    predicates: Vec::new(),
                    step_predicate: step_predicate.clone(),
                }),
                parent,
                storage: Some(make_storage(storage)),
                bound_names: hashbrown::HashMap::new(),
                window_nanos,
            });
            scopes.push((id, vec![Arc::clone(&atom.name)]));
            id
        }
        TreePlanNode::Negation {
            positive,
            negated,
            algorithm,
        } => {
            let id = NodeId(nodes.len());
            // Reserve this slot, then build the positive child pointing at
            // it as parent, then fill this node in.
            nodes.push(TreeNode {
                kind: NodeKind::Negation(NegationState {
                    positive: NodeId(0),
                    negated: negated.clone(),
                    algorithm: *algorithm,
                }),
                parent,
                storage: Some(Box::new(UnsortedStorage::new())),
                bound_names: hashbrown::HashMap::new(),
                window_nanos,
            });
            let positive_id = build_recursive(positive, Some(id), window_nanos, nodes, scopes);
            if let NodeKind::Negation(n) = &mut nodes[id.0].kind {
                n.positive = positive_id;
            }
            let mut scope = positive_id_scope(scopes, positive_id);
            scope.push(Arc::clone(&negated.name));
            scopes.push((id, scope));
            id
        }
        TreePlanNode::Binary {
            operator,
            left,
            right,
            strategy,
            storage,
        } => {
            let id = NodeId(nodes.len());
            nodes.push(TreeNode {
                kind: NodeKind::Binary(BinaryState {
                    operator: *operator,
                    left: NodeId(0),
                    right: NodeId(0),
                    strategy: *strategy,
                    predicates: Vec::new(),
                    left_storage: make_storage(storage),
                    right_storage: make_storage(storage),
                }),
                parent,
                storage: None,
                bound_names: hashbrown::HashMap::new(),
                window_nanos,
            });
            let left_id = build_recursive(left, Some(id), window_nanos, nodes, scopes);
            let right_id = build_recursive(right, Some(id), window_nanos, nodes, scopes);
            if let NodeKind::Binary(b) = &mut nodes[id.0].kind {
                b.left = left_id;
                b.right = right_id;
            }
            let mut scope = positive_id_scope(scopes, left_id);
            scope.extend(positive_id_scope(scopes, right_id));
            scopes.push((id, scope));
            id
        }
    }
}

fn positive_id_scope(scopes: &[(NodeId, Vec<Arc<str>>)], id: NodeId) -> Vec<Arc<str>> {
    scopes
        .iter()
        .find(|(nid, _)| *nid == id)
        .map(|(_, names)| names.clone())
        .unwrap_or_default()
}

/// Build a [`Tree`] straight from a [`Pattern`] and a plan builder, the
/// common path every evaluation mechanism uses.
pub fn build_tree(
    pattern: &Pattern,
    builder: &dyn TreePlanBuilder,
    ids: IdGenerator,
) -> Result<Tree, PatternError> {
    let plan = builder.build(&pattern.operator, pattern.negation_algorithm);
    Tree::from_plan(&plan, pattern, ids)
}
