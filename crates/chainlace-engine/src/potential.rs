//! Nodes of the implication graph and the insertion-ordered node set.

use std::{
    collections::{HashMap, HashSet},
    fmt::{self, Debug, Display},
    hash::{Hash, Hasher},
    sync::Arc,
};

use chainlace_core::{Digit, House, Position};

use crate::hint::ChainingHint;

/// Why an implication edge was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cause {
    /// No recorded cause (assumption nodes).
    #[default]
    None,
    /// The cell can hold only one value.
    NakedSingle,
    /// The digit has only one place left in its block.
    HiddenBlock,
    /// The digit has only one place left in its row.
    HiddenRow,
    /// The digit has only one place left in its column.
    HiddenColumn,
    /// The implication was produced by an auxiliary pattern rule.
    Advanced,
}

impl Cause {
    /// Returns the hidden-single cause matching a house kind.
    #[must_use]
    pub fn hidden_in(house: House) -> Self {
        match house {
            House::Block { .. } => Self::HiddenBlock,
            House::Row { .. } => Self::HiddenRow,
            House::Column { .. } => Self::HiddenColumn,
        }
    }
}

/// Identity of a node: `(position, digit, polarity)`.
///
/// Two [`Potential`]s are the same node exactly when their keys match;
/// cause, explanation and parents never participate in identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PotentialKey {
    /// Cell the node refers to.
    pub position: Position,
    /// Digit the node refers to.
    pub digit: Digit,
    /// `true` if the candidate is asserted, `false` if excluded.
    pub is_on: bool,
}

impl PotentialKey {
    /// Returns the key with the opposite polarity.
    #[must_use]
    pub fn conjugate(self) -> Self {
        Self {
            is_on: !self.is_on,
            ..self
        }
    }
}

struct PotentialInner {
    key: PotentialKey,
    cause: Cause,
    explanation: String,
    nested: Option<ChainingHint>,
    parents: Vec<Potential>,
}

/// A node in the implication graph.
///
/// A potential asserts that a candidate must (`on`) or must not (`off`) be
/// the value of its cell, and carries back-pointers to the premises that
/// produced it. Hint builders later walk the `parents` links to reconstruct
/// human-readable proofs; there are no forward links, so the graph stays
/// acyclic by construction.
///
/// The handle is cheap to clone (shared inner). All proof metadata is fixed
/// at construction: hidden parents and rule parents are gathered before the
/// node is built.
#[derive(Clone)]
pub struct Potential {
    inner: Arc<PotentialInner>,
}

impl Potential {
    /// Creates an assumption node with no parents.
    #[must_use]
    pub fn new(position: Position, digit: Digit, is_on: bool) -> Self {
        Self::with_parents(position, digit, is_on, Cause::None, String::new(), vec![])
    }

    /// Creates a derived node with the given cause, explanation and parents.
    #[must_use]
    pub fn with_parents(
        position: Position,
        digit: Digit,
        is_on: bool,
        cause: Cause,
        explanation: String,
        parents: Vec<Potential>,
    ) -> Self {
        Self {
            inner: Arc::new(PotentialInner {
                key: PotentialKey {
                    position,
                    digit,
                    is_on,
                },
                cause,
                explanation,
                nested: None,
                parents,
            }),
        }
    }

    /// Creates an off node justified by a nested hint ([`Cause::Advanced`]).
    #[must_use]
    pub fn advanced(
        position: Position,
        digit: Digit,
        explanation: String,
        nested: Option<ChainingHint>,
        parents: Vec<Potential>,
    ) -> Self {
        Self {
            inner: Arc::new(PotentialInner {
                key: PotentialKey {
                    position,
                    digit,
                    is_on: false,
                },
                cause: Cause::Advanced,
                explanation,
                nested,
                parents,
            }),
        }
    }

    /// Returns the node identity.
    #[must_use]
    #[inline]
    pub fn key(&self) -> PotentialKey {
        self.inner.key
    }

    /// Returns the cell the node refers to.
    #[must_use]
    #[inline]
    pub fn position(&self) -> Position {
        self.inner.key.position
    }

    /// Returns the digit the node refers to.
    #[must_use]
    #[inline]
    pub fn digit(&self) -> Digit {
        self.inner.key.digit
    }

    /// Returns the polarity of the node.
    #[must_use]
    #[inline]
    pub fn is_on(&self) -> bool {
        self.inner.key.is_on
    }

    /// Returns the cause of the implication that produced this node.
    #[must_use]
    #[inline]
    pub fn cause(&self) -> Cause {
        self.inner.cause
    }

    /// Returns the human-readable justification (may be empty).
    #[must_use]
    #[inline]
    pub fn explanation(&self) -> &str {
        &self.inner.explanation
    }

    /// Returns the nested hint whose reasoning produced this node, if any.
    #[must_use]
    #[inline]
    pub fn nested_chain(&self) -> Option<&ChainingHint> {
        self.inner.nested.as_ref()
    }

    /// Returns the premises this node was derived from, in derivation order.
    #[must_use]
    #[inline]
    pub fn parents(&self) -> &[Potential] {
        &self.inner.parents
    }

    /// Returns the number of distinct transitive parents, plus one.
    ///
    /// Used as the proof-length measure: when several contradictions surface
    /// in one sweep, the pair with the smallest combined ancestor count wins.
    #[must_use]
    pub fn ancestor_count(&self) -> usize {
        let mut seen: HashSet<PotentialKey> = HashSet::new();
        let mut stack: Vec<&Potential> = vec![self];
        while let Some(p) = stack.pop() {
            for parent in p.parents() {
                if seen.insert(parent.key()) {
                    stack.push(parent);
                }
            }
        }
        seen.len() + 1
    }

    /// Returns `true` if `key` occurs on the first-parent chain of this node.
    ///
    /// Cycle search uses this to avoid walking back along the path a node was
    /// derived on.
    #[must_use]
    pub fn first_parent_chain_contains(&self, key: PotentialKey) -> bool {
        let mut current = self;
        while let Some(parent) = current.parents().first() {
            if parent.key() == key {
                return true;
            }
            current = parent;
        }
        false
    }

    /// Returns the chain from this node back to its root assumption,
    /// following first parents, this node first.
    #[must_use]
    pub fn first_parent_chain(&self) -> Vec<Potential> {
        let mut chain = vec![self.clone()];
        let mut current = self.clone();
        while let Some(parent) = current.parents().first().cloned() {
            chain.push(parent.clone());
            current = parent;
        }
        chain
    }

    /// Collects every node reachable through parent links, this node included.
    ///
    /// Nodes are deduplicated by key; order is depth-first and deterministic.
    #[must_use]
    pub fn collect_graph(&self) -> Vec<Potential> {
        let mut seen: HashSet<PotentialKey> = HashSet::new();
        let mut result = vec![];
        let mut stack: Vec<Potential> = vec![self.clone()];
        while let Some(p) = stack.pop() {
            if !seen.insert(p.key()) {
                continue;
            }
            for parent in p.parents().iter().rev() {
                stack.push(parent.clone());
            }
            result.push(p);
        }
        result
    }
}

impl PartialEq for Potential {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Potential {}

impl Hash for Potential {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl Debug for Potential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Potential")
            .field("position", &self.position())
            .field("digit", &self.digit())
            .field("is_on", &self.is_on())
            .field("cause", &self.cause())
            .field("parents", &self.parents().len())
            .finish()
    }
}

impl Display for Potential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let polarity = if self.is_on() { "on" } else { "off" };
        write!(f, "{}={} {polarity}", self.position(), self.digit())
    }
}

/// Insertion-ordered set of [`Potential`]s keyed on `(position, digit, polarity)`.
///
/// Membership checks compare keys only, while [`get`](PotentialSet::get)
/// returns the *stored* instance, so callers recover the parent-annotated
/// node after an identity-only lookup. Iteration yields insertion order,
/// which the determinism contract depends on.
#[derive(Clone, Default)]
pub struct PotentialSet {
    items: Vec<Potential>,
    index: HashMap<PotentialKey, usize>,
}

impl PotentialSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of nodes in the set.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the set is empty.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns `true` if a node with the given key is present.
    #[must_use]
    #[inline]
    pub fn contains(&self, key: PotentialKey) -> bool {
        self.index.contains_key(&key)
    }

    /// Returns the stored instance for the key, parents intact.
    #[must_use]
    pub fn get(&self, key: PotentialKey) -> Option<&Potential> {
        self.index.get(&key).map(|&i| &self.items[i])
    }

    /// Adds a node unless its key is already present.
    ///
    /// Returns `true` if the node was inserted. The first stored instance
    /// wins; later equal nodes are dropped.
    pub fn insert(&mut self, potential: Potential) -> bool {
        let key = potential.key();
        if self.index.contains_key(&key) {
            return false;
        }
        self.index.insert(key, self.items.len());
        self.items.push(potential);
        true
    }

    /// Adds a node, replacing an existing equal node when the new one has a
    /// strictly smaller ancestor count.
    ///
    /// Replacement keeps the original insertion position. This is the
    /// deterministic-mode resolution for on-nodes generated by several region
    /// rules at once.
    pub fn insert_preferring_fewer_ancestors(&mut self, potential: Potential) -> bool {
        let key = potential.key();
        if let Some(&i) = self.index.get(&key) {
            if potential.ancestor_count() < self.items[i].ancestor_count() {
                self.items[i] = potential;
            }
            return false;
        }
        self.insert(potential)
    }

    /// Adds every node of `other` that is not already present.
    ///
    /// Existing entries keep their position; new entries append in `other`'s
    /// order.
    pub fn add_all(&mut self, other: &PotentialSet) {
        for potential in other.iter() {
            self.insert(potential.clone());
        }
    }

    /// Reduces this set to the nodes whose keys also occur in `other`,
    /// preserving this set's order.
    pub fn retain_intersection(&mut self, other: &PotentialSet) {
        self.items.retain(|p| other.contains(p.key()));
        self.index.clear();
        for (i, p) in self.items.iter().enumerate() {
            self.index.insert(p.key(), i);
        }
    }

    /// Returns an iterator over the nodes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Potential> {
        self.items.iter()
    }
}

impl Debug for PotentialSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.iter()).finish()
    }
}

impl<'a> IntoIterator for &'a PotentialSet {
    type IntoIter = std::slice::Iter<'a, Potential>;
    type Item = &'a Potential;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl FromIterator<Potential> for PotentialSet {
    fn from_iter<T: IntoIterator<Item = Potential>>(iter: T) -> Self {
        let mut set = Self::new();
        for p in iter {
            set.insert(p);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn key(index: u8, digit: u8, is_on: bool) -> PotentialKey {
        PotentialKey {
            position: Position::from_index(index),
            digit: Digit::from_value(digit),
            is_on,
        }
    }

    fn node(index: u8, digit: u8, is_on: bool) -> Potential {
        Potential::new(Position::from_index(index), Digit::from_value(digit), is_on)
    }

    fn derived(index: u8, digit: u8, is_on: bool, parents: Vec<Potential>) -> Potential {
        Potential::with_parents(
            Position::from_index(index),
            Digit::from_value(digit),
            is_on,
            Cause::NakedSingle,
            String::new(),
            parents,
        )
    }

    #[test]
    fn test_equality_ignores_proof_metadata() {
        let plain = node(10, 3, true);
        let rich = derived(10, 3, true, vec![node(0, 1, false)]);
        assert_eq!(plain, rich);
        assert_ne!(plain, node(10, 3, false));
        assert_ne!(plain, node(10, 4, true));
    }

    #[test]
    fn test_conjugate_key_flips_polarity() {
        let k = key(40, 5, true);
        assert_eq!(k.conjugate(), key(40, 5, false));
        assert_eq!(k.conjugate().conjugate(), k);
    }

    #[test]
    fn test_ancestor_count_is_distinct_transitive() {
        let root = node(0, 1, true);
        let a = derived(1, 1, false, vec![root.clone()]);
        let b = derived(2, 1, false, vec![root.clone()]);
        // Diamond: both paths reach the same root, counted once.
        let tip = derived(3, 1, true, vec![a, b]);
        assert_eq!(root.ancestor_count(), 1);
        assert_eq!(tip.ancestor_count(), 4);
    }

    #[test]
    fn test_first_parent_chain() {
        let root = node(0, 1, true);
        let mid = derived(1, 1, false, vec![root.clone()]);
        let tip = derived(2, 1, true, vec![mid.clone()]);

        assert!(tip.first_parent_chain_contains(root.key()));
        assert!(tip.first_parent_chain_contains(mid.key()));
        assert!(!tip.first_parent_chain_contains(tip.key()));

        let chain = tip.first_parent_chain();
        let keys: Vec<_> = chain.iter().map(Potential::key).collect();
        assert_eq!(keys, vec![tip.key(), mid.key(), root.key()]);
    }

    #[test]
    fn test_set_preserves_insertion_order() {
        let mut set = PotentialSet::new();
        assert!(set.insert(node(5, 2, true)));
        assert!(set.insert(node(1, 9, false)));
        assert!(set.insert(node(3, 1, true)));
        assert!(!set.insert(node(5, 2, true)));

        let keys: Vec<_> = set.iter().map(Potential::key).collect();
        assert_eq!(
            keys,
            vec![key(5, 2, true), key(1, 9, false), key(3, 1, true)]
        );
    }

    #[test]
    fn test_get_returns_stored_instance() {
        let mut set = PotentialSet::new();
        let rich = derived(10, 3, true, vec![node(0, 1, false)]);
        set.insert(rich);

        // Lookup with a bare key recovers the parent-annotated node.
        let stored = set.get(key(10, 3, true)).unwrap();
        assert_eq!(stored.parents().len(), 1);
    }

    #[test]
    fn test_insert_keeps_first_instance() {
        let mut set = PotentialSet::new();
        set.insert(derived(10, 3, true, vec![node(0, 1, false)]));
        set.insert(node(10, 3, true));
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(key(10, 3, true)).unwrap().parents().len(), 1);
    }

    #[test]
    fn test_insert_preferring_fewer_ancestors() {
        let mut set = PotentialSet::new();
        let long = derived(
            10,
            3,
            true,
            vec![derived(1, 1, false, vec![node(0, 1, true)])],
        );
        let short = derived(10, 3, true, vec![node(2, 2, false)]);

        set.insert(node(7, 7, false));
        set.insert_preferring_fewer_ancestors(long);
        set.insert_preferring_fewer_ancestors(short.clone());

        // Replaced in place: order unchanged, instance swapped.
        let stored = set.get(key(10, 3, true)).unwrap();
        assert_eq!(stored.ancestor_count(), short.ancestor_count());
        let keys: Vec<_> = set.iter().map(Potential::key).collect();
        assert_eq!(keys, vec![key(7, 7, false), key(10, 3, true)]);
    }

    #[test]
    fn test_retain_intersection_preserves_order() {
        let mut a: PotentialSet = [node(3, 1, true), node(1, 2, false), node(2, 5, true)]
            .into_iter()
            .collect();
        let b: PotentialSet = [node(2, 5, true), node(3, 1, true)].into_iter().collect();

        a.retain_intersection(&b);
        let keys: Vec<_> = a.iter().map(Potential::key).collect();
        assert_eq!(keys, vec![key(3, 1, true), key(2, 5, true)]);
        assert_eq!(a.get(key(2, 5, true)).map(Potential::key), Some(key(2, 5, true)));
    }

    #[test]
    fn test_add_all_keeps_existing_entries() {
        let mut a: PotentialSet = [derived(3, 1, true, vec![node(0, 9, false)])]
            .into_iter()
            .collect();
        let b: PotentialSet = [node(3, 1, true), node(4, 4, false)].into_iter().collect();

        a.add_all(&b);
        assert_eq!(a.len(), 2);
        // The pre-existing instance keeps its parents.
        assert_eq!(a.get(key(3, 1, true)).unwrap().parents().len(), 1);
    }

    proptest! {
        #[test]
        fn prop_set_iteration_matches_first_insertions(
            entries in prop::collection::vec((0u8..81, 1u8..=9, prop::bool::ANY), 0..60)
        ) {
            let mut set = PotentialSet::new();
            let mut expected: Vec<PotentialKey> = vec![];
            for (index, digit, is_on) in entries {
                let p = node(index, digit, is_on);
                if !expected.contains(&p.key()) {
                    expected.push(p.key());
                }
                set.insert(p);
            }
            let keys: Vec<_> = set.iter().map(Potential::key).collect();
            prop_assert_eq!(keys, expected);
        }

        #[test]
        fn prop_retain_intersection_is_ordered_subset(
            a_entries in prop::collection::vec((0u8..81, 1u8..=9), 0..40),
            b_entries in prop::collection::vec((0u8..81, 1u8..=9), 0..40),
        ) {
            let mut a: PotentialSet = a_entries.iter().map(|&(i, d)| node(i, d, true)).collect();
            let b: PotentialSet = b_entries.iter().map(|&(i, d)| node(i, d, true)).collect();
            let before: Vec<_> = a.iter().map(Potential::key).collect();
            a.retain_intersection(&b);
            let after: Vec<_> = a.iter().map(Potential::key).collect();
            // Order-preserving filter of the original sequence.
            let expected: Vec<_> = before.into_iter().filter(|k| b.contains(*k)).collect();
            prop_assert_eq!(after, expected);
        }
    }
}
