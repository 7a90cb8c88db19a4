//! The ordered-map primitive: a doubly linked list over a slab of nodes,
//! indexed by key, so that move-to-front/move-to-back/pop-back are all O(1)
//! without unsafe pointer juggling.
//!
//! This is the idiomatic Rust substitute for the original's `ListMap`
//! (`examples/original_source/lrucache/listmap.go`), which paired Go's
//! `container/list.List` with a `map[interface{}]*list.Element`. A `Vec`
//! of slots plays the role of the linked list's node storage; links are
//! slot indices instead of pointers, and a free list recycles slots that
//! [`OrderedMap::pop_back`] vacates so that an eviction immediately followed
//! by an insertion (the common `set`-triggers-eviction case) reuses the
//! slot rather than allocating a new one — the Rust analogue of the
//! original's `entryPool` (`sync.Pool`).

use hashbrown::HashMap;
use std::hash::Hash;

struct Node<K, V> {
    key: K,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

/// A doubly linked list of key/value pairs with O(1) lookup, front/back
/// insertion, and move-to-front/move-to-back, keyed by `K`.
///
/// Front is the most-recently-used end; back is the least-recently-used
/// end (or, for an entry kept past expiry for stale-on-error, the end it's
/// parked at until evicted or overwritten).
pub(crate) struct OrderedMap<K, V> {
    slots: Vec<Option<Node<K, V>>>,
    free: Vec<usize>,
    index: HashMap<K, usize>,
    front: Option<usize>,
    back: Option<usize>,
}

impl<K, V> OrderedMap<K, V>
where
    K: Hash + Eq + Clone,
{
    pub(crate) fn new() -> Self {
        Self { slots: Vec::new(), free: Vec::new(), index: HashMap::new(), front: None, back: None }
    }

    pub(crate) fn len(&self) -> usize {
        self.index.len()
    }

    /// The slot index for `key`, if present, without changing its position.
    pub(crate) fn position(&self, key: &K) -> Option<usize> {
        self.index.get(key).copied()
    }

    pub(crate) fn value(&self, slot: usize) -> &V {
        &self.slots[slot].as_ref().expect("live slot").value
    }

    pub(crate) fn value_mut(&mut self, slot: usize) -> &mut V {
        &mut self.slots[slot].as_mut().expect("live slot").value
    }

    fn unlink(&mut self, slot: usize) {
        let (prev, next) = {
            let node = self.slots[slot].as_ref().expect("live slot");
            (node.prev, node.next)
        };
        match prev {
            Some(p) => self.slots[p].as_mut().expect("live slot").next = next,
            None => self.front = next,
        }
        match next {
            Some(n) => self.slots[n].as_mut().expect("live slot").prev = prev,
            None => self.back = prev,
        }
    }

    fn link_front(&mut self, slot: usize) {
        let old_front = self.front;
        {
            let node = self.slots[slot].as_mut().expect("live slot");
            node.prev = None;
            node.next = old_front;
        }
        if let Some(old) = old_front {
            self.slots[old].as_mut().expect("live slot").prev = Some(slot);
        }
        self.front = Some(slot);
        if self.back.is_none() {
            self.back = Some(slot);
        }
    }

    fn link_back(&mut self, slot: usize) {
        let old_back = self.back;
        {
            let node = self.slots[slot].as_mut().expect("live slot");
            node.next = None;
            node.prev = old_back;
        }
        if let Some(old) = old_back {
            self.slots[old].as_mut().expect("live slot").next = Some(slot);
        }
        self.back = Some(slot);
        if self.front.is_none() {
            self.front = Some(slot);
        }
    }

    /// Move an already-present `key`'s node to the front.
    pub(crate) fn move_to_front(&mut self, key: &K) {
        if let Some(&slot) = self.index.get(key) {
            if self.front != Some(slot) {
                self.unlink(slot);
                self.link_front(slot);
            }
        }
    }

    /// Move an already-present `key`'s node to the back.
    pub(crate) fn move_to_back(&mut self, key: &K) {
        if let Some(&slot) = self.index.get(key) {
            if self.back != Some(slot) {
                self.unlink(slot);
                self.link_back(slot);
            }
        }
    }

    /// Insert a brand-new `key` at the front. Callers must check
    /// [`OrderedMap::position`] first; pushing a key already present
    /// produces a duplicate index entry.
    pub(crate) fn push_front(&mut self, key: K, value: V) {
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(Node { key: key.clone(), value, prev: None, next: None });
                slot
            }
            None => {
                self.slots.push(Some(Node { key: key.clone(), value, prev: None, next: None }));
                self.slots.len() - 1
            }
        };
        self.index.insert(key, slot);
        self.link_front(slot);
    }

    /// Remove `key` entirely, returning its value. The vacated slot is
    /// recycled by a subsequent [`OrderedMap::push_front`].
    pub(crate) fn remove(&mut self, key: &K) -> Option<V> {
        let slot = self.index.remove(key)?;
        self.unlink(slot);
        let node = self.slots[slot].take().expect("live slot");
        self.free.push(slot);
        Some(node.value)
    }

    /// Remove and return the key/value at the back (least-recently-used
    /// end), if any.
    pub(crate) fn pop_back(&mut self) -> Option<(K, V)> {
        let slot = self.back?;
        self.unlink(slot);
        let node = self.slots[slot].take().expect("live slot");
        self.free.push(slot);
        self.index.remove(&node.key);
        Some((node.key, node.value))
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.index.clear();
        self.front = None;
        self.back = None;
    }

    #[cfg(test)]
    pub(crate) fn order(&self) -> Vec<K> {
        let mut out = Vec::new();
        let mut cursor = self.front;
        while let Some(slot) = cursor {
            let node = self.slots[slot].as_ref().expect("live slot");
            out.push(node.key.clone());
            cursor = node.next;
        }
        out
    }
}
