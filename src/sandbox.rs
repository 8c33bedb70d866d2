//! Copy-on-write storage backing sandboxed world clones.
//!
//! The world keeps its tiles, segments and features in [`CowMap`]s keyed by
//! coordinates or stable ids. Relationships between objects are expressed as
//! ids, never references, so a clone that maps the same ids to the same slots
//! automatically preserves every aliasing relationship of the original graph
//! (segment -> feature -> segment cycles included).

use std::collections::BTreeMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// How [`crate::World::clone`] isolates a sandbox from its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloneStrategy {
    /// Copy every stored object up front.
    Eager,
    /// Share storage and copy an object the first time the clone writes it.
    #[default]
    CopyOnWrite,
}

/// Ordered map whose clones share a frozen base layer.
///
/// A clone writes into its own `local` memo, keyed exactly like the base, so
/// each original entry gets at most one private copy per clone. A `None` in
/// the memo is a tombstone for an entry removed in this clone. When nothing
/// else holds the base, writes go straight into it and the memo is folded
/// back, so a long-lived canonical map does not accumulate an overlay.
#[derive(Debug)]
pub struct CowMap<K, V> {
    base: Rc<BTreeMap<K, V>>,
    local: BTreeMap<K, Option<V>>,
    len: usize,
}

impl<K: Ord + Clone, V: Clone> CowMap<K, V> {
    pub fn new() -> Self {
        Self {
            base: Rc::new(BTreeMap::new()),
            local: BTreeMap::new(),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        match self.local.get(key) {
            Some(slot) => slot.as_ref(),
            None => self.base.get(key),
        }
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.absorb();
        if self.owns_base() {
            return Rc::get_mut(&mut self.base).and_then(|base| base.get_mut(key));
        }
        if !self.local.contains_key(key) {
            let copy = self.base.get(key)?.clone();
            self.local.insert(key.clone(), Some(copy));
        }
        self.local.get_mut(key).and_then(Option::as_mut)
    }

    pub fn insert(&mut self, key: K, value: V) {
        self.absorb();
        if !self.contains_key(&key) {
            self.len += 1;
        }
        match Rc::get_mut(&mut self.base) {
            Some(base) => {
                base.insert(key, value);
            }
            None => {
                self.local.insert(key, Some(value));
            }
        }
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.absorb();
        let removed = if self.owns_base() {
            Rc::get_mut(&mut self.base).and_then(|base| base.remove(key))
        } else {
            match self.local.get_mut(key) {
                Some(slot) => slot.take(),
                None => {
                    let value = self.base.get(key).cloned();
                    if value.is_some() {
                        self.local.insert(key.clone(), None);
                    }
                    value
                }
            }
        };
        if removed.is_some() {
            self.len -= 1;
        }
        removed
    }

    /// Entries in key order, private copies shadowing shared ones.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        let mut entries: Vec<(&K, &V)> = self
            .base
            .iter()
            .filter(|(key, _)| !self.local.contains_key(*key))
            .chain(
                self.local
                    .iter()
                    .filter_map(|(key, slot)| slot.as_ref().map(|value| (key, value))),
            )
            .collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries.into_iter()
    }

    pub fn keys(&self) -> Vec<K> {
        self.iter().map(|(key, _)| key.clone()).collect()
    }

    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, value)| value)
    }

    /// Clone according to `strategy`.
    pub fn fork(&self, strategy: CloneStrategy) -> Self {
        match strategy {
            CloneStrategy::Eager => self.deep_copy(),
            CloneStrategy::CopyOnWrite => self.clone(),
        }
    }

    /// Fully materialised copy sharing nothing with `self`.
    pub fn deep_copy(&self) -> Self {
        let base: BTreeMap<K, V> = self
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Self {
            len: base.len(),
            base: Rc::new(base),
            local: BTreeMap::new(),
        }
    }

    /// Number of entries this map holds privately (copied, added or removed).
    pub fn private_entries(&self) -> usize {
        self.local.len()
    }

    pub fn shares_base_with(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.base, &other.base)
    }

    fn owns_base(&self) -> bool {
        Rc::strong_count(&self.base) == 1 && Rc::weak_count(&self.base) == 0
    }

    fn absorb(&mut self) {
        if self.local.is_empty() {
            return;
        }
        if let Some(base) = Rc::get_mut(&mut self.base) {
            for (key, slot) in std::mem::take(&mut self.local) {
                match slot {
                    Some(value) => {
                        base.insert(key, value);
                    }
                    None => {
                        base.remove(&key);
                    }
                }
            }
        }
    }
}

impl<K: Ord + Clone, V: Clone> Clone for CowMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            base: Rc::clone(&self.base),
            local: self.local.clone(),
            len: self.len,
        }
    }
}

impl<K: Ord + Clone, V: Clone> Default for CowMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
