//! Id-keyed storage with a stable run order.

use std::cmp::Reverse;
use std::collections::HashMap;

use super::{Daemon, Fuse};

/// Something the scheduler orders by priority, then registration order.
pub(crate) trait Scheduled {
    fn id(&self) -> &str;
    fn priority(&self) -> i32;
    fn seq(&self) -> u64;
    fn set_seq(&mut self, seq: u64);
}

impl Scheduled for Fuse {
    fn id(&self) -> &str {
        &self.id
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn seq(&self) -> u64 {
        self.seq
    }

    fn set_seq(&mut self, seq: u64) {
        self.seq = seq;
    }
}

impl Scheduled for Daemon {
    fn id(&self) -> &str {
        &self.id
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn seq(&self) -> u64 {
        self.seq
    }

    fn set_seq(&mut self, seq: u64) {
        self.seq = seq;
    }
}

/// A slot handle taken at the start of a phase: id plus the registration
/// sequence it had at that moment. A replaced entry gets a new sequence,
/// so stale handles no longer resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SlotHandle {
    pub id: String,
    pub seq: u64,
}

#[derive(Debug)]
pub(crate) struct Registry<T> {
    items: HashMap<String, T>,
    next_seq: u64,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            items: HashMap::new(),
            next_seq: 0,
        }
    }
}

impl<T: Scheduled> Registry<T> {
    /// Insert or replace by id. The item always takes a fresh sequence.
    pub fn insert(&mut self, mut item: T) -> Option<T> {
        item.set_seq(self.next_seq);
        self.next_seq += 1;
        self.items.insert(item.id().to_string(), item)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.items.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut T> {
        self.items.get_mut(id)
    }

    /// Resolve a handle taken earlier, if the same registration is still live.
    pub fn resolve(&mut self, handle: &SlotHandle) -> Option<&mut T> {
        self.items
            .get_mut(&handle.id)
            .filter(|item| item.seq() == handle.seq)
    }

    pub fn remove(&mut self, id: &str) -> Option<T> {
        self.items.remove(id)
    }

    pub fn retain<F: FnMut(&T) -> bool>(&mut self, mut keep: F) {
        self.items.retain(|_, item| keep(item));
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Items sorted by priority (descending), ties by registration order.
    pub fn ordered(&self) -> Vec<&T> {
        let mut items: Vec<&T> = self.items.values().collect();
        items.sort_by_key(|item| (Reverse(item.priority()), item.seq()));
        items
    }

    /// Handles for every item, in run order.
    pub fn run_order(&self) -> Vec<SlotHandle> {
        self.ordered()
            .into_iter()
            .map(|item| SlotHandle {
                id: item.id().to_string(),
                seq: item.seq(),
            })
            .collect()
    }

    /// Ids of items matching `predicate`, in run order.
    pub fn ids_where<F: Fn(&T) -> bool>(&self, predicate: F) -> Vec<String> {
        self.ordered()
            .into_iter()
            .filter(|item| predicate(item))
            .map(|item| item.id().to_string())
            .collect()
    }
}
