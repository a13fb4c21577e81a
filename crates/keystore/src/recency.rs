//! Recency ordering for cached entries.
//!
//! [`RecencyList`] is a doubly linked list stored in a `Vec` arena. The front
//! is the most recently used (MRU) entry and the back is the least recently
//! used (LRU) entry.
//!
//! # Complexity
//! - `push_front`, `move_to_front`, `remove_back`, `back`, `front`, `get`:
//!   `O(1)` amortized.
//! - `clear`: `O(n)` in the number of slots ever allocated.
//!
//! # Handles
//! Every live entry is addressed by a [`Handle`]: its slot index plus the
//! slot's generation. Removing an entry bumps the generation of its slot, so a
//! handle kept past removal is stale and every operation rejects it, even
//! after the slot has been reused for a different entry.
//!
//! # Thread Safety
//! `RecencyList` performs no synchronization. The cache engine owns it and
//! only touches it while holding its own lock.

use std::fmt;
use std::iter::FusedIterator;

/// Stable position of a live entry in a [`RecencyList`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    index: usize,
    generation: u64,
}

#[derive(Debug)]
struct Node<K, V> {
    key: K,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

#[derive(Debug)]
struct Slot<K, V> {
    generation: u64,
    node: Option<Node<K, V>>,
}

/// Arena-backed doubly linked list ordered from MRU (front) to LRU (back).
///
/// # Examples
///
/// ```
/// use keystore_cache::recency::RecencyList;
///
/// let mut list = RecencyList::new();
/// let a = list.push_front("a", 1);
/// list.push_front("b", 2);
///
/// assert_eq!(list.back(), Some(a));
/// assert!(list.move_to_front(a));
/// assert_eq!(list.remove_back(), Some(("b", 2)));
/// ```
pub struct RecencyList<K, V> {
    slots: Vec<Slot<K, V>>,
    free_list: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl<K, V> Default for RecencyList<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> RecencyList<K, V> {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty list with room for `capacity` entries before the
    /// arena reallocates.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_list: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    /// Returns the number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` when the list has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Inserts an entry at the front (MRU) and returns its handle.
    pub fn push_front(&mut self, key: K, value: V) -> Handle {
        let node = Node { key, value, prev: None, next: None };
        let index = match self.free_list.pop() {
            Some(index) => {
                self.slots[index].node = Some(node);
                index
            }
            None => {
                self.slots.push(Slot { generation: 0, node: Some(node) });
                self.slots.len() - 1
            }
        };

        self.attach_front(index);
        self.len += 1;
        Handle { index, generation: self.slots[index].generation }
    }

    /// Moves the entry behind `handle` to the front (MRU).
    ///
    /// Returns `false` and leaves the order untouched when `handle` is stale.
    pub fn move_to_front(&mut self, handle: Handle) -> bool {
        if !self.contains(handle) {
            return false;
        }
        if self.head != Some(handle.index) {
            self.detach(handle.index);
            self.attach_front(handle.index);
        }
        true
    }

    /// Removes and returns the back (LRU) entry.
    pub fn remove_back(&mut self) -> Option<(K, V)> {
        let index = self.tail?;
        self.detach(index);

        let slot = &mut self.slots[index];
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(index);
        self.len = self.len.saturating_sub(1);
        Some((node.key, node.value))
    }

    /// Returns the handle of the back (LRU) entry.
    #[must_use]
    pub fn back(&self) -> Option<Handle> {
        self.tail.map(|index| self.handle_at(index))
    }

    /// Returns the handle of the front (MRU) entry.
    #[must_use]
    pub fn front(&self) -> Option<Handle> {
        self.head.map(|index| self.handle_at(index))
    }

    /// Returns the entry behind `handle`, or `None` when it is stale.
    #[must_use]
    pub fn get(&self, handle: Handle) -> Option<(&K, &V)> {
        self.node(handle).map(|node| (&node.key, &node.value))
    }

    /// Returns `true` when `handle` addresses a live entry.
    #[must_use]
    pub fn contains(&self, handle: Handle) -> bool {
        self.node(handle).is_some()
    }

    /// Removes every entry. All previously issued handles become stale.
    pub fn clear(&mut self) {
        self.free_list.clear();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.node.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
            self.free_list.push(index);
        }
        self.head = None;
        self.tail = None;
        self.len = 0;
    }

    /// Returns an iterator that yields entries from MRU to LRU.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter { list: self, current: self.head, remaining: self.len }
    }

    fn handle_at(&self, index: usize) -> Handle {
        Handle { index, generation: self.slots[index].generation }
    }

    fn node(&self, handle: Handle) -> Option<&Node<K, V>> {
        self.slots
            .get(handle.index)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    fn node_mut(&mut self, index: usize) -> Option<&mut Node<K, V>> {
        self.slots.get_mut(index).and_then(|slot| slot.node.as_mut())
    }

    fn detach(&mut self, index: usize) {
        let (prev, next) = match self.slots.get(index).and_then(|slot| slot.node.as_ref()) {
            Some(node) => (node.prev, node.next),
            None => return,
        };

        match prev {
            Some(prev_index) => {
                if let Some(prev_node) = self.node_mut(prev_index) {
                    prev_node.next = next;
                }
            }
            None => self.head = next,
        }

        match next {
            Some(next_index) => {
                if let Some(next_node) = self.node_mut(next_index) {
                    next_node.prev = prev;
                }
            }
            None => self.tail = prev,
        }

        if let Some(node) = self.node_mut(index) {
            node.prev = None;
            node.next = None;
        }
    }

    fn attach_front(&mut self, index: usize) {
        let old_head = self.head;
        if let Some(node) = self.node_mut(index) {
            node.prev = None;
            node.next = old_head;
        }

        match old_head {
            Some(head_index) => {
                if let Some(head_node) = self.node_mut(head_index) {
                    head_node.prev = Some(index);
                }
            }
            None => self.tail = Some(index),
        }

        self.head = Some(index);
    }
}

impl<K: fmt::Debug, V> fmt::Debug for RecencyList<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecencyList")
            .field("len", &self.len)
            .field("keys", &self.iter().map(|(key, _)| key).collect::<Vec<_>>())
            .finish()
    }
}

/// Iterator over list entries from MRU to LRU.
pub struct Iter<'a, K, V> {
    list: &'a RecencyList<K, V>,
    current: Option<usize>,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.current?;
        let node = self.list.slots.get(index)?.node.as_ref()?;
        self.current = node.next;
        self.remaining = self.remaining.saturating_sub(1);
        Some((&node.key, &node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

impl<K, V> FusedIterator for Iter<'_, K, V> {}
