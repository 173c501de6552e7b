// Copyright 2026 the Reflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Insertion-ordered queue with set semantics.

use alloc::vec::Vec;
use core::cmp::Ordering;
use core::hash::Hash;
use core::ops::Index;

use hashbrown::HashSet;

/// An insertion-ordered sequence in which each value appears at most once.
///
/// A dense `Vec` provides ordered iteration and index access; a hash set
/// mirrors its contents for O(1) membership tests. Every mutation keeps the
/// two in sync. Removal preserves the relative order of the remaining values.
#[derive(Clone, Debug)]
pub struct UniqueQueue<T> {
    items: Vec<T>,
    members: HashSet<T>,
}

impl<T: Hash + Eq + Clone> Default for UniqueQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Hash + Eq + Clone> UniqueQueue<T> {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            members: HashSet::new(),
        }
    }

    /// Creates an empty queue with room for `capacity` values.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            members: HashSet::with_capacity(capacity),
        }
    }

    /// Returns whether `value` is queued.
    #[inline]
    #[must_use]
    pub fn contains(&self, value: &T) -> bool {
        self.members.contains(value)
    }

    /// Appends `value` unless it is already queued.
    ///
    /// Returns `true` if the value was inserted.
    pub fn add_unique(&mut self, value: T) -> bool {
        if !self.members.insert(value.clone()) {
            return false;
        }
        self.items.push(value);
        true
    }

    /// Removes `value` if it is queued.
    ///
    /// Returns `true` if the value was present.
    pub fn remove(&mut self, value: &T) -> bool {
        if !self.members.remove(value) {
            return false;
        }
        if let Some(pos) = self.items.iter().position(|v| v == value) {
            self.items.remove(pos);
        }
        true
    }

    /// Removes and returns the value at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    pub fn remove_at(&mut self, index: usize) -> T {
        assert!(
            index < self.items.len(),
            "queue index {index} out of range (len {})",
            self.items.len()
        );
        let value = self.items.remove(index);
        self.members.remove(&value);
        value
    }

    /// Returns the number of queued values.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns whether the queue is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the value at `index`, if any.
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    /// Iterates over queued values in order.
    pub fn iter(&self) -> core::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Returns the queued values as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Stably re-sorts the queue in place. Membership is unaffected.
    pub fn sort_by<F>(&mut self, compare: F)
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        self.items.sort_by(compare);
    }

    /// Stably re-sorts the queue by a key computed once per value.
    pub fn sort_by_cached_key<K, F>(&mut self, key: F)
    where
        K: Ord,
        F: FnMut(&T) -> K,
    {
        self.items.sort_by_cached_key(key);
    }

    /// Rearranges the queue to follow `order`. Membership is unaffected.
    ///
    /// Values in `order` that are not queued are skipped, as are repeats.
    /// Queued values missing from `order` keep their relative order after
    /// the ones it places.
    pub fn reorder(&mut self, order: impl IntoIterator<Item = T>) {
        let mut placed = HashSet::with_capacity(self.items.len());
        let mut items: Vec<T> = order
            .into_iter()
            .filter(|v| self.members.contains(v) && placed.insert(v.clone()))
            .collect();
        items.extend(self.items.iter().filter(|v| !placed.contains(*v)).cloned());
        self.items = items;
    }

    /// Removes every value.
    pub fn clear(&mut self) {
        self.items.clear();
        self.members.clear();
    }
}

impl<T> Index<usize> for UniqueQueue<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.items[index]
    }
}

impl<'a, T> IntoIterator for &'a UniqueQueue<T> {
    type Item = &'a T;
    type IntoIter = core::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
