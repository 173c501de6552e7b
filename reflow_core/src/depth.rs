// Copyright 2026 the Reflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tree-depth ordering for the layout queue.
//!
//! Elements closer to the root sort first, so a parent finishes each layout
//! stage before the descendants that read its geometry. Depth is the number
//! of ancestor hops from the element's [`Node`](crate::node::Node) to the
//! root, taken at the moment of the sort. An element with no node, or whose
//! reference has been dropped, has depth 0.

use alloc::vec::Vec;
use core::cell::RefCell;
use core::cmp::Ordering;

use crate::element::ElementHandle;
use crate::queue::UniqueQueue;

/// How depths are obtained while sorting the layout queue.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DepthMode {
    /// Walk the ancestor chain on every comparison.
    #[default]
    Walk,
    /// Walk once per element per sort and reuse the result for every
    /// comparison. Produces the same order as [`Walk`](Self::Walk).
    CachedPerSort,
}

/// Returns the tree depth of the element behind `handle`.
#[must_use]
pub fn element_depth(handle: &ElementHandle) -> usize {
    handle
        .upgrade()
        .and_then(|e| e.node())
        .map_or(0, |node| node.depth())
}

/// Orders two elements by ascending tree depth.
#[must_use]
pub fn compare_depth(a: &ElementHandle, b: &ElementHandle) -> Ordering {
    element_depth(a).cmp(&element_depth(b))
}

/// Stably sorts `queue` by ascending depth. Equal depths keep queue order.
///
/// Depth lookups call into elements, so they run on a snapshot of the
/// handles with the queue unborrowed. The sorted order is written back
/// afterwards; anything queued during the sort stays at the back.
pub(crate) fn sort_by_depth(queue: &RefCell<UniqueQueue<ElementHandle>>, mode: DepthMode) {
    let mut order: Vec<ElementHandle> = queue.borrow().as_slice().to_vec();
    match mode {
        DepthMode::Walk => order.sort_by(compare_depth),
        DepthMode::CachedPerSort => order.sort_by_cached_key(element_depth),
    }
    queue.borrow_mut().reorder(order);
}
