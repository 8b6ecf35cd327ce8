//! Concurrent indexed flow table.
//!
//! Single control-plane writer, many packet-path readers. Each slot is
//! published independently through an [`ArcSwapOption`], and structural
//! changes (grow, shrink) build a replacement table that the owner publishes
//! by swapping the table handle. A displaced table, and every displaced
//! entry, stays alive until the last reader drops its `Arc`; that refcount
//! is the grace period, so a reader either sees the old table intact or the
//! new one intact, never a torn mix.
//!
//! Growth: inserting a flow id at or past the capacity resizes to
//! `flow_id + TABLE_MIN`. Shrink: after a delete, a table at least twice
//! the minimum size whose population dropped to a third of capacity is
//! halved.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use arc_swap::ArcSwapOption;
use log::warn;

use crate::error::{Error, Result};
use crate::flow::FlowEntry;

/// Minimum slot capacity. Fresh tables and growth increments both use it.
pub const TABLE_MIN: usize = 16;

/// Indexed mapping from flow id to schedule entry.
pub struct FlowTable {
    count: AtomicU32,
    slots: Box<[ArcSwapOption<FlowEntry>]>,
}

impl FlowTable {
    /// Create an empty table with at least [`TABLE_MIN`] slots.
    pub fn with_capacity(size: usize) -> Arc<Self> {
        let size = size.max(TABLE_MIN);
        let slots: Vec<ArcSwapOption<FlowEntry>> =
            (0..size).map(|_| ArcSwapOption::const_empty()).collect();
        Arc::new(Self {
            count: AtomicU32::new(0),
            slots: slots.into_boxed_slice(),
        })
    }

    /// Create an empty table of minimum capacity.
    pub fn new() -> Arc<Self> {
        Self::with_capacity(TABLE_MIN)
    }

    /// Number of populated slots.
    pub fn num_items(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }

    /// Slot capacity.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Entry at `flow_id`, or `None` when the id is out of range or the
    /// slot is empty.
    ///
    /// Read-only and safe under the concurrent writer. The returned `Arc`
    /// stays valid however the table changes afterwards.
    pub fn lookup(&self, flow_id: u32) -> Option<Arc<FlowEntry>> {
        self.slots.get(flow_id as usize)?.load_full()
    }

    /// Iterate over the populated entries in slot order.
    pub fn entries(&self) -> impl Iterator<Item = Arc<FlowEntry>> + '_ {
        self.slots.iter().filter_map(|slot| slot.load_full())
    }

    /// Insert `entry`, growing the table when its id is out of range.
    ///
    /// Returns the table that now holds the entry: the same handle when the
    /// entry fit, a replacement sized `flow_id + TABLE_MIN` when the table
    /// had to grow. The caller owns publication of the returned handle.
    /// Replacing an existing id is allowed; the displaced entry is freed
    /// once its readers are done. Writer-side only.
    pub fn insert(self: &Arc<Self>, entry: FlowEntry) -> Result<Arc<Self>> {
        entry.validate()?;
        let idx = entry.flow_id as usize;

        let table = if idx < self.capacity() {
            Arc::clone(self)
        } else {
            self.realloc(idx + TABLE_MIN)
        };

        if table.slots[idx].swap(Some(Arc::new(entry))).is_none() {
            table.count.fetch_add(1, Ordering::Relaxed);
        }
        Ok(table)
    }

    /// Delete the entry at `flow_id`.
    ///
    /// An occupied slot is cleared and its entry deferred-freed; an empty
    /// slot in range is a no-op success. When the shrink condition holds,
    /// a half-sized replacement is returned; a shrink that cannot proceed
    /// never turns the delete into an error. Writer-side only.
    pub fn delete(self: &Arc<Self>, flow_id: u32) -> Result<Arc<Self>> {
        let idx = flow_id as usize;
        if idx >= self.capacity() {
            return Err(Error::UnknownFlow(flow_id));
        }

        if self.slots[idx].swap(None).is_some() {
            self.count.fetch_sub(1, Ordering::Relaxed);
        }

        let max = self.capacity();
        if max >= TABLE_MIN * 2 && self.num_items() as usize <= max / 3 {
            let target = max / 2;
            if self.highest_occupied().is_none_or(|h| h < target) {
                return Ok(self.realloc(target));
            }
            // A live slot sits above the halved capacity; keep the table.
            warn!("flow table shrink to {target} skipped: occupied slot out of range");
        }
        Ok(Arc::clone(self))
    }

    fn highest_occupied(&self) -> Option<usize> {
        (0..self.slots.len())
            .rev()
            .find(|&i| self.slots[i].load().is_some())
    }

    /// Build a resized copy. Slot contents move by reference; the old table
    /// is left intact for its remaining readers.
    fn realloc(&self, size: usize) -> Arc<Self> {
        let new = Self::with_capacity(size);
        for (i, slot) in self.slots.iter().enumerate().take(new.capacity()) {
            if let Some(entry) = slot.load_full() {
                new.slots[i].store(Some(entry));
            }
        }
        new.count
            .store(self.count.load(Ordering::Relaxed), Ordering::Relaxed);
        new
    }
}

impl std::fmt::Debug for FlowTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowTable")
            .field("count", &self.num_items())
            .field("capacity", &self.capacity())
            .finish()
    }
}
