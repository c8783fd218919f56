/*!
 * Allocation Records
 *
 * Audit trail of live allocations, newest first.
 *
 * Records live in an index-addressed slab with `prev`/`next` links. The
 * slot index of a record is stored in the prefix of its block, so freeing
 * a block unlinks its record in O(1) without searching.
 */

use serde::Serialize;
use std::time::SystemTime;

/// What is known about one live allocation
///
/// Fields are `None` when the corresponding `CALLER_*` option is off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocationRecord {
    /// Requested size in bytes
    pub size: Option<usize>,
    pub file: Option<&'static str>,
    pub line: Option<u32>,
    pub column: Option<u32>,
    /// Module path, when allocated through `tracked_allocate!`
    pub module: Option<&'static str>,
    pub timestamp: Option<SystemTime>,
}

/// Prefix stored in front of tracked blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RecordSlot(pub(crate) u32);

impl RecordSlot {
    /// Block allocated without a record
    pub(crate) const UNTRACKED: RecordSlot = RecordSlot(u32::MAX);
}

impl Default for RecordSlot {
    fn default() -> Self {
        RecordSlot::UNTRACKED
    }
}

#[derive(Debug)]
struct Node {
    record: AllocationRecord,
    /// Requested size, kept even when `CALLER_SIZE` is off
    requested: usize,
    prev: Option<u32>,
    next: Option<u32>,
}

/// Slab of records linked newest first
#[derive(Debug, Default)]
pub(crate) struct RecordSlab {
    nodes: Vec<Option<Node>>,
    vacant: Vec<u32>,
    head: Option<u32>,
    live: usize,
}

impl RecordSlab {
    /// Link a new record at the head, returning its slot
    pub(crate) fn insert(&mut self, record: AllocationRecord, requested: usize) -> RecordSlot {
        let index = match self.vacant.pop() {
            Some(index) => index,
            None => {
                let Ok(index) = u32::try_from(self.nodes.len()) else {
                    return RecordSlot::UNTRACKED;
                };
                if index == RecordSlot::UNTRACKED.0 {
                    return RecordSlot::UNTRACKED;
                }
                self.nodes.push(None);
                index
            }
        };

        let next = self.head;
        if let Some(old_head) = next.and_then(|h| self.node_mut(h)) {
            old_head.prev = Some(index);
        }
        self.nodes[index as usize] = Some(Node {
            record,
            requested,
            prev: None,
            next,
        });
        self.head = Some(index);
        self.live += 1;
        RecordSlot(index)
    }

    /// Unlink a record, returning it with its requested size
    pub(crate) fn remove(&mut self, slot: RecordSlot) -> Option<(AllocationRecord, usize)> {
        let node = self.nodes.get_mut(slot.0 as usize)?.take()?;

        match node.prev {
            Some(prev) => {
                if let Some(p) = self.node_mut(prev) {
                    p.next = node.next;
                }
            }
            None => self.head = node.next,
        }
        if let Some(n) = node.next.and_then(|next| self.node_mut(next)) {
            n.prev = node.prev;
        }

        self.vacant.push(slot.0);
        self.live -= 1;
        Some((node.record, node.requested))
    }

    /// Requested size of a live record
    pub(crate) fn requested(&self, slot: RecordSlot) -> Option<usize> {
        self.nodes
            .get(slot.0 as usize)
            .and_then(Option::as_ref)
            .map(|n| n.requested)
    }

    /// Record a new requested size after a resize
    pub(crate) fn resize(&mut self, slot: RecordSlot, requested: usize) {
        if let Some(node) = self.node_mut(slot.0) {
            node.requested = requested;
            if node.record.size.is_some() {
                node.record.size = Some(requested);
            }
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.live
    }

    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.vacant.clear();
        self.head = None;
        self.live = 0;
    }

    /// Records newest first
    pub(crate) fn iter(&self) -> impl Iterator<Item = &AllocationRecord> + '_ {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            let node = self.nodes.get(cursor? as usize)?.as_ref()?;
            cursor = node.next;
            Some(&node.record)
        })
    }

    #[inline]
    fn node_mut(&mut self, index: u32) -> Option<&mut Node> {
        self.nodes.get_mut(index as usize).and_then(Option::as_mut)
    }
}
